// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use super::error::MailSiftError;
use mail_parser::{Addr as MimeAddr, Address as MimeAddress};
use poem::error::ResponseError;
use poem::Body;
use poem::{http::StatusCode, Response};
use poem_openapi::Object;
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use tracing::error;

pub mod error;
pub mod log;
pub mod rustls;
pub mod signal;

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Object)]
pub struct Addr {
    /// The optional display name associated with the email address (e.g., "John Doe").
    pub name: Option<String>,
    /// The optional email address (e.g., "john.doe@example.com").
    pub address: Option<String>,
}

impl Addr {
    /// Display name if present, otherwise the local part of the address.
    pub fn display_name(&self) -> Option<String> {
        let name = self
            .name
            .as_deref()
            .map(|n| n.trim().trim_matches('"').trim())
            .filter(|n| !n.is_empty());
        if let Some(name) = name {
            return Some(name.to_string());
        }
        self.address
            .as_deref()
            .and_then(|a| a.split('@').next())
            .map(str::trim)
            .filter(|local| !local.is_empty())
            .map(str::to_string)
    }
}

impl std::fmt::Display for Addr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.name, &self.address) {
            (Some(name), Some(address)) => write!(f, "{} <{}>", name, address),
            (None, Some(address)) => write!(f, "<{}>", address),
            (Some(name), None) => write!(f, "{}", name),
            (None, None) => write!(f, ""),
        }
    }
}

impl<'x> From<&MimeAddr<'x>> for Addr {
    fn from(original: &MimeAddr<'x>) -> Self {
        Addr {
            name: original.name.as_ref().map(|s| s.to_string()),
            address: original.address.as_ref().map(|s| s.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AddrVec(pub Vec<Addr>);

impl Deref for AddrVec {
    type Target = Vec<Addr>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'x> From<&MimeAddress<'x>> for AddrVec {
    fn from(original: &MimeAddress<'x>) -> Self {
        let vec = match original {
            MimeAddress::List(addrs) => addrs.iter().map(Addr::from).collect(),
            MimeAddress::Group(groups) => groups
                .iter()
                .flat_map(|group| group.addresses.iter().map(Addr::from))
                .collect(),
        };
        AddrVec(vec)
    }
}

impl ResponseError for MailSiftError {
    fn status(&self) -> StatusCode {
        self.code().status()
    }

    fn as_response(&self) -> Response
    where
        Self: std::error::Error + Send + Sync + 'static,
    {
        match self {
            MailSiftError::Generic {
                message,
                location,
                code,
            } => {
                error!(
                    error_code = *code as u32,
                    error_message = %message,
                    error_location = ?location
                );

                let body = serde_json::json!({
                    "code": *code as u32,
                    "message": message.to_string(),
                });
                Response::builder()
                    .status(self.status())
                    .body(Body::from_json(body).unwrap_or_else(|_| Body::from_string(message.clone())))
            }
        }
    }
}
