// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::modules::error::code::ErrorCode;
use crate::modules::error::MailSiftResult;
use crate::modules::settings::cli::Settings;
use crate::{decrypt, raise_error};

/// Prefix marking a password sealed with the master encryption password.
pub const SEALED_PREFIX: &str = "enc:";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
pub enum Encryption {
    #[default]
    #[clap(name = "ssl")]
    Ssl,
    #[clap(name = "starttls")]
    StartTls,
    #[clap(name = "none")]
    None,
}

/// Everything needed to open and authenticate one IMAP connection.
#[derive(Clone, PartialEq, Eq)]
pub struct ImapCredentials {
    pub host: String,
    pub port: u16,
    pub encryption: Encryption,
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for ImapCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapCredentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("encryption", &self.encryption)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// Source of mailbox access. Called on every (re)connect so rotated secrets are picked up.
pub trait CredentialProvider: Send + Sync + 'static {
    fn credentials(&self) -> MailSiftResult<ImapCredentials>;
}

/// Reads the mailbox credentials from the command line / environment settings.
#[derive(Clone, Debug)]
pub struct SettingsCredentialProvider {
    host: Option<String>,
    port: u16,
    encryption: Encryption,
    user: Option<String>,
    password: Option<String>,
}

impl SettingsCredentialProvider {
    pub fn new(settings: &Settings) -> Self {
        Self {
            host: settings.mailsift_imap_host.clone(),
            port: settings.mailsift_imap_port,
            encryption: settings.mailsift_imap_encryption,
            user: settings.mailsift_imap_user.clone(),
            password: settings.mailsift_imap_password.clone(),
        }
    }
}

fn required(value: &Option<String>, name: &str) -> MailSiftResult<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .ok_or_else(|| {
            raise_error!(
                format!("'{}' is not configured", name),
                ErrorCode::MissingConfiguration
            )
        })
}

impl CredentialProvider for SettingsCredentialProvider {
    fn credentials(&self) -> MailSiftResult<ImapCredentials> {
        let password = required(&self.password, "mailsift_imap_password")?;
        let password = match password.strip_prefix(SEALED_PREFIX) {
            Some(sealed) => decrypt!(sealed)?,
            None => password,
        };
        Ok(ImapCredentials {
            host: required(&self.host, "mailsift_imap_host")?,
            port: self.port,
            encryption: self.encryption,
            user: required(&self.user, "mailsift_imap_user")?,
            password,
        })
    }
}
