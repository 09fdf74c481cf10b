// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::common::{Addr, AddrVec};
use mail_parser::{MessageParser, PartType};
use serde::{Deserialize, Serialize};


/// A message as fetched from the mailbox, before any cleaning.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    /// Mailbox-assigned UID, monotonic within one UIDVALIDITY epoch.
    pub uid: u32,
    /// `Message-ID` header without angle brackets.
    pub message_id: Option<String>,
    pub sender: Option<Addr>,
    pub subject: Option<String>,
    pub cc: Vec<Addr>,
    pub plain: Option<String>,
    pub html: Option<String>,
    /// `Date` header as RFC 3339.
    pub date: Option<String>,
    /// Server INTERNALDATE in milliseconds.
    pub arrival: Option<i64>,
    pub mailbox: String,
}

impl RawMessage {
    /// Builds a message from RFC 822 bytes.
    ///
    /// Never fails: when the bytes cannot be parsed as MIME, the lossy UTF-8
    /// of the input becomes the plain part.
    pub fn parse(uid: u32, mailbox: &str, bytes: &[u8], arrival: Option<i64>) -> Self {
        let Some(message) = MessageParser::new().parse(bytes) else {
            return Self {
                uid,
                plain: Some(String::from_utf8_lossy(bytes).into_owned()),
                arrival,
                mailbox: mailbox.into(),
                ..Default::default()
            };
        };

        let mut plain: Vec<&str> = Vec::new();
        for part in message.text_bodies() {
            if let PartType::Text(text) = &part.body {
                plain.push(text.as_ref());
            }
        }
        let mut html: Vec<&str> = Vec::new();
        for part in message.html_bodies() {
            if let PartType::Html(markup) = &part.body {
                html.push(markup.as_ref());
            }
        }

        Self {
            uid,
            message_id: message
                .message_id()
                .map(|id| id.trim().trim_matches(|c| c == '<' || c == '>').to_string())
                .filter(|id| !id.is_empty()),
            sender: message
                .from()
                .and_then(|addr| AddrVec::from(addr).0.first().cloned()),
            subject: message.subject().map(String::from),
            cc: message
                .cc()
                .map(|addr| AddrVec::from(addr).0)
                .unwrap_or_default(),
            plain: (!plain.is_empty()).then(|| plain.join("\n\n")),
            html: (!html.is_empty()).then(|| html.join("\n")),
            date: message.date().map(|d| d.to_rfc3339()),
            arrival,
            mailbox: mailbox.into(),
        }
    }

    /// Seen-set key of a UID within its epoch.
    pub fn uid_key(uid_validity: u32, uid: u32) -> String {
        format!("uid:{}:{}", uid_validity, uid)
    }

    /// Seen-set key derived from the Message-ID, stable across UID renumbering.
    pub fn message_id_key(&self) -> Option<String> {
        self.message_id
            .as_deref()
            .map(|id| format!("mid:{}", id.to_ascii_lowercase()))
    }

    /// Identifier under which the message is submitted to the index.
    pub fn document_id(&self, uid_validity: u32) -> String {
        match self.message_id_key() {
            Some(key) => key,
            None => Self::uid_key(uid_validity, self.uid),
        }
    }
}
