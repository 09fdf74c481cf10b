// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::LazyLock;

use native_db::*;
use native_model::{native_model, Model};
use poem_openapi::Object;
use serde::{Deserialize, Serialize};

use crate::modules::database::ModelsAdapter;

pub mod seen;
pub mod store;

#[cfg(test)]
mod tests;

pub static STATE_MODELS: LazyLock<Models> = LazyLock::new(|| {
    let mut adapter = ModelsAdapter::new();
    adapter.register_model::<SyncState>();
    adapter.models
});

/// Failed identifiers kept per mailbox.
pub const RECENT_FAILURES_CAP: usize = 20;

/// UIDs with outstanding connection-level fetch failures kept per mailbox.
pub const PENDING_FETCHES_CAP: usize = 1000;

/// Durable synchronization record of one mailbox, rewritten as a whole on checkpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, Object)]
#[native_model(id = 1, version = 1)]
#[native_db]
pub struct SyncState {
    /// `<user>@<host>/<folder>`
    #[primary_key]
    pub mailbox: String,
    /// UIDVALIDITY the marker belongs to.
    pub uid_validity: Option<u32>,
    /// Highest UID below which every message has been durably handled.
    pub marker: u32,
    /// Recently seen identifiers, oldest first.
    pub seen: Vec<String>,
    pub processed: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub failed: u64,
    pub recent_failures: Vec<FailedMessage>,
    /// Messages whose fetch was cut short by a broken connection, not yet decided.
    pub pending_fetches: Vec<PendingFetch>,
    /// Milliseconds since epoch of the last completed drain pass.
    pub last_sync_at: Option<i64>,
    pub updated_at: i64,
}

impl SyncState {
    pub fn new(mailbox: &str) -> Self {
        Self {
            mailbox: mailbox.into(),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, Object)]
pub struct FailedMessage {
    pub id: String,
    pub error: String,
    pub failed_at: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, Object)]
pub struct PendingFetch {
    pub id: String,
    /// Cycles in which every fetch attempt failed at the connection level.
    pub deferrals: u32,
}

/// Final decision recorded for a handled message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Accepted,
    Rejected,
    /// Known under another identifier or expunged before it was fetched.
    /// Only the identifiers are remembered.
    Skipped,
}
