// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::time::Duration;

use async_imap::types::Fetch;
use bb8::Pool;
use futures::TryStreamExt;
use tracing::debug;

use crate::modules::error::code::ErrorCode;
use crate::modules::error::MailSiftResult;
use crate::modules::imap::client::classify_imap_error;
use crate::modules::imap::manager::ImapConnectionManager;
use crate::modules::message::RawMessage;
use crate::modules::sync::MessageFetcher;
use crate::{raise_error, run_with_timeout};

/// Full RFC 822 source without setting `\Seen`.
const FULL_MESSAGE_QUERY: &str = "(UID INTERNALDATE BODY.PEEK[])";

/// Fetches message bodies over pooled IMAP sessions.
pub struct ImapMessageFetcher {
    pool: Pool<ImapConnectionManager>,
    folder: String,
    fetch_timeout: Duration,
}

impl ImapMessageFetcher {
    pub fn new(pool: Pool<ImapConnectionManager>, folder: &str, fetch_timeout: Duration) -> Self {
        Self {
            pool,
            folder: folder.to_string(),
            fetch_timeout,
        }
    }

    async fn uid_fetch_full_message(&self, uid: u32) -> MailSiftResult<Option<Fetch>> {
        let mut session = self.pool.get().await?;
        let fetches: Vec<Fetch> = session
            .uid_fetch(uid.to_string(), FULL_MESSAGE_QUERY)
            .await
            .map_err(|e| classify_imap_error(e, ErrorCode::ImapCommandFailed))?
            .try_collect()
            .await
            .map_err(|e| classify_imap_error(e, ErrorCode::ImapCommandFailed))?;
        // unsolicited FETCH responses for other messages may be interleaved
        Ok(fetches.into_iter().find(|f| f.uid == Some(uid)))
    }
}

impl MessageFetcher for ImapMessageFetcher {
    async fn fetch(&self, uid: u32) -> MailSiftResult<Option<RawMessage>> {
        let fetched = run_with_timeout!(
            self.fetch_timeout,
            self.uid_fetch_full_message(uid),
            raise_error!(
                format!(
                    "Fetching UID {} timed out after {}s",
                    uid,
                    self.fetch_timeout.as_secs()
                ),
                ErrorCode::ConnectionTimeout
            )
        )??;

        let Some(fetch) = fetched else {
            debug!("UID {} vanished before it could be fetched", uid);
            return Ok(None);
        };
        let body = fetch.body().ok_or_else(|| {
            raise_error!(
                format!("Server returned no body for UID {}", uid),
                ErrorCode::ImapUnexpectedResult
            )
        })?;
        let arrival = fetch.internal_date().map(|d| d.timestamp_millis());
        Ok(Some(RawMessage::parse(uid, &self.folder, body, arrival)))
    }
}
