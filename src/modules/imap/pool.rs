// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::error::{MailSiftError, MailSiftResult};
use crate::modules::imap::client::classify_imap_error;
use crate::modules::imap::{manager::ImapConnectionManager, session::ImapSession};
use crate::modules::error::code::ErrorCode;
use bb8::Pool;
use std::time::Duration;

impl bb8::ManageConnection for ImapConnectionManager {
    type Connection = ImapSession;

    type Error = MailSiftError;

    async fn connect(&self) -> MailSiftResult<Self::Connection> {
        self.build().await
    }
    // call this function before using the connection
    async fn is_valid(&self, conn: &mut Self::Connection) -> MailSiftResult<()> {
        conn.noop()
            .await
            .map_err(|e| classify_imap_error(e, ErrorCode::ImapCommandFailed))
    }

    fn has_broken(&self, _: &mut Self::Connection) -> bool {
        false
    }
}

/// Pool of fetch sessions, separate from the watcher's own session.
pub async fn build_imap_pool(
    manager: ImapConnectionManager,
    max_size: u32,
    connection_timeout: Duration,
) -> MailSiftResult<Pool<ImapConnectionManager>> {
    let pool = Pool::builder()
        .connection_timeout(connection_timeout)
        .idle_timeout(Duration::from_secs(120))
        .retry_connection(true)
        .max_size(max_size.max(1))
        .test_on_check_out(true)
        .build(manager)
        .await?;

    Ok(pool)
}
