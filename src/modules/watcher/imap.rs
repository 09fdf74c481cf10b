// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::time::Duration;

use async_imap::extensions::idle::IdleResponse;
use tracing::{debug, warn};

use crate::modules::error::code::ErrorCode;
use crate::modules::error::{MailSiftError, MailSiftResult};
use crate::modules::imap::capabilities::supports_idle;
use crate::modules::imap::client::classify_imap_error;
use crate::modules::imap::manager::ImapConnectionManager;
use crate::modules::imap::session::ImapSession;
use crate::modules::watcher::{Activity, MailboxConnector, MailboxSession, SearchQuery};
use crate::raise_error;

/// Opens the watcher's own IMAP connection, separate from the fetch pool.
pub struct ImapMailboxConnector {
    manager: ImapConnectionManager,
}

impl ImapMailboxConnector {
    pub fn new(manager: ImapConnectionManager) -> Self {
        Self { manager }
    }
}

impl MailboxConnector for ImapMailboxConnector {
    type Session = ImapMailboxSession;

    async fn connect(&self) -> MailSiftResult<Self::Session> {
        let (session, capabilities) = self.manager.connect().await?;
        Ok(ImapMailboxSession {
            session: Some(session),
            folder: self.manager.folder().to_string(),
            idle: supports_idle(&capabilities),
        })
    }
}

pub struct ImapMailboxSession {
    /// Empty while an IDLE command owns the connection, or after it was lost mid-IDLE.
    session: Option<ImapSession>,
    folder: String,
    idle: bool,
}

fn session_lost() -> MailSiftError {
    raise_error!(
        "IMAP session was lost during IDLE".into(),
        ErrorCode::NetworkError
    )
}

impl ImapMailboxSession {
    fn session(&mut self) -> MailSiftResult<&mut ImapSession> {
        self.session.as_mut().ok_or_else(session_lost)
    }
}

/// UID SEARCH criteria; dates use the IMAP form, e.g. `7-Mar-2025`.
fn search_command(query: &SearchQuery) -> String {
    match query {
        SearchQuery::UidAfter(marker) => format!("UID {}:*", marker.saturating_add(1)),
        SearchQuery::Since(date) => format!("SINCE {}", date.format("%-d-%b-%Y")),
    }
}

impl MailboxSession for ImapMailboxSession {
    fn supports_idle(&self) -> bool {
        self.idle
    }

    async fn refresh(&mut self) -> MailSiftResult<u32> {
        let folder = self.folder.clone();
        let mailbox = self
            .session()?
            .examine(&folder)
            .await
            .map_err(|e| classify_imap_error(e, ErrorCode::ResourceNotFound))?;
        mailbox.uid_validity.ok_or_else(|| {
            raise_error!(
                format!("Server reported no UIDVALIDITY for '{}'", folder),
                ErrorCode::ImapUnexpectedResult
            )
        })
    }

    async fn search(&mut self, query: &SearchQuery) -> MailSiftResult<Vec<u32>> {
        let command = search_command(query);
        debug!("UID SEARCH {}", command);
        let uids = self
            .session()?
            .uid_search(&command)
            .await
            .map_err(|e| classify_imap_error(e, ErrorCode::ImapCommandFailed))?;
        Ok(uids.into_iter().collect())
    }

    async fn wait_for_activity(&mut self, timeout: Duration) -> MailSiftResult<Activity> {
        let session = self.session.take().ok_or_else(session_lost)?;
        let mut idle = session.idle();
        idle.init()
            .await
            .map_err(|e| classify_imap_error(e, ErrorCode::ImapCommandFailed))?;

        let (wait, _interrupt) = idle.wait_with_timeout(timeout);
        let response = wait
            .await
            .map_err(|e| classify_imap_error(e, ErrorCode::ImapCommandFailed))?;

        let session = idle
            .done()
            .await
            .map_err(|e| classify_imap_error(e, ErrorCode::ImapCommandFailed))?;
        self.session = Some(session);

        Ok(match response {
            IdleResponse::NewData(_) => Activity::NewData,
            IdleResponse::Timeout => Activity::Timeout,
            IdleResponse::ManualInterrupt => Activity::Interrupted,
        })
    }

    async fn logout(mut self) {
        if let Some(session) = self.session.as_mut() {
            if let Err(e) = session.logout().await {
                warn!("IMAP logout failed: {:#?}", e);
            }
        }
    }
}
