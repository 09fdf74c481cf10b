// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::Arc;

use crate::modules::error::code::ErrorCode;
use crate::modules::error::MailSiftResult;
use crate::modules::imap::capabilities::{check_capabilities, fetch_capabilities};
use crate::modules::imap::client::{classify_imap_error, Client};
use crate::modules::imap::credentials::CredentialProvider;
use crate::modules::imap::session::ImapSession;
use crate::modules::utils::net::NetTimeouts;
use async_imap::types::{Capabilities, Mailbox};
use tracing::{debug, error};

/// Opens authenticated sessions on the configured folder.
pub struct ImapConnectionManager {
    provider: Arc<dyn CredentialProvider>,
    folder: String,
    timeouts: NetTimeouts,
}

impl ImapConnectionManager {
    pub fn new(provider: Arc<dyn CredentialProvider>, folder: &str, timeouts: NetTimeouts) -> Self {
        Self {
            provider,
            folder: folder.to_string(),
            timeouts,
        }
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }

    /// Connects, logs in and checks capabilities. The folder is not opened yet.
    pub async fn connect(&self) -> MailSiftResult<(ImapSession, Capabilities)> {
        let credentials = self.provider.credentials()?;

        let client = Client::connection(&credentials, self.timeouts)
            .await
            .inspect_err(|e| {
                error!(
                    "Failed to connect to IMAP server {}:{}: {:#?}",
                    credentials.host, credentials.port, e
                )
            })?;

        let mut session = client
            .login(&credentials.user, &credentials.password)
            .await
            .inspect_err(|e| {
                error!(
                    "Failed to authenticate IMAP session for {}: {:#?}",
                    credentials.user, e
                )
            })?;

        let capabilities = fetch_capabilities(&mut session).await?;
        check_capabilities(&capabilities)?;
        debug!("IMAP session for {} established", credentials.user);
        Ok((session, capabilities))
    }

    /// Opens the folder read-only; the returned status carries UIDVALIDITY.
    pub async fn examine(&self, session: &mut ImapSession) -> MailSiftResult<Mailbox> {
        session
            .examine(&self.folder)
            .await
            .map_err(|e| classify_imap_error(e, ErrorCode::ResourceNotFound))
    }

    pub async fn build(&self) -> MailSiftResult<ImapSession> {
        let (mut session, _) = self.connect().await?;
        self.examine(&mut session).await?;
        Ok(session)
    }
}
