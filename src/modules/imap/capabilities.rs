// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::error::code::ErrorCode;
use crate::modules::imap::session::ImapSession;
use crate::{modules::error::MailSiftResult, raise_error};
use async_imap::types::Capabilities;

pub async fn fetch_capabilities(session: &mut ImapSession) -> MailSiftResult<Capabilities> {
    session
        .capabilities()
        .await
        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::ImapCommandFailed))
}

pub fn check_capabilities(capabilities: &Capabilities) -> MailSiftResult<()> {
    if !capabilities.has_str("IMAP4rev1") {
        return Err(raise_error!(
            "Server does not support IMAP4rev1".into(),
            ErrorCode::Incompatible
        ));
    }
    Ok(())
}

/// Whether the server can push new-message notifications (RFC 2177).
pub fn supports_idle(capabilities: &Capabilities) -> bool {
    capabilities.has_str("IDLE")
}
