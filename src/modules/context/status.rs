// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::context::uptime_ms;
use crate::mailsift_version;
use chrono::Local;
use poem_openapi::Object;
use serde::Deserialize;
use serde::Serialize;
use std::time::Duration;
use timeago::Formatter;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Object)]
pub struct MailSiftStatus {
    /// The service uptime in milliseconds since it started.
    pub uptime_ms: i64,
    /// A human-readable string indicating the time elapsed since the service started (e.g., "2 hours ago").
    pub timeago: String,
    /// The timezone offset the service is operating in (e.g., "+08:00").
    pub timezone: String,
    /// The version of the mailsift service currently running.
    pub version: String,
    /// Short git hash of the build.
    pub git_hash: String,
}

impl MailSiftStatus {
    pub fn get() -> Self {
        let uptime_ms = uptime_ms();
        Self {
            uptime_ms,
            timeago: Formatter::new().convert(Duration::from_millis(uptime_ms as u64)),
            timezone: Local::now().offset().to_string(),
            version: mailsift_version!().into(),
            git_hash: env!("GIT_HASH").into(),
        }
    }
}
