// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::LazyLock;
use std::time::Instant;

use crate::modules::error::MailSiftResult;

pub mod status;

pub static START_TIME: LazyLock<Instant> = LazyLock::new(Instant::now);

pub trait Initialize {
    async fn initialize() -> MailSiftResult<()>;
}

pub fn uptime_ms() -> i64 {
    START_TIME.elapsed().as_millis() as i64
}
