// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

pub mod capabilities;
pub mod client;
pub mod credentials;
pub mod fetcher;
pub mod manager;
pub mod pool;
pub mod session;
