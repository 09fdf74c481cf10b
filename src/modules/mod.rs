// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

pub mod common;
pub mod context;
pub mod database;
pub mod error;
pub mod imap;
pub mod logger;
pub mod message;
pub mod normalize;
pub mod quality;
pub mod rest;
pub mod settings;
pub mod sink;
pub mod state;
pub mod sync;
pub mod utils;
pub mod watcher;
