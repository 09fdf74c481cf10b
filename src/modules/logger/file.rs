// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::logger::{validate_log_level, LocalTimer};
use crate::modules::settings::cli::SETTINGS;
use crate::modules::settings::dir::DATA_DIR_MANAGER;
use std::sync::OnceLock;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Layer;

pub static LOG_WORKER_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

pub fn setup_file_logger() -> Result<(), tracing::dispatcher::SetGlobalDefaultError> {
    let level = validate_log_level(&SETTINGS.mailsift_log_level);

    let writer = match sync_log_writer() {
        Some((writer, guard)) => {
            let _ = LOG_WORKER_GUARD.set(guard);
            writer
        }
        None => {
            // Fall back to stdout rather than losing every log line.
            let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
            let _ = LOG_WORKER_GUARD.set(guard);
            writer
        }
    };

    let layer = fmt::layer()
        .with_timer(LocalTimer)
        .with_ansi(false)
        .with_level(true)
        .with_writer(writer)
        .with_target(true);

    let layer = if SETTINGS.mailsift_json_logs {
        layer.json().boxed()
    } else {
        layer.boxed()
    };

    let subscriber = tracing_subscriber::registry()
        .with(LevelFilter::from_level(level))
        .with(layer);

    tracing::subscriber::set_global_default(subscriber)
}

fn sync_log_writer() -> Option<(NonBlocking, WorkerGuard)> {
    let rolling = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("mailsift")
        .max_log_files(SETTINGS.mailsift_max_server_log_files)
        .build(DATA_DIR_MANAGER.log_dir.clone());
    match rolling {
        Ok(rolling) => Some(tracing_appender::non_blocking(rolling)),
        Err(e) => {
            eprintln!("failed to initialize rolling file appender: {}", e);
            None
        }
    }
}
