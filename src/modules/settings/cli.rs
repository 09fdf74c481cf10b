// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::error::code::ErrorCode;
use crate::modules::error::MailSiftResult;
use crate::modules::imap::credentials::Encryption;
use crate::modules::normalize::NormalizerConfig;
use crate::modules::quality::thresholds::{QualityThresholds, RejectionOrder, ScoreWeights};
use crate::modules::sink::SinkKind;
use crate::modules::sync::SyncConfig;
use crate::modules::watcher::backoff::BackoffPolicy;
use crate::modules::watcher::WatcherConfig;
use crate::raise_error;
use clap::{builder::ValueParser, Parser};
use std::{sync::LazyLock, time::Duration};
use url::Url;

#[cfg(not(test))]
pub static SETTINGS: LazyLock<Settings> = LazyLock::new(Settings::parse);

#[cfg(test)]
pub static SETTINGS: LazyLock<Settings> = LazyLock::new(Settings::new_for_test);

#[derive(Debug, Parser)]
#[clap(
    name = "mailsift",
    about = "Keeps a content index in sync with a mailbox, admitting only messages that pass a quality gate.",
    version = env!("CARGO_PKG_VERSION")
)]
pub struct Settings {
    /// mailsift log level (default: "info")
    #[clap(
        long,
        default_value = "info",
        env,
        help = "Set the log level for mailsift"
    )]
    pub mailsift_log_level: String,

    /// Enable ANSI logs (default: true)
    #[clap(long, default_value = "true", env, help = "Enable ANSI formatted logs")]
    pub mailsift_ansi_logs: bool,

    /// Enable log file output (default: false)
    /// If false, logs will be printed to stdout
    #[clap(
        long,
        default_value = "false",
        env,
        help = "Enable log file output (otherwise logs go to stdout)"
    )]
    pub mailsift_log_to_file: bool,

    /// Enable JSON logs (default: false)
    #[clap(
        long,
        default_value = "false",
        env,
        help = "Enable JSON formatted logs"
    )]
    pub mailsift_json_logs: bool,

    /// Maximum number of log files (default: 5)
    #[clap(
        long,
        default_value = "5",
        env,
        help = "Set the maximum number of server log files"
    )]
    pub mailsift_max_server_log_files: usize,

    #[clap(
        long,
        default_value = "mailsift_data",
        env,
        help = "Directory holding the sync state database, the local index and log files"
    )]
    pub mailsift_root_dir: String,

    #[clap(
        long,
        default_value = "true",
        env,
        help = "Serve the status and control API over HTTP"
    )]
    pub mailsift_http_enabled: bool,

    /// mailsift HTTP port (default: 15830)
    #[clap(
        long,
        default_value = "15830",
        env,
        help = "Set the HTTP port for the status and control API"
    )]
    pub mailsift_http_port: u16,

    #[clap(
        long,
        env,
        default_value = "0.0.0.0",
        help = "The IPv4 address the HTTP API binds to",
        value_parser = ValueParser::new(|s: &str| {
            if s.parse::<std::net::Ipv4Addr>().is_err() {
                return Err("The bind IP address must be a valid IPv4 address.".to_string());
            }
            Ok(s.to_string())
        })
    )]
    pub mailsift_bind_ip: Option<String>,

    /// Master password for secrets stored with the `enc:` prefix
    #[clap(
        long,
        default_value = "change-this-default-password-now",
        env,
        help = "Set the encryption password used to unseal `enc:` mailbox passwords. ⚠️ Change this default in production!"
    )]
    pub mailsift_encrypt_password: String,

    #[clap(long, env, help = "IMAP server host name")]
    pub mailsift_imap_host: Option<String>,

    #[clap(long, default_value = "993", env, help = "IMAP server port")]
    pub mailsift_imap_port: u16,

    #[clap(
        long,
        default_value = "ssl",
        env,
        help = "IMAP transport security (ssl, starttls, none)"
    )]
    pub mailsift_imap_encryption: Encryption,

    #[clap(long, env, help = "IMAP login user")]
    pub mailsift_imap_user: Option<String>,

    #[clap(
        long,
        env,
        help = "IMAP login password, plain or sealed with the `enc:` prefix"
    )]
    pub mailsift_imap_password: Option<String>,

    #[clap(long, default_value = "INBOX", env, help = "Mailbox folder to watch")]
    pub mailsift_imap_folder: String,

    #[clap(
        long,
        default_value = "50",
        env,
        help = "Minimum overall quality score (0-100) for a message to be indexed",
        value_parser = parse_score
    )]
    pub mailsift_quality_threshold: f32,

    #[clap(
        long,
        default_value = "40",
        env,
        help = "Maximum marketing score (0-100) a message may have to be indexed",
        value_parser = parse_score
    )]
    pub mailsift_marketing_ceiling: f32,

    #[clap(
        long,
        default_value = "20",
        env,
        help = "Minimum cleaned body length in characters"
    )]
    pub mailsift_min_body_chars: usize,

    #[clap(
        long,
        default_value = "0.3",
        env,
        help = "Minimum language identification confidence (0-1)",
        value_parser = ValueParser::new(|s: &str| -> Result<f32, String> {
            let value = s.parse::<f32>().map_err(|_| format!("Invalid confidence: {}", s))?;
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("Confidence must be between 0 and 1, got {}", value));
            }
            Ok(value)
        })
    )]
    pub mailsift_min_language_confidence: f32,

    #[clap(
        long,
        default_value = "5000",
        env,
        help = "Maximum cleaned body length kept per message, in characters",
        value_parser = clap::value_parser!(u32).range(100..)
    )]
    pub mailsift_max_body_chars: u32,

    #[clap(
        long,
        default_value = "0.35,0.35,0.1,0.1,0.1",
        env,
        help = "Overall score weights: content ratio, readability, non-marketing, non-template, language"
    )]
    pub mailsift_score_weights: ScoreWeights,

    #[clap(
        long,
        default_value = "too_short,low_language_confidence,high_marketing,low_overall_score",
        env,
        help = "Priority order of rejection reasons when several quality gates fail"
    )]
    pub mailsift_rejection_order: RejectionOrder,

    #[clap(
        long,
        default_value = "300",
        env,
        help = "Polling interval in seconds for servers without IDLE support",
        value_parser = clap::value_parser!(u64).range(5..)
    )]
    pub mailsift_poll_interval_secs: u64,

    #[clap(
        long,
        default_value = "1500",
        env,
        help = "Maximum time in seconds to stay in IDLE before re-checking (servers drop IDLE after ~29 minutes)",
        value_parser = clap::value_parser!(u64).range(10..=1740)
    )]
    pub mailsift_idle_timeout_secs: u64,

    #[clap(
        long,
        default_value = "30",
        env,
        help = "Connection establishment timeout in seconds",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub mailsift_connect_timeout_secs: u64,

    #[clap(
        long,
        default_value = "60",
        env,
        help = "Timeout in seconds for each message fetch and listing command",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub mailsift_fetch_timeout_secs: u64,

    #[clap(
        long,
        default_value = "3",
        env,
        help = "Retries for a failing message fetch before it is recorded as failed"
    )]
    pub mailsift_max_fetch_retries: u32,

    #[clap(
        long,
        default_value = "1000",
        env,
        help = "Initial reconnect and retry backoff in milliseconds, doubled on every failure",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub mailsift_backoff_base_ms: u64,

    #[clap(
        long,
        default_value = "60",
        env,
        help = "Ceiling for the reconnect and retry backoff in seconds",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub mailsift_backoff_cap_secs: u64,

    #[clap(
        long,
        default_value = "50",
        env,
        help = "Number of message identifiers handed to the workers at once",
        value_parser = clap::value_parser!(u32).range(1..=1000)
    )]
    pub mailsift_fetch_batch_size: u32,

    #[clap(
        long,
        default_value = "4",
        env,
        help = "Number of messages fetched and scored concurrently",
        value_parser = clap::value_parser!(u16).range(1..=64)
    )]
    pub mailsift_workers: u16,

    #[clap(
        long,
        default_value = "10000",
        env,
        help = "Capacity of the recently-seen identifier set kept in the sync state",
        value_parser = clap::value_parser!(u32).range(100..)
    )]
    pub mailsift_seen_capacity: u32,

    #[clap(
        long,
        default_value = "7",
        env,
        help = "On the first sync, only messages received within this many days are processed",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub mailsift_initial_sync_days: u32,

    #[clap(
        long,
        default_value = "local",
        env,
        help = "Where accepted messages are indexed (local, http)"
    )]
    pub mailsift_sink: SinkKind,

    #[clap(
        long,
        env,
        help = "Base URL of the HTTP indexing endpoint, required when the sink is http",
        value_parser = ValueParser::new(|s: &str| -> Result<String, String> {
            Url::parse(s).map_err(|_| format!("Invalid URL for sink_url: {}", s))?;
            Ok(s.trim_end_matches('/').to_string())
        })
    )]
    pub mailsift_sink_url: Option<String>,

    #[clap(
        long,
        default_value = "false",
        env,
        help = "Drain the currently available new messages once and exit"
    )]
    pub mailsift_run_once: bool,

    #[clap(
        long,
        default_value = "false",
        env,
        help = "Clear the persisted sync state (marker, seen set, counters) and exit"
    )]
    pub mailsift_reset_state: bool,
}

fn parse_score(s: &str) -> Result<f32, String> {
    let value = s
        .parse::<f32>()
        .map_err(|_| format!("Invalid score: {}", s))?;
    if !(0.0..=100.0).contains(&value) {
        return Err(format!("Score must be between 0 and 100, got {}", value));
    }
    Ok(value)
}

impl Settings {
    /// Startup checks that clap cannot express on a single option.
    pub fn validate(&self) -> MailSiftResult<()> {
        let missing = [
            ("mailsift_imap_host", self.mailsift_imap_host.is_none()),
            ("mailsift_imap_user", self.mailsift_imap_user.is_none()),
            ("mailsift_imap_password", self.mailsift_imap_password.is_none()),
        ];
        if let Some((name, _)) = missing.iter().find(|(_, missing)| *missing) {
            return Err(raise_error!(
                format!("'{}' must be set", name),
                ErrorCode::MissingConfiguration
            ));
        }
        if self.mailsift_sink == SinkKind::Http && self.mailsift_sink_url.is_none() {
            return Err(raise_error!(
                "'mailsift_sink_url' must be set when 'mailsift_sink' is http".into(),
                ErrorCode::MissingConfiguration
            ));
        }
        if self.mailsift_backoff_base_ms > self.mailsift_backoff_cap_secs * 1000 {
            return Err(raise_error!(
                "'mailsift_backoff_base_ms' must not exceed 'mailsift_backoff_cap_secs'".into(),
                ErrorCode::InvalidParameter
            ));
        }
        Ok(())
    }

    pub fn quality_thresholds(&self) -> QualityThresholds {
        QualityThresholds {
            quality_threshold: self.mailsift_quality_threshold,
            marketing_ceiling: self.mailsift_marketing_ceiling,
            min_body_chars: self.mailsift_min_body_chars,
            min_language_confidence: self.mailsift_min_language_confidence,
            weights: self.mailsift_score_weights.clone(),
            rejection_order: self.mailsift_rejection_order.clone(),
        }
    }

    pub fn normalizer_config(&self) -> NormalizerConfig {
        NormalizerConfig {
            max_body_chars: self.mailsift_max_body_chars as usize,
            ..Default::default()
        }
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_millis(self.mailsift_backoff_base_ms),
            Duration::from_secs(self.mailsift_backoff_cap_secs),
        )
    }

    pub fn watcher_config(&self) -> WatcherConfig {
        WatcherConfig {
            poll_interval: Duration::from_secs(self.mailsift_poll_interval_secs),
            idle_timeout: Duration::from_secs(self.mailsift_idle_timeout_secs),
            connect_timeout: Duration::from_secs(self.mailsift_connect_timeout_secs),
            fetch_timeout: Duration::from_secs(self.mailsift_fetch_timeout_secs),
            backoff: self.backoff_policy(),
            batch_size: self.mailsift_fetch_batch_size as usize,
            initial_sync_days: self.mailsift_initial_sync_days,
        }
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            workers: self.mailsift_workers as usize,
            max_fetch_retries: self.mailsift_max_fetch_retries,
            retry_backoff: self.backoff_policy(),
        }
    }

    /// Key under which the sync state of the configured mailbox is stored.
    pub fn mailbox_key(&self) -> String {
        format!(
            "{}@{}/{}",
            self.mailsift_imap_user.as_deref().unwrap_or_default(),
            self.mailsift_imap_host.as_deref().unwrap_or_default(),
            self.mailsift_imap_folder
        )
    }

    #[cfg(test)]
    fn new_for_test() -> Self {
        Self {
            mailsift_log_level: "info".to_string(),
            mailsift_ansi_logs: false,
            mailsift_log_to_file: false,
            mailsift_json_logs: false,
            mailsift_max_server_log_files: 5,
            mailsift_root_dir: std::env::temp_dir()
                .join("mailsift_data")
                .to_string_lossy()
                .into_owned(),
            mailsift_http_enabled: false,
            mailsift_http_port: 15830,
            mailsift_bind_ip: Some("127.0.0.1".into()),
            mailsift_encrypt_password: "change-this-default-password-now".into(),
            mailsift_imap_host: Some("imap.example.com".into()),
            mailsift_imap_port: 993,
            mailsift_imap_encryption: Encryption::Ssl,
            mailsift_imap_user: Some("reader@example.com".into()),
            mailsift_imap_password: Some("app-password".into()),
            mailsift_imap_folder: "INBOX".into(),
            mailsift_quality_threshold: 50.0,
            mailsift_marketing_ceiling: 40.0,
            mailsift_min_body_chars: 20,
            mailsift_min_language_confidence: 0.3,
            mailsift_max_body_chars: 5000,
            mailsift_score_weights: ScoreWeights::default(),
            mailsift_rejection_order: RejectionOrder::default(),
            mailsift_poll_interval_secs: 300,
            mailsift_idle_timeout_secs: 1500,
            mailsift_connect_timeout_secs: 30,
            mailsift_fetch_timeout_secs: 60,
            mailsift_max_fetch_retries: 3,
            mailsift_backoff_base_ms: 1000,
            mailsift_backoff_cap_secs: 60,
            mailsift_fetch_batch_size: 50,
            mailsift_workers: 4,
            mailsift_seen_capacity: 10000,
            mailsift_initial_sync_days: 7,
            mailsift_sink: SinkKind::Local,
            mailsift_sink_url: None,
            mailsift_run_once: false,
            mailsift_reset_state: false,
        }
    }
}
