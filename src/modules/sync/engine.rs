// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::{Arc, OnceLock};

use tracing::info;

use crate::modules::context::Initialize;
use crate::modules::database::manager::DatabaseManager;
use crate::modules::error::code::ErrorCode;
use crate::modules::error::MailSiftResult;
use crate::modules::imap::credentials::{CredentialProvider, SettingsCredentialProvider};
use crate::modules::imap::fetcher::ImapMessageFetcher;
use crate::modules::imap::manager::ImapConnectionManager;
use crate::modules::imap::pool::build_imap_pool;
use crate::modules::normalize::language::LanguageIdentifier;
use crate::modules::normalize::ContentNormalizer;
use crate::modules::quality::QualityScorer;
use crate::modules::settings::cli::{Settings, SETTINGS};
use crate::modules::sink::http::HttpSink;
use crate::modules::sink::local::LocalIndexSink;
use crate::modules::sink::{ConfiguredSink, SinkKind};
use crate::modules::state::store::StateStore;
use crate::modules::sync::controller::SyncController;
use crate::modules::sync::orchestrator::SyncOrchestrator;
use crate::modules::sync::Pipeline;
use crate::modules::utils::net::NetTimeouts;
use crate::modules::watcher::imap::ImapMailboxConnector;
use crate::modules::watcher::MailboxWatcher;
use crate::raise_error;

pub type ImapSyncOrchestrator =
    SyncOrchestrator<ImapMailboxConnector, ImapMessageFetcher, ConfiguredSink>;
pub type EngineController = SyncController<ImapMailboxConnector, ImapMessageFetcher, ConfiguredSink>;

static ENGINE: OnceLock<EngineController> = OnceLock::new();

pub struct SyncEngine;

impl SyncEngine {
    pub fn get() -> MailSiftResult<&'static EngineController> {
        ENGINE.get().ok_or_else(|| {
            raise_error!(
                "Sync engine used before initialization".into(),
                ErrorCode::InternalError
            )
        })
    }
}

impl Initialize for SyncEngine {
    async fn initialize() -> MailSiftResult<()> {
        let orchestrator = build_orchestrator(&SETTINGS).await?;
        let _ = ENGINE.set(SyncController::new(orchestrator));
        Ok(())
    }
}

/// Wires the IMAP watcher, the fetch pool, the configured sink and the state store.
pub async fn build_orchestrator(settings: &Settings) -> MailSiftResult<ImapSyncOrchestrator> {
    let watcher_config = settings.watcher_config();
    let provider: Arc<dyn CredentialProvider> = Arc::new(SettingsCredentialProvider::new(settings));
    let folder = settings.mailsift_imap_folder.as_str();

    // the watcher's socket stays silent for a whole IDLE wait
    let watcher_manager = ImapConnectionManager::new(
        provider.clone(),
        folder,
        NetTimeouts {
            connect: watcher_config.connect_timeout,
            io: watcher_config.idle_timeout + watcher_config.fetch_timeout,
        },
    );
    let fetch_manager = ImapConnectionManager::new(
        provider,
        folder,
        NetTimeouts {
            connect: watcher_config.connect_timeout,
            io: watcher_config.fetch_timeout,
        },
    );

    let sync_config = settings.sync_config();
    let pool = build_imap_pool(
        fetch_manager,
        sync_config.workers as u32,
        watcher_config.connect_timeout,
    )
    .await?;
    let fetcher = ImapMessageFetcher::new(pool, folder, watcher_config.fetch_timeout);

    let databases = DatabaseManager::get()?;
    let sink = match settings.mailsift_sink {
        SinkKind::Local => ConfiguredSink::Local(LocalIndexSink::new(databases.index_db().clone())),
        SinkKind::Http => {
            let url = settings.mailsift_sink_url.as_deref().ok_or_else(|| {
                raise_error!(
                    "'mailsift_sink_url' must be set when 'mailsift_sink' is http".into(),
                    ErrorCode::MissingConfiguration
                )
            })?;
            ConfiguredSink::Http(HttpSink::new(url, watcher_config.fetch_timeout)?)
        }
    };

    let pipeline = Pipeline::new(
        ContentNormalizer::new(settings.normalizer_config(), Arc::new(LanguageIdentifier::new())),
        QualityScorer::new(settings.quality_thresholds())?,
    );

    let store = StateStore::load(
        databases.state_db().clone(),
        &settings.mailbox_key(),
        settings.mailsift_seen_capacity as usize,
    )
    .await?;

    info!(
        "Sync engine for '{}' uses the {:?} sink with {} worker(s)",
        store.mailbox(),
        settings.mailsift_sink,
        sync_config.workers
    );

    let watcher = MailboxWatcher::new(ImapMailboxConnector::new(watcher_manager), watcher_config);
    Ok(SyncOrchestrator::new(
        watcher,
        fetcher,
        sink,
        pipeline,
        store,
        sync_config,
    ))
}
