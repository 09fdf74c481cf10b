// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::modules::error::code::ErrorCode;
use crate::modules::error::{MailSiftError, MailSiftResult};
use crate::modules::sink::IndexingSink;
use crate::modules::sync::orchestrator::SyncOrchestrator;
use crate::modules::sync::stats::SyncStatistics;
use crate::modules::sync::MessageFetcher;
use crate::modules::utils::shutdown::{Shutdown, ShutdownTrigger};
use crate::modules::watcher::{MailboxConnector, WatcherState};
use crate::raise_error;

struct RunningEngine {
    trigger: ShutdownTrigger,
    handle: JoinHandle<MailSiftResult<()>>,
}

impl RunningEngine {
    fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

/// Lifecycle handle around an orchestrator running in the background.
pub struct SyncController<C: MailboxConnector, F: MessageFetcher, S: IndexingSink> {
    orchestrator: Arc<Mutex<SyncOrchestrator<C, F, S>>>,
    statistics: watch::Receiver<SyncStatistics>,
    watcher_state: watch::Receiver<WatcherState>,
    running: Mutex<Option<RunningEngine>>,
    /// Error the last background run ended with, if it ended on its own.
    failure: watch::Sender<Option<(ErrorCode, String)>>,
}

impl<C, F, S> SyncController<C, F, S>
where
    C: MailboxConnector,
    F: MessageFetcher,
    S: IndexingSink,
{
    pub fn new(orchestrator: SyncOrchestrator<C, F, S>) -> Self {
        let statistics = orchestrator.subscribe();
        let watcher_state = orchestrator.watcher_state();
        Self {
            orchestrator: Arc::new(Mutex::new(orchestrator)),
            statistics,
            watcher_state,
            running: Mutex::new(None),
            failure: watch::Sender::new(None),
        }
    }

    /// Starts watching in a background task.
    pub async fn start(&self) -> MailSiftResult<()> {
        let mut running = self.running.lock().await;
        if running.as_ref().is_some_and(RunningEngine::is_running) {
            return Err(raise_error!(
                "Sync engine is already running".into(),
                ErrorCode::AlreadyExists
            ));
        }

        let (trigger, shutdown) = Shutdown::new();
        let orchestrator = self.orchestrator.clone();
        let failure = self.failure.clone();
        failure.send_replace(None);
        let handle = tokio::spawn(async move {
            let mut orchestrator = orchestrator.lock().await;
            let result = orchestrator.run_forever(shutdown).await;
            match &result {
                Ok(()) => info!("Sync engine stopped"),
                Err(e) => {
                    error!("Sync engine terminated: {:#?}", e);
                    failure.send_replace(Some((e.code(), e.message().to_string())));
                }
            }
            result
        });
        *running = Some(RunningEngine { trigger, handle });
        info!("Sync engine started");
        Ok(())
    }

    /// Cancels the background task and waits until it has checkpointed and exited.
    pub async fn stop(&self) -> MailSiftResult<()> {
        let Some(engine) = self.running.lock().await.take() else {
            return Ok(());
        };
        engine.trigger.cancel();
        match engine.handle.await {
            Ok(result) => result,
            Err(e) => Err(raise_error!(
                format!("Sync engine task failed: {:#?}", e),
                ErrorCode::InternalError
            )),
        }
    }

    /// Resolves with the error once a background run terminates on its own.
    pub async fn terminated(&self) -> MailSiftError {
        let mut failure = self.failure.subscribe();
        let failed = failure
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|failed| failed.clone());
        match failed {
            Some((code, message)) => raise_error!(message, code),
            None => std::future::pending().await,
        }
    }

    pub async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(RunningEngine::is_running)
    }

    /// Forgets the sync state. Only allowed while stopped.
    pub async fn reset(&self) -> MailSiftResult<()> {
        if self.is_running().await {
            return Err(raise_error!(
                "Stop the sync engine before resetting its state".into(),
                ErrorCode::MethodNotAllowed
            ));
        }
        self.orchestrator.lock().await.reset_state().await
    }

    pub async fn get_statistics(&self) -> SyncStatistics {
        let running = self.is_running().await;
        SyncStatistics {
            running,
            watcher_state: *self.watcher_state.borrow(),
            ..self.statistics.borrow().clone()
        }
    }
}
