// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::Arc;

use ahash::AHashSet;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::modules::error::code::ErrorCode;
use crate::modules::error::{MailSiftError, MailSiftResult};
use crate::modules::message::RawMessage;
use crate::modules::normalize::NormalizedContent;
use crate::modules::quality::QualityAssessment;
use crate::modules::sink::{IndexedDocument, IndexingSink};
use crate::modules::state::store::StateStore;
use crate::modules::state::Decision;
use crate::modules::sync::progress::BatchProgress;
use crate::modules::sync::stats::{DecisionKind, DecisionRecord, StatisticsRecorder, SyncStatistics};
use crate::modules::sync::{MessageFetcher, Pipeline, SyncConfig};
use crate::modules::utils::shutdown::Shutdown;
use crate::modules::watcher::backoff::BackoffPolicy;
use crate::modules::watcher::{
    MailboxConnector, MailboxWatcher, RunMode, SyncCursor, WatchBatch, WatcherState,
};
use crate::raise_error;

/// Connection attempts of a single pass before it gives up.
pub const SINGLE_PASS_CONNECT_ATTEMPTS: u32 = 3;

struct Evaluated {
    raw: RawMessage,
    content: NormalizedContent,
    assessment: QualityAssessment,
}

/// What a worker task hands back to the orchestrator loop.
enum Step {
    Evaluated(Box<Evaluated>),
    Vanished,
    FetchFailed(MailSiftError),
    Submitted {
        ids: Vec<String>,
        document_id: String,
        assessment: QualityAssessment,
        result: MailSiftResult<()>,
    },
    Interrupted,
}

struct BatchContext {
    uid_validity: u32,
    progress: BatchProgress,
    /// Message-ID keys whose submission is still running.
    in_flight: AHashSet<String>,
    tasks: JoinSet<(u32, Step)>,
    permits: Arc<Semaphore>,
}

/// Drives the watcher and turns every listed UID into exactly one durable decision.
///
/// Workers fetch, score and submit concurrently; only this type touches the
/// [`StateStore`], and it checkpoints before acknowledging a batch to the watcher.
pub struct SyncOrchestrator<C: MailboxConnector, F: MessageFetcher, S: IndexingSink> {
    watcher: Arc<MailboxWatcher<C>>,
    fetcher: Arc<F>,
    sink: Arc<S>,
    pipeline: Arc<Pipeline>,
    store: StateStore,
    config: SyncConfig,
    recorder: StatisticsRecorder,
}

impl<C, F, S> SyncOrchestrator<C, F, S>
where
    C: MailboxConnector,
    F: MessageFetcher,
    S: IndexingSink,
{
    pub fn new(
        watcher: MailboxWatcher<C>,
        fetcher: F,
        sink: S,
        pipeline: Pipeline,
        store: StateStore,
        config: SyncConfig,
    ) -> Self {
        let recorder = StatisticsRecorder::new(store.summary());
        Self {
            watcher: Arc::new(watcher),
            fetcher: Arc::new(fetcher),
            sink: Arc::new(sink),
            pipeline: Arc::new(pipeline),
            store,
            config,
            recorder,
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncStatistics> {
        self.recorder.subscribe()
    }

    pub fn watcher_state(&self) -> watch::Receiver<WatcherState> {
        self.watcher.subscribe()
    }

    pub fn statistics(&self) -> SyncStatistics {
        SyncStatistics {
            watcher_state: *self.watcher.subscribe().borrow(),
            ..self.recorder.current()
        }
    }

    /// Drains the messages currently available and returns.
    pub async fn run_once(&mut self, shutdown: Shutdown) -> MailSiftResult<SyncStatistics> {
        self.run(
            RunMode::Once {
                max_attempts: SINGLE_PASS_CONNECT_ATTEMPTS,
            },
            shutdown,
        )
        .await?;
        Ok(self.statistics())
    }

    /// Watches the mailbox until `shutdown` fires or a fatal error occurs.
    pub async fn run_forever(&mut self, shutdown: Shutdown) -> MailSiftResult<()> {
        self.run(RunMode::Forever, shutdown).await
    }

    pub async fn reset_state(&mut self) -> MailSiftResult<()> {
        self.store.reset().await?;
        self.recorder.clear();
        self.recorder.publish(self.store.summary());
        Ok(())
    }

    fn cursor(&self) -> SyncCursor {
        SyncCursor {
            uid_validity: self.store.uid_validity(),
            marker: self.store.marker(),
            fresh: self.store.marker() == 0 && self.store.seen_len() == 0,
        }
    }

    async fn run(&mut self, mode: RunMode, shutdown: Shutdown) -> MailSiftResult<()> {
        let (cursor_tx, cursor_rx) = watch::channel(self.cursor());
        let (batch_tx, batch_rx) = mpsc::channel(1);
        // stops the watcher when processing ends first
        let (stop, stopped) = Shutdown::new();
        let watcher = self.watcher.clone();

        let watching = watcher.run(cursor_rx, batch_tx, stopped, mode);
        let consuming = async {
            let result = self.consume(batch_rx, &cursor_tx, shutdown).await;
            stop.cancel();
            result
        };
        let (watched, consumed) = tokio::join!(watching, consuming);

        if let Err(e) = &watched {
            self.recorder.note_error(e.to_string());
        }
        consumed?;
        if watched.is_ok() && matches!(mode, RunMode::Once { .. }) {
            self.store.mark_synced();
        }
        self.store.checkpoint().await?;
        self.recorder.publish(self.store.summary());
        watched
    }

    async fn consume(
        &mut self,
        mut batches: mpsc::Receiver<WatchBatch>,
        cursor: &watch::Sender<SyncCursor>,
        mut shutdown: Shutdown,
    ) -> MailSiftResult<()> {
        loop {
            let batch = tokio::select! {
                batch = batches.recv() => batch,
                _ = shutdown.cancelled() => None,
            };
            let Some(batch) = batch else {
                return Ok(());
            };

            let completed = self
                .process_batch(batch.uid_validity, &batch.uids, batch.floor, &shutdown)
                .await?;
            if completed {
                self.store.mark_synced();
            }
            self.store.checkpoint().await?;
            self.recorder.publish(self.store.summary());
            cursor.send_replace(self.cursor());

            if !completed {
                return Ok(());
            }
            let _ = batch.ack.send(());
        }
    }

    /// Returns `false` when cancelled before every UID was handled.
    async fn process_batch(
        &mut self,
        uid_validity: u32,
        uids: &[u32],
        floor: Option<u32>,
        shutdown: &Shutdown,
    ) -> MailSiftResult<bool> {
        info!(
            "Processing {} message(s) of UIDVALIDITY {}",
            uids.len(),
            uid_validity
        );
        self.store.rebase(uid_validity);
        if let Some(floor) = floor {
            // older mail stays out of reach even if the first UIDs are deferred
            self.store.advance(floor);
            self.store.checkpoint().await?;
        }
        let mut batch = BatchContext {
            uid_validity,
            progress: BatchProgress::new(uids),
            in_flight: AHashSet::new(),
            tasks: JoinSet::new(),
            permits: Arc::new(Semaphore::new(self.config.workers.max(1))),
        };

        for &uid in uids {
            let key = RawMessage::uid_key(uid_validity, uid);
            if self.store.has_seen(&key) {
                debug!("UID {} already handled, skipping", uid);
                let record = DecisionRecord::new(&key, uid, DecisionKind::Skipped);
                self.settle(&mut batch, uid, &[key], Decision::Skipped, record);
                continue;
            }
            self.spawn_fetch(&mut batch, uid, shutdown.clone());
        }

        let mut shutdown = shutdown.clone();
        loop {
            let joined = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    batch.tasks.shutdown().await;
                    info!("Batch interrupted, unfinished messages are left for the next run");
                    return Ok(false);
                }
                joined = batch.tasks.join_next() => joined,
            };
            let Some(joined) = joined else {
                break;
            };
            let (uid, step) = joined.map_err(|e| {
                raise_error!(
                    format!("Sync worker failed: {:#?}", e),
                    ErrorCode::InternalError
                )
            })?;
            self.handle(&mut batch, uid, step);
            self.store.checkpoint().await?;
            self.recorder.publish(self.store.summary());
        }
        Ok(true)
    }

    fn spawn_fetch(&self, batch: &mut BatchContext, uid: u32, shutdown: Shutdown) {
        let fetcher = self.fetcher.clone();
        let pipeline = self.pipeline.clone();
        let permits = batch.permits.clone();
        let retries = self.config.max_fetch_retries;
        let backoff = self.config.retry_backoff;
        batch.tasks.spawn(async move {
            let step = fetch_step(fetcher, pipeline, permits, uid, retries, backoff, shutdown).await;
            (uid, step)
        });
    }

    fn spawn_submit(
        &self,
        batch: &mut BatchContext,
        uid: u32,
        ids: Vec<String>,
        document: IndexedDocument,
        assessment: QualityAssessment,
    ) {
        let sink = self.sink.clone();
        let permits = batch.permits.clone();
        batch.tasks.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return (uid, Step::Interrupted);
            };
            let document_id = document.id.clone();
            let result = sink.submit(document).await;
            (
                uid,
                Step::Submitted {
                    ids,
                    document_id,
                    assessment,
                    result,
                },
            )
        });
    }

    fn handle(&mut self, batch: &mut BatchContext, uid: u32, step: Step) {
        let uid_key = RawMessage::uid_key(batch.uid_validity, uid);
        match step {
            Step::Evaluated(evaluated) => self.handle_evaluated(batch, uid, uid_key, *evaluated),
            Step::Vanished => {
                debug!("UID {} vanished before it was fetched", uid);
                let record = DecisionRecord::new(&uid_key, uid, DecisionKind::Skipped);
                self.settle(batch, uid, &[uid_key], Decision::Skipped, record);
            }
            Step::FetchFailed(error) if error.code().is_connection_level() => {
                let deferrals = self.store.note_deferral(&uid_key);
                if deferrals > self.config.max_fetch_retries {
                    self.fail(batch, uid, uid_key, &error);
                } else {
                    self.defer(uid, &uid_key, error.to_string());
                }
            }
            Step::FetchFailed(error) => self.fail(batch, uid, uid_key, &error),
            Step::Submitted {
                ids,
                document_id,
                assessment,
                result,
            } => {
                for id in &ids {
                    batch.in_flight.remove(id);
                }
                match result {
                    Ok(()) => {
                        info!(
                            "Indexed UID {} as '{}' (overall {:.1})",
                            uid, document_id, assessment.overall_score
                        );
                        let record = DecisionRecord::new(&document_id, uid, DecisionKind::Accepted)
                            .scored(assessment.overall_score, None);
                        self.settle(batch, uid, &ids, Decision::Accepted, record);
                    }
                    Err(error) => self.defer(uid, &document_id, error.to_string()),
                }
            }
            Step::Interrupted => debug!("UID {} was interrupted", uid),
        }
    }

    fn handle_evaluated(
        &mut self,
        batch: &mut BatchContext,
        uid: u32,
        uid_key: String,
        evaluated: Evaluated,
    ) {
        let Evaluated {
            raw,
            content,
            assessment,
        } = evaluated;

        let mut ids = vec![uid_key];
        let message_key = raw.message_id_key();
        if let Some(key) = &message_key {
            if batch.in_flight.contains(key) {
                // decided once the first copy settles
                self.defer(uid, key, format!("{} is being indexed under another UID", key));
                return;
            }
            ids.push(key.clone());
            if self.store.has_seen(key) {
                debug!("UID {} is a copy of {}, skipping", uid, key);
                let record = DecisionRecord::new(key, uid, DecisionKind::Skipped);
                self.settle(batch, uid, &ids, Decision::Skipped, record);
                return;
            }
        }

        let document_id = raw.document_id(batch.uid_validity);
        if !assessment.accepted {
            debug!(
                "UID {} rejected: {:?} (overall {:.1}, marketing {:.1})",
                uid, assessment.rejection_reason, assessment.overall_score, assessment.marketing_score
            );
            let record = DecisionRecord::new(&document_id, uid, DecisionKind::Rejected)
                .scored(assessment.overall_score, assessment.rejection_reason);
            self.settle(batch, uid, &ids, Decision::Rejected, record);
            return;
        }

        if let Some(key) = message_key {
            batch.in_flight.insert(key);
        }
        let document = IndexedDocument::new(&document_id, &raw, &content, &assessment);
        self.spawn_submit(batch, uid, ids, document, assessment);
    }

    fn watermark(&self, batch: &mut BatchContext, uid: u32) -> u32 {
        batch
            .progress
            .resolve(uid)
            .unwrap_or_else(|| self.store.marker())
    }

    fn settle(
        &mut self,
        batch: &mut BatchContext,
        uid: u32,
        ids: &[String],
        decision: Decision,
        record: DecisionRecord,
    ) {
        let marker = self.watermark(batch, uid);
        self.store.record(ids, marker, decision);
        self.recorder.note(record);
    }

    fn fail(&mut self, batch: &mut BatchContext, uid: u32, uid_key: String, error: &MailSiftError) {
        warn!("Giving up on UID {}: {}", uid, error);
        let marker = self.watermark(batch, uid);
        self.store
            .record_failure(&[uid_key.clone()], marker, error.message());
        self.recorder
            .note(DecisionRecord::new(&uid_key, uid, DecisionKind::Failed));
        self.recorder.note_error(format!("UID {}: {}", uid, error));
    }

    /// Leaves the UID unrecorded; the marker stays below it until a later cycle settles it.
    fn defer(&mut self, uid: u32, id: &str, reason: String) {
        warn!("Deferring UID {} to the next cycle: {}", uid, reason);
        self.recorder
            .note(DecisionRecord::new(id, uid, DecisionKind::Deferred));
        self.recorder.note_error(format!("UID {}: {}", uid, reason));
    }
}

async fn fetch_step<F: MessageFetcher>(
    fetcher: Arc<F>,
    pipeline: Arc<Pipeline>,
    permits: Arc<Semaphore>,
    uid: u32,
    retries: u32,
    backoff: BackoffPolicy,
    mut shutdown: Shutdown,
) -> Step {
    let Ok(_permit) = permits.acquire_owned().await else {
        return Step::Interrupted;
    };

    let mut attempt = 0;
    let raw = loop {
        match fetcher.fetch(uid).await {
            Ok(Some(raw)) => break raw,
            Ok(None) => return Step::Vanished,
            Err(e) if attempt < retries && e.code().is_transient() => {
                let delay = backoff.delay(attempt);
                attempt += 1;
                warn!(
                    "Fetching UID {} failed ({}), retry {}/{} in {:?}",
                    uid, e, attempt, retries, delay
                );
                if !shutdown.sleep(delay).await {
                    return Step::Interrupted;
                }
            }
            Err(e) => return Step::FetchFailed(e),
        }
    };

    let (content, assessment) = pipeline.evaluate(&raw);
    Step::Evaluated(Box::new(Evaluated {
        raw,
        content,
        assessment,
    }))
}
