// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use native_db::Database;
use tokio::sync::Notify;

use super::controller::SyncController;
use super::orchestrator::SyncOrchestrator;
use super::stats::{DecisionKind, ReasonCount};
use super::{MessageFetcher, Pipeline, SyncConfig};
use crate::modules::database::manager::DatabaseManager;
use crate::modules::error::code::ErrorCode;
use crate::modules::error::MailSiftResult;
use crate::modules::message::RawMessage;
use crate::modules::normalize::language::LanguageIdentifier;
use crate::modules::normalize::{ContentNormalizer, NormalizerConfig};
use crate::modules::quality::thresholds::QualityThresholds;
use crate::modules::quality::{QualityScorer, RejectionReason};
use crate::modules::sink::{IndexedDocument, IndexingSink};
use crate::modules::state::store::StateStore;
use crate::modules::state::STATE_MODELS;
use crate::modules::utils::shutdown::Shutdown;
use crate::modules::watcher::backoff::BackoffPolicy;
use crate::modules::watcher::{
    Activity, MailboxConnector, MailboxSession, MailboxWatcher, SearchQuery, WatcherConfig,
    WatcherState,
};
use crate::raise_error;

const MAILBOX: &str = "reader@example.com@imap.example.com/INBOX";
const PERSONAL: &str =
    "Thank you for your inquiry; I would be happy to schedule a meeting next week.";
const PROMOTION: &str = "SHOP NOW! 50% OFF! Click: https://click.example-mail.com/ls/click?upn=9f8a7b6c5d4e3f2a1b0c9d8e7f6a5b4c3d2e1f0a Unsubscribe. (c) 2025 Co.";

/// Mailbox, fetch endpoint and index in one scripted place.
#[derive(Default)]
struct Server {
    uid_validity: u32,
    messages: BTreeMap<u32, RawMessage>,
    /// Listed, but gone when fetched.
    expunged: Vec<u32>,
    fetch_failures: HashMap<u32, ErrorCode>,
    fetches: HashMap<u32, u32>,
    sink_down: bool,
    indexed: HashMap<String, IndexedDocument>,
    /// Completed writes per document id.
    writes: HashMap<String, u32>,
    submissions: u32,
    /// Oldest UID a date-window search still returns.
    window_start: Option<u32>,
    queries: Vec<SearchQuery>,
    connect_failure: Option<ErrorCode>,
    /// Document whose submit never completes, and the signal that it began.
    held: Option<(String, Arc<Notify>)>,
}

type Shared = Arc<Mutex<Server>>;

#[derive(Clone)]
struct MockConnector(Shared);
struct MockSession(Shared);
#[derive(Clone)]
struct MockFetcher(Shared);
#[derive(Clone)]
struct MockSink(Shared);

impl MailboxConnector for MockConnector {
    type Session = MockSession;

    async fn connect(&self) -> MailSiftResult<MockSession> {
        if let Some(code) = self.0.lock().unwrap().connect_failure {
            return Err(raise_error!("login rejected".into(), code));
        }
        Ok(MockSession(self.0.clone()))
    }
}

impl MailboxSession for MockSession {
    fn supports_idle(&self) -> bool {
        false
    }

    async fn refresh(&mut self) -> MailSiftResult<u32> {
        Ok(self.0.lock().unwrap().uid_validity)
    }

    async fn search(&mut self, query: &SearchQuery) -> MailSiftResult<Vec<u32>> {
        let mut server = self.0.lock().unwrap();
        server.queries.push(query.clone());
        let mut uids: Vec<u32> = server
            .messages
            .keys()
            .copied()
            .chain(server.expunged.iter().copied())
            .collect();
        uids.sort_unstable();
        match query {
            SearchQuery::UidAfter(after) => uids.retain(|uid| uid > after),
            SearchQuery::Since(_) => {
                let start = server.window_start.unwrap_or(0);
                uids.retain(|uid| *uid >= start);
            }
        }
        Ok(uids)
    }

    async fn wait_for_activity(&mut self, _timeout: Duration) -> MailSiftResult<Activity> {
        std::future::pending().await
    }

    async fn logout(self) {}
}

impl MessageFetcher for MockFetcher {
    async fn fetch(&self, uid: u32) -> MailSiftResult<Option<RawMessage>> {
        let mut server = self.0.lock().unwrap();
        *server.fetches.entry(uid).or_default() += 1;
        if let Some(code) = server.fetch_failures.get(&uid) {
            return Err(raise_error!(format!("scripted failure for {}", uid), *code));
        }
        if server.expunged.contains(&uid) {
            return Ok(None);
        }
        Ok(server.messages.get(&uid).cloned())
    }
}

impl IndexingSink for MockSink {
    async fn submit(&self, document: IndexedDocument) -> MailSiftResult<()> {
        let held = {
            let mut server = self.0.lock().unwrap();
            server.submissions += 1;
            server
                .held
                .as_ref()
                .filter(|(id, _)| *id == document.id)
                .map(|(_, started)| started.clone())
        };
        if let Some(started) = held {
            started.notify_one();
            std::future::pending::<()>().await;
        }
        let mut server = self.0.lock().unwrap();
        if server.sink_down {
            return Err(raise_error!(
                "index offline".into(),
                ErrorCode::SinkUnavailable
            ));
        }
        *server.writes.entry(document.id.clone()).or_default() += 1;
        server.indexed.insert(document.id.clone(), document);
        Ok(())
    }
}

fn message(uid: u32, message_id: &str, body: &str) -> RawMessage {
    RawMessage {
        uid,
        message_id: Some(message_id.into()),
        plain: Some(body.into()),
        mailbox: "INBOX".into(),
        ..Default::default()
    }
}

fn pipeline() -> Pipeline {
    Pipeline::new(
        ContentNormalizer::new(
            NormalizerConfig::default(),
            Arc::new(LanguageIdentifier::new()),
        ),
        QualityScorer::new(QualityThresholds::default()).unwrap(),
    )
}

fn fast() -> SyncConfig {
    SyncConfig {
        workers: 2,
        max_fetch_retries: 2,
        retry_backoff: BackoffPolicy::new(Duration::from_millis(1), Duration::from_millis(2)),
    }
}

struct Harness {
    server: Shared,
    db: Arc<Database<'static>>,
}

impl Harness {
    fn new(messages: Vec<RawMessage>) -> Self {
        let server = Server {
            uid_validity: 7,
            messages: messages.into_iter().map(|m| (m.uid, m)).collect(),
            ..Default::default()
        };
        Self {
            server: Arc::new(Mutex::new(server)),
            db: DatabaseManager::in_memory(&STATE_MODELS).unwrap(),
        }
    }

    /// A fresh orchestrator over the same database, as after a restart.
    async fn orchestrator(
        &self,
        batch_size: usize,
    ) -> SyncOrchestrator<MockConnector, MockFetcher, MockSink> {
        let store = StateStore::load(self.db.clone(), MAILBOX, 100)
            .await
            .unwrap();
        let watcher = MailboxWatcher::new(
            MockConnector(self.server.clone()),
            WatcherConfig {
                batch_size,
                ..Default::default()
            },
        );
        SyncOrchestrator::new(
            watcher,
            MockFetcher(self.server.clone()),
            MockSink(self.server.clone()),
            pipeline(),
            store,
            fast(),
        )
    }

    fn server(&self) -> std::sync::MutexGuard<'_, Server> {
        self.server.lock().unwrap()
    }
}

#[tokio::test]
async fn test_run_once_indexes_accepted_and_records_rejected() {
    let harness = Harness::new(vec![
        message(1, "a@example.com", PERSONAL),
        message(2, "b@example.com", PROMOTION),
        message(3, "C@Example.com", PERSONAL),
    ]);
    let (_trigger, shutdown) = Shutdown::new();

    let stats = harness
        .orchestrator(50)
        .await
        .run_once(shutdown)
        .await
        .unwrap();

    assert_eq!(stats.processed, 3);
    assert_eq!(stats.accepted, 2);
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.marker, 3);
    assert_eq!(stats.uid_validity, Some(7));
    assert!(stats.last_sync_at.is_some());
    assert_eq!(stats.watcher_state, WatcherState::Disconnected);
    assert_eq!(
        stats.rejection_reasons,
        vec![ReasonCount {
            reason: RejectionReason::HighMarketing,
            count: 1
        }]
    );

    let server = harness.server();
    assert_eq!(server.indexed.len(), 2);
    assert!(server.indexed.contains_key("mid:a@example.com"));
    let document = &server.indexed["mid:c@example.com"];
    assert_eq!(document.uid, 3);
    assert!(!document.is_marketing);
}

#[tokio::test]
async fn test_repeated_sync_never_indexes_twice() {
    let harness = Harness::new(vec![
        message(1, "a@example.com", PERSONAL),
        message(2, "b@example.com", PERSONAL),
    ]);

    for _ in 0..3 {
        let (_trigger, shutdown) = Shutdown::new();
        harness
            .orchestrator(50)
            .await
            .run_once(shutdown)
            .await
            .unwrap();
    }

    let server = harness.server();
    assert_eq!(server.submissions, 2);
    assert_eq!(server.indexed.len(), 2);
    assert_eq!(server.fetches.values().sum::<u32>(), 2);
}

#[tokio::test]
async fn test_fetch_failure_does_not_block_later_messages() {
    let harness = Harness::new(vec![
        message(1, "a@example.com", PERSONAL),
        message(2, "b@example.com", PERSONAL),
        message(3, "c@example.com", PERSONAL),
    ]);
    harness
        .server()
        .fetch_failures
        .insert(2, ErrorCode::ImapCommandFailed);
    let (_trigger, shutdown) = Shutdown::new();

    let stats = harness
        .orchestrator(50)
        .await
        .run_once(shutdown)
        .await
        .unwrap();

    assert_eq!(stats.accepted, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.marker, 3);
    assert_eq!(stats.recent_failures.len(), 1);
    assert_eq!(stats.recent_failures[0].id, "uid:7:2");
    assert!(stats
        .recent_decisions
        .iter()
        .any(|d| d.uid == 2 && d.kind == DecisionKind::Failed));

    let server = harness.server();
    // first attempt plus two retries
    assert_eq!(server.fetches[&2], 3);
    assert!(server.indexed.contains_key("mid:c@example.com"));
}

#[tokio::test]
async fn test_connection_level_fetch_error_is_retried_next_cycle() {
    let harness = Harness::new(vec![message(1, "a@example.com", PERSONAL)]);
    harness
        .server()
        .fetch_failures
        .insert(1, ErrorCode::NetworkError);

    let (_trigger, shutdown) = Shutdown::new();
    let stats = harness
        .orchestrator(50)
        .await
        .run_once(shutdown)
        .await
        .unwrap();
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.deferred, 1);
    assert_eq!(stats.marker, 0);

    harness.server().fetch_failures.clear();
    let (_trigger, shutdown) = Shutdown::new();
    let stats = harness
        .orchestrator(50)
        .await
        .run_once(shutdown)
        .await
        .unwrap();
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.marker, 1);
}

#[tokio::test]
async fn test_sink_outage_holds_marker_until_submitted() {
    let harness = Harness::new(vec![
        message(1, "a@example.com", PERSONAL),
        message(2, "b@example.com", PROMOTION),
    ]);
    harness.server().sink_down = true;

    let (_trigger, shutdown) = Shutdown::new();
    let stats = harness
        .orchestrator(50)
        .await
        .run_once(shutdown)
        .await
        .unwrap();
    assert_eq!(stats.accepted, 0);
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.deferred, 1);
    assert_eq!(stats.marker, 0);

    harness.server().sink_down = false;
    let (_trigger, shutdown) = Shutdown::new();
    let stats = harness
        .orchestrator(50)
        .await
        .run_once(shutdown)
        .await
        .unwrap();
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.processed, 2);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.marker, 2);

    let server = harness.server();
    assert_eq!(server.submissions, 2);
    assert!(server.indexed.contains_key("mid:a@example.com"));
    // the rejected message was fetched only once
    assert_eq!(server.fetches[&2], 1);
}

#[tokio::test]
async fn test_redelivered_message_id_is_skipped() {
    let harness = Harness::new(vec![
        message(1, "a@example.com", PERSONAL),
        message(5, "A@example.com", PERSONAL),
    ]);
    let (_trigger, shutdown) = Shutdown::new();

    let stats = harness
        .orchestrator(1)
        .await
        .run_once(shutdown)
        .await
        .unwrap();

    assert_eq!(stats.processed, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.marker, 5);
    assert_eq!(harness.server().submissions, 1);
}

#[tokio::test]
async fn test_expunged_message_is_skipped() {
    let harness = Harness::new(vec![message(1, "a@example.com", PERSONAL)]);
    harness.server().expunged.push(4);
    let (_trigger, shutdown) = Shutdown::new();

    let stats = harness
        .orchestrator(50)
        .await
        .run_once(shutdown)
        .await
        .unwrap();

    assert_eq!(stats.processed, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.marker, 4);
}

#[tokio::test]
async fn test_uid_validity_change_does_not_reindex() {
    let harness = Harness::new(vec![
        message(1, "a@example.com", PERSONAL),
        message(2, "b@example.com", PERSONAL),
    ]);
    let (_trigger, shutdown) = Shutdown::new();
    harness
        .orchestrator(50)
        .await
        .run_once(shutdown)
        .await
        .unwrap();

    {
        let mut server = harness.server();
        server.uid_validity = 9;
        server.messages = [
            (10, message(10, "a@example.com", PERSONAL)),
            (11, message(11, "b@example.com", PERSONAL)),
        ]
        .into_iter()
        .collect();
    }

    let (_trigger, shutdown) = Shutdown::new();
    let stats = harness
        .orchestrator(50)
        .await
        .run_once(shutdown)
        .await
        .unwrap();

    assert_eq!(stats.uid_validity, Some(9));
    assert_eq!(stats.marker, 11);
    assert_eq!(stats.skipped, 2);
    assert_eq!(stats.accepted, 2);
    assert_eq!(harness.server().submissions, 2);
}

#[tokio::test]
async fn test_controller_lifecycle() {
    let harness = Harness::new(vec![message(1, "a@example.com", PERSONAL)]);
    let controller = SyncController::new(harness.orchestrator(50).await);

    controller.start().await.unwrap();
    assert_eq!(
        controller.start().await.unwrap_err().code(),
        ErrorCode::AlreadyExists
    );

    let mut stats = controller.get_statistics().await;
    for _ in 0..500 {
        if stats.watcher_state == WatcherState::Polling {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        stats = controller.get_statistics().await;
    }
    assert_eq!(stats.watcher_state, WatcherState::Polling);
    assert!(stats.running);
    assert_eq!(stats.accepted, 1);

    assert_eq!(
        controller.reset().await.unwrap_err().code(),
        ErrorCode::MethodNotAllowed
    );

    controller.stop().await.unwrap();
    let stats = controller.get_statistics().await;
    assert!(!stats.running);
    assert_eq!(stats.watcher_state, WatcherState::Disconnected);

    controller.reset().await.unwrap();
    let stats = controller.get_statistics().await;
    assert_eq!(stats.processed, 0);
    assert_eq!(stats.marker, 0);
}

#[tokio::test]
async fn test_deferred_first_uid_does_not_reach_older_mail() {
    let harness = Harness::new(vec![
        message(1, "old-1@example.com", PERSONAL),
        message(2, "old-2@example.com", PERSONAL),
        message(100, "a@example.com", PERSONAL),
        message(101, "b@example.com", PERSONAL),
    ]);
    {
        let mut server = harness.server();
        server.window_start = Some(100);
        server.fetch_failures.insert(100, ErrorCode::NetworkError);
    }

    let (_trigger, shutdown) = Shutdown::new();
    let stats = harness
        .orchestrator(50)
        .await
        .run_once(shutdown)
        .await
        .unwrap();
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.marker, 99);

    harness.server().fetch_failures.clear();
    let (_trigger, shutdown) = Shutdown::new();
    let stats = harness
        .orchestrator(50)
        .await
        .run_once(shutdown)
        .await
        .unwrap();
    assert_eq!(stats.accepted, 2);
    assert_eq!(stats.marker, 101);

    let server = harness.server();
    assert!(matches!(server.queries[0], SearchQuery::Since(_)));
    assert_eq!(server.queries.last(), Some(&SearchQuery::UidAfter(99)));
    assert!(!server.fetches.contains_key(&1));
    assert!(!server.fetches.contains_key(&2));
    assert!(!server.indexed.contains_key("mid:old-1@example.com"));
    assert!(!server.indexed.contains_key("mid:old-2@example.com"));
    assert_eq!(server.indexed.len(), 2);
}

#[tokio::test]
async fn test_connection_level_fetch_error_fails_after_repeated_deferrals() {
    let harness = Harness::new(vec![
        message(1, "a@example.com", PERSONAL),
        message(2, "b@example.com", PERSONAL),
    ]);
    harness
        .server()
        .fetch_failures
        .insert(1, ErrorCode::NetworkError);

    // max_fetch_retries is 2: two deferring cycles, then the third gives up
    for _ in 0..2 {
        let (_trigger, shutdown) = Shutdown::new();
        let stats = harness
            .orchestrator(50)
            .await
            .run_once(shutdown)
            .await
            .unwrap();
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.marker, 0);
    }

    let (_trigger, shutdown) = Shutdown::new();
    let stats = harness
        .orchestrator(50)
        .await
        .run_once(shutdown)
        .await
        .unwrap();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.marker, 2);
    assert_eq!(stats.recent_failures[0].id, "uid:7:1");

    let fetches = harness.server().fetches[&1];
    let (_trigger, shutdown) = Shutdown::new();
    harness
        .orchestrator(50)
        .await
        .run_once(shutdown)
        .await
        .unwrap();
    let server = harness.server();
    assert_eq!(server.fetches[&1], fetches);
    assert_eq!(server.fetches[&2], 1);
}

#[tokio::test]
async fn test_cancel_during_submit_resumes_without_duplicates() {
    let harness = Harness::new(vec![
        message(1, "a@example.com", PERSONAL),
        message(2, "b@example.com", PERSONAL),
        message(3, "c@example.com", PERSONAL),
    ]);
    let started = Arc::new(Notify::new());
    harness.server().held = Some(("mid:b@example.com".into(), started.clone()));

    let mut orchestrator = harness.orchestrator(50).await;
    let mut statistics = orchestrator.subscribe();
    let (trigger, shutdown) = Shutdown::new();
    let running = tokio::spawn(async move { orchestrator.run_once(shutdown).await });

    tokio::time::timeout(Duration::from_secs(5), started.notified())
        .await
        .unwrap();
    tokio::time::timeout(
        Duration::from_secs(5),
        statistics.wait_for(|s| s.accepted == 2),
    )
    .await
    .unwrap()
    .unwrap();
    trigger.cancel();
    let stats = running.await.unwrap().unwrap();
    assert_eq!(stats.marker, 1);
    assert!(!harness.server().indexed.contains_key("mid:b@example.com"));

    harness.server().held = None;
    let (_trigger, shutdown) = Shutdown::new();
    let stats = harness
        .orchestrator(50)
        .await
        .run_once(shutdown)
        .await
        .unwrap();
    assert_eq!(stats.accepted, 3);
    assert_eq!(stats.marker, 3);

    let server = harness.server();
    assert_eq!(server.fetches[&1], 1);
    assert_eq!(server.fetches[&3], 1);
    assert_eq!(server.fetches[&2], 2);
    assert_eq!(server.writes.len(), 3);
    assert!(server.writes.values().all(|writes| *writes == 1));
}

#[tokio::test]
async fn test_controller_reports_fatal_termination() {
    let harness = Harness::new(vec![message(1, "a@example.com", PERSONAL)]);
    harness.server().connect_failure = Some(ErrorCode::ImapAuthenticationFailed);
    let controller = SyncController::new(harness.orchestrator(50).await);

    controller.start().await.unwrap();
    let error = tokio::time::timeout(Duration::from_secs(5), controller.terminated())
        .await
        .unwrap();
    assert_eq!(error.code(), ErrorCode::ImapAuthenticationFailed);

    assert_eq!(
        controller.stop().await.unwrap_err().code(),
        ErrorCode::ImapAuthenticationFailed
    );
    controller.stop().await.unwrap();
    assert!(!controller.get_statistics().await.running);
}
