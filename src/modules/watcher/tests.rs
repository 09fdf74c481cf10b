// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::{
    Activity, MailboxConnector, MailboxSession, MailboxWatcher, RunMode, SearchQuery, SyncCursor,
    WatchBatch, WatcherConfig, WatcherState,
};
use crate::modules::error::code::ErrorCode;
use crate::modules::error::MailSiftResult;
use crate::modules::utils::shutdown::Shutdown;
use crate::raise_error;

#[derive(Default)]
struct Mailbox {
    uid_validity: u32,
    uids: Vec<u32>,
    idle: bool,
    connect_failures: VecDeque<ErrorCode>,
    activities: VecDeque<MailSiftResult<Activity>>,
    connects: u32,
    searches: Vec<SearchQuery>,
}

#[derive(Clone)]
struct MockConnector(Arc<Mutex<Mailbox>>);

struct MockSession(Arc<Mutex<Mailbox>>);

impl MailboxConnector for MockConnector {
    type Session = MockSession;

    async fn connect(&self) -> MailSiftResult<MockSession> {
        let mut mailbox = self.0.lock().unwrap();
        mailbox.connects += 1;
        if let Some(code) = mailbox.connect_failures.pop_front() {
            return Err(raise_error!("scripted connect failure".into(), code));
        }
        Ok(MockSession(self.0.clone()))
    }
}

impl MailboxSession for MockSession {
    fn supports_idle(&self) -> bool {
        self.0.lock().unwrap().idle
    }

    async fn refresh(&mut self) -> MailSiftResult<u32> {
        Ok(self.0.lock().unwrap().uid_validity)
    }

    async fn search(&mut self, query: &SearchQuery) -> MailSiftResult<Vec<u32>> {
        let mut mailbox = self.0.lock().unwrap();
        mailbox.searches.push(query.clone());
        let uids = match query {
            SearchQuery::Since(_) => mailbox.uids.clone(),
            SearchQuery::UidAfter(after) => {
                let newer: Vec<u32> = mailbox.uids.iter().copied().filter(|u| u > after).collect();
                // servers answer `n:*` with the last message when nothing is newer
                if newer.is_empty() {
                    mailbox.uids.iter().copied().max().into_iter().collect()
                } else {
                    newer
                }
            }
        };
        Ok(uids)
    }

    async fn wait_for_activity(&mut self, _timeout: Duration) -> MailSiftResult<Activity> {
        let next = self.0.lock().unwrap().activities.pop_front();
        match next {
            Some(activity) => activity,
            None => std::future::pending().await,
        }
    }

    async fn logout(self) {}
}

fn mailbox(uids: &[u32], idle: bool) -> Arc<Mutex<Mailbox>> {
    Arc::new(Mutex::new(Mailbox {
        uid_validity: 7,
        uids: uids.to_vec(),
        idle,
        ..Default::default()
    }))
}

/// Stands in for the orchestrator: acknowledges every batch and advances the cursor.
fn consume(
    cursor: watch::Sender<SyncCursor>,
    mut batches: mpsc::Receiver<WatchBatch>,
) -> JoinHandle<Vec<(u32, Vec<u32>)>> {
    tokio::spawn(async move {
        let mut received = Vec::new();
        while let Some(batch) = batches.recv().await {
            let last = batch.uids.last().copied().unwrap_or_default();
            cursor.send_modify(|c| {
                if c.uid_validity != Some(batch.uid_validity) {
                    c.uid_validity = Some(batch.uid_validity);
                    c.marker = 0;
                }
                c.marker = c.marker.max(last);
                c.fresh = false;
            });
            received.push((batch.uid_validity, batch.uids));
            let _ = batch.ack.send(());
        }
        received
    })
}

fn cursor(uid_validity: Option<u32>, marker: u32, fresh: bool) -> SyncCursor {
    SyncCursor {
        uid_validity,
        marker,
        fresh,
    }
}

const ONCE: RunMode = RunMode::Once { max_attempts: 5 };

#[tokio::test]
async fn test_catch_up_is_split_into_batches() {
    let mailbox = mailbox(&[1, 2, 3, 4, 5], false);
    let watcher = MailboxWatcher::new(
        MockConnector(mailbox.clone()),
        WatcherConfig {
            batch_size: 2,
            ..Default::default()
        },
    );
    let (cursor_tx, cursor_rx) = watch::channel(cursor(Some(7), 0, false));
    let (batch_tx, batch_rx) = mpsc::channel(1);
    let consumer = consume(cursor_tx, batch_rx);
    let (_trigger, shutdown) = Shutdown::new();

    watcher.run(cursor_rx, batch_tx, shutdown, ONCE).await.unwrap();

    let received = consumer.await.unwrap();
    assert_eq!(
        received,
        vec![(7, vec![1, 2]), (7, vec![3, 4]), (7, vec![5])]
    );
    assert_eq!(*watcher.subscribe().borrow(), WatcherState::Disconnected);
}

#[tokio::test]
async fn test_first_listing_is_limited_by_date() {
    let mailbox = mailbox(&[3, 9], false);
    let watcher = MailboxWatcher::new(MockConnector(mailbox.clone()), WatcherConfig::default());
    let (cursor_tx, cursor_rx) = watch::channel(cursor(None, 0, true));
    let (batch_tx, batch_rx) = mpsc::channel(1);
    let consumer = consume(cursor_tx, batch_rx);
    let (_trigger, shutdown) = Shutdown::new();

    watcher.run(cursor_rx, batch_tx, shutdown, ONCE).await.unwrap();

    assert_eq!(consumer.await.unwrap(), vec![(7, vec![3, 9])]);
    let searches = mailbox.lock().unwrap().searches.clone();
    assert!(matches!(searches.as_slice(), [SearchQuery::Since(_)]));
}

#[tokio::test]
async fn test_nothing_newer_than_marker_yields_no_batch() {
    let mailbox = mailbox(&[1, 2, 3, 4, 5], false);
    let watcher = MailboxWatcher::new(MockConnector(mailbox.clone()), WatcherConfig::default());
    let (cursor_tx, cursor_rx) = watch::channel(cursor(Some(7), 5, false));
    let (batch_tx, batch_rx) = mpsc::channel(1);
    let consumer = consume(cursor_tx, batch_rx);
    let (_trigger, shutdown) = Shutdown::new();

    watcher.run(cursor_rx, batch_tx, shutdown, ONCE).await.unwrap();

    assert!(consumer.await.unwrap().is_empty());
    assert_eq!(
        mailbox.lock().unwrap().searches,
        vec![SearchQuery::UidAfter(5)]
    );
}

#[tokio::test]
async fn test_uid_validity_change_relists_folder() {
    let mailbox = mailbox(&[3, 4], false);
    let watcher = MailboxWatcher::new(MockConnector(mailbox.clone()), WatcherConfig::default());
    let (cursor_tx, cursor_rx) = watch::channel(cursor(Some(1), 50, false));
    let (batch_tx, batch_rx) = mpsc::channel(1);
    let consumer = consume(cursor_tx, batch_rx);
    let (_trigger, shutdown) = Shutdown::new();

    watcher.run(cursor_rx, batch_tx, shutdown, ONCE).await.unwrap();

    assert_eq!(consumer.await.unwrap(), vec![(7, vec![3, 4])]);
    assert_eq!(
        mailbox.lock().unwrap().searches,
        vec![SearchQuery::UidAfter(0)]
    );
}

#[tokio::test]
async fn test_authentication_failure_is_fatal() {
    let mailbox = mailbox(&[1], true);
    mailbox
        .lock()
        .unwrap()
        .connect_failures
        .push_back(ErrorCode::ImapAuthenticationFailed);
    let watcher = MailboxWatcher::new(MockConnector(mailbox.clone()), WatcherConfig::default());
    let (_cursor_tx, cursor_rx) = watch::channel(cursor(Some(7), 0, false));
    let (batch_tx, _batch_rx) = mpsc::channel(1);
    let (_trigger, shutdown) = Shutdown::new();

    let error = watcher
        .run(cursor_rx, batch_tx, shutdown, RunMode::Forever)
        .await
        .unwrap_err();
    assert_eq!(error.code(), ErrorCode::ImapAuthenticationFailed);
    assert_eq!(mailbox.lock().unwrap().connects, 1);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_backs_off_exponentially() {
    let mailbox = mailbox(&[10], false);
    mailbox.lock().unwrap().connect_failures.extend([
        ErrorCode::NetworkError,
        ErrorCode::ConnectionTimeout,
        ErrorCode::NetworkError,
    ]);
    let watcher = MailboxWatcher::new(MockConnector(mailbox.clone()), WatcherConfig::default());
    let (cursor_tx, cursor_rx) = watch::channel(cursor(Some(7), 0, false));
    let (batch_tx, batch_rx) = mpsc::channel(1);
    let consumer = consume(cursor_tx, batch_rx);
    let (_trigger, shutdown) = Shutdown::new();

    let started = tokio::time::Instant::now();
    watcher.run(cursor_rx, batch_tx, shutdown, ONCE).await.unwrap();
    let waited = started.elapsed();

    // 1s + 2s + 4s
    assert!(waited >= Duration::from_secs(7));
    assert!(waited < Duration::from_secs(8));
    assert_eq!(mailbox.lock().unwrap().connects, 4);
    assert_eq!(consumer.await.unwrap(), vec![(7, vec![10])]);
}

#[tokio::test]
async fn test_single_pass_gives_up_after_max_attempts() {
    let mailbox = mailbox(&[1], false);
    mailbox
        .lock()
        .unwrap()
        .connect_failures
        .extend([ErrorCode::NetworkError, ErrorCode::NetworkError]);
    let watcher = MailboxWatcher::new(
        MockConnector(mailbox.clone()),
        WatcherConfig {
            backoff: super::backoff::BackoffPolicy::new(
                Duration::from_millis(1),
                Duration::from_millis(2),
            ),
            ..Default::default()
        },
    );
    let (_cursor_tx, cursor_rx) = watch::channel(cursor(Some(7), 0, false));
    let (batch_tx, _batch_rx) = mpsc::channel(1);
    let (_trigger, shutdown) = Shutdown::new();

    let error = watcher
        .run(cursor_rx, batch_tx, shutdown, RunMode::Once { max_attempts: 2 })
        .await
        .unwrap_err();
    assert_eq!(error.code(), ErrorCode::NetworkError);
    assert_eq!(mailbox.lock().unwrap().connects, 2);
}

#[tokio::test(start_paused = true)]
async fn test_connection_lost_during_idle_resumes_from_marker() {
    let mailbox = mailbox(&[1, 2], true);
    mailbox.lock().unwrap().activities.push_back(Err(raise_error!(
        "connection reset".into(),
        ErrorCode::NetworkError
    )));
    let watcher = Arc::new(MailboxWatcher::new(
        MockConnector(mailbox.clone()),
        WatcherConfig::default(),
    ));
    let mut states = watcher.subscribe();
    let (cursor_tx, cursor_rx) = watch::channel(cursor(Some(7), 0, false));
    let (batch_tx, batch_rx) = mpsc::channel(1);
    let consumer = consume(cursor_tx, batch_rx);
    let (trigger, shutdown) = Shutdown::new();

    let running = {
        let watcher = watcher.clone();
        tokio::spawn(async move {
            watcher
                .run(cursor_rx, batch_tx, shutdown, RunMode::Forever)
                .await
        })
    };

    loop {
        let state = *states.borrow_and_update();
        if state == WatcherState::IdleWait && mailbox.lock().unwrap().connects == 2 {
            break;
        }
        states.changed().await.unwrap();
    }

    trigger.cancel();
    running.await.unwrap().unwrap();

    assert_eq!(consumer.await.unwrap(), vec![(7, vec![1, 2])]);
    assert_eq!(
        mailbox.lock().unwrap().searches,
        vec![SearchQuery::UidAfter(0), SearchQuery::UidAfter(2)]
    );
}
