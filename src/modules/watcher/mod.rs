// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use chrono::{Days, NaiveDate, Utc};
use poem_openapi::Enum;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::modules::error::MailSiftResult;
use crate::modules::utils::shutdown::Shutdown;

use self::backoff::BackoffPolicy;

pub mod backoff;
pub mod imap;

#[cfg(test)]
mod tests;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherConfig {
    /// Wait between listings when the server cannot push notifications.
    pub poll_interval: Duration,
    /// Longest single IDLE wait before listing anyway.
    pub idle_timeout: Duration,
    pub connect_timeout: Duration,
    pub fetch_timeout: Duration,
    pub backoff: BackoffPolicy,
    /// Most UIDs handed over in one batch.
    pub batch_size: usize,
    /// Look-back window of the very first listing.
    pub initial_sync_days: u32,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(300),
            idle_timeout: Duration::from_secs(1500),
            connect_timeout: Duration::from_secs(30),
            fetch_timeout: Duration::from_secs(60),
            backoff: BackoffPolicy::default(),
            batch_size: 50,
            initial_sync_days: 7,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize, Enum)]
#[serde(rename_all = "snake_case")]
#[oai(rename_all = "snake_case")]
pub enum WatcherState {
    #[default]
    Disconnected,
    Connecting,
    IdleWait,
    Polling,
    Fetching,
    Reconnecting,
}

impl fmt::Display for WatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WatcherState::Disconnected => "DISCONNECTED",
            WatcherState::Connecting => "CONNECTING",
            WatcherState::IdleWait => "IDLE_WAIT",
            WatcherState::Polling => "POLLING",
            WatcherState::Fetching => "FETCHING",
            WatcherState::Reconnecting => "RECONNECTING",
        };
        f.write_str(name)
    }
}

/// Why an IDLE wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    NewData,
    Timeout,
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    /// Every UID strictly greater than the given one.
    UidAfter(u32),
    /// Every message received on or after the date.
    Since(NaiveDate),
}

/// Position of the orchestrator, published after every checkpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncCursor {
    pub uid_validity: Option<u32>,
    pub marker: u32,
    /// Nothing has ever been handled for this mailbox.
    pub fresh: bool,
}

/// UIDs to process; the watcher waits for `ack` before listing again.
#[derive(Debug)]
pub struct WatchBatch {
    pub uid_validity: u32,
    pub uids: Vec<u32>,
    /// Set when the listing came from the initial date window: every UID up to
    /// here lies outside it and must never be listed later.
    pub floor: Option<u32>,
    pub ack: oneshot::Sender<()>,
}

/// A live, authenticated connection with the watched folder open.
pub trait MailboxSession: Send {
    fn supports_idle(&self) -> bool;

    /// Re-opens the folder and returns its current UIDVALIDITY.
    fn refresh(&mut self) -> impl Future<Output = MailSiftResult<u32>> + Send;

    fn search(
        &mut self,
        query: &SearchQuery,
    ) -> impl Future<Output = MailSiftResult<Vec<u32>>> + Send;

    /// Blocks until the server reports activity or `timeout` elapses.
    fn wait_for_activity(
        &mut self,
        timeout: Duration,
    ) -> impl Future<Output = MailSiftResult<Activity>> + Send;

    fn logout(self) -> impl Future<Output = ()> + Send;
}

pub trait MailboxConnector: Send + Sync + 'static {
    type Session: MailboxSession;

    fn connect(&self) -> impl Future<Output = MailSiftResult<Self::Session>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Watch until cancelled.
    Forever,
    /// One catch-up listing, giving up after this many failed connection attempts.
    Once { max_attempts: u32 },
}

pub struct MailboxWatcher<C: MailboxConnector> {
    connector: C,
    config: WatcherConfig,
    state: watch::Sender<WatcherState>,
}

impl<C: MailboxConnector> MailboxWatcher<C> {
    pub fn new(connector: C, config: WatcherConfig) -> Self {
        let (state, _) = watch::channel(WatcherState::Disconnected);
        Self {
            connector,
            config,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<WatcherState> {
        self.state.subscribe()
    }

    fn transition(&self, next: WatcherState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!("Watcher state {} -> {}", previous, next);
        }
    }

    /// Drives the connection state machine.
    ///
    /// Returns `Ok` when cancelled or when a single pass completed. Fatal errors
    /// (authentication, configuration) are returned; anything else reconnects
    /// with exponential backoff.
    pub async fn run(
        &self,
        mut cursor: watch::Receiver<SyncCursor>,
        batches: mpsc::Sender<WatchBatch>,
        mut shutdown: Shutdown,
        mode: RunMode,
    ) -> MailSiftResult<()> {
        let mut attempt: u32 = 0;
        let result = loop {
            if shutdown.is_cancelled() {
                break Ok(());
            }

            self.transition(WatcherState::Connecting);
            let connected = tokio::select! {
                connected = self.connector.connect() => connected,
                _ = shutdown.cancelled() => break Ok(()),
            };

            let error = match connected {
                Ok(session) => {
                    info!("Mailbox connection established");
                    match self
                        .watch(session, &mut cursor, &batches, &mut shutdown, mode, &mut attempt)
                        .await
                    {
                        Ok(()) => break Ok(()),
                        Err(e) => e,
                    }
                }
                Err(e) => e,
            };

            if error.code().is_fatal() {
                error!("Mailbox watcher stopped on fatal error: {:#?}", error);
                break Err(error);
            }
            if let RunMode::Once { max_attempts } = mode {
                if attempt + 1 >= max_attempts {
                    break Err(error);
                }
            }

            self.transition(WatcherState::Reconnecting);
            let delay = self.config.backoff.delay(attempt);
            attempt = attempt.saturating_add(1);
            warn!(
                "Mailbox connection failed ({}), reconnecting in {:?} (attempt {})",
                error, delay, attempt
            );
            if !shutdown.sleep(delay).await {
                break Ok(());
            }
        };
        self.transition(WatcherState::Disconnected);
        result
    }

    /// Serves one connection. `Ok` means the watcher should stop.
    async fn watch(
        &self,
        mut session: C::Session,
        cursor: &mut watch::Receiver<SyncCursor>,
        batches: &mpsc::Sender<WatchBatch>,
        shutdown: &mut Shutdown,
        mode: RunMode,
        attempt: &mut u32,
    ) -> MailSiftResult<()> {
        let idle = session.supports_idle();
        if !idle && mode == RunMode::Forever {
            info!(
                "Server does not support IDLE, polling every {:?}",
                self.config.poll_interval
            );
        }

        loop {
            self.transition(WatcherState::Fetching);
            if !self.fetch_cycle(&mut session, cursor, batches, shutdown).await? {
                return Ok(());
            }
            // a full cycle on this connection proves it healthy again
            *attempt = 0;

            if let RunMode::Once { .. } = mode {
                session.logout().await;
                return Ok(());
            }

            if idle {
                self.transition(WatcherState::IdleWait);
                let activity = tokio::select! {
                    activity = session.wait_for_activity(self.config.idle_timeout) => activity?,
                    _ = shutdown.cancelled() => return Ok(()),
                };
                debug!("IDLE wait ended: {:?}", activity);
            } else {
                self.transition(WatcherState::Polling);
                if !shutdown.sleep(self.config.poll_interval).await {
                    session.logout().await;
                    return Ok(());
                }
            }
        }
    }

    /// Lists UIDs past the cursor and hands them over batch by batch.
    /// Returns `false` when the watcher should stop.
    async fn fetch_cycle(
        &self,
        session: &mut C::Session,
        cursor: &mut watch::Receiver<SyncCursor>,
        batches: &mpsc::Sender<WatchBatch>,
        shutdown: &mut Shutdown,
    ) -> MailSiftResult<bool> {
        let uid_validity = session.refresh().await?;
        let position = cursor.borrow_and_update().clone();
        let query = self.listing_query(&position, uid_validity);

        let mut uids = session.search(&query).await?;
        if let SearchQuery::UidAfter(after) = query {
            // `n:*` matches the highest UID even when it is below n
            uids.retain(|uid| *uid > after);
        }
        uids.sort_unstable();
        uids.dedup();
        if uids.is_empty() {
            debug!("No new messages ({:?})", query);
            return Ok(true);
        }
        info!("Found {} new message(s) ({:?})", uids.len(), query);
        let floor = match query {
            SearchQuery::Since(_) => Some(uids[0].saturating_sub(1)),
            SearchQuery::UidAfter(_) => None,
        };

        for chunk in uids.chunks(self.config.batch_size.max(1)) {
            let (ack, acked) = oneshot::channel();
            let batch = WatchBatch {
                uid_validity,
                uids: chunk.to_vec(),
                floor,
                ack,
            };
            if batches.send(batch).await.is_err() {
                return Ok(false);
            }
            tokio::select! {
                _ = acked => {}
                _ = shutdown.cancelled() => return Ok(false),
            }
        }
        Ok(true)
    }

    fn listing_query(&self, position: &SyncCursor, uid_validity: u32) -> SearchQuery {
        match position.uid_validity {
            Some(known) if known != uid_validity => {
                warn!(
                    "UIDVALIDITY changed from {} to {}, listing the whole folder",
                    known, uid_validity
                );
                SearchQuery::UidAfter(0)
            }
            _ if position.marker == 0 && position.fresh => {
                let today = Utc::now().date_naive();
                let since = today
                    .checked_sub_days(Days::new(self.config.initial_sync_days as u64))
                    .unwrap_or(today);
                SearchQuery::Since(since)
            }
            _ => SearchQuery::UidAfter(position.marker),
        }
    }
}
