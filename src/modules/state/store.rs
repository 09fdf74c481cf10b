// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::Arc;

use native_db::Database;
use tracing::{debug, info, warn};

use crate::modules::database::{async_find_impl, delete_by_key_impl, upsert_impl};
use crate::modules::error::MailSiftResult;
use crate::modules::state::seen::SeenSet;
use crate::modules::state::{
    Decision, FailedMessage, PendingFetch, SyncState, PENDING_FETCHES_CAP, RECENT_FAILURES_CAP,
};
use crate::utc_now;

/// Durable dedup and cursor state of one mailbox.
///
/// Mutations stay in memory until [`StateStore::checkpoint`] persists them in a
/// single write transaction. Callers acknowledge work only after a checkpoint.
pub struct StateStore {
    db: Arc<Database<'static>>,
    state: SyncState,
    seen: SeenSet,
    dirty: bool,
}

impl StateStore {
    /// Loads the record of `mailbox`, or starts an empty one on first run.
    pub async fn load(
        db: Arc<Database<'static>>,
        mailbox: &str,
        seen_capacity: usize,
    ) -> MailSiftResult<Self> {
        let stored: Option<SyncState> = async_find_impl(&db, mailbox.to_string()).await?;
        let (mut state, dirty) = match stored {
            Some(state) => {
                info!(
                    "Loaded sync state for '{}': marker={}, uid_validity={:?}, seen={}",
                    mailbox,
                    state.marker,
                    state.uid_validity,
                    state.seen.len()
                );
                (state, false)
            }
            None => {
                info!("No sync state for '{}', starting fresh", mailbox);
                (SyncState::new(mailbox), true)
            }
        };
        let seen = SeenSet::from_persisted(std::mem::take(&mut state.seen), seen_capacity);
        Ok(Self {
            db,
            state,
            seen,
            dirty,
        })
    }

    /// Snapshot of the record, including the seen identifiers.
    pub fn state(&self) -> SyncState {
        SyncState {
            seen: self.seen.to_persisted(),
            ..self.state.clone()
        }
    }

    /// The record without its seen identifiers.
    pub fn summary(&self) -> &SyncState {
        &self.state
    }

    pub fn mailbox(&self) -> &str {
        &self.state.mailbox
    }

    pub fn marker(&self) -> u32 {
        self.state.marker
    }

    pub fn uid_validity(&self) -> Option<u32> {
        self.state.uid_validity
    }

    pub fn seen_len(&self) -> usize {
        self.seen.len()
    }

    pub fn has_seen(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Remembers `ids`, counts the decision and moves the marker forward to `marker`.
    pub fn record(&mut self, ids: &[String], marker: u32, decision: Decision) {
        self.remember(ids);
        match decision {
            Decision::Accepted => {
                self.state.processed += 1;
                self.state.accepted += 1;
            }
            Decision::Rejected => {
                self.state.processed += 1;
                self.state.rejected += 1;
            }
            Decision::Skipped => {}
        }
        self.advance(marker);
        self.dirty = true;
    }

    /// Records a message that could not be fetched after all retries.
    pub fn record_failure(&mut self, ids: &[String], marker: u32, error: &str) {
        self.remember(ids);
        self.state.failed += 1;
        self.state.recent_failures.push(FailedMessage {
            id: ids.first().cloned().unwrap_or_default(),
            error: error.to_string(),
            failed_at: utc_now!(),
        });
        if self.state.recent_failures.len() > RECENT_FAILURES_CAP {
            let excess = self.state.recent_failures.len() - RECENT_FAILURES_CAP;
            self.state.recent_failures.drain(..excess);
        }
        self.advance(marker);
        self.dirty = true;
    }

    /// Counts one more cycle in which `id` could not be fetched because the
    /// connection failed, and returns the total so far.
    pub fn note_deferral(&mut self, id: &str) -> u32 {
        let pending = &mut self.state.pending_fetches;
        let deferrals = match pending.iter_mut().find(|p| p.id == id) {
            Some(entry) => {
                entry.deferrals += 1;
                entry.deferrals
            }
            None => {
                pending.push(PendingFetch {
                    id: id.to_string(),
                    deferrals: 1,
                });
                1
            }
        };
        if pending.len() > PENDING_FETCHES_CAP {
            let excess = pending.len() - PENDING_FETCHES_CAP;
            pending.drain(..excess);
        }
        self.dirty = true;
        deferrals
    }

    fn remember(&mut self, ids: &[String]) {
        for id in ids {
            self.seen.insert(id.clone());
        }
        self.state
            .pending_fetches
            .retain(|pending| !ids.contains(&pending.id));
    }

    /// Moves the marker forward; lower values are ignored.
    pub fn advance(&mut self, marker: u32) {
        if marker > self.state.marker {
            self.state.marker = marker;
            self.dirty = true;
        } else if marker < self.state.marker {
            debug!(
                "Ignoring marker {} behind current marker {}",
                marker, self.state.marker
            );
        }
    }

    pub fn mark_synced(&mut self) {
        self.state.last_sync_at = Some(utc_now!());
        self.dirty = true;
    }

    /// Starts a new UID epoch after the server changed UIDVALIDITY.
    ///
    /// UID keys of the old epoch no longer match anything; Message-ID keys keep
    /// re-numbered messages from being indexed twice.
    pub fn rebase(&mut self, uid_validity: u32) {
        match self.state.uid_validity {
            Some(previous) if previous != uid_validity => {
                warn!(
                    "UIDVALIDITY of '{}' changed from {} to {}, restarting UID cursor",
                    self.state.mailbox, previous, uid_validity
                );
                self.state.marker = 0;
                self.state.pending_fetches.clear();
            }
            Some(_) => return,
            None => {}
        }
        self.state.uid_validity = Some(uid_validity);
        self.dirty = true;
    }

    /// Persists the record atomically. A no-op when nothing changed.
    pub async fn checkpoint(&mut self) -> MailSiftResult<()> {
        if !self.dirty {
            return Ok(());
        }
        let mut snapshot = self.state();
        snapshot.updated_at = utc_now!();
        upsert_impl(&self.db, snapshot.clone()).await?;
        self.state.updated_at = snapshot.updated_at;
        self.dirty = false;
        Ok(())
    }

    /// Administrative reset: forgets the marker, seen identifiers and counters.
    pub async fn reset(&mut self) -> MailSiftResult<()> {
        let mailbox = self.state.mailbox.clone();
        let key = mailbox.clone();
        delete_by_key_impl::<SyncState>(&self.db, key).await?;
        warn!("Sync state of '{}' was reset", mailbox);
        self.state = SyncState::new(&mailbox);
        self.seen.clear();
        self.dirty = true;
        self.checkpoint().await
    }
}
