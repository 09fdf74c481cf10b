// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::VecDeque;

use ahash::AHashMap;
use poem_openapi::{Enum, Object};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::modules::quality::RejectionReason;
use crate::modules::state::{FailedMessage, SyncState};
use crate::modules::watcher::WatcherState;
use crate::utc_now;

/// Decisions kept for the status endpoint.
pub const RECENT_DECISIONS_CAP: usize = 100;
pub const RECENT_ERRORS_CAP: usize = 5;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize, Enum)]
#[serde(rename_all = "snake_case")]
#[oai(rename_all = "snake_case")]
pub enum DecisionKind {
    Accepted,
    Rejected,
    Skipped,
    Failed,
    Deferred,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Object)]
pub struct DecisionRecord {
    pub id: String,
    pub uid: u32,
    pub kind: DecisionKind,
    pub reason: Option<RejectionReason>,
    pub overall_score: Option<f32>,
    pub decided_at: i64,
}

impl DecisionRecord {
    pub fn new(id: &str, uid: u32, kind: DecisionKind) -> Self {
        Self {
            id: id.to_string(),
            uid,
            kind,
            reason: None,
            overall_score: None,
            decided_at: utc_now!(),
        }
    }

    pub fn scored(mut self, overall_score: f32, reason: Option<RejectionReason>) -> Self {
        self.overall_score = Some(overall_score);
        self.reason = reason;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Object)]
pub struct ReasonCount {
    pub reason: RejectionReason,
    pub count: u64,
}

/// Engine counters and recent activity.
///
/// `processed`, `accepted`, `rejected` and `failed` are the durable counters of
/// the mailbox. `skipped`, `deferred`, the rejection reasons and the recent
/// lists cover the running process only.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Object)]
pub struct SyncStatistics {
    pub mailbox: String,
    pub running: bool,
    pub watcher_state: WatcherState,
    pub uid_validity: Option<u32>,
    pub marker: u32,
    pub processed: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub failed: u64,
    pub skipped: u64,
    pub deferred: u64,
    pub rejection_reasons: Vec<ReasonCount>,
    /// Milliseconds since epoch.
    pub last_sync_at: Option<i64>,
    pub recent_decisions: Vec<DecisionRecord>,
    pub recent_errors: Vec<String>,
    pub recent_failures: Vec<FailedMessage>,
}

/// Collects per-process activity and publishes snapshots on a watch channel.
pub struct StatisticsRecorder {
    skipped: u64,
    deferred: u64,
    reasons: AHashMap<RejectionReason, u64>,
    decisions: VecDeque<DecisionRecord>,
    errors: VecDeque<String>,
    sender: watch::Sender<SyncStatistics>,
}

impl StatisticsRecorder {
    pub fn new(state: &SyncState) -> Self {
        let (sender, _) = watch::channel(SyncStatistics::default());
        let recorder = Self {
            skipped: 0,
            deferred: 0,
            reasons: AHashMap::new(),
            decisions: VecDeque::with_capacity(RECENT_DECISIONS_CAP),
            errors: VecDeque::with_capacity(RECENT_ERRORS_CAP),
            sender,
        };
        recorder.publish(state);
        recorder
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncStatistics> {
        self.sender.subscribe()
    }

    pub fn current(&self) -> SyncStatistics {
        self.sender.borrow().clone()
    }

    pub fn note(&mut self, record: DecisionRecord) {
        match record.kind {
            DecisionKind::Skipped => self.skipped += 1,
            DecisionKind::Deferred => self.deferred += 1,
            DecisionKind::Rejected => {
                if let Some(reason) = record.reason {
                    *self.reasons.entry(reason).or_default() += 1;
                }
            }
            DecisionKind::Accepted | DecisionKind::Failed => {}
        }
        if self.decisions.len() == RECENT_DECISIONS_CAP {
            self.decisions.pop_front();
        }
        self.decisions.push_back(record);
    }

    pub fn note_error(&mut self, error: String) {
        if self.errors.len() == RECENT_ERRORS_CAP {
            self.errors.pop_front();
        }
        self.errors.push_back(error);
    }

    pub fn clear(&mut self) {
        self.skipped = 0;
        self.deferred = 0;
        self.reasons.clear();
        self.decisions.clear();
        self.errors.clear();
    }

    pub fn publish(&self, state: &SyncState) {
        let rejection_reasons = RejectionReason::ALL
            .into_iter()
            .filter_map(|reason| {
                self.reasons
                    .get(&reason)
                    .map(|count| ReasonCount { reason, count: *count })
            })
            .collect();
        self.sender.send_replace(SyncStatistics {
            mailbox: state.mailbox.clone(),
            running: false,
            watcher_state: WatcherState::Disconnected,
            uid_validity: state.uid_validity,
            marker: state.marker,
            processed: state.processed,
            accepted: state.accepted,
            rejected: state.rejected,
            failed: state.failed,
            skipped: self.skipped,
            deferred: self.deferred,
            rejection_reasons,
            last_sync_at: state.last_sync_at,
            recent_decisions: self.decisions.iter().cloned().collect(),
            recent_errors: self.errors.iter().cloned().collect(),
            recent_failures: state.recent_failures.clone(),
        });
    }
}
