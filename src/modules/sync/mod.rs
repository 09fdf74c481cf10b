// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::future::Future;

use crate::modules::error::MailSiftResult;
use crate::modules::message::RawMessage;
use crate::modules::normalize::{ContentNormalizer, NormalizedContent};
use crate::modules::quality::{QualityAssessment, QualityScorer};
use crate::modules::watcher::backoff::BackoffPolicy;

pub mod controller;
pub mod engine;
pub mod orchestrator;
pub mod progress;
pub mod stats;

#[cfg(test)]
mod tests;

/// Retrieves full messages by UID.
pub trait MessageFetcher: Send + Sync + 'static {
    /// `Ok(None)` when the message no longer exists.
    fn fetch(&self, uid: u32) -> impl Future<Output = MailSiftResult<Option<RawMessage>>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Messages fetched, scored and submitted concurrently.
    pub workers: usize,
    /// Extra attempts for a failing fetch before the message is recorded as failed.
    pub max_fetch_retries: u32,
    pub retry_backoff: BackoffPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            max_fetch_retries: 3,
            retry_backoff: BackoffPolicy::default(),
        }
    }
}

/// Normalizer and scorer, shared read-only by every worker.
pub struct Pipeline {
    normalizer: ContentNormalizer,
    scorer: QualityScorer,
}

impl Pipeline {
    pub fn new(normalizer: ContentNormalizer, scorer: QualityScorer) -> Self {
        Self { normalizer, scorer }
    }

    pub fn evaluate(&self, raw: &RawMessage) -> (NormalizedContent, QualityAssessment) {
        let content = self.normalizer.normalize(raw);
        let assessment = self.scorer.assess(&content);
        (content, assessment)
    }
}
