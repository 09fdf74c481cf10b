// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::future::Future;

use clap::ValueEnum;
use native_db::*;
use native_model::{native_model, Model};
use poem_openapi::Object;
use serde::{Deserialize, Serialize};

use crate::modules::error::MailSiftResult;
use crate::modules::message::RawMessage;
use crate::modules::normalize::NormalizedContent;
use crate::modules::quality::{QualityAssessment, QualityTier, MARKETING_FLAG, TEMPLATE_FLAG};
use crate::utc_now;

use self::http::HttpSink;
use self::local::LocalIndexSink;

pub mod http;
pub mod local;


#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
pub enum SinkKind {
    #[default]
    #[clap(name = "local")]
    Local,
    #[clap(name = "http")]
    Http,
}

/// One accepted message as handed to the index.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, Object)]
#[native_model(id = 2, version = 1)]
#[native_db]
pub struct IndexedDocument {
    /// `mid:<message-id>` when the message has one, `uid:<validity>:<uid>` otherwise.
    #[primary_key]
    pub id: String,
    pub uid: u32,
    pub mailbox: String,
    pub sender: String,
    pub subject: String,
    pub cc: Vec<String>,
    /// `Date` header as RFC 3339.
    pub date: Option<String>,
    pub language: String,
    /// Sender and subject prepended to the cleaned body.
    pub text: String,
    pub overall_score: f32,
    pub content_ratio: f32,
    pub marketing_score: f32,
    pub template_score: f32,
    pub readability_score: f32,
    pub tier: QualityTier,
    pub is_marketing: bool,
    pub is_template: bool,
    pub indexed_at: i64,
}

impl IndexedDocument {
    pub fn new(
        id: &str,
        raw: &RawMessage,
        content: &NormalizedContent,
        assessment: &QualityAssessment,
    ) -> Self {
        Self {
            id: id.to_string(),
            uid: raw.uid,
            mailbox: raw.mailbox.clone(),
            sender: content.sender.clone(),
            subject: content.subject.clone(),
            cc: content.cc.clone(),
            date: raw.date.clone(),
            language: content.language.clone(),
            text: enhanced_text(content),
            overall_score: assessment.overall_score,
            content_ratio: assessment.content_ratio,
            marketing_score: assessment.marketing_score,
            template_score: assessment.template_score,
            readability_score: assessment.readability_score,
            tier: assessment.tier,
            is_marketing: assessment.marketing_score > MARKETING_FLAG,
            is_template: assessment.template_score > TEMPLATE_FLAG,
            indexed_at: utc_now!(),
        }
    }
}

/// Text submitted for indexing: header context followed by the cleaned body.
pub fn enhanced_text(content: &NormalizedContent) -> String {
    let mut text = String::with_capacity(content.body.len() + 64);
    if !content.sender.is_empty() {
        text.push_str("From: ");
        text.push_str(&content.sender);
        text.push('\n');
    }
    if !content.subject.is_empty() {
        text.push_str("Subject: ");
        text.push_str(&content.subject);
        text.push('\n');
    }
    if !text.is_empty() {
        text.push('\n');
    }
    text.push_str(&content.body);
    text
}

/// Destination of accepted messages.
///
/// Submissions are upserts keyed by [`IndexedDocument::id`], so submitting the
/// same document twice leaves one copy.
pub trait IndexingSink: Send + Sync + 'static {
    fn submit(&self, document: IndexedDocument) -> impl Future<Output = MailSiftResult<()>> + Send;
}

/// The sink selected in the settings.
pub enum ConfiguredSink {
    Local(LocalIndexSink),
    Http(HttpSink),
}

impl IndexingSink for ConfiguredSink {
    async fn submit(&self, document: IndexedDocument) -> MailSiftResult<()> {
        match self {
            ConfiguredSink::Local(sink) => sink.submit(document).await,
            ConfiguredSink::Http(sink) => sink.submit(document).await,
        }
    }
}
