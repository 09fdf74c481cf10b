// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::Arc;

use super::rules::{RuleTable, MARKETING_RULES};
use super::thresholds::{QualityThresholds, RejectionOrder, ScoreWeights};
use super::{QualityScorer, QualityTier, RejectionReason};
use crate::modules::message::RawMessage;
use crate::modules::normalize::language::LanguageIdentifier;
use crate::modules::normalize::{ContentNormalizer, NormalizedContent, NormalizerConfig};

fn normalize(text: &str) -> NormalizedContent {
    let normalizer = ContentNormalizer::new(
        NormalizerConfig::default(),
        Arc::new(LanguageIdentifier::new()),
    );
    normalizer.normalize(&RawMessage {
        uid: 1,
        plain: Some(text.into()),
        ..Default::default()
    })
}

fn scorer() -> QualityScorer {
    QualityScorer::new(QualityThresholds::default()).unwrap()
}

#[test]
fn test_promotional_blast_is_rejected_for_marketing() {
    let content = normalize(
        "SHOP NOW! 50% OFF! Click: https://click.example-mail.com/ls/click?upn=9f8a7b6c5d4e3f2a1b0c9d8e7f6a5b4c3d2e1f0a Unsubscribe. (c) 2025 Co.",
    );
    assert_eq!(content.tracking_links_removed, 1);

    let assessment = scorer().assess(&content);
    assert!(assessment.marketing_score > 60.0);
    assert!(assessment.template_score > 60.0);
    assert!(assessment.content_ratio < 60.0);
    assert!(assessment.overall_score < 50.0);
    assert!(!assessment.accepted);
    assert_eq!(
        assessment.rejection_reason,
        Some(RejectionReason::HighMarketing)
    );
    assert_eq!(assessment.tier, QualityTier::Low);
    assert!(assessment
        .issues
        .iter()
        .any(|i| i.starts_with("promotional content (shop_now")));
}

#[test]
fn test_personal_reply_is_accepted() {
    let content = normalize(
        "Thank you for your inquiry; I would be happy to schedule a meeting next week.",
    );
    let assessment = scorer().assess(&content);
    assert!(assessment.accepted);
    assert_eq!(assessment.rejection_reason, None);
    assert!(assessment.overall_score >= 70.0);
    assert_eq!(assessment.marketing_score, 0.0);
    assert_eq!(assessment.tier, QualityTier::High);
}

#[test]
fn test_assessment_is_deterministic() {
    let content = normalize(
        "Limited time offer! Save up to 40% on every order, free shipping included. Unsubscribe here.",
    );
    let scorer = scorer();
    assert_eq!(scorer.assess(&content), scorer.assess(&content));
}

#[test]
fn test_short_body_is_always_rejected_as_too_short() {
    let scorer = scorer();
    for body in ["", "ok", "Thanks a lot!", "SHOP NOW 50% OFF"] {
        let content = NormalizedContent {
            body: body.into(),
            original_length: body.len(),
            language_confidence: 0.0,
            ..Default::default()
        };
        let assessment = scorer.assess(&content);
        assert!(!assessment.accepted);
        assert_eq!(assessment.rejection_reason, Some(RejectionReason::TooShort));
    }
}

#[test]
fn test_custom_rejection_order_changes_reported_reason() {
    let content = NormalizedContent {
        body: "BUY NOW!!! SHOP NOW!!!".into(),
        original_length: 22,
        language_confidence: 0.1,
        ..Default::default()
    };

    let default = scorer().assess(&content);
    assert_eq!(
        default.rejection_reason,
        Some(RejectionReason::LowLanguageConfidence)
    );

    let thresholds = QualityThresholds {
        rejection_order: "high_marketing".parse::<RejectionOrder>().unwrap(),
        ..Default::default()
    };
    let reordered = QualityScorer::new(thresholds).unwrap().assess(&content);
    assert_eq!(
        reordered.rejection_reason,
        Some(RejectionReason::HighMarketing)
    );
}

#[test]
fn test_rule_table_caps_hits_per_rule() {
    let table = RuleTable::compile(MARKETING_RULES).unwrap();
    assert_eq!(table.score("shop now"), 25.0);
    assert_eq!(table.score("shop now shop now shop now shop now shop now"), 75.0);
    assert_eq!(table.matched("Shop now, 20% off"), vec!["shop_now", "percent_off"]);
}

#[test]
fn test_weights_and_order_parsing() {
    let weights: ScoreWeights = "1, 1, 0, 0, 0".parse().unwrap();
    assert_eq!(weights.total(), 2.0);
    assert!("1,2,3".parse::<ScoreWeights>().is_err());
    assert!("0,0,0,0,0".parse::<ScoreWeights>().is_err());
    assert!("-1,1,1,1,1".parse::<ScoreWeights>().is_err());

    let order: RejectionOrder = "low-overall-score, too_short".parse().unwrap();
    assert_eq!(
        order.as_slice(),
        &[
            RejectionReason::LowOverallScore,
            RejectionReason::TooShort,
            RejectionReason::LowLanguageConfidence,
            RejectionReason::HighMarketing,
        ]
    );
    assert!("too_short,too_short".parse::<RejectionOrder>().is_err());
    assert!("nonsense".parse::<RejectionOrder>().is_err());
}
