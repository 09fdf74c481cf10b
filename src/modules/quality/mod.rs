// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::fmt;
use std::str::FromStr;

use poem_openapi::{Enum, Object};
use serde::{Deserialize, Serialize};

use crate::modules::error::MailSiftResult;
use crate::modules::normalize::NormalizedContent;

use self::rules::{RuleTable, MARKETING_RULES, TEMPLATE_RULES};
use self::thresholds::QualityThresholds;

pub mod rules;
pub mod thresholds;

#[cfg(test)]
mod tests;

/// Scores above this mark a document as promotional in the index.
pub const MARKETING_FLAG: f32 = 30.0;
/// Scores above this mark a document as template-like in the index.
pub const TEMPLATE_FLAG: f32 = 50.0;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize, Enum)]
#[serde(rename_all = "snake_case")]
#[oai(rename_all = "snake_case")]
pub enum RejectionReason {
    TooShort,
    LowLanguageConfidence,
    HighMarketing,
    LowOverallScore,
}

impl RejectionReason {
    /// Default gate priority.
    pub const ALL: [RejectionReason; 4] = [
        RejectionReason::TooShort,
        RejectionReason::LowLanguageConfidence,
        RejectionReason::HighMarketing,
        RejectionReason::LowOverallScore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::TooShort => "too_short",
            RejectionReason::LowLanguageConfidence => "low_language_confidence",
            RejectionReason::HighMarketing => "high_marketing",
            RejectionReason::LowOverallScore => "low_overall_score",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RejectionReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        RejectionReason::ALL
            .into_iter()
            .find(|reason| reason.as_str() == normalized)
            .ok_or_else(|| {
                format!(
                    "Unknown rejection reason '{}', expected one of: {}",
                    s.trim(),
                    RejectionReason::ALL
                        .iter()
                        .map(RejectionReason::as_str)
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize, Enum)]
#[serde(rename_all = "lowercase")]
#[oai(rename_all = "lowercase")]
pub enum QualityTier {
    High,
    Medium,
    Low,
}

impl QualityTier {
    pub fn from_score(score: f32) -> Self {
        if score >= 80.0 {
            QualityTier::High
        } else if score >= 60.0 {
            QualityTier::Medium
        } else {
            QualityTier::Low
        }
    }
}

/// Verdict for one message. All scores are 0 to 100 except `language_confidence`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Object)]
pub struct QualityAssessment {
    pub overall_score: f32,
    pub content_ratio: f32,
    pub marketing_score: f32,
    pub template_score: f32,
    pub readability_score: f32,
    /// 0.0 to 1.0
    pub language_confidence: f32,
    pub accepted: bool,
    /// First failed gate in the configured priority order.
    pub rejection_reason: Option<RejectionReason>,
    pub tier: QualityTier,
    pub issues: Vec<String>,
}

pub struct QualityScorer {
    thresholds: QualityThresholds,
    marketing: RuleTable,
    template: RuleTable,
}

impl QualityScorer {
    pub fn new(thresholds: QualityThresholds) -> MailSiftResult<Self> {
        Ok(Self {
            thresholds,
            marketing: RuleTable::compile(MARKETING_RULES)?,
            template: RuleTable::compile(TEMPLATE_RULES)?,
        })
    }

    pub fn assess(&self, content: &NormalizedContent) -> QualityAssessment {
        let words = words(&content.body);

        let content_ratio = content_ratio(content);
        let marketing_score = self.marketing_score(&content.body, &words);
        let template_score = self.template_score(content, &words);
        let readability_score = readability_score(&content.body, &words);
        let language_confidence = content.language_confidence.clamp(0.0, 1.0);

        let weights = &self.thresholds.weights;
        let weighted = weights.content_ratio * content_ratio
            + weights.readability * readability_score
            + weights.non_marketing * (100.0 - marketing_score)
            + weights.non_template * (100.0 - template_score)
            + weights.language * language_confidence * 100.0;
        let overall_score = if weights.total() > 0.0 {
            (weighted / weights.total()).clamp(0.0, 100.0)
        } else {
            0.0
        };

        let body_chars = content.body.chars().count();
        let rejection_reason = self
            .thresholds
            .rejection_order
            .as_slice()
            .iter()
            .copied()
            .find(|reason| match reason {
                RejectionReason::TooShort => body_chars < self.thresholds.min_body_chars,
                RejectionReason::LowLanguageConfidence => {
                    language_confidence < self.thresholds.min_language_confidence
                }
                RejectionReason::HighMarketing => {
                    marketing_score > self.thresholds.marketing_ceiling
                }
                RejectionReason::LowOverallScore => {
                    overall_score < self.thresholds.quality_threshold
                }
            });

        let mut issues = Vec::new();
        if body_chars < self.thresholds.min_body_chars {
            issues.push("content too short".to_string());
        }
        if readability_score < 50.0 {
            issues.push("content too fragmented".to_string());
        }
        if marketing_score > MARKETING_FLAG {
            let cues = self.marketing.matched(&content.body);
            if cues.is_empty() {
                issues.push("promotional content".to_string());
            } else {
                issues.push(format!("promotional content ({})", cues.join(", ")));
            }
        }
        if template_score > TEMPLATE_FLAG {
            issues.push("template-like content".to_string());
        }
        if content_ratio < 30.0 {
            issues.push("mostly markup or noise".to_string());
        }
        if language_confidence < self.thresholds.min_language_confidence {
            issues.push("language could not be identified reliably".to_string());
        }
        if content.truncated {
            issues.push("content truncated".to_string());
        }
        if content.tracking_links_removed > 0 {
            issues.push("tracking links removed".to_string());
        }

        QualityAssessment {
            overall_score,
            content_ratio,
            marketing_score,
            template_score,
            readability_score,
            language_confidence,
            accepted: rejection_reason.is_none(),
            rejection_reason,
            tier: QualityTier::from_score(overall_score),
            issues,
        }
    }

    fn marketing_score(&self, body: &str, words: &[&str]) -> f32 {
        let mut score = self.marketing.score(body);

        let (letters, upper) = body
            .chars()
            .filter(|c| c.is_alphabetic())
            .fold((0usize, 0usize), |(letters, upper), c| {
                (letters + 1, upper + usize::from(c.is_uppercase()))
            });
        if letters >= 20 {
            let ratio = upper as f32 / letters as f32;
            if ratio > 0.3 {
                score += (ratio * 50.0).min(25.0);
            }
        }

        let exclamations = body.matches('!').count();
        if exclamations >= 2 {
            score += (exclamations as f32 * 5.0).min(15.0);
        }

        // long bodies dilute a handful of cues
        if words.len() > 50 {
            score *= (50.0 / words.len() as f32).sqrt();
        }
        score.clamp(0.0, 100.0)
    }

    fn template_score(&self, content: &NormalizedContent, words: &[&str]) -> f32 {
        let mut score = self.template.score(&content.body);

        if !words.is_empty() {
            let density = content.link_count as f32 / words.len() as f32;
            score += (density * 400.0).min(40.0);
        }
        score += (content.tracking_links_removed as f32 * 10.0).min(20.0);
        if words.len() >= 20 && unique_ratio(words) < 0.5 {
            score += 20.0;
        }
        if content.boilerplate_removed {
            score += 15.0;
        }
        score.clamp(0.0, 100.0)
    }
}

fn words(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect()
}

fn unique_ratio(words: &[&str]) -> f32 {
    if words.is_empty() {
        return 0.0;
    }
    let unique: ahash::AHashSet<String> = words.iter().map(|w| w.to_lowercase()).collect();
    unique.len() as f32 / words.len() as f32
}

fn content_ratio(content: &NormalizedContent) -> f32 {
    if content.original_length == 0 {
        return 0.0;
    }
    let kept = content.body.chars().count() as f32;
    (kept / content.original_length as f32 * 100.0).min(100.0)
}

fn readability_score(body: &str, words: &[&str]) -> f32 {
    if words.len() < 5 {
        return 20.0;
    }
    let lengths: Vec<usize> = body
        .split(['.', '!', '?', '\n'])
        .map(|sentence| self::words(sentence).len())
        .filter(|n| *n > 0)
        .collect();
    if lengths.is_empty() {
        return 20.0;
    }
    let average = lengths.iter().sum::<usize>() as f32 / lengths.len() as f32;
    let mut score: f32 = if average < 3.0 {
        30.0
    } else if average < 8.0 {
        70.0
    } else if average <= 30.0 {
        90.0
    } else if average <= 50.0 {
        70.0
    } else {
        40.0
    };
    if words.len() >= 20 && unique_ratio(words) < 0.3 {
        score -= 30.0;
    }
    score.clamp(0.0, 100.0)
}
