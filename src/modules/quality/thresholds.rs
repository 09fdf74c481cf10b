// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::str::FromStr;

use super::RejectionReason;

/// Relative weights of the sub-scores in the overall score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreWeights {
    pub content_ratio: f32,
    pub readability: f32,
    pub non_marketing: f32,
    pub non_template: f32,
    pub language: f32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            content_ratio: 0.35,
            readability: 0.35,
            non_marketing: 0.1,
            non_template: 0.1,
            language: 0.1,
        }
    }
}

impl ScoreWeights {
    pub fn total(&self) -> f32 {
        self.content_ratio + self.readability + self.non_marketing + self.non_template + self.language
    }
}

impl FromStr for ScoreWeights {
    type Err = String;

    /// Five comma separated numbers in the order content ratio, readability,
    /// non-marketing, non-template, language.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(|v| {
                v.trim()
                    .parse::<f32>()
                    .map_err(|_| format!("Invalid weight: '{}'", v.trim()))
            })
            .collect::<Result<Vec<f32>, String>>()?;
        let [content_ratio, readability, non_marketing, non_template, language] = values[..]
        else {
            return Err(format!("Expected 5 weights, got {}", values.len()));
        };
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err("Weights must be non-negative numbers".into());
        }
        let weights = Self {
            content_ratio,
            readability,
            non_marketing,
            non_template,
            language,
        };
        if weights.total() <= 0.0 {
            return Err("At least one weight must be positive".into());
        }
        Ok(weights)
    }
}

/// Priority of rejection reasons when several quality gates fail at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectionOrder(Vec<RejectionReason>);

impl Default for RejectionOrder {
    fn default() -> Self {
        Self(RejectionReason::ALL.to_vec())
    }
}

impl RejectionOrder {
    pub fn as_slice(&self) -> &[RejectionReason] {
        &self.0
    }
}

impl FromStr for RejectionOrder {
    type Err = String;

    /// Reasons not named keep their default relative order after the named ones.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut order: Vec<RejectionReason> = Vec::with_capacity(RejectionReason::ALL.len());
        for name in s.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let reason = name.parse::<RejectionReason>()?;
            if order.contains(&reason) {
                return Err(format!("Rejection reason '{}' listed twice", name));
            }
            order.push(reason);
        }
        for reason in RejectionReason::ALL {
            if !order.contains(&reason) {
                order.push(reason);
            }
        }
        Ok(Self(order))
    }
}

/// Gates a message must pass to be indexed.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityThresholds {
    /// Minimum overall score, 0 to 100.
    pub quality_threshold: f32,
    /// Maximum marketing score, 0 to 100.
    pub marketing_ceiling: f32,
    pub min_body_chars: usize,
    /// 0 to 1
    pub min_language_confidence: f32,
    pub weights: ScoreWeights,
    pub rejection_order: RejectionOrder,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            quality_threshold: 50.0,
            marketing_ceiling: 40.0,
            min_body_chars: 20,
            min_language_confidence: 0.3,
            weights: ScoreWeights::default(),
            rejection_order: RejectionOrder::default(),
        }
    }
}
