// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use regex::Regex;

use crate::modules::error::code::ErrorCode;
use crate::modules::error::MailSiftResult;
use crate::raise_error;

/// Hits of one rule beyond this count add nothing.
const MAX_HITS_PER_RULE: usize = 3;

pub struct Rule {
    pub label: &'static str,
    pub pattern: Regex,
    pub weight: f32,
}

/// Weighted lexical cues, compiled once.
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    pub fn compile(rules: &[(&'static str, &str, f32)]) -> MailSiftResult<Self> {
        let rules = rules
            .iter()
            .map(|(label, pattern, weight)| {
                let pattern = Regex::new(&format!("(?i){}", pattern)).map_err(|e| {
                    raise_error!(
                        format!("Invalid rule pattern '{}': {}", label, e),
                        ErrorCode::InvalidParameter
                    )
                })?;
                Ok(Rule {
                    label,
                    pattern,
                    weight: *weight,
                })
            })
            .collect::<MailSiftResult<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Sum of `weight * hits` over all rules, hits capped per rule.
    pub fn score(&self, text: &str) -> f32 {
        self.rules
            .iter()
            .map(|rule| {
                let hits = rule.pattern.find_iter(text).take(MAX_HITS_PER_RULE).count();
                rule.weight * hits as f32
            })
            .sum()
    }

    /// Labels of the rules that fire on `text`.
    pub fn matched(&self, text: &str) -> Vec<&'static str> {
        self.rules
            .iter()
            .filter(|rule| rule.pattern.is_match(text))
            .map(|rule| rule.label)
            .collect()
    }
}

pub const MARKETING_RULES: &[(&str, &str, f32)] = &[
    ("shop_now", r"\bshop\s+now\b", 25.0),
    ("percent_off", r"\d{1,3}\s*%\s*off\b", 20.0),
    (
        "call_to_action",
        r"\b(?:buy|order|act|sign\s+up|subscribe|book)\s+(?:now|today)\b",
        20.0,
    ),
    ("click", r"\bclick\b", 10.0),
    (
        "urgency",
        r"\blimited[-\s]+time\b|\bwhile\s+supplies\s+last\b|\b(?:offer|sale)\s+ends\b|\blast\s+chance\b|\bhurry\b|\bdon'?t\s+miss\b",
        15.0,
    ),
    (
        "exclusive_offer",
        r"\b(?:exclusive|special)\s+(?:offer|deal|discount)s?\b",
        15.0,
    ),
    (
        "free_offer",
        r"\bfree\s+(?:shipping|delivery|gift|trial)\b",
        15.0,
    ),
    (
        "promotion",
        r"\b(?:sale|clearance|discounts?|deals?|promo(?:tion)?s?|coupons?|vouchers?)\b",
        10.0,
    ),
    (
        "savings",
        r"\bsave\s+(?:up\s+to\s+)?(?:[$€£]\s*\d+|\d+\s*%)",
        15.0,
    ),
    ("price", r"[$€£]\s*\d+(?:[.,]\d{2})?", 5.0),
    (
        "superlative",
        r"\b(?:best|lowest)\s+(?:price|deal)s?\b|\bbiggest\b|\bunbeatable\b",
        10.0,
    ),
    (
        "guarantee",
        r"\bguaranteed?\b|\brisk[-\s]free\b|\bno\s+obligation\b",
        10.0,
    ),
];

pub const TEMPLATE_RULES: &[(&str, &str, f32)] = &[
    ("unsubscribe", r"unsubscribe", 25.0),
    (
        "copyright",
        r"(?:©|\(c\)|copyright)\s*(?:19|20)\d{2}",
        20.0,
    ),
    ("rights_reserved", r"all\s+rights\s+reserved", 15.0),
    (
        "legal_links",
        r"privacy\s+policy|terms\s+of\s+(?:service|use)",
        15.0,
    ),
    (
        "view_in_browser",
        r"view\s+(?:this\s+(?:e-?mail|message)\s+)?(?:in|on)\s+(?:your\s+)?(?:web\s+)?browser",
        20.0,
    ),
    (
        "subscription_notice",
        r"you\s+(?:are\s+)?receiv(?:ed|ing)\s+this",
        20.0,
    ),
    (
        "preferences",
        r"(?:manage|update)\s+(?:your\s+)?(?:e-?mail\s+)?(?:preferences|subscriptions?)",
        20.0,
    ),
    (
        "template_variable",
        r"\{\{[^}]+\}\}|\[\[[^\]]+\]\]|%%\w+%%",
        25.0,
    ),
    (
        "generic_salutation",
        r"dear\s+(?:valued\s+)?(?:customer|subscriber|member|user)",
        20.0,
    ),
    (
        "digest",
        r"your\s+(?:daily|weekly|monthly)\s+(?:digest|summary|newsletter|update)",
        20.0,
    ),
    ("no_reply", r"do\s+not\s+reply|no-?reply", 10.0),
];
