// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use regex::Regex;
use std::sync::LazyLock;

use crate::modules::common::Addr;

use super::strip_invisible;

pub const NO_SUBJECT: &str = "No Subject";
pub const UNKNOWN_SENDER: &str = "Unknown";
pub const MAX_CC: usize = 5;

static REPLY_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(?:re|fwd?|aw|wg)\s*(?:\[\d+\])?\s*:\s*").unwrap());

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn clean_subject(subject: Option<&str>) -> String {
    let mut subject = collapse_whitespace(&strip_invisible(subject.unwrap_or_default()));
    while let Some(found) = REPLY_PREFIX.find(&subject) {
        subject = subject[found.end()..].to_string();
    }
    let subject = subject.trim();
    if subject.is_empty() {
        NO_SUBJECT.into()
    } else {
        subject.into()
    }
}

pub fn clean_sender(sender: Option<&Addr>) -> String {
    sender
        .and_then(Addr::display_name)
        .map(|name| collapse_whitespace(&strip_invisible(&name)))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNKNOWN_SENDER.into())
}

pub fn clean_cc(cc: &[Addr]) -> Vec<String> {
    cc.iter()
        .filter_map(Addr::display_name)
        .map(|name| collapse_whitespace(&strip_invisible(&name)))
        .filter(|name| !name.is_empty())
        .take(MAX_CC)
        .collect()
}
