// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use regex::Regex;
use std::sync::LazyLock;

use super::links::{LINK_PLACEHOLDER, URL_PATTERN};

/// Only the last lines of a body are candidates for removal.
pub const TRAILING_WINDOW: usize = 12;

static MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?xi)
        ^--\s*$
        | ^_{3,}\s*$
        | ^\*{3,}\s*$
        | ^sent\ from\ my\ \w+
        | ^get\ outlook\ for\ \w+
        | unsubscribe
        | you\ (?:are\ )?receiv(?:ed|ing)\ this\ (?:e-?mail|message)
        | to\ stop\ receiving
        | no\ longer\ wish\ to\ receive
        | (?:manage|update)\ (?:your\ )?(?:e-?mail\ )?(?:preferences|subscription)
        | privacy\ policy
        | terms\ of\ (?:service|use)
        | all\ rights\ reserved
        | (?:©|\(c\)|copyright)\s*20\d{2}
        | this\ (?:e-?mail|message)\ (?:and\ any\ attachments?\ )?(?:is|are|may\ be|contains?)\ (?:strictly\ )?(?:confidential|privileged)
        | intended\ (?:solely\ )?for\ the\ (?:named\ )?(?:recipient|addressee)
        ",
    )
    .unwrap()
});

static LEGAL_TERMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:confidential|disclaimer|liability|liable|prohibited|intended|recipient|copyright|trademark|registered|address|inc\.|ltd\.?|llc|gmbh)\b")
        .unwrap()
});

fn is_marker(line: &str) -> bool {
    MARKERS.is_match(line.trim())
}

/// Line made mostly of links or legal vocabulary.
fn is_noise(line: &str) -> bool {
    let line = line.trim();
    if line.is_empty() {
        return false;
    }
    if is_marker(line) {
        return true;
    }
    let link_chars: usize = URL_PATTERN
        .find_iter(line)
        .map(|m| m.as_str().len())
        .sum::<usize>()
        + line.matches(LINK_PLACEHOLDER).count() * LINK_PLACEHOLDER.len();
    if link_chars * 2 >= line.len() {
        return true;
    }
    let words = line.split_whitespace().count();
    words > 0 && LEGAL_TERMS.find_iter(line).count() * 4 >= words
}

/// Cuts signature blocks, disclaimers and unsubscribe footers off the end of `text`.
///
/// Returns the kept text and whether anything was cut. The first line is never cut.
pub fn cut_trailing_boilerplate(text: &str) -> (String, bool) {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() < 2 {
        return (text.to_string(), false);
    }
    let start = lines.len().saturating_sub(TRAILING_WINDOW).max(1);

    let cut = (start..lines.len())
        .find(|&i| is_marker(lines[i]))
        .or_else(|| {
            (start..lines.len()).find(|&i| {
                if !is_noise(lines[i]) {
                    return false;
                }
                let tail: Vec<&&str> = lines[i..].iter().filter(|l| !l.trim().is_empty()).collect();
                let noisy = tail.iter().filter(|l| is_noise(l)).count();
                noisy * 5 >= tail.len() * 3
            })
        });

    match cut {
        Some(index) => (lines[..index].join("\n").trim_end().to_string(), true),
        None => (text.to_string(), false),
    }
}
