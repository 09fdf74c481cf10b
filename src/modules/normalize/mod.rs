// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::Arc;

use poem_openapi::Object;
use serde::{Deserialize, Serialize};

use crate::modules::message::RawMessage;

use self::boilerplate::cut_trailing_boilerplate;
use self::header::{clean_cc, clean_sender, clean_subject};
use self::html::html_to_text;
use self::language::LanguageIdentifier;
use self::links::{classify, is_bare_link, scrub_links, LinkVerdict};

pub mod boilerplate;
pub mod header;
pub mod html;
pub mod language;
pub mod links;

#[cfg(test)]
mod tests;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizerConfig {
    /// Hard cap on the cleaned body, in characters.
    pub max_body_chars: usize,
    /// A plain part shorter than this is ignored in favour of the markup part.
    pub min_plain_chars: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            max_body_chars: 5000,
            min_plain_chars: 20,
        }
    }
}

/// Canonical text of one message, input of the quality scorer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Object)]
pub struct NormalizedContent {
    pub sender: String,
    pub subject: String,
    /// Display names of at most five cc recipients.
    pub cc: Vec<String>,
    pub body: String,
    pub language: String,
    pub language_confidence: f32,
    /// Characters of the body source before cleaning.
    pub original_length: usize,
    pub link_count: usize,
    pub tracking_links_removed: usize,
    pub boilerplate_removed: bool,
    pub truncated: bool,
}

pub struct ContentNormalizer {
    config: NormalizerConfig,
    language: Arc<LanguageIdentifier>,
}

impl ContentNormalizer {
    pub fn new(config: NormalizerConfig, language: Arc<LanguageIdentifier>) -> Self {
        Self { config, language }
    }

    /// Never fails; malformed input yields an empty or partial body.
    pub fn normalize(&self, raw: &RawMessage) -> NormalizedContent {
        let mut links = 0;
        let mut removed = 0;

        let plain = raw
            .plain
            .as_deref()
            .filter(|p| p.trim().chars().count() >= self.config.min_plain_chars);
        let source = match (plain, raw.html.as_deref()) {
            (Some(plain), _) => decode_entities(plain),
            (None, Some(markup)) => {
                let converted = html_to_text(markup);
                links += converted.links;
                removed += converted.tracking_links;
                converted.text
            }
            (None, None) => raw.plain.as_deref().map(decode_entities).unwrap_or_default(),
        };
        let original_length = match (plain, raw.html.as_deref()) {
            (Some(plain), _) => plain.chars().count(),
            (None, Some(markup)) => markup.chars().count(),
            (None, None) => source.chars().count(),
        };

        let text = strip_invisible(&source);

        let mut kept = Vec::new();
        for line in text.lines() {
            if is_bare_link(line) {
                if classify(line.trim()) == LinkVerdict::Remove {
                    links += 1;
                    removed += 1;
                    continue;
                }
                // counted and cleaned with the inline links below
                kept.push(line);
                continue;
            }
            if is_encoded_blob(line) {
                continue;
            }
            kept.push(line);
        }
        let scan = scrub_links(&kept.join("\n"));
        links += scan.links;
        removed += scan.removed;

        let text = collapse_lines(&scan.text);
        let (text, boilerplate_removed) = cut_trailing_boilerplate(&text);
        let (body, truncated) = truncate_chars(&text, self.config.max_body_chars);
        let guess = self.language.identify(&body);

        NormalizedContent {
            sender: clean_sender(raw.sender.as_ref()),
            subject: clean_subject(raw.subject.as_deref()),
            cc: clean_cc(&raw.cc),
            body,
            language: guess.tag,
            language_confidence: guess.confidence,
            original_length,
            link_count: links,
            tracking_links_removed: removed,
            boilerplate_removed,
            truncated,
        }
    }
}

fn is_invisible(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}'
            | '\u{034F}'
            | '\u{061C}'
            | '\u{180E}'
            | '\u{200B}'..='\u{200F}'
            | '\u{202A}'..='\u{202E}'
            | '\u{2060}'..='\u{2064}'
            | '\u{2066}'..='\u{2069}'
            | '\u{FEFF}'
            | '\u{FFF9}'..='\u{FFFB}'
    ) || (c.is_control() && c != '\n' && c != '\t')
}

/// Removes zero-width and control characters; tabs and no-break spaces become spaces.
pub fn strip_invisible(text: &str) -> String {
    text.chars()
        .filter(|c| !is_invisible(*c))
        .map(|c| match c {
            '\t' | '\u{00A0}' | '\u{2007}' | '\u{202F}' => ' ',
            other => other,
        })
        .collect()
}

fn decode_entities(text: &str) -> String {
    if text.contains('&') {
        html_escape::decode_html_entities(text).into_owned()
    } else {
        text.to_string()
    }
}

fn is_encoded_blob(line: &str) -> bool {
    let line = line.trim();
    line.len() >= 40
        && line
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=' | '-' | '_'))
        && line.chars().any(|c| c.is_ascii_digit())
}

/// Trims lines, collapses inner whitespace and keeps at most one blank line in a row.
fn collapse_lines(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    for line in text.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() && out.last().map_or(true, |last| last.is_empty()) {
            continue;
        }
        out.push(line);
    }
    while out.last().is_some_and(|last| last.is_empty()) {
        out.pop();
    }
    out.join("\n")
}

fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => (text[..index].trim_end().to_string(), true),
        None => (text.to_string(), false),
    }
}
