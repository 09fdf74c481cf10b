// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use regex::{Captures, Regex};
use std::sync::LazyLock;
use url::Url;

pub static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:https?://|www\.)[^\s<>"'()\[\]{}]+"#).unwrap()
});

pub const LINK_PLACEHOLDER: &str = "[link removed]";

/// Host labels that only ever serve click redirects.
const REDIRECT_HOST_PREFIXES: &[&str] = &[
    "click.", "clicks.", "track.", "tracking.", "trk.", "links.", "link.", "lnk.", "go.",
    "email.", "e.", "r.", "t.", "ct.", "url",
];

const REDIRECT_DOMAINS: &[&str] = &[
    "list-manage.com",
    "mailchi.mp",
    "sendgrid.net",
    "mandrillapp.com",
    "mailgun.org",
    "hubspotlinks.com",
    "safelinks.protection.outlook.com",
    "urldefense.com",
    "urldefense.proofpoint.com",
    "exct.net",
    "rs6.net",
];

const REDIRECT_PATH_MARKERS: &[&str] = &[
    "/click", "/track", "/redirect", "/redir", "/ls/click", "/wf/click", "/r/", "/c/", "/l/",
];

const TRACKING_PARAM_PREFIXES: &[&str] = &["utm_", "trk", "track", "mc_", "_hs"];

const TRACKING_PARAMS: &[&str] = &[
    "_ri_", "eid", "mid", "cid", "fbclid", "gclid", "dclid", "msclkid", "yclid", "ref_src",
    "oly_anon_id", "oly_enc_id", "vero_id", "mkt_tok",
];

/// Longest path segment or query value still considered human-readable.
const OPAQUE_TOKEN_LEN: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkVerdict {
    Keep,
    /// Same destination with tracking parameters dropped.
    Rewrite(String),
    Remove,
}

pub struct LinkScan {
    pub text: String,
    pub links: usize,
    pub removed: usize,
}

fn parse(link: &str) -> Option<Url> {
    let candidate = if link.len() >= 4 && link[..4].eq_ignore_ascii_case("www.") {
        format!("http://{}", link)
    } else {
        link.to_string()
    };
    let url = Url::parse(&candidate).ok()?;
    url.host_str()?;
    Some(url)
}

fn is_opaque(token: &str) -> bool {
    token.len() >= OPAQUE_TOKEN_LEN
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '=' | '%' | '~'))
}

fn is_tracking_param(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    TRACKING_PARAMS.contains(&name.as_str())
        || TRACKING_PARAM_PREFIXES
            .iter()
            .any(|prefix| name.starts_with(prefix))
}

fn is_redirect(url: &Url) -> bool {
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    if REDIRECT_HOST_PREFIXES
        .iter()
        .any(|prefix| host.starts_with(prefix))
        || REDIRECT_DOMAINS
            .iter()
            .any(|domain| host == *domain || host.ends_with(&format!(".{}", domain)))
    {
        return true;
    }

    let path = url.path().to_ascii_lowercase();
    if REDIRECT_PATH_MARKERS
        .iter()
        .any(|marker| path.contains(marker))
    {
        return true;
    }

    // a destination URL smuggled inside the path or a query value
    let decoded_path = urlencoding::decode(url.path())
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| url.path().to_string());
    if decoded_path.contains("http://") || decoded_path.contains("https://") {
        return true;
    }
    url.query_pairs().any(|(_, value)| {
        let value = value.to_ascii_lowercase();
        value.starts_with("http://") || value.starts_with("https://")
    })
}

fn has_opaque_token(url: &Url) -> bool {
    let in_path = url
        .path_segments()
        .map(|mut segments| segments.any(is_opaque))
        .unwrap_or(false);
    in_path
        || url
            .query_pairs()
            .any(|(name, value)| !is_tracking_param(&name) && is_opaque(&value))
}

/// Decides what happens to a link. The link itself is never requested.
pub fn classify(link: &str) -> LinkVerdict {
    let Some(mut url) = parse(link) else {
        return LinkVerdict::Keep;
    };
    if is_redirect(&url) || has_opaque_token(&url) {
        return LinkVerdict::Remove;
    }

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let kept: Vec<&(String, String)> = pairs
        .iter()
        .filter(|(name, _)| !is_tracking_param(name))
        .collect();
    if kept.len() == pairs.len() {
        return LinkVerdict::Keep;
    }

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }
    let mut rewritten = url.to_string();
    if !link.contains("://") {
        rewritten = rewritten.trim_start_matches("http://").to_string();
    }
    LinkVerdict::Rewrite(rewritten)
}

/// Splits trailing sentence punctuation off a matched link.
fn split_trailing(link: &str) -> (&str, &str) {
    let trimmed = link.trim_end_matches(['.', ',', ';', ':', '!', '?']);
    link.split_at(trimmed.len())
}

/// Rewrites or removes every link found in running text.
pub fn scrub_links(text: &str) -> LinkScan {
    let mut links = 0;
    let mut removed = 0;
    let text = URL_PATTERN
        .replace_all(text, |caps: &Captures| {
            let (link, tail) = split_trailing(&caps[0]);
            links += 1;
            match classify(link) {
                LinkVerdict::Keep => format!("{}{}", link, tail),
                LinkVerdict::Rewrite(clean) => format!("{}{}", clean, tail),
                LinkVerdict::Remove => {
                    removed += 1;
                    format!("{}{}", LINK_PLACEHOLDER, tail)
                }
            }
        })
        .into_owned();
    LinkScan {
        text,
        links,
        removed,
    }
}

/// True when the whole line is one link.
pub fn is_bare_link(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty()
        && URL_PATTERN
            .find(line)
            .is_some_and(|m| m.start() == 0 && split_trailing(line).0.len() <= m.end())
}
