// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use regex::Regex;
use scraper::node::{Element, Node};
use scraper::{ElementRef, Html};
use std::sync::LazyLock;

use super::links::{classify, LinkVerdict};

// Preheader padding such as `&zwnj;&nbsp;&zwnj;&nbsp;...`
static ENTITY_SPAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:&(?:zwnj|zwj|nbsp|shy|#847|#8203|#8204|#8205|#173|#160|#xfeff|#x200c);\s*){3,}")
        .unwrap()
});

const SKIPPED: &[&str] = &[
    "script", "style", "head", "title", "meta", "link", "noscript", "template", "svg", "img",
    "object", "iframe",
];

const BLOCKS: &[&str] = &[
    "p", "div", "li", "tr", "h1", "h2", "h3", "h4", "h5", "h6", "table", "ul", "ol", "section",
    "article", "header", "footer", "blockquote", "pre", "hr", "center", "dl", "dt", "dd",
];

const TRACKER_HINTS: &[&str] = &["pixel", "beacon", "tracking", "tracker", "open-track"];

#[derive(Debug, Default)]
pub struct HtmlText {
    pub text: String,
    /// Anchors carrying an `href`.
    pub links: usize,
    /// Anchors whose target looked like a click tracker.
    pub tracking_links: usize,
}

pub fn html_to_text(markup: &str) -> HtmlText {
    let markup = ENTITY_SPAM.replace_all(markup, " ");
    let document = Html::parse_document(&markup);
    let mut out = HtmlText {
        text: String::with_capacity(markup.len() / 2),
        ..Default::default()
    };
    walk(document.root_element(), &mut out);
    out
}

fn walk(element: ElementRef<'_>, out: &mut HtmlText) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.text.push_str(text),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    visit(child, out);
                }
            }
            _ => {}
        }
    }
}

fn visit(element: ElementRef<'_>, out: &mut HtmlText) {
    let value = element.value();
    let name = value.name();
    if SKIPPED.contains(&name) || is_hidden(value) {
        return;
    }
    match name {
        "br" => {
            out.text.push('\n');
            return;
        }
        "td" | "th" => out.text.push(' '),
        "a" => {
            if let Some(href) = value.attr("href") {
                out.links += 1;
                if classify(href.trim()) == LinkVerdict::Remove {
                    out.tracking_links += 1;
                }
            }
        }
        _ => {}
    }

    let block = BLOCKS.contains(&name);
    if block {
        out.text.push('\n');
    }
    walk(element, out);
    if block {
        out.text.push('\n');
    }
}

fn is_hidden(element: &Element) -> bool {
    if element.attr("hidden").is_some() {
        return true;
    }
    if let Some(style) = element.attr("style") {
        let style: String = style
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        if style.contains("display:none") || style.contains("visibility:hidden") {
            return true;
        }
    }
    let id = element.id().unwrap_or_default().to_ascii_lowercase();
    element
        .classes()
        .map(str::to_ascii_lowercase)
        .chain(std::iter::once(id))
        .any(|name| TRACKER_HINTS.iter().any(|hint| name.contains(hint)))
}
