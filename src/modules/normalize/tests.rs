// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::Arc;

use super::boilerplate::cut_trailing_boilerplate;
use super::header::{clean_sender, clean_subject, NO_SUBJECT, UNKNOWN_SENDER};
use super::language::LanguageIdentifier;
use super::links::{classify, scrub_links, LinkVerdict};
use super::{ContentNormalizer, NormalizerConfig};
use crate::modules::common::Addr;
use crate::modules::message::RawMessage;

fn normalizer() -> ContentNormalizer {
    ContentNormalizer::new(
        NormalizerConfig::default(),
        Arc::new(LanguageIdentifier::new()),
    )
}

fn plain(text: &str) -> RawMessage {
    RawMessage {
        uid: 1,
        plain: Some(text.into()),
        ..Default::default()
    }
}

#[test]
fn test_html_conversion_drops_invisible_content() {
    let raw = RawMessage {
        uid: 1,
        html: Some(
            r#"<html><head><title>Promo</title><style>p{color:red}</style></head>
<body><div style="display: none">preheader text</div>
<p>Hello&nbsp;Anna,</p><p>Your order has shipped and will arrive on Monday.</p>
<p><a href="https://click.shop.example.com/ls/click?upn=abc">Track package</a></p>
<img class="tracking-pixel" src="https://t.example.com/o.gif">
<script>var x = 1;</script></body></html>"#
                .into(),
        ),
        ..Default::default()
    };
    let content = normalizer().normalize(&raw);
    assert!(content.body.contains("Hello Anna,"));
    assert!(content.body.contains("Your order has shipped"));
    assert!(!content.body.contains("preheader"));
    assert!(!content.body.contains("var x"));
    assert!(!content.body.contains("Promo"));
    assert!(!content.body.contains("click.shop"));
    assert_eq!(content.link_count, 1);
    assert_eq!(content.tracking_links_removed, 1);
    assert!(content.original_length > content.body.chars().count());
}

#[test]
fn test_plain_part_preferred_when_substantial() {
    let raw = RawMessage {
        plain: Some("This is the plain text version of the note.".into()),
        html: Some("<p>HTML version</p>".into()),
        ..Default::default()
    };
    let content = normalizer().normalize(&raw);
    assert_eq!(content.body, "This is the plain text version of the note.");
    assert_eq!(content.original_length, content.body.chars().count());
}

#[test]
fn test_trivial_plain_part_falls_back_to_markup() {
    let raw = RawMessage {
        plain: Some("Hi".into()),
        html: Some("<p>This is the full HTML message body for you.</p>".into()),
        ..Default::default()
    };
    let content = normalizer().normalize(&raw);
    assert_eq!(content.body, "This is the full HTML message body for you.");
}

#[test]
fn test_zero_width_characters_are_stripped() {
    let content = normalizer().normalize(&plain(
        "Hel\u{200B}lo there,\u{FEFF} this is a normal sentence with hidden marks.",
    ));
    assert_eq!(
        content.body,
        "Hello there, this is a normal sentence with hidden marks."
    );
}

#[test]
fn test_bare_tracking_line_is_dropped() {
    let content = normalizer().normalize(&plain(
        "Please see the attached agenda for tomorrow.\nhttps://click.example.com/abc123\nSee you then.",
    ));
    assert_eq!(
        content.body,
        "Please see the attached agenda for tomorrow.\nSee you then."
    );
    assert_eq!(content.link_count, 1);
    assert_eq!(content.tracking_links_removed, 1);
}

#[test]
fn test_bare_content_links_stay_on_their_line() {
    let content = normalizer().normalize(&plain(
        "Here is the guide we discussed:\nhttps://example.com/docs/guide\nAnd the article:\nhttps://example.com/article?id=7&utm_source=newsletter\nThanks.",
    ));
    assert_eq!(
        content.body,
        "Here is the guide we discussed:\nhttps://example.com/docs/guide\nAnd the article:\nhttps://example.com/article?id=7\nThanks."
    );
    assert_eq!(content.link_count, 2);
    assert_eq!(content.tracking_links_removed, 0);
}

#[test]
fn test_link_classification() {
    assert_eq!(
        classify("https://click.example.com/abc"),
        LinkVerdict::Remove
    );
    assert_eq!(
        classify("https://shop.example.com/p/8f3a9c2e7b1d4f6a0c5e9b2d7f1a3c8e6b0d4f2a"),
        LinkVerdict::Remove
    );
    assert_eq!(
        classify("https://example.com/article?id=7&utm_source=newsletter&utm_medium=email"),
        LinkVerdict::Rewrite("https://example.com/article?id=7".into())
    );
    assert_eq!(
        classify("https://example.com/docs/guide"),
        LinkVerdict::Keep
    );
}

#[test]
fn test_inline_links_are_scrubbed() {
    let scan = scrub_links("Read https://example.com/a?utm_source=x. Then https://click.example.net/x");
    assert_eq!(scan.text, "Read https://example.com/a. Then [link removed]");
    assert_eq!(scan.links, 2);
    assert_eq!(scan.removed, 1);
}

#[test]
fn test_signature_block_is_cut() {
    let (text, cut) = cut_trailing_boilerplate(
        "Hi Sam,\nThe report is ready.\nThanks\n--\nJohn Smith\nAcme Corp",
    );
    assert!(cut);
    assert_eq!(text, "Hi Sam,\nThe report is ready.\nThanks");
}

#[test]
fn test_first_line_is_never_cut() {
    let (text, cut) = cut_trailing_boilerplate("Unsubscribe from this list");
    assert!(!cut);
    assert_eq!(text, "Unsubscribe from this list");

    let (text, cut) = cut_trailing_boilerplate("Unsubscribe now\nmore text follows here");
    assert!(!cut);
    assert_eq!(text, "Unsubscribe now\nmore text follows here");
}

#[test]
fn test_unsubscribe_footer_is_cut() {
    let content = normalizer().normalize(&plain(
        "Your invoice for July is attached to this message.\n\nYou received this email because you are a customer.\nUnsubscribe | Privacy Policy",
    ));
    assert!(content.boilerplate_removed);
    assert_eq!(
        content.body,
        "Your invoice for July is attached to this message."
    );
}

#[test]
fn test_subject_prefixes_are_stripped() {
    assert_eq!(
        clean_subject(Some("Re: RE: Fwd:  Project   update")),
        "Project update"
    );
    assert_eq!(clean_subject(Some("AW: WG: Angebot")), "Angebot");
    assert_eq!(clean_subject(Some("   ")), NO_SUBJECT);
    assert_eq!(clean_subject(None), NO_SUBJECT);
}

#[test]
fn test_sender_fallbacks() {
    let address_only = Addr {
        name: None,
        address: Some("jane.doe@example.com".into()),
    };
    assert_eq!(clean_sender(Some(&address_only)), "jane.doe");
    assert_eq!(clean_sender(None), UNKNOWN_SENDER);
}

#[test]
fn test_body_is_truncated_to_max_chars() {
    let normalizer = ContentNormalizer::new(
        NormalizerConfig {
            max_body_chars: 10,
            ..Default::default()
        },
        Arc::new(LanguageIdentifier::new()),
    );
    let content = normalizer.normalize(&plain(
        "abcdefghij klmnopqrst uvwxyz and a few more words to go past the limit",
    ));
    assert!(content.truncated);
    assert_eq!(content.body, "abcdefghij");
}

#[test]
fn test_garbage_input_degrades_gracefully() {
    let raw = RawMessage::parse(1, "INBOX", &[0xff, 0xfe, 0x00, 0x01], None);
    let content = normalizer().normalize(&raw);
    assert_eq!(content.sender, UNKNOWN_SENDER);
    assert_eq!(content.subject, NO_SUBJECT);

    let empty = normalizer().normalize(&RawMessage::default());
    assert!(empty.body.is_empty());
    assert_eq!(empty.language_confidence, 0.0);
}

#[test]
fn test_language_identification() {
    let identifier = LanguageIdentifier::new();

    let english = identifier.identify(
        "Thank you for your inquiry; I would be happy to schedule a meeting next week.",
    );
    assert_eq!(english.tag, "en");
    assert!(english.confidence > 0.8);

    let german = identifier.identify(
        "Vielen Dank für Ihre Nachricht, wir werden uns bald bei Ihnen melden und die Unterlagen schicken.",
    );
    assert_eq!(german.tag, "de");

    let russian = identifier.identify("Спасибо за письмо, я отвечу завтра.");
    assert_eq!(russian.tag, "ru");
    assert!(russian.confidence > 0.99);

    let nothing = identifier.identify("12345 !!! ---");
    assert_eq!(nothing.tag, "und");
    assert_eq!(nothing.confidence, 0.0);
}
