// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use ahash::{AHashMap, AHashSet};

/// Tag reported when no language can be determined.
pub const UNDETERMINED: &str = "und";

/// Share of function words in ordinary prose; above it evidence saturates.
const FUNCTION_WORD_SHARE: f32 = 0.35;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Script {
    Latin,
    Cyrillic,
    Greek,
    Arabic,
    Hebrew,
    Kana,
    Hangul,
    Han,
}

impl Script {
    const ALL: [Script; 8] = [
        Script::Han,
        Script::Hangul,
        Script::Kana,
        Script::Hebrew,
        Script::Arabic,
        Script::Greek,
        Script::Cyrillic,
        Script::Latin,
    ];

    fn of(c: char) -> Option<Script> {
        if !c.is_alphabetic() {
            return None;
        }
        let script = match c as u32 {
            0x0041..=0x024F | 0x1E00..=0x1EFF => Script::Latin,
            0x0370..=0x03FF | 0x1F00..=0x1FFF => Script::Greek,
            0x0400..=0x052F => Script::Cyrillic,
            0x0590..=0x05FF => Script::Hebrew,
            0x0600..=0x06FF | 0x0750..=0x077F => Script::Arabic,
            0x3040..=0x30FF | 0x31F0..=0x31FF => Script::Kana,
            0x1100..=0x11FF | 0x3130..=0x318F | 0xAC00..=0xD7AF => Script::Hangul,
            0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xF900..=0xFAFF => Script::Han,
            _ => return None,
        };
        Some(script)
    }

    fn tag(self) -> &'static str {
        match self {
            Script::Latin => UNDETERMINED,
            Script::Cyrillic => "ru",
            Script::Greek => "el",
            Script::Arabic => "ar",
            Script::Hebrew => "he",
            Script::Kana => "ja",
            Script::Hangul => "ko",
            Script::Han => "zh",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LanguageGuess {
    pub tag: String,
    /// 0.0 to 1.0
    pub confidence: f32,
}

impl LanguageGuess {
    fn undetermined() -> Self {
        Self {
            tag: UNDETERMINED.into(),
            confidence: 0.0,
        }
    }
}

/// Script and function-word based language identifier.
///
/// Building it compiles the word profiles once; share it behind an `Arc`.
pub struct LanguageIdentifier {
    profiles: Vec<(&'static str, AHashSet<&'static str>)>,
}

const PROFILES: &[(&str, &[&str])] = &[
    (
        "en",
        &[
            "the", "and", "of", "to", "a", "in", "is", "it", "you", "that", "was", "for", "on",
            "are", "with", "as", "i", "be", "at", "have", "this", "from", "or", "had", "by",
            "but", "not", "what", "all", "were", "we", "when", "your", "can", "there", "an",
            "which", "do", "if", "will", "would", "could", "should", "our", "my", "me", "please",
            "thanks", "thank", "hello", "hi", "regards", "been", "has", "they", "them", "about",
            "how", "any", "just", "so", "here", "let", "know",
        ],
    ),
    (
        "de",
        &[
            "der", "die", "und", "in", "den", "von", "zu", "das", "mit", "sich", "des", "auf",
            "für", "ist", "im", "dem", "nicht", "ein", "eine", "als", "auch", "es", "an", "werden",
            "aus", "er", "hat", "dass", "sie", "nach", "wird", "bei", "einer", "um", "am", "sind",
            "noch", "wie", "einem", "über", "einen", "so", "zum", "ich", "wir", "ihr", "bitte",
            "danke", "grüße", "ihnen", "haben",
        ],
    ),
    (
        "fr",
        &[
            "de", "la", "le", "et", "les", "des", "en", "un", "du", "une", "que", "est", "pour",
            "qui", "dans", "par", "plus", "pas", "au", "sur", "ne", "se", "ce", "il", "sont",
            "aux", "avec", "nous", "vous", "je", "mais", "ou", "son", "sa", "cette", "merci",
            "bonjour", "votre", "vos", "être", "avez", "très",
        ],
    ),
    (
        "es",
        &[
            "de", "la", "que", "el", "en", "y", "a", "los", "del", "se", "las", "por", "un",
            "para", "con", "no", "una", "su", "al", "lo", "como", "más", "pero", "sus", "le",
            "ya", "o", "este", "sí", "porque", "esta", "entre", "cuando", "muy", "sin", "sobre",
            "también", "me", "hola", "gracias", "usted", "saludos", "estoy",
        ],
    ),
    (
        "it",
        &[
            "di", "e", "il", "la", "che", "è", "per", "un", "in", "del", "non", "una", "a", "da",
            "sono", "con", "le", "si", "dei", "della", "gli", "come", "anche", "nel", "ma", "alla",
            "più", "questo", "ci", "ho", "grazie", "ciao", "buongiorno", "saluti", "sua", "lei",
        ],
    ),
    (
        "nl",
        &[
            "de", "en", "van", "het", "een", "in", "is", "dat", "op", "te", "zijn", "voor", "met",
            "die", "niet", "aan", "er", "om", "ook", "als", "bij", "maar", "wordt", "uit", "nog",
            "wel", "naar", "kan", "dan", "ik", "je", "wij", "u", "bedankt", "groeten", "hallo",
        ],
    ),
    (
        "pt",
        &[
            "de", "a", "o", "que", "e", "do", "da", "em", "um", "para", "é", "com", "não", "uma",
            "os", "no", "se", "na", "por", "mais", "as", "dos", "como", "mas", "foi", "ao", "ele",
            "das", "tem", "à", "seu", "sua", "ou", "ser", "quando", "muito", "obrigado",
            "obrigada", "olá", "você", "atenciosamente",
        ],
    ),
];

impl Default for LanguageIdentifier {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageIdentifier {
    pub fn new() -> Self {
        let profiles = PROFILES
            .iter()
            .map(|(tag, words)| (*tag, words.iter().copied().collect()))
            .collect();
        Self { profiles }
    }

    pub fn identify(&self, text: &str) -> LanguageGuess {
        let mut scripts: AHashMap<Script, usize> = AHashMap::new();
        let mut letters = 0usize;
        for c in text.chars().filter(|c| c.is_alphabetic()) {
            letters += 1;
            if let Some(script) = Script::of(c) {
                *scripts.entry(script).or_default() += 1;
            }
        }
        if letters == 0 {
            return LanguageGuess::undetermined();
        }

        // Japanese text mixes kana with Han characters.
        if let (Some(&han), Some(&kana)) = (scripts.get(&Script::Han), scripts.get(&Script::Kana)) {
            scripts.insert(Script::Kana, han + kana);
            scripts.remove(&Script::Han);
        }

        // fixed scan order keeps ties deterministic
        let Some((script, count)) = Script::ALL
            .iter()
            .filter_map(|script| scripts.get(script).map(|count| (*script, *count)))
            .max_by_key(|(_, count)| *count)
        else {
            return LanguageGuess::undetermined();
        };
        let share = count as f32 / letters as f32;
        if script != Script::Latin {
            return LanguageGuess {
                tag: script.tag().into(),
                confidence: share.min(1.0),
            };
        }
        self.identify_latin(text, share)
    }

    fn identify_latin(&self, text: &str, latin_share: f32) -> LanguageGuess {
        let words: Vec<String> = text
            .split(|c: char| !c.is_alphabetic())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();
        if words.is_empty() {
            return LanguageGuess::undetermined();
        }

        let mut hits: Vec<(&'static str, usize)> = self
            .profiles
            .iter()
            .map(|(tag, profile)| {
                let count = words.iter().filter(|w| profile.contains(w.as_str())).count();
                (*tag, count)
            })
            .collect();
        // stable: ties keep profile order
        hits.sort_by(|a, b| b.1.cmp(&a.1));

        let (tag, best) = hits[0];
        let second = hits.get(1).map(|h| h.1).unwrap_or(0);
        if best == 0 {
            return LanguageGuess {
                tag: UNDETERMINED.into(),
                confidence: latin_share * 0.4,
            };
        }

        let evidence = (best as f32 / words.len() as f32 / FUNCTION_WORD_SHARE).min(1.0);
        let margin = (best - second) as f32 / best as f32;
        let confidence = latin_share * (0.4 + 0.6 * evidence * (0.5 + 0.5 * margin));
        LanguageGuess {
            tag: tag.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}
