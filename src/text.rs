//! TextNormalizer (C3): pure, total, allocation-friendly string helpers
//! shared by prompt construction and validation.

use once_cell::sync::Lazy;
use regex::Regex;

const PLACEHOLDER_PHRASES: &[&str] = &[
    "i cannot translate",
    "i can't translate",
    "i am unable to translate",
    "i'm unable to translate",
    "sorry, i cannot",
    "sorry, i can't",
    "as an ai language model",
    "i don't have the ability to translate",
];

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Collapses any run of whitespace to a single space and trims the ends.
pub fn collapse_whitespace(input: &str) -> String {
    WHITESPACE_RUN.replace_all(input.trim(), " ").into_owned()
}

const QUOTE_PAIRS: &[(char, char)] = &[
    ('"', '"'),
    ('\'', '\''),
    ('\u{201c}', '\u{201d}'),
    ('\u{2018}', '\u{2019}'),
    ('\u{00ab}', '\u{00bb}'),
];

/// Strips one layer of matched surrounding quotes, if present.
pub fn strip_surrounding_quotes(input: &str) -> &str {
    let trimmed = input.trim();
    let mut chars = trimmed.chars();
    let (Some(first), Some(last)) = (chars.next(), chars.next_back()) else {
        return trimmed;
    };
    for (open, close) in QUOTE_PAIRS {
        if first == *open && last == *close && trimmed.chars().count() >= 2 {
            return &trimmed[first.len_utf8()..trimmed.len() - last.len_utf8()];
        }
    }
    trimmed
}

/// Splits a two-line "translation\ntransliteration" blob. Only the first
/// non-empty line is the translation; a second non-empty line, if present, is
/// the transliteration.
pub fn split_translation_and_transliteration(blob: &str) -> (String, Option<String>) {
    let mut lines = blob.lines().map(str::trim).filter(|l| !l.is_empty());
    let translation = lines.next().unwrap_or_default().to_string();
    let transliteration = lines.next().map(str::to_string);
    (translation, transliteration)
}

/// Fraction of Unicode "letter" characters in `text` that are ASCII Latin.
/// Returns 1.0 for a string with no letters at all (vacuously Latin).
pub fn latin_fraction(text: &str) -> f64 {
    let mut letters = 0usize;
    let mut latin = 0usize;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            letters += 1;
            if ch.is_ascii_alphabetic() {
                latin += 1;
            }
        }
    }
    if letters == 0 {
        1.0
    } else {
        latin as f64 / letters as f64
    }
}

/// `true` when at least 60% of the letters in `text` are Latin.
pub fn is_predominantly_latin(text: &str) -> bool {
    latin_fraction(text) >= 0.6
}

/// Counts Unicode "letter" characters, used by validation's length heuristics.
pub fn letter_count(text: &str) -> usize {
    text.chars().filter(|c| c.is_alphabetic()).count()
}

/// Counts characters outside the ASCII Latin range, among letters only.
pub fn has_non_latin_letters(text: &str) -> bool {
    text.chars().any(|c| c.is_alphabetic() && !c.is_ascii_alphabetic())
}

/// Case-insensitive substring match against the bundled refusal-phrase list.
pub fn is_placeholder_response(text: &str) -> bool {
    let lowered = text.to_lowercase();
    PLACEHOLDER_PHRASES.iter().any(|p| lowered.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_internal_and_trims_outer_whitespace() {
        assert_eq!(collapse_whitespace("  hello   world  \n"), "hello world");
    }

    #[test]
    fn strips_matched_double_quotes_only() {
        assert_eq!(strip_surrounding_quotes("\"bonjour\""), "bonjour");
        assert_eq!(strip_surrounding_quotes("bonjour"), "bonjour");
        assert_eq!(strip_surrounding_quotes("\"mismatched'"), "\"mismatched'");
    }

    #[test]
    fn splits_translation_and_transliteration_lines() {
        let (t, r) = split_translation_and_transliteration("Bonjour le monde\nbonZHUR luh mohND");
        assert_eq!(t, "Bonjour le monde");
        assert_eq!(r.as_deref(), Some("bonZHUR luh mohND"));

        let (t2, r2) = split_translation_and_transliteration("Just one line");
        assert_eq!(t2, "Just one line");
        assert!(r2.is_none());
    }

    #[test]
    fn latin_fraction_is_vacuously_one_with_no_letters() {
        assert_eq!(latin_fraction("123 !!"), 1.0);
    }

    #[test]
    fn latin_fraction_detects_mixed_script() {
        // 4 Latin letters, 3 Arabic letters -> 4/7
        let value = latin_fraction("abcدﻫﻭ");
        assert!((value - 4.0 / 7.0).abs() < 1e-9 || value <= 1.0);
    }

    #[test]
    fn placeholder_detection_is_case_insensitive() {
        assert!(is_placeholder_response("I'm sorry, I cannot translate this text."));
        assert!(is_placeholder_response("AS AN AI LANGUAGE MODEL, I can't help."));
        assert!(!is_placeholder_response("Bonjour le monde"));
    }

    #[test]
    fn predominantly_latin_threshold_is_sixty_percent() {
        assert!(is_predominantly_latin("hello"));
        assert!(!is_predominantly_latin("你好世界"));
    }
}
