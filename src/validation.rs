//! ValidationPolicy (C4): decides whether an LLM translation or
//! transliteration output is acceptable. Pure function of its inputs; never
//! retries or performs I/O.

use crate::language::{self, is_khmer, is_segmentation_language, script_policy_for};
use crate::text::{is_placeholder_response, is_predominantly_latin, letter_count};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    InvalidOrPlaceholder,
    TransliterationInsteadOfTranslation,
    TooShort,
    MissingRequiredDiacritics,
    UnexpectedScriptUsed,
    SegmentationFailure,
    Empty,
    NonLatinReceived,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            RejectReason::InvalidOrPlaceholder => "invalid or placeholder response",
            RejectReason::TransliterationInsteadOfTranslation => {
                "transliteration returned instead of translation"
            }
            RejectReason::TooShort => "translation shorter than expected",
            RejectReason::MissingRequiredDiacritics => "missing required diacritics",
            RejectReason::UnexpectedScriptUsed => "unexpected script used",
            RejectReason::SegmentationFailure => "segmentation failure",
            RejectReason::Empty => "empty",
            RejectReason::NonLatinReceived => "non-Latin received",
        };
        write!(f, "{text}")
    }
}

pub type ValidationResult = std::result::Result<(), RejectReason>;

/// Diacritic code ranges required when the target script is actually
/// present: Arabic tashkīl, Hebrew niqqud.
fn required_diacritic_range(language: &str) -> Option<(char, char)> {
    match language.to_lowercase().as_str() {
        "arabic" | "ar" => Some(('\u{064B}', '\u{0652}')),
        "hebrew" | "he" | "iw" => Some(('\u{0591}', '\u{05BD}')),
        _ => None,
    }
}

pub fn validate_translation(source: &str, candidate: &str, target_language: &str) -> ValidationResult {
    let candidate = candidate.trim();

    // 1. Invalid or placeholder.
    if candidate.is_empty() || is_placeholder_response(candidate) {
        return Err(RejectReason::InvalidOrPlaceholder);
    }

    // 2. Transliteration returned instead of translation.
    let source_has_non_latin = crate::text::has_non_latin_letters(source);
    let target_policy = script_policy_for(target_language);
    if source_has_non_latin && target_policy.is_some() && is_predominantly_latin(candidate) {
        return Err(RejectReason::TransliterationInsteadOfTranslation);
    }

    // 3. Translation shorter than expected.
    let source_letters = letter_count(source);
    let candidate_letters = letter_count(candidate);
    if source_letters > 12 {
        let ratio = candidate_letters as f64 / source_letters as f64;
        if (source_letters >= 80 && candidate_letters < 15) || (source_letters >= 30 && ratio < 0.28) {
            return Err(RejectReason::TooShort);
        }
    }

    // 4. Missing required diacritics (only if the expected script is present).
    if let Some((lo, hi)) = required_diacritic_range(target_language) {
        if let Some(policy) = target_policy {
            if policy.matches(candidate) && !candidate.chars().any(|c| c >= lo && c <= hi) {
                return Err(RejectReason::MissingRequiredDiacritics);
            }
        }
    }

    // 5. Unexpected script used.
    if let Some(policy) = target_policy {
        if crate::text::has_non_latin_letters(candidate) {
            let counts = language::script_counts(candidate, policy);
            let total_non_latin = counts.expected_count + counts.other_count;
            if total_non_latin > 0 {
                let ratio = counts.expected_count as f64 / total_non_latin as f64;
                let tolerance = (2.0_f64).max(counts.expected_count as f64 * 0.10);
                if counts.dominant_other_label.is_some() && ratio < 0.85
                    || counts.other_count as f64 > tolerance
                {
                    return Err(RejectReason::UnexpectedScriptUsed);
                }
            }
        }
    }

    // 6. Segmentation failure.
    if is_segmentation_language(target_language) {
        let source_words = source.split_whitespace().count();
        if source_words > 1 {
            let tokens: Vec<&str> = candidate.split_whitespace().collect();
            let khmer = is_khmer(target_language);

            if tokens.len() <= 1 {
                return Err(RejectReason::SegmentationFailure);
            }

            if khmer {
                let short_tokens = tokens.iter().filter(|t| t.chars().count() <= 2).count();
                if short_tokens as f64 / tokens.len() as f64 > 0.10 {
                    return Err(RejectReason::SegmentationFailure);
                }
            }

            let (min_required, max_allowed) = if khmer {
                (
                    (2.0_f64).max(0.6 * source_words as f64) as usize,
                    ((2 * source_words) as f64).max(min_required_khmer(source_words) as f64 + 1.0) as usize,
                )
            } else {
                (
                    (4.0_f64).max(0.6 * source_words as f64) as usize,
                    source_words * 4,
                )
            };

            if tokens.len() < min_required || tokens.len() > max_allowed {
                return Err(RejectReason::SegmentationFailure);
            }
        }
    }

    Ok(())
}

fn min_required_khmer(source_words: usize) -> usize {
    (2.0_f64).max(0.6 * source_words as f64) as usize
}

pub fn validate_transliteration(candidate: &str) -> ValidationResult {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return Err(RejectReason::Empty);
    }
    if !is_predominantly_latin(candidate) {
        return Err(RejectReason::NonLatinReceived);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_candidate() {
        assert_eq!(
            validate_translation("Hello there friend", "", "french"),
            Err(RejectReason::InvalidOrPlaceholder)
        );
    }

    #[test]
    fn rejects_placeholder_response() {
        assert_eq!(
            validate_translation("Hello", "I'm sorry, I cannot translate this.", "french"),
            Err(RejectReason::InvalidOrPlaceholder)
        );
    }

    #[test]
    fn rejects_transliteration_for_non_latin_target() {
        let result = validate_translation("مرحبا بكم في هذا المكان الجميل اليوم", "marhaban bikum", "arabic");
        assert_eq!(result, Err(RejectReason::TransliterationInsteadOfTranslation));
    }

    #[test]
    fn accepts_arabic_with_diacritics() {
        let source = "Welcome to this wonderful place today and every single day we meet here";
        let candidate = "مَرْحَبًا بِكُمْ فِي هَذَا الْمَكَانِ الْجَمِيلِ الْيَوْمَ وَكُلَّ يَوْمٍ نَلْتَقِي هُنَا";
        assert_eq!(validate_translation(source, candidate, "arabic"), Ok(()));
    }

    #[test]
    fn rejects_arabic_missing_diacritics() {
        let source = "Welcome to this wonderful place today and every single day we meet here";
        let candidate = "مرحبا بكم في هذا المكان الجميل اليوم وكل يوم نلتقي هنا";
        assert_eq!(
            validate_translation(source, candidate, "arabic"),
            Err(RejectReason::MissingRequiredDiacritics)
        );
    }

    #[test]
    fn short_source_sentences_skip_the_length_check() {
        // Source letter-count <= 12 is ignored entirely by rule 3.
        assert_eq!(validate_translation("Hi there.", "Salut.", "french"), Ok(()));
    }

    #[test]
    fn rejects_too_short_translation_for_long_source() {
        let source = "This is a reasonably long sentence that should translate to something of comparable length overall";
        assert_eq!(
            validate_translation(source, "Court.", "french"),
            Err(RejectReason::TooShort)
        );
    }

    #[test]
    fn transliteration_rejects_empty_and_non_latin() {
        assert_eq!(validate_transliteration(""), Err(RejectReason::Empty));
        assert_eq!(
            validate_transliteration("мир"),
            Err(RejectReason::NonLatinReceived)
        );
        assert_eq!(validate_transliteration("mir"), Ok(()));
    }

    #[test]
    fn single_word_source_skips_segmentation_check() {
        assert_eq!(validate_translation("Hello", "สวัสดี", "thai"), Ok(()));
    }
}
