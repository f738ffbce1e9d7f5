//! PromptBuilder (C5): produces prompts for single and batched translation
//! and transliteration requests.

use crate::language::{is_segmentation_language, script_prompt_instructions};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// (code, name) pairs for prompt descriptors. Not exhaustive; covers the
/// languages the script-policy table names plus common majors.
static LANGUAGE_TABLE: &[(&str, &str)] = &[
    ("en", "English"),
    ("fr", "French"),
    ("es", "Spanish"),
    ("de", "German"),
    ("it", "Italian"),
    ("pt", "Portuguese"),
    ("nl", "Dutch"),
    ("pl", "Polish"),
    ("ru", "Russian"),
    ("uk", "Ukrainian"),
    ("sr", "Serbian"),
    ("bg", "Bulgarian"),
    ("el", "Greek"),
    ("hi", "Hindi"),
    ("mr", "Marathi"),
    ("sa", "Sanskrit"),
    ("bn", "Bengali"),
    ("gu", "Gujarati"),
    ("ta", "Tamil"),
    ("te", "Telugu"),
    ("kn", "Kannada"),
    ("ml", "Malayalam"),
    ("pa", "Punjabi"),
    ("si", "Sinhala"),
    ("lo", "Lao"),
    ("km", "Khmer"),
    ("my", "Burmese"),
    ("th", "Thai"),
    ("ka", "Georgian"),
    ("hy", "Armenian"),
    ("syr", "Syriac"),
    ("ar", "Arabic"),
    ("he", "Hebrew"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("zh", "Chinese"),
    ("rom", "Romani"),
    ("ro", "Romanian"),
    ("ps", "Pashto"),
    ("ur", "Urdu"),
];

static CODE_TO_NAME: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| LANGUAGE_TABLE.iter().copied().collect());

/// Pairs of languages prone to being confused by the model, requiring an
/// explicit disambiguation clause.
static DIALECT_DISAMBIGUATION: &[(&str, &str)] = &[
    ("rom", "Romani is a distinct language from Romanian; do not substitute one for the other."),
    ("ps", "Pashto is a distinct language from Urdu and Hindi; do not substitute one for the other."),
];

/// Human-readable "Name (code)" descriptor, falling back to the raw code if
/// unrecognized.
pub fn descriptor(code_or_name: &str) -> String {
    let lower = code_or_name.to_lowercase();
    if let Some(name) = CODE_TO_NAME.get(lower.as_str()) {
        format!("{name} ({lower})")
    } else {
        code_or_name.to_string()
    }
}

pub struct PromptBuilder {
    pub include_transliteration: bool,
}

impl PromptBuilder {
    pub fn new(include_transliteration: bool) -> Self {
        Self { include_transliteration }
    }

    /// Builds a single-sentence translation prompt.
    pub fn single_prompt(&self, source: &str, source_lang: &str, target_lang: &str) -> String {
        let mut lines = vec![
            format!(
                "1. Translate the following {} text into {}.",
                descriptor(source_lang),
                descriptor(target_lang)
            ),
            format!("2. Source text: {source}"),
        ];

        let mut clause_number = 3;
        if is_segmentation_language(target_lang) {
            lines.push(format!(
                "{clause_number}. The target language uses whitespace-significant word boundaries; separate words with single spaces, e.g. \"word1 word2 word3\"."
            ));
            clause_number += 1;
        }
        if let Some(instruction) = script_prompt_instructions(target_lang) {
            lines.push(format!("{clause_number}. {instruction}"));
            clause_number += 1;
        }
        if let Some((_, clause)) = DIALECT_DISAMBIGUATION
            .iter()
            .find(|(code, _)| *code == target_lang.to_lowercase())
        {
            lines.push(format!("{clause_number}. {clause}"));
            clause_number += 1;
        }
        if self.include_transliteration {
            lines.push(format!(
                "{clause_number}. If appropriate, append a transliteration on the second line with no labels."
            ));
            clause_number += 1;
        }
        lines.push(format!(
            "{clause_number}. Provide only the translated text on the first line."
        ));

        lines.join("\n")
    }

    /// Builds a batch prompt instructing strict JSON output for `items`
    /// sentences, each `(id, text)`.
    pub fn batch_prompt(&self, items: &[(u64, &str)], source_lang: &str, target_lang: &str) -> String {
        let mut instructions = vec![
            format!(
                "Translate each of the following {} sentences into {}.",
                descriptor(source_lang),
                descriptor(target_lang)
            ),
            "Return only valid JSON of this exact shape, with no markdown fences and no echo of the source:".to_string(),
            "{\"items\": [{\"id\": <int>, \"translation\": \"<single line>\"".to_string()
                + if self.include_transliteration {
                    ", \"transliteration\": \"<single line, optional>\""
                } else {
                    ""
                }
                + "}]}",
        ];

        if let Some(instruction) = script_prompt_instructions(target_lang) {
            instructions.push(instruction);
        }

        let items_json: Vec<String> = items
            .iter()
            .map(|(id, text)| format!("{{\"id\": {id}, \"text\": {text:?}}}"))
            .collect();
        instructions.push(format!("Sentences: [{}]", items_json.join(", ")));

        instructions.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_falls_back_for_unknown_codes() {
        assert_eq!(descriptor("fr"), "French (fr)");
        assert_eq!(descriptor("xx-unknown"), "xx-unknown");
    }

    #[test]
    fn single_prompt_ends_with_first_line_instruction() {
        let builder = PromptBuilder::new(false);
        let prompt = builder.single_prompt("Hello.", "en", "fr");
        assert!(prompt.ends_with("Provide only the translated text on the first line."));
    }

    #[test]
    fn single_prompt_adds_script_clause_for_arabic() {
        let builder = PromptBuilder::new(false);
        let prompt = builder.single_prompt("Hello.", "en", "arabic");
        assert!(prompt.contains("Arabic script"));
    }

    #[test]
    fn single_prompt_adds_dialect_disambiguation_for_pashto() {
        let builder = PromptBuilder::new(false);
        let prompt = builder.single_prompt("Hello.", "en", "ps");
        assert!(prompt.contains("distinct language from Urdu"));
    }

    #[test]
    fn batch_prompt_requests_items_json_shape() {
        let builder = PromptBuilder::new(true);
        let prompt = builder.batch_prompt(&[(1, "Hello."), (2, "World.")], "en", "fr");
        assert!(prompt.contains("\"items\""));
        assert!(prompt.contains("transliteration"));
        assert!(prompt.contains("\"id\": 1"));
    }
}
