//! Per-language script policies: the Unicode block each target language's
//! translation is expected to use, plus a prompt-enforcement instruction.
//! Used by both `prompt` (C5) and `validation` (C4).

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

pub struct ScriptPolicy {
    /// Canonical language key, e.g. "russian".
    pub key: &'static str,
    /// Alternate names/codes that resolve to this policy.
    pub aliases: &'static [&'static str],
    /// Human label for the expected script, used in prompts.
    pub script_label: &'static str,
    /// Unicode block pattern for the expected script.
    pub script_pattern: &'static str,
    /// Clause inserted into the prompt to enforce the script.
    pub instruction: &'static str,
}

impl ScriptPolicy {
    pub fn matches(&self, candidate: &str) -> bool {
        compiled_pattern(self.script_pattern).is_match(candidate)
    }

    pub fn count_matches(&self, text: &str) -> usize {
        let pattern = compiled_pattern(self.script_pattern);
        text.chars().filter(|c| pattern.is_match(&c.to_string())).count()
    }
}

pub const SCRIPT_ENFORCEMENT_SUFFIX: &str =
    "Do not mix scripts; the entire translation must use the script named above.";

/// Table of per-language script policies. Code-point ranges follow the
/// language's primary Unicode block.
pub static SCRIPT_POLICIES: &[ScriptPolicy] = &[
    ScriptPolicy {
        key: "russian",
        aliases: &["ru", "serbian", "sr", "ukrainian", "uk", "bulgarian", "bg"],
        script_label: "Cyrillic",
        script_pattern: r"[Ѐ-ӿ]",
        instruction: "Write the translation using the Cyrillic script only.",
    },
    ScriptPolicy {
        key: "greek",
        aliases: &["el"],
        script_label: "Greek",
        script_pattern: r"[Ͱ-Ͽ]",
        instruction: "Write the translation using the Greek script only.",
    },
    ScriptPolicy {
        key: "hindi",
        aliases: &["hi", "marathi", "mr", "sanskrit", "sa"],
        script_label: "Devanagari",
        script_pattern: r"[ऀ-ॿ]",
        instruction: "Write the translation using the Devanagari script only.",
    },
    ScriptPolicy {
        key: "bengali",
        aliases: &["bn"],
        script_label: "Bengali",
        script_pattern: r"[ঀ-৿]",
        instruction: "Write the translation using the Bengali script only.",
    },
    ScriptPolicy {
        key: "gujarati",
        aliases: &["gu"],
        script_label: "Gujarati",
        script_pattern: r"[઀-૿]",
        instruction: "Write the translation using the Gujarati script only.",
    },
    ScriptPolicy {
        key: "tamil",
        aliases: &["ta"],
        script_label: "Tamil",
        script_pattern: r"[஀-௿]",
        instruction:
            "Write the translation using the Tamil script only. Do not mix in Devanagari, Georgian, or Arabic letters.",
    },
    ScriptPolicy {
        key: "telugu",
        aliases: &["te"],
        script_label: "Telugu",
        script_pattern: r"[ఀ-౿]",
        instruction: "Write the translation using the Telugu script only.",
    },
    ScriptPolicy {
        key: "kannada",
        aliases: &["kn"],
        script_label: "Kannada",
        script_pattern: r"[ಀ-೿]",
        instruction:
            "Write the translation using the Kannada script only. Do not mix in Tamil, Devanagari, Georgian, or Arabic letters.",
    },
    ScriptPolicy {
        key: "malayalam",
        aliases: &["ml"],
        script_label: "Malayalam",
        script_pattern: r"[ഀ-ൿ]",
        instruction: "Write the translation using the Malayalam script only.",
    },
    ScriptPolicy {
        key: "punjabi",
        aliases: &["pa"],
        script_label: "Gurmukhi",
        script_pattern: r"[਀-੿]",
        instruction: "Write the translation using the Gurmukhi script only.",
    },
    ScriptPolicy {
        key: "sinhala",
        aliases: &["si"],
        script_label: "Sinhala",
        script_pattern: r"[඀-෿]",
        instruction: "Write the translation using the Sinhala script only.",
    },
    ScriptPolicy {
        key: "lao",
        aliases: &["lo"],
        script_label: "Lao",
        script_pattern: r"[຀-໿]",
        instruction: "Write the translation using the Lao script only.",
    },
    ScriptPolicy {
        key: "khmer",
        aliases: &["km"],
        script_label: "Khmer",
        script_pattern: r"[ក-៿]",
        instruction: "Write the translation using the Khmer script only, with standard Khmer word spacing.",
    },
    ScriptPolicy {
        key: "burmese",
        aliases: &["my"],
        script_label: "Myanmar",
        script_pattern: r"[က-႟]",
        instruction: "Write the translation using the Myanmar script only.",
    },
    ScriptPolicy {
        key: "thai",
        aliases: &["th"],
        script_label: "Thai",
        script_pattern: r"[฀-๿]",
        instruction: "Write the translation using the Thai script only.",
    },
    ScriptPolicy {
        key: "georgian",
        aliases: &["ka"],
        script_label: "Georgian",
        script_pattern: r"[Ⴀ-ჿ]",
        instruction: "Write the translation using the Georgian script only.",
    },
    ScriptPolicy {
        key: "armenian",
        aliases: &["hy"],
        script_label: "Armenian",
        script_pattern: r"[԰-֏]",
        instruction: "Write the translation using the Armenian script only.",
    },
    ScriptPolicy {
        key: "syriac",
        aliases: &["syr"],
        script_label: "Syriac",
        script_pattern: r"[܀-ݏ]",
        instruction: "Write the translation using the Syriac script only.",
    },
    ScriptPolicy {
        key: "arabic",
        aliases: &["ar"],
        script_label: "Arabic",
        script_pattern: r"[؀-ۿ]",
        instruction: "Write the translation using the Arabic script only, including full tashkīl diacritics.",
    },
    ScriptPolicy {
        key: "hebrew",
        aliases: &["he", "iw"],
        script_label: "Hebrew",
        script_pattern: r"[֐-׿]",
        instruction: "Write the translation using the Hebrew script only, including full niqqud diacritics.",
    },
];

static COMPILED_PATTERNS: Lazy<HashMap<&'static str, Regex>> = Lazy::new(|| {
    SCRIPT_POLICIES
        .iter()
        .map(|p| {
            (
                p.script_pattern,
                Regex::new(p.script_pattern).expect("static script patterns are valid regex"),
            )
        })
        .collect()
});

fn compiled_pattern(pattern: &'static str) -> &'static Regex {
    COMPILED_PATTERNS
        .get(pattern)
        .expect("pattern was registered from SCRIPT_POLICIES")
}

static POLICY_BY_ALIAS: Lazy<HashMap<&'static str, &'static ScriptPolicy>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for policy in SCRIPT_POLICIES {
        map.insert(policy.key, policy);
        for alias in policy.aliases {
            map.insert(alias, policy);
        }
    }
    map
});

/// Languages where whitespace segmentation is meaningful and validated.
pub const SEGMENTATION_LANGUAGES: &[&str] = &[
    "thai", "th", "khmer", "km", "burmese", "my", "japanese", "ja", "korean", "ko", "chinese",
    "zh",
];

/// Looks up the script policy for a language name or code (case-insensitive).
pub fn script_policy_for(language: &str) -> Option<&'static ScriptPolicy> {
    POLICY_BY_ALIAS.get(language.to_lowercase().as_str()).copied()
}

/// Returns the prompt clause for a language's script policy, if any.
pub fn script_prompt_instructions(language: &str) -> Option<String> {
    script_policy_for(language).map(|p| format!("{} {}", p.instruction, SCRIPT_ENFORCEMENT_SUFFIX))
}

/// Counts letters that fall into each script family present in `text`.
/// Returns `(expected_count, other_non_latin_count, dominant_other_label)`.
pub fn script_counts(text: &str, expected: &ScriptPolicy) -> ScriptCounts {
    let mut other_counts: HashMap<&'static str, usize> = HashMap::new();

    for policy in SCRIPT_POLICIES {
        if std::ptr::eq(policy, expected) {
            continue;
        }
        let count = policy.count_matches(text);
        if count > 0 {
            *other_counts.entry(policy.script_label).or_insert(0) += count;
        }
    }
    let expected_count = expected.count_matches(text);

    let total_other_count: usize = other_counts.values().sum();
    let dominant_label = other_counts.iter().max_by_key(|&(_, count)| *count).map(|(&label, _)| label);

    ScriptCounts {
        expected_count,
        other_count: total_other_count,
        dominant_other_label: if total_other_count > 0 { dominant_label } else { None },
    }
}

pub struct ScriptCounts {
    pub expected_count: usize,
    pub other_count: usize,
    pub dominant_other_label: Option<&'static str>,
}

pub fn is_segmentation_language(language: &str) -> bool {
    SEGMENTATION_LANGUAGES.contains(&language.to_lowercase().as_str())
}

pub fn is_khmer(language: &str) -> bool {
    matches!(language.to_lowercase().as_str(), "khmer" | "km")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_policy_by_code_and_name() {
        assert!(script_policy_for("ar").is_some());
        assert!(script_policy_for("Arabic").is_some());
        assert!(script_policy_for("klingon").is_none());
    }

    #[test]
    fn arabic_policy_matches_arabic_text() {
        let policy = script_policy_for("arabic").unwrap();
        assert!(policy.matches("مرحبا"));
        assert!(!policy.matches("hello"));
    }

    #[test]
    fn prompt_instruction_includes_enforcement_suffix() {
        let instructions = script_prompt_instructions("tamil").unwrap();
        assert!(instructions.contains("Tamil script"));
        assert!(instructions.contains("Do not mix scripts"));
    }

    #[test]
    fn segmentation_languages_include_khmer_and_cjk() {
        assert!(is_segmentation_language("khmer"));
        assert!(is_segmentation_language("zh"));
        assert!(!is_segmentation_language("french"));
        assert!(is_khmer("km"));
    }
}
