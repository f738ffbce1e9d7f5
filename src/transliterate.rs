//! Transliterator (C8): local rule-based transliteration first, LLM fallback
//! when local output is empty, a placeholder, or a failure annotation.

use crate::llm::{non_empty_items_validator, LLMBatchClient};
use crate::progress::ProgressTracker;
use crate::prompt::PromptBuilder;
use crate::text::is_placeholder_response;
use crate::validation::validate_transliteration;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransliterationMode {
    /// Rule-based engine only; no LLM fallback.
    RuleBasedOnly,
    #[default]
    RuleBasedThenLlm,
}

/// A local, deterministic rule-based transliteration engine. Returns `None`
/// when it has no rule for the input's script.
pub trait RuleBasedTransliterator: Send + Sync {
    fn transliterate(&self, text: &str, target_language: &str) -> Option<String>;
}

/// Minimal reference implementation: passes Latin-script input through
/// unchanged and otherwise declines (a real engine would map non-Latin
/// scripts phonetically).
pub struct PassthroughTransliterator;

impl RuleBasedTransliterator for PassthroughTransliterator {
    fn transliterate(&self, text: &str, _target_language: &str) -> Option<String> {
        if crate::text::is_predominantly_latin(text) {
            Some(text.to_string())
        } else {
            None
        }
    }
}

pub struct Transliterator {
    mode: TransliterationMode,
    rules: Arc<dyn RuleBasedTransliterator>,
    llm: Option<Arc<LLMBatchClient>>,
    prompt_builder: PromptBuilder,
    progress: Arc<ProgressTracker>,
}

impl Transliterator {
    pub fn new(
        mode: TransliterationMode,
        rules: Arc<dyn RuleBasedTransliterator>,
        llm: Option<Arc<LLMBatchClient>>,
        progress: Arc<ProgressTracker>,
    ) -> Self {
        Self {
            mode,
            rules,
            llm,
            prompt_builder: PromptBuilder::new(false),
            progress,
        }
    }

    pub async fn transliterate(&self, translation: &str, target_language: &str) -> Option<String> {
        let local = self.rules.transliterate(translation, target_language);
        let local_acceptable = local
            .as_deref()
            .map(|s| !s.trim().is_empty() && !is_placeholder_response(s))
            .unwrap_or(false);

        if local_acceptable {
            return local;
        }
        if self.mode == TransliterationMode::RuleBasedOnly {
            return local;
        }

        let Some(llm) = &self.llm else { return local };

        let prompt = self.prompt_builder.single_prompt(translation, target_language, target_language);
        let response = llm
            .request_batch(
                &prompt,
                &[(0, translation)],
                Duration::from_secs(30),
                non_empty_items_validator,
            )
            .await;

        let Some(items) = response.items else {
            self.progress.record_retry("transliteration", "llm fallback exhausted");
            return local;
        };
        let Some(candidate) = items.into_iter().next().map(|i| i.translation) else {
            return local;
        };

        match validate_transliteration(&candidate) {
            Ok(()) => Some(candidate),
            Err(reason) => {
                self.progress.record_retry("transliteration", &reason.to_string());
                local
            }
        }
    }

    /// Batch transliteration: runs the local pass over every item first;
    /// anything left empty goes through one LLM batch call, then per-item
    /// fallback for any item the batch call rejects.
    pub async fn transliterate_batch(&self, translations: &[String], target_language: &str) -> Vec<Option<String>> {
        let mut results: Vec<Option<String>> = translations
            .iter()
            .map(|t| self.rules.transliterate(t, target_language))
            .collect();

        if self.mode == TransliterationMode::RuleBasedOnly {
            return results;
        }

        let pending: Vec<(usize, &String)> = translations
            .iter()
            .enumerate()
            .filter(|(i, _)| {
                !results[*i]
                    .as_deref()
                    .map(|s| !s.trim().is_empty() && !is_placeholder_response(s))
                    .unwrap_or(false)
            })
            .collect();

        if pending.len() <= 1 {
            for (i, text) in pending {
                results[i] = self.transliterate(text, target_language).await;
            }
            return results;
        }

        let Some(llm) = &self.llm else {
            return results;
        };

        let items: Vec<(u64, &str)> = pending.iter().map(|(i, t)| (*i as u64, t.as_str())).collect();
        let response = llm
            .request_batch(
                "Transliterate each sentence into Latin script, one per item.",
                &items,
                Duration::from_secs(30),
                non_empty_items_validator,
            )
            .await;

        let Some(resolved) = response.items else {
            for (i, text) in pending {
                results[i] = self.transliterate(text, target_language).await;
            }
            return results;
        };

        let mut by_id: std::collections::HashMap<u64, String> =
            resolved.into_iter().map(|item| (item.id, item.translation)).collect();

        for (i, text) in pending {
            match by_id.remove(&(i as u64)) {
                Some(candidate) if validate_transliteration(&candidate).is_ok() => {
                    results[i] = Some(candidate);
                }
                _ => {
                    results[i] = self.transliterate(text, target_language).await;
                }
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rule_based_only_mode_never_calls_llm() {
        let progress = Arc::new(ProgressTracker::new(1));
        let transliterator = Transliterator::new(
            TransliterationMode::RuleBasedOnly,
            Arc::new(PassthroughTransliterator),
            None,
            progress,
        );
        let result = transliterator.transliterate("bonjour", "fr").await;
        assert_eq!(result.as_deref(), Some("bonjour"));
    }

    #[tokio::test]
    async fn falls_back_to_local_result_without_llm_client() {
        let progress = Arc::new(ProgressTracker::new(1));
        let transliterator = Transliterator::new(
            TransliterationMode::RuleBasedThenLlm,
            Arc::new(PassthroughTransliterator),
            None,
            progress,
        );
        // Non-Latin input: passthrough rules decline, no LLM configured, so
        // the (empty) local result is returned rather than panicking.
        let result = transliterator.transliterate("你好", "zh").await;
        assert!(result.is_none());
    }
}
