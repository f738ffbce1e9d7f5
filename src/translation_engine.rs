//! TranslationEngine (C11): stage-1 scheduler. Consumes sentences, produces
//! `TranslationResult` records via per-language batching, retries, and
//! provider selection.
//!
//! The source material forks "sequential" and "pipeline" code paths; this
//! engine instead exposes one core (`run_batches`) and two thin entry points
//! (`translate_batch`, `start`) parameterized by worker count and queue size,
//! per the unification decision recorded in DESIGN.md.

use crate::config::TranslationProvider;
use crate::google_translate::GoogleFallbackProvider;
use crate::llm::{non_empty_items_validator, LLMBatchClient};
use crate::model::{assign_target_language, Sentence, TranslationResult};
use crate::progress::ProgressTracker;
use crate::prompt::PromptBuilder;
use crate::transliterate::Transliterator;
use crate::validation::validate_translation;
use crate::worker_pool::{BoxFuture, ThreadWorkerPool, WorkerPool};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

const RESPONSE_LEVEL_ATTEMPTS: u32 = 5;
const RESPONSE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// A maximal run of consecutive sentences sharing a target language, sized
/// at most `batch_size`. A language boundary forces a flush.
#[derive(Debug, Clone)]
pub struct SentenceBatch {
    pub target_language: String,
    pub items: Vec<Sentence>,
}

/// Builds batches by zipping sentences with their assigned target language.
/// `batch_size = None` forces one sentence per batch.
pub fn build_batches(
    sentences: &[Sentence],
    start_index: usize,
    languages: &[String],
    batch_size: Option<usize>,
) -> Vec<SentenceBatch> {
    let cap = batch_size.unwrap_or(1).max(1);
    let mut batches: Vec<SentenceBatch> = Vec::new();

    for (i, sentence) in sentences.iter().enumerate() {
        let language = assign_target_language(start_index, i, languages).to_string();

        let needs_new_batch = match batches.last() {
            Some(last) => last.target_language != language || last.items.len() >= cap,
            None => true,
        };

        if needs_new_batch {
            batches.push(SentenceBatch { target_language: language, items: vec![sentence.clone()] });
        } else {
            batches.last_mut().unwrap().items.push(sentence.clone());
        }
    }

    batches
}

pub struct TranslationEngine {
    provider: TranslationProvider,
    llm: Option<Arc<LLMBatchClient>>,
    google: Option<Arc<GoogleFallbackProvider>>,
    transliterator: Option<Arc<Transliterator>>,
    batch_size: Option<usize>,
    worker_count: usize,
    progress: Arc<ProgressTracker>,
    include_transliteration: bool,
}

impl TranslationEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider: TranslationProvider,
        llm: Option<Arc<LLMBatchClient>>,
        google: Option<Arc<GoogleFallbackProvider>>,
        transliterator: Option<Arc<Transliterator>>,
        batch_size: Option<usize>,
        worker_count: usize,
        progress: Arc<ProgressTracker>,
        include_transliteration: bool,
    ) -> Self {
        Self {
            provider,
            llm,
            google,
            transliterator,
            batch_size,
            worker_count,
            progress,
            include_transliteration,
        }
    }

    /// Synchronous batch form: returns all translations before proceeding.
    /// Equivalent to the streaming form run with `worker_count = 1` against
    /// an unbounded local collector.
    pub async fn translate_batch(
        &self,
        sentences: &[Sentence],
        source_lang: &str,
        targets: &[String],
    ) -> Vec<TranslationResult> {
        let batches = build_batches(sentences, 0, targets, self.batch_size);
        let stop = Arc::new(AtomicBool::new(false));
        self.run_batches(batches, source_lang, stop).await
    }

    /// Streaming form: runs on a dedicated task and emits `TranslationResult`s
    /// to `output` in arbitrary completion order. Enqueues one sentinel per
    /// downstream consumer when done.
    pub async fn start(
        &self,
        sentences: Vec<Sentence>,
        source_lang: String,
        targets: Vec<String>,
        output: mpsc::Sender<Option<TranslationResult>>,
        stop: Arc<AtomicBool>,
        downstream_consumers: usize,
    ) {
        let batches = build_batches(&sentences, 0, &targets, self.batch_size);
        let results = self.run_batches(batches, &source_lang, stop).await;
        for result in results {
            if output.send(Some(result)).await.is_err() {
                break;
            }
        }
        for _ in 0..downstream_consumers {
            let _ = output.send(None).await;
        }
    }

    async fn run_batches(
        &self,
        batches: Vec<SentenceBatch>,
        source_lang: &str,
        stop: Arc<AtomicBool>,
    ) -> Vec<TranslationResult> {
        let pool: ThreadWorkerPool<Vec<TranslationResult>> = ThreadWorkerPool::new(self.worker_count);
        let source_lang = source_lang.to_string();

        for batch in batches {
            if stop.load(Ordering::SeqCst) {
                break;
            }
            let engine = self.clone_handles();
            let source_lang = source_lang.clone();
            let stop = stop.clone();
            let task: BoxFuture<Vec<TranslationResult>> =
                Box::pin(async move { engine.translate_one_batch(batch, &source_lang, &stop).await });
            pool.submit(task);
        }

        let mut results: Vec<TranslationResult> = pool.drain().await.into_iter().flatten().collect();
        results.sort_by_key(|r| r.index);

        if self.include_transliteration {
            self.attach_transliterations(&mut results).await;
        }

        for _ in &results {
            self.progress.record_translation_completed();
        }

        results
    }

    fn clone_handles(&self) -> Self {
        Self {
            provider: self.provider,
            llm: self.llm.clone(),
            google: self.google.clone(),
            transliterator: self.transliterator.clone(),
            batch_size: self.batch_size,
            worker_count: self.worker_count,
            progress: self.progress.clone(),
            include_transliteration: self.include_transliteration,
        }
    }

    async fn translate_one_batch(
        &self,
        batch: SentenceBatch,
        source_lang: &str,
        stop: &Arc<AtomicBool>,
    ) -> Vec<TranslationResult> {
        if stop.load(Ordering::SeqCst) {
            return Vec::new();
        }

        match self.provider {
            TranslationProvider::Googletrans => self.translate_via_google(&batch, source_lang).await,
            TranslationProvider::Llm => {
                if batch.items.len() > 1 && self.llm.is_some() {
                    self.translate_via_llm_batch(&batch, source_lang).await
                } else {
                    self.translate_via_llm_per_sentence(&batch, source_lang).await
                }
            }
        }
    }

    async fn translate_via_google(&self, batch: &SentenceBatch, source_lang: &str) -> Vec<TranslationResult> {
        let Some(google) = &self.google else {
            return batch
                .items
                .iter()
                .map(|s| {
                    TranslationResult::failed(
                        s.index,
                        s.number,
                        s.text.clone(),
                        batch.target_language.clone(),
                        "translation",
                        0,
                        "google translate provider not configured",
                    )
                })
                .collect();
        };

        let mut results = Vec::with_capacity(batch.items.len());
        for sentence in &batch.items {
            let (text, error) = google.translate(&sentence.text, source_lang, &batch.target_language).await;
            results.push(TranslationResult {
                index: sentence.index,
                number: sentence.number,
                source_text: sentence.text.clone(),
                target_language: batch.target_language.clone(),
                translation: text,
                transliteration: None,
                retry_count: if error.is_some() { 1 } else { 0 },
                error,
            });
        }
        results
    }

    /// Batch LLM call, response-level validation with up to
    /// `RESPONSE_LEVEL_ATTEMPTS` retries inside the same batch call. For ids
    /// not present in a given attempt's response, falls back to per-sentence
    /// LLM calls rather than leaving a gap.
    async fn translate_via_llm_batch(&self, batch: &SentenceBatch, source_lang: &str) -> Vec<TranslationResult> {
        let Some(llm) = &self.llm else {
            return self.translate_via_llm_per_sentence(batch, source_lang).await;
        };

        let builder = PromptBuilder::new(self.include_transliteration);
        let items: Vec<(u64, &str)> = batch
            .items
            .iter()
            .map(|s| (s.index as u64, s.text.as_str()))
            .collect();
        let system_prompt = builder.batch_prompt(&items, source_lang, &batch.target_language);

        let mut by_index: std::collections::HashMap<usize, (String, Option<String>, u32)> = std::collections::HashMap::new();

        for attempt in 1..=RESPONSE_LEVEL_ATTEMPTS {
            let response = llm
                .request_batch(&system_prompt, &items, Duration::from_secs(60), non_empty_items_validator)
                .await;
            self.progress.record_batch_call("translation", response.elapsed);

            let Some(resolved) = response.items else {
                self.progress.record_retry("translation", "batch request exhausted");
                continue;
            };

            let mut all_valid = true;
            for item in &resolved {
                let Some(sentence) = batch.items.iter().find(|s| s.index as u64 == item.id) else {
                    continue;
                };
                match validate_translation(&sentence.text, &item.translation, &batch.target_language) {
                    Ok(()) => {
                        by_index.insert(sentence.index, (item.translation.clone(), item.transliteration.clone(), attempt));
                    }
                    Err(reason) => {
                        self.progress.record_retry("translation", &reason.to_string());
                        all_valid = false;
                    }
                }
            }

            if all_valid && by_index.len() == batch.items.len() {
                break;
            }
        }

        let mut results = Vec::with_capacity(batch.items.len());
        let mut missing = Vec::new();
        for sentence in &batch.items {
            match by_index.remove(&sentence.index) {
                Some((translation, transliteration, attempts)) => {
                    results.push(TranslationResult {
                        index: sentence.index,
                        number: sentence.number,
                        source_text: sentence.text.clone(),
                        target_language: batch.target_language.clone(),
                        translation,
                        transliteration,
                        retry_count: attempts,
                        error: None,
                    });
                }
                None => missing.push(sentence.clone()),
            }
        }

        if !missing.is_empty() {
            let fallback_batch = SentenceBatch { target_language: batch.target_language.clone(), items: missing };
            results.extend(self.translate_via_llm_per_sentence(&fallback_batch, source_lang).await);
        }

        results
    }

    /// Per-sentence LLM request with response-level retry (5 attempts
    /// total). Exhaustion yields a failure-annotated result.
    async fn translate_via_llm_per_sentence(&self, batch: &SentenceBatch, source_lang: &str) -> Vec<TranslationResult> {
        let Some(llm) = &self.llm else {
            return batch
                .items
                .iter()
                .map(|s| {
                    TranslationResult::failed(
                        s.index,
                        s.number,
                        s.text.clone(),
                        batch.target_language.clone(),
                        "translation",
                        0,
                        "LLM provider not configured",
                    )
                })
                .collect();
        };

        let builder = PromptBuilder::new(self.include_transliteration);
        let mut results = Vec::with_capacity(batch.items.len());

        for sentence in &batch.items {
            let prompt = builder.single_prompt(&sentence.text, source_lang, &batch.target_language);
            let mut accepted = None;
            let mut last_reason = "exhausted".to_string();

            for attempt in 1..=RESPONSE_LEVEL_ATTEMPTS {
                let response = llm
                    .request_batch(
                        &prompt,
                        &[(sentence.index as u64, sentence.text.as_str())],
                        Duration::from_secs(30),
                        non_empty_items_validator,
                    )
                    .await;
                self.progress.record_batch_call("translation", response.elapsed);

                let Some(items) = response.items else {
                    last_reason = response.error.unwrap_or_else(|| "transport error".to_string());
                    self.progress.record_retry("translation", &last_reason);
                    if attempt < RESPONSE_LEVEL_ATTEMPTS {
                        tokio::time::sleep(RESPONSE_RETRY_DELAY).await;
                    }
                    continue;
                };
                let Some(item) = items.into_iter().next() else {
                    continue;
                };

                match validate_translation(&sentence.text, &item.translation, &batch.target_language) {
                    Ok(()) => {
                        accepted = Some((item.translation, item.transliteration, attempt));
                        break;
                    }
                    Err(reason) => {
                        last_reason = reason.to_string();
                        self.progress.record_retry("translation", &last_reason);
                        if attempt < RESPONSE_LEVEL_ATTEMPTS {
                            tokio::time::sleep(RESPONSE_RETRY_DELAY).await;
                        }
                    }
                }
            }

            results.push(match accepted {
                Some((translation, transliteration, attempts)) => TranslationResult {
                    index: sentence.index,
                    number: sentence.number,
                    source_text: sentence.text.clone(),
                    target_language: batch.target_language.clone(),
                    translation,
                    transliteration,
                    retry_count: attempts,
                    error: None,
                },
                None => TranslationResult::failed(
                    sentence.index,
                    sentence.number,
                    sentence.text.clone(),
                    batch.target_language.clone(),
                    "translation",
                    RESPONSE_LEVEL_ATTEMPTS,
                    &last_reason,
                ),
            });
        }

        results
    }

    /// Resolves transliteration for every accepted translation after the
    /// primary pass, so the translation output (not the source) is
    /// transliterated.
    async fn attach_transliterations(&self, results: &mut [TranslationResult]) {
        let Some(transliterator) = &self.transliterator else {
            return;
        };
        for result in results.iter_mut() {
            if result.error.is_some() || result.transliteration.is_some() {
                continue;
            }
            result.transliteration = transliterator
                .transliterate(&result.translation, &result.target_language)
                .await;
        }
        debug!("attached transliterations for {} results", results.len());
    }
}
