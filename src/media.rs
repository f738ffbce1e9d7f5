//! MediaEngine (C12): stage-2 scheduler. Consumes `TranslationResult`s,
//! produces per-sentence `MediaItem`s via an injected `MediaSynthesizer`.
//! Preserves no particular completion order; the exporter recovers order by
//! `index`.

use crate::model::{AudioSegment, MediaItem, TranslationResult};
use crate::progress::ProgressTracker;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

/// A receiver shared across worker tasks. `mpsc::Receiver` has a single
/// owner; workers take turns behind this lock to pull the next item.
pub type SharedReceiver<T> = Arc<Mutex<mpsc::Receiver<T>>>;

/// Voice/tempo/reading-speed knobs passed through to the synthesizer
/// untouched; the engine does not interpret them.
#[derive(Debug, Clone, Default)]
pub struct AudioOptions {
    pub voice_id: Option<String>,
    pub tempo: Option<f64>,
    pub reading_speed: Option<f64>,
}

/// The TTS/compositing dependency the engine consumes.
#[async_trait]
pub trait MediaSynthesizer: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    async fn synthesize(
        &self,
        index: usize,
        number: usize,
        source_text: &str,
        translation: &str,
        source_lang: &str,
        target_lang: &str,
        total: usize,
        options: &AudioOptions,
    ) -> Option<Box<dyn AudioSegment>>;
}

/// Builds the short formatted header + source + translation + optional
/// transliteration block used by later rendering.
pub fn build_video_block(number: usize, source_text: &str, translation: &str, transliteration: Option<&str>) -> String {
    let mut block = format!("[{number}]\n{source_text}\n{translation}");
    if let Some(translit) = transliteration {
        block.push('\n');
        block.push_str(translit);
    }
    block
}

pub struct MediaEngine {
    synthesizer: Option<Arc<dyn MediaSynthesizer>>,
    source_lang: String,
    generate_audio: bool,
    audio_options: AudioOptions,
    progress: Arc<ProgressTracker>,
}

impl MediaEngine {
    pub fn new(
        synthesizer: Option<Arc<dyn MediaSynthesizer>>,
        source_lang: String,
        generate_audio: bool,
        audio_options: AudioOptions,
        progress: Arc<ProgressTracker>,
    ) -> Self {
        Self { synthesizer, source_lang, generate_audio, audio_options, progress }
    }

    /// Runs `worker_count` workers pulling from `input` and pushing to
    /// `output`. Each worker forwards an upstream sentinel once it has seen
    /// one, so the coordinator's sentinel count downstream is unaffected.
    pub async fn run(
        self: Arc<Self>,
        input: SharedReceiver<Option<TranslationResult>>,
        output: mpsc::Sender<Option<MediaItem>>,
        worker_count: usize,
        total: usize,
        stop: Arc<AtomicBool>,
    ) {
        let mut workers = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let engine = self.clone();
            let input = input.clone();
            let output = output.clone();
            let stop = stop.clone();
            workers.push(tokio::spawn(async move {
                engine.worker_loop(input, output, total, stop).await;
            }));
        }
        for worker in workers {
            let _ = worker.await;
        }
    }

    async fn worker_loop(
        &self,
        input: SharedReceiver<Option<TranslationResult>>,
        output: mpsc::Sender<Option<MediaItem>>,
        total: usize,
        stop: Arc<AtomicBool>,
    ) {
        loop {
            let received = {
                let mut guard = input.lock().await;
                tokio::time::timeout(Duration::from_millis(200), guard.recv()).await
            };
            let received = match received {
                Ok(Some(item)) => item,
                Ok(None) => break,
                Err(_) => {
                    if stop.load(Ordering::SeqCst) {
                        break;
                    }
                    continue;
                }
            };

            let Some(result) = received else {
                let _ = output.send(None).await;
                break;
            };

            if stop.load(Ordering::SeqCst) {
                continue;
            }

            let item = self.synthesize_one(result, total).await;
            self.progress.record_media_completed();
            if output.send(Some(item)).await.is_err() {
                break;
            }
        }
    }

    async fn synthesize_one(&self, result: TranslationResult, total: usize) -> MediaItem {
        let audio = if self.generate_audio {
            match &self.synthesizer {
                Some(synth) => {
                    synth
                        .synthesize(
                            result.index,
                            result.number,
                            &result.source_text,
                            &result.translation,
                            &self.source_lang,
                            &result.target_language,
                            total,
                            &self.audio_options,
                        )
                        .await
                }
                None => None,
            }
        } else {
            None
        };

        let video_block = build_video_block(
            result.number,
            &result.source_text,
            &result.translation,
            result.transliteration.as_deref(),
        );

        debug!(index = result.index, has_audio = audio.is_some(), "media item produced");

        MediaItem {
            index: result.index,
            number: result.number,
            target_language: result.target_language,
            sentence: result.source_text,
            translation: result.translation,
            transliteration: result.transliteration,
            audio,
            video_block,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_block_includes_transliteration_when_present() {
        let block = build_video_block(3, "Hello", "Bonjour", Some("bonZHOOR"));
        assert!(block.starts_with("[3]"));
        assert!(block.contains("Hello"));
        assert!(block.contains("Bonjour"));
        assert!(block.contains("bonZHOOR"));
    }

    #[test]
    fn video_block_omits_transliteration_line_when_absent() {
        let block = build_video_block(1, "Hi", "Salut", None);
        assert_eq!(block, "[1]\nHi\nSalut");
    }

    #[tokio::test]
    async fn synthesize_one_skips_audio_when_generation_disabled() {
        let progress = Arc::new(ProgressTracker::new(1));
        let engine = MediaEngine::new(None, "en".to_string(), false, AudioOptions::default(), progress);
        let result = TranslationResult {
            index: 0,
            number: 1,
            source_text: "Hello".to_string(),
            target_language: "fr".to_string(),
            translation: "Bonjour".to_string(),
            transliteration: None,
            retry_count: 0,
            error: None,
        };
        let item = engine.synthesize_one(result, 1).await;
        assert!(item.audio.is_none());
        assert!(item.video_block.contains("Bonjour"));
    }
}
