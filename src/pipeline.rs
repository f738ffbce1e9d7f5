//! PipelineCoordinator (C14): wires TranslationEngine -> MediaEngine ->
//! BatchExporter via bounded queues, manages start/stop, propagates
//! cancellation, drains on shutdown.

use crate::media::MediaEngine;
use crate::model::{Sentence, TranslationResult};
use crate::progress::{ProgressSnapshot, ProgressTracker};
use crate::translation_engine::TranslationEngine;
use crate::batch_exporter::BatchExporter;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tracing::info;

/// Summary emitted once a run's three stages have all drained.
#[derive(Debug, Clone)]
pub struct PipelineStats {
    pub total_sentences: usize,
    pub elapsed: std::time::Duration,
    pub snapshot: ProgressSnapshot,
}

pub struct PipelineCoordinator {
    translation_engine: Arc<TranslationEngine>,
    media_engine: Arc<MediaEngine>,
    exporter: Arc<BatchExporter>,
    progress: Arc<ProgressTracker>,
    media_worker_count: usize,
    queue_size: usize,
}

impl PipelineCoordinator {
    pub fn new(
        translation_engine: Arc<TranslationEngine>,
        media_engine: Arc<MediaEngine>,
        exporter: Arc<BatchExporter>,
        progress: Arc<ProgressTracker>,
        media_worker_count: usize,
        queue_size: usize,
    ) -> Self {
        Self {
            translation_engine,
            media_engine,
            exporter,
            progress,
            media_worker_count: media_worker_count.max(1),
            queue_size: queue_size.max(1),
        }
    }

    /// Runs one pipeline pass to completion (or until `stop` is observed and
    /// all in-flight work drains). No producer enqueues past the stop flag;
    /// the exporter drops any unflushed tail when cancellation was seen.
    pub async fn run(
        &self,
        sentences: Vec<Sentence>,
        source_lang: String,
        targets: Vec<String>,
        stop: Arc<AtomicBool>,
    ) -> PipelineStats {
        let start = Instant::now();
        let total = sentences.len();
        self.progress.raise_total(total);
        info!(total, "pipeline run starting");

        let (translation_tx, translation_rx) = mpsc::channel::<Option<TranslationResult>>(self.queue_size);
        let shared_translation_rx = Arc::new(Mutex::new(translation_rx));
        let (media_tx, media_rx) = mpsc::channel(self.queue_size);

        let translation_task = {
            let engine = self.translation_engine.clone();
            let stop = stop.clone();
            let worker_count = self.media_worker_count;
            tokio::spawn(async move {
                engine.start(sentences, source_lang, targets, translation_tx, stop, worker_count).await;
            })
        };

        let media_task = {
            let engine = self.media_engine.clone();
            let stop = stop.clone();
            let worker_count = self.media_worker_count;
            tokio::spawn(async move {
                engine.run(shared_translation_rx, media_tx, worker_count, total, stop).await;
            })
        };

        let exporter_task = {
            let exporter = self.exporter.clone();
            let worker_count = self.media_worker_count;
            let stop = stop.clone();
            tokio::spawn(async move {
                exporter.run(media_rx, worker_count, stop).await;
            })
        };

        let _ = tokio::join!(translation_task, media_task, exporter_task);

        let snapshot = self.progress.snapshot();
        info!(
            completed = snapshot.completed_media,
            total,
            elapsed_secs = start.elapsed().as_secs_f64(),
            "pipeline run finished"
        );

        PipelineStats { total_sentences: total, elapsed: start.elapsed(), snapshot }
    }
}

/// Prints a short human-readable run summary, matching the CLI's plain-text
/// reporting style.
pub fn print_summary(stats: &PipelineStats) {
    println!();
    println!("Translation pipeline complete");
    println!("  sentences:        {}", stats.total_sentences);
    println!("  translated:       {}", stats.snapshot.completed_translation);
    println!("  media produced:   {}", stats.snapshot.completed_media);
    println!("  elapsed:          {:.2}s", stats.elapsed.as_secs_f64());
    if !stats.snapshot.retries.is_empty() {
        println!("  retries:");
        for (stage, reasons) in &stats.snapshot.retries {
            let total: u64 = reasons.values().sum();
            println!("    {stage}: {total}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch_exporter::BatchWriter;
    use crate::config::TranslationProvider;
    use crate::error::Result as PipelineResult;
    use crate::model::{BatchWindow, MediaItem};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicBool;

    struct NoopWriter;

    #[async_trait]
    impl BatchWriter for NoopWriter {
        async fn write_batch(&self, _window: BatchWindow, _items: Vec<MediaItem>) -> PipelineResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn run_drains_all_three_stages_without_a_provider() {
        let progress = crate::progress::shared(0);
        let translation_engine = Arc::new(TranslationEngine::new(
            TranslationProvider::Llm,
            None,
            None,
            None,
            None,
            2,
            progress.clone(),
            false,
        ));
        let media_engine = Arc::new(MediaEngine::new(
            None,
            "en".to_string(),
            false,
            crate::media::AudioOptions::default(),
            progress.clone(),
        ));
        let exporter = Arc::new(BatchExporter::new(Arc::new(NoopWriter), 2));
        let coordinator = PipelineCoordinator::new(translation_engine, media_engine, exporter, progress, 2, 8);

        let sentences = vec![
            Sentence { index: 0, number: 1, text: "Hello.".to_string() },
            Sentence { index: 1, number: 2, text: "World.".to_string() },
        ];
        let targets = vec!["fr".to_string(), "fr".to_string()];
        let stop = Arc::new(AtomicBool::new(false));

        let stats = coordinator.run(sentences, "en".to_string(), targets, stop).await;
        assert_eq!(stats.total_sentences, 2);
        assert_eq!(stats.snapshot.completed_media, 2);
    }
}
