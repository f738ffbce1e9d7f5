//! BatchExporter (C13): stage-3 serializer. Accumulates an ordered window of
//! media-complete sentences and, at configurable boundaries, writes one
//! HTML/PDF/MP3/MP4 batch via a single-worker export executor.

use crate::error::Result;
use crate::model::{BatchWindow, MediaItem};
use crate::worker_pool::{BoxFuture, ThreadWorkerPool, WorkerPool};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// The document/audio/video writer the exporter drives. One call per
/// committed batch window; writes run serialized (single export worker).
#[async_trait]
pub trait BatchWriter: Send + Sync {
    async fn write_batch(&self, window: BatchWindow, items: Vec<MediaItem>) -> Result<()>;
}

pub struct BatchExporter {
    writer: Arc<dyn BatchWriter>,
    sentences_per_batch: usize,
}

impl BatchExporter {
    pub fn new(writer: Arc<dyn BatchWriter>, sentences_per_batch: usize) -> Self {
        Self { writer, sentences_per_batch: sentences_per_batch.max(1) }
    }

    /// Drains `input` until it has seen `upstream_sentinels` `None`s and its
    /// buffer is empty. Submits committed windows to a single-worker export
    /// executor so batch writes never interleave within a run.
    pub async fn run(
        &self,
        mut input: mpsc::Receiver<Option<MediaItem>>,
        upstream_sentinels: usize,
        stop: Arc<AtomicBool>,
    ) {
        let executor: ThreadWorkerPool<Result<()>> = ThreadWorkerPool::new(1);
        let mut buffer: HashMap<usize, MediaItem> = HashMap::new();
        let mut next_index = 0usize;
        let mut accumulator: Vec<MediaItem> = Vec::new();
        let mut batch_start_number: Option<usize> = None;
        let mut sentinels_seen = 0usize;

        loop {
            let received = tokio::time::timeout(Duration::from_millis(200), input.recv()).await;
            let item = match received {
                Ok(Some(Some(item))) => item,
                Ok(Some(None)) => {
                    sentinels_seen += 1;
                    if sentinels_seen >= upstream_sentinels && buffer.is_empty() {
                        break;
                    }
                    continue;
                }
                Ok(None) => break,
                Err(_) => {
                    if stop.load(Ordering::SeqCst) && sentinels_seen >= upstream_sentinels && buffer.is_empty() {
                        break;
                    }
                    continue;
                }
            };

            buffer.insert(item.index, item);

            while let Some(next) = buffer.remove(&next_index) {
                if batch_start_number.is_none() {
                    batch_start_number = Some(next.number);
                }
                let number = next.number;
                accumulator.push(next);
                next_index += 1;

                if number % self.sentences_per_batch == 0 && !stop.load(Ordering::SeqCst) {
                    self.submit_batch(&executor, &mut accumulator, &mut batch_start_number, number);
                }
            }

            if sentinels_seen >= upstream_sentinels && buffer.is_empty() {
                break;
            }
        }

        if !accumulator.is_empty() && !stop.load(Ordering::SeqCst) {
            let last_number = accumulator.last().map(|i| i.number).unwrap_or(0);
            self.submit_batch(&executor, &mut accumulator, &mut batch_start_number, last_number);
        } else if !accumulator.is_empty() {
            info!(count = accumulator.len(), "dropping unflushed tail batch after stop");
        }

        for outcome in executor.drain().await {
            if let Err(e) = outcome {
                warn!("batch export failed: {e}");
            }
        }
    }

    fn submit_batch(
        &self,
        executor: &ThreadWorkerPool<Result<()>>,
        accumulator: &mut Vec<MediaItem>,
        batch_start_number: &mut Option<usize>,
        last_number: usize,
    ) {
        let first_number = batch_start_number.take().unwrap_or(last_number);
        let window = BatchWindow { first_number, last_number };
        let items = std::mem::take(accumulator);
        let writer = self.writer.clone();
        info!(first = first_number, last = last_number, count = items.len(), "submitting batch for export");
        let task: BoxFuture<Result<()>> = Box::pin(async move { writer.write_batch(window, items).await });
        executor.submit(task);
    }
}
