//! ProgressTracker (C10): thread-safe counters shared by every stage.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct BatchStats {
    pub calls: u64,
    pub total_elapsed: Duration,
}

impl BatchStats {
    pub fn record(&mut self, elapsed: Duration) {
        self.calls += 1;
        self.total_elapsed += elapsed;
    }

    pub fn average(&self) -> Duration {
        if self.calls == 0 {
            Duration::ZERO
        } else {
            self.total_elapsed / self.calls as u32
        }
    }
}

/// Immutable point-in-time view published to subscribers.
#[derive(Debug, Clone)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub completed_translation: usize,
    pub completed_media: usize,
    pub retries: HashMap<String, HashMap<String, u64>>,
    pub batch_stats: HashMap<String, BatchStats>,
    pub sentences_per_second: f64,
}

struct Inner {
    retries: HashMap<String, HashMap<String, u64>>,
    batch_stats: HashMap<String, BatchStats>,
    started_at: Instant,
    subscribers: Vec<Box<dyn Fn(&ProgressSnapshot) + Send>>,
}

/// Thread-safe counters: sentences completed, retries keyed by (stage,
/// reason), batch statistics. All mutation is constant-time and
/// lock-protected.
pub struct ProgressTracker {
    total: AtomicUsize,
    completed_translation: AtomicUsize,
    completed_media: AtomicUsize,
    inner: Mutex<Inner>,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total: AtomicUsize::new(total),
            completed_translation: AtomicUsize::new(0),
            completed_media: AtomicUsize::new(0),
            inner: Mutex::new(Inner {
                retries: HashMap::new(),
                batch_stats: HashMap::new(),
                started_at: Instant::now(),
                subscribers: Vec::new(),
            }),
        }
    }

    /// Adjusts `total` upward if the translation stage discovers more
    /// sentences than originally estimated. Never decreases.
    pub fn raise_total(&self, new_total: usize) {
        self.total.fetch_max(new_total, Ordering::SeqCst);
    }

    pub fn record_translation_completed(&self) {
        self.completed_translation.fetch_add(1, Ordering::SeqCst);
        self.publish();
    }

    pub fn record_media_completed(&self) {
        self.completed_media.fetch_add(1, Ordering::SeqCst);
        self.publish();
    }

    pub fn record_retry(&self, stage: &str, reason: &str) {
        let mut inner = self.inner.lock();
        *inner
            .retries
            .entry(stage.to_string())
            .or_default()
            .entry(reason.to_string())
            .or_insert(0) += 1;
        drop(inner);
        self.publish();
    }

    pub fn record_batch_call(&self, stage: &str, elapsed: Duration) {
        let mut inner = self.inner.lock();
        inner.batch_stats.entry(stage.to_string()).or_default().record(elapsed);
        drop(inner);
        self.publish();
    }

    pub fn subscribe(&self, callback: impl Fn(&ProgressSnapshot) + Send + 'static) {
        self.inner.lock().subscribers.push(Box::new(callback));
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let inner = self.inner.lock();
        let completed = self.completed_translation.load(Ordering::SeqCst);
        let elapsed = inner.started_at.elapsed().as_secs_f64().max(1e-9);
        ProgressSnapshot {
            total: self.total.load(Ordering::SeqCst),
            completed_translation: completed,
            completed_media: self.completed_media.load(Ordering::SeqCst),
            retries: inner.retries.clone(),
            batch_stats: inner.batch_stats.clone(),
            sentences_per_second: completed as f64 / elapsed,
        }
    }

    fn publish(&self) {
        let snapshot = self.snapshot();
        let inner = self.inner.lock();
        for subscriber in &inner.subscribers {
            subscriber(&snapshot);
        }
    }

    pub fn retry_count(&self, stage: &str, reason: &str) -> u64 {
        self.inner
            .lock()
            .retries
            .get(stage)
            .and_then(|m| m.get(reason))
            .copied()
            .unwrap_or(0)
    }
}

pub fn shared(total: usize) -> Arc<ProgressTracker> {
    Arc::new(ProgressTracker::new(total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize as StdAtomicUsize;

    #[test]
    fn raise_total_never_decreases() {
        let tracker = ProgressTracker::new(10);
        tracker.raise_total(5);
        assert_eq!(tracker.snapshot().total, 10);
        tracker.raise_total(20);
        assert_eq!(tracker.snapshot().total, 20);
    }

    #[test]
    fn retry_counter_is_keyed_by_stage_and_reason() {
        let tracker = ProgressTracker::new(1);
        tracker.record_retry("translation", "transliteration returned instead of translation");
        tracker.record_retry("translation", "transliteration returned instead of translation");
        tracker.record_retry("translation", "too short");
        assert_eq!(
            tracker.retry_count("translation", "transliteration returned instead of translation"),
            2
        );
        assert_eq!(tracker.retry_count("translation", "too short"), 1);
        assert_eq!(tracker.retry_count("media", "anything"), 0);
    }

    #[test]
    fn batch_stats_track_calls_and_average_elapsed() {
        let tracker = ProgressTracker::new(1);
        tracker.record_batch_call("translation", Duration::from_millis(100));
        tracker.record_batch_call("translation", Duration::from_millis(300));
        let snapshot = tracker.snapshot();
        let stats = snapshot.batch_stats.get("translation").unwrap();
        assert_eq!(stats.calls, 2);
        assert_eq!(stats.average(), Duration::from_millis(200));
    }

    #[test]
    fn subscribers_are_invoked_on_publish() {
        let tracker = ProgressTracker::new(1);
        let seen = Arc::new(StdAtomicUsize::new(0));
        let seen_clone = seen.clone();
        tracker.subscribe(move |_snapshot| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
        });
        tracker.record_translation_completed();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
