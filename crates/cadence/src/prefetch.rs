//! # Prefetch Scheduler
//!
//! Best-effort background resolution of identifiers that are likely to be
//! requested soon. Submissions go through a bounded queue and never block;
//! when the queue is full the request is dropped. A single scheduler task
//! keeps at most `workers` resolutions running at once.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::config::PrefetchConfig;
use crate::resolver::Resolver;

#[derive(Debug, Default)]
struct PrefetchCounters {
    submitted: AtomicU64,
    dropped: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Snapshot of prefetch activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PrefetchStats {
    /// Requests accepted into the queue
    pub submitted: u64,
    /// Requests discarded because the queue was full or prefetch is off
    pub dropped: u64,
    pub completed: u64,
    pub failed: u64,
}

/// Submission side of the prefetch queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct PrefetchHandle {
    tx: Option<mpsc::Sender<String>>,
    counters: Arc<PrefetchCounters>,
}

impl PrefetchHandle {
    /// A handle that drops every submission
    pub fn disabled() -> Self {
        Self {
            tx: None,
            counters: Arc::default(),
        }
    }

    /// Create the queue and spawn its scheduler task. Returns a disabled
    /// handle and no task when prefetching is turned off.
    pub fn spawn(
        resolver: Resolver,
        config: &PrefetchConfig,
        shutdown: CancellationToken,
    ) -> (Self, Option<JoinHandle<()>>) {
        if !config.enabled || config.workers == 0 {
            info!("Prefetching disabled");
            return (Self::disabled(), None);
        }
        let (handle, scheduler) = PrefetchScheduler::new(resolver, config, shutdown);
        (handle, Some(tokio::spawn(scheduler.run())))
    }

    /// Queue `id` for background resolution. Never blocks and never fails;
    /// returns whether the request was accepted.
    pub fn schedule(&self, id: &str) -> bool {
        let Some(tx) = &self.tx else {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        };

        match tx.try_send(id.to_string()) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                trace!(id, "Prefetch queued");
                true
            }
            Err(TrySendError::Full(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(id, "Prefetch queue full, dropping request");
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    pub fn stats(&self) -> PrefetchStats {
        PrefetchStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}

/// Worker side of the prefetch queue
pub struct PrefetchScheduler {
    resolver: Resolver,
    request_rx: mpsc::Receiver<String>,
    workers: usize,
    counters: Arc<PrefetchCounters>,
    shutdown: CancellationToken,
}

impl PrefetchScheduler {
    pub fn new(
        resolver: Resolver,
        config: &PrefetchConfig,
        shutdown: CancellationToken,
    ) -> (PrefetchHandle, Self) {
        let (tx, request_rx) = mpsc::channel(config.queue_capacity.max(1));
        let counters = Arc::new(PrefetchCounters::default());
        let handle = PrefetchHandle {
            tx: Some(tx),
            counters: Arc::clone(&counters),
        };
        let scheduler = Self {
            resolver,
            request_rx,
            workers: config.workers.max(1),
            counters,
            shutdown,
        };
        (handle, scheduler)
    }

    pub async fn run(mut self) {
        info!(workers = self.workers, "Prefetch scheduler started");
        let mut in_progress = FuturesUnordered::new();
        let mut accepting = true;

        loop {
            let in_progress_count = in_progress.len();

            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    debug!(abandoned = in_progress_count, "Prefetch scheduler cancelled");
                    break;
                }

                maybe_id = self.request_rx.recv(), if accepting && in_progress_count < self.workers => {
                    match maybe_id {
                        Some(id) => in_progress.push(Self::prefetch(self.resolver.clone(), id)),
                        None => {
                            debug!("Prefetch queue closed");
                            accepting = false;
                            if in_progress.is_empty() {
                                break;
                            }
                        }
                    }
                }

                Some(succeeded) = in_progress.next(), if in_progress_count > 0 => {
                    let counter = if succeeded {
                        &self.counters.completed
                    } else {
                        &self.counters.failed
                    };
                    counter.fetch_add(1, Ordering::Relaxed);
                    if !accepting && in_progress.is_empty() {
                        break;
                    }
                }

                else => break,
            }
        }

        info!("Prefetch scheduler stopped");
    }

    async fn prefetch(resolver: Resolver, id: String) -> bool {
        match resolver.resolve(&id).await {
            Ok(_) => {
                debug!(id = %id, "Prefetched");
                true
            }
            Err(e) => {
                debug!(id = %id, error = %e, "Prefetch failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::cache::{CacheConfig, ResolutionCache};
    use crate::config::ResolverConfig;
    use crate::testing::FakeExtractor;

    fn resolver(extractor: Arc<FakeExtractor>) -> Resolver {
        Resolver::new(
            extractor,
            ResolutionCache::new(&CacheConfig::default()),
            &ResolverConfig::default(),
        )
    }

    fn config(workers: usize, queue_capacity: usize) -> PrefetchConfig {
        PrefetchConfig {
            workers,
            queue_capacity,
            ..PrefetchConfig::default()
        }
    }

    async fn wait_for(handle: &PrefetchHandle, finished: u64) {
        for _ in 0..100 {
            let stats = handle.stats();
            if stats.completed + stats.failed >= finished {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("prefetches did not finish: {:?}", handle.stats());
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let extractor = Arc::new(FakeExtractor::new());
        let (handle, _scheduler) =
            PrefetchScheduler::new(resolver(extractor), &config(1, 2), CancellationToken::new());

        let accepted: Vec<bool> = (0..5).map(|i| handle.schedule(&format!("id{i}"))).collect();
        assert_eq!(accepted, vec![true, true, false, false, false]);

        let stats = handle.stats();
        assert_eq!(stats.submitted, 2);
        assert_eq!(stats.dropped, 3);
    }

    #[test]
    fn test_disabled_handle_drops() {
        let handle = PrefetchHandle::disabled();
        assert!(!handle.is_enabled());
        assert!(!handle.schedule("abc"));
        assert_eq!(handle.stats().dropped, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prefetch_populates_resolution_cache() {
        let extractor = Arc::new(FakeExtractor::new());
        let resolver = resolver(extractor.clone());
        let (handle, task) =
            PrefetchHandle::spawn(resolver.clone(), &config(3, 64), CancellationToken::new());
        assert!(task.is_some());

        for id in ["a", "b", "c"] {
            assert!(handle.schedule(id));
        }
        wait_for(&handle, 3).await;

        assert_eq!(extractor.resolve_calls(), 3);
        assert_eq!(handle.stats().completed, 3);
        for id in ["a", "b", "c"] {
            assert!(resolver.cache().get(id).is_some());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_counted_not_propagated() {
        let extractor = Arc::new(FakeExtractor::new().failing());
        let (handle, _task) =
            PrefetchHandle::spawn(resolver(extractor), &config(3, 64), CancellationToken::new());

        assert!(handle.schedule("broken"));
        wait_for(&handle, 1).await;

        let stats = handle.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.completed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_bounded_by_workers() {
        let extractor = Arc::new(FakeExtractor::new().with_delay(Duration::from_millis(100)));
        let (handle, _task) = PrefetchHandle::spawn(
            resolver(extractor.clone()),
            &config(2, 64),
            CancellationToken::new(),
        );

        for id in ["a", "b", "c", "d"] {
            handle.schedule(id);
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(extractor.resolve_calls(), 2);

        wait_for(&handle, 4).await;
        assert_eq!(extractor.resolve_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_stops_on_shutdown() {
        let extractor = Arc::new(FakeExtractor::new());
        let shutdown = CancellationToken::new();
        let (handle, task) = PrefetchHandle::spawn(resolver(extractor), &config(3, 8), shutdown.clone());

        shutdown.cancel();
        task.unwrap().await.unwrap();
        assert!(!handle.is_enabled());
        assert!(!handle.schedule("late"));
    }
}
