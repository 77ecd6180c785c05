//! # Resolver
//!
//! Turns a content identifier into a [`ResolvedMedia`], consulting the
//! resolution cache first. Concurrent requests for the same identifier
//! collapse into a single extraction call whose outcome every caller
//! receives.
//!
//! The extraction itself runs in a spawned task so a caller that goes away
//! (a client disconnect dropping its future) never strands the other
//! waiters or leaves the in-flight marker behind.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use cadence_extractor::ExtractionService;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::cache::ResolutionCache;
use crate::config::ResolverConfig;
use crate::error::ResolutionError;
use crate::types::ResolvedMedia;

type Resolution = Result<ResolvedMedia, ResolutionError>;
type SharedResolution = Shared<BoxFuture<'static, Resolution>>;

struct InFlight {
    ticket: u64,
    resolution: SharedResolution,
}

/// Counters describing resolver activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolverStats {
    pub cache_hits: u64,
    pub extractions: u64,
    pub joined: u64,
    pub failures: u64,
    pub in_flight: usize,
}

struct ResolverInner {
    extractor: Arc<dyn ExtractionService>,
    cache: ResolutionCache,
    in_flight: Mutex<FxHashMap<String, InFlight>>,
    next_ticket: AtomicU64,
    resolve_timeout: Duration,
    cache_hits: AtomicU64,
    extractions: AtomicU64,
    joined: AtomicU64,
    failures: AtomicU64,
}

/// Cache-first, single-flight resolver. Cheap to clone.
#[derive(Clone)]
pub struct Resolver {
    inner: Arc<ResolverInner>,
}

impl Resolver {
    pub fn new(
        extractor: Arc<dyn ExtractionService>,
        cache: ResolutionCache,
        config: &ResolverConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ResolverInner {
                extractor,
                cache,
                in_flight: Mutex::new(FxHashMap::default()),
                next_ticket: AtomicU64::new(1),
                resolve_timeout: config.resolve_timeout,
                cache_hits: AtomicU64::new(0),
                extractions: AtomicU64::new(0),
                joined: AtomicU64::new(0),
                failures: AtomicU64::new(0),
            }),
        }
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.inner.cache
    }

    /// Resolve `id`, from cache when possible.
    #[instrument(skip(self), level = "debug")]
    pub async fn resolve(&self, id: &str) -> Resolution {
        if let Some(hit) = self.inner.cache.get(id) {
            self.inner.cache_hits.fetch_add(1, Ordering::Relaxed);
            debug!(id, "Resolution cache hit");
            return Ok(hit);
        }

        let resolution = {
            let mut in_flight = self.inner.in_flight.lock();
            match in_flight.get(id) {
                Some(existing) => {
                    self.inner.joined.fetch_add(1, Ordering::Relaxed);
                    debug!(id, "Joining in-flight resolution");
                    existing.resolution.clone()
                }
                None => {
                    // A resolution may have completed between the first
                    // lookup and taking the lock.
                    if let Some(hit) = self.inner.cache.get(id) {
                        self.inner.cache_hits.fetch_add(1, Ordering::Relaxed);
                        return Ok(hit);
                    }
                    let ticket = self.inner.next_ticket.fetch_add(1, Ordering::Relaxed);
                    let resolution = self.start(id.to_string(), ticket);
                    in_flight.insert(
                        id.to_string(),
                        InFlight {
                            ticket,
                            resolution: resolution.clone(),
                        },
                    );
                    resolution
                }
            }
        };

        resolution.await
    }

    /// Drop any cached resolution for `id`
    pub fn invalidate(&self, id: &str) {
        self.inner.cache.invalidate(id);
    }

    pub fn is_in_flight(&self, id: &str) -> bool {
        self.inner.in_flight.lock().contains_key(id)
    }

    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            cache_hits: self.inner.cache_hits.load(Ordering::Relaxed),
            extractions: self.inner.extractions.load(Ordering::Relaxed),
            joined: self.inner.joined.load(Ordering::Relaxed),
            failures: self.inner.failures.load(Ordering::Relaxed),
            in_flight: self.inner.in_flight.lock().len(),
        }
    }

    // Called with the in-flight lock held; the spawned task only touches
    // the map from its marker guard, after the caller has released it.
    fn start(&self, id: String, ticket: u64) -> SharedResolution {
        let inner = Arc::clone(&self.inner);
        let task_id = id.clone();
        let handle = tokio::spawn(async move { inner.extract(task_id, ticket).await });

        async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => {
                    warn!(id = %id, error = %e, "Resolution task did not complete");
                    Err(ResolutionError::Aborted { id })
                }
            }
        }
        .boxed()
        .shared()
    }
}

impl ResolverInner {
    async fn extract(self: Arc<Self>, id: String, ticket: u64) -> Resolution {
        let _marker = MarkerGuard {
            inner: self.as_ref(),
            id: &id,
            ticket,
        };

        self.extractions.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        let outcome =
            tokio::time::timeout(self.resolve_timeout, self.extractor.resolve_media(&id)).await;

        match outcome {
            Ok(Ok(location)) => {
                let media = ResolvedMedia::from_location(location);
                self.cache.put(&id, media.clone());
                info!(
                    id = %id,
                    content_type = %media.content_type,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Resolved media"
                );
                Ok(media)
            }
            Ok(Err(e)) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!(id = %id, extractor = self.extractor.name(), error = %e, "Resolution failed");
                Err(ResolutionError::Extraction {
                    id: id.clone(),
                    source: Arc::new(e),
                })
            }
            Err(_) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!(id = %id, timeout = ?self.resolve_timeout, "Resolution timed out");
                Err(ResolutionError::Timeout {
                    id: id.clone(),
                    timeout: self.resolve_timeout,
                })
            }
        }
    }
}

/// Removes the in-flight marker once the extraction task finishes, however
/// it finishes. Only the marker carrying this guard's ticket is removed.
struct MarkerGuard<'a> {
    inner: &'a ResolverInner,
    id: &'a str,
    ticket: u64,
}

impl Drop for MarkerGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.inner.in_flight.lock();
        if in_flight
            .get(self.id)
            .is_some_and(|marker| marker.ticket == self.ticket)
        {
            in_flight.remove(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::testing::FakeExtractor;
    use futures::future::join_all;

    fn resolver_with(extractor: Arc<FakeExtractor>, ttl: Duration, timeout: Duration) -> Resolver {
        let cache = ResolutionCache::new(&CacheConfig {
            resolution_ttl: ttl,
            ..CacheConfig::default()
        });
        Resolver::new(
            extractor,
            cache,
            &ResolverConfig {
                resolve_timeout: timeout,
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_resolves_share_one_extraction() {
        let extractor = Arc::new(FakeExtractor::new().with_delay(Duration::from_millis(200)));
        let resolver = resolver_with(extractor.clone(), Duration::from_secs(60), Duration::from_secs(5));

        let results = join_all((0..10).map(|_| resolver.resolve("abc"))).await;

        assert_eq!(extractor.resolve_calls(), 1);
        let urls: Vec<_> = results
            .into_iter()
            .map(|r| r.unwrap().media_url)
            .collect();
        assert!(urls.iter().all(|u| u == &urls[0]));
        assert!(!resolver.is_in_flight("abc"));

        let stats = resolver.stats();
        assert_eq!(stats.extractions, 1);
        assert_eq!(stats.joined, 9);
        assert_eq!(stats.in_flight, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_failures_share_error_and_skip_cache() {
        let extractor = Arc::new(
            FakeExtractor::new()
                .with_delay(Duration::from_millis(50))
                .failing(),
        );
        let resolver = resolver_with(extractor.clone(), Duration::from_secs(60), Duration::from_secs(5));

        let results = join_all((0..4).map(|_| resolver.resolve("abc"))).await;
        assert_eq!(extractor.resolve_calls(), 1);
        for result in results {
            let err = result.unwrap_err();
            assert!(err.is_not_found());
            assert_eq!(err.id(), "abc");
        }

        assert!(resolver.cache().get("abc").is_none());
        assert!(!resolver.is_in_flight("abc"));

        // The failure was not cached, so the next call extracts again
        let _ = resolver.resolve("abc").await;
        assert_eq!(extractor.resolve_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_re_resolves_after_ttl() {
        let ttl = Duration::from_secs(60);
        let extractor = Arc::new(FakeExtractor::new());
        let resolver = resolver_with(extractor.clone(), ttl, Duration::from_secs(5));

        let first = resolver.resolve("abc").await.unwrap();
        let cached = resolver.resolve("abc").await.unwrap();
        assert_eq!(first.media_url, cached.media_url);
        assert_eq!(extractor.resolve_calls(), 1);

        tokio::time::advance(ttl + Duration::from_secs(1)).await;
        let refreshed = resolver.resolve("abc").await.unwrap();
        assert_eq!(extractor.resolve_calls(), 2);
        assert_ne!(first.media_url, refreshed.media_url);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_releases_all_waiters() {
        let extractor = Arc::new(FakeExtractor::new().with_delay(Duration::from_secs(600)));
        let resolver = resolver_with(extractor.clone(), Duration::from_secs(60), Duration::from_secs(2));

        let results = join_all((0..3).map(|_| resolver.resolve("slow"))).await;
        for result in results {
            assert!(matches!(result, Err(ResolutionError::Timeout { .. })));
        }
        assert!(!resolver.is_in_flight("slow"));
        assert!(resolver.cache().get("slow").is_none());
        assert_eq!(resolver.stats().failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_caller_does_not_strand_resolution() {
        let extractor = Arc::new(FakeExtractor::new().with_delay(Duration::from_millis(100)));
        let resolver = resolver_with(extractor.clone(), Duration::from_secs(60), Duration::from_secs(5));

        // The first caller gives up before the extraction completes
        let abandoned = tokio::time::timeout(Duration::from_millis(10), resolver.resolve("abc")).await;
        assert!(abandoned.is_err());

        let media = resolver.resolve("abc").await.unwrap();
        assert_eq!(extractor.resolve_calls(), 1);
        assert!(media.media_url.contains("/abc"));
        assert!(resolver.cache().get("abc").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_ids_resolve_independently() {
        let extractor = Arc::new(FakeExtractor::new().with_delay(Duration::from_millis(10)));
        let resolver = resolver_with(extractor.clone(), Duration::from_secs(60), Duration::from_secs(5));

        let (a, b) = tokio::join!(resolver.resolve("a"), resolver.resolve("b"));
        assert!(a.unwrap().media_url.contains("/a?"));
        assert!(b.unwrap().media_url.contains("/b?"));
        assert_eq!(extractor.resolve_calls(), 2);
    }
}
