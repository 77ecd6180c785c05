//! # Media Service
//!
//! Facade wiring the caches, resolver, prefetch scheduler and stream proxy
//! together. This is the surface the HTTP layer talks to.

use std::sync::Arc;
use std::time::Duration;

use cadence_extractor::{ExtractionService, ExtractorError, is_valid_id};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::cache::{ResolutionCache, SearchCache, SearchResults, normalize_query};
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::prefetch::{PrefetchHandle, PrefetchStats};
use crate::resolver::{Resolver, ResolverStats};
use crate::stream::disposition::{attachment, download_filename};
use crate::stream::{ByteStream, StreamHead, StreamProxy};
use crate::types::{ResolvedMedia, SearchResult};

/// How a media stream is offered to the client
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamOptions {
    /// Offer the media as a file download rather than inline playback
    pub as_download: bool,
    /// Preferred download filename, sanitized before use
    pub suggested_filename: Option<String>,
    /// Client `Range` header, forwarded upstream verbatim
    pub range: Option<String>,
}

impl StreamOptions {
    pub fn playback() -> Self {
        Self::default()
    }

    pub fn download(filename: Option<String>) -> Self {
        Self {
            as_download: true,
            suggested_filename: filename,
            range: None,
        }
    }

    pub fn with_range(mut self, range: impl Into<String>) -> Self {
        self.range = Some(range.into());
        self
    }
}

/// An opened media stream ready to hand to a client
pub struct MediaStream {
    pub id: String,
    /// `Content-Disposition` value, set for downloads only
    pub content_disposition: Option<String>,
    pub stream: ByteStream,
}

impl MediaStream {
    pub fn head(&self) -> &StreamHead {
        self.stream.head()
    }
}

/// Point-in-time view of the service, for health reporting
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub search_entries: u64,
    pub resolution_entries: u64,
    pub resolver: ResolverStats,
    pub prefetch: PrefetchStats,
    pub streams_opened: u64,
}

pub struct MediaService {
    extractor: Arc<dyn ExtractionService>,
    search_cache: SearchCache,
    resolver: Resolver,
    prefetch: PrefetchHandle,
    proxy: StreamProxy,
    search_limit: usize,
    search_timeout: Duration,
    prefetch_top_n: usize,
    refresh_expired_streams: bool,
    shutdown: CancellationToken,
}

impl MediaService {
    /// Build the service and start its background tasks. Must be called
    /// within a tokio runtime.
    pub fn new(
        extractor: Arc<dyn ExtractionService>,
        config: RelayConfig,
    ) -> Result<Self, RelayError> {
        Self::with_shutdown(extractor, config, CancellationToken::new())
    }

    /// Like [`MediaService::new`], stopping background tasks when `shutdown`
    /// is cancelled.
    pub fn with_shutdown(
        extractor: Arc<dyn ExtractionService>,
        config: RelayConfig,
        shutdown: CancellationToken,
    ) -> Result<Self, RelayError> {
        let proxy = StreamProxy::new(config.upstream.clone())?;
        let search_cache = SearchCache::new(&config.cache);
        let resolution_cache = ResolutionCache::new(&config.cache);

        if let Some(interval) = config.cache.sweep_interval.filter(|i| !i.is_zero()) {
            search_cache.store().start_sweeper(interval, shutdown.clone());
            resolution_cache.store().start_sweeper(interval, shutdown.clone());
        }

        let resolver = Resolver::new(Arc::clone(&extractor), resolution_cache, &config.resolver);
        let (prefetch, _) = PrefetchHandle::spawn(resolver.clone(), &config.prefetch, shutdown.clone());

        info!(
            extractor = extractor.name(),
            search_ttl_secs = config.cache.search_ttl.as_secs(),
            resolution_ttl_secs = config.cache.resolution_ttl.as_secs(),
            prefetch = prefetch.is_enabled(),
            "Media service ready"
        );

        Ok(Self {
            extractor,
            search_cache,
            resolver,
            prefetch,
            proxy,
            search_limit: config.search_limit.max(1),
            search_timeout: config.search_timeout,
            prefetch_top_n: config.prefetch.top_n,
            refresh_expired_streams: config.refresh_expired_streams,
            shutdown,
        })
    }

    /// Search for `query`, from cache when possible. A fresh search queues
    /// its leading hits for background resolution.
    #[instrument(skip(self), level = "debug")]
    pub async fn search(&self, query: &str) -> Result<SearchResults, RelayError> {
        let normalized = normalize_query(query);
        if normalized.is_empty() {
            return Err(RelayError::InvalidInput("query must not be empty".to_string()));
        }

        if let Some(hit) = self.search_cache.get(&normalized) {
            debug!(query = %normalized, results = hit.len(), "Search cache hit");
            return Ok(hit);
        }

        let raw = tokio::time::timeout(
            self.search_timeout,
            self.extractor.search(&normalized, self.search_limit),
        )
        .await
        .map_err(|_| ExtractorError::Timeout(self.search_timeout))??;

        let results: SearchResults =
            Arc::new(raw.into_iter().map(SearchResult::from).collect());
        self.search_cache.put(&normalized, Arc::clone(&results));
        info!(query = %normalized, results = results.len(), "Search completed");

        for result in results.iter().take(self.prefetch_top_n) {
            self.prefetch.schedule(&result.id);
        }

        Ok(results)
    }

    /// Resolve `id` to a playable media location.
    pub async fn resolve(&self, id: &str) -> Result<ResolvedMedia, RelayError> {
        validate_id(id)?;
        Ok(self.resolver.resolve(id).await?)
    }

    /// Queue `id` for background resolution. Invalid identifiers are ignored.
    pub fn schedule_prefetch(&self, id: &str) -> bool {
        is_valid_id(id) && self.prefetch.schedule(id)
    }

    /// Resolve `id` and open its media upstream.
    ///
    /// When the upstream rejects a cached location as expired, the location
    /// is re-resolved once before giving up.
    #[instrument(skip(self, options), fields(download = options.as_download), level = "debug")]
    pub async fn open_stream(
        &self,
        id: &str,
        options: StreamOptions,
    ) -> Result<MediaStream, RelayError> {
        validate_id(id)?;
        let range = options.range.as_deref();

        let media = self.resolver.resolve(id).await?;
        let stream = match self.proxy.open(&media, range).await {
            Ok(stream) => stream,
            Err(e) if self.refresh_expired_streams && e.is_expired_location() => {
                warn!(id, error = %e, "Cached media location rejected, re-resolving");
                self.resolver.invalidate(id);
                let media = self.resolver.resolve(id).await?;
                self.proxy.open(&media, range).await?
            }
            Err(e) => return Err(e.into()),
        };

        let content_disposition = options.as_download.then(|| {
            attachment(&download_filename(
                options.suggested_filename.as_deref(),
                id,
                &stream.head().content_type,
            ))
        });

        Ok(MediaStream {
            id: id.to_string(),
            content_disposition,
            stream,
        })
    }

    /// Drop cached data for `id`
    pub fn invalidate(&self, id: &str) {
        self.resolver.invalidate(id);
    }

    pub fn clear_caches(&self) {
        self.search_cache.store().clear();
        self.resolver.cache().store().clear();
    }

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            search_entries: self.search_cache.store().len(),
            resolution_entries: self.resolver.cache().store().len(),
            resolver: self.resolver.stats(),
            prefetch: self.prefetch.stats(),
            streams_opened: self.proxy.streams_opened(),
        }
    }

    pub fn search_cache(&self) -> &SearchCache {
        &self.search_cache
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Stop background tasks
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for MediaService {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn validate_id(id: &str) -> Result<(), RelayError> {
    if is_valid_id(id) {
        Ok(())
    } else {
        Err(RelayError::InvalidInput(format!("invalid media id: {id:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeExtractor;
    use cadence_extractor::RawResult;

    fn service(extractor: Arc<FakeExtractor>, config: RelayConfig) -> MediaService {
        let mut config = config;
        config.upstream = crate::UpstreamConfig::builder().with_system_proxy(false).build();
        MediaService::new(extractor, config).unwrap()
    }

    fn raw_results(n: usize) -> Vec<RawResult> {
        (0..n)
            .map(|i| RawResult::new(format!("id{i}"), format!("Title {i}")).with_duration(60.0))
            .collect()
    }

    #[tokio::test]
    async fn test_search_rejects_blank_query() {
        let extractor = Arc::new(FakeExtractor::new());
        let service = service(extractor.clone(), RelayConfig::default());

        let err = service.search("   ").await.unwrap_err();
        assert!(matches!(err, RelayError::InvalidInput(_)));
        assert_eq!(extractor.search_calls(), 0);
    }

    #[tokio::test]
    async fn test_search_is_cached_under_normalized_query() {
        let extractor = Arc::new(FakeExtractor::new().with_results(raw_results(2)));
        let service = service(extractor.clone(), RelayConfig::default());

        let first = service.search("Test").await.unwrap();
        let second = service.search("  test ").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(extractor.search_calls(), 1);
        assert_eq!(first[0].duration, "1:00");
    }

    #[tokio::test]
    async fn test_search_prefetches_top_n_only() {
        let extractor = Arc::new(FakeExtractor::new().with_results(raw_results(5)));
        let service = service(extractor, RelayConfig::default());

        service.search("many").await.unwrap();
        assert_eq!(service.status().prefetch.submitted, 3);
    }

    #[tokio::test]
    async fn test_resolve_validates_identifier() {
        let extractor = Arc::new(FakeExtractor::new());
        let service = service(extractor.clone(), RelayConfig::default());

        for bad in ["", "-rf", "a/b", "id with space"] {
            assert!(matches!(
                service.resolve(bad).await,
                Err(RelayError::InvalidInput(_))
            ));
        }
        assert!(!service.schedule_prefetch("a/b"));
        assert_eq!(extractor.resolve_calls(), 0);
    }

    #[tokio::test]
    async fn test_open_stream_with_failing_resolver_never_reaches_proxy() {
        let extractor = Arc::new(FakeExtractor::new().failing());
        let service = service(extractor.clone(), RelayConfig::default());

        let err = service
            .open_stream("abc", StreamOptions::download(Some("song".into())))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RelayError::Resolution(_)));
        assert!(err.is_not_found());
        assert_eq!(service.status().streams_opened, 0);
    }

    #[test]
    fn test_stream_options() {
        let options = StreamOptions::download(Some("x".into())).with_range("bytes=0-");
        assert!(options.as_download);
        assert_eq!(options.range.as_deref(), Some("bytes=0-"));
        assert!(!StreamOptions::playback().as_download);
    }
}
