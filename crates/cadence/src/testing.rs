use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use cadence_extractor::{ExtractionService, ExtractorError, MediaLocation, RawResult};

/// Scriptable extraction backend counting its calls.
pub(crate) struct FakeExtractor {
    pub search_results: Vec<RawResult>,
    pub media_base: String,
    pub content_type: String,
    pub delay: Duration,
    pub fail_resolve: bool,
    pub resolve_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
}

impl FakeExtractor {
    pub fn new() -> Self {
        Self {
            search_results: Vec::new(),
            media_base: "https://media.invalid".to_string(),
            content_type: "audio/webm".to_string(),
            delay: Duration::ZERO,
            fail_resolve: false,
            resolve_calls: AtomicUsize::new(0),
            search_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_results(mut self, results: Vec<RawResult>) -> Self {
        self.search_results = results;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_resolve = true;
        self
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractionService for FakeExtractor {
    fn name(&self) -> &str {
        "fake"
    }

    async fn search(&self, _query: &str, limit: usize) -> Result<Vec<RawResult>, ExtractorError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.search_results.iter().take(limit).cloned().collect())
    }

    async fn resolve_media(&self, id: &str) -> Result<MediaLocation, ExtractorError> {
        let call = self.resolve_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_resolve {
            return Err(ExtractorError::NotFound(format!("no media for {id}")));
        }
        Ok(MediaLocation::new(
            format!("{}/{id}?call={call}", self.media_base),
            self.content_type.clone(),
        ))
    }
}
