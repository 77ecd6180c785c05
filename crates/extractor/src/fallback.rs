use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::ExtractorError;
use crate::media::{MediaLocation, RawResult};
use crate::service::ExtractionService;

/// Tries a list of extraction backends in order and returns the first success.
///
/// Invalid input short-circuits: no other backend would accept it either.
/// When every backend fails the last error is returned.
#[derive(Clone, Default)]
pub struct FallbackExtractor {
    extractors: Vec<Arc<dyn ExtractionService>>,
}

impl FallbackExtractor {
    pub fn new(extractors: Vec<Arc<dyn ExtractionService>>) -> Self {
        Self { extractors }
    }

    pub fn push(&mut self, extractor: Arc<dyn ExtractionService>) {
        self.extractors.push(extractor);
    }

    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }
}

#[async_trait]
impl ExtractionService for FallbackExtractor {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RawResult>, ExtractorError> {
        let mut last_error = ExtractorError::UnsupportedExtractor;
        for extractor in &self.extractors {
            match extractor.search(query, limit).await {
                Ok(results) => {
                    debug!(extractor = extractor.name(), count = results.len(), "Search succeeded");
                    return Ok(results);
                }
                Err(e @ ExtractorError::InvalidInput(_)) => return Err(e),
                Err(e) => {
                    warn!(extractor = extractor.name(), error = %e, "Search failed, trying next extractor");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    async fn resolve_media(&self, id: &str) -> Result<MediaLocation, ExtractorError> {
        let mut last_error = ExtractorError::UnsupportedExtractor;
        for extractor in &self.extractors {
            match extractor.resolve_media(id).await {
                Ok(location) => {
                    debug!(extractor = extractor.name(), id, "Resolution succeeded");
                    return Ok(location);
                }
                Err(e @ ExtractorError::InvalidInput(_)) => return Err(e),
                Err(e) => {
                    warn!(extractor = extractor.name(), id, error = %e, "Resolution failed, trying next extractor");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}
