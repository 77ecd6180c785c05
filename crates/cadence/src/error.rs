use std::sync::Arc;
use std::time::Duration;

use cadence_extractor::ExtractorError;
use reqwest::StatusCode;

/// Failure of the resolver to produce a media location.
///
/// Cloneable so that every caller waiting on the same in-flight resolution
/// receives the same error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolutionError {
    #[error("extraction failed for {id}: {source}")]
    Extraction {
        id: String,
        #[source]
        source: Arc<ExtractorError>,
    },

    #[error("resolution of {id} timed out after {timeout:?}")]
    Timeout { id: String, timeout: Duration },

    #[error("resolution task for {id} was aborted")]
    Aborted { id: String },
}

impl ResolutionError {
    pub fn id(&self) -> &str {
        match self {
            ResolutionError::Extraction { id, .. }
            | ResolutionError::Timeout { id, .. }
            | ResolutionError::Aborted { id } => id,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolutionError::Extraction { source, .. } if source.is_not_found())
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            ResolutionError::Extraction { source, .. } => source.is_retryable(),
            ResolutionError::Timeout { .. } | ResolutionError::Aborted { .. } => true,
        }
    }
}

/// Failure to fetch or fully deliver media bytes from the upstream provider.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid media URL: {0}")]
    InvalidUrl(String),

    #[error("Upstream returned status code {0}")]
    Status(StatusCode),

    #[error("Upstream read timed out after {0:?}")]
    ReadTimeout(Duration),

    #[error("Invalid proxy configuration: {0}")]
    Proxy(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

impl UpstreamError {
    /// Statuses that usually mean the provider-issued URL is no longer valid.
    pub fn is_expired_location(&self) -> bool {
        matches!(
            self,
            UpstreamError::Status(
                StatusCode::FORBIDDEN | StatusCode::NOT_FOUND | StatusCode::GONE
            )
        )
    }
}

/// Errors surfaced by [`crate::MediaService`] to its callers.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractorError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl RelayError {
    /// Stable machine-readable name of the error class
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::InvalidInput(_) => "invalid_input",
            RelayError::Extraction(_) => "extraction",
            RelayError::Resolution(_) => "resolution",
            RelayError::Upstream(_) => "upstream",
        }
    }

    /// Whether retrying with the same input is worthwhile.
    pub fn is_retryable(&self) -> bool {
        match self {
            RelayError::InvalidInput(_) => false,
            RelayError::Extraction(e) => e.is_retryable(),
            RelayError::Resolution(e) => e.is_retryable(),
            RelayError::Upstream(_) => true,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            RelayError::Extraction(e) => e.is_not_found(),
            RelayError::Resolution(e) => e.is_not_found(),
            _ => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            RelayError::Extraction(ExtractorError::Timeout(_))
                | RelayError::Resolution(ResolutionError::Timeout { .. })
                | RelayError::Upstream(UpstreamError::ReadTimeout(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let not_found = RelayError::from(ResolutionError::Extraction {
            id: "abc".into(),
            source: Arc::new(ExtractorError::NotFound("gone".into())),
        });
        assert_eq!(not_found.kind(), "resolution");
        assert!(not_found.is_not_found());
        assert!(!not_found.is_retryable());

        let timeout = RelayError::from(ResolutionError::Timeout {
            id: "abc".into(),
            timeout: Duration::from_secs(1),
        });
        assert!(timeout.is_timeout());
        assert!(timeout.is_retryable());

        let invalid = RelayError::InvalidInput("empty".into());
        assert_eq!(invalid.kind(), "invalid_input");
        assert!(!invalid.is_retryable());

        let upstream = RelayError::from(UpstreamError::Status(StatusCode::BAD_GATEWAY));
        assert_eq!(upstream.kind(), "upstream");
        assert!(upstream.is_retryable());
    }

    #[test]
    fn test_expired_location_statuses() {
        assert!(UpstreamError::Status(StatusCode::FORBIDDEN).is_expired_location());
        assert!(UpstreamError::Status(StatusCode::GONE).is_expired_location());
        assert!(!UpstreamError::Status(StatusCode::INTERNAL_SERVER_ERROR).is_expired_location());
    }
}
