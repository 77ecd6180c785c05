use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractorError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("no extractor configured")]
    UnsupportedExtractor,
    #[error("content not found: {0}")]
    NotFound(String),
    #[error("age-restricted content")]
    AgeRestrictedContent,
    #[error("private content")]
    PrivateContent,
    #[error("region-locked content")]
    RegionLockedContent,
    #[error("provider rate limit reached: {0}")]
    RateLimited(String),
    #[error("no streams found")]
    NoStreamsFound,
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("extraction timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("other error: {0}")]
    Other(String),
}

impl ExtractorError {
    /// Whether the content is known not to exist (or never to be playable),
    /// so retrying the same identifier cannot succeed.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ExtractorError::NotFound(_)
                | ExtractorError::PrivateContent
                | ExtractorError::AgeRestrictedContent
                | ExtractorError::RegionLockedContent
        )
    }

    /// Whether a later attempt with the same input may succeed.
    pub fn is_retryable(&self) -> bool {
        !self.is_not_found() && !matches!(self, ExtractorError::InvalidInput(_))
    }

    /// Map the diagnostic text printed by an extraction tool onto a typed error.
    pub fn from_diagnostic(program: &str, status: String, stderr: &str) -> Self {
        let lowered = stderr.to_lowercase();
        if lowered.contains("private video") {
            ExtractorError::PrivateContent
        } else if lowered.contains("confirm your age") || lowered.contains("age-restricted") {
            ExtractorError::AgeRestrictedContent
        } else if lowered.contains("not available in your country")
            || lowered.contains("geo restriction")
        {
            ExtractorError::RegionLockedContent
        } else if lowered.contains("http error 429") || lowered.contains("not a bot") {
            ExtractorError::RateLimited(last_line(stderr))
        } else if lowered.contains("video unavailable")
            || lowered.contains("does not exist")
            || lowered.contains("http error 404")
        {
            ExtractorError::NotFound(last_line(stderr))
        } else {
            ExtractorError::CommandFailed {
                program: program.to_string(),
                status,
                stderr: last_line(stderr),
            }
        }
    }
}

fn last_line(text: &str) -> String {
    text.lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .to_string()
}
