use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::error::ExtractorError;
use crate::media::{MediaLocation, RawResult};

/// Identifiers are opaque provider keys; this bounds them to a conservative
/// character set so they can never be mistaken for a command-line flag or a URL.
pub static ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").unwrap());

pub fn is_valid_id(id: &str) -> bool {
    ID_REGEX.is_match(id) && !id.starts_with('-')
}

/// Something that can search a catalogue and turn a content identifier into
/// a playable, time-limited media location.
///
/// Implementations are expected to be slow and rate-limited; callers cache
/// and deduplicate around them.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RawResult>, ExtractorError>;

    async fn resolve_media(&self, id: &str) -> Result<MediaLocation, ExtractorError>;
}
