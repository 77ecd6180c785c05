//! # Media Types
//!
//! Records handed to callers of the engine: search hits translated from the
//! extraction backend's raw metadata, and resolved media locations.

use std::time::Duration;

use cadence_extractor::{MediaLocation, RawResult};
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Maximum number of characters kept from a title
pub const MAX_TITLE_CHARS: usize = 200;
/// Maximum number of characters kept from an uploader name
pub const MAX_UPLOADER_CHARS: usize = 100;
/// Uploader shown when the backend reports none
pub const UNKNOWN_UPLOADER: &str = "Unknown";
/// Duration shown when the backend reports none
pub const UNKNOWN_DURATION: &str = "N/A";

/// A single search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub title: String,
    pub uploader: String,
    #[serde(rename = "thumbnail")]
    pub thumbnail_url: String,
    pub duration: String,
}

impl From<RawResult> for SearchResult {
    fn from(raw: RawResult) -> Self {
        let uploader = raw
            .uploader
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(|u| truncate_chars(u, MAX_UPLOADER_CHARS))
            .unwrap_or_else(|| UNKNOWN_UPLOADER.to_string());

        Self {
            title: truncate_chars(raw.title.trim(), MAX_TITLE_CHARS),
            uploader,
            thumbnail_url: raw.thumbnail.unwrap_or_default(),
            duration: format_duration(raw.duration),
            id: raw.id,
        }
    }
}

/// Format a duration in seconds as `M:SS` or `H:MM:SS`.
///
/// Missing, zero, negative and non-finite values render as `N/A`.
pub fn format_duration(seconds: Option<f64>) -> String {
    let Some(seconds) = seconds.filter(|s| s.is_finite() && *s >= 1.0) else {
        return UNKNOWN_DURATION.to_string();
    };

    let total = seconds as u64;
    let (hours, rest) = (total / 3600, total % 3600);
    let (minutes, secs) = (rest / 60, rest % 60);

    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// A provider-issued, short-lived media location.
#[derive(Debug, Clone)]
pub struct ResolvedMedia {
    pub media_url: String,
    pub content_type: String,
    /// Headers the provider requires when `media_url` is fetched
    pub http_headers: FxHashMap<String, String>,
    /// Monotonic resolution time, used for age calculations
    pub resolved_at: Instant,
    /// Wall-clock resolution time, used for reporting
    pub resolved_at_utc: DateTime<Utc>,
}

impl ResolvedMedia {
    pub fn from_location(location: MediaLocation) -> Self {
        Self {
            media_url: location.url,
            content_type: location.content_type,
            http_headers: location.http_headers,
            resolved_at: Instant::now(),
            resolved_at_utc: Utc::now(),
        }
    }

    pub fn age(&self) -> Duration {
        self.resolved_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(None), "N/A");
        assert_eq!(format_duration(Some(0.0)), "N/A");
        assert_eq!(format_duration(Some(-5.0)), "N/A");
        assert_eq!(format_duration(Some(f64::NAN)), "N/A");
        assert_eq!(format_duration(Some(5.0)), "0:05");
        assert_eq!(format_duration(Some(215.7)), "3:35");
        assert_eq!(format_duration(Some(3599.0)), "59:59");
        assert_eq!(format_duration(Some(3600.0)), "1:00:00");
        assert_eq!(format_duration(Some(37_230.0)), "10:20:30");
    }

    #[test]
    fn test_search_result_from_raw() {
        let raw = RawResult::new("abc", "  A title  ")
            .with_thumbnail("https://t/abc.jpg")
            .with_duration(61.0);
        let result = SearchResult::from(raw);

        assert_eq!(result.id, "abc");
        assert_eq!(result.title, "A title");
        assert_eq!(result.uploader, UNKNOWN_UPLOADER);
        assert_eq!(result.thumbnail_url, "https://t/abc.jpg");
        assert_eq!(result.duration, "1:01");
    }

    #[test]
    fn test_search_result_bounds_lengths() {
        let raw = RawResult::new("abc", "é".repeat(MAX_TITLE_CHARS + 10))
            .with_uploader("u".repeat(MAX_UPLOADER_CHARS * 2));
        let result = SearchResult::from(raw);

        assert_eq!(result.title.chars().count(), MAX_TITLE_CHARS);
        assert_eq!(result.uploader.chars().count(), MAX_UPLOADER_CHARS);
        assert_eq!(result.duration, UNKNOWN_DURATION);
    }

    #[test]
    fn test_search_result_serializes_client_field_names() {
        let result = SearchResult::from(RawResult::new("abc", "t").with_uploader("  "));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["thumbnail"], "");
        assert_eq!(json["uploader"], "Unknown");
        assert!(json.get("thumbnail_url").is_none());
    }
}
