use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Lightweight search hit as reported by an extraction backend.
///
/// Only `id` and `title` are guaranteed; everything else depends on what the
/// backend was able to learn without resolving the item.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RawResult {
    pub id: String,
    pub title: String,
    pub uploader: Option<String>,
    pub thumbnail: Option<String>,
    /// Duration in seconds
    pub duration: Option<f64>,
}

impl RawResult {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            uploader: None,
            thumbnail: None,
            duration: None,
        }
    }

    pub fn with_uploader(mut self, uploader: impl Into<String>) -> Self {
        self.uploader = Some(uploader.into());
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }
}

/// A provider-issued, time-limited media location.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MediaLocation {
    pub url: String,
    pub content_type: String,
    /// Headers the provider expects when the URL is fetched
    #[serde(default)]
    pub http_headers: FxHashMap<String, String>,
}

impl MediaLocation {
    pub fn new(url: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            content_type: content_type.into(),
            http_headers: FxHashMap::default(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.http_headers.insert(name.into(), value.into());
        self
    }
}

/// Best-effort MIME type for a container extension.
///
/// `audio_only` selects the `audio/*` flavour for containers that can hold
/// either audio or video.
pub fn content_type_for(ext: &str, audio_only: bool) -> &'static str {
    match (ext.to_ascii_lowercase().as_str(), audio_only) {
        ("m4a", _) => "audio/mp4",
        ("mp4", true) => "audio/mp4",
        ("mp4", false) => "video/mp4",
        ("webm", true) => "audio/webm",
        ("webm", false) => "video/webm",
        ("weba", _) => "audio/webm",
        ("mp3", _) => "audio/mpeg",
        ("ogg" | "opus", _) => "audio/ogg",
        ("aac", _) => "audio/aac",
        ("flac", _) => "audio/flac",
        ("wav", _) => "audio/wav",
        ("m3u8", _) => "application/vnd.apple.mpegurl",
        _ => "application/octet-stream",
    }
}
