#![allow(unused)]
use rustc_hash::FxHashMap;
use serde::Deserialize;

/// `yt-dlp -J --flat-playlist ytsearchN:...` output
#[derive(Debug, Deserialize)]
pub struct SearchPlaylist {
    #[serde(rename = "_type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub entries: Vec<Option<FlatEntry>>,
}

#[derive(Debug, Deserialize)]
pub struct FlatEntry {
    pub id: Option<String>,
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub channel: Option<String>,
    pub duration: Option<f64>,
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub thumbnails: Vec<Thumbnail>,
}

#[derive(Debug, Deserialize)]
pub struct Thumbnail {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// `yt-dlp -J -f <format> <url>` output for a single selected format
#[derive(Debug, Deserialize)]
pub struct VideoInfo {
    pub id: String,
    pub url: Option<String>,
    pub ext: Option<String>,
    pub acodec: Option<String>,
    pub vcodec: Option<String>,
    pub protocol: Option<String>,
    #[serde(default)]
    pub http_headers: FxHashMap<String, String>,
    #[serde(default)]
    pub requested_formats: Vec<FormatInfo>,
}

#[derive(Debug, Deserialize)]
pub struct FormatInfo {
    pub url: Option<String>,
    pub ext: Option<String>,
    pub acodec: Option<String>,
    pub vcodec: Option<String>,
    #[serde(default)]
    pub http_headers: FxHashMap<String, String>,
}

impl FlatEntry {
    /// Largest advertised thumbnail, falling back to the flat `thumbnail` field.
    pub fn best_thumbnail(&self) -> Option<String> {
        self.thumbnails
            .iter()
            .max_by_key(|t| u64::from(t.width.unwrap_or(0)) * u64::from(t.height.unwrap_or(0)))
            .map(|t| t.url.clone())
            .or_else(|| self.thumbnail.clone())
    }
}

pub(crate) fn is_audio_only(vcodec: Option<&str>, acodec: Option<&str>) -> bool {
    matches!(vcodec, Some("none")) && !matches!(acodec, Some("none"))
}
