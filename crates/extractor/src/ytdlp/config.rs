use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_BINARY: &str = "yt-dlp";
pub const DEFAULT_FORMAT: &str = "bestaudio/best";
pub const DEFAULT_WATCH_URL: &str = "https://www.youtube.com/watch?v={id}";
pub const DEFAULT_THUMBNAIL_URL: &str = "https://i.ytimg.com/vi/{id}/hqdefault.jpg";

/// Configuration for a `yt-dlp` backed extractor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YtDlpConfig {
    /// Path or name of the yt-dlp executable
    pub binary: PathBuf,
    /// Format selector passed to `-f`
    pub format: String,
    /// Template for the page URL of an identifier, `{id}` is substituted
    pub watch_url: String,
    /// Template for a thumbnail when the search listing carries none
    pub thumbnail_url: Option<String>,
    /// Prefix for search queries, `ytsearch` yields `ytsearch15:<query>`
    pub search_prefix: String,
    /// Extra arguments appended before the target (cookies, proxies, ...)
    pub extra_args: Vec<String>,
    /// Upper bound on a single invocation, `None` leaves it to the caller
    #[serde(with = "optional_secs")]
    pub timeout: Option<Duration>,
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_BINARY),
            format: DEFAULT_FORMAT.to_string(),
            watch_url: DEFAULT_WATCH_URL.to_string(),
            thumbnail_url: Some(DEFAULT_THUMBNAIL_URL.to_string()),
            search_prefix: "ytsearch".to_string(),
            extra_args: Vec::new(),
            timeout: None,
        }
    }
}

impl YtDlpConfig {
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_extra_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub(crate) fn watch_url_for(&self, id: &str) -> String {
        self.watch_url.replace("{id}", id)
    }

    pub(crate) fn thumbnail_for(&self, id: &str) -> Option<String> {
        self.thumbnail_url
            .as_ref()
            .map(|template| template.replace("{id}", id))
    }
}

mod optional_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_secs))
    }
}
