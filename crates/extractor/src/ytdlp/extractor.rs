use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::config::YtDlpConfig;
use super::models::{SearchPlaylist, VideoInfo, is_audio_only};
use crate::error::ExtractorError;
use crate::media::{MediaLocation, RawResult, content_type_for};
use crate::service::{ExtractionService, is_valid_id};

/// Extraction backend driving the `yt-dlp` command-line tool.
///
/// Each call spawns one process and parses its `-J` JSON dump. The child is
/// killed if the returned future is dropped, so callers can bound it with a
/// timeout without leaking processes.
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    config: YtDlpConfig,
}

impl YtDlpExtractor {
    pub fn new(config: YtDlpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &YtDlpConfig {
        &self.config
    }

    fn program(&self) -> String {
        self.config.binary.display().to_string()
    }

    async fn run(&self, args: Vec<String>) -> Result<Vec<u8>, ExtractorError> {
        let mut command = Command::new(&self.config.binary);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(program = %self.program(), ?args, "Running extractor");

        let output = match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, command.output())
                .await
                .map_err(|_| ExtractorError::Timeout(limit))?,
            None => command.output().await,
        }
        .map_err(|source| ExtractorError::Spawn {
            program: self.program(),
            source,
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractorError::from_diagnostic(
                &self.program(),
                output.status.to_string(),
                &stderr,
            ));
        }

        Ok(output.stdout)
    }

    fn common_args(&self) -> Vec<String> {
        let mut args = vec![
            "-J".to_string(),
            "--no-warnings".to_string(),
            "--quiet".to_string(),
            "--geo-bypass".to_string(),
        ];
        args.extend(self.config.extra_args.iter().cloned());
        args
    }

    pub(crate) fn search_args(&self, query: &str, limit: usize) -> Vec<String> {
        let mut args = self.common_args();
        args.push("--flat-playlist".to_string());
        args.push("--".to_string());
        args.push(format!("{}{}:{}", self.config.search_prefix, limit, query));
        args
    }

    pub(crate) fn resolve_args(&self, id: &str) -> Vec<String> {
        let mut args = self.common_args();
        args.push("--no-playlist".to_string());
        args.push("-f".to_string());
        args.push(self.config.format.clone());
        args.push("--".to_string());
        args.push(self.config.watch_url_for(id));
        args
    }

    pub(crate) fn parse_search(&self, raw: &[u8]) -> Result<Vec<RawResult>, ExtractorError> {
        let playlist: SearchPlaylist = serde_json::from_slice(raw)?;
        let results = playlist
            .entries
            .into_iter()
            .flatten()
            .filter_map(|entry| {
                let id = entry.id.clone()?;
                let thumbnail = entry
                    .best_thumbnail()
                    .or_else(|| self.config.thumbnail_for(&id));
                Some(RawResult {
                    title: entry.title.clone().unwrap_or_else(|| id.clone()),
                    uploader: entry.uploader.clone().or_else(|| entry.channel.clone()),
                    thumbnail,
                    duration: entry.duration,
                    id,
                })
            })
            .collect();
        Ok(results)
    }

    pub(crate) fn parse_location(raw: &[u8]) -> Result<MediaLocation, ExtractorError> {
        let info: VideoInfo = serde_json::from_slice(raw)?;

        if let Some(url) = info.url {
            let audio_only = is_audio_only(info.vcodec.as_deref(), info.acodec.as_deref());
            let ext = info.ext.as_deref().unwrap_or_default();
            let content_type = if info.protocol.as_deref().is_some_and(|p| p.starts_with("m3u8")) {
                content_type_for("m3u8", audio_only)
            } else {
                content_type_for(ext, audio_only)
            };
            return Ok(MediaLocation {
                url,
                content_type: content_type.to_string(),
                http_headers: info.http_headers,
            });
        }

        // Merged selections report one entry per stream; prefer the audio one.
        let format = info
            .requested_formats
            .into_iter()
            .filter(|f| f.url.is_some())
            .max_by_key(|f| is_audio_only(f.vcodec.as_deref(), f.acodec.as_deref()))
            .ok_or(ExtractorError::NoStreamsFound)?;
        let audio_only = is_audio_only(format.vcodec.as_deref(), format.acodec.as_deref());
        let content_type = content_type_for(format.ext.as_deref().unwrap_or_default(), audio_only);
        Ok(MediaLocation {
            url: format.url.ok_or(ExtractorError::NoStreamsFound)?,
            content_type: content_type.to_string(),
            http_headers: format.http_headers,
        })
    }
}

impl Default for YtDlpExtractor {
    fn default() -> Self {
        Self::new(YtDlpConfig::default())
    }
}

#[async_trait]
impl ExtractionService for YtDlpExtractor {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    #[instrument(skip(self), level = "debug")]
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RawResult>, ExtractorError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ExtractorError::InvalidInput("empty query".to_string()));
        }
        let stdout = self.run(self.search_args(query, limit.max(1))).await?;
        let mut results = self.parse_search(&stdout)?;
        results.truncate(limit);
        Ok(results)
    }

    #[instrument(skip(self), level = "debug")]
    async fn resolve_media(&self, id: &str) -> Result<MediaLocation, ExtractorError> {
        if !is_valid_id(id) {
            return Err(ExtractorError::InvalidInput(format!("invalid identifier: {id:?}")));
        }
        let stdout = self.run(self.resolve_args(id)).await?;
        Self::parse_location(&stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_JSON: &str = r#"{
        "_type": "playlist",
        "entries": [
            {"id": "aaa", "title": "First", "uploader": "Someone", "duration": 215.0,
             "thumbnails": [{"url": "https://t/small.jpg", "width": 120, "height": 90},
                            {"url": "https://t/big.jpg", "width": 480, "height": 360}]},
            {"id": "bbb", "title": "Second", "channel": "A Channel"},
            {"title": "no id"},
            null
        ]
    }"#;

    #[test]
    fn test_parse_search() {
        let extractor = YtDlpExtractor::default();
        let results = extractor.parse_search(SEARCH_JSON.as_bytes()).unwrap();
        assert_eq!(results.len(), 2);

        assert_eq!(results[0].id, "aaa");
        assert_eq!(results[0].uploader.as_deref(), Some("Someone"));
        assert_eq!(results[0].thumbnail.as_deref(), Some("https://t/big.jpg"));
        assert_eq!(results[0].duration, Some(215.0));

        assert_eq!(results[1].uploader.as_deref(), Some("A Channel"));
        assert_eq!(
            results[1].thumbnail.as_deref(),
            Some("https://i.ytimg.com/vi/bbb/hqdefault.jpg")
        );
        assert_eq!(results[1].duration, None);
    }

    #[test]
    fn test_parse_location_single_format() {
        let json = r#"{"id": "aaa", "url": "https://media/aaa", "ext": "webm",
                       "acodec": "opus", "vcodec": "none",
                       "http_headers": {"User-Agent": "UA", "Referer": "https://site/"}}"#;
        let location = YtDlpExtractor::parse_location(json.as_bytes()).unwrap();
        assert_eq!(location.url, "https://media/aaa");
        assert_eq!(location.content_type, "audio/webm");
        assert_eq!(location.http_headers.get("Referer").map(String::as_str), Some("https://site/"));
    }

    #[test]
    fn test_parse_location_prefers_audio_of_merged_formats() {
        let json = r#"{"id": "aaa", "requested_formats": [
            {"url": "https://media/video", "ext": "mp4", "vcodec": "avc1", "acodec": "none"},
            {"url": "https://media/audio", "ext": "m4a", "vcodec": "none", "acodec": "mp4a"}
        ]}"#;
        let location = YtDlpExtractor::parse_location(json.as_bytes()).unwrap();
        assert_eq!(location.url, "https://media/audio");
        assert_eq!(location.content_type, "audio/mp4");
    }

    #[test]
    fn test_parse_location_without_url() {
        let json = r#"{"id": "aaa"}"#;
        assert!(matches!(
            YtDlpExtractor::parse_location(json.as_bytes()),
            Err(ExtractorError::NoStreamsFound)
        ));
    }

    #[test]
    fn test_args_terminate_options_before_target() {
        let extractor = YtDlpExtractor::new(YtDlpConfig::default().with_extra_arg("--cookies=c.txt"));
        let args = extractor.search_args("-rm rf", 15);
        assert_eq!(args.last().map(String::as_str), Some("ytsearch15:-rm rf"));
        assert_eq!(args[args.len() - 2], "--");
        assert!(args.contains(&"--cookies=c.txt".to_string()));

        let args = extractor.resolve_args("abc");
        assert_eq!(args.last().map(String::as_str), Some("https://www.youtube.com/watch?v=abc"));
        assert!(args.windows(2).any(|w| w[0] == "-f" && w[1] == "bestaudio/best"));
    }

    #[tokio::test]
    async fn test_rejects_invalid_identifier() {
        let extractor = YtDlpExtractor::default();
        assert!(matches!(
            extractor.resolve_media("--exec").await,
            Err(ExtractorError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let extractor = YtDlpExtractor::new(
            YtDlpConfig::default().with_binary("/nonexistent/cadence-yt-dlp"),
        );
        assert!(matches!(
            extractor.resolve_media("abc").await,
            Err(ExtractorError::Spawn { .. })
        ));
    }

    #[tokio::test]
    #[ignore]
    async fn test_live_search_and_resolve() {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();

        let extractor = YtDlpExtractor::default();
        let results = extractor.search("lofi", 3).await.unwrap();
        println!("{results:?}");
        let location = extractor.resolve_media(&results[0].id).await.unwrap();
        println!("{location:?}");
    }
}
