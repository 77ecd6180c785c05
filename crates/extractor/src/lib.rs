//! # cadence-extractor
//!
//! Backends that turn a search query into result records and a content
//! identifier into a playable, time-limited media location.
//!
//! - [`ExtractionService`]: the contract the cadence engine depends on
//! - [`YtDlpExtractor`]: drives the `yt-dlp` command-line tool
//! - [`FallbackExtractor`]: tries several backends in order

pub mod error;
pub mod fallback;
pub mod media;
pub mod service;
pub mod ytdlp;

pub use error::ExtractorError;
pub use fallback::FallbackExtractor;
pub use media::{MediaLocation, RawResult, content_type_for};
pub use service::{ExtractionService, is_valid_id};
pub use ytdlp::{YtDlpConfig, YtDlpExtractor};
