mod config;
mod extractor;
pub mod models;

pub use config::{DEFAULT_FORMAT, YtDlpConfig};
pub use extractor::YtDlpExtractor;
