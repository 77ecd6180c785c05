use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use cadence_engine::proxy::ProxyConfig;
use cadence_engine::{
    CacheConfig, ExtractionService, PrefetchConfig, RelayConfig, ResolverConfig, UpstreamConfig,
};
use cadence_extractor::{FallbackExtractor, YtDlpConfig, YtDlpExtractor};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::error::AppError;

const DEFAULT_CONFIG_FILE: &str = "cadence.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    /// Allow cross-origin requests from any origin
    pub cors: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
    /// Directory for a daily rolling log file
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorSection {
    #[serde(flatten)]
    pub ytdlp: YtDlpConfig,
    /// Format selectors tried in order when the primary one fails
    pub fallback_formats: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub limit: usize,
    pub timeout_secs: u64,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            limit: 15,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamSection {
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub chunk_size: usize,
    pub user_agent: Option<String>,
    /// Proxy URL, the scheme selects the proxy type
    pub proxy: Option<String>,
    pub proxy_username: Option<String>,
    pub proxy_password: Option<String>,
    pub use_system_proxy: bool,
    /// Re-resolve once when the upstream rejects a cached location
    pub refresh_expired_streams: bool,
}

impl Default for UpstreamSection {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            read_timeout_secs: 30,
            chunk_size: cadence_engine::config::DEFAULT_CHUNK_SIZE,
            user_agent: None,
            proxy: None,
            proxy_username: None,
            proxy_password: None,
            use_system_proxy: true,
            refresh_expired_streams: true,
        }
    }
}

/// Contents of `cadence.toml`. Every field has a default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSection,
    pub logging: LoggingSection,
    pub extractor: ExtractorSection,
    pub search: SearchSection,
    pub cache: CacheConfig,
    pub resolver: ResolverConfig,
    pub prefetch: PrefetchConfig,
    pub upstream: UpstreamSection,
}

impl AppConfig {
    /// Load configuration from `path`, or from `./cadence.toml` when no path
    /// is given and that file exists. Falls back to defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let path = match path {
            Some(path) if !path.exists() => {
                return Err(AppError::Config(format!(
                    "configuration file {} does not exist",
                    path.display()
                )));
            }
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    debug!("No configuration file found, using defaults");
                    return Ok(Self::default());
                }
                default
            }
        };

        let content = std::fs::read_to_string(&path)?;
        let config = Self::parse(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, AppError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply command-line and environment overrides
    pub fn apply_cli(&mut self, args: &CliArgs) {
        if let Some(host) = &args.host {
            self.server.host = host.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(binary) = &args.ytdlp {
            self.extractor.ytdlp.binary = binary.clone();
        }
        if let Some(proxy) = &args.proxy {
            self.upstream.proxy = Some(proxy.clone());
        }
        if args.no_prefetch {
            self.prefetch.enabled = false;
        }
        if args.json_logs {
            self.logging.json = true;
        }
        if let Some(dir) = &args.log_dir {
            self.logging.directory = Some(dir.clone());
        }
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| {
                AppError::Config(format!(
                    "invalid listen address {}:{}: {e}",
                    self.server.host, self.server.port
                ))
            })
    }

    pub fn relay_config(&self) -> RelayConfig {
        let upstream = &self.upstream;
        let mut builder = UpstreamConfig::builder()
            .with_connect_timeout(Duration::from_secs(upstream.connect_timeout_secs))
            .with_read_timeout(Duration::from_secs(upstream.read_timeout_secs))
            .with_chunk_size(upstream.chunk_size)
            .with_system_proxy(upstream.use_system_proxy);
        if let Some(user_agent) = &upstream.user_agent {
            builder = builder.with_user_agent(user_agent);
        }
        if let Some(url) = &upstream.proxy {
            let mut proxy = ProxyConfig::from_url(url);
            if let (Some(username), Some(password)) =
                (&upstream.proxy_username, &upstream.proxy_password)
            {
                proxy = proxy.with_auth(username, password);
            }
            builder = builder.with_proxy(proxy);
        }

        RelayConfig {
            search_limit: self.search.limit,
            search_timeout: Duration::from_secs(self.search.timeout_secs),
            cache: self.cache.clone(),
            resolver: self.resolver.clone(),
            prefetch: self.prefetch.clone(),
            upstream: builder.build(),
            refresh_expired_streams: upstream.refresh_expired_streams,
        }
    }

    /// The extraction backend: yt-dlp with the configured format, then each
    /// fallback format in turn.
    pub fn extractor(&self) -> Arc<dyn ExtractionService> {
        let primary = YtDlpExtractor::new(self.extractor.ytdlp.clone());
        if self.extractor.fallback_formats.is_empty() {
            return Arc::new(primary);
        }

        let mut chain = FallbackExtractor::new(vec![Arc::new(primary)]);
        for format in &self.extractor.fallback_formats {
            let config = self.extractor.ytdlp.clone().with_format(format.clone());
            chain.push(Arc::new(YtDlpExtractor::new(config)));
        }
        Arc::new(chain)
    }
}
