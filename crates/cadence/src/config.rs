use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::cache::{CacheConfig, secs};
use crate::proxy::ProxyConfig;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Default size of the chunks re-emitted to clients
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Options for fetching media bytes from the upstream provider
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// Read timeout (maximum time between receiving data chunks)
    pub read_timeout: Duration,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// User agent string, replaced by a provider-required one when present
    pub user_agent: String,

    /// Headers sent with every upstream request
    pub headers: HeaderMap,

    /// Proxy configuration (optional)
    pub proxy: Option<ProxyConfig>,

    /// Whether to use system proxy settings if available
    pub use_system_proxy: bool,

    /// Upper bound on the size of each chunk handed to the client
    pub chunk_size: usize,

    pub pool_max_idle_per_host: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: UpstreamConfig::get_default_headers(),
            proxy: None,
            use_system_proxy: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
            pool_max_idle_per_host: 5,
        }
    }
}

impl UpstreamConfig {
    pub fn builder() -> crate::builder::UpstreamConfigBuilder {
        crate::builder::UpstreamConfigBuilder::new()
    }

    // Media bytes are relayed as-is, so no Accept-Encoding is advertised.
    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(
            reqwest::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );

        default_headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("*/*"));

        default_headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.5"),
        );
        default_headers
    }
}

/// Options for the single-flight resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Bound on a single extraction call; every waiter fails once it elapses
    #[serde(with = "secs")]
    pub resolve_timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            resolve_timeout: Duration::from_secs(45),
        }
    }
}

/// Options for background prefetching of search hits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefetchConfig {
    pub enabled: bool,
    /// Maximum number of concurrent background resolutions
    pub workers: usize,
    /// Pending requests beyond this are dropped
    pub queue_capacity: usize,
    /// Number of leading search hits submitted after each search
    pub top_n: usize,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            workers: 3,
            queue_capacity: 64,
            top_n: 3,
        }
    }
}

/// Top-level configuration of a [`crate::MediaService`]
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Number of results requested from the extraction backend per search
    pub search_limit: usize,
    /// Bound on a single search call to the extraction backend
    pub search_timeout: Duration,
    pub cache: CacheConfig,
    pub resolver: ResolverConfig,
    pub prefetch: PrefetchConfig,
    pub upstream: UpstreamConfig,
    /// Re-resolve once when the upstream rejects a cached location as expired
    pub refresh_expired_streams: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            search_limit: 15,
            search_timeout: Duration::from_secs(30),
            cache: CacheConfig::default(),
            resolver: ResolverConfig::default(),
            prefetch: PrefetchConfig::default(),
            upstream: UpstreamConfig::default(),
            refresh_expired_streams: true,
        }
    }
}
