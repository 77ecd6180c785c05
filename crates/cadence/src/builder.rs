//! # Builder for UpstreamConfig
//!
//! Fluent construction of [`UpstreamConfig`] for the stream proxy.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use cadence_engine::UpstreamConfig;
//! use cadence_engine::proxy::ProxyConfig;
//!
//! let config = UpstreamConfig::builder()
//!     .with_connect_timeout(Duration::from_secs(5))
//!     .with_read_timeout(Duration::from_secs(20))
//!     .with_chunk_size(32 * 1024)
//!     .with_header("X-Client", "cadence")
//!     .build();
//!
//! let proxied = UpstreamConfig::builder()
//!     .with_proxy(ProxyConfig::from_url("socks5://127.0.0.1:1080"))
//!     .build();
//! assert!(!proxied.use_system_proxy);
//! ```

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::config::UpstreamConfig;
use crate::proxy::ProxyConfig;

/// Builder for creating UpstreamConfig instances with a fluent API
#[derive(Debug, Clone)]
pub struct UpstreamConfigBuilder {
    config: UpstreamConfig,
}

impl UpstreamConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: UpstreamConfig::default(),
        }
    }

    /// Set the connection timeout (time to establish initial connection)
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the read timeout (maximum time between receiving data chunks)
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.config.follow_redirects = follow;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Add a custom HTTP header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.as_ref().parse::<reqwest::header::HeaderName>(),
            HeaderValue::from_str(value.as_ref()),
        ) {
            self.config.headers.insert(name, value);
        }
        self
    }

    /// Set all HTTP headers, replacing any existing headers
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.config.headers = headers;
        self
    }

    /// Set the proxy configuration. An explicit proxy disables the system one.
    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.config.proxy = Some(proxy);
        self.config.use_system_proxy = false;
        self
    }

    /// Set whether to use system proxy settings. Ignored when an explicit
    /// proxy is configured.
    pub fn with_system_proxy(mut self, use_system_proxy: bool) -> Self {
        if self.config.proxy.is_none() {
            self.config.use_system_proxy = use_system_proxy;
        }
        self
    }

    /// Set the chunk size, clamped to at least 1 KiB
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.config.chunk_size = chunk_size.max(1024);
        self
    }

    pub fn with_pool_max_idle_per_host(mut self, max_idle: usize) -> Self {
        self.config.pool_max_idle_per_host = max_idle;
        self
    }

    pub fn build(self) -> UpstreamConfig {
        self.config
    }
}

impl Default for UpstreamConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::{ProxyAuth, ProxyType};

    #[test]
    fn test_builder_defaults() {
        let config = UpstreamConfigBuilder::new().build();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.read_timeout, Duration::from_secs(30));
        assert!(config.follow_redirects);
        assert!(config.use_system_proxy);
        assert!(config.proxy.is_none());
    }

    #[test]
    fn test_builder_customization() {
        let config = UpstreamConfigBuilder::new()
            .with_connect_timeout(Duration::from_secs(20))
            .with_follow_redirects(false)
            .with_user_agent("CustomUserAgent/1.0")
            .with_header("X-Custom-Header", "CustomValue")
            .with_header("bad header", "ignored")
            .with_system_proxy(false)
            .with_chunk_size(10)
            .build();

        assert_eq!(config.connect_timeout, Duration::from_secs(20));
        assert!(!config.follow_redirects);
        assert_eq!(config.user_agent, "CustomUserAgent/1.0");
        assert!(!config.use_system_proxy);
        assert_eq!(config.chunk_size, 1024);

        let header_value = config.headers.get("X-Custom-Header").unwrap();
        assert_eq!(header_value.to_str().unwrap(), "CustomValue");
        assert!(config.headers.get("bad header").is_none());
    }

    #[test]
    fn test_proxy_configuration() {
        let proxy_config = ProxyConfig {
            url: "http://proxy.example.com:8080".to_string(),
            proxy_type: ProxyType::Http,
            auth: Some(ProxyAuth {
                username: "user".to_string(),
                password: "pass".to_string(),
            }),
        };

        let config = UpstreamConfigBuilder::new()
            .with_proxy(proxy_config.clone())
            .with_system_proxy(true)
            .build();

        assert!(!config.use_system_proxy);
        let stored = config.proxy.unwrap();
        assert_eq!(stored.url, proxy_config.url);
        assert_eq!(stored.auth.as_ref().unwrap().username, "user");
        assert_eq!(stored.proxy_type, ProxyType::Http);
    }
}
