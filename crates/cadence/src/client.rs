use std::sync::Arc;

use reqwest::Client;
use rustls::{ClientConfig, crypto::ring};
use rustls_platform_verifier::BuilderVerifierExt;
use tracing::{debug, info};

use crate::config::UpstreamConfig;
use crate::error::UpstreamError;
use crate::proxy::build_proxy_from_config;

/// Build the HTTP client used for upstream media fetches.
///
/// The client has no overall request timeout since a response body may be
/// streamed for as long as the client keeps reading; the per-read bound is
/// enforced by the stream proxy. Content encodings are disabled so bytes are
/// relayed exactly as the provider serves them.
pub fn create_client(config: &UpstreamConfig) -> Result<Client, UpstreamError> {
    let proxy = config.proxy.as_ref().map(build_proxy_from_config).transpose()?;

    let provider = Arc::new(ring::default_provider());

    let tls_config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| UpstreamError::Client(format!("TLS protocol versions: {e}")))?
        .with_platform_verifier()
        .map_err(|e| UpstreamError::Client(format!("platform certificate verifier: {e}")))?
        .with_no_client_auth();

    let mut client_builder = Client::builder()
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .user_agent(&config.user_agent)
        .default_headers(config.headers.clone())
        .use_preconfigured_tls(tls_config)
        .no_gzip()
        .no_deflate()
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    if !config.read_timeout.is_zero() {
        client_builder = client_builder.pool_idle_timeout(config.read_timeout);
    }

    if let (Some(proxy), Some(proxy_config)) = (proxy, &config.proxy) {
        client_builder = client_builder.proxy(proxy);
        info!(proxy_url = %proxy_config.url, "Using explicitly configured proxy for upstream fetches");
    } else if config.use_system_proxy {
        debug!("Using system proxy settings for upstream fetches");
    } else {
        client_builder = client_builder.no_proxy();
        debug!("Proxy disabled for upstream fetches");
    }

    client_builder.build().map_err(UpstreamError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::ProxyConfig;

    #[test]
    fn test_create_client() {
        let config = UpstreamConfig::builder().with_system_proxy(false).build();
        assert!(create_client(&config).is_ok());
    }

    #[test]
    fn test_create_client_rejects_bad_proxy() {
        let config = UpstreamConfig::builder()
            .with_proxy(ProxyConfig::from_url("http://[::1"))
            .build();
        assert!(matches!(
            create_client(&config),
            Err(UpstreamError::Proxy(_))
        ));
    }
}
