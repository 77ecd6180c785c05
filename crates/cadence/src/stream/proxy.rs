use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use tracing::{debug, info, instrument};
use url::Url;

use super::chunked::ChunkedStream;
use crate::client::create_client;
use crate::config::UpstreamConfig;
use crate::error::UpstreamError;
use crate::types::ResolvedMedia;

/// Response metadata known before any body bytes are read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHead {
    /// `200 OK` or `206 Partial Content`
    pub status: StatusCode,
    pub content_type: String,
    pub content_length: Option<u64>,
    pub content_range: Option<String>,
    pub accept_ranges: Option<String>,
}

/// Lazy, forward-only sequence of media chunks plus its head.
///
/// Dropping it drops the upstream response and releases the connection.
pub struct ByteStream {
    head: StreamHead,
    body: ChunkedStream,
}

impl ByteStream {
    pub fn new(head: StreamHead, body: ChunkedStream) -> Self {
        Self { head, body }
    }

    pub fn head(&self) -> &StreamHead {
        &self.head
    }

    pub fn into_parts(self) -> (StreamHead, ChunkedStream) {
        (self.head, self.body)
    }
}

impl Stream for ByteStream {
    type Item = Result<Bytes, UpstreamError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.body).poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.body.size_hint()
    }
}

/// Opens upstream media locations and re-emits them as bounded chunks.
#[derive(Debug)]
pub struct StreamProxy {
    client: Client,
    config: UpstreamConfig,
    streams_opened: AtomicU64,
}

impl StreamProxy {
    pub fn new(config: UpstreamConfig) -> Result<Self, UpstreamError> {
        let client = create_client(&config)?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: UpstreamConfig) -> Self {
        Self {
            client,
            config,
            streams_opened: AtomicU64::new(0),
        }
    }

    pub fn streams_opened(&self) -> u64 {
        self.streams_opened.load(Ordering::Relaxed)
    }

    /// Open `media` upstream, forwarding an optional client `Range` header.
    ///
    /// Fails without retrying on connection errors and non-success statuses.
    #[instrument(skip(self, media), fields(content_type = %media.content_type), level = "debug")]
    pub async fn open(
        &self,
        media: &ResolvedMedia,
        range: Option<&str>,
    ) -> Result<ByteStream, UpstreamError> {
        let url = parse_media_url(&media.media_url)?;
        let mut request = self
            .client
            .get(url)
            .headers(provider_headers(&media.http_headers));
        if let Some(range) = range {
            request = request.header(header::RANGE, range);
        }

        let head_timeout = self.config.connect_timeout + self.config.read_timeout;
        let response = if head_timeout.is_zero() {
            request.send().await?
        } else {
            tokio::time::timeout(head_timeout, request.send())
                .await
                .map_err(|_| UpstreamError::ReadTimeout(head_timeout))??
        };

        let status = response.status();
        if !status.is_success() {
            debug!(%status, "Upstream rejected media request");
            return Err(UpstreamError::Status(status));
        }

        let headers = response.headers();
        let head = StreamHead {
            status,
            content_type: upstream_content_type(headers).unwrap_or_else(|| media.content_type.clone()),
            content_length: response.content_length(),
            content_range: header_string(headers, header::CONTENT_RANGE),
            accept_ranges: header_string(headers, header::ACCEPT_RANGES),
        };

        self.streams_opened.fetch_add(1, Ordering::Relaxed);
        info!(
            %status,
            content_length = ?head.content_length,
            ranged = range.is_some(),
            "Opened upstream media stream"
        );

        let read_timeout = Some(self.config.read_timeout).filter(|t| *t > Duration::ZERO);
        let body = ChunkedStream::new(response.bytes_stream(), self.config.chunk_size, read_timeout);
        Ok(ByteStream::new(head, body))
    }
}

fn parse_media_url(raw: &str) -> Result<Url, UpstreamError> {
    let url = Url::parse(raw).map_err(|e| UpstreamError::InvalidUrl(format!("{raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(UpstreamError::InvalidUrl(format!(
            "unsupported scheme {scheme:?}"
        ))),
    }
}

// Accept-Encoding is never replayed; bytes are relayed undecoded.
fn provider_headers(headers: &rustc_hash::FxHashMap<String, String>) -> HeaderMap {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) if name != header::ACCEPT_ENCODING => {
                map.insert(name, value);
            }
            (Ok(_), Ok(_)) => {}
            _ => debug!(header = %name, "Skipping invalid provider header"),
        }
    }
    map
}

fn upstream_content_type(headers: &HeaderMap) -> Option<String> {
    header_string(headers, header::CONTENT_TYPE)
        .filter(|ct| !ct.is_empty() && !ct.starts_with("application/octet-stream"))
}

fn header_string(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
