//! # Cadence Engine
//!
//! Caching and streaming layer in front of an expensive, rate-limited media
//! lookup backend.
//!
//! ## Features
//!
//! - TTL caches for search results and resolved media locations
//! - Single-flight resolution: one backend call per identifier at a time
//! - Bounded background prefetching of top search hits
//! - Chunked re-streaming of upstream media with Range support

pub mod builder;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod prefetch;
pub mod proxy;
pub mod resolver;
pub mod service;
pub mod stream;
pub mod types;

#[cfg(test)]
mod testing;

pub use builder::UpstreamConfigBuilder;
pub use cache::{CacheConfig, ResolutionCache, SearchCache, SearchResults, TtlCache};
pub use client::create_client;
pub use config::{PrefetchConfig, RelayConfig, ResolverConfig, UpstreamConfig};
pub use error::{RelayError, ResolutionError, UpstreamError};
pub use prefetch::{PrefetchHandle, PrefetchScheduler, PrefetchStats};
pub use resolver::{Resolver, ResolverStats};
pub use service::{MediaService, MediaStream, ServiceStatus, StreamOptions};
pub use stream::{ByteStream, ChunkedStream, StreamHead, StreamProxy};
pub use types::{ResolvedMedia, SearchResult, format_duration};

// Re-export the extraction contract so callers need only this crate
pub use cadence_extractor::{ExtractionService, ExtractorError, MediaLocation, RawResult};
