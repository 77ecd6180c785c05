//! # Caching Module
//!
//! TTL-bounded caches in front of the extraction backend:
//!
//! - [`TtlCache`]: the generic store, with expiry checked on read
//! - [`SearchCache`]: result lists keyed by normalized query text
//! - [`ResolutionCache`]: resolved media locations keyed by identifier

mod resolution;
mod search;
mod store;
mod types;

pub use resolution::ResolutionCache;
pub use search::{SearchCache, SearchResults, normalize_query};
pub use store::TtlCache;
pub use types::{CacheConfig, DEFAULT_RESOLUTION_TTL, DEFAULT_SEARCH_TTL};
pub(crate) use types::secs;
