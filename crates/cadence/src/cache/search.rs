use std::sync::Arc;

use crate::types::SearchResult;

use super::store::TtlCache;
use super::types::CacheConfig;

/// Ordered result list shared between the cache and its readers
pub type SearchResults = Arc<Vec<SearchResult>>;

/// Search result lists keyed by normalized query text.
#[derive(Debug, Clone)]
pub struct SearchCache {
    store: TtlCache<String, SearchResults>,
}

impl SearchCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            store: TtlCache::with_capacity("search", config.search_ttl, config.max_search_entries),
        }
    }

    pub fn get(&self, query: &str) -> Option<SearchResults> {
        self.store.get(&normalize_query(query))
    }

    pub fn put(&self, query: &str, results: SearchResults) {
        self.store.put(normalize_query(query), results);
    }

    pub fn invalidate(&self, query: &str) {
        self.store.invalidate(&normalize_query(query));
    }

    pub fn store(&self) -> &TtlCache<String, SearchResults> {
        &self.store
    }
}

/// Trim, lowercase and collapse inner whitespace so equivalent queries
/// share one entry.
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
