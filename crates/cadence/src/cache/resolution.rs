use crate::types::ResolvedMedia;

use super::store::TtlCache;
use super::types::CacheConfig;

/// Resolved media locations keyed by content identifier.
#[derive(Debug, Clone)]
pub struct ResolutionCache {
    store: TtlCache<String, ResolvedMedia>,
}

impl ResolutionCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            store: TtlCache::with_capacity(
                "resolution",
                config.resolution_ttl,
                config.max_resolution_entries,
            ),
        }
    }

    pub fn get(&self, id: &str) -> Option<ResolvedMedia> {
        self.store.get(&id.to_string())
    }

    pub fn put(&self, id: &str, media: ResolvedMedia) {
        self.store.put(id.to_string(), media);
    }

    pub fn invalidate(&self, id: &str) {
        self.store.invalidate(&id.to_string());
    }

    pub fn store(&self) -> &TtlCache<String, ResolvedMedia> {
        &self.store
    }
}
