//! # Cache Types
//!
//! Configuration shared by the search and resolution caches.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default lifetime of a cached search result list
pub const DEFAULT_SEARCH_TTL: Duration = Duration::from_secs(30 * 60);
/// Default lifetime of a cached resolution. Provider URLs stay valid for
/// roughly six hours, so this stays well below that.
pub const DEFAULT_RESOLUTION_TTL: Duration = Duration::from_secs(4 * 60 * 60);

/// Configuration for the caching system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL for search result lists
    #[serde(with = "secs")]
    pub search_ttl: Duration,
    /// TTL for resolved media locations
    #[serde(with = "secs")]
    pub resolution_ttl: Duration,
    /// Maximum number of cached queries, unbounded when `None`
    pub max_search_entries: Option<u64>,
    /// Maximum number of cached resolutions, unbounded when `None`
    pub max_resolution_entries: Option<u64>,
    /// Interval of the background sweep of expired entries, disabled when `None`
    #[serde(with = "optional_secs")]
    pub sweep_interval: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            search_ttl: DEFAULT_SEARCH_TTL,
            resolution_ttl: DEFAULT_RESOLUTION_TTL,
            max_search_entries: Some(10_000),
            max_resolution_entries: Some(10_000),
            sweep_interval: Some(Duration::from_secs(5 * 60)),
        }
    }
}

pub(crate) mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

pub(crate) mod optional_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|v| v.map(Duration::from_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: CacheConfig = serde_json::from_str(r#"{"search_ttl": 60}"#).unwrap();
        assert_eq!(config.search_ttl, Duration::from_secs(60));
        assert_eq!(config.resolution_ttl, DEFAULT_RESOLUTION_TTL);
        assert_eq!(config.sweep_interval, Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_default_capacity_bounds_both_caches() {
        let config = CacheConfig::default();
        assert_eq!(config.max_search_entries, Some(10_000));
        assert_eq!(config.max_resolution_entries, Some(10_000));

        let unbounded: CacheConfig =
            serde_json::from_str(r#"{"max_resolution_entries": null}"#).unwrap();
        assert_eq!(unbounded.max_resolution_entries, None);
        assert_eq!(unbounded.max_search_entries, Some(10_000));
    }

    #[test]
    fn test_resolution_ttl_below_provider_expiry() {
        assert!(CacheConfig::default().resolution_ttl < Duration::from_secs(6 * 60 * 60));
    }
}
