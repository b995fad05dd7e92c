//! Subdomain resolution cache
//!
//! Bounded TTL + LRU cache in front of the workspace store. Entries are
//! either a workspace snapshot or an explicit negative marker, so repeated
//! lookups of unknown subdomains stay cheap. The cache is an accelerator,
//! never the system of record; mutations invalidate it synchronously.

use std::time::Duration;

use moka::sync::Cache;

use crate::model::Workspace;

/// Resolution cache tuning
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Entry lifetime; zero disables caching entirely (test doubles)
    pub ttl: Duration,
    /// Maximum entries before LRU eviction
    pub capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(600),
            capacity: 500,
        }
    }
}

/// Subdomain → workspace cache with explicit negative entries
pub struct ResolutionCache {
    // None = cached "no such tenant"
    cache: Cache<String, Option<Workspace>>,
}

impl ResolutionCache {
    /// Build from config
    pub fn new(config: CacheConfig) -> Self {
        let cache = if config.ttl.is_zero() {
            // capacity 0 admits nothing; every lookup is a miss
            Cache::builder().max_capacity(0).build()
        } else {
            Cache::builder()
                .max_capacity(config.capacity)
                .time_to_live(config.ttl)
                .build()
        };
        Self { cache }
    }

    /// Cached entry for a normalized subdomain
    ///
    /// Outer `None` = not cached; `Some(None)` = cached negative.
    pub fn get(&self, subdomain: &str) -> Option<Option<Workspace>> {
        self.cache.get(subdomain)
    }

    /// Cache a lookup result (positive or negative)
    pub fn insert(&self, subdomain: &str, entry: Option<Workspace>) {
        self.cache.insert(subdomain.to_string(), entry);
    }

    /// Drop the entry for a subdomain
    ///
    /// Called synchronously from workspace mutations so staleness is
    /// bounded by the mutation-to-invalidation gap, not the full TTL.
    pub fn invalidate(&self, subdomain: &str) {
        self.cache.invalidate(subdomain);
    }

    /// Drop everything
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }

    /// Current entry count
    pub fn len(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ResolutionCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
