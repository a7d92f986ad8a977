//! Concurrent map from identity to the latest known configuration value.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;

use crate::model::{ConfigIdentity, ConfigValue};
use crate::observability::metrics;

/// Latest known value per identity.
///
/// Cloning is cheap and shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct RequestCache {
    inner: Arc<DashMap<ConfigIdentity, Arc<ConfigValue>>>,
}

/// Summary of one cache entry, without the payload.
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry {
    pub identity: ConfigIdentity,
    pub generation: i64,
    pub content_checksum: String,
    pub error: bool,
}

impl RequestCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identity: &ConfigIdentity) -> Option<Arc<ConfigValue>> {
        // Clone the Arc so the shard read lock is released right away.
        self.inner.get(identity).map(|r| Arc::clone(r.value()))
    }

    /// Replace whatever is stored for `value.identity`.
    ///
    /// Callers only hand in values they trust to be current.
    pub fn put(&self, value: Arc<ConfigValue>) {
        let previous = self.inner.insert(value.identity.clone(), Arc::clone(&value));
        tracing::debug!(
            identity = %value.identity,
            generation = value.generation,
            previous_generation = previous.as_ref().map(|p| p.generation),
            "Cache updated"
        );
        metrics::record_cache_size(self.inner.len());
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Snapshot of all entries, sorted by identity.
    pub fn entries(&self) -> Vec<CacheEntry> {
        let mut entries: Vec<CacheEntry> = self
            .inner
            .iter()
            .map(|r| CacheEntry {
                identity: r.key().clone(),
                generation: r.value().generation,
                content_checksum: r.value().content_checksum.clone(),
                error: r.value().error,
            })
            .collect();
        entries.sort_by(|a, b| a.identity.cmp(&b.identity));
        entries
    }
}
