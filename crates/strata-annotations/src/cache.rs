//! Process-wide memoization
//!
//! Attribute methods, type-mapping chains and declared annotations are
//! cached for the lifetime of the process. Keys include the owning
//! registry's id, so registries never observe each other's entries.

use std::hash::Hash;

use dashmap::DashMap;

use crate::error::AnnotationResult;

/// Concurrent map with publish-once semantics per key
///
/// Reads never take a lock across the computation. On a miss the value is
/// computed without holding a shard lock (computations may recurse into the
/// same cache) and published with `entry().or_insert`, so when two threads
/// race both see the first published value.
pub(crate) struct ConcurrentCache<K, V> {
    entries: DashMap<K, V>,
}

impl<K, V> ConcurrentCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub(crate) fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub(crate) fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub(crate) fn get_or_compute(&self, key: K, compute: impl FnOnce() -> V) -> V {
        if let Some(value) = self.get(&key) {
            return value;
        }
        let computed = compute();
        self.entries.entry(key).or_insert(computed).value().clone()
    }

    /// Like [`Self::get_or_compute`], but failed computations are not cached
    pub(crate) fn try_get_or_compute(
        &self,
        key: K,
        compute: impl FnOnce() -> AnnotationResult<V>,
    ) -> AnnotationResult<V> {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let computed = compute()?;
        Ok(self.entries.entry(key).or_insert(computed).value().clone())
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&self) {
        self.entries.clear();
    }
}

/// Clear every engine cache
///
/// Only needed when type declarations are replaced at runtime; registries
/// are immutable once shared, so stale entries are otherwise impossible.
pub fn clear_cache() {
    crate::attribute_methods::clear_cache();
    crate::type_mappings::clear_cache();
    crate::scanner::clear_cache();
    tracing::debug!("annotation engine caches cleared");
}
