//! In-memory tier of the metadata/hash cache (spec.md 4.1, "Tier 1").
//!
//! An LRU map per entry kind, guarded by `parking_lot::RwLock` so reads can
//! run concurrently and only eviction/insertion takes an exclusive lock.
//! Grounded on the `lru` + lock pairing used for the same purpose in the
//! retrieval pack's file-serving cache example.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::RwLock;

use crate::model::{HashEntry, MetadataEntry};

/// Fixed-capacity LRU cache for one entry kind, keyed by normalized
/// absolute path string.
pub struct Tier1<V> {
    inner: RwLock<LruCache<String, V>>,
}

impl<V: Clone> Tier1<V> {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity clamped to >= 1");
        Self {
            inner: RwLock::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        // `LruCache::get` needs `&mut self` to update recency, so this takes
        // a write lock despite being a "read". Readers never block readers
        // of tier 2, which is the concurrency property spec.md 4.1 asks for.
        self.inner.write().get(key).cloned()
    }

    pub fn put(&self, key: String, value: V) {
        self.inner.write().put(key, value);
    }

    pub fn invalidate(&self, key: &str) {
        self.inner.write().pop(key);
    }

    pub fn invalidate_prefix(&self, prefix: &str) {
        let mut guard = self.inner.write();
        let stale: Vec<String> = guard
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for key in stale {
            guard.pop(&key);
        }
    }

    /// Re-keys an entry after a successful rename, preserving recency
    /// position is not required by spec.md — only that the new path
    /// resolves and the old one doesn't.
    pub fn rekey(&self, old_key: &str, new_key: String) {
        let mut guard = self.inner.write();
        if let Some(value) = guard.pop(old_key) {
            guard.put(new_key, value);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

pub type MetadataTier1 = Tier1<MetadataEntry>;
pub type HashTier1 = Tier1<HashEntry>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_least_recently_used() {
        let tier: Tier1<i32> = Tier1::new(2);
        tier.put("a".to_string(), 1);
        tier.put("b".to_string(), 2);
        tier.get("a");
        tier.put("c".to_string(), 3);
        // "b" was least-recently-used after touching "a"; it gets evicted.
        assert!(tier.get("b").is_none());
        assert_eq!(tier.get("a"), Some(1));
        assert_eq!(tier.get("c"), Some(3));
    }

    #[test]
    fn invalidate_prefix_removes_matching_keys() {
        let tier: Tier1<i32> = Tier1::new(8);
        tier.put("/a/x.jpg".to_string(), 1);
        tier.put("/a/y.jpg".to_string(), 2);
        tier.put("/b/z.jpg".to_string(), 3);
        tier.invalidate_prefix("/a/");
        assert!(tier.get("/a/x.jpg").is_none());
        assert!(tier.get("/a/y.jpg").is_none());
        assert_eq!(tier.get("/b/z.jpg"), Some(3));
    }

    #[test]
    fn rekey_moves_value_to_new_path() {
        let tier: Tier1<i32> = Tier1::new(8);
        tier.put("/a/old.jpg".to_string(), 42);
        tier.rekey("/a/old.jpg", "/a/new.jpg".to_string());
        assert!(tier.get("/a/old.jpg").is_none());
        assert_eq!(tier.get("/a/new.jpg"), Some(42));
    }
}
