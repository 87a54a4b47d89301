//! Two-tier metadata/hash cache (C1), spec.md section 4.1.
//!
//! Tier 1 (in-memory LRU) is consulted first; a miss falls through to tier
//! 2 (on-disk), promoting the result back into tier 1. Tier-2 I/O errors
//! degrade the cache to tier-1-only for that call and are reported through
//! `on_degraded` rather than propagated, per spec.md's "Failure modes."

mod store;
mod tier1;

use std::path::Path;

use crate::error::Result;
use crate::model::{FileFingerprint, HashEntry, MetadataEntry};

pub use store::Store;
pub use tier1::{HashTier1, MetadataTier1, Tier1};

/// Normalizes a path into the cache key: an absolute path string,
/// lower-cased only when the caller says the filesystem folds case.
pub fn normalize_key(path: &Path, case_insensitive: bool) -> String {
    let s = path.to_string_lossy().to_string();
    if case_insensitive { s.to_lowercase() } else { s }
}

/// The two-tier cache. Handed out by reference to every component that
/// needs it (naming modules, extractor, execution engine) — never a
/// global, per the Design Notes.
pub struct Cache {
    metadata_tier1: MetadataTier1,
    hash_tier1: HashTier1,
    tier2: Store,
    on_degraded: Box<dyn Fn(&str) + Send + Sync>,
}

impl Cache {
    pub fn new(metadata_capacity: usize, hash_capacity: usize, tier2: Store) -> Self {
        Self {
            metadata_tier1: Tier1::new(metadata_capacity),
            hash_tier1: Tier1::new(hash_capacity),
            tier2,
            on_degraded: Box::new(|_| {}),
        }
    }

    /// Registers a callback invoked whenever a tier-2 operation fails and
    /// the cache degrades to tier-1-only for that call. The CLI harness
    /// wires this to `Logger::warn`.
    pub fn on_degraded(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_degraded = Box::new(callback);
        self
    }

    pub fn get_metadata(&self, path: &Path, case_insensitive: bool) -> Option<MetadataEntry> {
        let key = normalize_key(path, case_insensitive);
        if let Some(entry) = self.metadata_tier1.get(&key) {
            return Some(entry);
        }
        match self.tier2.get_metadata(&key) {
            Ok(Some(entry)) => {
                self.metadata_tier1.put(key, entry.clone());
                Some(entry)
            }
            Ok(None) => None,
            Err(e) => {
                (self.on_degraded)(&e.to_string());
                None
            }
        }
    }

    /// Inserts a metadata entry. If an existing extended entry would be
    /// overwritten by a fast one, the new entry is discarded (spec.md 4.1
    /// "extended never downgrades to fast").
    pub fn put_metadata(&self, path: &Path, case_insensitive: bool, entry: MetadataEntry) {
        let key = normalize_key(path, case_insensitive);
        if let Some(existing) = self.get_metadata(path, case_insensitive)
            && existing.is_extended
            && !entry.is_extended
        {
            return;
        }
        self.metadata_tier1.put(key.clone(), entry.clone());
        if let Err(e) = self.tier2.put_metadata(&key, &entry) {
            (self.on_degraded)(&e.to_string());
        }
    }

    pub fn get_hash(
        &self,
        path: &Path,
        case_insensitive: bool,
        current_fingerprint: FileFingerprint,
    ) -> Option<HashEntry> {
        let key = normalize_key(path, case_insensitive);
        if let Some(entry) = self.hash_tier1.get(&key) {
            return entry.is_valid_for(current_fingerprint).then_some(entry);
        }
        match self.tier2.get_hash(&key) {
            Ok(Some(entry)) => {
                if entry.is_valid_for(current_fingerprint) {
                    self.hash_tier1.put(key, entry.clone());
                    Some(entry)
                } else {
                    None
                }
            }
            Ok(None) => None,
            Err(e) => {
                (self.on_degraded)(&e.to_string());
                None
            }
        }
    }

    pub fn put_hash(&self, path: &Path, case_insensitive: bool, entry: HashEntry) {
        let key = normalize_key(path, case_insensitive);
        self.hash_tier1.put(key.clone(), entry.clone());
        if let Err(e) = self.tier2.put_hash(&key, &entry) {
            (self.on_degraded)(&e.to_string());
        }
    }

    pub fn invalidate(&self, path: &Path, case_insensitive: bool) {
        let key = normalize_key(path, case_insensitive);
        self.metadata_tier1.invalidate(&key);
        self.hash_tier1.invalidate(&key);
        if let Err(e) = self.tier2.invalidate(&key) {
            (self.on_degraded)(&e.to_string());
        }
    }

    pub fn invalidate_prefix(&self, folder: &Path, case_insensitive: bool) {
        let key = normalize_key(folder, case_insensitive);
        self.metadata_tier1.invalidate_prefix(&key);
        self.hash_tier1.invalidate_prefix(&key);
        if let Err(e) = self.tier2.invalidate_prefix(&key) {
            (self.on_degraded)(&e.to_string());
        }
    }

    /// Re-keys all cache entries for `old_path` to `new_path` after a
    /// successful rename (spec.md 4.5 "invalidates affected cache entries
    /// and re-keys them under the new path").
    pub fn rekey(&self, old_path: &Path, new_path: &Path, case_insensitive: bool) {
        let old_key = normalize_key(old_path, case_insensitive);
        let new_key = normalize_key(new_path, case_insensitive);
        self.metadata_tier1.rekey(&old_key, new_key.clone());
        self.hash_tier1.rekey(&old_key, new_key.clone());
        if let Err(e) = self.tier2.rekey(&old_key, &new_key) {
            (self.on_degraded)(&e.to_string());
        }
    }
}

/// Convenience constructor matching a [`crate::config::RenamerConfig`].
pub fn open_cache(config: &crate::config::RenamerConfig) -> Result<Cache> {
    let store = Store::open(config.cache_db_path())?;
    Ok(Cache::new(
        config.metadata_cache_capacity(),
        config.hash_cache_capacity(),
        store,
    ))
}
