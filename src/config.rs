//! Runtime configuration for renamer-core.
//!
//! Mirrors the builder-with-defaults shape the teacher uses for its
//! garbage-collection configuration: a plain struct of tunables plus a
//! fluent builder, so the CLI harness and tests can construct it without
//! going through argument parsing.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::model::{ConflictPolicy, HashAlgorithm};

/// Default in-memory capacity for cached metadata entries (tier 1).
pub const DEFAULT_METADATA_CACHE_CAPACITY: usize = 1000;
/// Default in-memory capacity for cached hash entries (tier 1).
pub const DEFAULT_HASH_CACHE_CAPACITY: usize = 2000;
/// Default timeout for a single external metadata tool invocation.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolves `min(2 * available_parallelism, 8)`, the worker pool bound
/// spec.md mandates for both extraction and per-directory execution.
pub fn default_worker_count() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    (cpus * 2).min(8)
}

/// Tunable parameters for a `Renamer` instance.
#[derive(Debug, Clone)]
pub struct RenamerConfig {
    metadata_cache_capacity: usize,
    hash_cache_capacity: usize,
    worker_count: usize,
    hash_algorithm: HashAlgorithm,
    tool_timeout: Duration,
    default_conflict_policy: ConflictPolicy,
    cache_db_path: PathBuf,
    history_db_path: PathBuf,
}

impl RenamerConfig {
    /// Start a new builder with defaults matching the design document.
    pub fn builder() -> RenamerConfigBuilder {
        RenamerConfigBuilder::default()
    }

    pub fn metadata_cache_capacity(&self) -> usize {
        self.metadata_cache_capacity
    }

    pub fn hash_cache_capacity(&self) -> usize {
        self.hash_cache_capacity
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash_algorithm
    }

    pub fn tool_timeout(&self) -> Duration {
        self.tool_timeout
    }

    pub fn default_conflict_policy(&self) -> ConflictPolicy {
        self.default_conflict_policy
    }

    pub fn cache_db_path(&self) -> &Path {
        &self.cache_db_path
    }

    pub fn history_db_path(&self) -> &Path {
        &self.history_db_path
    }
}

impl Default for RenamerConfig {
    fn default() -> Self {
        Self {
            metadata_cache_capacity: DEFAULT_METADATA_CACHE_CAPACITY,
            hash_cache_capacity: DEFAULT_HASH_CACHE_CAPACITY,
            worker_count: default_worker_count(),
            hash_algorithm: HashAlgorithm::Blake3,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            default_conflict_policy: ConflictPolicy::Abort,
            cache_db_path: PathBuf::from(".renamer/cache.sqlite3"),
            history_db_path: PathBuf::from(".renamer/history.sqlite3"),
        }
    }
}

/// Builder for [`RenamerConfig`].
#[derive(Debug, Default)]
pub struct RenamerConfigBuilder {
    metadata_cache_capacity: Option<usize>,
    hash_cache_capacity: Option<usize>,
    worker_count: Option<usize>,
    hash_algorithm: Option<HashAlgorithm>,
    tool_timeout: Option<Duration>,
    default_conflict_policy: Option<ConflictPolicy>,
    cache_db_path: Option<PathBuf>,
    history_db_path: Option<PathBuf>,
}

impl RenamerConfigBuilder {
    pub fn metadata_cache_capacity(mut self, capacity: usize) -> Self {
        self.metadata_cache_capacity = Some(capacity);
        self
    }

    pub fn hash_cache_capacity(mut self, capacity: usize) -> Self {
        self.hash_cache_capacity = Some(capacity);
        self
    }

    pub fn worker_count(mut self, count: usize) -> Self {
        self.worker_count = Some(count);
        self
    }

    pub fn hash_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.hash_algorithm = Some(algorithm);
        self
    }

    pub fn tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = Some(timeout);
        self
    }

    pub fn default_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.default_conflict_policy = Some(policy);
        self
    }

    pub fn cache_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_db_path = Some(path.into());
        self
    }

    pub fn history_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.history_db_path = Some(path.into());
        self
    }

    pub fn build(self) -> RenamerConfig {
        let defaults = RenamerConfig::default();
        RenamerConfig {
            metadata_cache_capacity: self
                .metadata_cache_capacity
                .unwrap_or(defaults.metadata_cache_capacity),
            hash_cache_capacity: self
                .hash_cache_capacity
                .unwrap_or(defaults.hash_cache_capacity),
            worker_count: self.worker_count.unwrap_or(defaults.worker_count),
            hash_algorithm: self.hash_algorithm.unwrap_or(defaults.hash_algorithm),
            tool_timeout: self.tool_timeout.unwrap_or(defaults.tool_timeout),
            default_conflict_policy: self
                .default_conflict_policy
                .unwrap_or(defaults.default_conflict_policy),
            cache_db_path: self.cache_db_path.unwrap_or(defaults.cache_db_path),
            history_db_path: self.history_db_path.unwrap_or(defaults.history_db_path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = RenamerConfig::default();
        assert_eq!(config.metadata_cache_capacity(), 1000);
        assert_eq!(config.hash_cache_capacity(), 2000);
        assert!(config.worker_count() >= 1 && config.worker_count() <= 8);
        assert_eq!(config.tool_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = RenamerConfig::builder()
            .worker_count(3)
            .hash_algorithm(HashAlgorithm::Blake3)
            .default_conflict_policy(ConflictPolicy::AutoSuffix)
            .build();
        assert_eq!(config.worker_count(), 3);
        assert_eq!(config.default_conflict_policy(), ConflictPolicy::AutoSuffix);
    }

    #[test]
    fn worker_count_is_bounded() {
        let n = default_worker_count();
        assert!(n >= 1);
        assert!(n <= 8);
    }
}
