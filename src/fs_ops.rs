//! Filesystem interface consumed by the execution engine (spec.md section
//! 6: `fs.rename`, `fs.exists`, `fs.is_case_insensitive`).
//!
//! Abstracted behind a trait so the execution engine and its tests never
//! touch `std::fs` directly, matching the Design Notes' call to eliminate
//! hidden global access and make every collaborator an explicit,
//! constructor-injected reference.

use std::path::Path;

use crate::error::{RenamerError, Result};

/// The filesystem operations the core needs. A real implementation wraps
/// `std::fs`; tests can substitute an in-memory fake.
pub trait Filesystem: Send + Sync {
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;
    fn exists(&self, path: &Path) -> bool;
    /// Whether the filesystem backing `path` folds case for lookups (e.g.
    /// APFS default, NTFS, FAT32). Queried per-directory since a single
    /// machine can mix case-sensitive and case-insensitive mounts.
    fn is_case_insensitive(&self, path: &Path) -> bool;
}

/// Real filesystem, backed directly by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealFilesystem {
    /// Overrides case-sensitivity detection for platforms/tests where the
    /// probe-based detection below isn't reliable. `None` means probe.
    pub force_case_insensitive: Option<bool>,
}

impl RealFilesystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_case_insensitivity(forced: bool) -> Self {
        Self {
            force_case_insensitive: Some(forced),
        }
    }
}

impl Filesystem for RealFilesystem {
    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        std::fs::rename(from, to).map_err(|source| RenamerError::IoError {
            path: from.to_path_buf(),
            source,
        })
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_case_insensitive(&self, path: &Path) -> bool {
        if let Some(forced) = self.force_case_insensitive {
            return forced;
        }
        probe_case_insensitive(path).unwrap_or(cfg!(any(windows, target_os = "macos")))
    }
}

/// Probes case-sensitivity by checking whether an existing file (or its
/// parent directory) can also be found through an upper-cased variant of
/// its last component. Returns `None` if the probe is inconclusive (path
/// doesn't exist yet on either side).
fn probe_case_insensitive(path: &Path) -> Option<bool> {
    let parent = path.parent()?;
    let file_name = path.file_name()?.to_str()?;
    if !path.exists() {
        return None;
    }
    let upper = file_name.to_uppercase();
    if upper == file_name {
        return None;
    }
    Some(parent.join(&upper).exists())
}

impl crate::preview::FsCaseSensitivity for RealFilesystem {
    fn is_case_insensitive(&self, path: &Path) -> bool {
        Filesystem::is_case_insensitive(self, path)
    }
}
