//! File discovery: the external collaborator spec.md section 6 names as
//! `discover() -> [FileDescriptor]`. Out of the core's scope per spec.md
//! section 1, but the CLI harness needs a concrete implementation to be
//! anything more than a library — `WalkdirDiscovery` plays that role,
//! analogous to how the teacher's `discovery.rs` supplies its own
//! Git-index-based file enumerator for its CLI.

use std::path::{Path, PathBuf};

use crate::error::{RenamerError, Result};
use crate::model::FileDescriptor;

/// Supplies the ordered set of source files for a batch.
pub trait Discovery {
    fn discover(&self) -> Result<Vec<FileDescriptor>>;
}

/// Discovers files by walking a directory, optionally filtering by
/// extension, in directory-entry order. Non-recursive by default, matching
/// the common "rename these files in this folder" workflow; recursion is
/// opt-in since it changes per-folder counter scoping.
pub struct WalkdirDiscovery {
    root: PathBuf,
    recursive: bool,
    extensions: Option<Vec<String>>,
}

impl WalkdirDiscovery {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            recursive: false,
            extensions: None,
        }
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = Some(extensions.into_iter().map(|e| e.to_lowercase()).collect());
        self
    }

    fn accepts(&self, path: &Path) -> bool {
        let Some(extensions) = &self.extensions else {
            return true;
        };
        path.extension()
            .map(|e| extensions.iter().any(|ext| ext == &e.to_string_lossy().to_lowercase()))
            .unwrap_or(false)
    }
}

impl Discovery for WalkdirDiscovery {
    fn discover(&self) -> Result<Vec<FileDescriptor>> {
        let mut descriptors = Vec::new();
        let walker = if self.recursive {
            walkdir::WalkDir::new(&self.root)
        } else {
            walkdir::WalkDir::new(&self.root).max_depth(1)
        };

        for entry in walker {
            let entry = entry.map_err(|e| RenamerError::IoError {
                path: self.root.clone(),
                source: std::io::Error::other(e),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if !self.accepts(path) {
                continue;
            }
            let metadata = entry.metadata().map_err(|e| RenamerError::IoError {
                path: path.to_path_buf(),
                source: std::io::Error::other(e),
            })?;
            let modified = metadata.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            let absolute = path
                .canonicalize()
                .unwrap_or_else(|_| path.to_path_buf());
            descriptors.push(FileDescriptor::from_path(absolute, modified, metadata.len()));
        }

        Ok(descriptors)
    }
}
