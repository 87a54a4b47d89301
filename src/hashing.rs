//! Content hashing for cache fingerprints and duplicate-content checks.
//!
//! Kept close to the teacher's `hashing.rs`: memory-mapped BLAKE3 hashing,
//! symlinks and directories rejected outright, empty files special-cased to
//! avoid mapping a zero-length region.

use std::fs::File;
use std::path::Path;

use blake3::Hasher;
use memmap2::Mmap;

use crate::error::RenamerError;
use crate::model::HashAlgorithm;

/// Computes the content hash of a file using memory mapping and BLAKE3's
/// built-in parallelism.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is a symlink or directory,
/// or memory mapping fails.
pub fn hash_file(path: &Path, algorithm: HashAlgorithm) -> Result<String, RenamerError> {
    let metadata = std::fs::symlink_metadata(path).map_err(|source| RenamerError::IoError {
        path: path.to_path_buf(),
        source,
    })?;

    if metadata.is_symlink() {
        return Err(RenamerError::InvalidFileType(
            path.to_path_buf(),
            "symbolic links are not supported".to_string(),
        ));
    }

    if metadata.is_dir() {
        return Err(RenamerError::InvalidFileType(
            path.to_path_buf(),
            "directories are not supported".to_string(),
        ));
    }

    match algorithm {
        HashAlgorithm::Blake3 => hash_file_blake3(path, metadata.len()),
    }
}

fn hash_file_blake3(path: &Path, len: u64) -> Result<String, RenamerError> {
    if len == 0 {
        let hasher = Hasher::new();
        return Ok(hasher.finalize().to_hex().to_string());
    }

    let file = File::open(path).map_err(|source| RenamerError::IoError {
        path: path.to_path_buf(),
        source,
    })?;

    let mmap = unsafe { Mmap::map(&file) }.map_err(|source| RenamerError::IoError {
        path: path.to_path_buf(),
        source,
    })?;

    let mut hasher = Hasher::new();
    hasher.update_rayon(&mmap);

    Ok(hasher.finalize().to_hex().to_string())
}

/// Gets the size of a file in bytes, rejecting symlinks and directories.
pub fn get_file_size(path: &Path) -> Result<u64, RenamerError> {
    let metadata = std::fs::symlink_metadata(path).map_err(|source| RenamerError::IoError {
        path: path.to_path_buf(),
        source,
    })?;

    if metadata.is_symlink() {
        return Err(RenamerError::InvalidFileType(
            path.to_path_buf(),
            "symbolic links are not supported".to_string(),
        ));
    }

    if metadata.is_dir() {
        return Err(RenamerError::InvalidFileType(
            path.to_path_buf(),
            "directories are not supported".to_string(),
        ));
    }

    Ok(metadata.len())
}
