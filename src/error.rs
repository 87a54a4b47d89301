//! Error types for renamer-core.
//!
//! This module defines all error types used throughout the crate, using
//! a combination of `thiserror` for ergonomic error definitions and `miette`
//! for rich diagnostic output.
//!
//! # Error Handling Strategy
//!
//! Per the taxonomy in the design: input errors (bad regex, missing
//! metadata field, illegal filename characters, duplicate targets) are
//! never represented here — they surface as [`crate::model::Diagnosis`]
//! values on a [`crate::model::PreviewRow`]. `RenamerError` instead covers
//! the transient/permanent/fatal tiers: things that stop a single
//! operation, or the whole batch, rather than things that are simply true
//! about a proposed name.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Error types that can occur in renamer-core operations.
#[derive(Error, Debug, Diagnostic)]
pub enum RenamerError {
    /// Filesystem I/O error while reading, hashing, or renaming a file.
    ///
    /// Covers permission errors, missing files, and disk errors. Whether
    /// this is transient or permanent depends on the caller: the execution
    /// engine retries once on `EBUSY`/`EAGAIN` before reporting it as a
    /// per-operation failure.
    #[error("I/O error accessing '{path}'")]
    #[diagnostic(code(renamer::io_error))]
    IoError {
        /// The path that caused the I/O error.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A path could not be hashed or read because it is not a regular file.
    #[error("Invalid file type for '{0}': {1}")]
    #[diagnostic(
        code(renamer::file::invalid_type),
        help("renamer-core only processes regular files.")
    )]
    InvalidFileType(PathBuf, String),

    /// The cache's on-disk tier (tier 2) could not be opened or queried.
    ///
    /// This is caught at the call site and degrades the cache to
    /// tier-1-only with a logged warning; it is only returned from the
    /// low-level store functions themselves.
    #[error("Cache store error: {0}")]
    #[diagnostic(
        code(renamer::cache::store_error),
        help("The on-disk cache may be corrupted. Removing the cache database file resets it.")
    )]
    CacheStoreError(#[source] rusqlite::Error),

    /// The history store could not be opened, queried, or written to.
    ///
    /// This is a fatal error: if we can't record what we did, the batch
    /// must not proceed, since the user would have no way to undo it.
    #[error("History store error: {0}")]
    #[diagnostic(
        code(renamer::history::store_error),
        help("Check permissions and disk space for the history database.")
    )]
    HistoryStoreError(#[source] rusqlite::Error),

    /// A pipeline was constructed without exactly one trailing
    /// `NameTransform` module.
    #[error("Invalid pipeline: {0}")]
    #[diagnostic(
        code(renamer::pipeline::invalid),
        help("A pipeline must end with exactly one NameTransform module.")
    )]
    InvalidPipeline(String),

    /// A batch was requested for execution or undo that does not exist.
    #[error("Batch {0} not found in history")]
    #[diagnostic(code(renamer::history::batch_not_found))]
    BatchNotFound(u64),

    /// `undo` was requested in `strict` mode and at least one operation in
    /// the batch is not currently reversible.
    #[error("Batch {0} is not fully undoable: {1}")]
    #[diagnostic(
        code(renamer::history::not_undoable),
        help(
            "Filesystem state has diverged from what the batch produced. Run without --strict to \
             undo the reversible subset."
        )
    )]
    NotUndoable(u64, String),

    /// The external metadata tool exited non-zero or its output could not
    /// be parsed.
    #[error("Metadata tool failed for '{path}': {reason}")]
    #[diagnostic(code(renamer::extractor::tool_failed))]
    ToolError {
        /// The file the tool was invoked for.
        path: PathBuf,
        /// Human-readable description of the failure.
        reason: String,
    },

    /// The external metadata tool did not finish within its configured
    /// timeout and was killed.
    #[error("Metadata tool timed out for '{0}'")]
    #[diagnostic(code(renamer::extractor::timeout))]
    ToolTimeout(PathBuf),

    /// The cancellation token was observed in a poisoned state (a worker
    /// panicked while holding it).
    #[error("Cancellation token poisoned")]
    #[diagnostic(
        code(renamer::cancellation::poisoned),
        help("This indicates a worker thread panicked; restart the operation.")
    )]
    CancellationPoisoned,

    /// A path that must be valid UTF-8 (for storage or Git-style
    /// round-tripping) was not.
    #[error("Invalid UTF-8 in path: {0}")]
    #[diagnostic(code(renamer::path::invalid_utf8))]
    InvalidUtf8Path(PathBuf),

    /// Configuration error: missing or mutually-exclusive parameters.
    #[error("Configuration error: {0}")]
    #[diagnostic(code(renamer::config::error))]
    ConfigError(String),

    /// Execution was requested on a preview that still has `invalid` or
    /// `duplicate_of` rows (spec.md 4.5 "Pre-conditions").
    #[error("Cannot execute: {0}")]
    #[diagnostic(
        code(renamer::exec::plan_rejected),
        help("Resolve every invalid/duplicate row in the preview before executing.")
    )]
    PlanRejected(String),
}

/// Type alias for Results in this crate.
pub type Result<T> = std::result::Result<T, RenamerError>;
