//! # renamer-core
//!
//! A batch file-renaming engine for media workflows: compose naming rules
//! into a pipeline, preview the result against a whole folder, then execute
//! it as a single reversible batch.
//!
//! ## Architecture
//!
//! - [`cache`]: two-tier (in-memory + on-disk) cache for extracted metadata
//!   and content hashes
//! - [`extractor`]: runs an external metadata tool over a batch, fast or
//!   extended, with companion-file awareness
//! - [`modules`]: the naming-rule fragments (counter, metadata, literal
//!   text, original name, remove-text, name transform) composed into a
//!   [`model::Pipeline`]
//! - [`preview`]: computes a diagnosed preview row per file without
//!   touching the filesystem
//! - [`exec`]: turns a validated preview into ordered filesystem renames,
//!   resolving conflicts and keeping companions in sync
//! - [`history`]: records every executed batch so it can be undone
//! - [`cli`] / [`commands`]: the command-line harness
//!
//! Internal modules (not part of the public API):
//! - `model`: core data types shared by every component
//! - `config`: runtime tunables
//! - `error`: error taxonomy
//! - `events`: cancellation token and UI-decoupling event stream
//! - `hashing`: BLAKE3-based file hashing
//! - `discovery`: filesystem walk that produces the initial file batch
//! - `fs_ops`: injectable filesystem interface used by the execution engine
//! - `logging`: tracing setup
//!
//! ## Error Handling
//!
//! The crate uses a combination of:
//! - `thiserror` for strongly-typed errors
//! - `miette` for rich diagnostic output in the CLI
//!
//! All public functions return `Result` types with descriptive error variants.

pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod discovery;
pub mod error;
pub mod events;
pub mod exec;
pub mod extractor;
pub mod fs_ops;
pub mod hashing;
pub mod history;
pub mod model;
pub mod modules;
pub mod preview;

mod logging;
