//! Command-line interface definitions for renamer-core.
//!
//! Mirrors the teacher's `Cli`/`GlobalOpts` shape: a `clap::Parser` struct
//! for real invocations plus a fluent builder so the harness and tests can
//! construct a `Cli` programmatically without going through argument
//! parsing.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::error::{RenamerError, Result};
use crate::model::ConflictPolicy;

/// Main command-line interface for renamer-core.
#[derive(Parser)]
#[command(
    name = "renamer",
    bin_name = "renamer",
    author,
    version,
    about = "Batch file renaming for media workflows",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    global_opts: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

/// Global options that apply to every subcommand.
#[derive(Parser)]
pub struct GlobalOpts {
    /// Folder to operate on (defaults to the current directory)
    #[arg(long, global = true, default_value = ".", env = "RENAMER_ROOT")]
    root: PathBuf,

    /// Recurse into subdirectories
    #[arg(long, global = true, env = "RENAMER_RECURSIVE")]
    recursive: bool,

    /// Path to the on-disk metadata/hash cache database
    #[arg(long, global = true, env = "RENAMER_CACHE_DB")]
    cache_db_path: Option<PathBuf>,

    /// Path to the execution history database
    #[arg(long, global = true, env = "RENAMER_HISTORY_DB")]
    history_db_path: Option<PathBuf>,

    /// Enable verbose output (use multiple times for more verbosity)
    #[arg(short, long, global = true, action = clap::ArgAction::Count, env = "RENAMER_VERBOSE")]
    verbose: u8,

    /// Silence all output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose", env = "RENAMER_QUIET")]
    quiet: bool,
}

impl GlobalOpts {
    pub fn builder() -> GlobalOptsBuilder {
        GlobalOptsBuilder::default()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn get_root(&self) -> PathBuf {
        normalize_path(&self.root)
    }

    pub fn recursive(&self) -> bool {
        self.recursive
    }

    pub fn cache_db_path(&self) -> Option<&Path> {
        self.cache_db_path.as_deref()
    }

    pub fn history_db_path(&self) -> Option<&Path> {
        self.history_db_path.as_deref()
    }

    pub fn verbose(&self) -> u8 {
        self.verbose
    }

    pub fn quiet(&self) -> bool {
        self.quiet
    }
}

/// Builder for constructing [`GlobalOpts`] programmatically.
#[derive(Default)]
pub struct GlobalOptsBuilder {
    root: Option<PathBuf>,
    recursive: bool,
    cache_db_path: Option<PathBuf>,
    history_db_path: Option<PathBuf>,
    verbose: u8,
    quiet: bool,
}

impl GlobalOptsBuilder {
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
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

    pub fn verbose(mut self, level: u8) -> Self {
        self.verbose = level;
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn build(self) -> GlobalOpts {
        GlobalOpts {
            root: self.root.unwrap_or_else(|| PathBuf::from(".")),
            recursive: self.recursive,
            cache_db_path: self.cache_db_path,
            history_db_path: self.history_db_path,
            verbose: self.verbose,
            quiet: self.quiet,
        }
    }
}

impl Cli {
    pub fn global_opts(&self) -> &GlobalOpts {
        &self.global_opts
    }

    pub fn command(&self) -> &Commands {
        &self.command
    }

    pub fn builder() -> CliBuilder {
        CliBuilder::default()
    }

    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Builder for [`Cli`].
#[derive(Default)]
pub struct CliBuilder {
    global_opts: Option<GlobalOpts>,
    command: Option<Commands>,
}

impl CliBuilder {
    pub fn global_opts(mut self, opts: GlobalOpts) -> Self {
        self.global_opts = Some(opts);
        self
    }

    pub fn command(mut self, command: Commands) -> Self {
        self.command = Some(command);
        self
    }

    pub fn build(self) -> Result<Cli> {
        let command = self
            .command
            .ok_or_else(|| RenamerError::ConfigError("command is required".to_string()))?;
        Ok(Cli {
            global_opts: self.global_opts.unwrap_or_else(|| GlobalOpts::builder().build()),
            command,
        })
    }
}

/// Normalizes a path to be absolute and clean, without requiring it to
/// exist or resolving symlinks.
pub(crate) fn normalize_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    let absolute = if path.is_relative() {
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")).join(path)
    } else {
        path.to_path_buf()
    };

    let mut components = Vec::new();
    for component in absolute.components() {
        use std::path::Component;
        match component {
            Component::ParentDir => {
                if let Some(last) = components.last()
                    && !matches!(last, Component::ParentDir)
                {
                    components.pop();
                    continue;
                }
                components.push(component);
            }
            Component::CurDir => continue,
            _ => components.push(component),
        }
    }

    let mut result = PathBuf::new();
    for component in components {
        result.push(component);
    }
    result
}

/// Available renamer subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Compute and print a diagnosed preview without touching the filesystem
    Preview {
        /// JSON file describing the naming pipeline (a list of modules)
        #[arg(long)]
        pipeline: PathBuf,

        /// Extract extended (not just fast) metadata before previewing
        #[arg(long)]
        extended_metadata: bool,
    },

    /// Execute a previously previewed pipeline as a single batch
    Execute {
        /// JSON file describing the naming pipeline
        #[arg(long)]
        pipeline: PathBuf,

        /// Extract extended (not just fast) metadata before executing
        #[arg(long)]
        extended_metadata: bool,

        /// What to do when a proposed name collides with an existing file
        #[arg(long, value_enum, default_value = "abort")]
        conflict_policy: ConflictPolicyArg,

        /// Roll back every completed rename if any operation in the batch fails
        #[arg(long)]
        atomic: bool,
    },

    /// Reverse a previously executed batch
    Undo {
        /// The batch id to undo, as printed by `execute`
        batch_id: u64,

        /// Fail the whole undo if any single operation isn't reversible
        #[arg(long)]
        strict: bool,
    },

    /// Clear the metadata/hash cache, entirely or for one folder
    CacheClear {
        /// Only clear entries under this folder (defaults to everything)
        folder: Option<PathBuf>,
    },
}

/// `clap`-friendly mirror of [`ConflictPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ConflictPolicyArg {
    Abort,
    SkipRow,
    Overwrite,
    AutoSuffix,
}

impl From<ConflictPolicyArg> for ConflictPolicy {
    fn from(value: ConflictPolicyArg) -> Self {
        match value {
            ConflictPolicyArg::Abort => ConflictPolicy::Abort,
            ConflictPolicyArg::SkipRow => ConflictPolicy::SkipRow,
            ConflictPolicyArg::Overwrite => ConflictPolicy::Overwrite,
            ConflictPolicyArg::AutoSuffix => ConflictPolicy::AutoSuffix,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_preview_command() {
        let cli = Cli::parse_from(["renamer", "preview", "--pipeline", "p.json"]);
        assert!(matches!(cli.command(), Commands::Preview { .. }));
        assert_eq!(cli.global_opts().root(), Path::new("."));
    }

    #[test]
    fn parses_execute_with_conflict_policy() {
        let cli = Cli::parse_from([
            "renamer",
            "--root",
            "/media/cards",
            "execute",
            "--pipeline",
            "p.json",
            "--conflict-policy",
            "auto-suffix",
            "--atomic",
        ]);
        match cli.command() {
            Commands::Execute { conflict_policy, atomic, .. } => {
                assert_eq!(*conflict_policy, ConflictPolicyArg::AutoSuffix);
                assert!(*atomic);
            }
            _ => panic!("expected Execute"),
        }
        assert_eq!(cli.global_opts().root(), Path::new("/media/cards"));
    }

    #[test]
    fn parses_undo_with_strict_flag() {
        let cli = Cli::parse_from(["renamer", "undo", "42", "--strict"]);
        match cli.command() {
            Commands::Undo { batch_id, strict } => {
                assert_eq!(*batch_id, 42);
                assert!(*strict);
            }
            _ => panic!("expected Undo"),
        }
    }

    #[test]
    fn cli_builder_round_trips() {
        let cli = Cli::builder()
            .global_opts(GlobalOpts::builder().root("/a").verbose(2).build())
            .command(Commands::CacheClear { folder: None })
            .build()
            .unwrap();
        assert_eq!(cli.global_opts().root(), Path::new("/a"));
        assert_eq!(cli.global_opts().verbose(), 2);
        assert!(matches!(cli.command(), Commands::CacheClear { folder: None }));
    }

    #[test]
    fn normalize_path_resolves_parent_components() {
        let normalized = normalize_path("a/b/../c");
        assert!(normalized.is_absolute());
        assert!(normalized.ends_with("a/c"));
    }
}
