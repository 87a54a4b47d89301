//! Command-line harness: wires the parsed [`crate::cli::Cli`] to the
//! library's preview/execute/undo/cache-clear entry points.
//!
//! Grounded on the teacher's `commands/mod.rs` dispatch shape: a thin
//! `execute`/`execute_with_dir` pair (the latter the test seam), matching
//! verbosity against a [`crate::logging::Logger`], then one function per
//! subcommand in its own module.

pub mod cache_clear;
pub mod execute_cmd;
pub mod preview;
pub mod undo;

use std::path::{Path, PathBuf};

use crate::cache;
use crate::cli::{Cli, Commands};
use crate::config::RenamerConfig;
use crate::error::{RenamerError, Result};
use crate::history::History;
use crate::logging::Logger;

/// Executes commands based on the parsed CLI arguments, using the current
/// working directory.
pub fn execute(cli: &Cli) -> Result<()> {
    execute_with_dir(cli, None)
}

/// Executes commands with an explicit working directory, so tests never
/// depend on the process's actual current directory.
pub fn execute_with_dir(cli: &Cli, working_dir: Option<&Path>) -> Result<()> {
    let global = cli.global_opts();
    let log = Logger::new(global.verbose(), global.quiet());

    let root = if let Some(dir) = working_dir {
        dir.to_path_buf()
    } else {
        global.get_root()
    };

    let config = RenamerConfig::builder()
        .cache_db_path(
            global
                .cache_db_path()
                .map(PathBuf::from)
                .unwrap_or_else(|| root.join(".renamer/cache.sqlite3")),
        )
        .history_db_path(
            global
                .history_db_path()
                .map(PathBuf::from)
                .unwrap_or_else(|| root.join(".renamer/history.sqlite3")),
        )
        .build();

    let cache = cache::open_cache(&config)?.on_degraded(move |reason| {
        log.warn(format!("cache degraded: {reason}"));
    });
    let history = History::open(config.history_db_path())?;

    match cli.command() {
        Commands::Preview { pipeline, extended_metadata } => {
            preview::run(pipeline, *extended_metadata, &root, global.recursive(), &config, &cache, &log)?;
            Ok(())
        }
        Commands::Execute { pipeline, extended_metadata, conflict_policy, atomic } => {
            execute_cmd::run(
                pipeline,
                *extended_metadata,
                (*conflict_policy).into(),
                *atomic,
                &root,
                global.recursive(),
                &config,
                &cache,
                &history,
                &log,
            )?;
            Ok(())
        }
        Commands::Undo { batch_id, strict } => {
            undo::run(*batch_id, *strict, &cache, &history, &log)?;
            Ok(())
        }
        Commands::CacheClear { folder } => {
            cache_clear::run(folder.as_deref(), &cache, &log);
            Ok(())
        }
    }
}

/// Loads a [`crate::model::Pipeline`] from a JSON file, as produced by
/// whatever UI composed the naming modules.
pub(crate) fn load_pipeline(path: &Path) -> Result<crate::model::Pipeline> {
    let text = std::fs::read_to_string(path).map_err(|source| RenamerError::IoError {
        path: path.to_path_buf(),
        source,
    })?;
    let stages: Vec<crate::model::ModuleConfig> = serde_json::from_str(&text).map_err(|e| {
        RenamerError::ConfigError(format!("invalid pipeline file '{}': {e}", path.display()))
    })?;
    crate::model::Pipeline::new(stages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::GlobalOpts;
    use crate::model::{CasePolicy, ModuleConfig, SeparatorPolicy};
    use std::fs;
    use tempfile::TempDir;

    fn write_pipeline(dir: &Path) -> PathBuf {
        let pipeline = vec![
            ModuleConfig::LiteralText { text: "clip".to_string() },
            ModuleConfig::NameTransform {
                case_policy: CasePolicy::AsIs,
                separator_policy: SeparatorPolicy::Keep,
                trim: false,
            },
        ];
        let path = dir.join("pipeline.json");
        fs::write(&path, serde_json::to_string(&pipeline).unwrap()).unwrap();
        path
    }

    #[test]
    fn preview_command_runs_end_to_end() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.jpg"), b"x").unwrap();
        let pipeline_path = write_pipeline(dir.path());

        let cli = Cli::builder()
            .global_opts(GlobalOpts::builder().root(dir.path()).quiet(true).build())
            .command(Commands::Preview { pipeline: pipeline_path, extended_metadata: false })
            .build()
            .unwrap();

        execute_with_dir(&cli, Some(dir.path())).unwrap();
    }

    #[test]
    fn cache_clear_command_runs_without_error() {
        let dir = TempDir::new().unwrap();
        let cli = Cli::builder()
            .global_opts(GlobalOpts::builder().root(dir.path()).quiet(true).build())
            .command(Commands::CacheClear { folder: None })
            .build()
            .unwrap();

        execute_with_dir(&cli, Some(dir.path())).unwrap();
    }

    #[test]
    fn undo_command_reports_batch_not_found() {
        let dir = TempDir::new().unwrap();
        let cli = Cli::builder()
            .global_opts(GlobalOpts::builder().root(dir.path()).quiet(true).build())
            .command(Commands::Undo { batch_id: 1, strict: false })
            .build()
            .unwrap();

        let err = execute_with_dir(&cli, Some(dir.path())).unwrap_err();
        assert!(matches!(err, RenamerError::BatchNotFound(1)));
    }
}
