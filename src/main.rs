//! # renamer CLI
//!
//! The command-line interface for renamer-core, a batch file-renaming
//! engine for media workflows.
//!
//! ## Commands
//!
//! - **preview**: compute and print a diagnosed preview without touching
//!   the filesystem
//! - **execute**: run a previewed pipeline as a single reversible batch
//! - **undo**: reverse a previously executed batch
//! - **cache-clear**: clear the metadata/hash cache, entirely or per folder
//!
//! ## Quick Start
//!
//! ```bash
//! renamer --root ./footage preview --pipeline pipeline.json
//! renamer --root ./footage execute --pipeline pipeline.json --conflict-policy auto-suffix
//! renamer undo 42
//! ```
//!
//! ## Environment Variables
//!
//! - `RENAMER_ROOT`: folder to operate on
//! - `RENAMER_CACHE_DB` / `RENAMER_HISTORY_DB`: override database locations
//! - `RENAMER_VERBOSE` / `RENAMER_QUIET`: control output verbosity

use std::io::IsTerminal;

use renamer_core::cli::Cli;

fn main() -> miette::Result<()> {
    miette::set_panic_hook();

    if std::io::stderr().is_terminal() {
        miette::set_hook(Box::new(|_| {
            Box::new(
                miette::GraphicalReportHandler::new()
                    .with_theme(miette::GraphicalTheme::unicode_nocolor())
                    .with_context_lines(3),
            )
        }))?;
    } else {
        miette::set_hook(Box::new(|_| {
            Box::new(
                miette::GraphicalReportHandler::new()
                    .with_theme(miette::GraphicalTheme::none())
                    .with_context_lines(0),
            )
        }))?;
    }

    let cli = Cli::parse_args();
    let result = renamer_core::commands::execute(&cli);
    result.map_err(Into::into)
}
