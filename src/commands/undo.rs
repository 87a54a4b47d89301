//! `undo` subcommand: reverses a previously executed batch.

use crate::cache::Cache;
use crate::error::Result;
use crate::events::CancellationToken;
use crate::exec::{self, ExecutionReport};
use crate::fs_ops::RealFilesystem;
use crate::history::History;
use crate::logging::Logger;

pub fn run(batch_id: u64, strict: bool, cache: &Cache, history: &History, log: &Logger) -> Result<ExecutionReport> {
    let filesystem = RealFilesystem::new();
    let cancellation = CancellationToken::new();
    let report = exec::undo(batch_id, history, &filesystem, cache, &cancellation, strict)?;

    if !log.quiet() {
        eprintln!(
            "Undid batch {batch_id}: {} reversed, {} skipped, {} failed",
            report.succeeded, report.skipped, report.failed
        );
    }

    Ok(report)
}
