//! `execute` subcommand: preview, build a plan, and run it as one batch.

use std::path::Path;

use crate::cache::Cache;
use crate::config::RenamerConfig;
use crate::discovery::{Discovery, WalkdirDiscovery};
use crate::error::Result;
use crate::events::CancellationToken;
use crate::exec::{build_plan, execute, ExecutionReport};
use crate::extractor::{default_recognizers, extract_batch, ExtractionMode, SubprocessTool};
use crate::fs_ops::RealFilesystem;
use crate::history::History;
use crate::logging::Logger;
use crate::model::ConflictPolicy;
use crate::preview::compute_preview;

use super::load_pipeline;

/// Runs discovery, extraction, preview, plan construction, and execution
/// in sequence, mirroring the `preview` command up through `compute_preview`.
#[allow(clippy::too_many_arguments)]
pub fn run(
    pipeline_path: &Path,
    extended_metadata: bool,
    conflict_policy: ConflictPolicy,
    atomic: bool,
    root: &Path,
    recursive: bool,
    config: &RenamerConfig,
    cache: &Cache,
    history: &History,
    log: &Logger,
) -> Result<ExecutionReport> {
    let pipeline = load_pipeline(pipeline_path)?;

    let descriptors = WalkdirDiscovery::new(root).recursive(recursive).discover()?;
    log.verbose(1, format!("Discovered {} file(s) under {}", descriptors.len(), root.display()));

    let tool = SubprocessTool::new("exiftool", vec!["-S".to_string()]);
    let mode = if extended_metadata { ExtractionMode::Extended } else { ExtractionMode::Fast };
    let cancellation = CancellationToken::new();
    extract_batch(&descriptors, mode, &tool, config, cache, &cancellation, None, false);

    let filesystem = RealFilesystem::new();
    let rows = compute_preview(&descriptors, &pipeline, cache, &filesystem);
    let recognizers = default_recognizers();
    let operations = build_plan(&descriptors, &rows, &recognizers)?;

    let report = execute(
        operations,
        &pipeline,
        conflict_policy,
        &filesystem,
        cache,
        history,
        &cancellation,
        None,
        atomic,
    )?;

    if !log.quiet() {
        eprintln!(
            "Batch {}: {} succeeded, {} skipped, {} failed",
            report.batch.id, report.succeeded, report.skipped, report.failed
        );
    }

    Ok(report)
}
