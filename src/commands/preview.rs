//! `preview` subcommand: discover, extract, and print a diagnosed preview
//! without touching the filesystem.

use std::path::Path;

use crate::cache::Cache;
use crate::config::RenamerConfig;
use crate::discovery::{Discovery, WalkdirDiscovery};
use crate::error::Result;
use crate::events::CancellationToken;
use crate::extractor::{extract_batch, ExtractionMode, SubprocessTool};
use crate::fs_ops::RealFilesystem;
use crate::logging::Logger;
use crate::model::{Diagnosis, PreviewRow};
use crate::preview::compute_preview;

use super::load_pipeline;

/// Runs the preview pipeline end to end and prints each row to stderr
/// unless `log` is quiet.
#[allow(clippy::too_many_arguments)]
pub fn run(
    pipeline_path: &Path,
    extended_metadata: bool,
    root: &Path,
    recursive: bool,
    config: &RenamerConfig,
    cache: &Cache,
    log: &Logger,
) -> Result<Vec<PreviewRow>> {
    let pipeline = load_pipeline(pipeline_path)?;

    let descriptors = WalkdirDiscovery::new(root).recursive(recursive).discover()?;
    log.verbose(1, format!("Discovered {} file(s) under {}", descriptors.len(), root.display()));

    let tool = SubprocessTool::new("exiftool", vec!["-S".to_string()]);
    let mode = if extended_metadata { ExtractionMode::Extended } else { ExtractionMode::Fast };
    let cancellation = CancellationToken::new();
    extract_batch(&descriptors, mode, &tool, config, cache, &cancellation, None, false);

    let filesystem = RealFilesystem::new();
    let rows = compute_preview(&descriptors, &pipeline, cache, &filesystem);

    if !log.quiet() {
        for row in &rows {
            match &row.diagnosis {
                Diagnosis::Valid => {
                    eprintln!("{} -> {}", row.source_path.display(), row.proposed_file_name())
                }
                Diagnosis::Unchanged => log.verbose(1, format!("{} (unchanged)", row.source_path.display())),
                Diagnosis::Invalid(reason) => {
                    eprintln!("{} -> invalid: {reason}", row.source_path.display())
                }
                Diagnosis::DuplicateOf(other) => eprintln!(
                    "{} -> duplicate of {}",
                    row.source_path.display(),
                    other.display()
                ),
            }
        }
    }

    Ok(rows)
}
