//! Metadata extraction (C2): runs the configured external tool over a batch
//! of files, fast or extended, merges companion metadata into principals,
//! and populates the metadata cache.
//!
//! Parallelized over a bounded `rayon::ThreadPool` shared with the
//! execution engine (spec.md section 5), mirroring the
//! `tracked_files.par_iter().map(...).collect()` shape the teacher uses for
//! its own per-file parallel work in `commands/stow.rs`.

pub mod companions;
pub mod tool;

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::Cache;
use crate::config::RenamerConfig;
use crate::events::{CancellationToken, CoreEvent};
use crate::model::{FileDescriptor, MetadataEntry, MetadataStatus, MetadataValue};

pub use companions::{default_recognizers, Recognizer};
pub use tool::{ExternalTool, SubprocessTool, ToolOutput};

/// How thoroughly to probe a file's metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMode {
    /// Cheap probe: only the fields needed to populate `{Make, Model}` for
    /// the device-aware downgrade check, plus whatever the tool returns for
    /// free.
    Fast,
    /// Full field set.
    Extended,
}

/// Device `(make, model)` pairs known not to expose extra fields in
/// extended mode. Probed once per batch via a fast read; once a listed
/// device is seen, the rest of the batch downgrades to fast — an
/// optimization only, never required for correctness (spec.md 4.2).
const EXTENDED_DOWNGRADE_DENYLIST: &[(&str, &str)] =
    &[("Generic", "WebcamCapture"), ("Unknown", "Unknown")];

/// Parses `key: value` lines from a tool's stdout into typed fields. Values
/// that parse as a number become `Number`; anything recognized as a Unix
/// timestamp integer under a `*_epoch`/`*_time` key becomes `DateTime`;
/// everything else is `Text`. This generic line format matches how the
/// corpus's external tools are invoked (plain stdout, one field per line),
/// and keeps the extractor decoupled from any one tool's exact grammar.
fn parse_tool_output(stdout: &str) -> HashMap<String, MetadataValue> {
    let mut fields = HashMap::new();
    for line in stdout.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_string();
        let value = value.trim();
        if key.is_empty() || value.is_empty() {
            continue;
        }
        let parsed = if (key.ends_with("_epoch") || key.ends_with("_time")) && value.parse::<i64>().is_ok()
        {
            MetadataValue::DateTime(value.parse().unwrap())
        } else if let Ok(n) = value.parse::<f64>() {
            MetadataValue::Number(n)
        } else {
            MetadataValue::Text(value.to_string())
        };
        fields.insert(key, parsed);
    }
    fields
}

/// Extracts metadata for one file, merging any recognized companions found
/// alongside it in `siblings`.
fn extract_one(
    descriptor: &FileDescriptor,
    mode: ExtractionMode,
    tool: &dyn ExternalTool,
    timeout: Duration,
    recognizers: &[Box<dyn Recognizer>],
    siblings: &[FileDescriptor],
) -> MetadataEntry {
    let is_extended = mode == ExtractionMode::Extended;
    let mut entry = match tool.run(&descriptor.absolute_path, timeout) {
        Ok(output) => MetadataEntry {
            fields: parse_tool_output(&output.stdout),
            is_extended,
        },
        Err(_) => {
            descriptor.set_metadata_status(MetadataStatus::Failed);
            MetadataEntry::new(is_extended)
        }
    };

    for sibling in siblings {
        let Some(principal_base) = companions::recognize_companion(&sibling.absolute_path, recognizers)
        else {
            continue;
        };
        if principal_base != descriptor.base_name {
            continue;
        }
        if let Ok(output) = tool.run(&sibling.absolute_path, timeout) {
            let companion_entry = MetadataEntry {
                fields: parse_tool_output(&output.stdout),
                is_extended,
            };
            let file_name = sibling
                .absolute_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            entry.merge_companion(&file_name, &companion_entry);
        }
    }

    entry
}

/// Extracts metadata for an entire batch, populating `cache` and updating
/// each descriptor's `metadata_status` in place. Returns once every file has
/// been processed or cancellation was observed.
pub fn extract_batch(
    descriptors: &[FileDescriptor],
    mode: ExtractionMode,
    tool: &dyn ExternalTool,
    config: &RenamerConfig,
    cache: &Cache,
    cancellation: &CancellationToken,
    events: Option<&Sender<CoreEvent>>,
    case_insensitive: bool,
) {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.worker_count())
        .build()
        .expect("thread pool with a positive thread count always builds");

    let recognizers = default_recognizers();
    let timeout = config.tool_timeout();
    let downgraded = Arc::new(AtomicBool::new(false));
    let total = descriptors.len();

    pool.install(|| {
        use rayon::prelude::*;
        descriptors
            .par_iter()
            .enumerate()
            .for_each(|(index, descriptor)| {
                if cancellation.is_cancelled() {
                    return;
                }

                let effective_mode = if downgraded.load(Ordering::Relaxed) {
                    ExtractionMode::Fast
                } else {
                    mode
                };

                let entry = extract_one(
                    descriptor,
                    effective_mode,
                    tool,
                    timeout,
                    &recognizers,
                    descriptors,
                );

                if effective_mode == ExtractionMode::Extended && !downgraded.load(Ordering::Relaxed) {
                    let make = entry.get("Make").map(|v| v.render(None));
                    let model = entry.get("Model").map(|v| v.render(None));
                    if let (Some(make), Some(model)) = (make, model)
                        && EXTENDED_DOWNGRADE_DENYLIST
                            .iter()
                            .any(|(m, d)| *m == make && *d == model)
                    {
                        downgraded.store(true, Ordering::Relaxed);
                    }
                }

                descriptor.set_metadata_status(if entry.is_extended {
                    MetadataStatus::Extended
                } else {
                    MetadataStatus::Fast
                });
                cache.put_metadata(&descriptor.absolute_path, case_insensitive, entry);

                if let Some(sender) = events {
                    let _ = sender.send(CoreEvent::RowChanged(descriptor.absolute_path.clone()));
                    let _ = sender.send(CoreEvent::ExtractionProgress {
                        completed: index + 1,
                        total,
                    });
                }
            });
    });
}
