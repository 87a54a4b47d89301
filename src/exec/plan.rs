//! Plan construction (spec.md 4.5 steps 1-2): turns a validated preview into
//! a flat list of [`RenameOperation`]s, discovering and linking companion
//! renames to their principal.

use std::path::{Path, PathBuf};

use crate::error::{RenamerError, Result};
use crate::extractor::companions::{self, Recognizer};
use crate::model::{Diagnosis, FileDescriptor, PreviewRow, RenameOperation};

/// Builds the flat operation list for a validated preview. Fails with
/// [`RenamerError::PlanRejected`] if any row is still `invalid` or
/// `duplicate_of` — the precondition spec.md 4.5 requires before a plan is
/// even constructed.
pub fn build_plan(
    batch: &[FileDescriptor],
    rows: &[PreviewRow],
    recognizers: &[Box<dyn Recognizer>],
) -> Result<Vec<RenameOperation>> {
    let rejected = rows
        .iter()
        .filter(|row| matches!(row.diagnosis, Diagnosis::Invalid(_) | Diagnosis::DuplicateOf(_)))
        .count();
    if rejected > 0 {
        return Err(RenamerError::PlanRejected(format!(
            "{rejected} row(s) are invalid or duplicate; resolve them before executing"
        )));
    }

    let mut operations = Vec::new();
    for (descriptor, row) in batch.iter().zip(rows.iter()) {
        if row.diagnosis != Diagnosis::Valid {
            continue;
        }
        let target = descriptor
            .parent_dir()
            .join(row.proposed_file_name());
        let principal_index = operations.len();
        operations.push(RenameOperation::new(descriptor.absolute_path.clone(), target.clone()));

        for companion_target in discover_companion_targets(descriptor, &target, recognizers) {
            operations.push(RenameOperation::companion_of(
                companion_target.0,
                companion_target.1,
                principal_index,
            ));
        }
    }
    Ok(operations)
}

/// Finds companion files next to `descriptor` and computes each one's
/// renamed target, preserving the companion's own suffix/extension
/// (spec.md section 6's "Companion naming rule").
fn discover_companion_targets(
    descriptor: &FileDescriptor,
    principal_target: &Path,
    recognizers: &[Box<dyn Recognizer>],
) -> Vec<(PathBuf, PathBuf)> {
    let dir = descriptor.parent_dir();
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return Vec::new();
    };

    let new_base = principal_target
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut companions = Vec::new();
    for entry in entries.flatten() {
        let candidate = entry.path();
        if candidate == descriptor.absolute_path {
            continue;
        }
        let Some(matched_base) = companions::recognize_companion(&candidate, recognizers) else {
            continue;
        };
        // Recognizers return the base name in the candidate's own casing
        // (e.g. `CLIPM01.XML` -> "CLIP"), but camera firmware routinely
        // cases a sidecar's stem differently from the principal's own
        // filename. Filesystems that host these pairs are case-insensitive
        // for this exact reason, so the link must be too.
        if !matched_base.eq_ignore_ascii_case(&descriptor.base_name) {
            continue;
        }
        let Some(file_name) = candidate.file_name().map(|n| n.to_string_lossy().to_string()) else {
            continue;
        };
        let Some(suffix) = file_name.strip_prefix(matched_base.as_str()) else {
            continue;
        };
        let new_name = format!("{new_base}{suffix}");
        companions.push((candidate, dir.join(new_name)));
    }
    companions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::default_recognizers;
    use crate::model::Diagnosis;
    use std::fs::File;
    use std::time::SystemTime;
    use tempfile::tempdir;

    fn row(descriptor: &FileDescriptor, proposed: &str, diagnosis: Diagnosis) -> PreviewRow {
        PreviewRow {
            source_path: descriptor.absolute_path.clone(),
            proposed_base_name: proposed.to_string(),
            proposed_extension: descriptor.extension.clone(),
            diagnosis,
        }
    }

    #[test]
    fn rejects_plan_with_invalid_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.jpg");
        File::create(&path).unwrap();
        let descriptor = FileDescriptor::from_path(path, SystemTime::now(), 0);
        let rows = vec![row(
            &descriptor,
            "a",
            Diagnosis::Invalid(crate::model::InvalidReason::Empty),
        )];
        let err = build_plan(&[descriptor], &rows, &[]).unwrap_err();
        assert!(matches!(err, RenamerError::PlanRejected(_)));
    }

    #[test]
    fn discovers_and_links_companion_operations() {
        let dir = tempdir().unwrap();
        let principal_path = dir.path().join("clip.mp4");
        File::create(&principal_path).unwrap();
        let companion_path = dir.path().join("clip.srt");
        File::create(&companion_path).unwrap();

        let descriptor = FileDescriptor::from_path(principal_path, SystemTime::now(), 0);
        let rows = vec![row(&descriptor, "wedding", Diagnosis::Valid)];
        let recognizers = default_recognizers();
        let operations = build_plan(&[descriptor], &rows, &recognizers).unwrap();

        assert_eq!(operations.len(), 2);
        assert!(!operations[0].is_companion);
        assert!(operations[1].is_companion);
        assert_eq!(operations[1].principal_index, Some(0));
        assert_eq!(operations[1].target_path, dir.path().join("wedding.srt"));
    }

    #[test]
    fn links_companion_whose_stem_case_differs_from_the_principal() {
        use std::io::Write;

        let dir = tempdir().unwrap();
        let principal_path = dir.path().join("clip.mp4");
        File::create(&principal_path).unwrap();
        let companion_path = dir.path().join("CLIPM01.XML");
        let mut companion_file = File::create(&companion_path).unwrap();
        write!(companion_file, "<NonRealTimeMeta><Title>x</Title></NonRealTimeMeta>").unwrap();
        drop(companion_file);

        let descriptor = FileDescriptor::from_path(principal_path, SystemTime::now(), 0);
        let rows = vec![row(&descriptor, "wedding", Diagnosis::Valid)];
        let recognizers = default_recognizers();
        let operations = build_plan(&[descriptor], &rows, &recognizers).unwrap();

        assert_eq!(operations.len(), 2);
        assert!(operations[1].is_companion);
        assert_eq!(operations[1].target_path, dir.path().join("weddingM01.XML"));
    }
}
