//! Execution Engine (C5): turns a validated preview into filesystem
//! renames, resolving target conflicts, breaking rename cycles, keeping
//! companion files in sync with their principal, and recording what
//! happened to the history store (C6). Also owns [`undo`], which replays
//! a recorded batch in reverse.

pub mod graph;
pub mod plan;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::SystemTime;

use crate::cache::Cache;
use crate::error::{RenamerError, Result};
use crate::events::{CancellationToken, CoreEvent};
use crate::fs_ops::Filesystem;
use crate::history::History;
use crate::model::{Batch, BatchOperation, BatchStatus, ConflictPolicy, OperationOutcome, Pipeline, RenameOperation};

pub use graph::{order_directory, Step};
pub use plan::build_plan;

/// Outcome summary handed back to the caller after `execute` runs, wrapping
/// the persisted [`Batch`] with the counts a CLI/UI wants without re-walking
/// `operations` itself.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub batch: Batch,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ExecutionReport {
    fn from_batch(batch: Batch) -> Self {
        let mut succeeded = 0;
        let mut skipped = 0;
        let mut failed = 0;
        for op in &batch.operations {
            match op.outcome {
                OperationOutcome::Success => succeeded += 1,
                OperationOutcome::Skipped(_) => skipped += 1,
                OperationOutcome::Failed(_) => failed += 1,
            }
        }
        Self { batch, succeeded, skipped, failed }
    }
}

/// Executes `operations` (as produced by [`plan::build_plan`]), resolving
/// on-disk conflicts per `conflict_policy`, then ordering and performing the
/// renames directory-by-directory (spec.md 4.5 steps 3-5). Always records the
/// resulting [`Batch`] to `history`, even when some operations failed, since
/// the successful ones still need to be undoable.
#[allow(clippy::too_many_arguments)]
pub fn execute(
    mut operations: Vec<RenameOperation>,
    pipeline: &Pipeline,
    conflict_policy: ConflictPolicy,
    filesystem: &dyn Filesystem,
    cache: &Cache,
    history: &History,
    cancellation: &CancellationToken,
    events: Option<&Sender<CoreEvent>>,
    atomic: bool,
) -> Result<ExecutionReport> {
    let mut outcomes: Vec<Option<OperationOutcome>> = vec![None; operations.len()];

    resolve_conflicts(&mut operations, &mut outcomes, conflict_policy, filesystem);

    let principal_indices: Vec<usize> = (0..operations.len())
        .filter(|&i| outcomes[i].is_none() && !operations[i].is_companion)
        .collect();
    let companion_indices: Vec<usize> = (0..operations.len())
        .filter(|&i| outcomes[i].is_none() && operations[i].is_companion)
        .collect();

    let mut completed_renames: Vec<(PathBuf, PathBuf)> = Vec::new();

    run_group(
        &principal_indices,
        &operations,
        &mut outcomes,
        cache,
        filesystem,
        cancellation,
        events,
        &mut completed_renames,
        None,
    );
    run_group(
        &companion_indices,
        &operations,
        &mut outcomes,
        cache,
        filesystem,
        cancellation,
        events,
        &mut completed_renames,
        Some(&outcomes.clone()),
    );

    let any_failed = outcomes.iter().any(|o| matches!(o, Some(OperationOutcome::Failed(_))));
    if atomic && any_failed {
        rollback(&completed_renames, cache, filesystem, &mut outcomes, &operations);
    }

    let status = if any_failed {
        BatchStatus::PartiallyFailed
    } else {
        BatchStatus::Completed
    };

    let batch_operations: Vec<BatchOperation> = operations
        .iter()
        .zip(outcomes.into_iter())
        .map(|(op, outcome)| BatchOperation {
            original_path: op.source_path.clone(),
            final_path: op.target_path.clone(),
            case_only: op.case_only,
            companion_of: op.principal_index.map(|i| i as u64),
            outcome: outcome.unwrap_or_else(|| OperationOutcome::Skipped("not attempted".to_string())),
        })
        .collect();

    let batch = Batch {
        id: history.next_batch_id()?,
        timestamp: SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0),
        operations: batch_operations,
        pipeline_snapshot: pipeline.clone(),
        status,
    };
    history.record_batch(&batch)?;

    if let Some(sender) = events {
        let _ = sender.send(CoreEvent::BatchCompleted(batch.id));
    }

    Ok(ExecutionReport::from_batch(batch))
}

/// Resolves on-disk target conflicts before any rename runs. A target
/// "conflicts" only if it exists on disk and is not itself vacated by
/// another operation's source within this same plan.
fn resolve_conflicts(
    operations: &mut [RenameOperation],
    outcomes: &mut [Option<OperationOutcome>],
    policy: ConflictPolicy,
    filesystem: &dyn Filesystem,
) {
    let sources: std::collections::HashSet<PathBuf> =
        operations.iter().map(|op| op.source_path.clone()).collect();

    for i in 0..operations.len() {
        let target = operations[i].target_path.clone();
        if operations[i].case_only || !filesystem.exists(&target) || sources.contains(&target) {
            continue;
        }
        match policy {
            ConflictPolicy::Abort => {
                outcomes[i] = Some(OperationOutcome::Failed(format!(
                    "target '{}' already exists",
                    target.display()
                )));
            }
            ConflictPolicy::SkipRow => {
                outcomes[i] = Some(OperationOutcome::Skipped(format!(
                    "target '{}' already exists",
                    target.display()
                )));
            }
            ConflictPolicy::Overwrite => {}
            ConflictPolicy::AutoSuffix => {
                operations[i].target_path = unique_suffixed_path(&target, filesystem);
            }
        }
    }
}

fn unique_suffixed_path(target: &Path, filesystem: &dyn Filesystem) -> PathBuf {
    let stem = target.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
    let ext = target.extension().map(|e| e.to_string_lossy().to_string());
    let parent = target.parent().map(|p| p.to_path_buf()).unwrap_or_default();
    let mut n = 1;
    loop {
        let candidate_name = match &ext {
            Some(ext) => format!("{stem}-{n}.{ext}"),
            None => format!("{stem}-{n}"),
        };
        let candidate = parent.join(candidate_name);
        if !filesystem.exists(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Runs one group of operations (principals or companions) to completion:
/// groups by parent directory, orders each directory's steps via
/// [`graph::order_directory`], and performs the renames in order.
///
/// `principal_outcomes`, when given, lets a companion's execution be skipped
/// once its principal has already failed (spec.md 4.5's companion-skip
/// rule); it is a snapshot taken before this group starts, since principals
/// always run in the group before companions.
#[allow(clippy::too_many_arguments)]
fn run_group(
    indices: &[usize],
    operations: &[RenameOperation],
    outcomes: &mut [Option<OperationOutcome>],
    cache: &Cache,
    filesystem: &dyn Filesystem,
    cancellation: &CancellationToken,
    events: Option<&Sender<CoreEvent>>,
    completed_renames: &mut Vec<(PathBuf, PathBuf)>,
    principal_outcomes: Option<&[Option<OperationOutcome>]>,
) {
    let mut by_dir: HashMap<PathBuf, Vec<usize>> = HashMap::new();
    for &i in indices {
        by_dir.entry(operations[i].source_path.parent().unwrap_or(Path::new("")).to_path_buf())
            .or_default()
            .push(i);
    }

    let total = indices.len();
    let mut completed_count = 0usize;

    for group in by_dir.values() {
        let sub_ops: Vec<RenameOperation> = group
            .iter()
            .map(|&i| RenameOperation {
                source_path: operations[i].source_path.clone(),
                target_path: operations[i].target_path.clone(),
                case_only: operations[i].case_only,
                is_companion: operations[i].is_companion,
                principal_index: operations[i].principal_index,
            })
            .collect();
        let case_insensitive = group
            .first()
            .map(|&i| filesystem.is_case_insensitive(&operations[i].source_path))
            .unwrap_or(false);
        let steps = graph::order_directory(&sub_ops, case_insensitive);

        let mut done_in_group = std::collections::HashSet::new();
        for step in steps {
            if cancellation.is_cancelled() {
                return;
            }
            let global_index = group[step.operation_index];
            if done_in_group.contains(&global_index) {
                continue;
            }

            if let Some(principal_outcomes) = principal_outcomes
                && let Some(principal_index) = operations[global_index].principal_index
                && matches!(principal_outcomes[principal_index], Some(OperationOutcome::Failed(_)))
            {
                outcomes[global_index] =
                    Some(OperationOutcome::Skipped("principal rename failed".to_string()));
                done_in_group.insert(global_index);
                continue;
            }

            match filesystem.rename(&step.from, &step.to) {
                Ok(()) => {
                    if step.is_final {
                        outcomes[global_index] = Some(OperationOutcome::Success);
                        completed_renames.push((
                            operations[global_index].source_path.clone(),
                            operations[global_index].target_path.clone(),
                        ));
                        cache.rekey(
                            &operations[global_index].source_path,
                            &operations[global_index].target_path,
                            case_insensitive,
                        );
                        completed_count += 1;
                        done_in_group.insert(global_index);
                        if let Some(sender) = events {
                            let _ = sender.send(CoreEvent::RowChanged(
                                operations[global_index].target_path.clone(),
                            ));
                            let _ = sender.send(CoreEvent::ExecutionProgress {
                                completed: completed_count,
                                total,
                            });
                        }
                    }
                }
                Err(e) => {
                    outcomes[global_index] = Some(OperationOutcome::Failed(e.to_string()));
                    done_in_group.insert(global_index);
                }
            }
        }
    }
}

/// Best-effort LIFO reversal of every rename that completed successfully,
/// used only when the caller opted into `atomic` batch scope and at least
/// one operation failed. A reversal failure is ignored (the original
/// `Success` outcome stands) since there is nothing more we can safely do.
fn rollback(
    completed_renames: &[(PathBuf, PathBuf)],
    cache: &Cache,
    filesystem: &dyn Filesystem,
    outcomes: &mut [Option<OperationOutcome>],
    operations: &[RenameOperation],
) {
    for (original, renamed) in completed_renames.iter().rev() {
        if filesystem.rename(renamed, original).is_ok() {
            let case_insensitive = filesystem.is_case_insensitive(original);
            cache.rekey(renamed, original, case_insensitive);
            if let Some(index) = operations
                .iter()
                .position(|op| &op.source_path == original && &op.target_path == renamed)
            {
                outcomes[index] = Some(OperationOutcome::Skipped("rolled back after batch failure".to_string()));
            }
        }
    }
}

/// Reverses a previously executed batch (spec.md section 6's `undo`):
/// swaps each recorded operation's original/final path, runs the same
/// per-directory ordering machinery `execute` uses, and marks the batch
/// `undone` in history.
///
/// Operations that didn't succeed the first time around (`Skipped`/
/// `Failed`) are never part of the reversal — there is nothing to undo.
/// For the rest, a pre-check confirms the filesystem still matches what
/// the batch produced (`final_path` exists, `original_path` is free). In
/// `strict` mode any divergence aborts the whole undo; otherwise that one
/// operation is left un-reversed and the rest proceed.
pub fn undo(
    batch_id: u64,
    history: &History,
    filesystem: &dyn Filesystem,
    cache: &Cache,
    cancellation: &CancellationToken,
    strict: bool,
) -> Result<ExecutionReport> {
    let batch = history
        .get_batch(batch_id)?
        .ok_or(RenamerError::BatchNotFound(batch_id))?;
    if batch.status == BatchStatus::Undone {
        return Err(RenamerError::NotUndoable(
            batch_id,
            "batch was already undone".to_string(),
        ));
    }

    let mut reversible_ops = Vec::new();
    for op in &batch.operations {
        if op.outcome != OperationOutcome::Success {
            continue;
        }
        let final_exists = filesystem.exists(&op.final_path);
        let original_free = op.case_only || !filesystem.exists(&op.original_path);
        if !final_exists || !original_free {
            let reason = format!(
                "cannot reverse '{}' back to '{}': filesystem state has diverged",
                op.final_path.display(),
                op.original_path.display()
            );
            if strict {
                return Err(RenamerError::NotUndoable(batch_id, reason));
            }
            continue;
        }
        reversible_ops.push(RenameOperation::new(op.final_path.clone(), op.original_path.clone()));
    }

    let mut outcomes: Vec<Option<OperationOutcome>> = vec![None; reversible_ops.len()];
    let mut completed_renames: Vec<(PathBuf, PathBuf)> = Vec::new();
    let indices: Vec<usize> = (0..reversible_ops.len()).collect();
    run_group(
        &indices,
        &reversible_ops,
        &mut outcomes,
        cache,
        filesystem,
        cancellation,
        None,
        &mut completed_renames,
        None,
    );

    let any_failed = outcomes.iter().any(|o| matches!(o, Some(OperationOutcome::Failed(_))));
    if strict && any_failed {
        return Err(RenamerError::NotUndoable(
            batch_id,
            "one or more reversals failed".to_string(),
        ));
    }

    history.mark_undone(batch_id)?;

    let status = if any_failed { BatchStatus::PartiallyFailed } else { BatchStatus::Undone };
    let batch_operations: Vec<BatchOperation> = reversible_ops
        .iter()
        .zip(outcomes.into_iter())
        .map(|(op, outcome)| BatchOperation {
            original_path: op.source_path.clone(),
            final_path: op.target_path.clone(),
            case_only: op.case_only,
            companion_of: None,
            outcome: outcome.unwrap_or_else(|| OperationOutcome::Skipped("not attempted".to_string())),
        })
        .collect();

    Ok(ExecutionReport::from_batch(Batch {
        id: batch_id,
        timestamp: batch.timestamp,
        operations: batch_operations,
        pipeline_snapshot: batch.pipeline_snapshot,
        status,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Store;
    use crate::fs_ops::RealFilesystem;
    use crate::model::{CasePolicy, ModuleConfig, SeparatorPolicy};
    use std::fs::File;
    use tempfile::tempdir;

    fn test_pipeline() -> Pipeline {
        Pipeline::new(vec![ModuleConfig::NameTransform {
            case_policy: CasePolicy::AsIs,
            separator_policy: SeparatorPolicy::Keep,
            trim: false,
        }])
        .unwrap()
    }

    #[test]
    fn executes_a_simple_rename_and_rekeys_cache() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("old.jpg");
        File::create(&source).unwrap();
        let target = dir.path().join("new.jpg");

        let cache = Cache::new(10, 10, Store::open_in_memory().unwrap());
        let history = History::open_in_memory().unwrap();
        let operations = vec![RenameOperation::new(source.clone(), target.clone())];

        let report = execute(
            operations,
            &test_pipeline(),
            ConflictPolicy::Abort,
            &RealFilesystem::with_case_insensitivity(false),
            &cache,
            &history,
            &CancellationToken::new(),
            None,
            false,
        )
        .unwrap();

        assert_eq!(report.succeeded, 1);
        assert!(target.exists());
        assert!(!source.exists());
        assert_eq!(report.batch.status, BatchStatus::Completed);
    }

    #[test]
    fn skip_row_policy_skips_conflicting_target() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("old.jpg");
        File::create(&source).unwrap();
        let target = dir.path().join("existing.jpg");
        File::create(&target).unwrap();

        let cache = Cache::new(10, 10, Store::open_in_memory().unwrap());
        let history = History::open_in_memory().unwrap();
        let operations = vec![RenameOperation::new(source.clone(), target.clone())];

        let report = execute(
            operations,
            &test_pipeline(),
            ConflictPolicy::SkipRow,
            &RealFilesystem::with_case_insensitivity(false),
            &cache,
            &history,
            &CancellationToken::new(),
            None,
            false,
        )
        .unwrap();

        assert_eq!(report.skipped, 1);
        assert!(source.exists());
    }

    #[test]
    fn auto_suffix_policy_finds_a_free_name() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("old.jpg");
        File::create(&source).unwrap();
        let target = dir.path().join("existing.jpg");
        File::create(&target).unwrap();

        let cache = Cache::new(10, 10, Store::open_in_memory().unwrap());
        let history = History::open_in_memory().unwrap();
        let operations = vec![RenameOperation::new(source.clone(), target.clone())];

        let report = execute(
            operations,
            &test_pipeline(),
            ConflictPolicy::AutoSuffix,
            &RealFilesystem::with_case_insensitivity(false),
            &cache,
            &history,
            &CancellationToken::new(),
            None,
            false,
        )
        .unwrap();

        assert_eq!(report.succeeded, 1);
        assert!(dir.path().join("existing-1.jpg").exists());
    }

    #[test]
    fn companion_is_skipped_when_principal_fails() {
        let dir = tempdir().unwrap();
        let principal_source = dir.path().join("clip.mp4");
        File::create(&principal_source).unwrap();
        let principal_target = dir.path().join("taken.mp4");
        File::create(&principal_target).unwrap(); // forces Abort to fail the principal

        let companion_source = dir.path().join("clip.srt");
        File::create(&companion_source).unwrap();
        let companion_target = dir.path().join("wedding.srt");

        let mut principal = RenameOperation::new(principal_source.clone(), principal_target.clone());
        principal.is_companion = false;
        let companion = RenameOperation::companion_of(companion_source.clone(), companion_target.clone(), 0);

        let cache = Cache::new(10, 10, Store::open_in_memory().unwrap());
        let history = History::open_in_memory().unwrap();
        let report = execute(
            vec![principal, companion],
            &test_pipeline(),
            ConflictPolicy::Abort,
            &RealFilesystem::with_case_insensitivity(false),
            &cache,
            &history,
            &CancellationToken::new(),
            None,
            false,
        )
        .unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 1);
        assert!(companion_source.exists());
        assert!(!companion_target.exists());
    }

    #[test]
    fn atomic_rollback_reverses_completed_renames_on_partial_failure() {
        let dir = tempdir().unwrap();
        let ok_source = dir.path().join("a.jpg");
        File::create(&ok_source).unwrap();
        let ok_target = dir.path().join("a2.jpg");

        let bad_source = dir.path().join("b.jpg");
        File::create(&bad_source).unwrap();
        let bad_target = dir.path().join("existing.jpg");
        File::create(&bad_target).unwrap();

        let cache = Cache::new(10, 10, Store::open_in_memory().unwrap());
        let history = History::open_in_memory().unwrap();
        let operations = vec![
            RenameOperation::new(ok_source.clone(), ok_target.clone()),
            RenameOperation::new(bad_source.clone(), bad_target.clone()),
        ];

        let report = execute(
            operations,
            &test_pipeline(),
            ConflictPolicy::Abort,
            &RealFilesystem::with_case_insensitivity(false),
            &cache,
            &history,
            &CancellationToken::new(),
            None,
            true,
        )
        .unwrap();

        assert_eq!(report.failed, 1);
        assert!(ok_source.exists());
        assert!(!ok_target.exists());
    }

    #[test]
    fn undo_reverses_a_successful_batch() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("old.jpg");
        let target = dir.path().join("new.jpg");

        let cache = Cache::new(10, 10, Store::open_in_memory().unwrap());
        let history = History::open_in_memory().unwrap();
        let fs = RealFilesystem::with_case_insensitivity(false);
        File::create(&source).unwrap();

        let report = execute(
            vec![RenameOperation::new(source.clone(), target.clone())],
            &test_pipeline(),
            ConflictPolicy::Abort,
            &fs,
            &cache,
            &history,
            &CancellationToken::new(),
            None,
            false,
        )
        .unwrap();

        let undone = undo(report.batch.id, &history, &fs, &cache, &CancellationToken::new(), true).unwrap();

        assert_eq!(undone.succeeded, 1);
        assert!(source.exists());
        assert!(!target.exists());
        assert_eq!(
            history.get_batch(report.batch.id).unwrap().unwrap().status,
            BatchStatus::Undone
        );
    }

    #[test]
    fn undo_is_rejected_for_an_already_undone_batch() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("old.jpg");
        let target = dir.path().join("new.jpg");

        let cache = Cache::new(10, 10, Store::open_in_memory().unwrap());
        let history = History::open_in_memory().unwrap();
        let fs = RealFilesystem::with_case_insensitivity(false);
        File::create(&source).unwrap();

        let report = execute(
            vec![RenameOperation::new(source.clone(), target.clone())],
            &test_pipeline(),
            ConflictPolicy::Abort,
            &fs,
            &cache,
            &history,
            &CancellationToken::new(),
            None,
            false,
        )
        .unwrap();

        undo(report.batch.id, &history, &fs, &cache, &CancellationToken::new(), true).unwrap();
        let err = undo(report.batch.id, &history, &fs, &cache, &CancellationToken::new(), true).unwrap_err();
        assert!(matches!(err, RenamerError::NotUndoable(_, _)));
    }

    #[test]
    fn undo_strict_mode_fails_when_final_path_is_gone() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("old.jpg");
        let target = dir.path().join("new.jpg");

        let cache = Cache::new(10, 10, Store::open_in_memory().unwrap());
        let history = History::open_in_memory().unwrap();
        let fs = RealFilesystem::with_case_insensitivity(false);
        File::create(&source).unwrap();

        let report = execute(
            vec![RenameOperation::new(source.clone(), target.clone())],
            &test_pipeline(),
            ConflictPolicy::Abort,
            &fs,
            &cache,
            &history,
            &CancellationToken::new(),
            None,
            false,
        )
        .unwrap();

        std::fs::remove_file(&target).unwrap();

        let err = undo(report.batch.id, &history, &fs, &cache, &CancellationToken::new(), true).unwrap_err();
        assert!(matches!(err, RenamerError::NotUndoable(_, _)));
    }

    #[test]
    fn undo_non_strict_skips_divergent_operations() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("old.jpg");
        let target = dir.path().join("new.jpg");

        let cache = Cache::new(10, 10, Store::open_in_memory().unwrap());
        let history = History::open_in_memory().unwrap();
        let fs = RealFilesystem::with_case_insensitivity(false);
        File::create(&source).unwrap();

        let report = execute(
            vec![RenameOperation::new(source.clone(), target.clone())],
            &test_pipeline(),
            ConflictPolicy::Abort,
            &fs,
            &cache,
            &history,
            &CancellationToken::new(),
            None,
            false,
        )
        .unwrap();

        std::fs::remove_file(&target).unwrap();

        let undone = undo(report.batch.id, &history, &fs, &cache, &CancellationToken::new(), false).unwrap();
        assert_eq!(undone.succeeded, 0);
        assert_eq!(undone.batch.operations.len(), 0);
    }

    #[test]
    fn unknown_batch_id_is_rejected() {
        let cache = Cache::new(10, 10, Store::open_in_memory().unwrap());
        let history = History::open_in_memory().unwrap();
        let fs = RealFilesystem::with_case_insensitivity(false);
        let err = undo(999, &history, &fs, &cache, &CancellationToken::new(), false).unwrap_err();
        assert!(matches!(err, RenamerError::BatchNotFound(999)));
    }
}
