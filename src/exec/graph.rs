//! Per-directory dependency ordering (spec.md 4.5 step 3): breaks rename
//! cycles with a temporary hop and forces case-only renames through a
//! two-step rename on case-insensitive filesystems.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::model::RenameOperation;

/// One concrete rename syscall to perform, in execution order. A single
/// [`RenameOperation`] becomes two [`Step`]s when it needs a temporary hop
/// (cycle-breaking or a forced case-only two-step).
#[derive(Debug, Clone)]
pub struct Step {
    pub operation_index: usize,
    pub from: PathBuf,
    pub to: PathBuf,
    /// True for the final hop of a split operation (or the only hop of an
    /// unsplit one) — the point at which the operation's outcome should be
    /// recorded.
    pub is_final: bool,
}

fn tmp_path(path: &PathBuf, salt: usize) -> PathBuf {
    let file_name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    path.with_file_name(format!(".renamer-tmp-{salt}-{file_name}"))
}

/// Orders `operations` (already filtered to one parent directory) into a
/// sequence of [`Step`]s such that every `from` is free by the time its
/// step runs, breaking cycles and case-only renames with a temporary hop.
pub fn order_directory(operations: &[RenameOperation], case_insensitive: bool) -> Vec<Step> {
    let mut remaining: HashSet<usize> = (0..operations.len()).collect();
    let mut current_path: Vec<PathBuf> = operations.iter().map(|op| op.source_path.clone()).collect();
    let mut steps = Vec::new();
    let mut salt = 0usize;

    while !remaining.is_empty() {
        // Index of the op currently occupying `target`, among remaining ops,
        // other than `skip`.
        let occupies = |target: &PathBuf, skip: usize, current_path: &[PathBuf], remaining: &HashSet<usize>| {
            remaining
                .iter()
                .copied()
                .find(|&j| j != skip && &current_path[j] == target)
        };

        let ready = remaining.iter().copied().find(|&i| {
            occupies(&operations[i].target_path, i, &current_path, &remaining).is_none()
        });

        if let Some(i) = ready {
            let op = &operations[i];
            if op.case_only && case_insensitive {
                let tmp = tmp_path(&current_path[i], salt);
                salt += 1;
                steps.push(Step {
                    operation_index: i,
                    from: current_path[i].clone(),
                    to: tmp.clone(),
                    is_final: false,
                });
                steps.push(Step {
                    operation_index: i,
                    from: tmp,
                    to: op.target_path.clone(),
                    is_final: true,
                });
            } else {
                steps.push(Step {
                    operation_index: i,
                    from: current_path[i].clone(),
                    to: op.target_path.clone(),
                    is_final: true,
                });
            }
            current_path[i] = operations[i].target_path.clone();
            remaining.remove(&i);
            continue;
        }

        // No op is immediately ready: remaining ops form a cycle (or chain
        // blocked by something outside the plan, which is a conflict the
        // caller resolves before calling this). Break it by hopping the
        // lowest-indexed remaining op through a temporary name, which frees
        // its source without touching its final target yet.
        let victim = *remaining.iter().min().expect("remaining is non-empty");
        let tmp = tmp_path(&current_path[victim], salt);
        salt += 1;
        steps.push(Step {
            operation_index: victim,
            from: current_path[victim].clone(),
            to: tmp.clone(),
            is_final: false,
        });
        current_path[victim] = tmp;
        // `victim` stays in `remaining` — its final hop (tmp -> target) is
        // left for a later iteration's readiness check, once the op that
        // was sitting on its target has had a chance to move out of the
        // way. Finishing both hops here would race that op and clobber it.
    }

    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn op(source: &str, target: &str) -> RenameOperation {
        RenameOperation::new(PathBuf::from(source), PathBuf::from(target))
    }

    #[test]
    fn orders_independent_operations_in_any_valid_order() {
        let ops = vec![op("/d/a.txt", "/d/a2.txt"), op("/d/b.txt", "/d/b2.txt")];
        let steps = order_directory(&ops, false);
        assert_eq!(steps.len(), 2);
        assert!(steps.iter().all(|s| s.is_final));
    }

    #[test]
    fn scenario_s4_cycle_is_broken_with_a_tmp_hop() {
        // A.txt -> B.txt, B.txt -> A.txt
        let ops = vec![op("/d/A.txt", "/d/B.txt"), op("/d/B.txt", "/d/A.txt")];
        let steps = order_directory(&ops, false);
        // A cycle of two always needs at least 3 hops: one op splits into
        // two (tmp-out, tmp-in), the other runs once directly.
        assert!(steps.len() >= 3);
        let finals: Vec<&Step> = steps.iter().filter(|s| s.is_final).collect();
        assert_eq!(finals.len(), 2);
    }

    #[test]
    fn scenario_s3_case_only_rename_forces_two_step() {
        let ops = vec![op("/d/README.md", "/d/readme.md")];
        let steps = order_directory(&ops, true);
        assert_eq!(steps.len(), 2);
        assert!(!steps[0].is_final);
        assert!(steps[1].is_final);
        assert_eq!(steps[1].to, PathBuf::from("/d/readme.md"));
    }
}
