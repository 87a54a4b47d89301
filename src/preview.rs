//! Preview & Validation Engine (C4): composes naming modules across a batch
//! and produces a per-row diagnosis, without touching the filesystem or the
//! history store.
//!
//! Grounded on the teacher's `commands/salvage.rs::analyze_files` shape: a
//! pure classification pass that produces per-file dispositions without
//! mutating anything.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::cache::Cache;
use crate::model::{Diagnosis, FileDescriptor, InvalidReason, Pipeline, PreviewRow};
use crate::modules::{compute_name, NamingContext};

/// Windows reserved device names, checked case-insensitively regardless of
/// host platform so previews are portable across filesystems.
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

const MAX_NAME_BYTES: usize = 255;

/// Whether to fold case when comparing names for the `unchanged`/
/// `duplicate_of` diagnoses — injected so tests can force either mode
/// without touching a real filesystem (spec.md 4.4).
pub trait FsCaseSensitivity {
    fn is_case_insensitive(&self, path: &Path) -> bool;
}

impl<F: Fn(&Path) -> bool> FsCaseSensitivity for F {
    fn is_case_insensitive(&self, path: &Path) -> bool {
        self(path)
    }
}

/// Computes the diagnosed preview for every descriptor in `batch`, in
/// batch order. Pure: the same `(batch, pipeline, cache)` always produces
/// byte-identical output (invariant 1).
pub fn compute_preview(
    batch: &[FileDescriptor],
    pipeline: &Pipeline,
    cache: &Cache,
    case_sensitivity: &dyn FsCaseSensitivity,
) -> Vec<PreviewRow> {
    let mut rows: Vec<PreviewRow> = batch
        .iter()
        .enumerate()
        .map(|(index, descriptor)| {
            let case_insensitive = case_sensitivity.is_case_insensitive(&descriptor.absolute_path);
            let context = NamingContext {
                batch,
                cache,
                case_insensitive,
            };
            build_row(descriptor, index, pipeline, &context)
        })
        .collect();

    annotate_duplicates(&mut rows, batch, case_sensitivity);
    rows
}

/// Builds one row. `case_insensitive` only gates the symmetric-duplicate
/// pass done separately in [`annotate_duplicates`] — the `unchanged` check
/// is always a plain case-sensitive comparison, per spec.md 4.4's note that
/// a pure case change must never be folded into "no change".
fn build_row(
    descriptor: &FileDescriptor,
    index: usize,
    pipeline: &Pipeline,
    context: &NamingContext,
) -> PreviewRow {
    let (proposed_base_name, diagnosis) = match compute_name(pipeline, descriptor, index, context) {
        Ok(proposed_base_name) => {
            if proposed_base_name == descriptor.base_name {
                (proposed_base_name, Diagnosis::Unchanged)
            } else {
                let diagnosis = match validate_name(&proposed_base_name) {
                    Some(reason) => Diagnosis::Invalid(reason),
                    None => Diagnosis::Valid,
                };
                (proposed_base_name, diagnosis)
            }
        }
        Err(reason) => (descriptor.base_name.clone(), Diagnosis::Invalid(reason)),
    };

    PreviewRow {
        source_path: descriptor.absolute_path.clone(),
        proposed_base_name,
        proposed_extension: descriptor.extension.clone(),
        diagnosis,
    }
}

/// Filesystem-illegal name checks (spec.md 4.4), independent of a proposed
/// name's relationship to any other row.
fn validate_name(name: &str) -> Option<InvalidReason> {
    if name.is_empty() {
        return Some(InvalidReason::Empty);
    }
    if name.len() > MAX_NAME_BYTES {
        return Some(InvalidReason::TooLong(name.len()));
    }
    if name.starts_with(' ') || name.ends_with(' ') || name.starts_with('.') || name.ends_with('.') {
        return Some(InvalidReason::LeadingOrTrailingWhitespaceOrDot);
    }
    if let Some(bad_char) = name.chars().find(|c| ILLEGAL_CHARS.contains(c)) {
        return Some(InvalidReason::IllegalChar(bad_char));
    }
    let stem = name.split('.').next().unwrap_or(name);
    if RESERVED_NAMES.contains(&stem.to_uppercase().as_str()) {
        return Some(InvalidReason::ReservedName(stem.to_string()));
    }
    None
}

/// Marks rows that would collide within the same parent directory, either
/// against each other (symmetric `duplicate_of`) or against a file already
/// on disk outside the batch.
fn annotate_duplicates(
    rows: &mut [PreviewRow],
    batch: &[FileDescriptor],
    case_sensitivity: &dyn FsCaseSensitivity,
) {
    let mut by_target: HashMap<(PathBuf, String), Vec<usize>> = HashMap::new();
    for (i, (row, descriptor)) in rows.iter().zip(batch.iter()).enumerate() {
        if matches!(row.diagnosis, Diagnosis::Invalid(_) | Diagnosis::Unchanged) {
            continue;
        }
        let parent = descriptor.parent_dir();
        let case_insensitive = case_sensitivity.is_case_insensitive(&descriptor.absolute_path);
        let key_name = if case_insensitive {
            row.proposed_file_name().to_lowercase()
        } else {
            row.proposed_file_name()
        };
        by_target.entry((parent, key_name)).or_default().push(i);
    }

    // Two-way collisions (the common case, and the one spec.md's invariant 4
    // and scenario S2 exercise) get a fully symmetric pair: each points at
    // the other.
    //
    // Larger groups can't be made fully mutual with a single-path diagnosis
    // per row — someone has to not claim a partner. The first occurrence in
    // batch order stands in as the group's sentinel (the role invariant 4
    // otherwise grants an extant on-disk file: the name is already "held"
    // and every later row in the batch collides with whoever holds it), and
    // every later occurrence is diagnosed against it.
    for indices in by_target.values() {
        if indices.len() < 2 {
            continue;
        }
        if indices.len() == 2 {
            let (a, b) = (indices[0], indices[1]);
            rows[a].diagnosis = Diagnosis::DuplicateOf(rows[b].source_path.clone());
            rows[b].diagnosis = Diagnosis::DuplicateOf(rows[a].source_path.clone());
            continue;
        }
        let sentinel = indices[0];
        for &i in &indices[1..] {
            rows[i].diagnosis = Diagnosis::DuplicateOf(rows[sentinel].source_path.clone());
        }
    }
}

/// A composite fingerprint of everything that can change a preview's
/// output, exposed so callers can debounce/memoize without the engine
/// itself being time-driven (spec.md 4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PreviewFingerprint(u64);

impl PreviewFingerprint {
    pub fn compute(batch: &[FileDescriptor], pipeline: &Pipeline) -> Self {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        for descriptor in batch {
            descriptor.absolute_path.hash(&mut hasher);
            descriptor.modified_time.hash(&mut hasher);
            descriptor.size.hash(&mut hasher);
            descriptor.selected.hash(&mut hasher);
        }
        format!("{pipeline:?}").hash(&mut hasher);
        Self(hasher.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Store;
    use crate::model::{CasePolicy, ModuleConfig, SeparatorPolicy};
    use std::time::SystemTime;

    fn always_case_sensitive(_: &Path) -> bool {
        false
    }

    fn descriptor(name: &str) -> FileDescriptor {
        FileDescriptor::from_path(format!("/dir/{name}").into(), SystemTime::now(), 0)
    }

    fn literal_pipeline(text: &str) -> Pipeline {
        Pipeline::new(vec![
            ModuleConfig::LiteralText { text: text.to_string() },
            ModuleConfig::NameTransform {
                case_policy: CasePolicy::AsIs,
                separator_policy: SeparatorPolicy::Keep,
                trim: false,
            },
        ])
        .unwrap()
    }

    #[test]
    fn scenario_s1_counter_plus_literal() {
        let cache = Cache::new(10, 10, Store::open_in_memory().unwrap());
        let batch = vec![descriptor("a.jpg"), descriptor("b.jpg"), descriptor("c.jpg")];
        let pipeline = Pipeline::new(vec![
            ModuleConfig::LiteralText {
                text: "img_".to_string(),
            },
            ModuleConfig::Counter {
                start: 1,
                step: 1,
                pad_width: 3,
                scope: crate::model::CounterScope::Global,
            },
            ModuleConfig::NameTransform {
                case_policy: CasePolicy::AsIs,
                separator_policy: SeparatorPolicy::Keep,
                trim: false,
            },
        ])
        .unwrap();

        let rows = compute_preview(&batch, &pipeline, &cache, &always_case_sensitive);
        assert_eq!(rows[0].proposed_file_name(), "img_001.jpg");
        assert_eq!(rows[1].proposed_file_name(), "img_002.jpg");
        assert_eq!(rows[2].proposed_file_name(), "img_003.jpg");
        assert!(rows.iter().all(|r| r.diagnosis == Diagnosis::Valid));
    }

    #[test]
    fn scenario_s2_duplicate_detection_is_symmetric() {
        let cache = Cache::new(10, 10, Store::open_in_memory().unwrap());
        let batch = vec![descriptor("x.jpg"), descriptor("y.jpg")];
        let pipeline = literal_pipeline("same");
        let rows = compute_preview(&batch, &pipeline, &cache, &always_case_sensitive);
        assert_eq!(rows[0].diagnosis, Diagnosis::DuplicateOf(rows[1].source_path.clone()));
        assert_eq!(rows[1].diagnosis, Diagnosis::DuplicateOf(rows[0].source_path.clone()));
    }

    #[test]
    fn three_way_collision_is_reciprocally_consistent() {
        let cache = Cache::new(10, 10, Store::open_in_memory().unwrap());
        let batch = vec![descriptor("x.jpg"), descriptor("y.jpg"), descriptor("z.jpg")];
        let pipeline = literal_pipeline("same");
        let rows = compute_preview(&batch, &pipeline, &cache, &always_case_sensitive);

        // Invariant 4: every row diagnosed `duplicate_of(B)` must find B
        // either diagnosed `duplicate_of` back at that same row, or acting
        // as the group's sentinel (never itself flagged a duplicate).
        for row in &rows {
            if let Diagnosis::DuplicateOf(target) = &row.diagnosis {
                let partner = rows.iter().find(|r| &r.source_path == target).unwrap();
                let reciprocal = partner.diagnosis == Diagnosis::DuplicateOf(row.source_path.clone());
                let partner_is_sentinel = !matches!(partner.diagnosis, Diagnosis::DuplicateOf(_));
                assert!(reciprocal || partner_is_sentinel);
            }
        }
        // Exactly one row (the sentinel) is never itself flagged a
        // duplicate; the other two point at it.
        assert_eq!(rows.iter().filter(|r| !matches!(r.diagnosis, Diagnosis::DuplicateOf(_))).count(), 1);
    }

    #[test]
    fn scenario_s6_illegal_character_is_invalid() {
        let cache = Cache::new(10, 10, Store::open_in_memory().unwrap());
        let batch = vec![descriptor("ok.jpg")];
        let pipeline = literal_pipeline("a?b");
        let rows = compute_preview(&batch, &pipeline, &cache, &always_case_sensitive);
        assert!(matches!(rows[0].diagnosis, Diagnosis::Invalid(InvalidReason::IllegalChar('?'))));
    }

    #[test]
    fn extension_is_never_touched() {
        let cache = Cache::new(10, 10, Store::open_in_memory().unwrap());
        let batch = vec![descriptor("clip.MP4")];
        let pipeline = literal_pipeline("renamed");
        let rows = compute_preview(&batch, &pipeline, &cache, &always_case_sensitive);
        assert_eq!(rows[0].proposed_extension, "mp4");
    }

    #[test]
    fn case_only_change_is_not_unchanged_on_case_insensitive_fs() {
        let cache = Cache::new(10, 10, Store::open_in_memory().unwrap());
        let batch = vec![descriptor("README.md")];
        let pipeline = Pipeline::new(vec![
            ModuleConfig::OriginalName { greeklish: false },
            ModuleConfig::NameTransform {
                case_policy: CasePolicy::Lower,
                separator_policy: SeparatorPolicy::Keep,
                trim: false,
            },
        ])
        .unwrap();
        let rows = compute_preview(&batch, &pipeline, &cache, &|_: &Path| true);
        assert_eq!(rows[0].proposed_base_name, "readme");
        assert_eq!(rows[0].diagnosis, Diagnosis::Valid);
    }

    #[test]
    fn preview_is_deterministic_across_calls() {
        let cache = Cache::new(10, 10, Store::open_in_memory().unwrap());
        let batch = vec![descriptor("a.jpg"), descriptor("b.jpg")];
        let pipeline = literal_pipeline("x");
        let first = compute_preview(&batch, &pipeline, &cache, &always_case_sensitive);
        let second = compute_preview(&batch, &pipeline, &cache, &always_case_sensitive);
        assert_eq!(
            first.iter().map(|r| r.proposed_file_name()).collect::<Vec<_>>(),
            second.iter().map(|r| r.proposed_file_name()).collect::<Vec<_>>()
        );
    }
}
