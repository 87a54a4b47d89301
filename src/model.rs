//! Core data model shared by every component: file descriptors, cache
//! entries, naming-module configuration, and the preview/execution/history
//! record types.
//!
//! Mirrors the teacher's `state.rs`: plain structs with explicit invariants
//! enforced by constructor/mutator methods rather than by the type system
//! alone, kept free of I/O.

use std::cell::Cell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::SystemTime;

use crate::error::{RenamerError, Result};

/// How far metadata extraction got for a given file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetadataStatus {
    #[default]
    Absent,
    Fast,
    Extended,
    Failed,
}

/// Whether a content hash is on file for a given path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashStatus {
    #[default]
    Absent,
    Present,
    Failed,
}

/// Immutable record for a source file, as handed to the core by the
/// (external) discovery collaborator.
///
/// Identity fields (`absolute_path`, `base_name`, `extension`,
/// `modified_time`, `size`, `selected`) are set once at construction and
/// never mutated by the core. `metadata_status`/`hash_status` are the only
/// mutable state, tracked via `Cell` so C2 can annotate a shared
/// `&FileDescriptor` without the core needing `&mut` access or cloning.
#[derive(Debug)]
pub struct FileDescriptor {
    /// Normalized absolute path.
    pub absolute_path: PathBuf,
    /// File name without extension.
    pub base_name: String,
    /// Extension, lower-cased, without the leading dot.
    pub extension: String,
    pub modified_time: SystemTime,
    pub size: u64,
    pub selected: bool,
    metadata_status: Cell<MetadataStatus>,
    hash_status: Cell<HashStatus>,
}

impl FileDescriptor {
    pub fn new(
        absolute_path: PathBuf,
        base_name: impl Into<String>,
        extension: impl Into<String>,
        modified_time: SystemTime,
        size: u64,
        selected: bool,
    ) -> Self {
        Self {
            absolute_path,
            base_name: base_name.into(),
            extension: extension.into().to_lowercase(),
            modified_time,
            size,
            selected,
            metadata_status: Cell::new(MetadataStatus::Absent),
            hash_status: Cell::new(HashStatus::Absent),
        }
    }

    /// Builds a descriptor directly from a path on disk, splitting the file
    /// name into base name and lower-cased extension the way every naming
    /// module expects.
    pub fn from_path(path: PathBuf, modified_time: SystemTime, size: u64) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let (base_name, extension) = split_name_extension(&file_name);
        Self::new(path, base_name, extension, modified_time, size, true)
    }

    pub fn metadata_status(&self) -> MetadataStatus {
        self.metadata_status.get()
    }

    pub fn set_metadata_status(&self, status: MetadataStatus) {
        self.metadata_status.set(status);
    }

    pub fn hash_status(&self) -> HashStatus {
        self.hash_status.get()
    }

    pub fn set_hash_status(&self, status: HashStatus) {
        self.hash_status.set(status);
    }

    /// The parent directory of this file, used for per-folder counter
    /// scope and for directory-scoped execution/conflict checks.
    pub fn parent_dir(&self) -> PathBuf {
        self.absolute_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_default()
    }
}

/// Splits `"clip.M01.xml"` into `("clip.M01", "xml")`, matching the rule
/// that only the final dot-suffix is the extension.
fn split_name_extension(file_name: &str) -> (String, String) {
    match file_name.rsplit_once('.') {
        Some((base, ext)) if !base.is_empty() => (base.to_string(), ext.to_lowercase()),
        _ => (file_name.to_string(), String::new()),
    }
}

/// A single metadata value as produced by the extractor. Kept narrow since
/// the extractor only ever needs scalars, strings, and dates.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum MetadataValue {
    Text(String),
    Number(f64),
    /// Unix timestamp, seconds since epoch.
    DateTime(i64),
}

impl MetadataValue {
    /// Renders the value as a display string, applying `date_format` (a
    /// `strftime`-subset pattern supporting `%Y %m %d %H %M %S`) when the
    /// value is a date.
    pub fn render(&self, date_format: Option<&str>) -> String {
        match self {
            MetadataValue::Text(s) => s.clone(),
            MetadataValue::Number(n) => {
                if n.fract() == 0.0 {
                    format!("{n:.0}")
                } else {
                    n.to_string()
                }
            }
            MetadataValue::DateTime(unix_secs) => match date_format {
                Some(fmt) => crate::modules::format_unix_timestamp(*unix_secs, fmt),
                None => unix_secs.to_string(),
            },
        }
    }
}

/// A mapping from field name to value for one file, plus whether it was
/// populated by an extended (vs. fast) extraction pass.
#[derive(Debug, Clone, Default)]
pub struct MetadataEntry {
    pub fields: HashMap<String, MetadataValue>,
    pub is_extended: bool,
}

impl MetadataEntry {
    pub fn new(is_extended: bool) -> Self {
        Self {
            fields: HashMap::new(),
            is_extended,
        }
    }

    pub fn get(&self, field_key: &str) -> Option<&MetadataValue> {
        self.fields.get(field_key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: MetadataValue) {
        self.fields.insert(key.into(), value);
    }

    /// Merges companion-file fields under `companion:<filename>:<field>`
    /// keys, per the companion-sync rule in the design.
    pub fn merge_companion(&mut self, companion_file_name: &str, companion: &MetadataEntry) {
        for (field, value) in &companion.fields {
            let key = format!("companion:{companion_file_name}:{field}");
            self.fields.insert(key, value.clone());
        }
    }
}

/// The hash algorithm used to produce a [`HashEntry`]. Per the design's
/// resolution of spec.md's open question, BLAKE3 is the sole supported
/// algorithm for a given deployment, but it is still recorded per-entry so
/// a future algorithm is never silently compared against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum HashAlgorithm {
    #[default]
    Blake3,
}

impl HashAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            HashAlgorithm::Blake3 => "blake3",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "blake3" => Some(HashAlgorithm::Blake3),
            _ => None,
        }
    }
}

/// The `(size, modified_time)` pair a [`HashEntry`] is only valid against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileFingerprint {
    pub size: u64,
    pub modified_time_nanos: u128,
}

impl FileFingerprint {
    pub fn of(descriptor: &FileDescriptor) -> Self {
        Self {
            size: descriptor.size,
            modified_time_nanos: descriptor
                .modified_time
                .duration_since(SystemTime::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0),
        }
    }
}

/// A content hash plus the fingerprint it was computed against.
#[derive(Debug, Clone)]
pub struct HashEntry {
    pub digest: String,
    pub algorithm: HashAlgorithm,
    pub fingerprint: FileFingerprint,
}

impl HashEntry {
    /// A hash entry is only valid while the fingerprint still matches the
    /// file; otherwise it must be treated as absent (spec.md 4.1).
    pub fn is_valid_for(&self, current: FileFingerprint) -> bool {
        self.fingerprint == current
    }
}

/// Scope over which a [`ModuleConfig::Counter`] enumerates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CounterScope {
    Global,
    PerFolder,
    PerExtension,
}

/// What a [`ModuleConfig::Metadata`] module does when its field is absent.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum FallbackPolicy {
    /// Use this literal string instead.
    Fallback(String),
    /// Mark the row `invalid(missing:<field_key>)`.
    MarkInvalid,
}

/// Case policy applied by the terminal `NameTransform` module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CasePolicy {
    AsIs,
    Lower,
    Upper,
    Title,
    Sentence,
}

/// Separator policy applied by the terminal `NameTransform` module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SeparatorPolicy {
    Keep,
    Underscore,
    Dash,
    Space,
    Strip,
}

/// A single naming module's configuration. One of these per pipeline stage,
/// plus exactly one trailing `NameTransform` (see [`Pipeline::new`]).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum ModuleConfig {
    Counter {
        start: i64,
        step: i64,
        pad_width: usize,
        scope: CounterScope,
    },
    Metadata {
        field_key: String,
        date_format: Option<String>,
        fallback_policy: FallbackPolicy,
    },
    LiteralText {
        text: String,
    },
    OriginalName {
        greeklish: bool,
    },
    RemoveText {
        pattern: String,
        use_regex: bool,
        case_sensitive: bool,
        first_only: bool,
    },
    NameTransform {
        case_policy: CasePolicy,
        separator_policy: SeparatorPolicy,
        trim: bool,
    },
}

impl ModuleConfig {
    fn is_name_transform(&self) -> bool {
        matches!(self, ModuleConfig::NameTransform { .. })
    }
}

/// An ordered sequence of naming modules, guaranteed at construction to end
/// with exactly one [`ModuleConfig::NameTransform`] and contain no other
/// occurrence of it.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Pipeline {
    stages: Vec<ModuleConfig>,
}

impl Pipeline {
    /// Validates and wraps a module sequence. Returns
    /// [`RenamerError::InvalidPipeline`] if the trailing-singleton
    /// `NameTransform` invariant (spec.md section 3) is violated.
    pub fn new(stages: Vec<ModuleConfig>) -> Result<Self> {
        let transform_count = stages.iter().filter(|m| m.is_name_transform()).count();
        if transform_count != 1 {
            return Err(RenamerError::InvalidPipeline(format!(
                "pipeline must contain exactly one NameTransform module, found {transform_count}"
            )));
        }
        match stages.last() {
            Some(last) if last.is_name_transform() => {}
            _ => {
                return Err(RenamerError::InvalidPipeline(
                    "NameTransform must be the last stage".to_string(),
                ));
            }
        }
        Ok(Self { stages })
    }

    pub fn stages(&self) -> &[ModuleConfig] {
        &self.stages
    }

    /// All stages except the trailing post-transform.
    pub fn fragment_stages(&self) -> &[ModuleConfig] {
        &self.stages[..self.stages.len() - 1]
    }

    /// The trailing post-transform stage.
    pub fn post_transform(&self) -> &ModuleConfig {
        self.stages.last().expect("validated non-empty in Pipeline::new")
    }
}

/// Per-row preview verdict.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnosis {
    Unchanged,
    Valid,
    Invalid(InvalidReason),
    DuplicateOf(PathBuf),
}

/// Why a proposed name was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum InvalidReason {
    Empty,
    ReservedName(String),
    IllegalChar(char),
    LeadingOrTrailingWhitespaceOrDot,
    TooLong(usize),
    MissingField(String),
    BadPattern(String),
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidReason::Empty => write!(f, "empty"),
            InvalidReason::ReservedName(name) => write!(f, "reserved_name:{name}"),
            InvalidReason::IllegalChar(c) => write!(f, "illegal_char:{c:?}"),
            InvalidReason::LeadingOrTrailingWhitespaceOrDot => {
                write!(f, "leading_or_trailing_whitespace_or_dot")
            }
            InvalidReason::TooLong(len) => write!(f, "too_long:{len}"),
            InvalidReason::MissingField(field) => write!(f, "missing:{field}"),
            InvalidReason::BadPattern(pattern) => write!(f, "bad_pattern:{pattern}"),
        }
    }
}

/// One row of a computed preview.
#[derive(Debug, Clone)]
pub struct PreviewRow {
    pub source_path: PathBuf,
    pub proposed_base_name: String,
    pub proposed_extension: String,
    pub diagnosis: Diagnosis,
}

impl PreviewRow {
    /// The full proposed file name, `base.extension` (or just `base` if the
    /// extension is empty).
    pub fn proposed_file_name(&self) -> String {
        if self.proposed_extension.is_empty() {
            self.proposed_base_name.clone()
        } else {
            format!("{}.{}", self.proposed_base_name, self.proposed_extension)
        }
    }
}

/// What the conflict-resolution policy should do when a rename target
/// already exists on disk and is not itself part of the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum ConflictPolicy {
    #[default]
    Abort,
    SkipRow,
    Overwrite,
    AutoSuffix,
}

/// One filesystem rename as materialized by the execution engine.
#[derive(Debug, Clone)]
pub struct RenameOperation {
    pub source_path: PathBuf,
    pub target_path: PathBuf,
    pub case_only: bool,
    pub is_companion: bool,
    /// Index into the plan's operation list of this op's principal, if
    /// `is_companion` is true.
    pub principal_index: Option<usize>,
}

impl RenameOperation {
    pub fn new(source_path: PathBuf, target_path: PathBuf) -> Self {
        let case_only = source_path.to_string_lossy().to_lowercase()
            == target_path.to_string_lossy().to_lowercase()
            && source_path != target_path;
        Self {
            source_path,
            target_path,
            case_only,
            is_companion: false,
            principal_index: None,
        }
    }

    pub fn companion_of(source_path: PathBuf, target_path: PathBuf, principal_index: usize) -> Self {
        let mut op = Self::new(source_path, target_path);
        op.is_companion = true;
        op.principal_index = Some(principal_index);
        op
    }
}

/// Outcome of one [`RenameOperation`] after execution.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutcome {
    Success,
    Skipped(String),
    Failed(String),
}

impl OperationOutcome {
    pub fn as_str(&self) -> &str {
        match self {
            OperationOutcome::Success => "success",
            OperationOutcome::Skipped(_) => "skipped",
            OperationOutcome::Failed(_) => "failed",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            OperationOutcome::Success => None,
            OperationOutcome::Skipped(r) | OperationOutcome::Failed(r) => Some(r),
        }
    }
}

/// A persisted record of one executed batch, including enough state
/// (original/final path pairs, companion linkage) to reverse it later.
#[derive(Debug, Clone)]
pub struct Batch {
    pub id: u64,
    pub timestamp: i64,
    pub operations: Vec<BatchOperation>,
    pub pipeline_snapshot: Pipeline,
    pub status: BatchStatus,
}

/// One recorded operation within a persisted [`Batch`].
#[derive(Debug, Clone)]
pub struct BatchOperation {
    pub original_path: PathBuf,
    pub final_path: PathBuf,
    pub case_only: bool,
    /// Ordinal of this operation's principal within the same batch, if this
    /// operation was a companion rename.
    pub companion_of: Option<u64>,
    pub outcome: OperationOutcome,
}

/// Status of a persisted batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Completed,
    PartiallyFailed,
    Undone,
}

impl BatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::Completed => "completed",
            BatchStatus::PartiallyFailed => "partially_failed",
            BatchStatus::Undone => "undone",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(BatchStatus::Completed),
            "partially_failed" => Some(BatchStatus::PartiallyFailed),
            "undone" => Some(BatchStatus::Undone),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_name_extension_basic() {
        assert_eq!(
            split_name_extension("clip.mp4"),
            ("clip".to_string(), "mp4".to_string())
        );
        assert_eq!(
            split_name_extension("clipM01.XML"),
            ("clipM01".to_string(), "xml".to_string())
        );
        assert_eq!(
            split_name_extension("noext"),
            ("noext".to_string(), "".to_string())
        );
        assert_eq!(
            split_name_extension(".hidden"),
            (".hidden".to_string(), "".to_string())
        );
    }

    #[test]
    fn pipeline_requires_trailing_transform() {
        let err = Pipeline::new(vec![ModuleConfig::LiteralText {
            text: "x".to_string(),
        }])
        .unwrap_err();
        assert!(matches!(err, RenamerError::InvalidPipeline(_)));
    }

    #[test]
    fn pipeline_rejects_duplicate_transform() {
        let transform = ModuleConfig::NameTransform {
            case_policy: CasePolicy::AsIs,
            separator_policy: SeparatorPolicy::Keep,
            trim: false,
        };
        let err = Pipeline::new(vec![transform.clone(), transform]).unwrap_err();
        assert!(matches!(err, RenamerError::InvalidPipeline(_)));
    }

    #[test]
    fn pipeline_accepts_valid_sequence() {
        let pipeline = Pipeline::new(vec![
            ModuleConfig::LiteralText {
                text: "img_".to_string(),
            },
            ModuleConfig::NameTransform {
                case_policy: CasePolicy::AsIs,
                separator_policy: SeparatorPolicy::Keep,
                trim: false,
            },
        ])
        .unwrap();
        assert_eq!(pipeline.fragment_stages().len(), 1);
    }

    #[test]
    fn metadata_entry_merges_companion_with_namespaced_keys() {
        let mut principal = MetadataEntry::new(false);
        let mut companion = MetadataEntry::new(false);
        companion.insert("gps", MetadataValue::Text("lat,lon".to_string()));
        principal.merge_companion("clipM01.XML", &companion);
        assert_eq!(
            principal.get("companion:clipM01.XML:gps"),
            Some(&MetadataValue::Text("lat,lon".to_string()))
        );
    }

    #[test]
    fn rename_operation_detects_case_only() {
        let op = RenameOperation::new(PathBuf::from("/a/README.md"), PathBuf::from("/a/readme.md"));
        assert!(op.case_only);
        let op2 = RenameOperation::new(PathBuf::from("/a/x.jpg"), PathBuf::from("/a/y.jpg"));
        assert!(!op2.case_only);
    }
}
