//! Companion-file recognition (spec.md 4.2): sidecar files whose own
//! metadata gets merged into a principal's [`crate::model::MetadataEntry`]
//! under namespaced keys, and which ride along with the principal on
//! rename.
//!
//! This is deliberately an extension point (DESIGN.md's resolution of the
//! "companion-suffix grammar" open question): `Recognizer` is a trait with
//! the two recognizers spec.md names as implementations, not a guessed-at
//! general grammar.

use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Identifies whether a file is a companion of some principal file, and if
/// so, which principal base name it belongs to.
pub trait Recognizer: Send + Sync {
    /// Returns the principal's base name (without extension) this file is a
    /// companion of, if `candidate` is recognized as a companion at all.
    fn recognize(&self, candidate: &Path) -> Option<String>;
}

/// Camera sidecar metadata files named `<BASE>M01.XML` / `<BASE>M02.XML`
/// whose root element carries a `NonRealTimeMeta` marker. Root-element
/// sniffing is a cheap prefix read, not a full XML parse.
pub struct NonRealTimeMetaRecognizer;

const SNIFF_WINDOW: usize = 512;
const MARKER: &str = "NonRealTimeMeta";

impl Recognizer for NonRealTimeMetaRecognizer {
    fn recognize(&self, candidate: &Path) -> Option<String> {
        let extension = candidate.extension()?.to_str()?.to_lowercase();
        if extension != "xml" {
            return None;
        }
        let stem = candidate.file_stem()?.to_str()?;
        let upper = stem.to_uppercase();
        let base = upper.strip_suffix("M01").or_else(|| upper.strip_suffix("M02"))?;
        if base.is_empty() {
            return None;
        }

        let mut file = File::open(candidate).ok()?;
        let mut buf = vec![0u8; SNIFF_WINDOW];
        let read = file.read(&mut buf).ok()?;
        let prefix = String::from_utf8_lossy(&buf[..read]);
        if prefix.contains(MARKER) {
            // Preserve the original casing of the base name from the file
            // stem, not the upper-cased copy used for suffix matching.
            Some(stem[..base.len()].to_string())
        } else {
            None
        }
    }
}

/// Subtitle/sidecar files recognized purely by extension and matched to a
/// principal sharing the same base name.
pub struct ExtensionRecognizer {
    extensions: Vec<String>,
}

impl Default for ExtensionRecognizer {
    fn default() -> Self {
        Self {
            extensions: vec![
                "srt".to_string(),
                "vtt".to_string(),
                "ass".to_string(),
                "xmp".to_string(),
            ],
        }
    }
}

impl Recognizer for ExtensionRecognizer {
    fn recognize(&self, candidate: &Path) -> Option<String> {
        let extension = candidate.extension()?.to_str()?.to_lowercase();
        if !self.extensions.contains(&extension) {
            return None;
        }
        candidate.file_stem()?.to_str().map(str::to_string)
    }
}

/// Runs every configured recognizer over `candidate`, returning the first
/// match.
pub fn recognize_companion(candidate: &Path, recognizers: &[Box<dyn Recognizer>]) -> Option<String> {
    recognizers.iter().find_map(|r| r.recognize(candidate))
}

/// The default recognizer set: the two spec.md 4.2 recognizers.
pub fn default_recognizers() -> Vec<Box<dyn Recognizer>> {
    vec![
        Box::new(NonRealTimeMetaRecognizer),
        Box::new(ExtensionRecognizer::default()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn extension_recognizer_matches_subtitle_files() {
        let recognizer = ExtensionRecognizer::default();
        assert_eq!(
            recognizer.recognize(Path::new("/a/clip.srt")),
            Some("clip".to_string())
        );
        assert_eq!(recognizer.recognize(Path::new("/a/clip.jpg")), None);
    }

    #[test]
    fn nonrealtimemeta_recognizer_requires_marker_and_suffix() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("CLIPM01.XML");
        let mut file = File::create(&path).unwrap();
        write!(file, "<NonRealTimeMeta><Title>x</Title></NonRealTimeMeta>").unwrap();
        drop(file);

        let recognizer = NonRealTimeMetaRecognizer;
        assert_eq!(recognizer.recognize(&path), Some("CLIP".to_string()));

        let unmarked = dir.path().join("OTHERM01.XML");
        let mut file = File::create(&unmarked).unwrap();
        write!(file, "<SomethingElse/>").unwrap();
        drop(file);
        assert_eq!(recognizer.recognize(&unmarked), None);
    }

    #[test]
    fn default_recognizers_find_first_match() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.srt");
        File::create(&path).unwrap();
        let recognizers = default_recognizers();
        assert_eq!(
            recognize_companion(&path, &recognizers),
            Some("clip".to_string())
        );
    }
}
