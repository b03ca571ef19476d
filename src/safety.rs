//! Safety checks that keep a run from corrupting data.
//!
//! - The coverage gate decides, before any tag is resolved, whether a show
//!   folder may be processed at all. A skipped folder is never written to.
//! - Output path validation keeps reports from overwriting the corrections
//!   file, the extra-labels file or the reference database.

use anyhow::{bail, Result};
use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::models::TrackFile;
use crate::reference::ReferenceSetlist;
use crate::setlist_txt::SetlistText;

// ============================================================================
// Coverage Gate
// ============================================================================

/// Counts compared by the coverage gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coverage {
    /// Audio files with a recognized disc/track file name
    pub files: usize,
    pub text_entries: usize,
    pub reference_songs: usize,
}

impl Coverage {
    pub fn measure(files: &[TrackFile], text: &SetlistText, reference: &ReferenceSetlist) -> Self {
        Self {
            files: files.iter().filter(|f| f.key.is_some()).count(),
            text_entries: text.len(),
            reference_songs: reference.len(),
        }
    }
}

impl fmt::Display for Coverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files, {} text entries, {} reference songs",
            self.files, self.text_entries, self.reference_songs
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageWarning {
    /// Counts differ; existing tags and the matcher lead, text is a fallback
    CountMismatch(Coverage),
    /// Text disagrees but the reference count equals the file count, so the
    /// reference setlist stands in for the text mapping
    CoincidentalMatch(Coverage),
}

impl fmt::Display for CoverageWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverageWarning::CountMismatch(c) => {
                write!(f, "text mapping does not cover every file ({})", c)
            }
            CoverageWarning::CoincidentalMatch(c) => write!(
                f,
                "text mapping mismatch, reference count coincidentally matches files; using reference order ({})",
                c
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Admit {
        coverage: Coverage,
        warning: Option<CoverageWarning>,
    },
    Skip {
        coverage: Coverage,
        reason: String,
        /// Files with no text mapping
        unmapped: Vec<PathBuf>,
    },
}

impl Verdict {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Verdict::Admit { .. })
    }

    /// True when the reference setlist replaces the text mapping for this folder
    pub fn reference_is_authoritative(&self) -> bool {
        matches!(
            self,
            Verdict::Admit {
                warning: Some(CoverageWarning::CoincidentalMatch(_)),
                ..
            }
        )
    }

    pub fn warning(&self) -> Option<&CoverageWarning> {
        match self {
            Verdict::Admit { warning, .. } => warning.as_ref(),
            Verdict::Skip { .. } => None,
        }
    }
}

fn unmapped_files(files: &[TrackFile], text: &SetlistText) -> Vec<PathBuf> {
    files
        .iter()
        .filter(|f| f.key.map_or(true, |k| text.lookup(&k).is_none()))
        .map(|f| f.path.clone())
        .collect()
}

/// Decide whether a folder may be processed.
///
/// | files vs text | trust text | reference == files | outcome                       |
/// |---------------|------------|--------------------|-------------------------------|
/// | equal         | any        | any                | admit                         |
/// | unequal       | off        | any                | admit, count mismatch warning |
/// | unequal       | on         | no                 | skip                          |
/// | unequal       | on         | yes                | admit, coincidental match     |
pub fn validate_coverage(
    files: &[TrackFile],
    text: &SetlistText,
    reference: &ReferenceSetlist,
    trust_text: bool,
) -> Verdict {
    let coverage = Coverage::measure(files, text, reference);

    if coverage.files == coverage.text_entries {
        return Verdict::Admit {
            coverage,
            warning: None,
        };
    }
    if !trust_text {
        return Verdict::Admit {
            coverage,
            warning: Some(CoverageWarning::CountMismatch(coverage)),
        };
    }
    if coverage.reference_songs == coverage.files {
        return Verdict::Admit {
            coverage,
            warning: Some(CoverageWarning::CoincidentalMatch(coverage)),
        };
    }
    Verdict::Skip {
        coverage,
        reason: format!(
            "file count ({}) does not match text mapping ({}) or reference setlist ({})",
            coverage.files, coverage.text_entries, coverage.reference_songs
        ),
        unmapped: unmapped_files(files, text),
    }
}

// ============================================================================
// Output Paths
// ============================================================================

/// Absolute form of `path` with `.` and `..` removed and the longest
/// existing ancestor canonicalized, so paths that do not exist yet compare
/// equal to their aliases.
pub fn resolve_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|dir| dir.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut lexical = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                lexical.pop();
            }
            other => lexical.push(other),
        }
    }

    for ancestor in lexical.ancestors() {
        if let Ok(real) = ancestor.canonicalize() {
            return match lexical.strip_prefix(ancestor) {
                Ok(rest) if !rest.as_os_str().is_empty() => real.join(rest),
                _ => real,
            };
        }
    }
    lexical
}

/// Validates that an output path is safe to overwrite.
///
/// Checks:
/// - Output cannot resolve to any of the protected paths (corrections, extras, database)
/// - Output cannot carry a database extension
///
/// # Returns
/// * `Ok(())` if the output path is safe
/// * `Err` with a descriptive message if the check fails
pub fn validate_output_path(output: &Path, protected: &[&Path]) -> Result<()> {
    let resolved = resolve_path(output);
    for source in protected {
        if resolved == resolve_path(source) {
            bail!(
                "Safety check failed: output '{}' cannot be the same as protected file '{}'",
                output.display(),
                source.display()
            );
        }
    }

    let output_name = output.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let dangerous_suffixes = [".db", ".sqlite", ".sqlite3"];
    for suffix in dangerous_suffixes {
        if output_name.to_lowercase().ends_with(suffix) {
            bail!(
                "Safety check failed: output '{}' looks like a database file",
                output.display()
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{song, track_files};

    fn text_with(entries: usize) -> SetlistText {
        let lines: Vec<String> = (1..=entries).map(|i| format!("{:02}. Song {}", i, i)).collect();
        SetlistText::parse(&lines.join("\n"))
    }

    fn reference_with(songs: usize) -> ReferenceSetlist {
        ReferenceSetlist::new((0..songs).map(|i| song(&format!("Song {}", i), 1, false)).collect())
    }

    #[test]
    fn test_equal_counts_admit_without_warning() {
        let files = track_files(None, 12);
        for trust_text in [false, true] {
            let verdict = validate_coverage(&files, &text_with(12), &reference_with(12), trust_text);
            assert_eq!(verdict.warning(), None);
            assert!(verdict.is_admitted());
            // Reference count is irrelevant when text covers every file
            let verdict = validate_coverage(&files, &text_with(12), &reference_with(3), trust_text);
            assert!(verdict.is_admitted());
            assert!(!verdict.reference_is_authoritative());
        }
    }

    #[test]
    fn test_mismatch_without_trust_admits_with_warning() {
        let files = track_files(None, 12);
        let verdict = validate_coverage(&files, &text_with(11), &reference_with(3), false);
        assert!(matches!(
            verdict.warning(),
            Some(CoverageWarning::CountMismatch(_))
        ));
    }

    #[test]
    fn test_mismatch_with_trust_skips() {
        let files = track_files(None, 12);
        let verdict = validate_coverage(&files, &text_with(11), &reference_with(11), true);
        match verdict {
            Verdict::Skip {
                coverage, unmapped, ..
            } => {
                assert_eq!(coverage.files, 12);
                assert_eq!(unmapped.len(), 1);
                assert!(unmapped[0].to_string_lossy().ends_with("t12.flac"));
            }
            other => panic!("expected skip, got {:?}", other),
        }
    }

    #[test]
    fn test_mismatch_with_trust_coincidental_reference() {
        let files = track_files(None, 12);
        let verdict = validate_coverage(&files, &text_with(11), &reference_with(12), true);
        assert!(verdict.is_admitted());
        assert!(verdict.reference_is_authoritative());
    }

    #[test]
    fn test_files_without_key_not_counted() {
        let mut files = track_files(None, 3);
        files[2].key = None;
        let verdict = validate_coverage(&files, &text_with(2), &reference_with(0), true);
        assert_eq!(verdict.warning(), None);
        assert!(verdict.is_admitted());
    }

    #[test]
    fn test_valid_output() {
        let output = PathBuf::from("/tmp/logs/review_queue.csv");
        let corrections = PathBuf::from("/data/song_corrections.txt");
        assert!(validate_output_path(&output, &[&corrections]).is_ok());
    }

    #[test]
    fn test_output_equals_protected() {
        let path = PathBuf::from("/data/song_corrections.txt");
        let result = validate_output_path(&path, &[&path]);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("cannot be the same as protected file"));
    }

    #[test]
    fn test_output_alias_of_protected_blocked() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("data")).unwrap();
        let corrections = dir.path().join("data").join("song_corrections.txt");

        // Neither the aliases nor the protected file exist yet
        let dotted = dir.path().join(".").join("data").join("song_corrections.txt");
        let parent = dir.path().join("logs").join("..").join("data").join("song_corrections.txt");
        assert!(validate_output_path(&dotted, &[&corrections]).is_err());
        assert!(validate_output_path(&parent, &[&corrections]).is_err());

        std::fs::write(&corrections, "original_title|canonical_title|source\n").unwrap();
        assert!(validate_output_path(&parent, &[&corrections]).is_err());

        let report = dir.path().join("logs").join("unmatched_songs.txt");
        assert!(validate_output_path(&report, &[&corrections]).is_ok());
    }

    #[test]
    fn test_relative_alias_blocked() {
        let protected = PathBuf::from("data/song_corrections.txt");
        let output = PathBuf::from("./data/song_corrections.txt");
        assert!(validate_output_path(&output, &[&protected]).is_err());
        assert_eq!(
            resolve_path(Path::new("logs/../data/song_corrections.txt")),
            resolve_path(&protected)
        );
    }

    #[test]
    fn test_database_name_blocked() {
        let output = PathBuf::from("/tmp/jerrybase.db");
        assert!(validate_output_path(&output, &[]).is_err());
    }
}
