//! Review queue and human-readable reports.
//!
//! - Review queue: CSV `file_path,original_title,suggested_match,confidence,action`,
//!   rewritten at the end of a run and consumed by `apply-reviewed`.
//! - Unmatched songs: `file_path|original_title|cleaned_title`, appended.
//! - Segue discrepancies: one line per file whose segue flag disagrees with
//!   the reference setlist, appended.

use rustc_hash::FxHashMap;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::corrections::{CorrectionsStore, PROVENANCE_REVIEWED};
use crate::error::{Result, TaggerError};
use crate::models::{Resolution, TrackFile, Winner};
use crate::normalize::{clean_title, title_key};
use crate::reference::ReferenceSetlist;
use crate::tags::TagIo;

pub const REVIEW_HEADER: &str = "file_path,original_title,suggested_match,confidence,action";

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub(crate) fn append_lines(path: &Path, lines: &[String]) -> Result<()> {
    if lines.is_empty() {
        return Ok(());
    }
    ensure_parent(path)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    for line in lines {
        writeln!(file, "{}", line)?;
    }
    Ok(())
}

// ============================================================================
// CSV
// ============================================================================

fn quote_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Split CSV text into records. Quoted fields may hold commas, doubled
/// quotes and line breaks.
fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records
}

// ============================================================================
// Review Queue
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewEntry {
    pub file_path: PathBuf,
    pub original_title: String,
    pub suggested_match: String,
    pub confidence: u8,
    /// Filled in by a person before `apply-reviewed` runs
    pub action: String,
}

/// What a reviewer asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewAction {
    Accept,
    Skip,
    /// Use this text as the title
    Replace(String),
}

impl ReviewAction {
    pub fn parse(action: &str) -> Self {
        let action = action.trim();
        if action.is_empty() || action.eq_ignore_ascii_case("y") {
            ReviewAction::Accept
        } else if action.eq_ignore_ascii_case("n") {
            ReviewAction::Skip
        } else {
            ReviewAction::Replace(action.to_string())
        }
    }
}

impl ReviewEntry {
    pub fn action(&self) -> ReviewAction {
        ReviewAction::parse(&self.action)
    }

    /// Title to write, None when skipped or empty
    pub fn final_title(&self) -> Option<String> {
        let title = match self.action() {
            ReviewAction::Accept => self.suggested_match.trim().to_string(),
            ReviewAction::Skip => return None,
            ReviewAction::Replace(text) => text,
        };
        Some(title).filter(|t| !t.is_empty())
    }

    /// Final title with " >" when the original carried a segue marker
    pub fn title_to_write(&self) -> Option<String> {
        let title = self.final_title()?;
        if clean_title(&self.original_title).has_segue && !title.ends_with('>') {
            Some(format!("{} >", title))
        } else {
            Some(title)
        }
    }

    fn to_csv(&self) -> String {
        [
            quote_field(&self.file_path.to_string_lossy()),
            quote_field(&self.original_title),
            quote_field(&self.suggested_match),
            self.confidence.to_string(),
            quote_field(&self.action),
        ]
        .join(",")
    }
}

/// Review entries for every resolution flagged for a person to check.
pub fn review_entries(files: &[TrackFile], resolutions: &[Resolution]) -> Vec<ReviewEntry> {
    files
        .iter()
        .zip(resolutions)
        .filter(|(_, r)| r.needs_review)
        .map(|(file, resolution)| {
            let original_title = resolution
                .matched
                .as_ref()
                .map(|m| m.original.clone())
                .or_else(|| file.existing_title.clone())
                .unwrap_or_default();
            let suggested_match = match &resolution.winner {
                Winner::Song(t) | Winner::Extra(t) | Winner::Raw(t) => t.clone(),
                Winner::None => resolution
                    .matched
                    .as_ref()
                    .and_then(|m| m.candidate.clone())
                    .unwrap_or_default(),
            };
            ReviewEntry {
                file_path: file.path.clone(),
                original_title,
                suggested_match,
                confidence: resolution.confidence,
                action: String::new(),
            }
        })
        .collect()
}

pub fn write_review_queue(path: &Path, entries: &[ReviewEntry]) -> Result<()> {
    ensure_parent(path)?;
    let mut out = String::from(REVIEW_HEADER);
    out.push('\n');
    for entry in entries {
        out.push_str(&entry.to_csv());
        out.push('\n');
    }
    std::fs::write(path, out)?;
    Ok(())
}

pub fn read_review_queue(path: &Path) -> Result<Vec<ReviewEntry>> {
    let text = std::fs::read_to_string(path)?;
    let mut entries = Vec::new();
    for (i, record) in parse_csv(&text).into_iter().enumerate() {
        if i == 0 && record.first().map(String::as_str) == Some("file_path") {
            continue;
        }
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        if record.len() < 4 {
            return Err(TaggerError::MalformedLine {
                path: path.to_path_buf(),
                line: i + 1,
                reason: format!("expected 5 columns, found {}", record.len()),
            });
        }
        let confidence = record[3].trim().parse().map_err(|_| TaggerError::MalformedLine {
            path: path.to_path_buf(),
            line: i + 1,
            reason: format!("invalid confidence '{}'", record[3]),
        })?;
        entries.push(ReviewEntry {
            file_path: PathBuf::from(&record[0]),
            original_title: record[1].clone(),
            suggested_match: record[2].clone(),
            confidence,
            action: record.get(4).cloned().unwrap_or_default(),
        });
    }
    Ok(entries)
}

/// Outcome of applying a reviewed queue.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApplySummary {
    pub applied: usize,
    pub skipped: usize,
    pub missing: usize,
    pub failed: usize,
    pub learned: usize,
}

/// Apply reviewed titles and record confirmed corrections.
///
/// Skipped rows, empty titles and missing files are left alone. With
/// `dry_run` no tag is written; corrections are still recorded in `corrections`,
/// whose owner decides whether to flush them.
pub fn apply_reviewed(
    entries: &[ReviewEntry],
    tags: &mut impl TagIo,
    corrections: &mut CorrectionsStore,
    dry_run: bool,
) -> ApplySummary {
    let mut summary = ApplySummary::default();
    for entry in entries {
        let Some(title) = entry.title_to_write() else {
            summary.skipped += 1;
            continue;
        };
        if !entry.file_path.is_file() {
            warn!(file = %entry.file_path.display(), "Reviewed file not found");
            summary.missing += 1;
            continue;
        }
        if dry_run {
            info!(file = %entry.file_path.display(), title = %title, "Dry run: would write");
        } else if let Err(e) = tags.write_title(&entry.file_path, &title) {
            warn!("{}", e);
            summary.failed += 1;
            continue;
        }
        summary.applied += 1;

        let raw = clean_title(&entry.original_title).text;
        let canonical = clean_title(&title).text;
        if corrections.learn(&raw, &canonical, PROVENANCE_REVIEWED) {
            summary.learned += 1;
        }
    }
    summary
}

// ============================================================================
// Unmatched Songs
// ============================================================================

/// Lines for files that resolved to neither a song nor an extra.
pub fn unmatched_lines(files: &[TrackFile], resolutions: &[Resolution]) -> Vec<String> {
    files
        .iter()
        .zip(resolutions)
        .filter(|(_, r)| r.song().is_none() && !r.is_extra())
        .map(|(file, resolution)| {
            let (original, cleaned) = match &resolution.matched {
                Some(m) => (m.original.clone(), m.cleaned.clone()),
                None => (file.existing_title.clone().unwrap_or_default(), String::new()),
            };
            format!("{}|{}|{}", file.path.display(), original, cleaned)
        })
        .collect()
}

pub fn append_unmatched_report(path: &Path, lines: &[String]) -> Result<()> {
    append_lines(path, lines)
}

// ============================================================================
// Segue Discrepancies
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegueDiscrepancy {
    pub path: PathBuf,
    pub title: String,
    pub resolved: bool,
    pub reference: bool,
}

impl fmt::Display for SegueDiscrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |segue: bool| if segue { "segue" } else { "no segue" };
        write!(
            f,
            "{}|{}|resolved {}, reference {}",
            self.path.display(),
            self.title,
            flag(self.resolved),
            flag(self.reference)
        )
    }
}

/// Compare each resolved song's segue flag with the matching reference
/// occurrence. `files` and `resolutions` are parallel, in physical order.
pub fn segue_discrepancies(
    files: &[TrackFile],
    resolutions: &[Resolution],
    reference: &ReferenceSetlist,
) -> Vec<SegueDiscrepancy> {
    let mut occurrences: FxHashMap<String, usize> = FxHashMap::default();
    let mut found = Vec::new();
    for (file, resolution) in files.iter().zip(resolutions) {
        let Some(title) = resolution.song() else {
            continue;
        };
        let seen = occurrences.entry(title_key(title)).or_insert(0);
        let occurrence = *seen;
        *seen += 1;
        let Some(expected) = reference.segue_of(title, occurrence) else {
            continue;
        };
        if expected != resolution.has_segue {
            found.push(SegueDiscrepancy {
                path: file.path.clone(),
                title: title.to_string(),
                resolved: resolution.has_segue,
                reference: expected,
            });
        }
    }
    found
}

pub fn append_segue_report(path: &Path, folder: &Path, found: &[SegueDiscrepancy]) -> Result<()> {
    if found.is_empty() {
        return Ok(());
    }
    let mut lines = vec![format!("# {}", folder.display())];
    lines.extend(found.iter().map(ToString::to_string));
    append_lines(path, &lines)
}

// ============================================================================
// TESTS
// ============================================================================
