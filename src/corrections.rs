//! Learned corrections and non-song labels.
//!
//! Both files are pipe-delimited with a header line:
//!
//! ```text
//! original_title|canonical_title|source
//! sugaree jam|Sugaree|learned
//! ```
//!
//! The corrections file is append-only. New entries go into a pending buffer
//! and reach disk on `flush`, so a run can checkpoint per folder.

use rustc_hash::FxHashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Result, TaggerError};
use crate::normalize::title_key;

pub const CORRECTIONS_HEADER: &str = "original_title|canonical_title|source";

/// Provenance written for corrections learned from confident fuzzy matches
pub const PROVENANCE_LEARNED: &str = "learned";

/// Provenance written for corrections confirmed through the review queue
pub const PROVENANCE_REVIEWED: &str = "reviewed";

// ============================================================================
// Parsing
// ============================================================================

/// One parsed line: (lookup key, canonical title, provenance)
type Row = (String, String, Option<String>);

fn parse_row(path: &Path, line_no: usize, line: &str) -> Result<Option<Row>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with("original_title|") {
        return Ok(None);
    }
    let mut fields = line.split('|').map(str::trim);
    let original = fields.next().unwrap_or_default();
    let canonical = fields.next().unwrap_or_default();
    if original.is_empty() || canonical.is_empty() {
        return Err(TaggerError::MalformedLine {
            path: path.to_path_buf(),
            line: line_no,
            reason: "expected original_title|canonical_title".to_string(),
        });
    }
    let provenance = fields.next().filter(|p| !p.is_empty()).map(String::from);
    Ok(Some((title_key(original), canonical.to_string(), provenance)))
}

/// Read every well-formed row. A missing file is empty; malformed lines are logged and skipped.
fn read_rows(path: &Path) -> Result<Vec<Row>> {
    if !path.exists() {
        debug!(path = %path.display(), "Mapping file not found, starting empty");
        return Ok(Vec::new());
    }
    let text = std::fs::read_to_string(path)?;
    let mut rows = Vec::new();
    for (i, line) in text.lines().enumerate() {
        match parse_row(path, i + 1, line) {
            Ok(Some(row)) => rows.push(row),
            Ok(None) => {}
            Err(e) => warn!("{}", e),
        }
    }
    Ok(rows)
}

// ============================================================================
// Corrections Store
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correction {
    pub canonical: String,
    pub provenance: String,
}

/// Persistent raw→canonical mapping consulted before fuzzy scoring.
#[derive(Debug, Default)]
pub struct CorrectionsStore {
    path: Option<PathBuf>,
    entries: FxHashMap<String, Correction>,
    pending: Vec<(String, Correction)>,
}

impl CorrectionsStore {
    /// Store that is never persisted (trial runs, tests).
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let mut entries = FxHashMap::default();
        for (key, canonical, provenance) in read_rows(path)? {
            // Later lines win: the file is append-only
            entries.insert(
                key,
                Correction {
                    canonical,
                    provenance: provenance.unwrap_or_else(|| PROVENANCE_LEARNED.to_string()),
                },
            );
        }
        debug!(path = %path.display(), corrections = entries.len(), "Loaded corrections");
        Ok(Self {
            path: Some(path.to_path_buf()),
            entries,
            pending: Vec::new(),
        })
    }

    /// Keep the loaded entries but never write back (trial runs).
    pub fn detached(mut self) -> Self {
        self.path = None;
        self
    }

    /// Look up a title; the argument is normalized with `title_key`.
    pub fn lookup(&self, title: &str) -> Option<&str> {
        self.entries
            .get(&title_key(title))
            .map(|c| c.canonical.as_str())
    }

    pub fn contains(&self, title: &str) -> bool {
        self.entries.contains_key(&title_key(title))
    }

    /// Record a confirmed mapping. Returns false if the title is already known.
    pub fn learn(&mut self, raw: &str, canonical: &str, provenance: &str) -> bool {
        let key = title_key(raw);
        if key.is_empty() || self.entries.contains_key(&key) {
            return false;
        }
        let correction = Correction {
            canonical: canonical.to_string(),
            provenance: provenance.to_string(),
        };
        self.entries.insert(key.clone(), correction.clone());
        self.pending.push((key, correction));
        true
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append pending entries to disk. Flushing with nothing pending is a no-op.
    pub fn flush(&mut self) -> Result<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }
        let count = self.pending.len();
        let Some(path) = &self.path else {
            self.pending.clear();
            return Ok(count);
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let needs_header = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        if needs_header {
            writeln!(file, "{}", CORRECTIONS_HEADER)?;
        }
        for (key, correction) in &self.pending {
            writeln!(file, "{}|{}|{}", key, correction.canonical, correction.provenance)?;
        }
        file.flush()?;

        debug!(path = %path.display(), count, "Flushed corrections");
        self.pending.clear();
        Ok(count)
    }
}

// ============================================================================
// Extra Labels
// ============================================================================

/// Known non-song labels: "tuning" → "Tuning", "crowd noise" → "Crowd".
#[derive(Debug, Default, Clone)]
pub struct ExtraLabels {
    labels: FxHashMap<String, String>,
    /// Keys sorted longest first so substring lookups prefer specific labels
    ordered: Vec<String>,
}

impl ExtraLabels {
    pub fn load(path: &Path) -> Result<Self> {
        let labels = read_rows(path)?
            .into_iter()
            .map(|(key, canonical, _)| (key, canonical))
            .collect();
        Ok(Self::from_map(labels))
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self::from_map(
            pairs
                .into_iter()
                .map(|(raw, label)| (title_key(raw), label.to_string()))
                .collect(),
        )
    }

    fn from_map(labels: FxHashMap<String, String>) -> Self {
        let mut ordered: Vec<String> = labels.keys().cloned().collect();
        ordered.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        Self { labels, ordered }
    }

    pub fn get(&self, title: &str) -> Option<&str> {
        self.labels.get(&title_key(title)).map(String::as_str)
    }

    /// First label whose key occurs inside the title
    pub fn find_within(&self, title: &str) -> Option<&str> {
        let key = title_key(title);
        self.ordered
            .iter()
            .find(|k| key.contains(k.as_str()))
            .and_then(|k| self.labels.get(k))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = CorrectionsStore::load(&dir.path().join("none.txt")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_skips_header_and_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corrections.txt");
        std::fs::write(
            &path,
            "original_title|canonical_title|source\n\
             Sugeree|Sugaree|learned\n\
             |Broken\n\
             \n\
             Not Fade Away Jam|Not Fade Away|manual\n",
        )
        .unwrap();
        let store = CorrectionsStore::load(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.lookup("SUGEREE"), Some("Sugaree"));
        assert_eq!(store.lookup("  not fade away  jam"), Some("Not Fade Away"));
    }

    #[test]
    fn test_learn_once() {
        let mut store = CorrectionsStore::in_memory();
        assert!(store.learn("Truckin'", "Truckin'", PROVENANCE_LEARNED));
        assert!(!store.learn("truckin'", "Truckin'", PROVENANCE_LEARNED));
        assert_eq!(store.pending(), 1);
        assert_eq!(store.flush().unwrap(), 1);
        assert_eq!(store.pending(), 0);
    }

    #[test]
    fn test_flush_appends_with_header_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("corrections.txt");

        let mut store = CorrectionsStore::load(&path).unwrap();
        store.learn("Me & My Uncle", "Me and My Uncle", PROVENANCE_LEARNED);
        assert_eq!(store.flush().unwrap(), 1);
        let first = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            first,
            "original_title|canonical_title|source\nme and my uncle|Me and My Uncle|learned\n"
        );

        // Nothing pending: file untouched
        assert_eq!(store.flush().unwrap(), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), first);

        store.learn("Jack-A-Roe", "Jack-A-Roe", PROVENANCE_REVIEWED);
        store.flush().unwrap();
        let reloaded = CorrectionsStore::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.lookup("Me & My Uncle"), Some("Me and My Uncle"));
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches(CORRECTIONS_HEADER).count(), 1);
    }

    #[test]
    fn test_detached_store_never_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corrections.txt");
        std::fs::write(&path, "original_title|canonical_title|source\nsugeree|Sugaree|learned\n")
            .unwrap();

        let mut store = CorrectionsStore::load(&path).unwrap().detached();
        assert_eq!(store.lookup("Sugeree"), Some("Sugaree"));
        assert!(store.learn("Jak Straw", "Jack Straw", PROVENANCE_LEARNED));
        assert_eq!(store.flush().unwrap(), 1);
        assert!(!std::fs::read_to_string(&path).unwrap().contains("Jack Straw"));
    }

    #[test]
    fn test_extra_labels() {
        let extras = ExtraLabels::from_pairs([
            ("tuning", "Tuning"),
            ("crowd", "Crowd"),
            ("band introductions", "Band Introductions"),
        ]);
        assert_eq!(extras.get("TUNING"), Some("Tuning"));
        assert_eq!(extras.get("tuning jam"), None);
        assert_eq!(extras.find_within("long tuning break"), Some("Tuning"));
        assert_eq!(
            extras.find_within("band introductions and crowd"),
            Some("Band Introductions")
        );
    }
}
