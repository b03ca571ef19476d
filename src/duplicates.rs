//! Duplicate auditor.
//!
//! Flags songs that resolve more often in a folder than either the reference
//! setlist or the setlist text says they were played. Advisory only.

use rustc_hash::FxHashMap;
use std::fmt;
use std::path::PathBuf;

use crate::models::{Resolution, TrackFile};
use crate::normalize::{clean_title, title_key};
use crate::reference::ReferenceSetlist;
use crate::setlist_txt::SetlistText;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateWarning {
    pub title: String,
    pub observed: usize,
    pub expected_reference: usize,
    pub expected_text: usize,
    pub files: Vec<PathBuf>,
}

impl fmt::Display for DuplicateWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' resolved {} times (reference lists {}, text lists {}): {}",
            self.title,
            self.observed,
            self.expected_reference,
            self.expected_text,
            self.files
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

/// Entries of the text mapping whose cleaned title is this song
fn text_count(text: &SetlistText, key: &str) -> usize {
    text.entries()
        .iter()
        .filter(|e| title_key(&clean_title(&e.raw).text) == key)
        .count()
}

/// Audit resolved songs. `files` and `resolutions` are parallel, in physical order.
pub fn audit_duplicates(
    files: &[TrackFile],
    resolutions: &[Resolution],
    reference: &ReferenceSetlist,
    text: &SetlistText,
) -> Vec<DuplicateWarning> {
    let mut groups: FxHashMap<String, (String, Vec<PathBuf>)> = FxHashMap::default();
    let mut order: Vec<String> = Vec::new();

    for (file, resolution) in files.iter().zip(resolutions) {
        let Some(song) = resolution.song() else {
            continue;
        };
        let key = title_key(song);
        let entry = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            (song.to_string(), Vec::new())
        });
        entry.1.push(file.path.clone());
    }

    order
        .into_iter()
        .filter_map(|key| {
            let (title, paths) = groups.remove(&key)?;
            if paths.len() < 2 {
                return None;
            }
            let expected_reference = reference.count_of(&title);
            let expected_text = text_count(text, &key);
            if paths.len() <= expected_reference.max(expected_text) {
                return None;
            }
            Some(DuplicateWarning {
                title,
                observed: paths.len(),
                expected_reference,
                expected_text,
                files: paths,
            })
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
