//! Setlist text versus reference setlist.
//!
//! Lists where a show's text file and the reference database disagree:
//! songs only one side has, fuzzy name differences, songs filed under a
//! different set, and common songs in a different order. Extras (tuning,
//! banter) are ignored on the text side. Findings are appended to a report
//! with one `# folder` header per show.
//!
//! Sets are compared by rank: reference discs are the 1-based rank of each
//! set in show order, text sets come from `Set`/`Encore` headers.

use rustc_hash::FxHashSet;
use std::fmt;
use std::path::Path;

use crate::corrections::CorrectionsStore;
use crate::error::Result;
use crate::matcher::SongMatcher;
use crate::models::{MatchResult, MatchSource};
use crate::normalize::title_key;
use crate::reference::ReferenceSetlist;
use crate::review::append_lines;
use crate::setlist_txt::{SetlistText, TextEntry};

const ORDER_PREVIEW: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discrepancy {
    MissingFromText {
        title: String,
        set: u32,
    },
    MissingFromReference {
        raw: String,
        /// Song the text line matched, None when it matched nothing
        matched: Option<String>,
        set: u32,
    },
    NameDiff {
        raw: String,
        matched: String,
        confidence: u8,
    },
    SetAssignment {
        title: String,
        text_set: u32,
        reference_sets: Vec<u32>,
    },
    SongOrder {
        /// None when the text has no set headers and the whole show is compared
        set: Option<u32>,
        reference: Vec<String>,
        text: Vec<String>,
    },
}

impl Discrepancy {
    pub fn kind(&self) -> &'static str {
        match self {
            Discrepancy::MissingFromText { .. } => "song_missing_from_txt",
            Discrepancy::MissingFromReference { .. } => "song_missing_from_db",
            Discrepancy::NameDiff { .. } => "song_name_diff",
            Discrepancy::SetAssignment { .. } => "set_assignment",
            Discrepancy::SongOrder { .. } => "song_order",
        }
    }
}

fn preview(titles: &[String]) -> String {
    let mut shown = titles
        .iter()
        .take(ORDER_PREVIEW)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" / ");
    if titles.len() > ORDER_PREVIEW {
        shown.push_str("...");
    }
    shown
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|", self.kind())?;
        match self {
            Discrepancy::MissingFromText { title, set } => {
                write!(f, "Song in reference but not in txt: {} (Set {})", title, set)
            }
            Discrepancy::MissingFromReference {
                raw,
                matched: Some(matched),
                set,
            } => write!(
                f,
                "Song in txt but not in reference setlist: '{}' (matched as '{}', Set {})",
                raw, matched, set
            ),
            Discrepancy::MissingFromReference {
                raw,
                matched: None,
                set,
            } => write!(
                f,
                "Song in txt but not in reference setlist (unmatched): '{}' (Set {})",
                raw, set
            ),
            Discrepancy::NameDiff {
                raw,
                matched,
                confidence,
            } => write!(
                f,
                "Fuzzy match ({}%): txt '{}' -> reference '{}'",
                confidence, raw, matched
            ),
            Discrepancy::SetAssignment {
                title,
                text_set,
                reference_sets,
            } => {
                let sets: Vec<String> = reference_sets.iter().map(u32::to_string).collect();
                write!(
                    f,
                    "'{}': txt says Set {}, reference says Set {}",
                    title,
                    text_set,
                    sets.join("/")
                )
            }
            Discrepancy::SongOrder {
                set,
                reference,
                text,
            } => {
                match set {
                    Some(set) => write!(f, "Set {} order differs", set)?,
                    None => write!(f, "Show order differs")?,
                }
                write!(f, ": reference {} | txt {}", preview(reference), preview(text))
            }
        }
    }
}

// ============================================================================
// Comparison
// ============================================================================

struct TextSong<'a> {
    entry: &'a TextEntry,
    result: MatchResult,
}

impl TextSong<'_> {
    /// Canonical title, spelled as the reference spells it when listed there
    fn title<'r>(&'r self, reference: &'r ReferenceSetlist) -> Option<&'r str> {
        self.result
            .song()
            .map(|song| reference.canonical(song).unwrap_or(song))
    }
}

/// Compare one show's text against its reference setlist. Nothing is
/// reported when either side is empty.
pub fn compare_setlists(
    text: &SetlistText,
    reference: &ReferenceSetlist,
    matcher: &SongMatcher,
    corrections: &CorrectionsStore,
) -> Vec<Discrepancy> {
    if text.is_empty() || reference.is_empty() {
        return Vec::new();
    }

    let songs: Vec<TextSong> = text
        .entries()
        .iter()
        .map(|entry| TextSong {
            entry,
            result: matcher.match_title(&entry.raw, corrections, reference),
        })
        .filter(|song| !song.result.is_extra())
        .collect();
    let text_keys: FxHashSet<String> = songs
        .iter()
        .filter_map(|s| s.result.song())
        .map(title_key)
        .collect();

    let mut found = Vec::new();

    for (i, song) in reference.songs().iter().enumerate() {
        if !text_keys.contains(&title_key(&song.title)) {
            found.push(Discrepancy::MissingFromText {
                title: song.title.clone(),
                set: reference.disc_at(i).unwrap_or(1),
            });
        }
    }

    for song in &songs {
        match song.result.song() {
            Some(title) if reference.contains(title) => {}
            matched => found.push(Discrepancy::MissingFromReference {
                raw: song.entry.raw.clone(),
                matched: matched.map(str::to_string),
                set: song.entry.set,
            }),
        }
    }

    for song in &songs {
        if song.result.source == MatchSource::Fuzzy && song.result.confidence < 100 {
            if let Some(matched) = song.result.song() {
                found.push(Discrepancy::NameDiff {
                    raw: song.entry.raw.clone(),
                    matched: matched.to_string(),
                    confidence: song.result.confidence,
                });
            }
        }
    }

    // Without set headers every text entry sits in set 1
    let has_sets = songs.iter().any(|s| s.entry.set > 1 || s.entry.is_encore);
    if has_sets {
        for song in &songs {
            let Some(title) = song.title(reference) else {
                continue;
            };
            let reference_sets = reference.discs_for(title);
            if !reference_sets.is_empty() && !reference_sets.contains(&song.entry.set) {
                found.push(Discrepancy::SetAssignment {
                    title: title.to_string(),
                    text_set: song.entry.set,
                    reference_sets,
                });
            }
        }
    }

    let scopes: Vec<Option<u32>> = if has_sets {
        (1..=reference.disc_count())
            .filter(|disc| songs.iter().any(|s| s.entry.set == *disc))
            .map(Some)
            .collect()
    } else {
        vec![None]
    };
    for set in scopes {
        let reference_order: Vec<String> = reference
            .songs()
            .iter()
            .enumerate()
            .filter(|(i, _)| set.is_none() || reference.disc_at(*i) == set)
            .map(|(_, s)| s.title.clone())
            .collect();
        let text_order: Vec<String> = songs
            .iter()
            .filter(|s| set.is_none() || Some(s.entry.set) == set)
            .filter_map(|s| s.title(reference))
            .map(str::to_string)
            .collect();
        if let Some(order) = song_order(set, reference_order, text_order) {
            found.push(order);
        }
    }

    found
}

/// Order of the songs both sides list, None when it agrees.
fn song_order(set: Option<u32>, reference: Vec<String>, text: Vec<String>) -> Option<Discrepancy> {
    let reference_keys: FxHashSet<String> = reference.iter().map(|t| title_key(t)).collect();
    let text_keys: FxHashSet<String> = text.iter().map(|t| title_key(t)).collect();

    let common_reference: Vec<String> = reference
        .into_iter()
        .filter(|t| text_keys.contains(&title_key(t)))
        .collect();
    let common_text: Vec<String> = text
        .into_iter()
        .filter(|t| reference_keys.contains(&title_key(t)))
        .collect();

    let keys = |titles: &[String]| titles.iter().map(|t| title_key(t)).collect::<Vec<_>>();
    if common_reference.is_empty() || keys(&common_reference) == keys(&common_text) {
        return None;
    }
    Some(Discrepancy::SongOrder {
        set,
        reference: common_reference,
        text: common_text,
    })
}

pub fn append_discrepancy_report(path: &Path, folder: &Path, found: &[Discrepancy]) -> Result<()> {
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
