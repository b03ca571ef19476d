//! Parser for the setlist text files that accompany show recordings.
//!
//! Supported track line formats:
//! - `d1t01 - Song Name`
//! - `01. Song Name`, `01) Song Name`, `01 - Song Name`
//! - `01   Song Name`
//! - `Track 01: Song Name`
//! - `t01 Song Name`
//!
//! Disc headers (`Disc 2`, `CD 2`, a bare `d2`) or any `d#t##` line switch the
//! mapping to disc-qualified keys. Set headers (`Set 1`, `Set II`,
//! `Second Set`, `Encore`, `E:`) are tracked for the segue report.

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;
use crate::models::TrackKey;
use crate::normalize::clean_title;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

static DISC_TRACK_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^d(\d{1,2})\s*t(\d{1,3})\b[\s\-–—.:)]*(.+)$").unwrap()
});

static TRACK_WORD_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^track\s*(\d{1,3})\s*[:.\-–—)]\s*(.+)$").unwrap());

static T_PREFIX_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^t(\d{1,3})\s*[.\-–—:)]?\s+(.+)$").unwrap());

static NUMBERED_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,3})\s*[.)\-–—:]\s*(.+)$").unwrap());

static SPACED_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,3})\s+(.+)$").unwrap());

static DISC_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:(?:disc|disk|cd)\s*#?\s*(\d{1,2})\b.*|d(\d{1,2})\s*:?)$").unwrap()
});

static SET_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:set\s*[#:]?\s*(\d+|[ivx]+)|(first|second|third)\s+set|(encore)\s*:?\s*\d*|e\s*:)\s*:?\s*$",
    )
    .unwrap()
});

/// Metadata and technical lines that never carry a track title
static SKIP_LINE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^[-=~*_]{3,}").unwrap(),
        Regex::new(r"(?i)^(?:source|taper|lineage|location|equipment)\s*:").unwrap(),
        Regex::new(r"(?i)^notes?\s*:").unwrap(),
        Regex::new(r"(?i)^gen(?:eration)?\s*:").unwrap(),
        Regex::new(r"(?i)^patch(?:ed)?\s*:").unwrap(),
        Regex::new(r"(?i)^(?:transfer|recorded|seeded|runtime|shnid)\b").unwrap(),
        Regex::new(r"(?i)^(?:shn|flac|etree)\b").unwrap(),
        Regex::new(r"(?i)^total\s+time").unwrap(),
        Regex::new(r"^\d+:\d+:\d+").unwrap(),
        Regex::new(r"(?i)^(?:https?://|www\.|archive\.org)").unwrap(),
        Regex::new(r"(?i)^\(?\s*\d{1,3}\.\d\s*MB\s*\)?").unwrap(),
        Regex::new(r"(?i)\.(?:flac|shn|mp3)\b").unwrap(),
        Regex::new(r"(?i)^[0-9a-f]{32}\s").unwrap(),
        Regex::new(r":[a-f0-9]{32}").unwrap(),
        Regex::new(r"\*\d{2}\s").unwrap(),
        Regex::new(r"\b\d+\s+B\b").unwrap(),
        Regex::new(r"(?i)\bcdr\b.*\bflac\b").unwrap(),
        Regex::new(r"(?i)\blength\b.*\bexpanded\b.*\bsize\b").unwrap(),
        Regex::new(r"(?i)^\(\d+\s+files?\)").unwrap(),
        Regex::new(r"(?i)^\d+\s+bit\b").unwrap(),
        Regex::new(r"(?i)\bbit\s+\d+\s*khz").unwrap(),
        Regex::new(r"(?i)^set\s*break\s*$").unwrap(),
        Regex::new(r"^\s*\d{1,2}:\d{2}\.\d+\s+\d").unwrap(),
    ]
});

/// Short technical tokens matched on word boundaries ("flac2496" is not "flac24")
static TECHNICAL_NAME_WORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:ffp|md5|sha256|sha1|flac16|flac24)\b").unwrap());

const TECHNICAL_NAME_PARTS: [&str; 4] = ["fingerprint", "checksum", "shntool", "shninfo"];
const PREFERRED_NAME_PARTS: [&str; 4] = ["info", "track", "list", "set"];

// ============================================================================
// File Discovery
// ============================================================================

fn is_technical_txt(name: &str) -> bool {
    let lower = name.to_lowercase();
    TECHNICAL_NAME_PARTS.iter().any(|p| lower.contains(p)) || TECHNICAL_NAME_WORDS.is_match(name)
}

/// Find the setlist text file of a show folder, skipping checksum and fingerprint files.
pub fn find_txt_file(folder: &Path) -> Result<Option<PathBuf>> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(folder)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"))
        })
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| !is_technical_txt(n))
        })
        .collect();
    candidates.sort();

    for part in PREFERRED_NAME_PARTS {
        let preferred = candidates.iter().find(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.to_lowercase().contains(part))
        });
        if let Some(path) = preferred {
            return Ok(Some(path.clone()));
        }
    }
    Ok(candidates.into_iter().next())
}

// ============================================================================
// Parsed Mapping
// ============================================================================

/// Key of a text entry: plain track number, or disc-qualified when the
/// text exposes disc boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextKey {
    Track(u32),
    DiscTrack(u32, u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEntry {
    pub key: TextKey,
    /// Title as written, segue markers included
    pub raw: String,
    /// Set number from the nearest set header (1 when there are none)
    pub set: u32,
    pub is_encore: bool,
    pub has_segue: bool,
}

/// Track-number → raw title mapping built from one setlist text file.
#[derive(Debug, Clone, Default)]
pub struct SetlistText {
    entries: Vec<TextEntry>,
    index: FxHashMap<TextKey, usize>,
    disc_structured: bool,
}

enum Line<'a> {
    Disc(u32),
    Set { number: u32, encore: bool },
    Track { disc: Option<u32>, track: u32, title: &'a str },
    Other,
}

fn roman_to_number(s: &str) -> Option<u32> {
    match s.to_lowercase().as_str() {
        "i" => Some(1),
        "ii" => Some(2),
        "iii" => Some(3),
        "iv" => Some(4),
        "v" => Some(5),
        _ => None,
    }
}

fn has_letter(s: &str) -> bool {
    s.chars().any(char::is_alphabetic)
}

fn classify(line: &str) -> Line<'_> {
    if let Some(caps) = SET_HEADER.captures(line) {
        if caps.get(3).is_some() || caps.get(1).is_none() && caps.get(2).is_none() {
            return Line::Set {
                number: 0,
                encore: true,
            };
        }
        if let Some(ordinal) = caps.get(2) {
            let number = match ordinal.as_str().to_lowercase().as_str() {
                "second" => 2,
                "third" => 3,
                _ => 1,
            };
            return Line::Set {
                number,
                encore: false,
            };
        }
        if let Some(n) = caps.get(1) {
            let text = n.as_str();
            if let Some(number) = text.parse().ok().or_else(|| roman_to_number(text)) {
                return Line::Set {
                    number,
                    encore: false,
                };
            }
        }
    }
    if let Some(caps) = DISC_HEADER.captures(line) {
        let disc = caps.get(1).or_else(|| caps.get(2)).and_then(|m| m.as_str().parse().ok());
        if let Some(disc) = disc {
            return Line::Disc(disc);
        }
    }
    if let Some(caps) = DISC_TRACK_LINE.captures(line) {
        let title = caps.get(3).map_or("", |m| m.as_str().trim());
        if let (Ok(disc), Ok(track)) = (caps[1].parse(), caps[2].parse()) {
            if has_letter(title) && !is_skip_line(title) {
                return Line::Track {
                    disc: Some(disc),
                    track,
                    title,
                };
            }
        }
        return Line::Other;
    }
    if is_skip_line(line) {
        return Line::Other;
    }
    for pattern in [&*TRACK_WORD_LINE, &*T_PREFIX_LINE, &*NUMBERED_LINE, &*SPACED_LINE] {
        if let Some(caps) = pattern.captures(line) {
            let title = caps.get(2).map_or("", |m| m.as_str().trim());
            if let Ok(track) = caps[1].parse() {
                if has_letter(title) {
                    return Line::Track {
                        disc: None,
                        track,
                        title,
                    };
                }
            }
            return Line::Other;
        }
    }
    Line::Other
}

fn is_skip_line(line: &str) -> bool {
    SKIP_LINE_PATTERNS.iter().any(|p| p.is_match(line))
}

impl SetlistText {
    pub fn parse(content: &str) -> Self {
        let lines: Vec<(usize, Line)> = content
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l.trim()))
            .filter(|(_, l)| !l.is_empty())
            .map(|(i, l)| (i, classify(l)))
            .collect();

        let disc_structured = lines.iter().any(|(_, l)| {
            matches!(l, Line::Disc(_) | Line::Track { disc: Some(_), .. })
        });

        let mut text = SetlistText {
            disc_structured,
            ..Default::default()
        };
        let mut current_disc = 1;
        let mut current_set = 1;
        let mut max_set = 0;
        let mut in_encore = false;

        for (line_no, line) in lines {
            match line {
                Line::Disc(disc) => current_disc = disc,
                Line::Set { number, encore } => {
                    if encore {
                        in_encore = true;
                        current_set = max_set.max(current_set) + 1;
                    } else {
                        in_encore = false;
                        current_set = number;
                        max_set = max_set.max(number);
                    }
                }
                Line::Track { disc, track, title } => {
                    let key = if disc_structured {
                        let disc = disc.unwrap_or(current_disc);
                        current_disc = disc;
                        TextKey::DiscTrack(disc, track)
                    } else {
                        TextKey::Track(track)
                    };
                    if text.index.contains_key(&key) {
                        debug!(line = line_no, ?key, "Duplicate track key in setlist text, keeping first");
                        continue;
                    }
                    text.index.insert(key, text.entries.len());
                    text.entries.push(TextEntry {
                        key,
                        raw: title.to_string(),
                        set: current_set.max(1),
                        is_encore: in_encore,
                        has_segue: clean_title(title).has_segue,
                    });
                }
                Line::Other => {}
            }
        }
        text
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self::parse(&String::from_utf8_lossy(&bytes)))
    }

    pub fn is_disc_structured(&self) -> bool {
        self.disc_structured
    }

    pub fn entries(&self) -> &[TextEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for a file key. With disc structure only the exact disc/track key
    /// matches; another disc's entry for the same track number is never used.
    pub fn lookup(&self, key: &TrackKey) -> Option<&TextEntry> {
        let text_key = if self.disc_structured {
            TextKey::DiscTrack(key.disc?, key.track)
        } else {
            TextKey::Track(key.track)
        };
        self.index.get(&text_key).map(|&i| &self.entries[i])
    }

    /// Raw title for a file key
    pub fn raw_title(&self, key: &TrackKey) -> Option<&str> {
        self.lookup(key).map(|e| e.raw.as_str())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DISC_TEXT: &str = "\
Grateful Dead
Barton Hall, Cornell University
1977-05-08

Source: SBD > Reel > DAT
Lineage: DAT > CD > EAC > FLAC

Disc 1
Set 1
01. New Minglewood Blues
02. Loser
10. Jack Straw

Disc 2
Set 2
01. Scarlet Begonias ->
02. Fire on the Mountain
Encore:
03. One More Saturday Night

gd77-05-08d1t01.flac:e0129245cbbe36646809993036a6e6a7
";

    #[test]
    fn test_disc_structured_parse() {
        let text = SetlistText::parse(DISC_TEXT);
        assert!(text.is_disc_structured());
        assert_eq!(text.len(), 6);
        assert_eq!(
            text.raw_title(&TrackKey::new(Some(1), 10)),
            Some("Jack Straw")
        );
        let scarlet = text.lookup(&TrackKey::new(Some(2), 1)).unwrap();
        assert_eq!(scarlet.raw, "Scarlet Begonias ->");
        assert!(scarlet.has_segue);
        assert_eq!(scarlet.set, 2);

        let encore = text.lookup(&TrackKey::new(Some(2), 3)).unwrap();
        assert!(encore.is_encore);
        assert_eq!(encore.set, 3);
    }

    #[test]
    fn test_no_cross_disc_leak() {
        let text = SetlistText::parse(DISC_TEXT);
        assert!(text.lookup(&TrackKey::new(Some(1), 10)).is_some());
        assert!(text.lookup(&TrackKey::new(Some(2), 10)).is_none());
        // Disc-less keys never fall back to some disc
        assert!(text.lookup(&TrackKey::new(None, 1)).is_none());
    }

    #[test]
    fn test_disc_track_lines() {
        let text = SetlistText::parse(
            "d1t01 - Bertha\nd1t02 - Greatest Story Ever Told >\nd2t01 - Dark Star\n",
        );
        assert!(text.is_disc_structured());
        assert_eq!(text.raw_title(&TrackKey::new(Some(1), 2)), Some("Greatest Story Ever Told >"));
        assert_eq!(text.raw_title(&TrackKey::new(Some(2), 1)), Some("Dark Star"));
        assert_eq!(text.raw_title(&TrackKey::new(Some(2), 2)), None);
    }

    #[test]
    fn test_plain_formats() {
        let text = SetlistText::parse(
            "Set I\n\
             01. Sugaree\n\
             2) Deal\n\
             03 - Tennessee Jed\n\
             04   Playing in the Band\n\
             Track 05: Ship of Fools\n\
             t06 Morning Dew\n\
             07 1:27.960 50665004\n\
             Second Set\n\
             08 Truckin'\n",
        );
        assert!(!text.is_disc_structured());
        assert_eq!(text.len(), 7);
        assert_eq!(text.raw_title(&TrackKey::new(None, 2)), Some("Deal"));
        assert_eq!(text.raw_title(&TrackKey::new(None, 5)), Some("Ship of Fools"));
        assert_eq!(text.raw_title(&TrackKey::new(None, 6)), Some("Morning Dew"));
        assert_eq!(text.raw_title(&TrackKey::new(None, 7)), None);
        // Plain keys are valid across the whole folder
        assert_eq!(text.raw_title(&TrackKey::new(Some(2), 8)), Some("Truckin'"));
        assert_eq!(text.lookup(&TrackKey::new(None, 8)).unwrap().set, 2);
        assert_eq!(text.lookup(&TrackKey::new(None, 1)).unwrap().set, 1);
    }

    #[test]
    fn test_skips_metadata_and_duplicates() {
        let text = SetlistText::parse(
            "24 bit 96 kHz\n\
             01. Bertha\n\
             01. Bertha (second copy)\n\
             02. gd77-05-08d1t02.flac\n\
             1977-05-08\n",
        );
        assert_eq!(text.len(), 1);
        assert_eq!(text.raw_title(&TrackKey::new(None, 1)), Some("Bertha"));
    }

    #[test]
    fn test_find_txt_file() {
        let dir = TempDir::new().unwrap();
        for name in ["gd77.ffp.txt", "gd77.md5.txt", "fingerprint.txt", "notes.txt", "gd77-info.txt"] {
            std::fs::write(dir.path().join(name), "x").unwrap();
        }
        let found = find_txt_file(dir.path()).unwrap().unwrap();
        assert_eq!(found.file_name().unwrap(), "gd77-info.txt");

        std::fs::remove_file(dir.path().join("gd77-info.txt")).unwrap();
        let found = find_txt_file(dir.path()).unwrap().unwrap();
        assert_eq!(found.file_name().unwrap(), "notes.txt");
    }

    #[test]
    fn test_find_txt_file_word_boundaries() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("show.flac2496.txt"), "x").unwrap();
        std::fs::write(dir.path().join("show.flac24.txt"), "x").unwrap();
        let found = find_txt_file(dir.path()).unwrap().unwrap();
        assert_eq!(found.file_name().unwrap(), "show.flac2496.txt");
    }
}
