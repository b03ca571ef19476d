//! Core data models for setlist reconciliation.
//!
//! This module contains the struct definitions and enums shared by the
//! matcher, the arbitration policy, the assigner and the reports.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

// ============================================================================
// Track Files
// ============================================================================

/// Disc/track identity parsed from a file name ("gd77-05-08d2t03.flac").
/// `disc` is None for names that only carry a track number ("t03", "03 ...").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackKey {
    pub disc: Option<u32>,
    pub track: u32,
}

impl TrackKey {
    pub fn new(disc: Option<u32>, track: u32) -> Self {
        Self { disc, track }
    }
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.disc {
            Some(disc) => write!(f, "d{}t{:02}", disc, self.track),
            None => write!(f, "t{:02}", self.track),
        }
    }
}

/// One audio file of a show folder, immutable once enumerated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackFile {
    pub path: PathBuf,
    pub key: Option<TrackKey>,
    pub existing_title: Option<String>,
    /// Position in file-name order within the folder
    pub ordinal: usize,
}

impl TrackFile {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

// ============================================================================
// Reference Models
// ============================================================================

/// One performed song from the reference setlist, in show order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSong {
    pub title: String,
    /// Set ordinal as stored in the database (not necessarily 1-based)
    pub set_seq: u32,
    pub set_name: String,
    pub song_seq: u32,
    pub segue: bool,
    pub encore: bool,
}

/// Act and venue of a show.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShowInfo {
    pub artist: String,
    pub venue: String,
    pub city: String,
    pub state: Option<String>,
    pub country: Option<String>,
}

// ============================================================================
// Matcher Output
// ============================================================================

/// Which matcher tier produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    Exact,
    Learned,
    Extra,
    Fuzzy,
    Unmatched,
}

impl MatchSource {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchSource::Exact => "exact",
            MatchSource::Learned => "learned",
            MatchSource::Extra => "extra",
            MatchSource::Fuzzy => "fuzzy",
            MatchSource::Unmatched => "unmatched",
        }
    }
}

/// Result of matching one raw title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub original: String,
    pub cleaned: String,
    /// Canonical song or extra label; None when below the review band
    pub matched: Option<String>,
    /// Best fuzzy candidate regardless of band, kept for low-confidence surfacing
    pub candidate: Option<String>,
    pub confidence: u8,
    pub source: MatchSource,
    pub has_segue: bool,
    pub needs_review: bool,
    pub suspicious: bool,
}

impl MatchResult {
    pub fn is_extra(&self) -> bool {
        self.source == MatchSource::Extra
    }

    /// Canonical song title, if this result names a song (not an extra label)
    pub fn song(&self) -> Option<&str> {
        match self.source {
            MatchSource::Exact | MatchSource::Learned | MatchSource::Fuzzy => {
                self.matched.as_deref()
            }
            MatchSource::Extra | MatchSource::Unmatched => None,
        }
    }
}

// ============================================================================
// Per-file Resolution
// ============================================================================

/// Which source won arbitration for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    ExistingTag,
    ExistingTagLowConfidence,
    TextFile,
    ReferencePosition,
    NoTextMapping,
    Unmatched,
}

impl ResolutionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ResolutionSource::ExistingTag => "existing tag",
            ResolutionSource::ExistingTagLowConfidence => "existing tag, low confidence",
            ResolutionSource::TextFile => "text file",
            ResolutionSource::ReferencePosition => "reference position",
            ResolutionSource::NoTextMapping => "no text mapping",
            ResolutionSource::Unmatched => "unmatched",
        }
    }
}

/// The title that won arbitration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Winner {
    /// Canonical song from the vocabulary
    Song(String),
    /// Non-song label (tuning, crowd, banter)
    Extra(String),
    /// Cleaned raw text that matched nothing
    Raw(String),
    None,
}

impl Winner {
    pub fn song(&self) -> Option<&str> {
        match self {
            Winner::Song(title) => Some(title),
            _ => None,
        }
    }

    pub fn is_extra(&self) -> bool {
        matches!(self, Winner::Extra(_))
    }
}

/// Terminal per-file decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub winner: Winner,
    pub source: ResolutionSource,
    pub confidence: u8,
    pub needs_review: bool,
    pub has_segue: bool,
    /// Matcher output behind the decision, if the matcher ran
    pub matched: Option<MatchResult>,
}

impl Resolution {
    pub fn unmatched(matched: Option<MatchResult>) -> Self {
        Self {
            winner: Winner::None,
            source: ResolutionSource::Unmatched,
            confidence: 0,
            needs_review: false,
            has_segue: false,
            matched,
        }
    }

    /// Build a resolution from a matcher result accepted by `source`.
    /// Unmatched text is kept as the cleaned raw title.
    pub fn from_match(result: MatchResult, source: ResolutionSource) -> Self {
        let winner = match (result.source, &result.matched) {
            (MatchSource::Extra, Some(label)) => Winner::Extra(label.clone()),
            (_, Some(song)) => Winner::Song(song.clone()),
            (_, None) if !result.cleaned.is_empty() => Winner::Raw(result.cleaned.clone()),
            _ => Winner::None,
        };
        Self {
            winner,
            source,
            confidence: result.confidence,
            needs_review: result.needs_review,
            has_segue: result.has_segue,
            matched: Some(result),
        }
    }

    pub fn song(&self) -> Option<&str> {
        self.winner.song()
    }

    pub fn is_extra(&self) -> bool {
        self.winner.is_extra()
    }
}

// ============================================================================
// Output Models
// ============================================================================

/// Show-level fields shared by every file of a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumInfo {
    /// ARTIST and ALBUMARTIST
    pub artist: String,
    /// "1977-05-08  Barton Hall, Ithaca, NY"; the folder name when the show is unknown
    pub album: String,
    pub genre: String,
    /// DATE, only when the show was found in the reference database
    pub date: Option<String>,
    /// VERSION: the folder name, identifying the recording
    pub version: String,
}

/// Tag fields to write for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagUpdate {
    pub path: PathBuf,
    /// None leaves the existing title untouched
    pub title: Option<String>,
    pub disc: u32,
    pub disc_total: u32,
    pub track: u32,
    pub track_total: u32,
    /// None leaves the album fields untouched
    pub album: Option<AlbumInfo>,
}

// ============================================================================
// Statistics
// ============================================================================

/// Run statistics, logged as a summary and optionally written as JSON.
#[derive(Default, Debug, Clone, Serialize)]
pub struct RunStats {
    // Folders
    pub folders_seen: usize,
    pub folders_processed: usize,
    pub folders_skipped: usize,
    pub folders_failed: usize,
    pub coverage_warnings: usize,
    pub coincidental_matches: usize,

    // Files by winning source
    pub files_seen: usize,
    /// Files whose existing tag could not be read; resolved without it
    pub read_failures: usize,
    pub from_existing_tag: usize,
    pub from_existing_tag_low_confidence: usize,
    pub from_text_file: usize,
    pub from_reference_position: usize,
    pub no_text_mapping: usize,
    pub unmatched: usize,
    pub extras: usize,

    // Follow-up
    pub needs_review: usize,
    pub duplicate_warnings: usize,
    pub segue_discrepancies: usize,
    pub setlist_discrepancies: usize,
    pub corrections_learned: usize,

    // Writes
    pub files_written: usize,
    pub write_failures: usize,

    pub elapsed_seconds: f64,
}

impl RunStats {
    pub fn record(&mut self, resolution: &Resolution) {
        self.files_seen += 1;
        match resolution.source {
            ResolutionSource::ExistingTag => self.from_existing_tag += 1,
            ResolutionSource::ExistingTagLowConfidence => {
                self.from_existing_tag_low_confidence += 1
            }
            ResolutionSource::TextFile => self.from_text_file += 1,
            ResolutionSource::ReferencePosition => self.from_reference_position += 1,
            ResolutionSource::NoTextMapping => self.no_text_mapping += 1,
            ResolutionSource::Unmatched => self.unmatched += 1,
        }
        if resolution.is_extra() {
            self.extras += 1;
        }
        if resolution.needs_review {
            self.needs_review += 1;
        }
    }

    /// Log stats to stderr in JSON format
    pub fn log_phase(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            eprintln!("[STATS:{}]\n{}", phase, json);
        }
    }

    /// Write stats to a JSON file
    pub fn write_to_file(&self, path: &std::path::Path) -> crate::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
