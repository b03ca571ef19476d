//! Show-level album fields.
//!
//! Every file of a show folder carries the same ARTIST, ALBUMARTIST, ALBUM,
//! GENRE, DATE and VERSION. Album names follow the archive convention
//! `1977-05-08  Barton Hall, Ithaca, NY`, with ` (Early)` or ` (Late)` after
//! the date for doubled shows.

use crate::models::{AlbumInfo, ShowInfo};
use crate::reference::{ShowQuery, ShowTime};

pub const DEFAULT_GENRE: &str = "GD";

// ============================================================================
// Recording Identification
// ============================================================================

/// Folder-name substrings per source type, checked in order.
const SOURCE_PATTERNS: [(&str, &[&str]); 9] = [
    ("sbd", &["sbd"]),
    ("aud", &["aud", "nak", "sony", "akg", "senn"]),
    ("fm", &["fm"]),
    ("tv", &["tv"]),
    ("fob", &["fob"]),
    ("studio", &["studio"]),
    ("gmb", &["gmb"]),
    ("pa", &[".pa.", "-pa-", "_pa_", "pa."]),
    ("mtx", &["mtx", "matrix"]),
];

/// What the folder name says about the recording itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordingInfo {
    pub source: Option<&'static str>,
    /// Archive show id, a dot-separated number above 1000
    pub shnid: Option<u64>,
    /// Charlie Miller transfer
    pub miller: bool,
}

impl RecordingInfo {
    pub fn from_folder_name(folder_name: &str) -> Self {
        Self {
            source: detect_source_type(folder_name),
            shnid: parse_shnid(folder_name),
            miller: folder_name.to_lowercase().contains("miller"),
        }
    }
}

pub fn detect_source_type(folder_name: &str) -> Option<&'static str> {
    let lower = folder_name.to_lowercase();
    SOURCE_PATTERNS
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|p| lower.contains(p)))
        .map(|(source, _)| *source)
}

pub fn parse_shnid(folder_name: &str) -> Option<u64> {
    folder_name
        .split('.')
        .filter_map(|part| part.trim().parse::<u64>().ok())
        .find(|n| *n > 1000)
}

// ============================================================================
// Album Fields
// ============================================================================

/// `YYYY-MM-DD[ (Early)| (Late)]  Venue, City, State`; country stands in
/// for the state outside the US.
pub fn build_album_name(query: &ShowQuery, show: &ShowInfo) -> String {
    let suffix = match query.show_time {
        Some(ShowTime::Early) => " (Early)",
        Some(ShowTime::Late) => " (Late)",
        None => "",
    };
    let region = show.state.as_deref().or(show.country.as_deref());
    let place: Vec<&str> = [Some(show.venue.as_str()), Some(show.city.as_str()), region]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    format!("{}{}  {}", show_date(query), suffix, place.join(", "))
        .trim()
        .to_string()
}

fn show_date(query: &ShowQuery) -> String {
    format!("{:04}-{:02}-{:02}", query.year, query.month, query.day)
}

pub fn default_artist(gd: i64) -> &'static str {
    if gd == 1 {
        "Grateful Dead"
    } else {
        "Jerry Garcia"
    }
}

/// Album fields for a folder. Without a known show the folder name is the
/// album and DATE is left alone.
pub fn album_info(
    folder_name: &str,
    query: Option<&ShowQuery>,
    show: Option<&ShowInfo>,
    gd: i64,
) -> AlbumInfo {
    match (query, show) {
        (Some(query), Some(show)) => AlbumInfo {
            artist: show.artist.clone(),
            album: build_album_name(query, show),
            genre: DEFAULT_GENRE.to_string(),
            date: Some(show_date(query)),
            version: folder_name.to_string(),
        },
        _ => AlbumInfo {
            artist: default_artist(gd).to_string(),
            album: folder_name.to_string(),
            genre: DEFAULT_GENRE.to_string(),
            date: None,
            version: folder_name.to_string(),
        },
    }
}

// ============================================================================
// TESTS
// ============================================================================
