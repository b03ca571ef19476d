//! Reference setlist lookup.
//!
//! The reference database is a read-only JerryBase SQLite file. Shows are
//! identified from the folder name: the date, an optional early/late
//! designation, and the act flag from the run configuration.

use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use rustc_hash::FxHashMap;
use std::path::Path;
use tracing::debug;

use crate::error::{Result, TaggerError};
use crate::models::{ReferenceSong, ShowInfo};
use crate::normalize::title_key;

// ============================================================================
// Show Identification
// ============================================================================

static FULL_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").unwrap());
static SHORT_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{2})-(\d{2})-(\d{2})").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowTime {
    Early,
    Late,
}

impl ShowTime {
    pub fn as_str(self) -> &'static str {
        match self {
            ShowTime::Early => "EARLY",
            ShowTime::Late => "LATE",
        }
    }
}

/// Identifies one show in the reference database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShowQuery {
    pub year: u32,
    pub month: u32,
    pub day: u32,
    /// Act flag: 1 = Grateful Dead, 0 = Jerry Garcia
    pub gd: i64,
    pub show_time: Option<ShowTime>,
}

impl ShowQuery {
    /// Build a query from a show folder name such as "gd1977-05-08.sbd.miller.flac16".
    pub fn from_folder_name(folder_name: &str, gd: i64) -> Option<Self> {
        let (year, month, day) = parse_show_date(folder_name)?;
        Some(Self {
            year,
            month,
            day,
            gd,
            show_time: detect_show_time(folder_name),
        })
    }
}

/// Extract (year, month, day) from a folder name. `YYYY-MM-DD` wins over `YY-MM-DD`;
/// two-digit years of 60 and above are 19xx.
pub fn parse_show_date(folder_name: &str) -> Option<(u32, u32, u32)> {
    let (year, month, day) = if let Some(caps) = FULL_DATE.captures(folder_name) {
        (caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?)
    } else {
        let caps = SHORT_DATE.captures(folder_name)?;
        let short: u32 = caps[1].parse().ok()?;
        let year = if short >= 60 { 1900 + short } else { 2000 + short };
        (year, caps[2].parse().ok()?, caps[3].parse().ok()?)
    };
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }
    Some((year, month, day))
}

/// Early/late designation from a folder name. Both present is ambiguous.
pub fn detect_show_time(folder_name: &str) -> Option<ShowTime> {
    let lower = folder_name.to_lowercase();
    match (lower.contains("early"), lower.contains("late")) {
        (true, false) => Some(ShowTime::Early),
        (false, true) => Some(ShowTime::Late),
        _ => None,
    }
}

// ============================================================================
// Setlist Source
// ============================================================================

/// Read-only source of canonical setlists.
pub trait SetlistSource {
    /// Ordered songs of a show, soundcheck sets excluded. Unknown shows are empty.
    fn setlist_for(&self, show: &ShowQuery) -> Result<Vec<ReferenceSong>>;

    /// Act and venue of a show, None when the source has no such show
    fn show_info(&self, _show: &ShowQuery) -> Result<Option<ShowInfo>> {
        Ok(None)
    }
}

/// JerryBase SQLite database.
pub struct JerryBase {
    conn: Connection,
}

const SETLIST_SQL: &str = "
    SELECT s.name, es.seq_no, es.name, ev_s.seq_no, ev_s.segue, es.encore
    FROM events e
    JOIN event_sets es ON e.id = es.event_id
    JOIN event_songs ev_s ON es.id = ev_s.event_set_id
    JOIN songs s ON ev_s.song_id = s.id
    JOIN acts a ON e.act_id = a.id
    WHERE e.year = ?1 AND e.month = ?2 AND e.day = ?3
      AND a.gd = ?4 AND es.soundcheck = 0
      AND (?5 IS NULL OR e.early_late = ?5)
    ORDER BY es.seq_no, ev_s.seq_no";

// Prefer the event whose early/late flag matches, else the first listed
const SHOW_SQL: &str = "
    SELECT a.name, v.name, v.city, v.state, v.country
    FROM events e
    JOIN acts a ON e.act_id = a.id
    JOIN venues v ON e.venue_id = v.id
    WHERE e.year = ?1 AND e.month = ?2 AND e.day = ?3
      AND a.gd = ?4 AND e.canceled = 0
    ORDER BY CASE WHEN e.early_late = ?5 THEN 0 ELSE 1 END, e.id
    LIMIT 1";

impl JerryBase {
    /// Open read-only. A missing or unreadable database is a fatal configuration error.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(TaggerError::Config(format!(
                "reference database not found: {}",
                path.display()
            )));
        }
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(Self { conn })
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// Every song name in the database, the matcher's vocabulary.
    pub fn canonical_titles(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM songs WHERE name IS NOT NULL ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut titles = Vec::new();
        for title in rows {
            let title = title?;
            if !title.trim().is_empty() {
                titles.push(title.trim().to_string());
            }
        }
        debug!(songs = titles.len(), "Loaded canonical titles");
        Ok(titles)
    }
}

impl SetlistSource for JerryBase {
    fn setlist_for(&self, show: &ShowQuery) -> Result<Vec<ReferenceSong>> {
        let mut stmt = self.conn.prepare_cached(SETLIST_SQL)?;
        let show_time = show.show_time.map(ShowTime::as_str);
        let rows = stmt.query_map(
            params![show.year, show.month, show.day, show.gd, show_time],
            |row| {
                let set_name: Option<String> = row.get(2)?;
                let segue: Option<i64> = row.get(4)?;
                let encore: Option<i64> = row.get(5)?;
                Ok(ReferenceSong {
                    title: row.get(0)?,
                    set_seq: row.get(1)?,
                    set_name: set_name.unwrap_or_default(),
                    song_seq: row.get(3)?,
                    segue: segue == Some(1),
                    encore: encore == Some(1),
                })
            },
        )?;
        let songs = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        debug!(
            year = show.year,
            month = show.month,
            day = show.day,
            songs = songs.len(),
            "Loaded reference setlist"
        );
        Ok(songs)
    }

    fn show_info(&self, show: &ShowQuery) -> Result<Option<ShowInfo>> {
        let mut stmt = self.conn.prepare_cached(SHOW_SQL)?;
        let show_time = show.show_time.map(ShowTime::as_str);
        let info = stmt
            .query_row(
                params![show.year, show.month, show.day, show.gd, show_time],
                |row| {
                    let venue: Option<String> = row.get(1)?;
                    let city: Option<String> = row.get(2)?;
                    let state: Option<String> = row.get(3)?;
                    let country: Option<String> = row.get(4)?;
                    Ok(ShowInfo {
                        artist: row.get(0)?,
                        venue: venue.unwrap_or_default(),
                        city: city.unwrap_or_default(),
                        state: state.filter(|s| !s.trim().is_empty()),
                        country: country.filter(|s| !s.trim().is_empty()),
                    })
                },
            )
            .optional()?;
        Ok(info)
    }
}

// ============================================================================
// Reference Setlist
// ============================================================================

/// One show's canonical setlist with key-based lookups.
///
/// Disc numbers are the 1-based rank of each set in show order, so a database
/// that numbers sets 0, 1, 2 still yields discs 1, 2, 3.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSetlist {
    songs: Vec<ReferenceSong>,
    first_position: FxHashMap<String, usize>,
    counts: FxHashMap<String, usize>,
    set_seqs: Vec<u32>,
    encore_set: Option<u32>,
}

impl ReferenceSetlist {
    pub fn new(songs: Vec<ReferenceSong>) -> Self {
        let mut first_position = FxHashMap::default();
        let mut counts = FxHashMap::default();
        let mut set_seqs: Vec<u32> = Vec::new();
        let mut encore_set = None;
        for (i, song) in songs.iter().enumerate() {
            let key = title_key(&song.title);
            first_position.entry(key.clone()).or_insert(i);
            *counts.entry(key).or_insert(0) += 1;
            if !set_seqs.contains(&song.set_seq) {
                set_seqs.push(song.set_seq);
            }
            if song.encore && encore_set.is_none() {
                encore_set = Some(song.set_seq);
            }
        }
        Self {
            songs,
            first_position,
            counts,
            set_seqs,
            encore_set,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn songs(&self) -> &[ReferenceSong] {
        &self.songs
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    /// Index of the first occurrence of a title in show order
    pub fn position_of(&self, title: &str) -> Option<usize> {
        self.first_position.get(&title_key(title)).copied()
    }

    pub fn contains(&self, title: &str) -> bool {
        self.first_position.contains_key(&title_key(title))
    }

    pub fn count_of(&self, title: &str) -> usize {
        self.counts.get(&title_key(title)).copied().unwrap_or(0)
    }

    /// Display title of a setlist entry matching `title`
    pub fn canonical(&self, title: &str) -> Option<&str> {
        self.position_of(title).map(|i| self.songs[i].title.as_str())
    }

    pub fn disc_count(&self) -> u32 {
        self.set_seqs.len() as u32
    }

    fn disc_of_set(&self, set_seq: u32) -> u32 {
        self.set_seqs
            .iter()
            .position(|s| *s == set_seq)
            .map(|i| i as u32 + 1)
            .unwrap_or(1)
    }

    /// Disc of the song at a setlist index
    pub fn disc_at(&self, index: usize) -> Option<u32> {
        self.songs.get(index).map(|s| self.disc_of_set(s.set_seq))
    }

    /// Every disc a title is listed on, ascending
    pub fn discs_for(&self, title: &str) -> Vec<u32> {
        let key = title_key(title);
        let mut discs: Vec<u32> = self
            .songs
            .iter()
            .filter(|s| title_key(&s.title) == key)
            .map(|s| self.disc_of_set(s.set_seq))
            .collect();
        discs.sort_unstable();
        discs.dedup();
        discs
    }

    pub fn encore_disc(&self) -> Option<u32> {
        self.encore_set.map(|s| self.disc_of_set(s))
    }

    /// Reference segue flag for the nth occurrence (0-based) of a title
    pub fn segue_of(&self, title: &str, occurrence: usize) -> Option<bool> {
        let key = title_key(title);
        self.songs
            .iter()
            .filter(|s| title_key(&s.title) == key)
            .nth(occurrence)
            .map(|s| s.segue)
    }
}

// ============================================================================
// TESTS
// ============================================================================
