//! Test fixtures and in-memory collaborators.

use rusqlite::Connection;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};

use crate::error::{Result, TaggerError};
use crate::models::{ReferenceSong, ShowInfo, TagUpdate, TrackFile, TrackKey};
use crate::reference::{SetlistSource, ShowQuery};
use crate::tags::TagIo;

pub fn song(title: &str, set_seq: u32, segue: bool) -> ReferenceSong {
    ReferenceSong {
        title: title.to_string(),
        set_seq,
        set_name: format!("Set {}", set_seq),
        song_seq: 1,
        segue,
        encore: false,
    }
}

/// A slice of the canonical song list
pub fn vocabulary() -> Vec<String> {
    [
        "Bertha",
        "Sugaree",
        "Jack Straw",
        "Deal",
        "Loser",
        "Brown Eyed Women",
        "Mama Tried",
        "New Minglewood Blues",
        "Scarlet Begonias",
        "Fire on the Mountain",
        "Playing in the Band",
        "Uncle John's Band",
        "Dark Star",
        "China Cat Sunflower",
        "I Know You Rider",
        "Estimated Prophet",
        "Eyes of the World",
        "Stella Blue",
        "Morning Dew",
        "Sugar Magnolia",
        "Tennessee Jed",
        "Row Jimmy",
        "Wharf Rat",
        "Not Fade Away",
        "One More Saturday Night",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// `n` files named like a taper's rip, ordinal in name order.
pub fn track_files(disc: Option<u32>, n: u32) -> Vec<TrackFile> {
    (1..=n)
        .map(|i| {
            let name = match disc {
                Some(d) => format!("gd77-05-08d{}t{:02}.flac", d, i),
                None => format!("gd77-05-08t{:02}.flac", i),
            };
            TrackFile {
                path: PathBuf::from("/show").join(name),
                key: Some(TrackKey::new(disc, i)),
                existing_title: None,
                ordinal: (i - 1) as usize,
            }
        })
        .collect()
}

/// In-memory JerryBase with one show on 1977-05-08.
pub fn create_jerrybase() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "
        CREATE TABLE acts (id INTEGER PRIMARY KEY, name TEXT, gd INTEGER);
        CREATE TABLE venues (
            id INTEGER PRIMARY KEY, name TEXT, city TEXT, state TEXT, country TEXT
        );
        CREATE TABLE events (
            id INTEGER PRIMARY KEY, act_id INTEGER, venue_id INTEGER,
            year INTEGER, month INTEGER, day INTEGER, early_late TEXT,
            canceled INTEGER
        );
        CREATE TABLE event_sets (
            id INTEGER PRIMARY KEY, event_id INTEGER, seq_no INTEGER,
            name TEXT, soundcheck INTEGER, encore INTEGER
        );
        CREATE TABLE songs (id INTEGER PRIMARY KEY, name TEXT);
        CREATE TABLE event_songs (
            id INTEGER PRIMARY KEY, event_set_id INTEGER, seq_no INTEGER,
            song_id INTEGER, segue INTEGER
        );

        INSERT INTO acts VALUES (1, 'Grateful Dead', 1);
        INSERT INTO venues VALUES (1, 'Barton Hall, Cornell University', 'Ithaca', 'NY', 'USA');
        INSERT INTO venues VALUES (2, 'Fillmore East', 'New York', 'NY', 'USA');
        INSERT INTO venues VALUES (3, 'Fillmore East Late', 'New York', 'NY', 'USA');
        INSERT INTO venues VALUES (4, 'Boston Garden', 'Boston', 'MA', 'USA');
        INSERT INTO events VALUES (1, 1, 1, 1977, 5, 8, NULL, 0);
        INSERT INTO events VALUES (2, 1, 2, 1970, 2, 14, 'EARLY', 0);
        INSERT INTO events VALUES (3, 1, 3, 1970, 2, 14, 'LATE', 0);
        INSERT INTO events VALUES (4, 1, 4, 1977, 5, 9, NULL, 1);

        INSERT INTO songs VALUES (1, 'New Minglewood Blues');
        INSERT INTO songs VALUES (2, 'Scarlet Begonias');
        INSERT INTO songs VALUES (3, 'Fire on the Mountain');
        INSERT INTO songs VALUES (4, 'One More Saturday Night');
        INSERT INTO songs VALUES (5, 'Sugaree');
        INSERT INTO songs VALUES (6, 'Tuning Jam');

        INSERT INTO event_sets VALUES (1, 1, 0, 'Soundcheck', 1, 0);
        INSERT INTO event_sets VALUES (2, 1, 1, 'Set 1', 0, 0);
        INSERT INTO event_sets VALUES (3, 1, 2, 'Set 2', 0, 0);
        INSERT INTO event_sets VALUES (4, 1, 3, 'Encore', 0, 1);

        INSERT INTO event_songs VALUES (1, 1, 1, 6, 0);
        INSERT INTO event_songs VALUES (2, 2, 1, 1, 0);
        INSERT INTO event_songs VALUES (3, 3, 1, 2, 1);
        INSERT INTO event_songs VALUES (4, 3, 2, 3, 0);
        INSERT INTO event_songs VALUES (5, 4, 1, 4, 0);
        ",
    )
    .unwrap();
    conn
}

/// Serves the same setlist for every show.
#[derive(Debug, Default, Clone)]
pub struct StaticSetlist {
    pub songs: Vec<ReferenceSong>,
    pub show: Option<ShowInfo>,
}

impl SetlistSource for StaticSetlist {
    fn setlist_for(&self, _show: &ShowQuery) -> Result<Vec<ReferenceSong>> {
        Ok(self.songs.clone())
    }

    fn show_info(&self, _show: &ShowQuery) -> Result<Option<ShowInfo>> {
        Ok(self.show.clone())
    }
}

/// Tag store that keeps titles in memory and records every write.
#[derive(Debug, Default)]
pub struct MemoryTags {
    pub titles: FxHashMap<PathBuf, String>,
    pub writes: Vec<TagUpdate>,
    /// Writes to these paths fail
    pub broken: Vec<PathBuf>,
    /// Reads from these paths fail
    pub unreadable: Vec<PathBuf>,
}

impl MemoryTags {
    pub fn with_title(mut self, path: &Path, title: &str) -> Self {
        self.titles.insert(path.to_path_buf(), title.to_string());
        self
    }
}

impl TagIo for MemoryTags {
    fn read_title(&self, path: &Path) -> Result<Option<String>> {
        if self.unreadable.iter().any(|p| p == path) {
            return Err(TaggerError::Tag {
                path: path.to_path_buf(),
                message: "not an audio file".to_string(),
            });
        }
        Ok(self.titles.get(path).cloned())
    }

    fn write_tags(&mut self, update: &TagUpdate) -> Result<()> {
        if self.broken.contains(&update.path) {
            return Err(TaggerError::Tag {
                path: update.path.clone(),
                message: "read-only file".to_string(),
            });
        }
        if let Some(title) = &update.title {
            self.titles.insert(update.path.clone(), title.clone());
        }
        self.writes.push(update.clone());
        Ok(())
    }

    fn write_title(&mut self, path: &Path, title: &str) -> Result<()> {
        if self.broken.iter().any(|p| p == path) {
            return Err(TaggerError::Tag {
                path: path.to_path_buf(),
                message: "read-only file".to_string(),
            });
        }
        self.titles.insert(path.to_path_buf(), title.to_string());
        Ok(())
    }
}
