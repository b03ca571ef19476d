//! Folder enumeration and the per-show processing pipeline.
//!
//! Each show folder goes through:
//! 1. Enumerate audio files in name order, read existing titles
//! 2. Parse the setlist text, load the reference setlist, report where the two disagree
//! 3. Coverage gate (a skipped folder is never written to)
//! 4. Arbitrate a title per file, learning confident fuzzy matches
//! 5. Duplicate audit, disc/track assignment, album fields, reports
//! 6. Write tags (unless trial mode), flush learned corrections

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::album::{self, RecordingInfo};
use crate::arbitration::{Arbiter, FileInput, TrustMode};
use crate::assign::assign;
use crate::config::Config;
use crate::corrections::CorrectionsStore;
use crate::discrepancies::{append_discrepancy_report, compare_setlists};
use crate::duplicates::audit_duplicates;
use crate::error::Result;
use crate::matcher::SongMatcher;
use crate::models::{AlbumInfo, Resolution, RunStats, TrackFile, TrackKey};
use crate::progress::{create_progress_bar, log_progress};
use crate::reference::{ReferenceSetlist, SetlistSource, ShowQuery};
use crate::review::{
    append_segue_report, append_unmatched_report, review_entries, segue_discrepancies,
    unmatched_lines, ReviewEntry,
};
use crate::safety::{validate_coverage, CoverageWarning, Verdict};
use crate::setlist_txt::{find_txt_file, SetlistText};
use crate::tags::TagIo;

pub const AUDIO_EXTENSIONS: [&str; 6] = ["flac", "shn", "mp3", "wav", "m4a", "ogg"];

// ============================================================================
// File Name Patterns
// ============================================================================

static DISC_TRACK_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)d(\d{1,2})t(\d{1,3})").unwrap());

static TRACK_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|[^a-z])t(\d{1,3})(?:\D|$)").unwrap());

static LEADING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,3})(?:[\s._\-]|$)").unwrap());

/// Disc/track key from a file name: `d2t03`, `t03`, or a leading `03`.
pub fn parse_track_key(file_name: &str) -> Option<TrackKey> {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);

    if let Some(caps) = DISC_TRACK_NAME.captures(stem) {
        let disc = caps[1].parse().ok()?;
        let track = caps[2].parse().ok()?;
        return Some(TrackKey::new(Some(disc), track));
    }
    let caps = TRACK_NAME
        .captures(stem)
        .or_else(|| LEADING_NUMBER.captures(stem))?;
    caps[1].parse().ok().map(|track| TrackKey::new(None, track))
}

fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| AUDIO_EXTENSIONS.iter().any(|a| e.eq_ignore_ascii_case(a)))
}

/// Audio files directly inside `folder`, sorted by file name.
pub fn list_audio_files(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(folder)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_audio_file(p))
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Build track files; the sorted index is the physical ordinal. Also returns
/// how many existing tags could not be read (those files have no title).
pub fn enumerate_tracks(paths: Vec<PathBuf>, tags: &impl TagIo) -> (Vec<TrackFile>, usize) {
    let mut read_failures = 0;
    let files = paths
        .into_iter()
        .enumerate()
        .map(|(ordinal, path)| {
            let key = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(parse_track_key);
            let existing_title = match tags.read_title(&path) {
                Ok(title) => title,
                Err(e) => {
                    read_failures += 1;
                    warn!("{}", e);
                    None
                }
            };
            TrackFile {
                path,
                key,
                existing_title,
                ordinal,
            }
        })
        .collect();
    (files, read_failures)
}

/// The text numbers tracks per disc but no file name carries a disc, so no
/// file can be looked up in the text.
pub fn disc_keys_unusable(files: &[TrackFile], text: &SetlistText) -> bool {
    text.is_disc_structured()
        && !text.is_empty()
        && files.iter().any(|f| f.key.is_some())
        && files.iter().all(|f| f.key.and_then(|k| k.disc).is_none())
}

fn folder_name(folder: &Path) -> String {
    folder
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Every directory under `root` that directly holds audio files.
pub fn show_folders(root: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    if !recursive {
        return Ok(if list_audio_files(root)?.is_empty() {
            Vec::new()
        } else {
            vec![root.to_path_buf()]
        });
    }

    let mut folders = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Error accessing entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        match list_audio_files(entry.path()) {
            Ok(files) if !files.is_empty() => folders.push(entry.path().to_path_buf()),
            Ok(_) => {}
            Err(e) => warn!(folder = %entry.path().display(), "Cannot list folder: {}", e),
        }
    }
    Ok(folders)
}

// ============================================================================
// Pipeline
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderOutcome {
    Processed { files: usize, written: usize },
    Skipped { reason: String },
    NoAudio,
}

pub struct Pipeline<S, T> {
    config: Config,
    matcher: SongMatcher,
    source: S,
    tags: T,
    corrections: CorrectionsStore,
    review_queue: Vec<ReviewEntry>,
    stats: RunStats,
}

impl<S: SetlistSource, T: TagIo> Pipeline<S, T> {
    pub fn new(
        config: Config,
        matcher: SongMatcher,
        source: S,
        tags: T,
        corrections: CorrectionsStore,
    ) -> Self {
        Self {
            config,
            matcher,
            source,
            tags,
            corrections,
            review_queue: Vec::new(),
            stats: RunStats::default(),
        }
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn tags(&self) -> &T {
        &self.tags
    }

    pub fn review_queue(&self) -> &[ReviewEntry] {
        &self.review_queue
    }

    pub fn corrections(&self) -> &CorrectionsStore {
        &self.corrections
    }

    /// Process every show folder under `root`. Folder failures are logged
    /// and counted; they never stop the run.
    pub fn run(&mut self, root: &Path) -> Result<&RunStats> {
        let start = Instant::now();
        let folders = show_folders(root, self.config.run.recursive)?;
        info!(folders = folders.len(), root = %root.display(), "Found show folders");

        let pb = create_progress_bar(folders.len() as u64, "Processing shows");
        for (i, folder) in folders.iter().enumerate() {
            self.stats.folders_seen += 1;
            match self.process_folder(folder) {
                Ok(outcome) => debug!(folder = %folder.display(), ?outcome, "Folder done"),
                Err(e) => {
                    self.stats.folders_failed += 1;
                    warn!(folder = %folder.display(), "Folder failed: {}", e);
                }
            }
            pb.inc(1);
            log_progress("shows", (i + 1) as u64, folders.len() as u64, 10);
        }
        pb.finish_and_clear();

        let queue_path = &self.config.paths.review_queue;
        if !self.review_queue.is_empty() {
            crate::review::write_review_queue(queue_path, &self.review_queue)?;
            info!(
                entries = self.review_queue.len(),
                path = %queue_path.display(),
                "Wrote review queue"
            );
        } else if queue_path.is_file() {
            // The queue always describes the latest run
            crate::review::write_review_queue(queue_path, &[])?;
            info!(path = %queue_path.display(), "Cleared stale review queue");
        }
        self.stats.elapsed_seconds = start.elapsed().as_secs_f64();
        Ok(&self.stats)
    }

    pub fn process_folder(&mut self, folder: &Path) -> Result<FolderOutcome> {
        let paths = list_audio_files(folder)?;
        if paths.is_empty() {
            return Ok(FolderOutcome::NoAudio);
        }
        let (files, read_failures) = enumerate_tracks(paths, &self.tags);
        self.stats.read_failures += read_failures;

        let text = match find_txt_file(folder)? {
            Some(path) => {
                debug!(path = %path.display(), "Using setlist text");
                SetlistText::from_file(&path)?
            }
            None => SetlistText::default(),
        };
        if disc_keys_unusable(&files, &text) {
            warn!(
                folder = %folder.display(),
                "Setlist text is numbered per disc but no file name has a disc number"
            );
        }

        let name = folder_name(folder);
        let query = ShowQuery::from_folder_name(&name, self.config.run.gd);
        let reference = self.load_reference(folder, query.as_ref())?;
        self.matcher.extend_vocabulary(&reference);

        let discrepancies = compare_setlists(&text, &reference, &self.matcher, &self.corrections);
        self.stats.setlist_discrepancies += discrepancies.len();
        append_discrepancy_report(
            &self.config.paths.discrepancy_report(),
            folder,
            &discrepancies,
        )?;

        let trust_text = self.config.run.trust_text;
        let verdict = validate_coverage(&files, &text, &reference, trust_text);
        match &verdict {
            Verdict::Skip {
                coverage,
                reason,
                unmapped,
            } => {
                self.stats.folders_skipped += 1;
                warn!(
                    folder = %folder.display(),
                    files = coverage.files,
                    text_entries = coverage.text_entries,
                    reference_songs = coverage.reference_songs,
                    "Skipping folder: {}",
                    reason
                );
                for path in unmapped {
                    warn!(file = %path.display(), "No text mapping");
                }
                return Ok(FolderOutcome::Skipped {
                    reason: reason.clone(),
                });
            }
            Verdict::Admit {
                warning: Some(warning),
                ..
            } => {
                match warning {
                    CoverageWarning::CountMismatch(_) => self.stats.coverage_warnings += 1,
                    CoverageWarning::CoincidentalMatch(_) => self.stats.coincidental_matches += 1,
                }
                warn!(folder = %folder.display(), "{}", warning);
            }
            Verdict::Admit { warning: None, .. } => {}
        }

        let resolutions = self.resolve_files(&files, &text, &reference, &verdict);

        for warning in audit_duplicates(&files, &resolutions, &reference, &text) {
            self.stats.duplicate_warnings += 1;
            warn!(folder = %folder.display(), "Duplicate: {}", warning);
        }

        let album = self.load_album(folder, &name, query.as_ref())?;
        let mut updates = assign(&files, &resolutions, &reference);
        for update in &mut updates {
            update.album = Some(album.clone());
        }

        let segues = segue_discrepancies(&files, &resolutions, &reference);
        self.stats.segue_discrepancies += segues.len();
        append_segue_report(&self.config.paths.segue_report(), folder, &segues)?;
        append_unmatched_report(
            &self.config.paths.unmatched_report(),
            &unmatched_lines(&files, &resolutions),
        )?;
        self.review_queue.extend(review_entries(&files, &resolutions));

        let mut written = 0;
        for update in &updates {
            if self.config.run.dry_run {
                info!(
                    file = %update.path.display(),
                    title = update.title.as_deref().unwrap_or("-"),
                    disc = update.disc,
                    track = update.track,
                    album = %album.album,
                    "Trial: would write"
                );
                continue;
            }
            match self.tags.write_tags(update) {
                Ok(()) => written += 1,
                Err(e) => {
                    self.stats.write_failures += 1;
                    warn!("{}", e);
                }
            }
        }
        self.stats.files_written += written;

        self.stats.corrections_learned += self.corrections.flush()?;
        self.stats.folders_processed += 1;
        info!(
            folder = %folder.display(),
            files = files.len(),
            written,
            "Processed show"
        );
        Ok(FolderOutcome::Processed {
            files: files.len(),
            written,
        })
    }

    fn load_reference(&self, folder: &Path, query: Option<&ShowQuery>) -> Result<ReferenceSetlist> {
        let Some(query) = query else {
            warn!(folder = %folder.display(), "No show date in folder name, no reference setlist");
            return Ok(ReferenceSetlist::empty());
        };
        let songs = self.source.setlist_for(query)?;
        if songs.is_empty() {
            warn!(folder = %folder.display(), "Show not found in reference database");
        }
        Ok(ReferenceSetlist::new(songs))
    }

    fn load_album(&self, folder: &Path, name: &str, query: Option<&ShowQuery>) -> Result<AlbumInfo> {
        let show = match query {
            Some(query) => self.source.show_info(query)?,
            None => None,
        };
        if show.is_none() {
            warn!(folder = %folder.display(), "No show info, album named after the folder");
        }
        let recording = RecordingInfo::from_folder_name(name);
        debug!(
            folder = %folder.display(),
            source = recording.source.unwrap_or("-"),
            shnid = ?recording.shnid,
            miller = recording.miller,
            "Recording"
        );
        Ok(album::album_info(name, query, show.as_ref(), self.config.run.gd))
    }

    fn resolve_files(
        &mut self,
        files: &[TrackFile],
        text: &SetlistText,
        reference: &ReferenceSetlist,
        verdict: &Verdict,
    ) -> Vec<Resolution> {
        let arbiter = Arbiter::new(
            &self.matcher,
            reference,
            TrustMode::from_trust_text(self.config.run.trust_text),
            verdict.reference_is_authoritative(),
        );

        let mut key_ordinal = 0;
        let mut resolutions = Vec::with_capacity(files.len());
        for file in files {
            let ordinal = file.key.map(|_| {
                key_ordinal += 1;
                key_ordinal - 1
            });
            let input = FileInput {
                existing_title: file.existing_title.as_deref(),
                text_title: file.key.and_then(|k| text.raw_title(&k)),
                key_ordinal: ordinal,
            };
            let resolution = arbiter.resolve(&input, &mut self.corrections);
            debug!(
                file = %file.file_name(),
                source = resolution.source.as_str(),
                confidence = resolution.confidence,
                "Resolved"
            );
            self.stats.record(&resolution);
            resolutions.push(resolution);
        }
        resolutions
    }
}

// ============================================================================
// TESTS
// ============================================================================
