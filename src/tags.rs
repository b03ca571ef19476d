//! Embedded tag I/O.
//!
//! The engine only needs the existing title and a way to write the resolved
//! fields back; `LoftyTags` does both through the file's primary tag.
//! Album fields map onto lofty's generic keys. VERSION has no generic key;
//! it is written verbatim to tag formats with free-form field names.

use lofty::config::WriteOptions;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::prelude::Accessor;
use lofty::read_from_path;
use lofty::tag::{ItemKey, ItemValue, Tag, TagItem, TagType};
use std::path::Path;
use tracing::debug;

use crate::error::{Result, TaggerError};
use crate::models::{AlbumInfo, TagUpdate};

pub trait TagIo {
    /// Existing TITLE, None when absent or blank
    fn read_title(&self, path: &Path) -> Result<Option<String>>;

    fn write_tags(&mut self, update: &TagUpdate) -> Result<()>;

    /// Replace TITLE only, leaving disc and track fields alone
    fn write_title(&mut self, path: &Path, title: &str) -> Result<()>;
}

fn tag_error(path: &Path, error: impl std::fmt::Display) -> TaggerError {
    TaggerError::Tag {
        path: path.to_path_buf(),
        message: error.to_string(),
    }
}

/// Reads and writes the primary tag of each file.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyTags;

impl TagIo for LoftyTags {
    fn read_title(&self, path: &Path) -> Result<Option<String>> {
        let tagged_file = read_from_path(path).map_err(|e| tag_error(path, e))?;
        let tag = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag());
        Ok(tag
            .and_then(|t| t.title().map(|title| title.trim().to_string()))
            .filter(|title| !title.is_empty()))
    }

    fn write_tags(&mut self, update: &TagUpdate) -> Result<()> {
        edit_primary_tag(&update.path, |tag| {
            if let Some(title) = &update.title {
                tag.set_title(title.clone());
            }
            tag.set_disk(update.disc);
            tag.set_disk_total(update.disc_total);
            tag.set_track(update.track);
            tag.set_track_total(update.track_total);
            if let Some(album) = &update.album {
                set_album_fields(tag, album);
            }
        })
    }

    fn write_title(&mut self, path: &Path, title: &str) -> Result<()> {
        edit_primary_tag(path, |tag| tag.set_title(title.to_string()))
    }
}

const VERSION_FIELD: &str = "VERSION";

fn set_album_fields(tag: &mut Tag, album: &AlbumInfo) {
    tag.set_artist(album.artist.clone());
    tag.insert_text(ItemKey::AlbumArtist, album.artist.clone());
    tag.set_album(album.album.clone());
    tag.set_genre(album.genre.clone());
    if let Some(date) = &album.date {
        tag.insert_text(ItemKey::RecordingDate, date.clone());
    }
    match tag.tag_type() {
        TagType::VorbisComments | TagType::Ape => {
            let key = ItemKey::from_key(tag.tag_type(), VERSION_FIELD);
            tag.insert_unchecked(TagItem::new(key, ItemValue::Text(album.version.clone())));
        }
        other => debug!(tag_type = ?other, "No VERSION field for tag type"),
    }
}

/// Open the file, apply `edit` to its primary tag (created if missing), save.
fn edit_primary_tag(path: &Path, edit: impl FnOnce(&mut Tag)) -> Result<()> {
    let mut tagged_file = read_from_path(path).map_err(|e| tag_error(path, e))?;
    let tag_type = tagged_file.primary_tag_type();
    if tagged_file.tag(tag_type).is_none() {
        tagged_file.insert_tag(Tag::new(tag_type));
    }

    let tag = tagged_file
        .tag_mut(tag_type)
        .ok_or_else(|| tag_error(path, format!("no writable tag for {:?}", tag_type)))?;
    edit(tag);

    tagged_file
        .save_to_path(path, WriteOptions::default())
        .map_err(|e| tag_error(path, e))
}
