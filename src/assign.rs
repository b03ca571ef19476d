//! Set/disc assignment and track renumbering.
//!
//! Disc numbers come from the reference setlist's set membership of each
//! resolved song, never from the disc digit in the file name. Track numbers
//! follow the physical order of the files within each disc.

use rustc_hash::FxHashMap;

use crate::models::{Resolution, TagUpdate, TrackFile, Winner};
use crate::normalize::title_case;
use crate::reference::ReferenceSetlist;

/// Title to write for a resolution, with " >" for a segue.
/// None leaves the file's title untouched.
pub fn render_title(resolution: &Resolution) -> Option<String> {
    let title = match &resolution.winner {
        Winner::Song(title) | Winner::Extra(title) => title.clone(),
        Winner::Raw(raw) => title_case(raw),
        Winner::None => return None,
    };
    if resolution.has_segue {
        Some(format!("{} >", title))
    } else {
        Some(title)
    }
}

/// Disc per file, parallel to `resolutions` (which follow physical order).
pub fn assign_discs(resolutions: &[Resolution], reference: &ReferenceSetlist) -> Vec<u32> {
    if reference.is_empty() {
        return vec![1; resolutions.len()];
    }

    // Songs first: earliest listed disc not before the previous song's disc
    let mut discs: Vec<Option<u32>> = Vec::with_capacity(resolutions.len());
    let mut previous = 1;
    for resolution in resolutions {
        let disc = resolution.song().and_then(|song| {
            let listed = reference.discs_for(song);
            listed
                .iter()
                .copied()
                .find(|d| *d >= previous)
                .or_else(|| listed.first().copied())
        });
        if let Some(d) = disc {
            previous = d;
        }
        discs.push(disc);
    }

    // Everything else inherits from its neighbours
    let resolved = discs.clone();
    for (i, disc) in discs.iter_mut().enumerate() {
        if disc.is_some() {
            continue;
        }
        let preceding = resolved[..i].iter().rev().flatten().next();
        let following = resolved[i + 1..].iter().flatten().next();
        *disc = Some(preceding.or(following).copied().unwrap_or(1));
    }
    let mut discs: Vec<u32> = discs.into_iter().map(|d| d.unwrap_or(1)).collect();

    move_encore_extras(&mut discs, &resolved, resolutions, reference);
    discs
}

/// Extras physically after the last non-encore song belong to the encore.
fn move_encore_extras(
    discs: &mut [u32],
    resolved: &[Option<u32>],
    resolutions: &[Resolution],
    reference: &ReferenceSetlist,
) {
    let Some(encore) = reference.encore_disc() else {
        return;
    };
    let Some(last_set_song) = resolved
        .iter()
        .rposition(|d| matches!(d, Some(disc) if *disc != encore))
    else {
        return;
    };
    for i in last_set_song + 1..discs.len() {
        if resolutions[i].is_extra() {
            discs[i] = encore;
        }
    }
}

/// Compute the tag update for every file.
///
/// `files` and `resolutions` are parallel. Within each disc, tracks are
/// numbered 1..N by physical ordinal.
pub fn assign(
    files: &[TrackFile],
    resolutions: &[Resolution],
    reference: &ReferenceSetlist,
) -> Vec<TagUpdate> {
    let mut order: Vec<usize> = (0..files.len()).collect();
    order.sort_by_key(|&i| files[i].ordinal);

    let ordered: Vec<Resolution> = order.iter().map(|&i| resolutions[i].clone()).collect();
    let ordered_discs = assign_discs(&ordered, reference);

    let mut discs = vec![1; files.len()];
    for (slot, &i) in order.iter().enumerate() {
        discs[i] = ordered_discs[slot];
    }

    let mut group_sizes: FxHashMap<u32, u32> = FxHashMap::default();
    for disc in &discs {
        *group_sizes.entry(*disc).or_insert(0) += 1;
    }
    let disc_total = discs.iter().copied().max().unwrap_or(1);

    let mut next_track: FxHashMap<u32, u32> = FxHashMap::default();
    let mut tracks = vec![0; files.len()];
    for &i in &order {
        let counter = next_track.entry(discs[i]).or_insert(0);
        *counter += 1;
        tracks[i] = *counter;
    }

    files
        .iter()
        .zip(resolutions)
        .enumerate()
        .map(|(i, (file, resolution))| TagUpdate {
            path: file.path.clone(),
            title: render_title(resolution),
            disc: discs[i],
            disc_total,
            track: tracks[i],
            track_total: group_sizes.get(&discs[i]).copied().unwrap_or(0),
            album: None,
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
