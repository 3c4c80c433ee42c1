// Copyright (C) 2026  Caprica Software Limited
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Local media library discovery.
//!
//! This module finds audio files on the local filesystem and turns them into
//! the batch of local tracks handed to [`crate::cache::Cache::ingest_local_tracks`].
//!
//! It utilizes `WalkDir` for directory traversal and `Lofty` for metadata
//! extraction.
//!
//! # Identity
//!
//! A file seen for the first time gets a local id hashed from its path. The
//! id is negative so it can never collide with an online catalog id. A file
//! the cache already knows keeps its stored track, including the online id
//! it may have been matched to.

use anyhow::{Context, Result};
use lofty::prelude::*;
use lofty::probe::Probe;
use serde_json::{Map, Value, json};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use xxhash_rust::xxh3::xxh3_64;

use crate::model::{Album, Artist, Track};

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "m4a", "ogg", "wav"];

/// Local id for a file path.
pub(crate) fn local_track_id(path: &str) -> i64 {
    // 53 bits keeps the id exact for JSON consumers using doubles
    let hash = (xxh3_64(path.as_bytes()) >> 11) as i64;
    -(hash + 1)
}

/// Scans the media directories and builds the ingestion batch.
///
/// # Arguments
///
/// * `dirs` - Root directories to walk recursively.
/// * `known` - The local tracks currently cached.
///
/// # Returns
///
/// One track per audio file found, plus every known track whose file was not
/// found, flagged as deleted.
///
/// # Errors
///
/// Returns an error if a path found during the walk is not valid UTF-8.
pub(crate) fn scan_media_dirs(dirs: &[String], known: &[Track]) -> Result<Vec<Track>> {
    let known_by_path: HashMap<&str, &Track> = known
        .iter()
        .filter_map(|t| t.file_path.as_deref().map(|p| (p, t)))
        .collect();

    let mut seen = HashSet::new();
    let mut batch = Vec::new();

    for dir in dirs {
        debug!(dir = %dir, "Scanning media directory");

        for entry in WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_audio_file(e.path()))
        {
            let path = entry
                .path()
                .to_str()
                .context("Path contains invalid UTF-8")?
                .to_string();

            if !seen.insert(path.clone()) {
                continue;
            }

            let track = match known_by_path.get(path.as_str()) {
                Some(existing) => Track {
                    deleted: false,
                    ..(*existing).clone()
                },
                None => read_track(&path),
            };
            batch.push(track);
        }
    }

    let found = batch.len();
    for track in known {
        let missing = track
            .file_path
            .as_ref()
            .is_some_and(|path| !seen.contains(path));
        if missing {
            batch.push(Track {
                deleted: true,
                ..track.clone()
            });
        }
    }

    info!(found, deleted = batch.len() - found, "Media scan complete");
    Ok(batch)
}

fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| AUDIO_EXTENSIONS.iter().any(|a| a.eq_ignore_ascii_case(ext)))
}

/// Builds a new local track from the file's tags. Files without readable tags
/// are still returned, named after the file.
fn read_track(path: &str) -> Track {
    let file_name = Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut extra = Map::new();
    let mut album_name = "Unknown Album".to_string();
    let mut artist_name = "Unknown Artist".to_string();
    let mut title = file_name;

    match Probe::open(path).and_then(|p| p.read()) {
        Ok(tagged_file) => {
            let duration = tagged_file.properties().duration().as_millis() as u64;
            extra.insert("dt".to_string(), json!(duration));

            if let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
                if let Some(t) = tag.title() {
                    title = t.to_string();
                }
                if let Some(a) = tag.artist() {
                    artist_name = a.to_string();
                }
                if let Some(a) = tag.album() {
                    album_name = a.to_string();
                }
                if let Some(n) = tag.track() {
                    extra.insert("no".to_string(), json!(n));
                }
            }
        }
        Err(e) => warn!(path, error = %e, "Unreadable audio file"),
    }

    extra.insert("name".to_string(), Value::String(title));

    Track {
        id: local_track_id(path),
        file_path: Some(path.to_string()),
        is_local: true,
        deleted: false,
        matched: false,
        album: Some(Album {
            matched: false,
            extra: Map::from_iter([("name".to_string(), Value::String(album_name))]),
        }),
        artists: vec![Artist {
            matched: false,
            extra: Map::from_iter([("name".to_string(), Value::String(artist_name))]),
        }],
        extra,
    }
}
