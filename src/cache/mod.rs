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

//! Local mirror of the remote music service.
//!
//! The [`Cache`] keeps tracks, playlists and the account in the record store
//! and reconciles locally scanned tracks with their online counterparts.
//!
//! # Matching
//!
//! When a local track is matched against a catalog search, the first search
//! candidate becomes the track's identity: its metadata is merged into the
//! local document, the record moves to the remote id, and every local
//! playlist referencing the local id is rewritten to reference the remote
//! id instead. All of it happens in a single transaction.

mod codec;
mod error;
mod merge;

use rusqlite::Connection;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

pub use error::{CacheError, Result};

use crate::{
    db::{self, Filter, Kind},
    model::{Account, LoginPayload, Playlist, SearchResponse, Track, TrackList},
};

/// Scheme of the custom protocol serving cover art to the UI.
const COVER_ART_SCHEME: &str = "atom";

/// Locator for a playlist cover, rendered from the given track.
///
/// The value is persisted inside playlist documents, so the format is stable.
pub fn playlist_cover_url(track_id: i64) -> String {
    format!("{COVER_ART_SCHEME}://get-playlist-pic/{track_id}")
}

/// Result of matching a local track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// The search returned nothing, no record was touched.
    NoCandidate,
    /// The track now lives under `track_id`, the candidate's id, and
    /// `playlists_updated` local playlists were relinked to it.
    Matched {
        track_id: i64,
        playlists_updated: usize,
    },
}

pub struct Cache {
    conn: Connection,
}

impl Cache {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Stores a batch of freshly scanned local tracks.
    ///
    /// Every track is stored as local with its `deleted` flag as given. Ids not
    /// in the batch are left alone, so tracks whose file disappeared must be
    /// part of the batch with `deleted` set.
    pub fn ingest_local_tracks(&mut self, tracks: &[Track]) -> Result<()> {
        let now = codec::now_millis();
        let records = tracks
            .iter()
            .map(|track| {
                let mut track = track.clone();
                track.is_local = true;
                codec::encode_track(&track, now)
            })
            .collect::<Result<Vec<_>>>()?;

        db::upsert_many(&mut self.conn, Kind::Track, &records)?;

        info!(count = records.len(), "Ingested local tracks");
        Ok(())
    }

    /// Matches the local track `local_id` to the first candidate of `search`.
    ///
    /// # Errors
    ///
    /// * [`CacheError::NotFound`] if there is no track stored under `local_id`.
    /// * [`CacheError::InvalidCandidate`] if the first candidate has no id.
    /// * Any store or codec failure, in which case nothing is written.
    pub fn match_local_track(&mut self, local_id: i64, search: SearchResponse) -> Result<MatchOutcome> {
        let Some(candidate) = search.result.songs.into_iter().next() else {
            debug!(local_id, "No match candidate");
            return Ok(MatchOutcome::NoCandidate);
        };
        let remote_id = candidate
            .get("id")
            .and_then(Value::as_i64)
            .ok_or(CacheError::InvalidCandidate)?;

        let tx = self.conn.transaction()?;

        let local_record = db::find(&tx, Kind::Track, local_id)?.ok_or(CacheError::NotFound {
            kind: Kind::Track,
            id: local_id,
        })?;
        let local_track: Track = codec::decode(&local_record)?;

        let playlists: Vec<Playlist> =
            codec::decode_all(&db::find_all(&tx, Kind::Playlist, Filter::Local)?)?;

        let now = codec::now_millis();
        let mut playlists_updated = 0;

        for mut playlist in playlists {
            if !relink_playlist(&mut playlist, local_track.id, remote_id) {
                continue;
            }

            let record = codec::encode_local_playlist(&playlist, now)?;
            if db::update(&tx, Kind::Playlist, playlist.id, &record)? == 0 {
                return Err(CacheError::NotFound {
                    kind: Kind::Playlist,
                    id: playlist.id,
                });
            }
            playlists_updated += 1;
        }

        let mut matched = merge_remote_track(&local_track, candidate)?;
        matched.file_path = local_record.file_path.clone();
        matched.deleted = local_record.deleted;

        let record = codec::encode_track(&matched, now)?;
        db::replace(&tx, Kind::Track, local_record.id, &record)?;

        tx.commit()?;

        info!(local_id, remote_id, playlists_updated, "Matched local track");
        Ok(MatchOutcome::Matched {
            track_id: remote_id,
            playlists_updated,
        })
    }

    /// Stores a playlist as a local playlist, stamped with its own update time.
    pub fn save_local_playlist(&mut self, playlist: &Playlist) -> Result<()> {
        let updated_at = playlist.update_time.unwrap_or_else(codec::now_millis);
        let record = codec::encode_local_playlist(playlist, updated_at)?;
        db::upsert(&self.conn, Kind::Playlist, &record)?;
        Ok(())
    }

    /// Stores the profile carried by a login status payload, replacing any
    /// previously stored account.
    pub fn save_login_status(&mut self, payload: &LoginPayload) -> Result<()> {
        let record = codec::encode_account(&payload.data.profile, codec::now_millis())?;
        db::replace_all(&mut self.conn, Kind::Account, &record)?;
        Ok(())
    }

    /// Every local track. Intended for full library loads only.
    pub fn local_tracks(&self) -> Result<TrackList> {
        let records = db::find_all(&self.conn, Kind::Track, Filter::Local)?;
        Ok(TrackList::new(codec::decode_all(&records)?))
    }

    /// Looks up tracks by a comma separated id list.
    ///
    /// Returns `None` when the list is empty, malformed or repeats an id, or
    /// when any of the ids is not cached: callers treat a partial hit as
    /// nothing being available and fall back to the remote catalog. Tracks
    /// come back in the requested order.
    pub fn tracks_by_ids(&self, ids: &str) -> Result<Option<TrackList>> {
        let Some(ids) = parse_ids(ids) else {
            return Ok(None);
        };

        let mut wanted = ids.clone();
        wanted.sort_unstable();
        wanted.dedup();
        if wanted.len() != ids.len() {
            return Ok(None);
        }

        let records = db::find_many(&self.conn, Kind::Track, &wanted)?;
        if records.len() != ids.len() {
            return Ok(None);
        }

        let by_id: HashMap<i64, &db::Record> = records.iter().map(|r| (r.id, r)).collect();
        let mut songs = Vec::with_capacity(ids.len());
        for id in ids {
            match by_id.get(&id) {
                Some(record) => songs.push(codec::decode(record)?),
                None => return Ok(None),
            }
        }

        Ok(Some(TrackList::new(songs)))
    }

    pub fn local_playlists(&self) -> Result<Vec<Playlist>> {
        let records = db::find_all(&self.conn, Kind::Playlist, Filter::Local)?;
        codec::decode_all(&records)
    }

    /// The stored account, or [`Account::logged_out`] if there is none.
    pub fn login_status(&self) -> Result<Account> {
        let records = db::find_all(&self.conn, Kind::Account, Filter::All)?;
        match records.first() {
            Some(record) => codec::decode(record),
            None => Ok(Account::logged_out()),
        }
    }
}

/// Points every reference to `from` in the playlist at `to` and refreshes the
/// cover. Returns false, leaving the playlist untouched, if `from` is absent.
fn relink_playlist(playlist: &mut Playlist, from: i64, to: i64) -> bool {
    if !playlist.track_ids.contains(&from) {
        return false;
    }

    playlist.cover_img_url = Some(playlist_cover_url(to));
    for id in playlist.track_ids.iter_mut().filter(|id| **id == from) {
        *id = to;
    }
    true
}

/// Merges a catalog candidate into a local track and flags the result, its
/// album and its artists as matched.
fn merge_remote_track(local: &Track, remote: Value) -> Result<Track> {
    let mut doc = serde_json::to_value(local)?;
    merge::deep_merge(&mut doc, remote);

    let mut track: Track = serde_json::from_value(doc)?;
    track.matched = true;
    track.is_local = true;
    track.album.get_or_insert_with(Default::default).matched = true;
    for artist in &mut track.artists {
        artist.matched = true;
    }

    Ok(track)
}

/// Parses a comma separated id list, `None` if it is empty or any token is
/// not a number.
fn parse_ids(ids: &str) -> Option<Vec<i64>> {
    let ids = ids
        .split(',')
        .map(|token| token.trim().parse::<i64>().ok())
        .collect::<Option<Vec<_>>>()?;

    (!ids.is_empty()).then_some(ids)
}
