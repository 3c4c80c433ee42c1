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

//! Conversion between domain entities and stored records.

use serde::de::DeserializeOwned;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{
    cache::error::Result,
    db::Record,
    model::{Account, Playlist, Track},
};

/// Milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

pub(crate) fn decode<T: DeserializeOwned>(record: &Record) -> Result<T> {
    Ok(serde_json::from_str(&record.json)?)
}

pub(crate) fn decode_all<T: DeserializeOwned>(records: &[Record]) -> Result<Vec<T>> {
    records.iter().map(decode).collect()
}

/// Encodes a track, taking the row columns from the document itself.
pub(crate) fn encode_track(track: &Track, updated_at: i64) -> Result<Record> {
    Ok(Record {
        id: track.id,
        file_path: track.file_path.clone(),
        is_local: track.is_local,
        deleted: track.deleted,
        json: serde_json::to_string(track)?,
        updated_at,
    })
}

/// Encodes a playlist as a local playlist.
pub(crate) fn encode_local_playlist(playlist: &Playlist, updated_at: i64) -> Result<Record> {
    Ok(Record {
        id: playlist.id,
        file_path: None,
        is_local: true,
        deleted: false,
        json: serde_json::to_string(playlist)?,
        updated_at,
    })
}

pub(crate) fn encode_account(account: &Account, updated_at: i64) -> Result<Record> {
    Ok(Record {
        id: account.user_id,
        file_path: None,
        is_local: false,
        deleted: false,
        json: serde_json::to_string(account)?,
        updated_at,
    })
}
