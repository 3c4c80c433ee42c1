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

//! Domain entities mirrored from the remote music service.
//!
//! Documents use the remote catalog's camelCase field names. Every entity
//! keeps the fields it does not model in a flattened `extra` map, so a
//! document read from the cache and written back loses nothing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    #[serde(default, skip_serializing_if = "is_false")]
    pub matched: bool,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Artist {
    #[serde(default, skip_serializing_if = "is_false")]
    pub matched: bool,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A track, either backed by a local file, an online catalog entry, or both
/// once a local track has been matched.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,

    #[serde(default)]
    pub is_local: bool,

    #[serde(default)]
    pub deleted: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub matched: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<Album>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artists: Vec<Artist>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: i64,

    /// Playback order.
    #[serde(default)]
    pub track_ids: Vec<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_img_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<i64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The logged in user's profile. Everything but the user id, `vipType`
/// included, is kept as stored.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub user_id: i64,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Account {
    /// The account reported when nobody is logged in.
    pub fn logged_out() -> Self {
        Self {
            user_id: 0,
            extra: Map::from_iter([("vipType".to_string(), Value::from(0))]),
        }
    }
}

/// Login status payload as returned by the remote service.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginPayload {
    pub data: LoginData,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginData {
    pub profile: Account,
}

/// Search response from the remote catalog. Candidates are kept as raw
/// documents, they are merged into local tracks field by field.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SearchResponse {
    #[serde(default)]
    pub result: SearchResult,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SearchResult {
    #[serde(default)]
    pub songs: Vec<Value>,
}

/// Envelope used for track list reads, shaped like the remote service's
/// song detail response.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TrackList {
    pub code: u16,
    pub songs: Vec<Track>,
    pub privileges: Map<String, Value>,
}

impl TrackList {
    pub fn new(songs: Vec<Track>) -> Self {
        Self {
            code: 200,
            songs,
            privileges: Map::new(),
        }
    }
}
