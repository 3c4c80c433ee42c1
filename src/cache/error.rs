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

use thiserror::Error;

use crate::db::Kind;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("record store failure: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("malformed document: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("{kind} {id} not found")]
    NotFound { kind: Kind, id: i64 },

    #[error("search candidate has no numeric id")]
    InvalidCandidate,
}

pub type Result<T> = std::result::Result<T, CacheError>;
