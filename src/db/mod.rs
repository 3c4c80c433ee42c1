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

//! Record store.
//!
//! This module handles all interactions with the SQLite database. Every
//! entity kind lives in its own table and every row holds an opaque JSON
//! document alongside the few columns the cache needs to filter on.
//!
//! # Tables
//!
//! * `track` - Local and online tracks, keyed by track id.
//! * `playlist` - User curated playlists, keyed by playlist id.
//! * `account_data` - The logged in account, at most one row.
//!
//! # Performance
//!
//! Most functions in this module use [`rusqlite::Connection::prepare_cached`]
//! to reduce SQL parsing overhead.

mod model;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::fmt;

pub(crate) use model::Record;

/// Entity kinds held by the store, one table each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Track,
    Playlist,
    Account,
}

impl Kind {
    const ALL: [Kind; 3] = [Kind::Track, Kind::Playlist, Kind::Account];

    fn table(self) -> &'static str {
        match self {
            Kind::Track => "track",
            Kind::Playlist => "playlist",
            Kind::Account => "account_data",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// Row filter for [`find_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Filter {
    All,
    Local,
}

impl Filter {
    fn clause(self) -> &'static str {
        match self {
            Filter::All => "",
            Filter::Local => " WHERE is_local = 1",
        }
    }
}

const COLUMNS: &str = "id, file_path, is_local, deleted, json, updated_at";

const MAX_IDS_PER_QUERY: usize = 500;

/// Opens a connection to the SQLite database and configures performance settings.
///
/// This function performs the following setup:
/// * **WAL Mode**: Enables Write-Ahead Logging so readers do not block the writer.
/// * **Performance Tuning**: Sets synchronous mode to `NORMAL`.
/// * **Schema**: Executes [`create_schema`] to ensure all tables exist.
///
/// # Errors
///
/// Returns an error if the database file cannot be opened, if the PRAGMA
/// configuration fails, or if the schema initialization fails.
pub(crate) fn init_db(path: &str) -> Result<Connection> {
    let conn = Connection::open(path).with_context(|| format!("Failed to open {path}"))?;

    let journal_mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |r| r.get(0))?;
    if journal_mode != "wal" {
        anyhow::bail!(
            "Failed to switch to WAL mode. Current mode: {}",
            journal_mode
        );
    }

    conn.execute_batch("PRAGMA synchronous = NORMAL;")?;

    conn.set_prepared_statement_cache_capacity(32);

    create_schema(&conn)?;

    Ok(conn)
}

/// Create the database schema.
///
/// All tables share the same column layout. `file_path` and `deleted` only
/// carry meaning for tracks, `is_local` for tracks and playlists.
pub(crate) fn create_schema(conn: &Connection) -> Result<()> {
    let mut sql = String::from("BEGIN;");
    for kind in Kind::ALL {
        sql.push_str(&format!(
            "
            CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY,
                file_path TEXT,
                is_local INTEGER NOT NULL DEFAULT 0,
                deleted INTEGER NOT NULL DEFAULT 0,
                json TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_{0}_is_local ON {0} (is_local);",
            kind.table()
        ));
    }
    sql.push_str("COMMIT;");

    conn.execute_batch(&sql).context("Failed to create schema")
}

/// Fetches a single record by id.
pub(crate) fn find(conn: &Connection, kind: Kind, id: i64) -> rusqlite::Result<Option<Record>> {
    let sql = format!("SELECT {COLUMNS} FROM {} WHERE id = ?", kind.table());
    let mut stmt = conn.prepare_cached(&sql)?;
    stmt.query_row([id], Record::from_row).optional()
}

/// Fetches the records matching any of the given ids.
///
/// Missing ids are skipped, so the result may be shorter than `ids`. Rows come
/// back in no particular order. Ids are queried in chunks of
/// [`MAX_IDS_PER_QUERY`] to stay under SQLite's bound parameter limit.
pub(crate) fn find_many(conn: &Connection, kind: Kind, ids: &[i64]) -> rusqlite::Result<Vec<Record>> {
    let mut results = Vec::new();

    for chunk in ids.chunks(MAX_IDS_PER_QUERY) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!(
            "SELECT {COLUMNS} FROM {} WHERE id IN ({placeholders})",
            kind.table()
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(chunk), Record::from_row)?;
        for row in rows {
            results.push(row?);
        }
    }

    Ok(results)
}

/// Fetches every record of a kind matching the filter, ordered by id.
pub(crate) fn find_all(conn: &Connection, kind: Kind, filter: Filter) -> rusqlite::Result<Vec<Record>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM {}{} ORDER BY id",
        kind.table(),
        filter.clause()
    );

    let mut stmt = conn.prepare_cached(&sql)?;
    let results = stmt
        .query_map([], Record::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(results)
}

/// Inserts a record, or overwrites the existing record with the same id.
pub(crate) fn upsert(conn: &Connection, kind: Kind, record: &Record) -> rusqlite::Result<()> {
    let sql = format!(
        "INSERT INTO {} ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT (id) DO UPDATE SET
            file_path = excluded.file_path,
            is_local = excluded.is_local,
            deleted = excluded.deleted,
            json = excluded.json,
            updated_at = excluded.updated_at",
        kind.table()
    );

    let mut stmt = conn.prepare_cached(&sql)?;
    stmt.execute(params![
        record.id,
        record.file_path,
        record.is_local,
        record.deleted,
        record.json,
        record.updated_at
    ])?;

    Ok(())
}

/// Upserts a batch of records within a single transaction, either every
/// record is written or none is.
pub(crate) fn upsert_many(conn: &mut Connection, kind: Kind, records: &[Record]) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    for record in records {
        upsert(&tx, kind, record)?;
    }
    tx.commit()
}

/// Makes `record` the only record of its kind, removing every other row in
/// the same transaction.
pub(crate) fn replace_all(conn: &mut Connection, kind: Kind, record: &Record) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    tx.execute(&format!("DELETE FROM {}", kind.table()), [])?;
    upsert(&tx, kind, record)?;
    tx.commit()
}

/// Overwrites the record stored under `id`.
///
/// Returns the number of rows touched, zero when no record has that id.
pub(crate) fn update(conn: &Connection, kind: Kind, id: i64, record: &Record) -> rusqlite::Result<usize> {
    let sql = format!(
        "UPDATE {} SET id = ?1, file_path = ?2, is_local = ?3, deleted = ?4, json = ?5, updated_at = ?6
         WHERE id = ?7",
        kind.table()
    );

    let mut stmt = conn.prepare_cached(&sql)?;
    stmt.execute(params![
        record.id,
        record.file_path,
        record.is_local,
        record.deleted,
        record.json,
        record.updated_at,
        id
    ])
}

/// Moves a record to a new key.
///
/// The record under `old_id` is removed and `record` is written under its own
/// id, overwriting any record already there. Exactly one row remains for the
/// entity afterwards. Callers wanting atomicity run this inside a transaction.
pub(crate) fn replace(conn: &Connection, kind: Kind, old_id: i64, record: &Record) -> rusqlite::Result<()> {
    let sql = format!("DELETE FROM {} WHERE id = ?", kind.table());
    conn.prepare_cached(&sql)?.execute([old_id])?;
    upsert(conn, kind, record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_tmp_db() -> (Connection, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.db");
        let conn = init_db(path.to_str().unwrap()).unwrap();
        (conn, temp_dir)
    }

    fn record(id: i64, is_local: bool) -> Record {
        Record {
            id,
            file_path: None,
            is_local,
            deleted: false,
            json: format!(r#"{{"id":{id}}}"#),
            updated_at: 1,
        }
    }

    #[test]
    fn finds_upserted_record() {
        let (conn, _temp_dir) = create_tmp_db();

        upsert(&conn, Kind::Track, &record(1, true)).unwrap();
        let mut changed = record(1, false);
        changed.json = "{}".to_string();
        upsert(&conn, Kind::Track, &changed).unwrap();

        assert_eq!(find(&conn, Kind::Track, 1).unwrap(), Some(changed));
        assert_eq!(find(&conn, Kind::Track, 2).unwrap(), None);
        assert_eq!(find(&conn, Kind::Playlist, 1).unwrap(), None);
    }

    #[test]
    fn find_many_skips_missing_ids() {
        let (mut conn, _temp_dir) = create_tmp_db();

        upsert_many(&mut conn, Kind::Track, &[record(1, true), record(2, true)]).unwrap();

        let found = find_many(&conn, Kind::Track, &[1, 2, 3]).unwrap();
        assert_eq!(found.len(), 2);
        assert!(find_many(&conn, Kind::Track, &[]).unwrap().is_empty());
    }

    #[test]
    fn find_many_spans_several_chunks() {
        let (mut conn, _temp_dir) = create_tmp_db();
        let records: Vec<Record> = (1..=1_200).map(|id| record(id, true)).collect();
        upsert_many(&mut conn, Kind::Track, &records).unwrap();

        let ids: Vec<i64> = (1..=40_000).collect();
        let found = find_many(&conn, Kind::Track, &ids).unwrap();

        assert_eq!(found.len(), 1_200);
    }

    #[test]
    fn replace_all_leaves_single_record() {
        let (mut conn, _temp_dir) = create_tmp_db();
        upsert(&conn, Kind::Account, &record(900, false)).unwrap();
        upsert(&conn, Kind::Account, &record(901, false)).unwrap();

        replace_all(&mut conn, Kind::Account, &record(42, false)).unwrap();

        let ids: Vec<i64> = find_all(&conn, Kind::Account, Filter::All)
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![42]);
    }

    #[test]
    fn find_all_filters_local_records() {
        let (mut conn, _temp_dir) = create_tmp_db();

        upsert_many(
            &mut conn,
            Kind::Playlist,
            &[record(3, true), record(1, false), record(2, true)],
        )
        .unwrap();

        let local: Vec<i64> = find_all(&conn, Kind::Playlist, Filter::Local)
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(local, vec![2, 3]);
        assert_eq!(find_all(&conn, Kind::Playlist, Filter::All).unwrap().len(), 3);
    }

    #[test]
    fn update_reports_missing_record() {
        let (conn, _temp_dir) = create_tmp_db();

        assert_eq!(update(&conn, Kind::Playlist, 9, &record(9, true)).unwrap(), 0);

        upsert(&conn, Kind::Playlist, &record(9, false)).unwrap();
        assert_eq!(update(&conn, Kind::Playlist, 9, &record(9, true)).unwrap(), 1);
        assert!(find(&conn, Kind::Playlist, 9).unwrap().unwrap().is_local);
    }

    #[test]
    fn replace_moves_record_to_new_key() {
        let (conn, _temp_dir) = create_tmp_db();

        upsert(&conn, Kind::Track, &record(100, true)).unwrap();
        upsert(&conn, Kind::Track, &record(777, false)).unwrap();

        replace(&conn, Kind::Track, 100, &record(777, true)).unwrap();

        assert_eq!(find(&conn, Kind::Track, 100).unwrap(), None);
        assert!(find(&conn, Kind::Track, 777).unwrap().unwrap().is_local);
        assert_eq!(find_all(&conn, Kind::Track, Filter::All).unwrap().len(), 1);
    }

    #[test]
    fn upsert_many_is_all_or_nothing() {
        let (mut conn, _temp_dir) = create_tmp_db();
        conn.execute_batch(
            "CREATE TRIGGER reject_seven BEFORE INSERT ON track WHEN NEW.id = 7
             BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        )
        .unwrap();

        let result = upsert_many(&mut conn, Kind::Track, &[record(1, true), record(7, true)]);

        assert!(result.is_err());
        assert!(find_all(&conn, Kind::Track, Filter::All).unwrap().is_empty());
    }
}
