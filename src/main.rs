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

//! # Music Cache.
//!
//! A local mirror of an online music service's tracks, playlists and account,
//! merged with the tracks found in the local media library.
//!
//! ## Architecture
//!
//! * The **Main Thread** parses the command line, submits one task and prints
//!   the resulting event as JSON.
//! * The **Cache Worker** owns the database connection and runs every cache
//!   operation in order, communicating through `std::sync::mpsc` channels.

mod cache;
mod config;
mod db;
mod model;
mod scan;
mod tasks;

use anyhow::{Context, Result, bail};
use serde::{Serialize, de::DeserializeOwned};
use std::{env, fs, sync::mpsc};
use tracing_subscriber::EnvFilter;

use crate::tasks::{CacheEvent, CacheTask};

const USAGE: &str = "usage: trackcache <command>

commands:
  scan                              scan the media directories
  ingest <tracks.json>              store a batch of scanned local tracks
  local                             list every local track
  tracks <ids>                      look up tracks by comma separated ids
  playlists                         list local playlists
  account                           show the logged in account
  match <local-id> <search.json>    match a local track to a search result
  save-playlist <playlist.json>     store a local playlist
  login <login.json>                store a login status payload";

/// The entry point of the application.
///
/// Starts the cache worker, sends it the task named on the command line and
/// prints the outcome.
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let task = parse_task(&args)?;

    let config = config::load_config();

    let (task_tx, task_rx) = mpsc::channel();
    let (event_tx, event_rx) = mpsc::channel();
    let worker = tasks::spawn_task_worker(&config, task_rx, event_tx);

    task_tx.send(task).context("Cache worker stopped")?;
    drop(task_tx);

    let event = event_rx.recv().context("Cache worker stopped")?;
    worker.join().ok();

    print_event(event)
}

/// Translates command line arguments into a [`CacheTask`].
fn parse_task(args: &[String]) -> Result<CacheTask> {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    let task = match args.as_slice() {
        ["scan"] => CacheTask::ScanLibrary,
        ["ingest", tracks] => CacheTask::IngestLocalTracks(read_json(tracks)?),
        ["local"] => CacheTask::GetLocalTracks,
        ["tracks", ids] => CacheTask::GetTracks(ids.to_string()),
        ["playlists"] => CacheTask::GetLocalPlaylists,
        ["account"] => CacheTask::GetLoginStatus,
        ["match", local_id, search] => CacheTask::MatchLocalTrack {
            local_id: local_id
                .parse()
                .with_context(|| format!("Invalid local track id {local_id}"))?,
            search: read_json(search)?,
        },
        ["save-playlist", playlist] => CacheTask::SaveLocalPlaylist(read_json(playlist)?),
        ["login", payload] => CacheTask::SaveLoginStatus(read_json(payload)?),
        _ => bail!(USAGE),
    };

    Ok(task)
}

fn read_json<T: DeserializeOwned>(path: &str) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {path}"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_event(event: CacheEvent) -> Result<()> {
    match event {
        CacheEvent::LocalTracksIngested(count) => println!("ingested {count} local tracks"),
        CacheEvent::Matched(outcome) => println!("{outcome:?}"),
        CacheEvent::PlaylistSaved(saved) => println!("playlist saved: {saved}"),
        CacheEvent::LoginStatusSaved => println!("login status saved"),

        CacheEvent::LocalTracks(tracks) => print_json(&tracks)?,
        CacheEvent::Tracks(tracks) => print_json(&tracks)?,
        CacheEvent::LocalPlaylists(playlists) => print_json(&playlists)?,
        CacheEvent::LoginStatus(account) => print_json(&account)?,

        CacheEvent::Error(message) => bail!(message),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_query_commands() {
        assert!(matches!(
            parse_task(&args(&["tracks", "1,2"])).unwrap(),
            CacheTask::GetTracks(ids) if ids == "1,2"
        ));
        assert!(matches!(
            parse_task(&args(&["account"])).unwrap(),
            CacheTask::GetLoginStatus
        ));
    }

    #[test]
    fn parses_ingest_batch_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("tracks.json");
        fs::write(&path, r#"[{ "id": -7, "filePath": "/a.mp3", "deleted": true }]"#).unwrap();

        let task = parse_task(&args(&["ingest", path.to_str().unwrap()])).unwrap();

        match task {
            CacheTask::IngestLocalTracks(tracks) => {
                assert_eq!(tracks.len(), 1);
                assert_eq!(tracks[0].id, -7);
                assert!(tracks[0].deleted);
            }
            other => panic!("unexpected task {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_or_incomplete_commands() {
        assert!(parse_task(&args(&[])).is_err());
        assert!(parse_task(&args(&["tracks"])).is_err());
        assert!(parse_task(&args(&["ingest", "/missing/tracks.json"])).is_err());
        assert!(parse_task(&args(&["match", "x", "search.json"])).is_err());
    }
}
