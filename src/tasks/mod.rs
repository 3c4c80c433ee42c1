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

//! Serialised cache task processing.
//!
//! Every cache operation runs on a single worker thread that owns the
//! database connection. Requests arrive as [`CacheTask`]s and results are
//! broadcast back as [`CacheEvent`]s, so a scan, an ingestion and a match can
//! never interleave their reads and writes.

use anyhow::{Context, Result};
use std::{
    sync::mpsc::{Receiver, Sender},
    thread::{self, JoinHandle},
};
use tracing::{debug, error, warn};

use crate::{
    cache::{Cache, MatchOutcome},
    config::AppConfig,
    db,
    model::{Account, LoginPayload, Playlist, SearchResponse, Track, TrackList},
    scan,
};

#[derive(Debug)]
pub(crate) enum CacheTask {
    ScanLibrary,
    IngestLocalTracks(Vec<Track>),

    MatchLocalTrack {
        local_id: i64,
        search: SearchResponse,
    },

    SaveLocalPlaylist(Playlist),
    SaveLoginStatus(LoginPayload),

    GetLocalTracks,
    GetTracks(String),
    GetLocalPlaylists,
    GetLoginStatus,
}

#[derive(Debug)]
pub(crate) enum CacheEvent {
    LocalTracksIngested(usize),
    Matched(MatchOutcome),
    PlaylistSaved(bool),
    LoginStatusSaved,

    LocalTracks(TrackList),
    Tracks(Option<TrackList>),
    LocalPlaylists(Vec<Playlist>),
    LoginStatus(Account),

    Error(String),
}

/// Spawns the cache worker thread.
///
/// The worker opens its own database connection and processes tasks in
/// arrival order until every sender is dropped.
///
/// # Arguments
///
/// * `config` - The application configuration.
/// * `task_rx` - The receiving end of the task channel.
/// * `event_tx` - The sending end of the channel for broadcasting results.
pub(crate) fn spawn_task_worker(
    config: &AppConfig,
    task_rx: Receiver<CacheTask>,
    event_tx: Sender<CacheEvent>,
) -> JoinHandle<()> {
    let config = config.clone();

    thread::spawn(move || {
        let conn = match db::init_db(&config.database_file) {
            Ok(conn) => conn,
            Err(e) => {
                error!(error = %e, "Failed to initialise database");
                let _ = event_tx.send(CacheEvent::Error(format!("{e:#}")));
                return;
            }
        };

        run_tasks(&config, Cache::new(conn), task_rx, &event_tx);
    })
}

/// Processes tasks until the task channel closes.
fn run_tasks(
    config: &AppConfig,
    mut cache: Cache,
    task_rx: Receiver<CacheTask>,
    event_tx: &Sender<CacheEvent>,
) {
    while let Ok(task) = task_rx.recv() {
        debug!(?task, "Handling cache task");

        let mut ctx = TaskContext {
            config,
            event_tx,
            cache: &mut cache,
        };

        if let Err(e) = handle_task(task, &mut ctx) {
            error!(error = %e, "Cache task failed");
            let _ = event_tx.send(CacheEvent::Error(format!("{e:#}")));
        }
    }
}

/// Bundles shared resources required by task handlers.
struct TaskContext<'a> {
    config: &'a AppConfig,
    event_tx: &'a Sender<CacheEvent>,
    cache: &'a mut Cache,
}

/// Orchestrates the execution of a single task.
fn handle_task(task: CacheTask, ctx: &mut TaskContext) -> Result<()> {
    match task {
        CacheTask::ScanLibrary => scan_library(ctx),
        CacheTask::IngestLocalTracks(tracks) => ingest_local_tracks(ctx, tracks),

        CacheTask::MatchLocalTrack { local_id, search } => {
            let outcome = ctx
                .cache
                .match_local_track(local_id, search)
                .with_context(|| format!("Failed to match local track {local_id}"))?;
            ctx.event_tx.send(CacheEvent::Matched(outcome))?;
            Ok(())
        }

        CacheTask::SaveLocalPlaylist(playlist) => {
            let saved = match ctx.cache.save_local_playlist(&playlist) {
                Ok(()) => true,
                Err(e) => {
                    warn!(playlist_id = playlist.id, error = %e, "Failed to save playlist");
                    false
                }
            };
            ctx.event_tx.send(CacheEvent::PlaylistSaved(saved))?;
            Ok(())
        }
        CacheTask::SaveLoginStatus(payload) => {
            ctx.cache
                .save_login_status(&payload)
                .context("Failed to save login status")?;
            ctx.event_tx.send(CacheEvent::LoginStatusSaved)?;
            Ok(())
        }

        CacheTask::GetLocalTracks => {
            let tracks = ctx.cache.local_tracks()?;
            ctx.event_tx.send(CacheEvent::LocalTracks(tracks))?;
            Ok(())
        }
        CacheTask::GetTracks(ids) => {
            let tracks = ctx.cache.tracks_by_ids(&ids)?;
            ctx.event_tx.send(CacheEvent::Tracks(tracks))?;
            Ok(())
        }
        CacheTask::GetLocalPlaylists => {
            let playlists = ctx.cache.local_playlists()?;
            ctx.event_tx.send(CacheEvent::LocalPlaylists(playlists))?;
            Ok(())
        }
        CacheTask::GetLoginStatus => {
            let account = ctx.cache.login_status()?;
            ctx.event_tx.send(CacheEvent::LoginStatus(account))?;
            Ok(())
        }
    }
}

fn scan_library(ctx: &mut TaskContext) -> Result<()> {
    let known = ctx.cache.local_tracks()?.songs;
    let batch = scan::scan_media_dirs(&ctx.config.media_dirs, &known)?;
    ingest_local_tracks(ctx, batch)
}

fn ingest_local_tracks(ctx: &mut TaskContext, tracks: Vec<Track>) -> Result<()> {
    ctx.cache
        .ingest_local_tracks(&tracks)
        .context("Failed to ingest local tracks")?;
    ctx.event_tx.send(CacheEvent::LocalTracksIngested(tracks.len()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::{fs, sync::mpsc};
    use tempfile::TempDir;

    fn start_worker(temp_dir: &TempDir, media_dirs: Vec<String>) -> (Sender<CacheTask>, Receiver<CacheEvent>) {
        let config = AppConfig {
            media_dirs,
            database_file: temp_dir.path().join("test.db").to_str().unwrap().to_string(),
            ..Default::default()
        };
        let (task_tx, task_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        spawn_task_worker(&config, task_rx, event_tx);
        (task_tx, event_rx)
    }

    #[test]
    fn scan_then_match_through_worker() {
        let temp_dir = TempDir::new().unwrap();
        let media = temp_dir.path().join("media");
        fs::create_dir(&media).unwrap();
        fs::write(media.join("a.mp3"), b"audio").unwrap();
        let path = media.join("a.mp3").to_str().unwrap().to_string();
        let local_id = scan::local_track_id(&path);

        let (task_tx, event_rx) =
            start_worker(&temp_dir, vec![media.to_str().unwrap().to_string()]);

        task_tx.send(CacheTask::ScanLibrary).unwrap();
        assert!(matches!(
            event_rx.recv().unwrap(),
            CacheEvent::LocalTracksIngested(1)
        ));

        let playlist = Playlist {
            id: 9,
            track_ids: vec![local_id, 5],
            ..Default::default()
        };
        task_tx.send(CacheTask::SaveLocalPlaylist(playlist)).unwrap();
        assert!(matches!(
            event_rx.recv().unwrap(),
            CacheEvent::PlaylistSaved(true)
        ));

        let search = serde_json::from_value(json!({ "result": { "songs": [{ "id": 777 }] } })).unwrap();
        task_tx
            .send(CacheTask::MatchLocalTrack { local_id, search })
            .unwrap();
        assert!(matches!(
            event_rx.recv().unwrap(),
            CacheEvent::Matched(MatchOutcome::Matched {
                track_id: 777,
                playlists_updated: 1
            })
        ));

        // Rescanning keeps the matched identity of the file
        task_tx.send(CacheTask::ScanLibrary).unwrap();
        event_rx.recv().unwrap();
        task_tx.send(CacheTask::GetLocalTracks).unwrap();
        match event_rx.recv().unwrap() {
            CacheEvent::LocalTracks(list) => {
                assert_eq!(list.songs.len(), 1);
                assert_eq!(list.songs[0].id, 777);
                assert!(list.songs[0].matched);
            }
            other => panic!("unexpected event {other:?}"),
        }

        task_tx.send(CacheTask::GetTracks(format!("{local_id}"))).unwrap();
        assert!(matches!(event_rx.recv().unwrap(), CacheEvent::Tracks(None)));
    }

    #[test]
    fn ingest_batch_through_worker() {
        let temp_dir = TempDir::new().unwrap();
        let (task_tx, event_rx) = start_worker(&temp_dir, vec![]);

        let tracks: Vec<Track> = serde_json::from_value(json!([
            { "id": -1, "filePath": "/a.mp3" },
            { "id": -2, "filePath": "/b.mp3", "deleted": true }
        ]))
        .unwrap();
        task_tx.send(CacheTask::IngestLocalTracks(tracks)).unwrap();
        assert!(matches!(
            event_rx.recv().unwrap(),
            CacheEvent::LocalTracksIngested(2)
        ));

        task_tx.send(CacheTask::GetTracks("-2,-1".to_string())).unwrap();
        match event_rx.recv().unwrap() {
            CacheEvent::Tracks(Some(list)) => {
                let ids: Vec<i64> = list.songs.iter().map(|t| t.id).collect();
                assert_eq!(ids, vec![-2, -1]);
                assert!(list.songs.iter().all(|t| t.is_local));
                assert!(list.songs[0].deleted);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn failed_task_reports_error_and_worker_continues() {
        let temp_dir = TempDir::new().unwrap();
        let (task_tx, event_rx) = start_worker(&temp_dir, vec![]);

        let search = serde_json::from_value(json!({ "result": { "songs": [{ "id": 1 }] } })).unwrap();
        task_tx
            .send(CacheTask::MatchLocalTrack { local_id: 100, search })
            .unwrap();
        match event_rx.recv().unwrap() {
            CacheEvent::Error(message) => assert!(message.contains("track 100 not found")),
            other => panic!("unexpected event {other:?}"),
        }

        task_tx.send(CacheTask::GetLoginStatus).unwrap();
        match event_rx.recv().unwrap() {
            CacheEvent::LoginStatus(account) => assert_eq!(account, Account::logged_out()),
            other => panic!("unexpected event {other:?}"),
        }
    }
}
