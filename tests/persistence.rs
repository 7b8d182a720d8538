//! Everything the bot stores must survive closing and reopening the database file.

#[allow(dead_code)]
mod common;

use pretty_assertions::assert_eq;
use rstest::{fixture, rstest};
use serenity::model::id::GuildId;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use common::fixtures::{GUILD_ID, OTHER_GUILD_ID, USER_ID, track, tracks};
use essusic::commands::music::utils::guild_settings::{LoopMode, SearchMode};
use essusic::commands::music::utils::queue_manager::QueueManager;
use essusic::utils::database::{Database, Vote};

struct Store {
    _dir: TempDir,
    path: PathBuf,
}

impl Store {
    /// A fresh handle, as after a restart.
    fn open(&self) -> Database {
        Database::open(&self.path).expect("open database")
    }

    fn manager(&self) -> QueueManager {
        QueueManager::new(Arc::new(self.open()))
    }
}

#[fixture]
fn store() -> Store {
    common::init_tracing();
    let dir = TempDir::new().expect("tempdir");
    // nested, so `open` has to create the data directory
    let path = dir.path().join("data").join("essusic.db");
    Store { _dir: dir, path }
}

#[rstest]
#[tokio::test]
async fn test_settings_survive_restart(store: Store) {
    let guild = GuildId::new(GUILD_ID);
    {
        let qm = store.manager();
        let queue = qm.get(guild);
        let mut gq = queue.lock().await;
        gq.settings.volume = 0.8;
        gq.settings.search_mode = SearchMode::Spotify;
        gq.settings.locale = "de".to_string();
        gq.settings.stay_connected = true;
        gq.settings.eq_bands[0] = 6.0;
        qm.save_settings(guild, &gq);
    }

    let qm = store.manager();
    let queue = qm.get(guild);
    let gq = queue.lock().await;
    assert_eq!(gq.settings.volume, 0.8);
    assert_eq!(gq.settings.search_mode, SearchMode::Spotify);
    assert_eq!(gq.settings.locale, "de");
    assert!(gq.settings.stay_connected);
    assert!(gq.settings.eq_active());

    let other = qm.get(GuildId::new(OTHER_GUILD_ID));
    assert_eq!(other.lock().await.settings.volume, 0.5);
}

#[rstest]
#[tokio::test]
async fn test_queue_restored_after_crash(store: Store) {
    let guild = GuildId::new(GUILD_ID);
    let saved = tracks(4);
    {
        let qm = store.manager();
        let queue = qm.get(guild);
        let mut gq = queue.lock().await;
        for t in &saved {
            gq.add(t.clone());
        }
        gq.next_track();
        gq.settings.loop_mode = LoopMode::Single;
        qm.save_queue_state(guild, &gq);
    }

    let qm = store.manager();
    let queue = qm.get(guild);
    let gq = queue.lock().await;
    let urls: Vec<&str> = gq.queue.iter().map(|t| t.url.as_str()).collect();
    let expected: Vec<&str> = saved.iter().map(|t| t.url.as_str()).collect();
    assert_eq!(urls, expected);
    assert_eq!(gq.current, None);
    assert_eq!(gq.settings.loop_mode, LoopMode::Single);
}

#[rstest]
#[tokio::test]
async fn test_cleared_queue_stays_empty(store: Store) {
    let guild = GuildId::new(GUILD_ID);
    {
        let qm = store.manager();
        let queue = qm.get(guild);
        let mut gq = queue.lock().await;
        gq.add(track("abc"));
        qm.save_queue_state(guild, &gq);
        qm.clear_queue_state(guild);
    }

    let qm = store.manager();
    assert!(qm.get(guild).lock().await.is_empty());
}

#[rstest]
fn test_history_favorites_ratings_survive_restart(store: Store) {
    let song = track("hit");
    {
        let db = store.open();
        for _ in 0..3 {
            db.record_play(GUILD_ID, &song, Some(USER_ID), 200).unwrap();
        }
        assert!(db.add_favorite(USER_ID, &song, GUILD_ID).unwrap());
        db.rate(GUILD_ID, &song.url, &song.title, USER_ID, Vote::Up).unwrap();
    }

    let db = store.open();
    let stats = db.server_stats(GUILD_ID).unwrap();
    assert_eq!(stats.total_plays, 3);
    assert_eq!(stats.unique_tracks, 1);
    assert_eq!(stats.total_time_seconds, 600);
    assert_eq!(stats.top_users, vec![(USER_ID, 3)]);

    let mine = db.user_stats(GUILD_ID, USER_ID).unwrap();
    assert_eq!(mine.total_plays, 3);

    let favorites = db.favorites(USER_ID).unwrap();
    assert_eq!(favorites.len(), 1);
    assert_eq!(favorites[0].url, song.url);
    assert!(db.favorites_for_guild(USER_ID, OTHER_GUILD_ID).unwrap().is_empty());

    assert_eq!(db.rating(GUILD_ID, &song.url).unwrap(), (1, 0));
}

#[rstest]
fn test_playlists_survive_restart(store: Store) {
    let saved = tracks(3);
    let collaborator = USER_ID + 1;
    {
        let db = store.open();
        db.save_playlist(GUILD_ID, "Road Trip", &saved, USER_ID).unwrap();
        assert!(db.add_collaborator(GUILD_ID, "road trip", collaborator).unwrap());
    }

    let db = store.open();
    let playlist = db
        .load_playlist(GUILD_ID, "ROAD TRIP")
        .unwrap()
        .expect("playlist saved");
    assert_eq!(playlist.name, "Road Trip");
    assert_eq!(playlist.created_by, USER_ID);
    assert_eq!(playlist.tracks.len(), 3);
    assert!(playlist.is_collaborator(collaborator));
    assert_eq!(db.playlist_names(GUILD_ID).unwrap(), vec!["Road Trip".to_string()]);
    assert!(db.playlist_names(OTHER_GUILD_ID).unwrap().is_empty());
}
