//! SQLite persistence for everything that outlives a restart: guild settings, the crash-recovery
//! queue snapshot, play history, favorites, saved playlists and ratings.
//!
//! Settings and queue snapshots are stored as JSON blobs so new settings keys never need a
//! migration. The other tables are relational so the stats queries can aggregate in SQL.

mod favorites;
mod history;
mod playlists;
mod ratings;

pub use favorites::{Favorite, MAX_FAVORITES};
pub use history::{ServerStats, UserStats};
pub use playlists::{MAX_PLAYLIST_NAME, MAX_PLAYLIST_TRACKS, MAX_PLAYLISTS, Playlist};
pub use ratings::{RatedTrack, Vote};

use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

use crate::commands::music::utils::MusicResult;
use crate::commands::music::utils::guild_settings::GuildSettings;
use crate::commands::music::utils::queue_manager::QueueState;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS guild_settings (
        guild_id INTEGER PRIMARY KEY,
        data TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS queue_state (
        guild_id INTEGER PRIMARY KEY,
        data TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        guild_id INTEGER NOT NULL,
        title TEXT NOT NULL,
        url TEXT NOT NULL,
        ts REAL NOT NULL,
        user_id INTEGER,
        duration INTEGER
    );
    CREATE INDEX IF NOT EXISTS history_guild ON history (guild_id, id);
    CREATE TABLE IF NOT EXISTS favorites (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        guild_id INTEGER NOT NULL,
        title TEXT NOT NULL,
        url TEXT NOT NULL,
        duration INTEGER,
        thumbnail TEXT
    );
    CREATE TABLE IF NOT EXISTS playlists (
        guild_id INTEGER NOT NULL,
        name_key TEXT NOT NULL,
        name TEXT NOT NULL,
        tracks TEXT NOT NULL,
        created_by INTEGER NOT NULL,
        created_at REAL NOT NULL,
        collaborators TEXT NOT NULL DEFAULT '[]',
        PRIMARY KEY (guild_id, name_key)
    );
    CREATE TABLE IF NOT EXISTS ratings (
        guild_id INTEGER NOT NULL,
        url TEXT NOT NULL,
        title TEXT NOT NULL,
        up INTEGER NOT NULL DEFAULT 0,
        down INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (guild_id, url)
    );
    CREATE TABLE IF NOT EXISTS rating_votes (
        guild_id INTEGER NOT NULL,
        url TEXT NOT NULL,
        user_id INTEGER NOT NULL,
        direction TEXT NOT NULL,
        PRIMARY KEY (guild_id, url, user_id)
    );
";

/// Handle to the bot's SQLite database.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database file, creating its directory if needed.
    pub fn open(path: impl AsRef<Path>) -> MusicResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("Could not create data directory {}: {}", parent.display(), e);
            }
        }
        info!("Opening database at {}", path.display());
        Self::init(Connection::open(path)?)
    }

    /// A throwaway database, used by tests.
    pub fn open_in_memory() -> MusicResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> MusicResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Statements are short, so a poisoned lock still holds a usable connection.
    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn load_blob<T: DeserializeOwned>(&self, table: &str, guild_id: u64) -> MusicResult<Option<T>> {
        let data: Option<String> = self
            .conn()
            .query_row(
                &format!("SELECT data FROM {} WHERE guild_id = ?1", table),
                params![guild_id as i64],
                |row| row.get(0),
            )
            .optional()?;

        match data {
            Some(json) => match serde_json::from_str(&json) {
                Ok(value) => Ok(Some(value)),
                Err(e) => {
                    warn!("Ignoring unreadable {} for guild {}: {}", table, guild_id, e);
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    fn store_blob<T: Serialize>(&self, table: &str, guild_id: u64, value: &T) -> MusicResult<()> {
        let json = serde_json::to_string(value)?;
        self.conn().execute(
            &format!(
                "INSERT OR REPLACE INTO {} (guild_id, data) VALUES (?1, ?2)",
                table
            ),
            params![guild_id as i64, json],
        )?;
        Ok(())
    }

    pub fn load_settings(&self, guild_id: u64) -> MusicResult<Option<GuildSettings>> {
        self.load_blob("guild_settings", guild_id)
    }

    pub fn save_settings(&self, guild_id: u64, settings: &GuildSettings) -> MusicResult<()> {
        self.store_blob("guild_settings", guild_id, settings)
    }

    pub fn load_queue_state(&self, guild_id: u64) -> MusicResult<Option<QueueState>> {
        self.load_blob("queue_state", guild_id)
    }

    pub fn save_queue_state(&self, guild_id: u64, state: &QueueState) -> MusicResult<()> {
        self.store_blob("queue_state", guild_id, state)
    }

    pub fn clear_queue_state(&self, guild_id: u64) -> MusicResult<()> {
        self.conn().execute(
            "DELETE FROM queue_state WHERE guild_id = ?1",
            params![guild_id as i64],
        )?;
        Ok(())
    }
}

/// Seconds since the epoch with millisecond precision.
pub(crate) fn now_ts() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::music::audio_sources::track_metadata::TrackMetadata;
    use crate::commands::music::utils::guild_settings::LoopMode;
    use pretty_assertions::assert_eq;

    /// Settings round-trip and unknown guilds have none.
    #[test]
    fn test_settings_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        let settings = GuildSettings {
            volume: 0.8,
            max_queue: 10,
            loop_mode: LoopMode::Queue,
            ..Default::default()
        };

        db.save_settings(1, &settings).unwrap();

        assert_eq!(db.load_settings(1).unwrap(), Some(settings));
        assert_eq!(db.load_settings(2).unwrap(), None);
    }

    /// A partially written blob loads with defaults for the missing keys.
    #[test]
    fn test_settings_partial_blob() {
        let db = Database::open_in_memory().unwrap();
        db.conn()
            .execute(
                "INSERT INTO guild_settings (guild_id, data) VALUES (5, ?1)",
                params![r#"{"volume": 0.3, "loop_mode": "BOGUS", "eq_bands": [1.0, 2.0]}"#],
            )
            .unwrap();

        let settings = db.load_settings(5).unwrap().unwrap();

        assert_eq!(settings.volume, 0.3);
        assert_eq!(settings.loop_mode, LoopMode::Off);
        assert_eq!(settings.eq_bands[..3], [1.0, 2.0, 0.0]);
        assert_eq!(settings.max_queue, 50);
    }

    /// Garbage in a blob is treated as absent rather than failing the guild.
    #[test]
    fn test_unreadable_blob_is_ignored() {
        let db = Database::open_in_memory().unwrap();
        db.conn()
            .execute("INSERT INTO queue_state (guild_id, data) VALUES (9, 'not json')", [])
            .unwrap();

        assert!(db.load_queue_state(9).unwrap().is_none());
    }

    #[test]
    fn test_queue_state_clear() {
        let db = Database::open_in_memory().unwrap();
        let state = QueueState {
            queue: vec![TrackMetadata::from_search_term("a")],
            loop_mode: LoopMode::Off,
            current: None,
            elapsed: None,
        };
        db.save_queue_state(3, &state).unwrap();
        assert_eq!(db.load_queue_state(3).unwrap(), Some(state));

        db.clear_queue_state(3).unwrap();
        assert_eq!(db.load_queue_state(3).unwrap(), None);
    }
}
