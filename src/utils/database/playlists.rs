//! Saved per-server playlists with collaborators.

use rusqlite::{OptionalExtension, Row, params};

use super::{Database, now_ts};
use crate::commands::music::audio_sources::track_metadata::TrackMetadata;
use crate::commands::music::utils::{MusicError, MusicResult};

pub const MAX_PLAYLISTS: usize = 25;
pub const MAX_PLAYLIST_TRACKS: usize = 200;
pub const MAX_PLAYLIST_NAME: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct Playlist {
    pub name: String,
    pub tracks: Vec<TrackMetadata>,
    pub created_by: u64,
    pub created_at: f64,
    pub collaborators: Vec<u64>,
}

impl Playlist {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let tracks: String = row.get(1)?;
        let collaborators: String = row.get(4)?;
        Ok(Self {
            name: row.get(0)?,
            tracks: serde_json::from_str(&tracks).unwrap_or_default(),
            created_by: row.get::<_, i64>(2)? as u64,
            created_at: row.get(3)?,
            collaborators: serde_json::from_str(&collaborators).unwrap_or_default(),
        })
    }

    pub fn is_collaborator(&self, user_id: u64) -> bool {
        self.collaborators.contains(&user_id)
    }
}

/// Requester details do not belong to a saved playlist.
fn stored_track(track: &TrackMetadata) -> TrackMetadata {
    TrackMetadata {
        requested_by: None,
        requester_id: None,
        ..track.clone()
    }
}

fn key(name: &str) -> String {
    name.trim().to_lowercase()
}

impl Database {
    fn update_playlist_json(&self, guild_id: u64, name: &str, column: &str, json: String) -> MusicResult<()> {
        self.conn().execute(
            &format!(
                "UPDATE playlists SET {} = ?3 WHERE guild_id = ?1 AND name_key = ?2",
                column
            ),
            params![guild_id as i64, key(name), json],
        )?;
        Ok(())
    }

    /// Save or overwrite a playlist. Overwriting keeps the collaborators.
    /// Limit violations are `InvalidInput` with a user-facing message.
    pub fn save_playlist(
        &self,
        guild_id: u64,
        name: &str,
        tracks: &[TrackMetadata],
        created_by: u64,
    ) -> MusicResult<()> {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > MAX_PLAYLIST_NAME {
            return Err(MusicError::InvalidInput(format!(
                "Playlist names must be 1-{} characters.",
                MAX_PLAYLIST_NAME
            )));
        }

        let existing = self.load_playlist(guild_id, name)?;
        if existing.is_none() && self.playlist_names(guild_id)?.len() >= MAX_PLAYLISTS {
            return Err(MusicError::InvalidInput(format!(
                "Server already has {} playlists.",
                MAX_PLAYLISTS
            )));
        }

        let stored: Vec<TrackMetadata> = tracks
            .iter()
            .take(MAX_PLAYLIST_TRACKS)
            .map(stored_track)
            .collect();
        let collaborators = existing.map(|p| p.collaborators).unwrap_or_default();

        self.conn().execute(
            "INSERT OR REPLACE INTO playlists
                (guild_id, name_key, name, tracks, created_by, created_at, collaborators)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                guild_id as i64,
                key(name),
                name,
                serde_json::to_string(&stored)?,
                created_by as i64,
                now_ts(),
                serde_json::to_string(&collaborators)?,
            ],
        )?;
        Ok(())
    }

    /// Look up a playlist by name, case-insensitively.
    pub fn load_playlist(&self, guild_id: u64, name: &str) -> MusicResult<Option<Playlist>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT name, tracks, created_by, created_at, collaborators FROM playlists
                 WHERE guild_id = ?1 AND name_key = ?2",
                params![guild_id as i64, key(name)],
                Playlist::from_row,
            )
            .optional()?)
    }

    pub fn delete_playlist(&self, guild_id: u64, name: &str) -> MusicResult<bool> {
        let deleted = self.conn().execute(
            "DELETE FROM playlists WHERE guild_id = ?1 AND name_key = ?2",
            params![guild_id as i64, key(name)],
        )?;
        Ok(deleted > 0)
    }

    pub fn playlists(&self, guild_id: u64) -> MusicResult<Vec<Playlist>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT name, tracks, created_by, created_at, collaborators FROM playlists
             WHERE guild_id = ?1 ORDER BY created_at",
        )?;
        let rows = stmt.query_map(params![guild_id as i64], Playlist::from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Display names, for autocomplete.
    pub fn playlist_names(&self, guild_id: u64) -> MusicResult<Vec<String>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT name FROM playlists WHERE guild_id = ?1 ORDER BY created_at")?;
        let rows = stmt.query_map(params![guild_id as i64], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn playlist_creator(&self, guild_id: u64, name: &str) -> MusicResult<Option<u64>> {
        Ok(self.load_playlist(guild_id, name)?.map(|p| p.created_by))
    }

    pub fn is_playlist_collaborator(&self, guild_id: u64, name: &str, user_id: u64) -> MusicResult<bool> {
        Ok(self
            .load_playlist(guild_id, name)?
            .is_some_and(|p| p.is_collaborator(user_id)))
    }

    /// `false` when the playlist is missing or the user already collaborates.
    pub fn add_collaborator(&self, guild_id: u64, name: &str, user_id: u64) -> MusicResult<bool> {
        let Some(mut playlist) = self.load_playlist(guild_id, name)? else {
            return Ok(false);
        };
        if playlist.is_collaborator(user_id) {
            return Ok(false);
        }
        playlist.collaborators.push(user_id);
        self.update_playlist_json(
            guild_id,
            name,
            "collaborators",
            serde_json::to_string(&playlist.collaborators)?,
        )?;
        Ok(true)
    }

    pub fn remove_collaborator(&self, guild_id: u64, name: &str, user_id: u64) -> MusicResult<bool> {
        let Some(mut playlist) = self.load_playlist(guild_id, name)? else {
            return Ok(false);
        };
        let before = playlist.collaborators.len();
        playlist.collaborators.retain(|id| *id != user_id);
        if playlist.collaborators.len() == before {
            return Ok(false);
        }
        self.update_playlist_json(
            guild_id,
            name,
            "collaborators",
            serde_json::to_string(&playlist.collaborators)?,
        )?;
        Ok(true)
    }

    pub fn add_playlist_track(&self, guild_id: u64, name: &str, track: &TrackMetadata) -> MusicResult<()> {
        let Some(mut playlist) = self.load_playlist(guild_id, name)? else {
            return Err(MusicError::InvalidInput("Playlist not found.".to_string()));
        };
        if playlist.tracks.len() >= MAX_PLAYLIST_TRACKS {
            return Err(MusicError::InvalidInput(format!(
                "Playlist is full ({} tracks max).",
                MAX_PLAYLIST_TRACKS
            )));
        }
        playlist.tracks.push(stored_track(track));
        self.update_playlist_json(guild_id, name, "tracks", serde_json::to_string(&playlist.tracks)?)
    }

    /// Remove the track at a 0-based index.
    pub fn remove_playlist_track(&self, guild_id: u64, name: &str, index: usize) -> MusicResult<Option<TrackMetadata>> {
        let Some(mut playlist) = self.load_playlist(guild_id, name)? else {
            return Ok(None);
        };
        if index >= playlist.tracks.len() {
            return Ok(None);
        }
        let removed = playlist.tracks.remove(index);
        self.update_playlist_json(guild_id, name, "tracks", serde_json::to_string(&playlist.tracks)?)?;
        Ok(Some(removed))
    }
}
