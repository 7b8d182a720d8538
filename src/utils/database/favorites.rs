use rusqlite::{Row, params};
use std::time::Duration;

use super::Database;
use crate::commands::music::audio_sources::track_metadata::TrackMetadata;
use crate::commands::music::utils::MusicResult;

pub const MAX_FAVORITES: usize = 50;

/// A track a user starred, remembered together with the server it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Favorite {
    pub title: String,
    pub url: String,
    pub duration: i64,
    pub thumbnail: Option<String>,
    pub guild_id: u64,
}

impl Favorite {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            title: row.get(0)?,
            url: row.get(1)?,
            duration: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
            thumbnail: row.get(3)?,
            guild_id: row.get::<_, i64>(4)? as u64,
        })
    }

    /// Queue entry for this favorite on behalf of `requester`.
    pub fn to_track(&self, requester: &str, requester_id: u64) -> TrackMetadata {
        TrackMetadata {
            title: self.title.clone(),
            url: self.url.clone(),
            duration: (self.duration > 0).then(|| Duration::from_secs(self.duration as u64)),
            thumbnail: self.thumbnail.clone(),
            ..Default::default()
        }
        .requested(requester, requester_id)
    }
}

impl Database {
    /// Star a track. `false` when the user already has it or has hit the limit.
    pub fn add_favorite(&self, user_id: u64, track: &TrackMetadata, guild_id: u64) -> MusicResult<bool> {
        let conn = self.conn();
        let (count, duplicate): (i64, bool) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(url = ?2), 0) > 0 FROM favorites WHERE user_id = ?1",
            params![user_id as i64, track.url],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        if count as usize >= MAX_FAVORITES || duplicate {
            return Ok(false);
        }

        conn.execute(
            "INSERT INTO favorites (user_id, guild_id, title, url, duration, thumbnail)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user_id as i64,
                guild_id as i64,
                track.title,
                track.url,
                track.duration_secs(),
                track.thumbnail,
            ],
        )?;
        Ok(true)
    }

    /// Remove by 0-based position in [`Database::favorites`] order.
    pub fn remove_favorite(&self, user_id: u64, index: usize) -> MusicResult<Option<Favorite>> {
        let conn = self.conn();
        let found = conn.query_row(
            "SELECT id, title, url, duration, thumbnail, guild_id FROM favorites
             WHERE user_id = ?1 ORDER BY id LIMIT 1 OFFSET ?2",
            params![user_id as i64, index as i64],
            |row| {
                let id: i64 = row.get(0)?;
                Ok((
                    id,
                    Favorite {
                        title: row.get(1)?,
                        url: row.get(2)?,
                        duration: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
                        thumbnail: row.get(4)?,
                        guild_id: row.get::<_, i64>(5)? as u64,
                    },
                ))
            },
        );

        match found {
            Ok((id, favorite)) => {
                conn.execute("DELETE FROM favorites WHERE id = ?1", params![id])?;
                Ok(Some(favorite))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn favorites(&self, user_id: u64) -> MusicResult<Vec<Favorite>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT title, url, duration, thumbnail, guild_id FROM favorites
             WHERE user_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![user_id as i64], Favorite::from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Favorites saved from one server.
    pub fn favorites_for_guild(&self, user_id: u64, guild_id: u64) -> MusicResult<Vec<Favorite>> {
        Ok(self
            .favorites(user_id)?
            .into_iter()
            .filter(|f| f.guild_id == guild_id)
            .collect())
    }
}
