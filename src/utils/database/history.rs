//! Play history and the stats built on it.

use rusqlite::params;

use super::{Database, now_ts};
use crate::commands::music::audio_sources::track_metadata::TrackMetadata;
use crate::commands::music::utils::MusicResult;

/// Entries kept per guild; older rows are pruned on insert.
pub const MAX_HISTORY: usize = 500;
const TOP_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserStats {
    pub total_plays: u64,
    pub total_time_seconds: i64,
    pub top_tracks: Vec<(String, u64)>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServerStats {
    pub total_plays: u64,
    pub total_time_seconds: i64,
    pub unique_tracks: u64,
    pub top_tracks: Vec<(String, u64)>,
    pub top_users: Vec<(u64, u64)>,
}

impl Database {
    /// Record a started track and trim the guild's history to [`MAX_HISTORY`] rows.
    pub fn record_play(
        &self,
        guild_id: u64,
        track: &TrackMetadata,
        requester_id: Option<u64>,
        duration: i64,
    ) -> MusicResult<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO history (guild_id, title, url, ts, user_id, duration)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                guild_id as i64,
                track.title,
                track.url,
                now_ts(),
                requester_id.filter(|id| *id != 0).map(|id| id as i64),
                Some(duration).filter(|d| *d > 0),
            ],
        )?;
        conn.execute(
            "DELETE FROM history WHERE guild_id = ?1 AND id NOT IN (
                SELECT id FROM history WHERE guild_id = ?1 ORDER BY id DESC LIMIT ?2
             )",
            params![guild_id as i64, MAX_HISTORY as i64],
        )?;
        Ok(())
    }

    pub fn history_len(&self, guild_id: u64) -> MusicResult<usize> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM history WHERE guild_id = ?1",
            params![guild_id as i64],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Most played titles as `(title, latest url, plays)`. Ties keep first-played order.
    pub fn top_tracks(&self, guild_id: u64, limit: usize) -> MusicResult<Vec<(String, String, u64)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT h.title,
                    (SELECT url FROM history l WHERE l.guild_id = h.guild_id AND l.title = h.title
                     ORDER BY l.id DESC LIMIT 1),
                    COUNT(*) AS plays
             FROM history h
             WHERE h.guild_id = ?1
             GROUP BY h.title
             ORDER BY plays DESC, MIN(h.id) ASC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![guild_id as i64, limit as i64], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get::<_, i64>(2)? as u64))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn title_counts(&self, guild_id: u64, user_id: Option<u64>) -> MusicResult<Vec<(String, u64)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT title, COUNT(*) AS plays FROM history
             WHERE guild_id = ?1 AND (?2 IS NULL OR user_id = ?2)
             GROUP BY title
             ORDER BY plays DESC, MIN(id) ASC
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(
            params![guild_id as i64, user_id.map(|id| id as i64), TOP_LIMIT as i64],
            |row| Ok((row.get(0)?, row.get::<_, i64>(1)? as u64)),
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn user_stats(&self, guild_id: u64, user_id: u64) -> MusicResult<UserStats> {
        let (plays, time): (i64, i64) = self.conn().query_row(
            "SELECT COUNT(*), COALESCE(SUM(duration), 0) FROM history
             WHERE guild_id = ?1 AND user_id = ?2",
            params![guild_id as i64, user_id as i64],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(UserStats {
            total_plays: plays as u64,
            total_time_seconds: time,
            top_tracks: self.title_counts(guild_id, Some(user_id))?,
        })
    }

    pub fn server_stats(&self, guild_id: u64) -> MusicResult<ServerStats> {
        let (plays, time, unique): (i64, i64, i64) = self.conn().query_row(
            "SELECT COUNT(*), COALESCE(SUM(duration), 0), COUNT(DISTINCT url) FROM history
             WHERE guild_id = ?1",
            params![guild_id as i64],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let top_users = {
            let conn = self.conn();
            let mut stmt = conn.prepare(
                "SELECT user_id, COUNT(*) AS plays FROM history
                 WHERE guild_id = ?1 AND user_id IS NOT NULL
                 GROUP BY user_id
                 ORDER BY plays DESC, MIN(id) ASC
                 LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![guild_id as i64, TOP_LIMIT as i64], |row| {
                Ok((row.get::<_, i64>(0)? as u64, row.get::<_, i64>(1)? as u64))
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        Ok(ServerStats {
            total_plays: plays as u64,
            total_time_seconds: time,
            unique_tracks: unique as u64,
            top_tracks: self.title_counts(guild_id, None)?,
            top_users,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn track(title: &str) -> TrackMetadata {
        TrackMetadata {
            title: title.to_string(),
            url: format!("https://example.com/{}", title),
            ..Default::default()
        }
    }

    /// Only the newest 500 plays are kept per guild, and other guilds are untouched.
    #[test]
    fn test_history_cap() {
        let db = Database::open_in_memory().unwrap();
        db.record_play(2, &track("other"), None, 0).unwrap();
        for i in 0..MAX_HISTORY + 5 {
            db.record_play(1, &track(&format!("t{}", i)), Some(1), 10).unwrap();
        }

        assert_eq!(db.history_len(1).unwrap(), MAX_HISTORY);
        assert_eq!(db.history_len(2).unwrap(), 1);
        let top = db.top_tracks(1, 1).unwrap();
        assert_eq!(top[0].0, "t5");
    }

    /// Play counts aggregate per title; ties keep the order they were first played in.
    #[test]
    fn test_top_tracks() {
        let db = Database::open_in_memory().unwrap();
        for title in ["a", "b", "a", "c", "b", "a"] {
            db.record_play(1, &track(title), None, 0).unwrap();
        }

        let top = db.top_tracks(1, 2).unwrap();

        assert_eq!(
            top,
            vec![
                ("a".to_string(), "https://example.com/a".to_string(), 3),
                ("b".to_string(), "https://example.com/b".to_string(), 2),
            ]
        );
    }

    #[test]
    fn test_user_and_server_stats() {
        let db = Database::open_in_memory().unwrap();
        db.record_play(1, &track("a"), Some(10), 200).unwrap();
        db.record_play(1, &track("a"), Some(10), 200).unwrap();
        db.record_play(1, &track("b"), Some(20), 100).unwrap();
        db.record_play(1, &track("live"), None, 0).unwrap();

        let user = db.user_stats(1, 10).unwrap();
        assert_eq!(user.total_plays, 2);
        assert_eq!(user.total_time_seconds, 400);
        assert_eq!(user.top_tracks, vec![("a".to_string(), 2)]);

        let server = db.server_stats(1).unwrap();
        assert_eq!(server.total_plays, 4);
        assert_eq!(server.total_time_seconds, 500);
        assert_eq!(server.unique_tracks, 3);
        assert_eq!(server.top_tracks[0], ("a".to_string(), 2));
        assert_eq!(server.top_users, vec![(10, 2), (20, 1)]);
    }

    #[test]
    fn test_empty_stats() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.server_stats(1).unwrap(), ServerStats::default());
        assert_eq!(db.user_stats(1, 1).unwrap(), UserStats::default());
    }
}
