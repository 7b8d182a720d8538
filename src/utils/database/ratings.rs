use rusqlite::{OptionalExtension, params};
use std::fmt;

use super::Database;
use crate::commands::music::utils::MusicResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    Up,
    Down,
}

impl Vote {
    fn column(self) -> &'static str {
        match self {
            Vote::Up => "up",
            Vote::Down => "down",
        }
    }

    fn from_column(value: &str) -> Option<Self> {
        match value {
            "up" => Some(Vote::Up),
            "down" => Some(Vote::Down),
            _ => None,
        }
    }
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RatedTrack {
    pub title: String,
    pub url: String,
    pub up: u64,
    pub down: u64,
}

impl RatedTrack {
    pub fn score(&self) -> i64 {
        self.up as i64 - self.down as i64
    }
}

impl Database {
    /// Toggle a user's vote and return the new `(up, down)` counts.
    ///
    /// The same direction twice removes the vote; the other direction moves it.
    pub fn rate(&self, guild_id: u64, url: &str, title: &str, user_id: u64, vote: Vote) -> MusicResult<(u64, u64)> {
        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            "INSERT OR IGNORE INTO ratings (guild_id, url, title) VALUES (?1, ?2, ?3)",
            params![guild_id as i64, url, title],
        )?;

        let previous: Option<String> = tx
            .query_row(
                "SELECT direction FROM rating_votes WHERE guild_id = ?1 AND url = ?2 AND user_id = ?3",
                params![guild_id as i64, url, user_id as i64],
                |row| row.get(0),
            )
            .optional()?;
        let previous = previous.as_deref().and_then(Vote::from_column);

        let decrement = |direction: Vote| {
            tx.execute(
                &format!(
                    "UPDATE ratings SET {col} = MAX(0, {col} - 1) WHERE guild_id = ?1 AND url = ?2",
                    col = direction.column()
                ),
                params![guild_id as i64, url],
            )
        };

        if previous == Some(vote) {
            decrement(vote)?;
            tx.execute(
                "DELETE FROM rating_votes WHERE guild_id = ?1 AND url = ?2 AND user_id = ?3",
                params![guild_id as i64, url, user_id as i64],
            )?;
        } else {
            if let Some(previous) = previous {
                decrement(previous)?;
            }
            tx.execute(
                &format!(
                    "UPDATE ratings SET {col} = {col} + 1 WHERE guild_id = ?1 AND url = ?2",
                    col = vote.column()
                ),
                params![guild_id as i64, url],
            )?;
            tx.execute(
                "INSERT OR REPLACE INTO rating_votes (guild_id, url, user_id, direction)
                 VALUES (?1, ?2, ?3, ?4)",
                params![guild_id as i64, url, user_id as i64, vote.column()],
            )?;
        }

        let counts = tx.query_row(
            "SELECT up, down FROM ratings WHERE guild_id = ?1 AND url = ?2",
            params![guild_id as i64, url],
            |row| Ok((row.get::<_, i64>(0)? as u64, row.get::<_, i64>(1)? as u64)),
        )?;
        tx.commit()?;
        Ok(counts)
    }

    pub fn rating(&self, guild_id: u64, url: &str) -> MusicResult<(u64, u64)> {
        let counts = self
            .conn()
            .query_row(
                "SELECT up, down FROM ratings WHERE guild_id = ?1 AND url = ?2",
                params![guild_id as i64, url],
                |row| Ok((row.get::<_, i64>(0)? as u64, row.get::<_, i64>(1)? as u64)),
            )
            .optional()?;
        Ok(counts.unwrap_or((0, 0)))
    }

    /// Best net score first.
    pub fn top_rated(&self, guild_id: u64, limit: usize) -> MusicResult<Vec<RatedTrack>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT title, url, up, down FROM ratings WHERE guild_id = ?1
             ORDER BY (up - down) DESC, rowid ASC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![guild_id as i64, limit as i64], |row| {
            Ok(RatedTrack {
                title: row.get(0)?,
                url: row.get(1)?,
                up: row.get::<_, i64>(2)? as u64,
                down: row.get::<_, i64>(3)? as u64,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const URL: &str = "https://example.com/song";

    /// Voting the same way twice takes the vote back.
    #[test]
    fn test_rate_toggle() {
        let db = Database::open_in_memory().unwrap();

        assert_eq!(db.rate(1, URL, "Song", 10, Vote::Up).unwrap(), (1, 0));
        assert_eq!(db.rate(1, URL, "Song", 10, Vote::Up).unwrap(), (0, 0));
        assert_eq!(db.rating(1, URL).unwrap(), (0, 0));
    }

    /// Switching direction moves the vote instead of adding a second one.
    #[test]
    fn test_rate_switch() {
        let db = Database::open_in_memory().unwrap();
        db.rate(1, URL, "Song", 10, Vote::Up).unwrap();
        db.rate(1, URL, "Song", 11, Vote::Up).unwrap();

        assert_eq!(db.rate(1, URL, "Song", 10, Vote::Down).unwrap(), (1, 1));
        assert_eq!(db.rating(2, URL).unwrap(), (0, 0));
    }

    /// Counts never drop below zero even when stored votes and counts disagree.
    #[test]
    fn test_counts_floor_at_zero() {
        let db = Database::open_in_memory().unwrap();
        db.rate(1, URL, "Song", 10, Vote::Down).unwrap();
        db.conn()
            .execute("UPDATE ratings SET down = 0", [])
            .unwrap();

        assert_eq!(db.rate(1, URL, "Song", 10, Vote::Down).unwrap(), (0, 0));
    }

    #[test]
    fn test_top_rated_order() {
        let db = Database::open_in_memory().unwrap();
        db.rate(1, "a", "A", 1, Vote::Down).unwrap();
        db.rate(1, "b", "B", 1, Vote::Up).unwrap();
        db.rate(1, "b", "B", 2, Vote::Up).unwrap();
        db.rate(1, "c", "C", 1, Vote::Up).unwrap();

        let top = db.top_rated(1, 10).unwrap();

        assert_eq!(
            top.iter().map(|t| (t.title.as_str(), t.score())).collect::<Vec<_>>(),
            vec![("B", 2), ("C", 1), ("A", -1)]
        );
    }
}
