use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serenity::model::id::GuildId;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::guild_queue::GuildQueue;
use super::guild_settings::LoopMode;
use crate::commands::music::audio_sources::track_metadata::TrackMetadata;
use crate::utils::database::Database;

/// Crash-recovery snapshot of a guild's queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueState {
    #[serde(default)]
    pub queue: Vec<TrackMetadata>,
    #[serde(default)]
    pub loop_mode: LoopMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<TrackMetadata>,
    /// Seconds into `current` when the snapshot was taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<u64>,
}

impl QueueState {
    pub fn capture(gq: &GuildQueue) -> Self {
        Self {
            queue: gq.queue.iter().cloned().collect(),
            loop_mode: gq.settings.loop_mode,
            current: gq.current.clone(),
            elapsed: gq.current.as_ref().map(|_| gq.elapsed_secs()),
        }
    }

    /// Put the saved tracks back, the interrupted one first.
    pub fn restore_into(self, gq: &mut GuildQueue) {
        if let Some(current) = self.current {
            gq.queue.push_front(current);
        }
        gq.queue.extend(self.queue);
        gq.settings.loop_mode = self.loop_mode;
    }
}

/// Owns every guild's queue and writes them through to the database.
pub struct QueueManager {
    guilds: DashMap<GuildId, Arc<Mutex<GuildQueue>>>,
    db: Arc<Database>,
}

impl QueueManager {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            guilds: DashMap::new(),
            db,
        }
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    /// The guild's queue, loading settings and any saved queue on first access.
    pub fn get(&self, guild_id: GuildId) -> Arc<Mutex<GuildQueue>> {
        self.guilds
            .entry(guild_id)
            .or_insert_with(|| Arc::new(Mutex::new(self.load(guild_id))))
            .clone()
    }

    /// Queues already in memory, for background work such as idle checks.
    pub fn loaded(&self) -> Vec<(GuildId, Arc<Mutex<GuildQueue>>)> {
        self.guilds
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    fn load(&self, guild_id: GuildId) -> GuildQueue {
        let settings = match self.db.load_settings(guild_id.get()) {
            Ok(settings) => settings.unwrap_or_default(),
            Err(e) => {
                warn!("Failed to load settings for guild {}: {}", guild_id, e);
                Default::default()
            }
        };
        let mut gq = GuildQueue::new(settings);

        match self.db.load_queue_state(guild_id.get()) {
            Ok(Some(state)) => {
                info!(
                    "Restoring {} saved tracks for guild {}",
                    state.queue.len() + usize::from(state.current.is_some()),
                    guild_id
                );
                state.restore_into(&mut gq);
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to load queue state for guild {}: {}", guild_id, e),
        }
        gq
    }

    pub fn save_settings(&self, guild_id: GuildId, gq: &GuildQueue) {
        if let Err(e) = self.db.save_settings(guild_id.get(), &gq.settings) {
            warn!("Failed to save settings for guild {}: {}", guild_id, e);
        }
    }

    pub fn save_queue_state(&self, guild_id: GuildId, gq: &GuildQueue) {
        debug!("Saving queue state for guild {}", guild_id);
        if let Err(e) = self.db.save_queue_state(guild_id.get(), &QueueState::capture(gq)) {
            warn!("Failed to save queue state for guild {}: {}", guild_id, e);
        }
    }

    pub fn clear_queue_state(&self, guild_id: GuildId) {
        if let Err(e) = self.db.clear_queue_state(guild_id.get()) {
            warn!("Failed to clear queue state for guild {}: {}", guild_id, e);
        }
    }

    /// Drop the in-memory queue; the next `get` reloads from the database.
    pub fn remove(&self, guild_id: GuildId) {
        self.guilds.remove(&guild_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn manager() -> QueueManager {
        QueueManager::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    fn track(title: &str) -> TrackMetadata {
        TrackMetadata::from_search_term(title)
    }

    /// The same Arc is handed out until the guild is removed.
    #[tokio::test]
    async fn test_get_is_cached() {
        let qm = manager();
        let guild = GuildId::new(1);

        let a = qm.get(guild);
        a.lock().await.add(track("x"));
        let b = qm.get(guild);

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(qm.loaded().len(), 1);
    }

    /// Settings survive a reload through the database.
    #[tokio::test]
    async fn test_settings_persist() {
        let qm = manager();
        let guild = GuildId::new(2);
        {
            let gq = qm.get(guild);
            let mut gq = gq.lock().await;
            gq.settings.volume = 0.9;
            gq.settings.max_per_user = 3;
            qm.save_settings(guild, &gq);
        }

        qm.remove(guild);
        let gq = qm.get(guild);
        let gq = gq.lock().await;

        assert_eq!(gq.settings.volume, 0.9);
        assert_eq!(gq.settings.max_per_user, 3);
    }

    /// A saved queue comes back with the interrupted track at the front.
    #[tokio::test]
    async fn test_queue_state_restored_current_first() {
        let qm = manager();
        let guild = GuildId::new(3);
        {
            let gq = qm.get(guild);
            let mut gq = gq.lock().await;
            gq.add(track("a"));
            gq.add(track("b"));
            gq.add(track("c"));
            gq.next_track();
            gq.settings.loop_mode = LoopMode::Queue;
            qm.save_queue_state(guild, &gq);
        }

        qm.remove(guild);
        let gq = qm.get(guild);
        let gq = gq.lock().await;

        assert_eq!(
            gq.queue.iter().map(|t| t.title.as_str()).collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
        assert_eq!(gq.current, None);
        assert_eq!(gq.settings.loop_mode, LoopMode::Queue);
    }

    /// Clearing the saved state means a reload starts empty.
    #[tokio::test]
    async fn test_clear_queue_state() {
        let qm = manager();
        let guild = GuildId::new(4);
        {
            let gq = qm.get(guild);
            let mut gq = gq.lock().await;
            gq.add(track("a"));
            qm.save_queue_state(guild, &gq);
        }
        qm.clear_queue_state(guild);
        qm.remove(guild);

        assert!(qm.get(guild).lock().await.is_empty());
    }

    #[test]
    fn test_capture_elapsed_only_with_current() {
        let mut gq = GuildQueue::default();
        gq.add(track("a"));
        assert_eq!(QueueState::capture(&gq).elapsed, None);

        gq.next_track();
        gq.clock.start(42, 1.0);
        let state = QueueState::capture(&gq);
        assert_eq!(state.current.map(|t| t.title), Some("a".to_string()));
        assert!(state.elapsed.unwrap() >= 42);
    }
}
