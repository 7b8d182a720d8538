use poise::serenity_prelude as serenity;
use serenity::client::Context;
use serenity::model::id::{ChannelId, GuildId, MessageId};
use serenity::prelude::Mutex as SerenityMutex;
use songbird::tracks::TrackHandle;
use songbird::{Call, Songbird};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{MusicError, MusicResult};

/// Runtime voice state for one guild. The queue itself lives in `GuildQueue`.
#[derive(Debug, Default)]
pub struct Session {
    /// The track currently audible.
    pub track: Option<TrackHandle>,
    /// The outgoing track while a crossfade ramps it down.
    pub fading_out: Option<TrackHandle>,
    /// Direct media URL of the current track, reused when restarting with a seek or new filters.
    pub stream_url: Option<String>,
    /// Bumped on every start; end events from older tracks are ignored.
    pub generation: u64,
    pub paused: bool,
    pub player_message: Option<(ChannelId, MessageId)>,
    /// Consecutive tracks that failed to start.
    pub failures: u32,
    update_task: Option<JoinHandle<()>>,
    idle_task: Option<JoinHandle<()>>,
    crossfade_task: Option<JoinHandle<()>>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.track.is_some()
    }

    fn abort_tasks(&mut self) {
        for task in [
            self.update_task.take(),
            self.idle_task.take(),
            self.crossfade_task.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }
    }

    /// Stop whatever is audible without touching the queue.
    fn stop_audio(&mut self) {
        for handle in [self.track.take(), self.fading_out.take()].into_iter().flatten() {
            if let Err(e) = handle.stop() {
                debug!("Track already finished while stopping: {}", e);
            }
        }
    }
}

/// Manages Songbird instances, voice connections and per-guild playback sessions
#[derive(Default)]
pub struct MusicManager {
    sessions: HashMap<GuildId, Session>,
}

pub static MUSIC_MANAGER: LazyLock<Arc<Mutex<MusicManager>>> =
    LazyLock::new(|| Arc::new(Mutex::new(MusicManager::default())));

impl MusicManager {
    pub fn session(&self, guild_id: GuildId) -> Option<&Session> {
        self.sessions.get(&guild_id)
    }

    pub fn session_mut(&mut self, guild_id: GuildId) -> &mut Session {
        self.sessions.entry(guild_id).or_default()
    }

    pub fn current_track(&self, guild_id: GuildId) -> Option<TrackHandle> {
        self.session(guild_id).and_then(|s| s.track.clone())
    }

    /// True while a track is loaded, playing or paused.
    pub fn is_active(&self, guild_id: GuildId) -> bool {
        self.session(guild_id).is_some_and(Session::is_active)
    }

    pub fn is_paused(&self, guild_id: GuildId) -> bool {
        self.session(guild_id).is_some_and(|s| s.paused)
    }

    /// Invalidate the current track's end event and return the new generation.
    pub fn next_generation(&mut self, guild_id: GuildId) -> u64 {
        let session = self.session_mut(guild_id);
        session.generation += 1;
        session.generation
    }

    pub fn is_current_generation(&self, guild_id: GuildId, generation: u64) -> bool {
        self.session(guild_id).is_some_and(|s| s.generation == generation)
    }

    /// Stop the audible track(s) and bump the generation so their end events are ignored.
    pub fn halt(&mut self, guild_id: GuildId) -> u64 {
        let session = self.session_mut(guild_id);
        session.stop_audio();
        session.paused = false;
        if let Some(task) = session.crossfade_task.take() {
            task.abort();
        }
        self.next_generation(guild_id)
    }

    pub fn set_update_task(&mut self, guild_id: GuildId, task: JoinHandle<()>) {
        if let Some(old) = self.session_mut(guild_id).update_task.replace(task) {
            old.abort();
        }
    }

    pub fn set_idle_task(&mut self, guild_id: GuildId, task: JoinHandle<()>) {
        if let Some(old) = self.session_mut(guild_id).idle_task.replace(task) {
            old.abort();
        }
    }

    pub fn cancel_idle_task(&mut self, guild_id: GuildId) {
        if let Some(task) = self.sessions.get_mut(&guild_id).and_then(|s| s.idle_task.take()) {
            debug!("Cancelling idle disconnect for guild {}", guild_id);
            task.abort();
        }
    }

    /// Forget the idle task without aborting it; called by the task itself before it disconnects.
    pub fn detach_idle_task(&mut self, guild_id: GuildId) {
        if let Some(session) = self.sessions.get_mut(&guild_id) {
            session.idle_task = None;
        }
    }

    pub fn detach_crossfade_task(&mut self, guild_id: GuildId) {
        if let Some(session) = self.sessions.get_mut(&guild_id) {
            session.crossfade_task = None;
        }
    }

    pub fn set_crossfade_task(&mut self, guild_id: GuildId, task: JoinHandle<()>) {
        if let Some(old) = self.session_mut(guild_id).crossfade_task.replace(task) {
            old.abort();
        }
    }

    pub fn cancel_crossfade_task(&mut self, guild_id: GuildId) {
        if let Some(task) = self
            .sessions
            .get_mut(&guild_id)
            .and_then(|s| s.crossfade_task.take())
        {
            task.abort();
        }
    }

    /// Swap in a new player message, returning the old one so the caller can delete it.
    pub fn replace_player_message(
        &mut self,
        guild_id: GuildId,
        message: Option<(ChannelId, MessageId)>,
    ) -> Option<(ChannelId, MessageId)> {
        let session = self.session_mut(guild_id);
        if let Some(task) = session.update_task.take() {
            task.abort();
        }
        std::mem::replace(&mut session.player_message, message)
    }

    /// Clear the player message if it is still `message_id`; used when it was deleted by someone else.
    pub fn forget_player_message(&mut self, guild_id: GuildId, message_id: MessageId) {
        if let Some(session) = self.sessions.get_mut(&guild_id) {
            if session.player_message.is_some_and(|(_, id)| id == message_id) {
                session.player_message = None;
            }
        }
    }

    pub fn player_message(&self, guild_id: GuildId) -> Option<(ChannelId, MessageId)> {
        self.session(guild_id).and_then(|s| s.player_message)
    }

    /// Tear the session down completely, returning the player message to delete.
    pub fn drop_session(&mut self, guild_id: GuildId) -> Option<(ChannelId, MessageId)> {
        let mut session = self.sessions.remove(&guild_id)?;
        info!("Dropping playback session for guild {}", guild_id);
        session.abort_tasks();
        session.stop_audio();
        session.player_message
    }

    /// Get the Songbird voice client from the context
    pub async fn get_songbird(ctx: &Context) -> MusicResult<Arc<Songbird>> {
        songbird::get(ctx).await.ok_or(MusicError::NoVoiceManager)
    }

    /// Get the current voice channel call handle
    pub async fn get_call(ctx: &Context, guild_id: GuildId) -> MusicResult<Arc<SerenityMutex<Call>>> {
        let songbird = Self::get_songbird(ctx).await?;
        songbird.get(guild_id).ok_or(MusicError::NotConnected)
    }

    /// The channel the bot is connected to in this guild, if any.
    pub async fn bot_channel(ctx: &Context, guild_id: GuildId) -> Option<ChannelId> {
        let call = Self::get_call(ctx, guild_id).await.ok()?;
        let channel = call.lock().await.current_channel()?;
        Some(ChannelId::new(channel.0.get()))
    }

    /// Join a voice channel deafened, or move to it when already connected elsewhere.
    pub async fn join_channel(
        ctx: &Context,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> MusicResult<Arc<SerenityMutex<Call>>> {
        let songbird = Self::get_songbird(ctx).await?;

        if Self::bot_channel(ctx, guild_id).await == Some(channel_id) {
            return Self::get_call(ctx, guild_id).await;
        }

        // Join the voice channel
        let handle = songbird
            .join(guild_id, channel_id)
            .await
            .map_err(|e| MusicError::JoinError(e.to_string()))?;

        if let Err(e) = handle.lock().await.deafen(true).await {
            warn!("Failed to self-deafen in guild {}: {}", guild_id, e);
        }

        Ok(handle)
    }

    /// Leave a voice channel
    pub async fn leave_channel(ctx: &Context, guild_id: GuildId) -> MusicResult<()> {
        let songbird = Self::get_songbird(ctx).await?;

        // Check if we're in a voice channel
        if songbird.get(guild_id).is_none() {
            return Err(MusicError::NotConnected);
        }

        // Leave the voice channel
        songbird
            .remove(guild_id)
            .await
            .map_err(|_| MusicError::JoinError("Failed to leave voice channel".to_string()))?;

        Ok(())
    }

    /// Get the voice channel ID that the user is currently in
    pub fn get_user_voice_channel(
        ctx: &Context,
        guild_id: GuildId,
        user_id: serenity::UserId,
    ) -> MusicResult<ChannelId> {
        let guild = ctx.cache.guild(guild_id).ok_or(MusicError::NotInGuild)?;

        let voice_state = guild
            .voice_states
            .get(&user_id)
            .ok_or(MusicError::UserNotInVoiceChannel)?;

        voice_state.channel_id.ok_or(MusicError::UserNotInVoiceChannel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn guild() -> GuildId {
        GuildId::new(42)
    }

    /// Each bump invalidates the previous generation.
    #[test]
    fn test_generation_counter() {
        let mut manager = MusicManager::default();
        let first = manager.next_generation(guild());
        assert!(manager.is_current_generation(guild(), first));

        let second = manager.halt(guild());
        assert_eq!(second, first + 1);
        assert!(!manager.is_current_generation(guild(), first));
        assert!(!manager.is_current_generation(GuildId::new(7), second));
    }

    /// Replacing a task aborts the one it replaces.
    #[tokio::test]
    async fn test_replaced_task_is_aborted() {
        let mut manager = MusicManager::default();
        let first = tokio::spawn(tokio::time::sleep(Duration::from_secs(60)));
        let first_abort = first.abort_handle();
        manager.set_idle_task(guild(), first);
        manager.set_idle_task(guild(), tokio::spawn(tokio::time::sleep(Duration::from_secs(60))));

        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(first_abort.is_finished());

        manager.cancel_idle_task(guild());
        assert!(manager.session(guild()).unwrap().idle_task.is_none());
    }

    /// Dropping a session hands back its player message and forgets everything else.
    #[tokio::test]
    async fn test_drop_session() {
        let mut manager = MusicManager::default();
        let message = (ChannelId::new(1), MessageId::new(2));
        assert_eq!(manager.replace_player_message(guild(), Some(message)), None);
        manager.set_update_task(guild(), tokio::spawn(async {}));

        assert_eq!(manager.drop_session(guild()), Some(message));
        assert!(manager.session(guild()).is_none());
        assert!(!manager.is_active(guild()));
        assert_eq!(manager.drop_session(guild()), None);
    }
}
