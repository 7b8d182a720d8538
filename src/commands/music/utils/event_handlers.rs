//! The playback engine: advancing the queue when a track ends, starting tracks through
//! ffmpeg, crossfades, radio/autoplay refills, the live player message and idle disconnects.

use futures::future::{BoxFuture, FutureExt};
use poise::serenity_prelude as serenity;
use serenity::all::{ActivityData, ChannelId, CreateMessage, EditMessage, GuildId};
use serenity::async_trait;
use songbird::tracks::{Track, TrackHandle};
use songbird::{Event, EventContext, TrackEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::embedded_messages::{self, PlayerSnapshot};
use super::guild_queue::GuildQueue;
use super::guild_settings::LoopMode;
use super::music_manager::{MUSIC_MANAGER, MusicManager};
use super::{MusicError, MusicResult};
use crate::Data;
use crate::commands::music::audio_sources::stream::StreamRequest;
use crate::commands::music::audio_sources::track_metadata::TrackMetadata;
use crate::commands::music::audio_sources::{InputType, classify};

/// Stop trying after this many tracks in a row fail to start.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 10;
/// How long the bot waits in an idle channel before leaving.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(300);
/// Interval between player message refreshes.
pub const PLAYER_REFRESH: Duration = Duration::from_secs(5);
const FADE_STEP: Duration = Duration::from_millis(100);

/// Advances the queue when the track it was attached to ends or errors.
pub struct TrackEndNotifier {
    pub ctx: serenity::Context,
    pub data: Data,
    pub guild_id: GuildId,
    pub generation: u64,
}

#[async_trait]
impl songbird::EventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(_) = ctx {
            let current = {
                let mut manager = MUSIC_MANAGER.lock().await;
                let current = manager.is_current_generation(self.guild_id, self.generation);
                if current {
                    let session = manager.session_mut(self.guild_id);
                    session.track = None;
                    session.stream_url = None;
                    session.paused = false;
                    // End and Error can both fire for one track; only the first advances.
                    manager.next_generation(self.guild_id);
                }
                current
            };

            if !current {
                debug!("Ignoring end event of a replaced track in guild {}", self.guild_id);
                return None;
            }

            info!("Track ended in guild {}", self.guild_id);
            let (ctx, data, guild_id) = (self.ctx.clone(), self.data.clone(), self.guild_id);
            tokio::spawn(async move {
                if let Err(e) = play_next(&ctx, &data, guild_id).await {
                    error!("Failed to advance the queue in guild {}: {}", guild_id, e);
                }
            });
        }
        None
    }
}

fn control_error(e: impl std::fmt::Display) -> MusicError {
    MusicError::AudioSourceError(e.to_string())
}

fn attach_notifiers(ctx: &serenity::Context, data: &Data, guild_id: GuildId, handle: &TrackHandle, generation: u64) -> MusicResult<()> {
    for event in [TrackEvent::End, TrackEvent::Error] {
        handle
            .add_event(
                Event::Track(event),
                TrackEndNotifier {
                    ctx: ctx.clone(),
                    data: data.clone(),
                    guild_id,
                    generation,
                },
            )
            .map_err(control_error)?;
    }
    Ok(())
}

/// Start the next track, refilling from radio or autoplay when the queue runs dry.
/// Returns `false` when nothing could be played.
pub async fn play_next(ctx: &serenity::Context, data: &Data, guild_id: GuildId) -> MusicResult<bool> {
    let queue = data.queues.get(guild_id);

    if MusicManager::get_call(ctx, guild_id).await.is_err() {
        info!("Not connected in guild {}, dropping the queue", guild_id);
        queue.lock().await.clear();
        return Ok(false);
    }

    loop {
        let next = queue.lock().await.next_track();
        let track = match next {
            Some(track) => track,
            None => match refill(ctx, data, guild_id).await {
                Some(track) => track,
                None => {
                    queue_finished(ctx, data, guild_id).await;
                    return Ok(false);
                }
            },
        };

        info!("Starting '{}' in guild {}", track.title, guild_id);
        match launch(ctx, data, guild_id, 0, None).await {
            Ok(()) => {
                after_start(ctx, data, guild_id).await;
                return Ok(true);
            }
            Err(e) => {
                warn!("Failed to start '{}' in guild {}: {}", track.title, guild_id, e);
                let failures = {
                    let mut manager = MUSIC_MANAGER.lock().await;
                    let session = manager.session_mut(guild_id);
                    session.failures += 1;
                    session.failures
                };
                if failures >= MAX_CONSECUTIVE_FAILURES {
                    error!("Giving up in guild {} after {} failed tracks", guild_id, failures);
                    announce(ctx, data, guild_id, "Too many consecutive playback failures. Stopping.").await;
                    MUSIC_MANAGER.lock().await.session_mut(guild_id).failures = 0;
                    {
                        let mut gq = queue.lock().await;
                        gq.current = None;
                        gq.clock.reset();
                    }
                    queue_finished(ctx, data, guild_id).await;
                    return Ok(false);
                }
                announce(ctx, data, guild_id, &format!("Failed to play **{}**, skipping...", track.title)).await;
            }
        }
    }
}

/// Queue one recommendation: radio first, then autoplay seeded from the last track.
async fn refill(ctx: &serenity::Context, data: &Data, guild_id: GuildId) -> Option<TrackMetadata> {
    if !data.spotify.available() {
        return None;
    }
    let queue = data.queues.get(guild_id);
    let (seed, played, autoplay, previous) = {
        let gq = queue.lock().await;
        let seed = if gq.radio_mode { gq.radio_seed.clone() } else { None };
        (seed, gq.radio_history.ids().clone(), gq.settings.autoplay, gq.previous.clone())
    };

    if let Some(seed) = seed {
        match data.spotify.recommend_by_seed(&seed, &played, 1).await {
            Ok(picks) => {
                if let Some((id, track)) = picks.into_iter().next() {
                    let title = track.title.clone();
                    let next = {
                        let mut gq = queue.lock().await;
                        gq.radio_history.insert(id);
                        gq.add(track);
                        gq.next_track()
                    };
                    if next.is_some() {
                        announce(ctx, data, guild_id, &format!("Radio: queued **{}**", title)).await;
                        return next;
                    }
                }
            }
            Err(e) => warn!("Radio recommendation failed in guild {}: {}", guild_id, e),
        }
    }

    let previous = previous.filter(|_| autoplay)?;
    match data.spotify.recommend(&previous.title).await {
        Ok(Some(track)) => {
            let title = track.title.clone();
            let next = {
                let mut gq = queue.lock().await;
                gq.add(track);
                gq.next_track()
            };
            if next.is_some() {
                announce(ctx, data, guild_id, &format!("Autoplay: queued **{}**", title)).await;
            }
            next
        }
        Ok(None) => None,
        Err(e) => {
            warn!("Autoplay recommendation failed in guild {}: {}", guild_id, e);
            None
        }
    }
}

async fn queue_finished(ctx: &serenity::Context, data: &Data, guild_id: GuildId) {
    info!("Queue finished in guild {}", guild_id);
    let stay_connected = {
        let gq = data.queues.get(guild_id);
        let gq = gq.lock().await;
        data.queues.save_queue_state(guild_id, &gq);
        gq.settings.stay_connected
    };

    set_idle_presence(ctx);
    refresh_player(ctx, data, guild_id).await;

    if !stay_connected {
        let (ctx, data) = (ctx.clone(), data.clone());
        let task = tokio::spawn(async move {
            tokio::time::sleep(IDLE_TIMEOUT).await;
            leave_if_idle(&ctx, &data, guild_id).await;
        });
        MUSIC_MANAGER.lock().await.set_idle_task(guild_id, task);
    }
}

async fn leave_if_idle(ctx: &serenity::Context, data: &Data, guild_id: GuildId) {
    {
        let mut manager = MUSIC_MANAGER.lock().await;
        manager.detach_idle_task(guild_id);
        if manager.is_active(guild_id) {
            return;
        }
    }
    if data.queues.get(guild_id).lock().await.settings.stay_connected {
        return;
    }
    info!("Leaving idle voice channel in guild {}", guild_id);
    disconnect(ctx, data, guild_id).await;
}

/// Resolve the direct media URL for `track`, filling in details the queue entry lacked.
/// Returns the URL and whether the source is live.
async fn resolve_stream(data: &Data, queue: &Arc<Mutex<GuildQueue>>, track: &TrackMetadata) -> MusicResult<(String, bool)> {
    if classify(&track.url).0 == InputType::RadioStream {
        return Ok((track.url.clone(), true));
    }
    let (resolved, stream) = data.youtube.stream_url(&track.url).await?;
    let mut gq = queue.lock().await;
    if let Some(current) = gq.current.as_mut().filter(|c| c.url == track.url) {
        current.fill_from(&resolved);
    }
    Ok((stream, track.is_live || resolved.is_live))
}

/// Start the queue's current track at `seek` seconds, replacing whatever is audible.
async fn launch(ctx: &serenity::Context, data: &Data, guild_id: GuildId, seek: u64, cached_stream: Option<String>) -> MusicResult<()> {
    let call = MusicManager::get_call(ctx, guild_id).await?;
    let queue = data.queues.get(guild_id);
    let (track, filters, volume, speed) = {
        let gq = queue.lock().await;
        let track = gq.current.clone().ok_or(MusicError::NothingPlaying)?;
        (track, gq.settings.filter_settings(), gq.settings.volume, gq.settings.speed)
    };

    let (stream_url, is_live) = match cached_stream {
        Some(url) => (url, track.is_live),
        None => resolve_stream(data, &queue, &track).await?,
    };
    let input = StreamRequest {
        source_url: stream_url.clone(),
        seek_seconds: seek,
        filters,
        is_live,
    }
    .spawn_input()?;

    let generation = MUSIC_MANAGER.lock().await.halt(guild_id);
    let handle = call.lock().await.play(Track::from(input).volume(volume));
    attach_notifiers(ctx, data, guild_id, &handle, generation)?;

    {
        let mut manager = MUSIC_MANAGER.lock().await;
        let session = manager.session_mut(guild_id);
        session.track = Some(handle);
        session.stream_url = Some(stream_url);
        session.paused = false;
    }
    queue.lock().await.clock.start(seek, speed);
    Ok(())
}

/// Bookkeeping once a new track is audible.
async fn after_start(ctx: &serenity::Context, data: &Data, guild_id: GuildId) {
    let track = {
        let queue = data.queues.get(guild_id);
        let gq = queue.lock().await;
        let Some(track) = gq.current.clone() else {
            return;
        };
        if let Err(e) = data
            .db()
            .record_play(guild_id.get(), &track, track.requester_id, track.duration_secs())
        {
            warn!("Failed to record play history in guild {}: {}", guild_id, e);
        }
        data.queues.save_queue_state(guild_id, &gq);
        track
    };

    MUSIC_MANAGER.lock().await.session_mut(guild_id).failures = 0;
    ctx.set_activity(Some(ActivityData::listening(track.title.clone())));

    schedule_crossfade(ctx, data, guild_id).await;
    send_player(ctx, data, guild_id).await;
    update_np_channel(ctx, data, guild_id).await;
}

/// Wall-clock time until the crossfade into the next queued track should begin.
/// `None` when no crossfade applies.
pub fn crossfade_delay(gq: &GuildQueue) -> Option<Duration> {
    let fade = gq.settings.crossfade_seconds;
    let track = gq.current.as_ref()?;
    if fade == 0 || track.is_live || gq.queue.is_empty() || gq.settings.loop_mode == LoopMode::Single {
        return None;
    }
    let duration = track.duration?.as_secs_f64();
    let speed = if gq.settings.speed > 0.0 { gq.settings.speed as f64 } else { 1.0 };
    let remaining = (duration - gq.elapsed_secs() as f64).max(0.0) / speed;
    Some(Duration::from_secs_f64((remaining - fade as f64).max(0.0)))
}

/// (Re)arm the crossfade timer for the current track.
pub async fn schedule_crossfade(ctx: &serenity::Context, data: &Data, guild_id: GuildId) {
    let delay = crossfade_delay(&*data.queues.get(guild_id).lock().await);

    let mut manager = MUSIC_MANAGER.lock().await;
    manager.cancel_crossfade_task(guild_id);
    let Some(delay) = delay else {
        return;
    };
    let Some(generation) = manager.session(guild_id).filter(|s| s.is_active()).map(|s| s.generation) else {
        return;
    };
    debug!("Crossfade in guild {} armed for {:?}", guild_id, delay);
    let task = tokio::spawn(crossfade_after(ctx.clone(), data.clone(), guild_id, generation, delay));
    manager.set_crossfade_task(guild_id, task);
}

fn crossfade_after(ctx: serenity::Context, data: Data, guild_id: GuildId, generation: u64, delay: Duration) -> BoxFuture<'static, ()> {
    async move {
        tokio::time::sleep(delay).await;
        MUSIC_MANAGER.lock().await.detach_crossfade_task(guild_id);
        if let Err(e) = crossfade(&ctx, &data, guild_id, generation).await {
            warn!("Crossfade failed in guild {}: {}", guild_id, e);
        }
    }
    .boxed()
}

/// Start the next queued track silently, swap it in as current and ramp the volumes.
async fn crossfade(ctx: &serenity::Context, data: &Data, guild_id: GuildId, generation: u64) -> MusicResult<()> {
    let queue = data.queues.get(guild_id);
    let (next, filters, volume, speed, fade) = {
        let gq = queue.lock().await;
        let Some(next) = gq.queue.front().cloned() else {
            return Ok(());
        };
        (next, gq.settings.filter_settings(), gq.settings.volume, gq.settings.speed, gq.settings.crossfade_seconds)
    };
    if !MUSIC_MANAGER.lock().await.is_current_generation(guild_id, generation) {
        return Ok(());
    }

    let call = MusicManager::get_call(ctx, guild_id).await?;
    let (stream_url, resolved) = if classify(&next.url).0 == InputType::RadioStream {
        (next.url.clone(), None)
    } else {
        let (resolved, stream) = data.youtube.stream_url(&next.url).await?;
        (stream, Some(resolved))
    };
    let input = StreamRequest {
        source_url: stream_url.clone(),
        seek_seconds: 0,
        filters,
        is_live: next.is_live || resolved.as_ref().is_some_and(|r| r.is_live),
    }
    .spawn_input()?;
    let incoming = call.lock().await.play(Track::from(input).volume(0.0));

    // The prefetch took a while; playback may have moved on.
    let swapped = {
        let mut gq = queue.lock().await;
        let mut manager = MUSIC_MANAGER.lock().await;
        let still_next = gq.queue.front().is_some_and(|t| t.url == next.url);
        match manager.current_track(guild_id) {
            Some(outgoing) if still_next && manager.is_current_generation(guild_id, generation) => {
                let finished = gq.current.take();
                if gq.settings.loop_mode == LoopMode::Queue {
                    if let Some(finished) = &finished {
                        gq.queue.push_back(finished.clone());
                    }
                }
                gq.previous = finished;
                let mut current = gq.queue.pop_front();
                if let (Some(current), Some(resolved)) = (current.as_mut(), resolved.as_ref()) {
                    current.fill_from(resolved);
                }
                gq.current = current;
                gq.skip_votes.clear();
                gq.clock.start(0, speed);

                let new_generation = manager.next_generation(guild_id);
                let session = manager.session_mut(guild_id);
                session.fading_out = Some(outgoing.clone());
                session.track = Some(incoming.clone());
                session.stream_url = Some(stream_url);
                session.paused = false;
                Some((new_generation, outgoing))
            }
            _ => None,
        }
    };

    let Some((new_generation, outgoing)) = swapped else {
        debug!("Crossfade in guild {} abandoned, playback changed meanwhile", guild_id);
        incoming.stop().ok();
        return Ok(());
    };
    info!("Crossfading into '{}' in guild {}", next.title, guild_id);
    attach_notifiers(ctx, data, guild_id, &incoming, new_generation)?;
    after_start(ctx, data, guild_id).await;

    let steps = (u64::from(fade) * 1000 / FADE_STEP.as_millis() as u64).max(1);
    for step in 1..=steps {
        tokio::time::sleep(FADE_STEP).await;
        if !MUSIC_MANAGER.lock().await.is_current_generation(guild_id, new_generation) {
            break;
        }
        let progress = step as f32 / steps as f32;
        outgoing.set_volume(volume * (1.0 - progress)).ok();
        incoming.set_volume(volume * progress).ok();
    }

    outgoing.stop().ok();
    let mut manager = MUSIC_MANAGER.lock().await;
    let session = manager.session_mut(guild_id);
    if session.fading_out.as_ref().is_some_and(|h| h.uuid() == outgoing.uuid()) {
        session.fading_out = None;
    }
    Ok(())
}

/// Restart the current track at `seek` seconds, e.g. after a seek or a filter change.
/// Reuses the stream URL resolved when the track started.
pub async fn restart_playback(ctx: &serenity::Context, data: &Data, guild_id: GuildId, seek: u64) -> MusicResult<()> {
    let cached = MUSIC_MANAGER
        .lock()
        .await
        .session(guild_id)
        .filter(|s| s.is_active())
        .and_then(|s| s.stream_url.clone())
        .ok_or(MusicError::NothingPlaying)?;
    debug!("Restarting playback in guild {} at {}s", guild_id, seek);
    launch(ctx, data, guild_id, seek, Some(cached)).await?;
    schedule_crossfade(ctx, data, guild_id).await;
    refresh_player(ctx, data, guild_id).await;
    Ok(())
}

/// Stop the current track and move on.
pub async fn skip(ctx: &serenity::Context, data: &Data, guild_id: GuildId) -> MusicResult<bool> {
    MUSIC_MANAGER.lock().await.halt(guild_id);
    play_next(ctx, data, guild_id).await
}

/// Put the previous track back in front and play it. Returns its title.
pub async fn play_previous(ctx: &serenity::Context, data: &Data, guild_id: GuildId) -> MusicResult<Option<String>> {
    let title = {
        let queue = data.queues.get(guild_id);
        let mut gq = queue.lock().await;
        let Some(previous) = gq.previous.take() else {
            return Ok(None);
        };
        let title = previous.title.clone();
        gq.push_front(previous);
        gq.current = None;
        title
    };
    MUSIC_MANAGER.lock().await.halt(guild_id);
    play_next(ctx, data, guild_id).await?;
    Ok(Some(title))
}

pub async fn pause(data: &Data, guild_id: GuildId) -> MusicResult<()> {
    {
        let mut manager = MUSIC_MANAGER.lock().await;
        let track = manager.current_track(guild_id).ok_or(MusicError::NothingPlaying)?;
        track.pause().map_err(control_error)?;
        if let Some(fading) = manager.session(guild_id).and_then(|s| s.fading_out.clone()) {
            fading.pause().ok();
        }
        manager.session_mut(guild_id).paused = true;
        manager.cancel_crossfade_task(guild_id);
    }
    data.queues.get(guild_id).lock().await.clock.pause();
    Ok(())
}

pub async fn resume(ctx: &serenity::Context, data: &Data, guild_id: GuildId) -> MusicResult<()> {
    {
        let mut manager = MUSIC_MANAGER.lock().await;
        let track = manager.current_track(guild_id).ok_or(MusicError::NothingPlaying)?;
        track.play().map_err(control_error)?;
        if let Some(fading) = manager.session(guild_id).and_then(|s| s.fading_out.clone()) {
            fading.play().ok();
        }
        manager.session_mut(guild_id).paused = false;
    }
    data.queues.get(guild_id).lock().await.clock.resume();
    schedule_crossfade(ctx, data, guild_id).await;
    Ok(())
}

/// Apply a new volume to the audible track immediately.
pub async fn set_volume(guild_id: GuildId, volume: f32) {
    if let Some(track) = MUSIC_MANAGER.lock().await.current_track(guild_id) {
        if let Err(e) = track.set_volume(volume) {
            debug!("Could not change volume in guild {}: {}", guild_id, e);
        }
    }
}

/// Stop playback, forget the queue and leave the voice channel.
pub async fn disconnect(ctx: &serenity::Context, data: &Data, guild_id: GuildId) {
    let player_message = MUSIC_MANAGER.lock().await.drop_session(guild_id);
    if let Some((channel, message)) = player_message {
        if let Err(e) = channel.delete_message(&ctx.http, message).await {
            debug!("Player message already gone in guild {}: {}", guild_id, e);
        }
    }
    if let Err(e) = MusicManager::leave_channel(ctx, guild_id).await {
        debug!("Leaving voice in guild {}: {}", guild_id, e);
    }
    data.queues.clear_queue_state(guild_id);
    data.queues.remove(guild_id);
    set_idle_presence(ctx);
}

/// Post a plain message in the guild's music text channel.
pub async fn announce(ctx: &serenity::Context, data: &Data, guild_id: GuildId, message: &str) {
    let channel = data.queues.get(guild_id).lock().await.text_channel_id;
    if let Some(channel) = channel {
        if let Err(e) = channel.say(&ctx.http, message).await {
            debug!("Failed to announce in guild {}: {}", guild_id, e);
        }
    }
}

pub fn idle_activity(guilds: usize) -> String {
    format!("music in {} servers", guilds)
}

/// Idle presence for `guilds` servers. Use this when the cache is not filled yet.
pub fn set_idle_presence_for(ctx: &serenity::Context, guilds: usize) {
    ctx.set_activity(Some(ActivityData::listening(idle_activity(guilds))));
}

pub fn set_idle_presence(ctx: &serenity::Context) {
    set_idle_presence_for(ctx, ctx.cache.guild_count());
}

async fn snapshot(data: &Data, guild_id: GuildId) -> (Option<ChannelId>, Option<PlayerSnapshot>) {
    let paused = MUSIC_MANAGER.lock().await.is_paused(guild_id);
    let queue = data.queues.get(guild_id);
    let gq = queue.lock().await;
    (gq.text_channel_id, PlayerSnapshot::capture(&gq, paused))
}

/// Replace the player message with a fresh one at the bottom of the channel.
pub async fn send_player(ctx: &serenity::Context, data: &Data, guild_id: GuildId) {
    let (channel, snapshot) = snapshot(data, guild_id).await;

    let old = MUSIC_MANAGER.lock().await.replace_player_message(guild_id, None);
    if let Some((old_channel, old_message)) = old {
        if let Err(e) = old_channel.delete_message(&ctx.http, old_message).await {
            debug!("Old player message already gone in guild {}: {}", guild_id, e);
        }
    }

    let Some(channel) = channel else {
        return;
    };
    let (embed, components) = embedded_messages::player_message(snapshot.as_ref());
    let message = CreateMessage::new().embed(embed).components(components);
    match channel.send_message(&ctx.http, message).await {
        Ok(message) => {
            let mut manager = MUSIC_MANAGER.lock().await;
            manager.replace_player_message(guild_id, Some((channel, message.id)));
            manager.set_update_task(guild_id, spawn_update_task(ctx.clone(), data.clone(), guild_id));
        }
        Err(e) => warn!("Failed to send player message in guild {}: {}", guild_id, e),
    }
}

/// Re-render the player message in place. Returns `false` once there is no message to edit.
pub async fn refresh_player(ctx: &serenity::Context, data: &Data, guild_id: GuildId) -> bool {
    let Some((channel, message_id)) = MUSIC_MANAGER.lock().await.player_message(guild_id) else {
        return false;
    };
    let (_, snapshot) = snapshot(data, guild_id).await;
    let (embed, components) = embedded_messages::player_message(snapshot.as_ref());

    let edit = EditMessage::new().embed(embed).components(components);
    match channel.edit_message(&ctx.http, message_id, edit).await {
        Ok(_) => true,
        Err(e) => {
            debug!("Player message in guild {} could not be edited: {}", guild_id, e);
            MUSIC_MANAGER.lock().await.forget_player_message(guild_id, message_id);
            false
        }
    }
}

fn spawn_update_task(ctx: serenity::Context, data: Data, guild_id: GuildId) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(PLAYER_REFRESH).await;
            let active = MUSIC_MANAGER.lock().await.is_active(guild_id);
            if !refresh_player(&ctx, &data, guild_id).await || !active {
                break;
            }
        }
        debug!("Player updates stopped for guild {}", guild_id);
    })
}

/// Keep the configured now-playing channel in sync: edit the last post or send a new one.
pub async fn update_np_channel(ctx: &serenity::Context, data: &Data, guild_id: GuildId) {
    let queue = data.queues.get(guild_id);
    let (channel, existing, embed) = {
        let gq = queue.lock().await;
        let (Some(channel), Some(embed)) = (gq.settings.np_channel_id, embedded_messages::np_channel_embed(&gq)) else {
            return;
        };
        (ChannelId::new(channel), gq.np_message_id, embed)
    };

    if let Some(message_id) = existing {
        let edit = EditMessage::new().embed(embed.clone());
        if channel.edit_message(&ctx.http, message_id, edit).await.is_ok() {
            return;
        }
        queue.lock().await.np_message_id = None;
    }
    match channel.send_message(&ctx.http, CreateMessage::new().embed(embed)).await {
        Ok(message) => queue.lock().await.np_message_id = Some(message.id),
        Err(e) => warn!("Failed to post in the now-playing channel of guild {}: {}", guild_id, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::music::utils::guild_settings::GuildSettings;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_idle_activity_counts_servers() {
        assert_eq!(idle_activity(0), "music in 0 servers");
        assert_eq!(idle_activity(12), "music in 12 servers");
    }

    fn track(title: &str, secs: Option<u64>) -> TrackMetadata {
        TrackMetadata {
            title: title.to_string(),
            url: format!("https://www.youtube.com/watch?v={}", title),
            duration: secs.map(Duration::from_secs),
            ..Default::default()
        }
    }

    fn playing(crossfade: u32) -> GuildQueue {
        let mut gq = GuildQueue::new(GuildSettings {
            crossfade_seconds: crossfade,
            ..Default::default()
        });
        gq.current = Some(track("now", Some(200)));
        gq.add(track("next", Some(100)));
        gq
    }

    /// With nothing elapsed the fade starts `crossfade` seconds before the end.
    #[test]
    fn test_crossfade_delay() {
        let delay = crossfade_delay(&playing(5)).unwrap();
        assert_eq!(delay.as_secs(), 195);
    }

    /// Faster playback shortens the wall-clock wait.
    #[test]
    fn test_crossfade_delay_with_speed() {
        let mut gq = playing(10);
        gq.settings.speed = 2.0;
        assert_eq!(crossfade_delay(&gq).unwrap().as_secs(), 90);
    }

    #[test]
    fn test_no_crossfade() {
        assert_eq!(crossfade_delay(&playing(0)), None);

        let mut looping = playing(5);
        looping.settings.loop_mode = LoopMode::Single;
        assert_eq!(crossfade_delay(&looping), None);

        let mut last = playing(5);
        last.queue.clear();
        assert_eq!(crossfade_delay(&last), None);

        let mut live = playing(5);
        if let Some(current) = live.current.as_mut() {
            current.is_live = true;
        }
        assert_eq!(crossfade_delay(&live), None);

        let mut unknown = playing(5);
        unknown.current = Some(track("stream", None));
        assert_eq!(crossfade_delay(&unknown), None);
    }

    /// A track shorter than the fade starts fading immediately.
    #[test]
    fn test_crossfade_delay_short_track() {
        let mut gq = playing(12);
        gq.current = Some(track("short", Some(8)));
        assert_eq!(crossfade_delay(&gq), Some(Duration::ZERO));
    }
}
