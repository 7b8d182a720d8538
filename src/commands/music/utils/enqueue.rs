//! Getting tracks into a guild's queue: voice joins, DJ approval, per-user limits,
//! `/playnext` insertion and bulk loads with progress reporting.

use poise::serenity_prelude as serenity;
use serenity::all::{ChannelId, CreateMessage, EditMessage, GuildId, MessageId, UserId};
use tracing::{debug, info, warn};

use super::button_controls;
use super::event_handlers;
use super::guild_queue::GuildQueue;
use super::music_manager::{MUSIC_MANAGER, MusicManager};
use super::permissions::user_voice_channel;
use super::{MusicError, MusicResult, plural};
use crate::Data;
use crate::commands::music::audio_sources::track_metadata::TrackMetadata;
use crate::commands::music::audio_sources::{InputType, classify, stream_title};

/// Bulk loads above this size get a progress message.
const PROGRESS_THRESHOLD: usize = 5;
const PROGRESS_STEP: usize = 5;

pub const SPOTIFY_UNAVAILABLE: &str = "Spotify credentials are not configured.";
pub const PLAYNEXT_SINGLE_ONLY: &str = "❌ `/playnext` only supports single tracks. Use `/play` for playlists.";
pub const TOO_MANY_REQUESTS: &str = "Too many pending requests. Please wait for the DJ to approve some first.";

/// Who is asking for a track.
#[derive(Debug, Clone, PartialEq)]
pub struct Requester {
    pub id: UserId,
    pub name: String,
    /// Passes the DJ check; only consulted in DJ queue mode.
    pub is_dj: bool,
}

impl Requester {
    pub fn new(id: UserId, name: impl Into<String>, is_dj: bool) -> Self {
        Self {
            id,
            name: name.into(),
            is_dj,
        }
    }

    fn tag(&self, track: TrackMetadata) -> TrackMetadata {
        track.requested(self.name.clone(), self.id.get())
    }
}

/// What happened to a request, and what to tell the user.
#[derive(Debug, Clone, PartialEq)]
pub enum EnqueueOutcome {
    /// Nothing was playing; the queue was started.
    NowPlaying(String),
    Queued {
        title: String,
        position: usize,
        duplicate: bool,
    },
    PlayingNext(String),
    /// Filed for DJ approval.
    Submitted { title: String, request_id: u64 },
    /// Summary of a bulk load.
    Loaded(String),
    /// Nothing was queued; shown only to the requester.
    Refused(String),
}

impl EnqueueOutcome {
    pub fn message(&self) -> String {
        match self {
            Self::NowPlaying(title) => format!("Now playing: **{}**", title),
            Self::Queued {
                title,
                position,
                duplicate,
            } => {
                let mut message = format!("Queued **{}** at position #{}", title, position);
                if *duplicate {
                    message.push_str(&format!("\n**{}** is already in the queue. Adding anyway.", title));
                }
                message
            }
            Self::PlayingNext(title) => format!("⏭️ **{}** will play next.", title),
            Self::Submitted { title, .. } => format!("**{}** submitted for DJ approval.", title),
            Self::Loaded(message) | Self::Refused(message) => message.clone(),
        }
    }

    pub fn is_private(&self) -> bool {
        matches!(self, Self::Refused(_))
    }
}

pub fn queue_full(max: usize) -> String {
    format!("Queue is full ({} tracks max).", max)
}

pub fn user_limit(count: usize, max: usize) -> String {
    format!(
        "You already have **{}** track{} in the queue (max **{}** per user).",
        count,
        plural(count),
        max
    )
}

/// Decide what to do with one requested track and apply it to the queue.
/// `NowPlaying` tells the caller to start playback.
pub fn admit(gq: &mut GuildQueue, requester: &Requester, track: TrackMetadata, play_next: bool, active: bool) -> EnqueueOutcome {
    let track = requester.tag(track);
    let title = track.title.clone();

    if gq.dj_queue_mode && !requester.is_dj {
        return match gq.submit_request(track) {
            Some(request_id) => EnqueueOutcome::Submitted { title, request_id },
            None => EnqueueOutcome::Refused(TOO_MANY_REQUESTS.to_string()),
        };
    }

    let max_per_user = gq.settings.max_per_user;
    if !gq.user_has_room(requester.id.get(), &requester.name, 1) {
        let count = gq.count_for_user(requester.id.get(), &requester.name);
        return EnqueueOutcome::Refused(user_limit(count, max_per_user));
    }

    if play_next && active {
        if gq.is_full() {
            return EnqueueOutcome::Refused(queue_full(gq.settings.max_queue));
        }
        gq.push_front(track);
        return EnqueueOutcome::PlayingNext(title);
    }

    let duplicate = gq.has_duplicate(&track);
    match gq.add(track) {
        None => EnqueueOutcome::Refused(queue_full(gq.settings.max_queue)),
        Some(_) if !active => EnqueueOutcome::NowPlaying(title),
        Some(position) => EnqueueOutcome::Queued {
            title,
            position,
            duplicate,
        },
    }
}

/// Tally of a bulk load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkSummary {
    pub queued: usize,
    pub skipped: usize,
    pub reason: Option<String>,
}

impl BulkSummary {
    /// `" (3 skipped — queue full)"`, or nothing when everything fit.
    pub fn suffix(&self) -> String {
        match (&self.reason, self.skipped) {
            (Some(reason), skipped) if skipped > 0 => format!(" ({} skipped — {})", skipped, reason),
            _ => String::new(),
        }
    }

    /// `Queued **N tracks** from {source}.` plus the skip note.
    pub fn message(&self, source: &str) -> String {
        format!(
            "Queued **{} track{}** from {}.{}",
            self.queued,
            plural(self.queued),
            source,
            self.suffix()
        )
    }
}

/// Append as many of `tracks` as the limits allow. Returns `false` once a limit stopped the load;
/// `summary.skipped` then counts every remaining track of the whole load (`total`).
pub fn queue_tracks(
    gq: &mut GuildQueue,
    requester: &Requester,
    tracks: impl IntoIterator<Item = TrackMetadata>,
    total: usize,
    summary: &mut BulkSummary,
) -> bool {
    for track in tracks {
        if !gq.user_has_room(requester.id.get(), &requester.name, 1) {
            summary.reason = Some(format!("per-user limit of {}", gq.settings.max_per_user));
        } else if gq.add(requester.tag(track)).is_none() {
            summary.reason = Some("queue full".to_string());
        } else {
            summary.queued += 1;
            continue;
        }
        summary.skipped = total - summary.queued;
        return false;
    }
    true
}

/// Join the requester's voice channel, or move there, and cancel any pending idle disconnect.
pub async fn ensure_voice(ctx: &serenity::Context, guild_id: GuildId, user_id: UserId) -> MusicResult<()> {
    let channel_id = user_voice_channel(ctx, guild_id, user_id).ok_or(MusicError::UserNotInVoiceChannel)?;
    MusicManager::join_channel(ctx, guild_id, channel_id).await?;
    MUSIC_MANAGER.lock().await.cancel_idle_task(guild_id);
    Ok(())
}

/// Queue one track and start playback if the guild was idle.
pub async fn enqueue_track(
    ctx: &serenity::Context,
    data: &Data,
    guild_id: GuildId,
    channel_id: ChannelId,
    requester: &Requester,
    track: TrackMetadata,
    play_next: bool,
) -> MusicResult<EnqueueOutcome> {
    let active = MUSIC_MANAGER.lock().await.is_active(guild_id);
    let queue = data.queues.get(guild_id);
    let outcome = {
        let mut gq = queue.lock().await;
        gq.text_channel_id = Some(channel_id);
        let outcome = admit(&mut gq, requester, track, play_next, active);
        if !outcome.is_private() {
            data.queues.save_queue_state(guild_id, &gq);
        }
        outcome
    };

    match &outcome {
        EnqueueOutcome::NowPlaying(_) => {
            event_handlers::play_next(ctx, data, guild_id).await?;
        }
        EnqueueOutcome::Submitted { title, request_id } => {
            post_dj_request(ctx, channel_id, *request_id, title, &requester.name).await;
        }
        _ => {}
    }
    Ok(outcome)
}

async fn post_dj_request(ctx: &serenity::Context, channel_id: ChannelId, request_id: u64, title: &str, requester: &str) {
    info!("DJ request #{} for '{}' by {}", request_id, title, requester);
    let message = CreateMessage::new()
        .content(format!("**DJ Approval Required:** {} (requested by {})", title, requester))
        .components(button_controls::dj_approval_buttons(request_id, false));
    if let Err(e) = channel_id.send_message(&ctx.http, message).await {
        warn!("Failed to post DJ approval request: {}", e);
    }
}

/// Play a track right away: in front of the queue when something is playing, otherwise as a normal enqueue.
pub async fn play_now(
    ctx: &serenity::Context,
    data: &Data,
    guild_id: GuildId,
    channel_id: ChannelId,
    requester: &Requester,
    track: TrackMetadata,
) -> MusicResult<EnqueueOutcome> {
    if !MUSIC_MANAGER.lock().await.is_active(guild_id) {
        return enqueue_track(ctx, data, guild_id, channel_id, requester, track, false).await;
    }
    let title = track.title.clone();
    {
        let queue = data.queues.get(guild_id);
        let mut gq = queue.lock().await;
        gq.text_channel_id = Some(channel_id);
        gq.push_front(requester.tag(track));
    }
    event_handlers::skip(ctx, data, guild_id).await?;
    Ok(EnqueueOutcome::NowPlaying(title))
}

/// "Loading... (x/N queued)" message kept up to date during a bulk load.
struct ProgressReporter {
    message: Option<(ChannelId, MessageId)>,
    total: usize,
}

impl ProgressReporter {
    async fn start(ctx: &serenity::Context, channel_id: ChannelId, total: usize) -> Self {
        let mut reporter = Self { message: None, total };
        if total > PROGRESS_THRESHOLD {
            match channel_id.say(&ctx.http, reporter.text(0)).await {
                Ok(message) => reporter.message = Some((channel_id, message.id)),
                Err(e) => debug!("Could not post progress message: {}", e),
            }
        }
        reporter
    }

    fn text(&self, queued: usize) -> String {
        format!("Loading... ({}/{} queued)", queued, self.total)
    }

    async fn update(&self, ctx: &serenity::Context, queued: usize) {
        if let Some((channel_id, message_id)) = self.message {
            let edit = EditMessage::new().content(self.text(queued));
            if let Err(e) = channel_id.edit_message(&ctx.http, message_id, edit).await {
                debug!("Could not update progress message: {}", e);
            }
        }
    }

    async fn finish(self, ctx: &serenity::Context) {
        if let Some((channel_id, message_id)) = self.message {
            if let Err(e) = channel_id.delete_message(&ctx.http, message_id).await {
                debug!("Could not remove progress message: {}", e);
            }
        }
    }
}

/// Queue a batch of tracks (playlists, favorites, imports) and start playback if idle.
pub async fn enqueue_many(
    ctx: &serenity::Context,
    data: &Data,
    guild_id: GuildId,
    channel_id: ChannelId,
    requester: &Requester,
    tracks: Vec<TrackMetadata>,
) -> MusicResult<BulkSummary> {
    let queue = data.queues.get(guild_id);
    queue.lock().await.text_channel_id = Some(channel_id);

    let total = tracks.len();
    let progress = ProgressReporter::start(ctx, channel_id, total).await;
    let mut summary = BulkSummary::default();
    let mut tracks = tracks.into_iter().peekable();

    while tracks.peek().is_some() {
        let chunk: Vec<TrackMetadata> = tracks.by_ref().take(PROGRESS_STEP).collect();
        let more = queue_tracks(&mut *queue.lock().await, requester, chunk, total, &mut summary);
        if !more {
            break;
        }
        progress.update(ctx, summary.queued).await;
    }
    progress.finish(ctx).await;

    info!(
        "Bulk load in guild {}: {} queued, {} skipped",
        guild_id, summary.queued, summary.skipped
    );
    {
        let gq = queue.lock().await;
        data.queues.save_queue_state(guild_id, &gq);
    }
    if summary.queued > 0 && !MUSIC_MANAGER.lock().await.is_active(guild_id) {
        event_handlers::play_next(ctx, data, guild_id).await?;
    }
    Ok(summary)
}

/// Load a YouTube or SoundCloud playlist.
pub async fn enqueue_playlist(
    ctx: &serenity::Context,
    data: &Data,
    guild_id: GuildId,
    channel_id: ChannelId,
    requester: &Requester,
    url: &str,
) -> MusicResult<EnqueueOutcome> {
    let (title, entries) = match data.youtube.playlist(url).await {
        Ok(playlist) => playlist,
        Err(e) => return Ok(EnqueueOutcome::Refused(format!("Could not load playlist: {}", e))),
    };
    if entries.is_empty() {
        return Ok(EnqueueOutcome::Refused("❌ No tracks found in that playlist.".to_string()));
    }
    ensure_voice(ctx, guild_id, requester.id).await?;
    let summary = enqueue_many(ctx, data, guild_id, channel_id, requester, entries).await?;
    Ok(EnqueueOutcome::Loaded(summary.message(&format!("**{}**", title))))
}

/// Resolve one URL or `ytsearch:` query through yt-dlp and queue it.
pub async fn enqueue_url(
    ctx: &serenity::Context,
    data: &Data,
    guild_id: GuildId,
    channel_id: ChannelId,
    requester: &Requester,
    url: &str,
    play_next: bool,
) -> MusicResult<EnqueueOutcome> {
    let track = match data.youtube.resolve(url).await {
        Ok(track) => track,
        Err(e) => return Ok(EnqueueOutcome::Refused(format!("Could not find anything: {}", e))),
    };
    ensure_voice(ctx, guild_id, requester.id).await?;
    enqueue_track(ctx, data, guild_id, channel_id, requester, track, play_next).await
}

/// Everything `/play` and `/playnext` accept, except YouTube Mix links which the caller confirms first.
pub async fn play_query(
    ctx: &serenity::Context,
    data: &Data,
    guild_id: GuildId,
    channel_id: ChannelId,
    requester: &Requester,
    query: &str,
    play_next: bool,
) -> MusicResult<EnqueueOutcome> {
    let (kind, value) = classify(query);
    if play_next && kind.is_multi_track() {
        return Ok(EnqueueOutcome::Refused(PLAYNEXT_SINGLE_ONLY.to_string()));
    }
    debug!("Query '{}' classified as {:?}", query, kind);

    match kind {
        InputType::SpotifyTrack | InputType::SpotifyPlaylist | InputType::SpotifyAlbum => {
            if !data.spotify.available() {
                return Ok(EnqueueOutcome::Refused(SPOTIFY_UNAVAILABLE.to_string()));
            }
            let searches = match kind {
                InputType::SpotifyTrack => data.spotify.resolve_track(&value).await,
                InputType::SpotifyPlaylist => data.spotify.resolve_playlist(&value).await,
                _ => data.spotify.resolve_album(&value).await,
            };
            let searches = match searches {
                Ok(searches) if searches.is_empty() => {
                    return Ok(EnqueueOutcome::Refused("❌ No tracks found from that Spotify link.".to_string()));
                }
                Ok(searches) => searches,
                Err(e) => return Ok(EnqueueOutcome::Refused(format!("Spotify error: {}", e))),
            };

            if play_next {
                let url = format!("ytsearch:{}", searches[0]);
                return enqueue_url(ctx, data, guild_id, channel_id, requester, &url, true).await;
            }
            ensure_voice(ctx, guild_id, requester.id).await?;
            let tracks = searches.into_iter().map(TrackMetadata::from_search_term).collect();
            let summary = enqueue_many(ctx, data, guild_id, channel_id, requester, tracks).await?;
            Ok(EnqueueOutcome::Loaded(summary.message("Spotify")))
        }
        InputType::YoutubePlaylist | InputType::SoundcloudPlaylist => {
            enqueue_playlist(ctx, data, guild_id, channel_id, requester, &value).await
        }
        InputType::RadioStream => {
            ensure_voice(ctx, guild_id, requester.id).await?;
            let track = TrackMetadata {
                title: stream_title(&value),
                url: value,
                is_live: true,
                ..Default::default()
            };
            enqueue_track(ctx, data, guild_id, channel_id, requester, track, false).await
        }
        InputType::SearchQuery => {
            let url = format!("ytsearch:{}", value);
            enqueue_url(ctx, data, guild_id, channel_id, requester, &url, play_next).await
        }
        InputType::YoutubeUrl | InputType::SoundcloudUrl => {
            enqueue_url(ctx, data, guild_id, channel_id, requester, &value, play_next).await
        }
    }
}
