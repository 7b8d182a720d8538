//! Button and select-menu callbacks for every `music_` component the bot posts.

use poise::serenity_prelude as serenity;
use serenity::all::{
    ChannelId, ComponentInteraction, ComponentInteractionDataKind, CreateActionRow,
    CreateInteractionResponse, CreateInteractionResponseFollowup, CreateInteractionResponseMessage,
    EditMessage, GuildId, MessageId,
};
use serenity::http::Http;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::button_controls::{self, ComponentAction};
use super::embedded_messages::{self, NOTHING_PLAYING};
use super::enqueue::{self, Requester};
use super::event_handlers;
use super::music_manager::{MUSIC_MANAGER, MusicManager};
use super::permissions;
use super::views::{PendingView, ViewRegistry};
use crate::commands::music::audio_sources::mix_video_url;
use crate::utils::database::Vote;
use crate::{Data, Error};

/// Seconds jumped by the rewind and forward buttons.
const SEEK_STEP: u64 = 10;
const VOLUME_STEP: f32 = 0.1;

type ComponentResult = Result<(), Error>;

/// Entry point for every component interaction whose id starts with `music_`.
pub async fn handle_interaction(
    ctx: &serenity::Context,
    data: &Data,
    interaction: &ComponentInteraction,
) -> ComponentResult {
    let Some(action) = ComponentAction::parse(&interaction.data.custom_id) else {
        warn!("Unknown component id: {}", interaction.data.custom_id);
        return respond_ephemeral(ctx, interaction, "Unknown button.").await;
    };
    let Some(guild_id) = interaction.guild_id else {
        return respond_ephemeral(ctx, interaction, "This only works in a server.").await;
    };
    debug!(
        "Component {:?} from {} in guild {}",
        action, interaction.user.name, guild_id
    );

    match action {
        ComponentAction::Previous => previous(ctx, data, interaction, guild_id).await,
        ComponentAction::Rewind => seek_relative(ctx, data, interaction, guild_id, false).await,
        ComponentAction::Forward => seek_relative(ctx, data, interaction, guild_id, true).await,
        ComponentAction::Seek(secs) => seek_to(ctx, data, interaction, guild_id, secs).await,
        ComponentAction::PauseResume => pause_resume(ctx, data, interaction, guild_id).await,
        ComponentAction::Next => next(ctx, data, interaction, guild_id).await,
        ComponentAction::VolumeDown => nudge_volume(ctx, data, interaction, guild_id, -VOLUME_STEP).await,
        ComponentAction::VolumeUp => nudge_volume(ctx, data, interaction, guild_id, VOLUME_STEP).await,
        ComponentAction::QueuePage(page) => queue_page(ctx, data, interaction, guild_id, page).await,
        ComponentAction::SearchPick(index) => search_pick(ctx, data, interaction, guild_id, index).await,
        ComponentAction::MixVideo => mix_choice(ctx, data, interaction, guild_id, false).await,
        ComponentAction::MixAll => mix_choice(ctx, data, interaction, guild_id, true).await,
        ComponentAction::VoteSkip => vote_skip(ctx, data, interaction, guild_id).await,
        ComponentAction::RateUp => rate(ctx, data, interaction, Vote::Up).await,
        ComponentAction::RateDown => rate(ctx, data, interaction, Vote::Down).await,
        ComponentAction::DjApprove(id) => dj_decision(ctx, data, interaction, guild_id, id, true).await,
        ComponentAction::DjReject(id) => dj_decision(ctx, data, interaction, guild_id, id, false).await,
        ComponentAction::Help => help(ctx, interaction).await,
    }
}

async fn respond_ephemeral(ctx: &serenity::Context, interaction: &ComponentInteraction, message: &str) -> ComponentResult {
    let response = CreateInteractionResponseMessage::new()
        .content(message)
        .ephemeral(true);
    interaction
        .create_response(&ctx.http, CreateInteractionResponse::Message(response))
        .await?;
    Ok(())
}

/// Acknowledge without changing the message; the player refresh redraws it.
async fn acknowledge(ctx: &serenity::Context, interaction: &ComponentInteraction) -> ComponentResult {
    interaction
        .create_response(&ctx.http, CreateInteractionResponse::Acknowledge)
        .await?;
    Ok(())
}

async fn update_message(
    ctx: &serenity::Context,
    interaction: &ComponentInteraction,
    message: CreateInteractionResponseMessage,
) -> ComponentResult {
    interaction
        .create_response(&ctx.http, CreateInteractionResponse::UpdateMessage(message))
        .await?;
    Ok(())
}

async fn followup(
    ctx: &serenity::Context,
    interaction: &ComponentInteraction,
    message: impl Into<String>,
    ephemeral: bool,
) -> ComponentResult {
    let followup = CreateInteractionResponseFollowup::new()
        .content(message)
        .ephemeral(ephemeral);
    interaction.create_followup(&ctx.http, followup).await?;
    Ok(())
}

/// Answer with the DJ error and return `true` when the clicking member may not use DJ controls.
async fn dj_denied(
    ctx: &serenity::Context,
    data: &Data,
    interaction: &ComponentInteraction,
    guild_id: GuildId,
) -> Result<bool, Error> {
    let Some(member) = interaction.member.as_ref() else {
        return Ok(false);
    };
    match permissions::check_dj(ctx, data, guild_id, member).await {
        None => Ok(false),
        Some(message) => {
            respond_ephemeral(ctx, interaction, &message).await?;
            Ok(true)
        }
    }
}

async fn requester(ctx: &serenity::Context, data: &Data, interaction: &ComponentInteraction, guild_id: GuildId) -> Requester {
    let name = interaction
        .member
        .as_ref()
        .map(|m| m.display_name().to_string())
        .unwrap_or_else(|| interaction.user.display_name().to_string());
    let is_dj = match interaction.member.as_ref() {
        Some(member) => permissions::check_dj(ctx, data, guild_id, member).await.is_none(),
        None => false,
    };
    Requester::new(interaction.user.id, name, is_dj)
}

async fn previous(ctx: &serenity::Context, data: &Data, interaction: &ComponentInteraction, guild_id: GuildId) -> ComponentResult {
    if data.queues.get(guild_id).lock().await.previous.is_none() {
        return respond_ephemeral(ctx, interaction, "No previous track.").await;
    }
    acknowledge(ctx, interaction).await?;
    event_handlers::play_previous(ctx, data, guild_id).await?;
    Ok(())
}

/// Position and duration of the current track, if one is playing.
async fn position(data: &Data, guild_id: GuildId) -> Option<(u64, i64)> {
    if !MUSIC_MANAGER.lock().await.is_active(guild_id) {
        return None;
    }
    let queue = data.queues.get(guild_id);
    let gq = queue.lock().await;
    gq.current
        .as_ref()
        .map(|track| (gq.elapsed_secs(), track.duration_secs()))
}

async fn seek_relative(
    ctx: &serenity::Context,
    data: &Data,
    interaction: &ComponentInteraction,
    guild_id: GuildId,
    forward: bool,
) -> ComponentResult {
    if dj_denied(ctx, data, interaction, guild_id).await? {
        return Ok(());
    }
    let Some((elapsed, duration)) = position(data, guild_id).await else {
        return respond_ephemeral(ctx, interaction, NOTHING_PLAYING).await;
    };

    let target = if forward {
        elapsed + SEEK_STEP
    } else {
        elapsed.saturating_sub(SEEK_STEP)
    };
    if forward && duration > 0 && target >= duration as u64 {
        return respond_ephemeral(ctx, interaction, "Already near the end.").await;
    }

    acknowledge(ctx, interaction).await?;
    event_handlers::restart_playback(ctx, data, guild_id, target).await?;
    Ok(())
}

async fn seek_to(
    ctx: &serenity::Context,
    data: &Data,
    interaction: &ComponentInteraction,
    guild_id: GuildId,
    secs: u64,
) -> ComponentResult {
    if dj_denied(ctx, data, interaction, guild_id).await? {
        return Ok(());
    }
    let Some((_, duration)) = position(data, guild_id).await else {
        return respond_ephemeral(ctx, interaction, NOTHING_PLAYING).await;
    };

    let target = if duration > 0 {
        secs.min(duration as u64 - 1)
    } else {
        secs
    };
    acknowledge(ctx, interaction).await?;
    event_handlers::restart_playback(ctx, data, guild_id, target).await?;
    Ok(())
}

async fn pause_resume(ctx: &serenity::Context, data: &Data, interaction: &ComponentInteraction, guild_id: GuildId) -> ComponentResult {
    if MusicManager::get_call(ctx, guild_id).await.is_err() {
        return respond_ephemeral(ctx, interaction, "Not connected.").await;
    }
    let (active, paused) = {
        let manager = MUSIC_MANAGER.lock().await;
        (manager.is_active(guild_id), manager.is_paused(guild_id))
    };

    if paused {
        event_handlers::resume(ctx, data, guild_id).await?;
    } else if active {
        event_handlers::pause(data, guild_id).await?;
    } else {
        return respond_ephemeral(ctx, interaction, NOTHING_PLAYING).await;
    }
    acknowledge(ctx, interaction).await?;
    event_handlers::refresh_player(ctx, data, guild_id).await;
    Ok(())
}

async fn next(ctx: &serenity::Context, data: &Data, interaction: &ComponentInteraction, guild_id: GuildId) -> ComponentResult {
    if dj_denied(ctx, data, interaction, guild_id).await? {
        return Ok(());
    }
    if !MUSIC_MANAGER.lock().await.is_active(guild_id) {
        return respond_ephemeral(ctx, interaction, NOTHING_PLAYING).await;
    }
    acknowledge(ctx, interaction).await?;
    event_handlers::skip(ctx, data, guild_id).await?;
    Ok(())
}

/// New volume after a step, rounded to whole percent and kept within 0..=1.
pub fn stepped_volume(volume: f32, step: f32) -> f32 {
    (((volume + step) * 100.0).round() / 100.0).clamp(0.0, 1.0)
}

async fn nudge_volume(
    ctx: &serenity::Context,
    data: &Data,
    interaction: &ComponentInteraction,
    guild_id: GuildId,
    step: f32,
) -> ComponentResult {
    let volume = {
        let queue = data.queues.get(guild_id);
        let mut gq = queue.lock().await;
        gq.settings.volume = stepped_volume(gq.settings.volume, step);
        data.queues.save_settings(guild_id, &gq);
        gq.settings.volume
    };
    event_handlers::set_volume(guild_id, volume).await;
    acknowledge(ctx, interaction).await?;
    event_handlers::refresh_player(ctx, data, guild_id).await;
    Ok(())
}

async fn queue_page(
    ctx: &serenity::Context,
    data: &Data,
    interaction: &ComponentInteraction,
    guild_id: GuildId,
    page: usize,
) -> ComponentResult {
    let (embed, components) = {
        let queue = data.queues.get(guild_id);
        let gq = queue.lock().await;
        embedded_messages::queue_embed(&gq, page)
    };
    let message = CreateInteractionResponseMessage::new()
        .embed(embed)
        .components(components);
    update_message(ctx, interaction, message).await
}

async fn search_pick(
    ctx: &serenity::Context,
    data: &Data,
    interaction: &ComponentInteraction,
    guild_id: GuildId,
    index: usize,
) -> ComponentResult {
    let track = match data.views.get(interaction.message.id) {
        Some(PendingView::Search { results }) => results.get(index).cloned(),
        _ => None,
    };
    let Some(track) = track else {
        return respond_ephemeral(ctx, interaction, "These search results have expired.").await;
    };

    interaction.defer(&ctx.http).await?;
    let requester = requester(ctx, data, interaction, guild_id).await;
    if let Err(e) = enqueue::ensure_voice(ctx, guild_id, requester.id).await {
        return followup(ctx, interaction, e.to_string(), true).await;
    }
    info!("{} picked search result '{}'", requester.name, track.title);
    let outcome = enqueue::play_now(ctx, data, guild_id, interaction.channel_id, &requester, track).await?;
    followup(ctx, interaction, outcome.message(), outcome.is_private()).await
}

async fn mix_choice(
    ctx: &serenity::Context,
    data: &Data,
    interaction: &ComponentInteraction,
    guild_id: GuildId,
    load_all: bool,
) -> ComponentResult {
    let Some(PendingView::Mix { url }) = data.views.remove(interaction.message.id) else {
        return respond_ephemeral(ctx, interaction, "This choice has expired.").await;
    };
    let message = CreateInteractionResponseMessage::new().components(button_controls::mix_buttons(true));
    update_message(ctx, interaction, message).await?;

    let requester = requester(ctx, data, interaction, guild_id).await;
    let channel_id = interaction.channel_id;
    let outcome = if load_all {
        enqueue::enqueue_playlist(ctx, data, guild_id, channel_id, &requester, &url).await
    } else {
        let video = mix_video_url(&url).unwrap_or(url);
        enqueue::enqueue_url(ctx, data, guild_id, channel_id, &requester, &video, false).await
    };
    match outcome {
        Ok(outcome) => followup(ctx, interaction, outcome.message(), outcome.is_private()).await,
        Err(e) => followup(ctx, interaction, e.to_string(), true).await,
    }
}

async fn vote_skip(ctx: &serenity::Context, data: &Data, interaction: &ComponentInteraction, guild_id: GuildId) -> ComponentResult {
    let message_id = interaction.message.id;
    let voter = interaction.user.id;
    let tally = data
        .views
        .with_view_mut(message_id, |view| match view {
            PendingView::VoteSkip { voters, required, .. } => {
                voters.insert(voter);
                Some((voters.clone(), *required))
            }
            _ => None,
        })
        .flatten();
    let Some((voters, required)) = tally else {
        return respond_ephemeral(ctx, interaction, "Vote skip expired.").await;
    };

    let count = voters.len();
    data.queues.get(guild_id).lock().await.skip_votes = voters;

    if count < required {
        let message = CreateInteractionResponseMessage::new()
            .components(button_controls::vote_skip_buttons(count, required, false));
        return update_message(ctx, interaction, message).await;
    }

    data.views.remove(message_id);
    info!("Vote skip passed in guild {} ({}/{})", guild_id, count, required);
    let message = CreateInteractionResponseMessage::new()
        .content(format!("Vote skip passed ({}/{})! Skipping...", count, required))
        .components(button_controls::vote_skip_buttons(count, required, true));
    update_message(ctx, interaction, message).await?;

    if MUSIC_MANAGER.lock().await.is_active(guild_id) {
        event_handlers::skip(ctx, data, guild_id).await?;
    }
    Ok(())
}

async fn rate(ctx: &serenity::Context, data: &Data, interaction: &ComponentInteraction, vote: Vote) -> ComponentResult {
    let Some(PendingView::Rate { guild_id, url, title }) = data.views.get(interaction.message.id) else {
        return respond_ephemeral(ctx, interaction, "Rating has expired.").await;
    };
    let (up, down) = data
        .db()
        .rate(guild_id.get(), &url, &title, interaction.user.id.get(), vote)?;
    debug!("{} voted {} on '{}' ({} up, {} down)", interaction.user.name, vote, title, up, down);

    let message = CreateInteractionResponseMessage::new().components(button_controls::rate_buttons(up, down));
    update_message(ctx, interaction, message).await
}

async fn dj_decision(
    ctx: &serenity::Context,
    data: &Data,
    interaction: &ComponentInteraction,
    guild_id: GuildId,
    request_id: u64,
    approve: bool,
) -> ComponentResult {
    if dj_denied(ctx, data, interaction, guild_id).await? {
        return Ok(());
    }

    let queue = data.queues.get(guild_id);
    let decision = {
        let mut gq = queue.lock().await;
        match gq.take_request(request_id) {
            None => None,
            Some(request) if !approve => Some(Ok(format!("Rejected **{}**.", request.track.title))),
            Some(request) => {
                let title = request.track.title.clone();
                match gq.add(request.track) {
                    Some(position) => {
                        data.queues.save_queue_state(guild_id, &gq);
                        Some(Ok(format!("Approved **{}** (position #{}).", title, position)))
                    }
                    None => Some(Err("Queue is full.")),
                }
            }
        }
    };

    let content = match decision {
        None => return respond_ephemeral(ctx, interaction, "This request was already handled.").await,
        Some(Err(message)) => return respond_ephemeral(ctx, interaction, message).await,
        Some(Ok(content)) => content,
    };
    info!("DJ request #{} in guild {}: {}", request_id, guild_id, content);
    let message = CreateInteractionResponseMessage::new()
        .content(content)
        .components(button_controls::dj_approval_buttons(request_id, true));
    update_message(ctx, interaction, message).await?;

    if approve && !MUSIC_MANAGER.lock().await.is_active(guild_id) {
        event_handlers::play_next(ctx, data, guild_id).await?;
    }
    Ok(())
}

async fn help(ctx: &serenity::Context, interaction: &ComponentInteraction) -> ComponentResult {
    let category = match &interaction.data.kind {
        ComponentInteractionDataKind::StringSelect { values } => values.first().cloned(),
        _ => None,
    };
    let message = CreateInteractionResponseMessage::new()
        .embed(embedded_messages::help_embed(category.as_deref()))
        .components(embedded_messages::help_components());
    update_message(ctx, interaction, message).await
}

/// After `ttl`, disable the components of a message whose view is still pending.
pub fn expire_view(
    http: Arc<Http>,
    views: Arc<ViewRegistry>,
    channel_id: ChannelId,
    message_id: MessageId,
    ttl: Duration,
    content: Option<String>,
    components: Vec<CreateActionRow>,
) {
    tokio::spawn(async move {
        tokio::time::sleep(ttl).await;
        if views.remove(message_id).is_none() {
            return;
        }
        let mut edit = EditMessage::new().components(components);
        if let Some(content) = content {
            edit = edit.content(content);
        }
        if let Err(e) = channel_id.edit_message(&http, message_id, edit).await {
            debug!("Could not expire components on {}: {}", message_id, e);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    /// Volume steps land on whole percentages and never leave 0..=1.
    #[test_case(0.5, 0.1, 0.6 ; "up")]
    #[test_case(0.5, -0.1, 0.4 ; "down")]
    #[test_case(0.95, 0.1, 1.0 ; "clamped high")]
    #[test_case(0.05, -0.1, 0.0 ; "clamped low")]
    #[test_case(0.3, 0.1, 0.4 ; "float noise rounded")]
    fn test_stepped_volume(volume: f32, step: f32, expected: f32) {
        assert_eq!(stepped_volume(volume, step), expected);
    }

    /// An expired view is removed before the edit, so a completed view is left alone.
    #[tokio::test]
    async fn test_expire_view_skips_completed() {
        let views = Arc::new(ViewRegistry::default());
        let message_id = MessageId::new(5);
        views.insert(message_id, PendingView::Mix { url: "u".into() }, Duration::from_millis(1));
        views.remove(message_id);

        expire_view(
            Arc::new(Http::new("")),
            views.clone(),
            ChannelId::new(1),
            message_id,
            Duration::from_millis(1),
            None,
            Vec::new(),
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(views.is_empty());
    }
}
