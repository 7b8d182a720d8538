//! `/autoplay`, radio mode and Spotify recommendations.

use poise::serenity_prelude as serenity;
use serenity::CreateEmbed;
use std::collections::HashSet;
use tracing::{debug, info};

use super::*;
use crate::commands::music::search::{post_results, result_lines};
use crate::commands::music::utils::embedded_messages::{COLOR_SUCCESS, text_reply};
use crate::commands::music::utils::enqueue::ensure_voice;
use crate::commands::music::utils::event_handlers;
use crate::commands::music::utils::music_manager::MUSIC_MANAGER;
use crate::commands::music::utils::permissions::require_dj;
use crate::{CommandResult, Context};

/// Tracks queued when radio starts.
const RADIO_BATCH: usize = 5;
const SIMILAR_LIMIT: usize = 5;
/// Shown in the queue as the requester of radio picks.
pub const RADIO_REQUESTER: &str = "Radio";

/// Auto-queue similar tracks when the queue runs out.
///
/// Without an argument the current state is toggled.
#[poise::command(slash_command, guild_only, category = "Discovery")]
pub async fn autoplay(
    ctx: Context<'_>,
    #[description = "Enable or disable autoplay"] enabled: Option<bool>,
) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    if !require_dj(ctx).await? {
        return Ok(());
    }
    let data = ctx.data();
    if !data.spotify.available() {
        return ephemeral(ctx, "Autoplay requires Spotify credentials.").await;
    }

    let enabled = {
        let queue = data.queues.get(guild_id);
        let mut gq = queue.lock().await;
        gq.settings.autoplay = enabled.unwrap_or(!gq.settings.autoplay);
        data.queues.save_settings(guild_id, &gq);
        gq.settings.autoplay
    };
    info!("Autoplay in guild {} is now {}", guild_id, enabled);

    let state = if enabled { "on" } else { "off" };
    ctx.send(text_reply(format!("✨ Autoplay: **{}**.", state))).await?;
    Ok(())
}

/// Start endless radio: auto-queues similar tracks by artist or genre
#[poise::command(slash_command, guild_only, category = "Discovery")]
pub async fn radio(
    ctx: Context<'_>,
    #[description = "Artist name or genre to seed the radio"] seed: String,
) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    if !require_dj(ctx).await? {
        return Ok(());
    }
    let data = ctx.data();
    if !data.spotify.available() {
        return ephemeral(ctx, "Requires Spotify credentials.").await;
    }

    ctx.defer().await?;
    data.queues.get(guild_id).lock().await.text_channel_id = Some(ctx.channel_id());

    let picks = match data.spotify.recommend_by_seed(&seed, &HashSet::new(), RADIO_BATCH).await {
        Ok(picks) => picks,
        Err(e) => {
            debug!("Radio seed '{}' failed: {}", seed, e);
            Vec::new()
        }
    };
    if picks.is_empty() {
        ctx.send(text_reply(format!("❌ No tracks found for **{}**.", seed))).await?;
        return Ok(());
    }

    ensure_voice(ctx.serenity_context(), guild_id, ctx.author().id).await?;

    let queued = {
        let queue = data.queues.get(guild_id);
        let mut gq = queue.lock().await;
        gq.radio_mode = true;
        gq.radio_seed = Some(seed.clone());
        gq.radio_history.clear();
        let mut queued = 0;
        for (id, track) in picks {
            gq.radio_history.insert(id);
            if gq.add(track.requested(RADIO_REQUESTER, ctx.author().id.get())).is_none() {
                break;
            }
            queued += 1;
        }
        data.queues.save_queue_state(guild_id, &gq);
        queued
    };
    info!("Radio started in guild {} with seed '{}'", guild_id, seed);

    if !MUSIC_MANAGER.lock().await.is_active(guild_id) {
        event_handlers::play_next(ctx.serenity_context(), data, guild_id).await?;
    }

    ctx.send(text_reply(format!(
        "Radio started with **{}**. Queued {} tracks. More will be added automatically.",
        seed, queued
    )))
    .await?;
    Ok(())
}

/// Stop radio mode
#[poise::command(slash_command, guild_only, rename = "radio-off", category = "Discovery")]
pub async fn radio_off(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    if !require_dj(ctx).await? {
        return Ok(());
    }
    let was_active = {
        let queue = ctx.data().queues.get(guild_id);
        let mut gq = queue.lock().await;
        let was_active = gq.radio_mode;
        gq.radio_mode = false;
        gq.radio_seed = None;
        gq.radio_history.clear();
        was_active
    };
    if !was_active {
        return ephemeral(ctx, "Radio mode is not active.").await;
    }
    ctx.send(text_reply("📻 Radio mode stopped.")).await?;
    Ok(())
}

/// Show Spotify recommendations based on the current track
#[poise::command(slash_command, guild_only, category = "Discovery")]
pub async fn similar(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    let data = ctx.data();
    if !data.spotify.available() {
        return ephemeral(ctx, "Requires Spotify credentials.").await;
    }
    let title = data
        .queues
        .get(guild_id)
        .lock()
        .await
        .current
        .as_ref()
        .map(|track| track.title.clone());
    let Some(title) = title else {
        return nothing_playing(ctx).await;
    };

    ctx.defer().await?;
    let results = match data.spotify.recommend_multiple(&title, SIMILAR_LIMIT).await {
        Ok(results) => results,
        Err(e) => {
            debug!("Recommendations for '{}' failed: {}", title, e);
            Vec::new()
        }
    };
    if results.is_empty() {
        ctx.send(text_reply("No similar tracks found.")).await?;
        return Ok(());
    }

    let embed = CreateEmbed::new()
        .title(format!("Similar to: {}", title))
        .description(result_lines(&results))
        .color(COLOR_SUCCESS);
    post_results(ctx, embed, results).await
}
