use poise::CreateReply;
use poise::serenity_prelude as serenity;
use serenity::{CreateEmbed, CreateEmbedFooter};
use tracing::info;

use super::*;
use crate::commands::music::utils::embedded_messages::{COLOR_BLURPLE, queue_embed, text_reply};
use crate::commands::music::utils::event_handlers;
use crate::commands::music::utils::guild_queue::GuildQueue;
use crate::commands::music::utils::music_manager::MusicManager;
use crate::commands::music::utils::permissions::require_dj;
use crate::commands::music::utils::{format_duration, plural};
use crate::{CommandResult, Context};

fn invalid_position(gq: &GuildQueue) -> String {
    format!("❌ Invalid position. The queue has {} tracks.", gq.len())
}

/// Convert a 1-based user position into a queue index.
fn index_of(gq: &GuildQueue, position: usize) -> Option<usize> {
    (1..=gq.len()).contains(&position).then(|| position - 1)
}

/// Show the queue
#[poise::command(slash_command, guild_only, category = "Queue")]
pub async fn queue(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    let reply = {
        let queue = ctx.data().queues.get(guild_id);
        let gq = queue.lock().await;
        if gq.current.is_none() && gq.is_empty() {
            None
        } else {
            let (embed, components) = queue_embed(&gq, 0);
            Some(CreateReply::default().embed(embed).components(components))
        }
    };
    match reply {
        Some(reply) => {
            ctx.send(reply).await?;
            Ok(())
        }
        None => ephemeral(ctx, "❌ The queue is empty. Use `/play` to add tracks.").await,
    }
}

/// Show only the tracks you have in the queue
#[poise::command(slash_command, guild_only, category = "Queue")]
pub async fn myqueue(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    let name = display_name(ctx).await;
    let lines: Vec<String> = {
        let queue = ctx.data().queues.get(guild_id);
        let gq = queue.lock().await;
        gq.tracks_for_user(ctx.author().id.get(), &name)
            .into_iter()
            .map(|(position, track)| {
                format!(
                    "`#{}.` {} [{}]",
                    position,
                    track.title,
                    format_duration(track.duration_secs())
                )
            })
            .collect()
    };
    if lines.is_empty() {
        return ephemeral(ctx, "You have no tracks in the queue.").await;
    }

    let count = lines.len();
    let embed = CreateEmbed::new()
        .title(format!("📋 Your tracks: {}", name))
        .description(lines.join("\n"))
        .color(COLOR_BLURPLE)
        .footer(CreateEmbedFooter::new(format!(
            "{} track{} in queue",
            count,
            plural(count)
        )));
    ctx.send(CreateReply::default().embed(embed).ephemeral(true)).await?;
    Ok(())
}

/// Remove a track from the queue
#[poise::command(slash_command, guild_only, category = "Queue")]
pub async fn remove(
    ctx: Context<'_>,
    #[description = "Position in the queue (1-indexed)"] position: usize,
) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    if !require_dj(ctx).await? {
        return Ok(());
    }
    let data = ctx.data();
    let removed = {
        let queue = data.queues.get(guild_id);
        let mut gq = queue.lock().await;
        let Some(index) = index_of(&gq, position) else {
            let message = invalid_position(&gq);
            drop(gq);
            return ephemeral(ctx, message).await;
        };
        gq.snapshot(format!("Removed #{}", position));
        let removed = gq.remove_at(index);
        data.queues.save_queue_state(guild_id, &gq);
        removed
    };
    let title = removed.map(|track| track.title).unwrap_or_default();
    ctx.send(text_reply(format!("Removed **{}** from the queue.", title))).await?;
    Ok(())
}

/// Move a track to a different position in the queue
#[poise::command(slash_command, guild_only, rename = "move", category = "Queue")]
pub async fn move_track(
    ctx: Context<'_>,
    #[description = "Current position of the track (1-indexed)"] from: usize,
    #[description = "New position for the track (1-indexed)"] to: usize,
) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    if !require_dj(ctx).await? {
        return Ok(());
    }
    if from == to {
        return ephemeral(ctx, "Track is already at that position.").await;
    }
    let data = ctx.data();
    let moved = {
        let queue = data.queues.get(guild_id);
        let mut gq = queue.lock().await;
        let moved = match (index_of(&gq, from), to.checked_sub(1)) {
            (Some(from), Some(to)) => gq.move_track(from, to),
            _ => None,
        };
        match moved {
            Some(track) => {
                data.queues.save_queue_state(guild_id, &gq);
                Ok(track)
            }
            None => Err(invalid_position(&gq)),
        }
    };
    match moved {
        Ok(track) => {
            ctx.send(text_reply(format!("Moved **{}** to position #{}.", track.title, to)))
                .await?;
            Ok(())
        }
        Err(message) => ephemeral(ctx, message).await,
    }
}

/// Skip to a specific position in the queue
#[poise::command(slash_command, guild_only, category = "Queue")]
pub async fn skipto(
    ctx: Context<'_>,
    #[description = "Position in the queue to skip to (1-indexed)"] position: usize,
) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    if !require_dj(ctx).await? {
        return Ok(());
    }
    if MusicManager::get_call(ctx.serenity_context(), guild_id).await.is_err() {
        return ephemeral(ctx, "Not connected.").await;
    }
    let data = ctx.data();
    let target = {
        let queue = data.queues.get(guild_id);
        let mut gq = queue.lock().await;
        let Some(index) = index_of(&gq, position) else {
            let message = invalid_position(&gq);
            drop(gq);
            return ephemeral(ctx, message).await;
        };
        gq.snapshot(format!("Skip to #{}", position));
        let target = gq.skip_to(index);
        gq.current = None;
        data.queues.save_queue_state(guild_id, &gq);
        target
    };
    let title = target.map(|track| track.title).unwrap_or_default();
    info!("Skipping to #{} in guild {}", position, guild_id);
    event_handlers::skip(ctx.serenity_context(), data, guild_id).await?;
    ctx.send(text_reply(format!("Skipping to **{}**.", title))).await?;
    Ok(())
}

/// Clear the queue (keeps the current track playing)
#[poise::command(slash_command, guild_only, category = "Queue")]
pub async fn clear(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    if !require_dj(ctx).await? {
        return Ok(());
    }
    let data = ctx.data();
    let count = {
        let queue = data.queues.get(guild_id);
        let mut gq = queue.lock().await;
        let count = gq.len();
        if count > 0 {
            gq.snapshot("Clear queue");
            gq.queue.clear();
            data.queues.save_queue_state(guild_id, &gq);
        }
        count
    };
    if count == 0 {
        return ephemeral(ctx, "❌ Queue is already empty.").await;
    }
    ctx.send(text_reply(format!(
        "🗑️ Cleared **{}** track{} from the queue.",
        count,
        plural(count)
    )))
    .await?;
    Ok(())
}

/// Shuffle the queue, spreading tracks from the same artist evenly
#[poise::command(slash_command, guild_only, category = "Queue")]
pub async fn shuffle(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    if !require_dj(ctx).await? {
        return Ok(());
    }
    let data = ctx.data();
    let count = {
        let queue = data.queues.get(guild_id);
        let mut gq = queue.lock().await;
        let count = gq.len();
        if count >= 2 {
            gq.snapshot("Shuffle");
            gq.smart_shuffle();
            data.queues.save_queue_state(guild_id, &gq);
        }
        count
    };
    if count < 2 {
        return ephemeral(ctx, "Not enough tracks to shuffle.").await;
    }
    ctx.send(text_reply(format!("🔀 Shuffled **{}** tracks.", count))).await?;
    Ok(())
}

/// Cycle the loop mode: off, single track, whole queue
#[poise::command(slash_command, guild_only, rename = "loop", category = "Queue")]
pub async fn loop_mode(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    if !require_dj(ctx).await? {
        return Ok(());
    }
    let data = ctx.data();
    let mode = {
        let queue = data.queues.get(guild_id);
        let mut gq = queue.lock().await;
        gq.settings.loop_mode = gq.settings.loop_mode.next();
        data.queues.save_settings(guild_id, &gq);
        data.queues.save_queue_state(guild_id, &gq);
        gq.settings.loop_mode
    };
    event_handlers::refresh_player(ctx.serenity_context(), data, guild_id).await;
    ctx.send(text_reply(format!("🔁 Loop: **{}**.", mode.label()))).await?;
    Ok(())
}

/// Undo the last queue change
#[poise::command(slash_command, guild_only, category = "Queue")]
pub async fn undo(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    if !require_dj(ctx).await? {
        return Ok(());
    }
    let data = ctx.data();
    let description = {
        let queue = data.queues.get(guild_id);
        let mut gq = queue.lock().await;
        let description = gq.undo();
        if description.is_some() {
            data.queues.save_queue_state(guild_id, &gq);
        }
        description
    };
    match description {
        Some(description) => {
            ctx.send(text_reply(format!("Undone: **{}**. Queue restored.", description)))
                .await?;
            Ok(())
        }
        None => ephemeral(ctx, "Nothing to undo.").await,
    }
}
