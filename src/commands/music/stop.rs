use tracing::info;

use super::*;
use crate::commands::music::utils::embedded_messages::text_reply;
use crate::commands::music::utils::event_handlers;
use crate::commands::music::utils::music_manager::MusicManager;
use crate::commands::music::utils::permissions::require_dj;
use crate::{CommandResult, Context};

/// Stop the music, clear the queue, and leave the voice channel
#[poise::command(slash_command, guild_only, category = "Playback")]
pub async fn stop(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    if !require_dj(ctx).await? {
        return Ok(());
    }
    if MusicManager::get_call(ctx.serenity_context(), guild_id).await.is_err() {
        return ephemeral(ctx, "Not connected.").await;
    }

    let data = ctx.data();
    data.queues.get(guild_id).lock().await.clear();
    event_handlers::disconnect(ctx.serenity_context(), data, guild_id).await;
    info!("Stopped playback in guild {}", guild_id);

    let message = data.t(guild_id, "stopped", &[]).await;
    ctx.send(text_reply(format!("⏹️ {}", message))).await?;
    Ok(())
}
