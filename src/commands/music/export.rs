use poise::CreateReply;
use poise::serenity_prelude as serenity;
use serenity::CreateAttachment;

use super::*;
use crate::commands::music::utils::embedded_messages::text_reply;
use crate::commands::music::utils::enqueue::{self, ensure_voice};
use crate::commands::music::utils::plural;
use crate::commands::music::utils::queue_export::{INLINE_CODE_LIMIT, export_code, import_code};
use crate::{CommandResult, Context};

/// Export the current queue as a shareable code
#[poise::command(slash_command, guild_only, rename = "queue-export", category = "Queue")]
pub async fn queue_export(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    let code = {
        let queue = ctx.data().queues.get(guild_id);
        let gq = queue.lock().await;
        if gq.current.is_none() && gq.is_empty() {
            None
        } else {
            Some(export_code(gq.current.iter().chain(gq.queue.iter()))?)
        }
    };
    let Some(code) = code else {
        return ephemeral(ctx, "Nothing to export.").await;
    };

    let reply = if code.len() <= INLINE_CODE_LIMIT {
        text_reply(format!("```\n{}\n```", code))
    } else {
        CreateReply::default()
            .content("Queue exported:")
            .attachment(CreateAttachment::bytes(code.into_bytes(), "queue.txt"))
    };
    ctx.send(reply).await?;
    Ok(())
}

/// Import a queue from an exported code
#[poise::command(slash_command, guild_only, rename = "queue-import", category = "Queue")]
pub async fn queue_import(
    ctx: Context<'_>,
    #[description = "The exported queue code"] code: String,
) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    let Ok(tracks) = import_code(&code) else {
        return ephemeral(ctx, "Invalid queue code.").await;
    };
    if tracks.is_empty() {
        return ephemeral(ctx, "❌ No tracks found in that code.").await;
    }

    ctx.defer().await?;
    ensure_voice(ctx.serenity_context(), guild_id, ctx.author().id).await?;
    let requester = requester(ctx).await;
    let summary = enqueue::enqueue_many(
        ctx.serenity_context(),
        ctx.data(),
        guild_id,
        ctx.channel_id(),
        &requester,
        tracks,
    )
    .await?;

    ctx.send(text_reply(format!(
        "Imported **{}** track{}.{}",
        summary.queued,
        plural(summary.queued),
        summary.suffix()
    )))
    .await?;
    Ok(())
}
