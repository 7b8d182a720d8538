use poise::CreateReply;
use tracing::info;

use super::*;
use crate::commands::music::audio_sources::{InputType, classify, is_youtube_mix};
use crate::commands::music::utils::button_controls::mix_buttons;
use crate::commands::music::utils::component_handlers::expire_view;
use crate::commands::music::utils::embedded_messages::{ephemeral_reply, text_reply};
use crate::commands::music::utils::enqueue::{self, EnqueueOutcome, PLAYNEXT_SINGLE_ONLY};
use crate::commands::music::utils::views::{MIX_TTL, PendingView};
use crate::{CommandResult, Context};

const MIX_PROMPT: &str = "This is a **YouTube Mix**. Its contents are personalized and may differ from what you see in your browser.\nWhat would you like to do?";

/// Play a track or playlist from YouTube, Spotify, SoundCloud, a radio stream or search keywords
#[poise::command(slash_command, guild_only, category = "Playback")]
pub async fn play(
    ctx: Context<'_>,
    #[description = "URL or search keywords"] query: String,
) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    info!("play in guild {}: {}", guild_id, query);

    let (kind, value) = classify(&query);
    if kind == InputType::YoutubePlaylist && is_youtube_mix(&value) {
        return mix_prompt(ctx, value).await;
    }

    ctx.defer().await?;
    queue_query(ctx, &query, false).await
}

/// Queue a single track to play right after the current one
#[poise::command(slash_command, guild_only, category = "Playback")]
pub async fn playnext(
    ctx: Context<'_>,
    #[description = "URL or search keywords for a single track"] query: String,
) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    info!("playnext in guild {}: {}", guild_id, query);

    let (kind, _) = classify(&query);
    if kind.is_multi_track() {
        return ephemeral(ctx, PLAYNEXT_SINGLE_ONLY).await;
    }

    ctx.defer().await?;
    queue_query(ctx, &query, true).await
}

async fn queue_query(ctx: Context<'_>, query: &str, play_next: bool) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    let requester = requester(ctx).await;
    let outcome = enqueue::play_query(
        ctx.serenity_context(),
        ctx.data(),
        guild_id,
        ctx.channel_id(),
        &requester,
        query,
        play_next,
    )
    .await?;
    reply_outcome(ctx, &outcome).await
}

/// Refusals only go to the requester; everything else is posted for the channel.
pub(crate) async fn reply_outcome(ctx: Context<'_>, outcome: &EnqueueOutcome) -> CommandResult {
    let reply = if outcome.is_private() {
        ephemeral_reply(outcome.message())
    } else {
        text_reply(outcome.message())
    };
    ctx.send(reply).await?;
    Ok(())
}

/// Ask whether to play just the video a Mix was opened from, or the whole Mix.
async fn mix_prompt(ctx: Context<'_>, url: String) -> CommandResult {
    let handle = ctx
        .send(
            CreateReply::default()
                .content(MIX_PROMPT)
                .components(mix_buttons(false)),
        )
        .await?;
    let message = handle.message().await?;

    let data = ctx.data();
    data.views.insert(message.id, PendingView::Mix { url }, MIX_TTL);
    expire_view(
        ctx.serenity_context().http.clone(),
        data.views.clone(),
        message.channel_id,
        message.id,
        MIX_TTL,
        Some("Timed out.".to_string()),
        mix_buttons(true),
    );
    Ok(())
}
