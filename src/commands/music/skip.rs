use poise::CreateReply;
use std::collections::HashSet;
use tracing::info;

use super::*;
use crate::commands::music::utils::button_controls::vote_skip_buttons;
use crate::commands::music::utils::component_handlers::expire_view;
use crate::commands::music::utils::embedded_messages::text_reply;
use crate::commands::music::utils::event_handlers;
use crate::commands::music::utils::music_manager::{MUSIC_MANAGER, MusicManager};
use crate::commands::music::utils::permissions::{humans_in_channel, require_dj};
use crate::commands::music::utils::views::{PendingView, VOTE_SKIP_TTL};
use crate::{CommandResult, Context};

/// Votes needed to pass a skip among `listeners` humans.
pub fn required_votes(listeners: usize) -> usize {
    listeners.div_ceil(2).max(1)
}

async fn current_title(ctx: Context<'_>) -> Option<String> {
    let guild_id = ctx.guild_id()?;
    let queue = ctx.data().queues.get(guild_id);
    let gq = queue.lock().await;
    gq.current.as_ref().map(|track| track.title.clone())
}

/// Skip the current track
#[poise::command(slash_command, guild_only, category = "Playback")]
pub async fn skip(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    if !require_dj(ctx).await? {
        return Ok(());
    }
    if !is_playing(guild_id).await {
        return nothing_playing(ctx).await;
    }

    let title = current_title(ctx).await.unwrap_or_else(|| "current track".to_string());
    event_handlers::skip(ctx.serenity_context(), ctx.data(), guild_id).await?;
    let message = ctx.data().t(guild_id, "skipped", &[("title", &title)]).await;
    ctx.send(text_reply(message)).await?;
    Ok(())
}

/// Start a vote to skip the current track
#[poise::command(slash_command, guild_only, category = "Playback")]
pub async fn voteskip(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    if !is_playing(guild_id).await {
        return nothing_playing(ctx).await;
    }
    let Some(channel) = MusicManager::bot_channel(ctx.serenity_context(), guild_id).await else {
        return nothing_playing(ctx).await;
    };

    let listeners = humans_in_channel(ctx.serenity_context(), guild_id, channel);
    let required = required_votes(listeners);
    if listeners <= 1 || required <= 1 {
        let message = match listeners {
            0 | 1 => {
                let title = current_title(ctx).await.unwrap_or_else(|| "current track".to_string());
                format!("Skipped **{}**.", title)
            }
            _ => "Vote skip passed! Skipping...".to_string(),
        };
        event_handlers::skip(ctx.serenity_context(), ctx.data(), guild_id).await?;
        ctx.send(text_reply(message)).await?;
        return Ok(());
    }

    let voters = HashSet::from([ctx.author().id]);
    ctx.data().queues.get(guild_id).lock().await.skip_votes = voters.clone();

    let handle = ctx
        .send(
            CreateReply::default()
                .content(format!("Vote to skip: **1/{}** votes. Click below to vote!", required))
                .components(vote_skip_buttons(1, required, false)),
        )
        .await?;
    let message = handle.message().await?;
    info!("Vote skip started in guild {} ({} needed)", guild_id, required);

    let data = ctx.data();
    data.views.insert(
        message.id,
        PendingView::VoteSkip {
            guild_id,
            required,
            voters,
        },
        VOTE_SKIP_TTL,
    );
    expire_view(
        ctx.serenity_context().http.clone(),
        data.views.clone(),
        message.channel_id,
        message.id,
        VOTE_SKIP_TTL,
        Some("Vote skip expired.".to_string()),
        vote_skip_buttons(1, required, true),
    );
    Ok(())
}

/// Play the previous track
#[poise::command(slash_command, guild_only, category = "Playback")]
pub async fn back(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    if !require_dj(ctx).await? {
        return Ok(());
    }
    if MusicManager::get_call(ctx.serenity_context(), guild_id).await.is_err() {
        return ephemeral(ctx, "Not connected.").await;
    }
    match event_handlers::play_previous(ctx.serenity_context(), ctx.data(), guild_id).await? {
        Some(title) => {
            ctx.send(text_reply(format!("Playing previous: **{}**.", title))).await?;
            Ok(())
        }
        None => ephemeral(ctx, "No previous track.").await,
    }
}

/// Restart the current track from the beginning
#[poise::command(slash_command, guild_only, category = "Playback")]
pub async fn replay(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    if !require_dj(ctx).await? {
        return Ok(());
    }
    if !MUSIC_MANAGER.lock().await.is_active(guild_id) {
        return nothing_playing(ctx).await;
    }

    ctx.defer().await?;
    event_handlers::restart_playback(ctx.serenity_context(), ctx.data(), guild_id, 0).await?;
    let title = current_title(ctx).await.unwrap_or_else(|| "current track".to_string());
    ctx.send(text_reply(format!("Replaying **{}**.", title))).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    /// Half the listeners, rounded up, never less than one.
    #[test_case(0, 1)]
    #[test_case(1, 1)]
    #[test_case(2, 1)]
    #[test_case(3, 2)]
    #[test_case(4, 2)]
    #[test_case(7, 4)]
    fn test_required_votes(listeners: usize, expected: usize) {
        assert_eq!(required_votes(listeners), expected);
    }
}
