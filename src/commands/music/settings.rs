//! Per-server configuration commands.

use futures::Stream;
use poise::serenity_prelude as serenity;
use serenity::{Permissions, Role};
use tracing::info;

use super::*;
use crate::commands::music::utils::embedded_messages::text_reply;
use crate::commands::music::utils::permissions::{author_is_admin, require_dj};
use crate::commands::music::utils::plural;
use crate::{CommandResult, Context};

pub const MAX_QUEUE_LIMIT: usize = 500;

pub fn max_queue_valid(size: usize) -> bool {
    (1..=MAX_QUEUE_LIMIT).contains(&size)
}

pub fn per_user_message(limit: usize) -> String {
    match limit {
        0 => "📋 Per-user queue limit removed.".to_string(),
        n => format!("📋 Each user can now queue up to **{}** track{}.", n, plural(n)),
    }
}

pub fn djmode_message(enabled: bool) -> String {
    if enabled {
        "DJ queue mode is now **on**. Non-DJs must get approval to add tracks.".to_string()
    } else {
        "DJ queue mode is now **off**.".to_string()
    }
}

/// Administrators always pass; otherwise the member needs `permission`.
async fn author_has(ctx: Context<'_>, permission: Permissions) -> bool {
    if author_is_admin(ctx).await {
        return true;
    }
    ctx.author_member()
        .await
        .and_then(|member| member.permissions)
        .is_some_and(|granted| granted.contains(permission))
}

async fn autocomplete_locale<'a>(ctx: Context<'_>, partial: &'a str) -> impl Stream<Item = String> + 'a {
    let matches: Vec<String> = ctx
        .data()
        .locales
        .available()
        .into_iter()
        .filter(|code| code.starts_with(&partial.to_lowercase()))
        .collect();
    futures::stream::iter(matches)
}

/// Toggle the default search between YouTube and Spotify
#[poise::command(slash_command, guild_only, category = "Settings")]
pub async fn searchmode(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    let mode = {
        let queue = ctx.data().queues.get(guild_id);
        let mut gq = queue.lock().await;
        gq.settings.search_mode = gq.settings.search_mode.toggled();
        ctx.data().queues.save_settings(guild_id, &gq);
        gq.settings.search_mode
    };
    ctx.send(text_reply(format!("Default search mode set to **{}**.", mode)))
        .await?;
    Ok(())
}

/// Set the maximum queue size
#[poise::command(slash_command, guild_only, category = "Settings")]
pub async fn maxqueue(
    ctx: Context<'_>,
    #[description = "Maximum number of tracks in the queue (1-500)"] size: usize,
) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    if !require_dj(ctx).await? {
        return Ok(());
    }
    if !max_queue_valid(size) {
        return ephemeral(
            ctx,
            format!("Max queue size must be between 1 and {}.", MAX_QUEUE_LIMIT),
        )
        .await;
    }

    {
        let queue = ctx.data().queues.get(guild_id);
        let mut gq = queue.lock().await;
        gq.settings.max_queue = size;
        ctx.data().queues.save_settings(guild_id, &gq);
    }
    ctx.send(text_reply(format!("📋 Max queue size set to **{}** tracks.", size)))
        .await?;
    Ok(())
}

/// Set the max tracks a single user can have in the queue (0 = unlimited)
#[poise::command(slash_command, guild_only, category = "Settings")]
pub async fn maxperuser(
    ctx: Context<'_>,
    #[description = "Max tracks per user, 0 to remove the limit"] limit: usize,
) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    if !require_dj(ctx).await? {
        return Ok(());
    }

    {
        let queue = ctx.data().queues.get(guild_id);
        let mut gq = queue.lock().await;
        gq.settings.max_per_user = limit;
        ctx.data().queues.save_settings(guild_id, &gq);
    }
    ctx.send(text_reply(per_user_message(limit))).await?;
    Ok(())
}

/// Set this channel as the dedicated now-playing display channel
#[poise::command(slash_command, guild_only, category = "Settings")]
pub async fn setnpchannel(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    if !author_has(ctx, Permissions::MANAGE_CHANNELS).await {
        return ephemeral(ctx, "You need the **Manage Channels** permission to use this.").await;
    }

    {
        let queue = ctx.data().queues.get(guild_id);
        let mut gq = queue.lock().await;
        gq.settings.np_channel_id = Some(ctx.channel_id().get());
        gq.np_message_id = None;
        ctx.data().queues.save_settings(guild_id, &gq);
    }
    info!("Now-playing channel for guild {} set to {}", guild_id, ctx.channel_id());
    ctx.send(text_reply(
        "📺 Now-playing updates will be posted in this channel when tracks change.\nUse `/clearnpchannel` to disable.",
    ))
    .await?;
    Ok(())
}

/// Disable the dedicated now-playing channel
#[poise::command(slash_command, guild_only, category = "Settings")]
pub async fn clearnpchannel(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    if !author_has(ctx, Permissions::MANAGE_CHANNELS).await {
        return ephemeral(ctx, "You need the **Manage Channels** permission to use this.").await;
    }

    {
        let queue = ctx.data().queues.get(guild_id);
        let mut gq = queue.lock().await;
        gq.settings.np_channel_id = None;
        gq.np_message_id = None;
        ctx.data().queues.save_settings(guild_id, &gq);
    }
    ctx.send(text_reply("📺 Now-playing channel cleared.")).await?;
    Ok(())
}

/// Set or show the DJ role (admin only)
#[poise::command(slash_command, guild_only, category = "Settings")]
pub async fn dj(
    ctx: Context<'_>,
    #[description = "Role allowed to control playback"] role: Option<Role>,
) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    if !author_is_admin(ctx).await {
        return ephemeral(ctx, "Only admins can set the DJ role.").await;
    }

    let queue = ctx.data().queues.get(guild_id);
    let Some(role) = role else {
        let current = queue.lock().await.settings.dj_role_id;
        let message = match current {
            Some(role_id) => {
                let name = ctx
                    .guild()
                    .and_then(|guild| guild.roles.get(&serenity::RoleId::new(role_id)).map(|r| r.name.clone()))
                    .unwrap_or_else(|| role_id.to_string());
                format!("Current DJ role: **{}**.", name)
            }
            None => "No DJ role is set.".to_string(),
        };
        ctx.send(text_reply(message)).await?;
        return Ok(());
    };

    {
        let mut gq = queue.lock().await;
        gq.settings.dj_role_id = Some(role.id.get());
        ctx.data().queues.save_settings(guild_id, &gq);
    }
    info!("DJ role for guild {} set to {}", guild_id, role.id);
    ctx.send(text_reply(format!(
        "🎧 DJ role set to **{}**. Only users with this role (or admins) can use music commands.",
        role.name
    )))
    .await?;
    Ok(())
}

/// Remove the DJ role restriction so anyone can use bot controls (admin only)
#[poise::command(slash_command, guild_only, category = "Settings")]
pub async fn djclear(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    if !author_is_admin(ctx).await {
        return ephemeral(ctx, "Only admins can clear the DJ role.").await;
    }

    {
        let queue = ctx.data().queues.get(guild_id);
        let mut gq = queue.lock().await;
        gq.settings.dj_role_id = None;
        ctx.data().queues.save_settings(guild_id, &gq);
    }
    ctx.send(text_reply("🔓 DJ role restriction cleared.")).await?;
    Ok(())
}

/// Toggle DJ queue mode: non-DJ requests need approval (admin only)
#[poise::command(slash_command, guild_only, category = "Settings")]
pub async fn djmode(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    if !author_is_admin(ctx).await {
        return ephemeral(ctx, "Only admins can toggle DJ mode.").await;
    }

    let enabled = {
        let queue = ctx.data().queues.get(guild_id);
        let mut gq = queue.lock().await;
        gq.dj_queue_mode = !gq.dj_queue_mode;
        gq.dj_queue_mode
    };
    info!("DJ queue mode in guild {} is now {}", guild_id, enabled);
    ctx.send(text_reply(djmode_message(enabled))).await?;
    Ok(())
}

/// Toggle 24/7 mode: stay in voice even when the channel empties
#[poise::command(slash_command, guild_only, rename = "24-7", category = "Settings")]
pub async fn stay(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    if !require_dj(ctx).await? {
        return Ok(());
    }

    let enabled = {
        let queue = ctx.data().queues.get(guild_id);
        let mut gq = queue.lock().await;
        gq.settings.stay_connected = !gq.settings.stay_connected;
        ctx.data().queues.save_settings(guild_id, &gq);
        gq.settings.stay_connected
    };
    let state = if enabled { "on" } else { "off" };
    ctx.send(text_reply(format!("🕐 24/7 mode: **{}**.", state))).await?;
    Ok(())
}

/// Set the bot language for this server
#[poise::command(slash_command, guild_only, category = "Settings")]
pub async fn language(
    ctx: Context<'_>,
    #[description = "Language code (e.g. en, tr, de)"]
    #[autocomplete = "autocomplete_locale"]
    lang: String,
) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    let locales = &ctx.data().locales;
    if !locales.has(&lang) {
        let available = locales.available();
        let listed = if available.is_empty() {
            "en".to_string()
        } else {
            available.join(", ")
        };
        return ephemeral(
            ctx,
            format!("Language **{}** is not available. Available: {}", lang, listed),
        )
        .await;
    }

    {
        let queue = ctx.data().queues.get(guild_id);
        let mut gq = queue.lock().await;
        gq.settings.locale = lang.clone();
        ctx.data().queues.save_settings(guild_id, &gq);
    }
    ctx.send(text_reply(format!("Language set to **{}**.", lang))).await?;
    Ok(())
}
