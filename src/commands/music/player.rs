use poise::CreateReply;
use poise::serenity_prelude as serenity;
use serenity::{CreateEmbed, CreateEmbedFooter, CreateMessage};
use tracing::debug;

use super::*;
use crate::commands::music::audio_sources::lyrics::search_terms;
use crate::commands::music::utils::embedded_messages::{COLOR_BLURPLE, COLOR_SUCCESS, text_reply};
use crate::commands::music::utils::guild_settings::LoopMode;
use crate::commands::music::utils::music_manager::MUSIC_MANAGER;
use crate::commands::music::utils::permissions::require_dj;
use crate::commands::music::utils::{event_handlers, format_duration, parse_time, progress_bar};
use crate::{CommandResult, Context};

pub const INVALID_SEEK: &str = "Invalid time format. Use `90`, `1:30`, `+30`, or `-15`.";

/// Resolve `/seek` input against the current position: absolute (`90`, `1:30`) or relative (`+30`, `-15`).
pub fn seek_target(input: &str, elapsed: u64) -> Option<u64> {
    let input = input.trim();
    if let Some(offset) = input.strip_prefix('+') {
        return parse_time(offset).and_then(|secs| elapsed.checked_add(secs));
    }
    if let Some(offset) = input.strip_prefix('-') {
        return parse_time(offset).map(|secs| elapsed.saturating_sub(secs));
    }
    parse_time(input)
}

/// Whether `target` lies beyond a known `duration`. Unknown durations (`<= 0`) never are.
pub fn past_end(target: u64, duration: i64) -> bool {
    duration > 0 && i64::try_from(target).map_or(true, |target| target > duration)
}

/// Pause playback
#[poise::command(slash_command, guild_only, category = "Playback")]
pub async fn pause(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    if !require_dj(ctx).await? {
        return Ok(());
    }
    if !is_playing(guild_id).await {
        return nothing_playing(ctx).await;
    }
    let data = ctx.data();
    event_handlers::pause(data, guild_id).await?;
    event_handlers::refresh_player(ctx.serenity_context(), data, guild_id).await;

    let message = data.t(guild_id, "paused", &[]).await;
    ctx.send(text_reply(format!("⏸️ {}", message))).await?;
    Ok(())
}

/// Resume playback
#[poise::command(slash_command, guild_only, category = "Playback")]
pub async fn resume(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    if !require_dj(ctx).await? {
        return Ok(());
    }
    let paused = {
        let manager = MUSIC_MANAGER.lock().await;
        manager.is_active(guild_id) && manager.is_paused(guild_id)
    };
    if !paused {
        return ephemeral(ctx, "Nothing is paused.").await;
    }
    let data = ctx.data();
    event_handlers::resume(ctx.serenity_context(), data, guild_id).await?;
    event_handlers::refresh_player(ctx.serenity_context(), data, guild_id).await;

    let message = data.t(guild_id, "resumed", &[]).await;
    ctx.send(text_reply(format!("▶️ {}", message))).await?;
    Ok(())
}

/// Jump to a position in the current track
#[poise::command(slash_command, guild_only, category = "Playback")]
pub async fn seek(
    ctx: Context<'_>,
    #[description = "Position like 90, 1:30, +30 or -15"] position: String,
) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    if !require_dj(ctx).await? {
        return Ok(());
    }
    if !is_playing(guild_id).await {
        return nothing_playing(ctx).await;
    }

    let (elapsed, duration, is_live) = {
        let queue = ctx.data().queues.get(guild_id);
        let gq = queue.lock().await;
        let Some(track) = gq.current.as_ref() else {
            return nothing_playing(ctx).await;
        };
        (gq.elapsed_secs(), track.duration_secs(), track.is_live)
    };
    if is_live {
        return ephemeral(ctx, "Cannot seek in a live stream.").await;
    }
    let Some(target) = seek_target(&position, elapsed) else {
        return ephemeral(ctx, INVALID_SEEK).await;
    };
    if past_end(target, duration) {
        return ephemeral(ctx, "Seek position is past the end of the track.").await;
    }

    ctx.defer().await?;
    event_handlers::restart_playback(ctx.serenity_context(), ctx.data(), guild_id, target).await?;
    ctx.send(text_reply(format!("⏩ Seeked to **{}**.", format_duration(target as i64))))
        .await?;
    Ok(())
}

/// Show the currently playing track
#[poise::command(slash_command, guild_only, category = "Playback")]
pub async fn nowplaying(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    let paused = MUSIC_MANAGER.lock().await.is_paused(guild_id);

    let embed = {
        let queue = ctx.data().queues.get(guild_id);
        let gq = queue.lock().await;
        let Some(track) = gq.current.as_ref() else {
            return nothing_playing(ctx).await;
        };
        let settings = &gq.settings;

        let loop_emoji = if settings.loop_mode == LoopMode::Single { "🔂" } else { "🔁" };
        let mut embed = CreateEmbed::new()
            .title("Now Playing")
            .description(format!(
                "**{}**\n{}",
                track.title,
                progress_bar(gq.elapsed_secs() as i64, track.duration_secs(), 20)
            ))
            .color(COLOR_BLURPLE)
            .field(
                "👤 Requested by",
                track.requested_by.clone().unwrap_or_else(|| "Unknown".to_string()),
                true,
            )
            .field(format!("{} Loop", loop_emoji), settings.loop_mode.label(), true)
            .field("🔊 Volume", format!("{}%", (settings.volume * 100.0).round() as u32), true)
            .footer(CreateEmbedFooter::new(if paused { "⏸️ Paused" } else { "▶️ Playing" }));

        if settings.autoplay {
            embed = embed.field("✨ Autoplay", "Enabled", true);
        }
        if let Some(filter) = settings.filter_name {
            embed = embed.field("🎛️ Filter", filter.name(), true);
        }
        if let Some(next) = gq.queue.front() {
            embed = embed.field("⏭️ Up next", next.title.chars().take(100).collect::<String>(), false);
        }
        if let Some(thumbnail) = &track.thumbnail {
            embed = embed.thumbnail(thumbnail);
        }
        if track.has_web_url() {
            embed = embed.url(&track.url);
        }
        embed
    };

    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Show an interactive music player with controls
#[poise::command(slash_command, guild_only, category = "Playback")]
pub async fn player(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    let data = ctx.data();
    {
        let queue = data.queues.get(guild_id);
        let mut gq = queue.lock().await;
        if gq.current.is_none() {
            drop(gq);
            return nothing_playing(ctx).await;
        }
        gq.text_channel_id = Some(ctx.channel_id());
    }

    ctx.defer_ephemeral().await?;
    event_handlers::send_player(ctx.serenity_context(), data, guild_id).await;
    ephemeral(ctx, "🎛️ Player opened.").await
}

/// Look up lyrics for the current track or a search query
#[poise::command(slash_command, guild_only, category = "Playback")]
pub async fn lyrics(
    ctx: Context<'_>,
    #[description = "Track to search for (defaults to the current track)"] query: Option<String>,
) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    let (artist, title) = match &query {
        Some(query) => (String::new(), query.trim().to_string()),
        None => {
            let queue = ctx.data().queues.get(guild_id);
            let gq = queue.lock().await;
            let Some(track) = gq.current.as_ref() else {
                drop(gq);
                return ephemeral(
                    ctx,
                    "❌ Nothing is playing. Provide a track name or URL to search for lyrics.",
                )
                .await;
            };
            search_terms(&track.title, track.artist.as_deref())
        }
    };

    ctx.defer().await?;
    let hit = match ctx.data().lyrics.fetch(&artist, &title).await {
        Ok(hit) => hit,
        Err(e) => {
            debug!("Lyrics lookup for '{}' failed: {}", title, e);
            ctx.send(text_reply("Could not fetch lyrics.")).await?;
            return Ok(());
        }
    };
    let Some(lyrics) = hit.filter(|lyrics| lyrics.text().is_some()) else {
        ctx.send(text_reply(format!("No lyrics found for **{}**.", title))).await?;
        return Ok(());
    };

    let pages = lyrics.pages(&title);
    let total = pages.len();
    for (index, page) in pages.into_iter().enumerate() {
        let heading = if total > 1 {
            format!("Lyrics ({}/{})", index + 1, total)
        } else {
            "Lyrics".to_string()
        };
        let embed = CreateEmbed::new().title(heading).description(page).color(COLOR_BLURPLE);
        ctx.send(CreateReply::default().embed(embed)).await?;
    }
    Ok(())
}

/// DM yourself the current track's info
#[poise::command(slash_command, guild_only, category = "Playback")]
pub async fn grab(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    let embed = {
        let queue = ctx.data().queues.get(guild_id);
        let gq = queue.lock().await;
        let Some(track) = gq.current.as_ref() else {
            drop(gq);
            return nothing_playing(ctx).await;
        };

        let mut embed = CreateEmbed::new()
            .title("📌 Saved Track")
            .description(format!("**{}**", track.title))
            .color(COLOR_SUCCESS);
        if track.has_web_url() {
            embed = embed.field("🔗 URL", &track.url, false);
        }
        embed = embed
            .field("⏱️ Duration", format_duration(track.duration_secs()), true)
            .field(
                "👤 Requested by",
                track.requested_by.clone().unwrap_or_else(|| "Unknown".to_string()),
                true,
            );
        if let Some(thumbnail) = &track.thumbnail {
            embed = embed.thumbnail(thumbnail);
        }
        embed
    };

    match ctx
        .author()
        .direct_message(ctx.serenity_context(), CreateMessage::new().embed(embed))
        .await
    {
        Ok(_) => ephemeral(ctx, "📬 Track info sent to your DMs!").await,
        Err(e) => {
            debug!("DM to {} failed: {}", ctx.author().name, e);
            ephemeral(
                ctx,
                "❌ I can't DM you. Please enable DMs from server members in your Privacy Settings.",
            )
            .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("90", 10, Some(90) ; "absolute seconds")]
    #[test_case("1:30", 10, Some(90) ; "absolute minutes")]
    #[test_case("+30", 100, Some(130) ; "forward")]
    #[test_case("-15", 100, Some(85) ; "backward")]
    #[test_case("-500", 100, Some(0) ; "backward clamps at zero")]
    #[test_case("+1:00", 5, Some(65) ; "relative minutes")]
    #[test_case("abc", 5, None ; "garbage")]
    #[test_case("+", 5, None ; "bare sign")]
    #[test_case("+18446744073709551615", 1, None ; "forward overflow")]
    #[test_case("307445734561825861:0", 0, None ; "absolute overflow")]
    fn test_seek_target(input: &str, elapsed: u64, expected: Option<u64>) {
        assert_eq!(seek_target(input, elapsed), expected);
    }

    #[test_case(200, 213, false ; "inside")]
    #[test_case(214, 213, true ; "after end")]
    #[test_case(5000, 0, false ; "unknown duration")]
    #[test_case(u64::MAX, 213, true ; "beyond i64")]
    fn test_past_end(target: u64, duration: i64, expected: bool) {
        assert_eq!(past_end(target, duration), expected);
    }
}
