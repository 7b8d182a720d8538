//! Play history, ratings and listening stats.

use poise::CreateReply;
use poise::serenity_prelude as serenity;
use serenity::{CreateEmbed, UserId};
use thousands::Separable;

use super::*;
use crate::commands::music::utils::button_controls::rate_buttons;
use crate::commands::music::utils::plural;
use crate::commands::music::utils::views::{PendingView, RATE_TTL};
use crate::utils::database::RatedTrack;
use crate::{CommandResult, Context};

const COLOR_GOLD: u32 = 0xf1c40f;
const COLOR_BLUE: u32 = 0x3498db;
const COLOR_PURPLE: u32 = 0x9b59b6;
const TOP_LIMIT: usize = 10;
const STATS_TOP: usize = 5;

/// `` `1.` Title: 12 plays `` for the first [`STATS_TOP`] entries.
pub fn play_count_lines(tracks: &[(String, u64)]) -> Vec<String> {
    tracks
        .iter()
        .take(STATS_TOP)
        .enumerate()
        .map(|(i, (title, count))| {
            format!("`{}.` {}: {} plays", i + 1, title, count.separate_with_commas())
        })
        .collect()
}

pub fn rated_line(index: usize, track: &RatedTrack) -> String {
    format!(
        "`{}.` **{}** 👍 {} 👎 {} (net: {:+})",
        index + 1,
        track.title,
        track.up,
        track.down,
        track.score()
    )
}

/// Seconds as hours with one decimal.
pub fn hours(seconds: i64) -> String {
    format!("{:.1}", seconds as f64 / 3600.0)
}

fn guild_name(ctx: Context<'_>) -> String {
    ctx.guild().map(|guild| guild.name.clone()).unwrap_or_default()
}

/// Show the most played tracks in this server
#[poise::command(slash_command, guild_only, category = "Stats")]
pub async fn top(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    let tracks = ctx.data().db().top_tracks(guild_id.get(), TOP_LIMIT)?;
    if tracks.is_empty() {
        return ephemeral(ctx, "No play history yet.").await;
    }

    let lines: Vec<String> = tracks
        .iter()
        .enumerate()
        .map(|(i, (title, _, count))| {
            format!(
                "`{}.` **{}**: {} play{}",
                i + 1,
                title,
                count.separate_with_commas(),
                plural(*count as usize)
            )
        })
        .collect();
    let embed = CreateEmbed::new()
        .title(format!("🏆 Most Played: {}", guild_name(ctx)))
        .description(lines.join("\n"))
        .color(COLOR_GOLD);
    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Show the top-rated tracks in this server
#[poise::command(slash_command, guild_only, category = "Stats")]
pub async fn toprated(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    let tracks = ctx.data().db().top_rated(guild_id.get(), TOP_LIMIT)?;
    if tracks.is_empty() {
        return ephemeral(ctx, "No ratings yet.").await;
    }

    let lines: Vec<String> = tracks
        .iter()
        .enumerate()
        .map(|(i, track)| rated_line(i, track))
        .collect();
    let embed = CreateEmbed::new()
        .title(format!("⭐ Top Rated: {}", guild_name(ctx)))
        .description(lines.join("\n"))
        .color(COLOR_GOLD);
    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Rate the current track (thumbs up/down)
#[poise::command(slash_command, guild_only, category = "Stats")]
pub async fn rate(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    let data = ctx.data();
    let current = data.queues.get(guild_id).lock().await.current.clone();
    let Some(track) = current else {
        return nothing_playing(ctx).await;
    };

    let (up, down) = data.db().rating(guild_id.get(), &track.url)?;
    let embed = CreateEmbed::new()
        .title("Rate this track")
        .description(format!("**{}**", track.title))
        .color(COLOR_GOLD);
    let handle = ctx
        .send(
            CreateReply::default()
                .embed(embed)
                .components(rate_buttons(up, down)),
        )
        .await?;
    let message = handle.message().await?;
    data.views.insert(
        message.id,
        PendingView::Rate {
            guild_id,
            url: track.url,
            title: track.title,
        },
        RATE_TTL,
    );
    Ok(())
}

/// Show server-wide listening stats: top tracks, listeners and hours played
#[poise::command(slash_command, guild_only, category = "Stats")]
pub async fn stats(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    let stats = ctx.data().db().server_stats(guild_id.get())?;
    if stats.total_plays == 0 {
        return ephemeral(ctx, "No play history yet.").await;
    }

    let mut lines = vec![
        format!("**Total plays:** {}", stats.total_plays.separate_with_commas()),
        format!("**Unique tracks:** {}", stats.unique_tracks.separate_with_commas()),
        format!("**Total listening time:** {} hours", hours(stats.total_time_seconds)),
    ];
    if !stats.top_tracks.is_empty() {
        lines.push("\n**Top Tracks:**".to_string());
        lines.extend(play_count_lines(&stats.top_tracks));
    }
    if !stats.top_users.is_empty() {
        lines.push("\n**Top Listeners:**".to_string());
        let cache = &ctx.serenity_context().cache;
        for (i, (user_id, count)) in stats.top_users.iter().take(STATS_TOP).enumerate() {
            let name = cache
                .member(guild_id, UserId::new(*user_id))
                .map(|member| member.display_name().to_string())
                .unwrap_or_else(|| format!("User {}", user_id));
            lines.push(format!("`{}.` {}: {} plays", i + 1, name, count.separate_with_commas()));
        }
    }

    let embed = CreateEmbed::new()
        .title(format!("📊 Server Stats: {}", guild_name(ctx)))
        .description(lines.join("\n"))
        .color(COLOR_BLUE);
    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Show your personal listening history, top tracks and time spent
#[poise::command(slash_command, guild_only, category = "Stats")]
pub async fn mystats(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    let stats = ctx
        .data()
        .db()
        .user_stats(guild_id.get(), ctx.author().id.get())?;
    if stats.total_plays == 0 {
        return ephemeral(ctx, "No listening history for you yet.").await;
    }

    let mut lines = vec![
        format!("**Total plays:** {}", stats.total_plays.separate_with_commas()),
        format!("**Total listening time:** {} hours", hours(stats.total_time_seconds)),
    ];
    if !stats.top_tracks.is_empty() {
        lines.push("\n**Your Top Tracks:**".to_string());
        lines.extend(play_count_lines(&stats.top_tracks));
    }

    let embed = CreateEmbed::new()
        .title(format!("📊 Your Stats: {}", display_name(ctx).await))
        .description(lines.join("\n"))
        .color(COLOR_PURPLE);
    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(0, "0.0")]
    #[test_case(5400, "1.5")]
    #[test_case(36_000, "10.0")]
    fn test_hours(seconds: i64, expected: &str) {
        assert_eq!(hours(seconds), expected);
    }

    #[test]
    fn test_play_count_lines_keeps_top_five() {
        let tracks: Vec<(String, u64)> = (0..8).map(|i| (format!("Song {}", i), 1200 - i)).collect();
        let lines = play_count_lines(&tracks);
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "`1.` Song 0: 1,200 plays");
    }

    #[test]
    fn test_rated_line_shows_signed_net() {
        let track = RatedTrack {
            title: "Tune".to_string(),
            url: String::new(),
            up: 1,
            down: 3,
        };
        assert_eq!(rated_line(0, &track), "`1.` **Tune** 👍 1 👎 3 (net: -2)");
    }
}
