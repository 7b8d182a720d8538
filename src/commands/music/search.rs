use poise::CreateReply;
use poise::serenity_prelude as serenity;
use serenity::CreateEmbed;
use tracing::debug;

use super::*;
use crate::commands::music::audio_sources::track_metadata::TrackMetadata;
use crate::commands::music::audio_sources::youtube::SEARCH_LIMIT;
use crate::commands::music::utils::button_controls::search_buttons;
use crate::commands::music::utils::component_handlers::expire_view;
use crate::commands::music::utils::embedded_messages::text_reply;
use crate::commands::music::utils::enqueue::SPOTIFY_UNAVAILABLE;
use crate::commands::music::utils::format_duration;
use crate::commands::music::utils::guild_settings::SearchMode;
use crate::commands::music::utils::views::{PendingView, SEARCH_TTL};
use crate::{CommandResult, Context};

const YOUTUBE_RED: u32 = 0xff0000;
const SPOTIFY_GREEN: u32 = 0x1ed760;

/// `**1.** Title [3:45]` lines for a result list.
pub fn result_lines(results: &[TrackMetadata]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, track)| {
            format!(
                "**{}.** {} [{}]",
                i + 1,
                track.title,
                format_duration(track.duration_secs())
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Post a pick list; the buttons stay live for `SEARCH_TTL`.
pub(crate) async fn post_results(
    ctx: Context<'_>,
    embed: CreateEmbed,
    results: Vec<TrackMetadata>,
) -> CommandResult {
    let handle = ctx
        .send(
            CreateReply::default()
                .embed(embed)
                .components(search_buttons(&results, false)),
        )
        .await?;
    let message = handle.message().await?;

    let data = ctx.data();
    let disabled = search_buttons(&results, true);
    data.views
        .insert(message.id, PendingView::Search { results }, SEARCH_TTL);
    expire_view(
        ctx.serenity_context().http.clone(),
        data.views.clone(),
        message.channel_id,
        message.id,
        SEARCH_TTL,
        None,
        disabled,
    );
    Ok(())
}

async fn youtube_results(ctx: Context<'_>, query: &str) -> CommandResult {
    let results = match ctx.data().youtube.search(query, SEARCH_LIMIT).await {
        Ok(results) => results,
        Err(e) => {
            debug!("YouTube search for '{}' failed: {}", query, e);
            Vec::new()
        }
    };
    if results.is_empty() {
        ctx.send(text_reply("No results found.")).await?;
        return Ok(());
    }
    let embed = CreateEmbed::new()
        .title(format!("🔴 YouTube: {}", query))
        .description(result_lines(&results))
        .color(YOUTUBE_RED);
    post_results(ctx, embed, results).await
}

async fn spotify_results(ctx: Context<'_>, query: &str) -> CommandResult {
    let spotify = &ctx.data().spotify;
    if !spotify.available() {
        return ephemeral(ctx, SPOTIFY_UNAVAILABLE).await;
    }
    let results = match spotify.search(query, SEARCH_LIMIT).await {
        Ok(results) => results,
        Err(e) => {
            debug!("Spotify search for '{}' failed: {}", query, e);
            Vec::new()
        }
    };
    if results.is_empty() {
        ctx.send(text_reply("No results found.")).await?;
        return Ok(());
    }
    let embed = CreateEmbed::new()
        .title(format!("🟢 Spotify: {}", query))
        .description(result_lines(&results))
        .color(SPOTIFY_GREEN);
    post_results(ctx, embed, results).await
}

/// Search and pick from results (uses the server default)
#[poise::command(slash_command, guild_only, category = "Search")]
pub async fn search(
    ctx: Context<'_>,
    #[description = "Search keywords"] query: String,
) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    ctx.defer().await?;
    let mode = ctx.data().queues.get(guild_id).lock().await.settings.search_mode;
    match mode {
        SearchMode::Spotify => spotify_results(ctx, &query).await,
        SearchMode::Youtube => youtube_results(ctx, &query).await,
    }
}

/// Search YouTube and pick from results
#[poise::command(slash_command, guild_only, rename = "youtube-search", category = "Search")]
pub async fn youtube_search(
    ctx: Context<'_>,
    #[description = "Search keywords"] query: String,
) -> CommandResult {
    ctx.defer().await?;
    youtube_results(ctx, &query).await
}

/// Search Spotify and pick from results
#[poise::command(slash_command, guild_only, rename = "spotify-search", category = "Search")]
pub async fn spotify_search(
    ctx: Context<'_>,
    #[description = "Search keywords"] query: String,
) -> CommandResult {
    ctx.defer().await?;
    spotify_results(ctx, &query).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn test_result_lines() {
        let results = vec![
            TrackMetadata {
                title: "First".to_string(),
                duration: Some(Duration::from_secs(225)),
                ..Default::default()
            },
            TrackMetadata {
                title: "Radio".to_string(),
                ..Default::default()
            },
        ];
        assert_eq!(result_lines(&results), "**1.** First [3:45]\n**2.** Radio [LIVE]");
    }
}
