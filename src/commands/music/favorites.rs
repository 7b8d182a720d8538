use poise::CreateReply;
use poise::serenity_prelude as serenity;
use serenity::{CreateEmbed, GuildId};

use super::*;
use crate::commands::music::utils::embedded_messages::text_reply;
use crate::commands::music::utils::enqueue::{self, ensure_voice};
use crate::commands::music::utils::{format_duration, plural};
use crate::utils::database::{Favorite, MAX_FAVORITES};
use crate::{CommandResult, Context};

const COLOR_FAVORITES: u32 = 0x9b59b6;

/// `` `1.` Title [3:45] `` with a tag naming the server when it is not this one.
pub fn favorite_line(index: usize, favorite: &Favorite, other_server: Option<&str>) -> String {
    let tag = other_server
        .map(|name| format!(" *[{}]*", name))
        .unwrap_or_default();
    format!(
        "`{}.` {} [{}]{}",
        index + 1,
        favorite.title,
        format_duration(favorite.duration),
        tag
    )
}

/// Save the current track to your favorites
#[poise::command(slash_command, guild_only, category = "Favorites")]
pub async fn fav(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    let current = ctx.data().queues.get(guild_id).lock().await.current.clone();
    let Some(track) = current else {
        return nothing_playing(ctx).await;
    };

    let saved = ctx
        .data()
        .db()
        .add_favorite(ctx.author().id.get(), &track, guild_id.get())?;
    if !saved {
        return ephemeral(
            ctx,
            format!(
                "Already in your favorites or favorites list is full ({} max).",
                MAX_FAVORITES
            ),
        )
        .await;
    }
    ctx.send(text_reply(format!("Saved **{}** to your favorites.", track.title)))
        .await?;
    Ok(())
}

/// List your favorite tracks
#[poise::command(slash_command, guild_only, category = "Favorites")]
pub async fn favs(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    let favorites = ctx.data().db().favorites(ctx.author().id.get())?;
    if favorites.is_empty() {
        return ephemeral(
            ctx,
            "You have no favorites yet. Use `/fav` to save the current track.",
        )
        .await;
    }

    let cache = &ctx.serenity_context().cache;
    let lines: Vec<String> = favorites
        .iter()
        .enumerate()
        .map(|(i, favorite)| {
            let other = (favorite.guild_id != 0 && favorite.guild_id != guild_id.get()).then(|| {
                cache
                    .guild(GuildId::new(favorite.guild_id))
                    .map(|guild| guild.name.clone())
                    .unwrap_or_else(|| "Other Server".to_string())
            });
            favorite_line(i, favorite, other.as_deref())
        })
        .collect();

    let name = display_name(ctx).await;
    let embed = CreateEmbed::new()
        .title(format!("❤️ Favorites: {}", name))
        .description(lines.join("\n"))
        .color(COLOR_FAVORITES);
    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Remove a track from your favorites
#[poise::command(slash_command, guild_only, category = "Favorites")]
pub async fn unfav(
    ctx: Context<'_>,
    #[description = "Position in your favorites list (1-indexed)"] position: usize,
) -> CommandResult {
    let removed = match position.checked_sub(1) {
        Some(index) => ctx.data().db().remove_favorite(ctx.author().id.get(), index)?,
        None => None,
    };
    match removed {
        Some(favorite) => {
            ctx.send(text_reply(format!(
                "💔 Removed **{}** from your favorites.",
                favorite.title
            )))
            .await?;
            Ok(())
        }
        None => ephemeral(ctx, "❌ Invalid position.").await,
    }
}

/// Queue your favorite tracks saved in this server
#[poise::command(slash_command, guild_only, category = "Favorites")]
pub async fn playfavs(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    let user_id = ctx.author().id.get();
    let db = ctx.data().db();
    let favorites = db.favorites_for_guild(user_id, guild_id.get())?;
    if favorites.is_empty() {
        let message = if db.favorites(user_id)?.is_empty() {
            "You have no favorites. Use `/fav` to save tracks."
        } else {
            "You have no favorites saved in this server. Use `/fav` while music is playing, or check `/favs` to see all your favorites."
        };
        return ephemeral(ctx, message).await;
    }

    ctx.defer().await?;
    ensure_voice(ctx.serenity_context(), guild_id, ctx.author().id).await?;
    let requester = requester(ctx).await;
    let tracks = favorites
        .iter()
        .map(|favorite| favorite.to_track(&requester.name, user_id))
        .collect();
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
        "Queued **{}** favorite{}.{}",
        summary.queued,
        plural(summary.queued),
        summary.suffix()
    )))
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn favorite() -> Favorite {
        Favorite {
            title: "Song".to_string(),
            url: "https://www.youtube.com/watch?v=abc".to_string(),
            duration: 61,
            thumbnail: None,
            guild_id: 1,
        }
    }

    #[test]
    fn test_favorite_line_same_server() {
        assert_eq!(favorite_line(0, &favorite(), None), "`1.` Song [1:01]");
    }

    #[test]
    fn test_favorite_line_other_server() {
        assert_eq!(
            favorite_line(2, &favorite(), Some("Lounge")),
            "`3.` Song [1:01] *[Lounge]*"
        );
    }
}
