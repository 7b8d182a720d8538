//! `/playlist` and its subcommands: saved, shareable, collaborative queues per server.

use futures::Stream;
use poise::CreateReply;
use poise::serenity_prelude as serenity;
use serenity::{CreateEmbed, GuildId, UserId};
use tracing::{debug, info};

use super::*;
use crate::commands::music::utils::embedded_messages::{COLOR_BLURPLE, text_reply};
use crate::commands::music::utils::enqueue::{self, ensure_voice};
use crate::commands::music::utils::permissions::{author_is_admin, author_is_dj};
use crate::commands::music::utils::{MusicError, plural};
use crate::utils::database::MAX_PLAYLIST_NAME;
use crate::{CommandResult, Context};

/// Discord shows at most this many autocomplete choices.
const AUTOCOMPLETE_LIMIT: usize = 25;

/// Names containing `partial`, ignoring case.
pub fn matching_names(names: Vec<String>, partial: &str) -> Vec<String> {
    let partial = partial.to_lowercase();
    names
        .into_iter()
        .filter(|name| name.to_lowercase().contains(&partial))
        .take(AUTOCOMPLETE_LIMIT)
        .collect()
}

async fn autocomplete_playlist<'a>(ctx: Context<'_>, partial: &'a str) -> impl Stream<Item = String> + 'a {
    let names = match ctx.guild_id() {
        Some(guild_id) => ctx.data().db().playlist_names(guild_id.get()).unwrap_or_else(|e| {
            debug!("Playlist autocomplete failed: {}", e);
            Vec::new()
        }),
        None => Vec::new(),
    };
    futures::stream::iter(matching_names(names, partial))
}

fn not_found(name: &str) -> String {
    format!("Playlist **{}** not found.", name)
}

/// The creator of `name`, or `None` after telling the user it does not exist.
async fn creator_of(ctx: Context<'_>, guild_id: GuildId, name: &str) -> Result<Option<UserId>, crate::Error> {
    match ctx.data().db().playlist_creator(guild_id.get(), name)? {
        Some(creator) => Ok(Some(UserId::new(creator))),
        None => {
            ephemeral(ctx, not_found(name)).await?;
            Ok(None)
        }
    }
}

/// May edit the tracks of `name`: its creator or a collaborator.
async fn can_edit(ctx: Context<'_>, guild_id: GuildId, name: &str, creator: UserId) -> Result<bool, crate::Error> {
    let author = ctx.author().id;
    Ok(author == creator
        || ctx
            .data()
            .db()
            .is_playlist_collaborator(guild_id.get(), name, author.get())?)
}

/// Save and load playlists
#[poise::command(
    slash_command,
    guild_only,
    subcommands("save", "load", "list", "delete", "adduser", "removeuser", "addtrack", "removetrack"),
    subcommand_required,
    category = "Playlists"
)]
pub async fn playlist(_: Context<'_>) -> CommandResult {
    Ok(())
}

/// Save the current queue as a named playlist
#[poise::command(slash_command, guild_only)]
async fn save(
    ctx: Context<'_>,
    #[description = "Playlist name (max 64 characters)"] name: String,
) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    if name.chars().count() > MAX_PLAYLIST_NAME {
        return ephemeral(ctx, format!("Name must be {} characters or less.", MAX_PLAYLIST_NAME)).await;
    }
    let tracks: Vec<_> = {
        let queue = ctx.data().queues.get(guild_id);
        let gq = queue.lock().await;
        gq.current.iter().chain(gq.queue.iter()).cloned().collect()
    };
    if tracks.is_empty() {
        return ephemeral(ctx, "Nothing to save. The queue is empty.").await;
    }

    match ctx
        .data()
        .db()
        .save_playlist(guild_id.get(), &name, &tracks, ctx.author().id.get())
    {
        Ok(()) => {}
        Err(MusicError::InvalidInput(message)) => return ephemeral(ctx, message).await,
        Err(e) => return Err(e.into()),
    }
    info!("Saved playlist '{}' in guild {} ({} tracks)", name, guild_id, tracks.len());

    ctx.send(text_reply(format!(
        "Saved playlist **{}** with **{}** track{}.",
        name.trim(),
        tracks.len(),
        plural(tracks.len())
    )))
    .await?;
    Ok(())
}

/// Queue tracks from a saved playlist
#[poise::command(slash_command, guild_only)]
async fn load(
    ctx: Context<'_>,
    #[description = "Playlist name"]
    #[autocomplete = "autocomplete_playlist"]
    name: String,
) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    let Some(playlist) = ctx.data().db().load_playlist(guild_id.get(), &name)? else {
        return ephemeral(ctx, not_found(&name)).await;
    };

    ctx.defer().await?;
    ensure_voice(ctx.serenity_context(), guild_id, ctx.author().id).await?;
    let requester = requester(ctx).await;
    let summary = enqueue::enqueue_many(
        ctx.serenity_context(),
        ctx.data(),
        guild_id,
        ctx.channel_id(),
        &requester,
        playlist.tracks,
    )
    .await?;

    ctx.send(text_reply(format!(
        "Queued **{}** track{} from **{}**.{}",
        summary.queued,
        plural(summary.queued),
        playlist.name,
        summary.suffix()
    )))
    .await?;
    Ok(())
}

/// List all saved playlists
#[poise::command(slash_command, guild_only)]
async fn list(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    let playlists = ctx.data().db().playlists(guild_id.get())?;
    if playlists.is_empty() {
        return ephemeral(ctx, "No saved playlists.").await;
    }

    let cache = &ctx.serenity_context().cache;
    let lines: Vec<String> = playlists
        .iter()
        .map(|playlist| {
            let creator = cache
                .member(guild_id, UserId::new(playlist.created_by))
                .map(|member| member.display_name().to_string())
                .unwrap_or_else(|| format!("<@{}>", playlist.created_by));
            let count = playlist.tracks.len();
            format!(
                "**{}** ({} track{}, by {})",
                playlist.name,
                count,
                plural(count),
                creator
            )
        })
        .collect();

    let guild_name = ctx.guild().map(|g| g.name.clone()).unwrap_or_default();
    let embed = CreateEmbed::new()
        .title(format!("🎵 Playlists: {}", guild_name))
        .description(lines.join("\n"))
        .color(COLOR_BLURPLE);
    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Delete a saved playlist
#[poise::command(slash_command, guild_only)]
async fn delete(
    ctx: Context<'_>,
    #[description = "Playlist name"]
    #[autocomplete = "autocomplete_playlist"]
    name: String,
) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    let Some(creator) = creator_of(ctx, guild_id, &name).await? else {
        return Ok(());
    };
    let allowed = ctx.author().id == creator || author_is_admin(ctx).await || author_is_dj(ctx).await;
    if !allowed {
        return ephemeral(
            ctx,
            "Only the playlist creator, a DJ, or an admin can delete playlists.",
        )
        .await;
    }

    ctx.data().db().delete_playlist(guild_id.get(), &name)?;
    info!("Deleted playlist '{}' in guild {}", name, guild_id);
    ctx.send(text_reply(format!("Deleted playlist **{}**.", name))).await?;
    Ok(())
}

/// Add a collaborator to a playlist
#[poise::command(slash_command, guild_only)]
async fn adduser(
    ctx: Context<'_>,
    #[description = "Playlist name"]
    #[autocomplete = "autocomplete_playlist"]
    name: String,
    #[description = "User to add as collaborator"] user: serenity::Member,
) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    let Some(creator) = creator_of(ctx, guild_id, &name).await? else {
        return Ok(());
    };
    if ctx.author().id != creator && !author_is_dj(ctx).await {
        return ephemeral(ctx, "Only the playlist creator or a DJ can add collaborators.").await;
    }

    if ctx
        .data()
        .db()
        .add_collaborator(guild_id.get(), &name, user.user.id.get())?
    {
        ctx.send(text_reply(format!(
            "Added **{}** as collaborator on **{}**.",
            user.display_name(),
            name
        )))
        .await?;
        Ok(())
    } else {
        ephemeral(ctx, "❌ User is already a collaborator.").await
    }
}

/// Remove a collaborator from a playlist
#[poise::command(slash_command, guild_only)]
async fn removeuser(
    ctx: Context<'_>,
    #[description = "Playlist name"]
    #[autocomplete = "autocomplete_playlist"]
    name: String,
    #[description = "User to remove"] user: serenity::Member,
) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    let Some(creator) = creator_of(ctx, guild_id, &name).await? else {
        return Ok(());
    };
    if ctx.author().id != creator && !author_is_dj(ctx).await {
        return ephemeral(ctx, "Only the playlist creator or a DJ can remove collaborators.").await;
    }

    if ctx
        .data()
        .db()
        .remove_collaborator(guild_id.get(), &name, user.user.id.get())?
    {
        ctx.send(text_reply(format!(
            "Removed **{}** from **{}**.",
            user.display_name(),
            name
        )))
        .await?;
        Ok(())
    } else {
        ephemeral(ctx, "User is not a collaborator.").await
    }
}

/// Add the current track to a playlist
#[poise::command(slash_command, guild_only)]
async fn addtrack(
    ctx: Context<'_>,
    #[description = "Playlist name"]
    #[autocomplete = "autocomplete_playlist"]
    name: String,
) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    let current = ctx.data().queues.get(guild_id).lock().await.current.clone();
    let Some(track) = current else {
        return nothing_playing(ctx).await;
    };
    let Some(creator) = creator_of(ctx, guild_id, &name).await? else {
        return Ok(());
    };
    if !can_edit(ctx, guild_id, &name, creator).await? {
        return ephemeral(ctx, "You must be the creator or a collaborator.").await;
    }

    match ctx.data().db().add_playlist_track(guild_id.get(), &name, &track) {
        Ok(()) => {
            ctx.send(text_reply(format!("Added **{}** to **{}**.", track.title, name)))
                .await?;
            Ok(())
        }
        Err(MusicError::InvalidInput(message)) => ephemeral(ctx, message).await,
        Err(e) => Err(e.into()),
    }
}

/// Remove a track from a playlist by position
#[poise::command(slash_command, guild_only)]
async fn removetrack(
    ctx: Context<'_>,
    #[description = "Playlist name"]
    #[autocomplete = "autocomplete_playlist"]
    name: String,
    #[description = "Track position (1-indexed)"] position: usize,
) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    let Some(creator) = creator_of(ctx, guild_id, &name).await? else {
        return Ok(());
    };
    if !can_edit(ctx, guild_id, &name, creator).await? {
        return ephemeral(ctx, "You must be the creator or a collaborator.").await;
    }

    let removed = match position.checked_sub(1) {
        Some(index) => ctx.data().db().remove_playlist_track(guild_id.get(), &name, index)?,
        None => None,
    };
    match removed {
        Some(track) => {
            ctx.send(text_reply(format!("Removed **{}** from **{}**.", track.title, name)))
                .await?;
            Ok(())
        }
        None => ephemeral(ctx, "❌ Invalid position.").await,
    }
}
