#[cfg(feature = "music")]
pub(crate) mod audio;
#[cfg(feature = "music")]
pub(crate) mod autoplay;
#[cfg(feature = "music")]
pub(crate) mod export;
#[cfg(feature = "music")]
pub(crate) mod favorites;
#[cfg(feature = "music")]
pub(crate) mod play;
#[cfg(feature = "music")]
pub(crate) mod player;
#[cfg(feature = "music")]
pub(crate) mod playlist;
#[cfg(feature = "music")]
pub(crate) mod queue;
#[cfg(feature = "music")]
pub(crate) mod search;
#[cfg(feature = "music")]
pub(crate) mod settings;
#[cfg(feature = "music")]
pub(crate) mod skip;
#[cfg(feature = "music")]
pub(crate) mod stats;
#[cfg(feature = "music")]
pub(crate) mod stop;

pub mod audio_sources;
pub mod utils;

#[cfg(feature = "music")]
pub(crate) use voice::*;

use crate::{Data, Error};

/// Without voice support there is nothing to register.
#[cfg(not(feature = "music"))]
pub fn commands() -> Vec<poise::Command<Data, Error>> {
    Vec::new()
}

/// Every slash command the music module registers.
#[cfg(feature = "music")]
pub fn commands() -> Vec<poise::Command<Data, Error>> {
    vec![
        play::play(),
        play::playnext(),
        stop::stop(),
        skip::skip(),
        skip::voteskip(),
        skip::back(),
        skip::replay(),
        player::pause(),
        player::resume(),
        player::seek(),
        player::nowplaying(),
        player::player(),
        player::lyrics(),
        player::grab(),
        queue::queue(),
        queue::myqueue(),
        queue::remove(),
        queue::move_track(),
        queue::skipto(),
        queue::clear(),
        queue::shuffle(),
        queue::loop_mode(),
        queue::undo(),
        export::queue_export(),
        export::queue_import(),
        audio::volume(),
        audio::filter(),
        audio::eq(),
        audio::eqcustom(),
        audio::speed(),
        audio::normalize(),
        audio::crossfade(),
        search::search(),
        search::youtube_search(),
        search::spotify_search(),
        autoplay::autoplay(),
        autoplay::radio(),
        autoplay::radio_off(),
        autoplay::similar(),
        favorites::fav(),
        favorites::favs(),
        favorites::unfav(),
        favorites::playfavs(),
        playlist::playlist(),
        stats::top(),
        stats::toprated(),
        stats::rate(),
        stats::stats(),
        stats::mystats(),
        settings::searchmode(),
        settings::maxqueue(),
        settings::maxperuser(),
        settings::setnpchannel(),
        settings::clearnpchannel(),
        settings::dj(),
        settings::djclear(),
        settings::djmode(),
        settings::stay(),
        settings::language(),
    ]
}

/// Helpers shared by the command modules.
#[cfg(feature = "music")]
mod voice {
    use poise::serenity_prelude as serenity;
    use serenity::GuildId;

    use super::utils::embedded_messages::{self, NOTHING_PLAYING};
    use super::utils::enqueue::Requester;
    use super::utils::music_manager::MUSIC_MANAGER;
    use super::utils::{MusicError, permissions};
    use crate::{CommandResult, Context, Error};

    pub(crate) fn guild_id(ctx: Context<'_>) -> Result<GuildId, Error> {
        ctx.guild_id().ok_or_else(|| MusicError::NotInGuild.into())
    }

    /// Answer only the invoking user.
    pub(crate) async fn ephemeral(ctx: Context<'_>, message: impl Into<String>) -> CommandResult {
        ctx.send(embedded_messages::ephemeral_reply(message)).await?;
        Ok(())
    }

    pub(crate) async fn nothing_playing(ctx: Context<'_>) -> CommandResult {
        ephemeral(ctx, NOTHING_PLAYING).await
    }

    /// The author's server display name.
    pub(crate) async fn display_name(ctx: Context<'_>) -> String {
        match ctx.author_member().await {
            Some(member) => member.display_name().to_string(),
            None => ctx.author().display_name().to_string(),
        }
    }

    pub(crate) async fn requester(ctx: Context<'_>) -> Requester {
        let name = display_name(ctx).await;
        Requester::new(ctx.author().id, name, permissions::author_is_dj(ctx).await)
    }

    /// Audible right now: loaded and not paused.
    pub(crate) async fn is_playing(guild_id: GuildId) -> bool {
        let manager = MUSIC_MANAGER.lock().await;
        manager.is_active(guild_id) && !manager.is_paused(guild_id)
    }
}
