use poise::serenity_prelude::GuildId;
use tracing::info;

use super::*;
use crate::commands::music::utils::audio_filters::{AudioFilter, EQ_BAND_COUNT, EQ_MAX_GAIN, EqPreset, band_label};
use crate::commands::music::utils::embedded_messages::text_reply;
use crate::commands::music::utils::event_handlers;
use crate::commands::music::utils::guild_settings::GuildSettings;
use crate::commands::music::utils::music_manager::MUSIC_MANAGER;
use crate::commands::music::utils::permissions::require_dj;
use crate::{CommandResult, Context};

/// Choices offered by `/filter`, including switching effects off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum FilterChoice {
    #[name = "Bass Boost"]
    Bassboost,
    #[name = "Nightcore"]
    Nightcore,
    #[name = "Vaporwave"]
    Vaporwave,
    #[name = "8D"]
    EightD,
    #[name = "Karaoke"]
    Karaoke,
    #[name = "None"]
    Off,
}

impl FilterChoice {
    pub fn filter(self) -> Option<AudioFilter> {
        match self {
            FilterChoice::Bassboost => Some(AudioFilter::Bassboost),
            FilterChoice::Nightcore => Some(AudioFilter::Nightcore),
            FilterChoice::Vaporwave => Some(AudioFilter::Vaporwave),
            FilterChoice::EightD => Some(AudioFilter::EightD),
            FilterChoice::Karaoke => Some(AudioFilter::Karaoke),
            FilterChoice::Off => None,
        }
    }
}

/// `Bass Heavy` from `bass_heavy`.
fn preset_label(key: &str) -> String {
    key.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether the current track is live, or `None` when nothing is audible.
async fn playing_is_live(ctx: Context<'_>, guild_id: GuildId) -> Option<bool> {
    if !is_playing(guild_id).await {
        return None;
    }
    let queue = ctx.data().queues.get(guild_id);
    let gq = queue.lock().await;
    gq.current.as_ref().map(|track| track.is_live)
}

/// Change the settings and restart the current track where it was so ffmpeg picks them up.
async fn reshape(
    ctx: Context<'_>,
    guild_id: GuildId,
    change: impl FnOnce(&mut GuildSettings),
) -> CommandResult {
    let data = ctx.data();
    let elapsed = {
        let queue = data.queues.get(guild_id);
        let mut gq = queue.lock().await;
        let elapsed = gq.elapsed_secs();
        change(&mut gq.settings);
        data.queues.save_settings(guild_id, &gq);
        elapsed
    };
    ctx.defer().await?;
    event_handlers::restart_playback(ctx.serenity_context(), data, guild_id, elapsed).await?;
    Ok(())
}

/// Adjust volume (1-100)
#[poise::command(slash_command, guild_only, category = "Audio")]
pub async fn volume(
    ctx: Context<'_>,
    #[description = "Volume level from 1 to 100"] level: u8,
) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    if !require_dj(ctx).await? {
        return Ok(());
    }
    if !(1..=100).contains(&level) {
        return ephemeral(ctx, "Volume must be between 1 and 100.").await;
    }

    let data = ctx.data();
    let volume = f32::from(level) / 100.0;
    {
        let queue = data.queues.get(guild_id);
        let mut gq = queue.lock().await;
        gq.settings.volume = volume;
        data.queues.save_settings(guild_id, &gq);
    }
    event_handlers::set_volume(guild_id, volume).await;
    event_handlers::refresh_player(ctx.serenity_context(), data, guild_id).await;

    let message = data.t(guild_id, "volume_set", &[("volume", &level)]).await;
    ctx.send(text_reply(format!("🔊 {}", message))).await?;
    Ok(())
}

/// Apply an audio filter to playback
#[poise::command(slash_command, guild_only, category = "Audio")]
pub async fn filter(
    ctx: Context<'_>,
    #[description = "Audio filter to apply"] name: FilterChoice,
) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    if !require_dj(ctx).await? {
        return Ok(());
    }
    match playing_is_live(ctx, guild_id).await {
        None => return nothing_playing(ctx).await,
        Some(true) => return ephemeral(ctx, "Cannot apply filters to a live stream.").await,
        Some(false) => {}
    }

    let filter = name.filter();
    reshape(ctx, guild_id, |settings| settings.filter_name = filter).await?;
    info!("Filter in guild {} set to {:?}", guild_id, filter);

    let label = filter.map_or("off", AudioFilter::name);
    ctx.send(text_reply(format!("🎛️ Filter: **{}**.", label))).await?;
    Ok(())
}

/// Apply an equalizer preset
#[poise::command(slash_command, guild_only, category = "Audio")]
pub async fn eq(
    ctx: Context<'_>,
    #[description = "EQ preset"] preset: EqPreset,
) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    if !require_dj(ctx).await? {
        return Ok(());
    }
    if !is_playing(guild_id).await {
        return nothing_playing(ctx).await;
    }

    reshape(ctx, guild_id, |settings| settings.eq_bands = preset.bands()).await?;
    ctx.send(text_reply(format!("🎚️ EQ preset: **{}**.", preset_label(preset.key()))))
        .await?;
    Ok(())
}

/// Boost or cut a specific EQ frequency band (-12 to +12 dB)
#[poise::command(slash_command, guild_only, category = "Audio")]
pub async fn eqcustom(
    ctx: Context<'_>,
    #[description = "Band number (1-10, low to high)"] band: usize,
    #[description = "Gain in dB (-12 to +12)"] gain: f32,
) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    if !require_dj(ctx).await? {
        return Ok(());
    }
    if !(1..=EQ_BAND_COUNT).contains(&band) {
        return ephemeral(ctx, "Band must be 1-10.").await;
    }
    if !(-EQ_MAX_GAIN..=EQ_MAX_GAIN).contains(&gain) {
        return ephemeral(ctx, "Gain must be -12 to +12 dB.").await;
    }
    if !is_playing(guild_id).await {
        return nothing_playing(ctx).await;
    }

    reshape(ctx, guild_id, |settings| settings.eq_bands[band - 1] = gain).await?;
    ctx.send(text_reply(format!(
        "EQ band {} ({}): **{:+.1} dB**.",
        band,
        band_label(band - 1),
        gain
    )))
    .await?;
    Ok(())
}

/// Set playback speed (0.5x - 2.0x)
#[poise::command(slash_command, guild_only, category = "Audio")]
pub async fn speed(
    ctx: Context<'_>,
    #[description = "Playback rate from 0.5 to 2.0"] rate: f32,
) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    if !require_dj(ctx).await? {
        return Ok(());
    }
    let Some(is_live) = playing_is_live(ctx, guild_id).await else {
        return nothing_playing(ctx).await;
    };
    if !(0.5..=2.0).contains(&rate) {
        return ephemeral(ctx, "Speed must be between 0.5 and 2.0.").await;
    }
    if is_live {
        return ephemeral(ctx, "Cannot change speed on a live stream.").await;
    }

    reshape(ctx, guild_id, |settings| settings.speed = rate).await?;
    ctx.send(text_reply(format!("⚡ Speed: **{}x**.", rate))).await?;
    Ok(())
}

/// Toggle loudness normalization to balance volume differences between tracks
#[poise::command(slash_command, guild_only, category = "Audio")]
pub async fn normalize(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    if !require_dj(ctx).await? {
        return Ok(());
    }
    match playing_is_live(ctx, guild_id).await {
        None => return nothing_playing(ctx).await,
        Some(true) => return ephemeral(ctx, "Cannot normalize a live stream.").await,
        Some(false) => {}
    }

    let mut enabled = false;
    reshape(ctx, guild_id, |settings| {
        settings.normalize = !settings.normalize;
        enabled = settings.normalize;
    })
    .await?;
    let state = if enabled { "on" } else { "off" };
    ctx.send(text_reply(format!("📊 Loudness normalization: **{}**.", state)))
        .await?;
    Ok(())
}

/// Set crossfade duration between tracks (0-10 seconds)
#[poise::command(slash_command, guild_only, category = "Audio")]
pub async fn crossfade(
    ctx: Context<'_>,
    #[description = "Crossfade duration in seconds (0 to disable)"] seconds: u32,
) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    if !require_dj(ctx).await? {
        return Ok(());
    }
    if seconds > 10 {
        return ephemeral(ctx, "Must be 0-10 seconds.").await;
    }

    let data = ctx.data();
    {
        let queue = data.queues.get(guild_id);
        let mut gq = queue.lock().await;
        gq.settings.crossfade_seconds = seconds;
        data.queues.save_settings(guild_id, &gq);
    }

    let message = if seconds == 0 {
        MUSIC_MANAGER.lock().await.cancel_crossfade_task(guild_id);
        "🎵 Crossfade disabled.".to_string()
    } else {
        event_handlers::schedule_crossfade(ctx.serenity_context(), data, guild_id).await;
        format!("🎵 Crossfade: **{}s**.", seconds)
    };
    ctx.send(text_reply(message)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_preset_label() {
        assert_eq!(preset_label(EqPreset::BassHeavy.key()), "Bass Heavy");
        assert_eq!(preset_label(EqPreset::Flat.key()), "Flat");
    }

    /// Every effect is reachable from the command, plus one way to switch off.
    #[test]
    fn test_filter_choices_cover_all_filters() {
        let choices = [
            FilterChoice::Bassboost,
            FilterChoice::Nightcore,
            FilterChoice::Vaporwave,
            FilterChoice::EightD,
            FilterChoice::Karaoke,
        ];
        let filters: Vec<AudioFilter> = choices.iter().filter_map(|c| c.filter()).collect();
        assert_eq!(filters, AudioFilter::ALL.to_vec());
        assert_eq!(FilterChoice::Off.filter(), None);
    }
}
