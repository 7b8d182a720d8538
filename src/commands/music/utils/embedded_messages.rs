use poise::{CreateReply, serenity_prelude as serenity};
use serenity::all::{CreateEmbed, CreateEmbedFooter};

use super::button_controls;
use crate::commands::music::audio_sources::track_metadata::TrackMetadata;
use super::guild_queue::GuildQueue;
use super::guild_settings::LoopMode;
use super::{format_duration, plural, progress_bar};

pub const COLOR_BLURPLE: u32 = 0x5865f2;
pub const COLOR_ERROR: u32 = 0xff0000;
pub const COLOR_SUCCESS: u32 = 0x00ff00;
pub const COLOR_IDLE: u32 = 0x607d8b;

pub const NOTHING_PLAYING: &str = "❌ Nothing is playing. Use `/play` to queue a track.";

/// Tracks per page in `/queue`.
pub const QUEUE_PAGE_SIZE: usize = 10;
const DESCRIPTION_LIMIT: usize = 4000;

/// Ephemeral red error embed.
pub fn error_reply(message: &str) -> CreateReply {
    CreateReply::default()
        .embed(
            CreateEmbed::new()
                .title("❌ Error")
                .description(message)
                .color(COLOR_ERROR),
        )
        .ephemeral(true)
}

/// Plain text reply visible to everyone.
pub fn text_reply(message: impl Into<String>) -> CreateReply {
    CreateReply::default().content(message)
}

/// Plain text reply only the invoking user sees.
pub fn ephemeral_reply(message: impl Into<String>) -> CreateReply {
    CreateReply::default().content(message).ephemeral(true)
}

/// Everything the player embed shows, captured while the queue lock is held.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub title: String,
    pub url: Option<String>,
    pub thumbnail: Option<String>,
    pub requested_by: String,
    pub elapsed: u64,
    pub duration: u64,
    pub queue_len: usize,
    pub volume: f32,
    pub paused: bool,
    pub loop_mode: LoopMode,
    pub autoplay: bool,
    pub filter: Option<String>,
    pub speed: f32,
    pub normalize: bool,
}

impl PlayerSnapshot {
    /// `None` when nothing is playing.
    pub fn capture(gq: &GuildQueue, paused: bool) -> Option<Self> {
        let track = gq.current.as_ref()?;
        Some(Self {
            title: track.title.clone(),
            url: track.has_web_url().then(|| track.url.clone()),
            thumbnail: track.thumbnail.clone(),
            requested_by: track.requested_by.clone().unwrap_or_else(|| "Unknown".to_string()),
            elapsed: gq.elapsed_secs(),
            duration: track.duration_secs().max(0) as u64,
            queue_len: gq.len(),
            volume: gq.settings.volume,
            paused,
            loop_mode: gq.settings.loop_mode,
            autoplay: gq.settings.autoplay,
            filter: gq.settings.filter_name.map(|f| f.to_string()),
            speed: gq.settings.speed,
            normalize: gq.settings.normalize,
        })
    }

    /// Status line: play state, then any active loop, autoplay, filter, speed and normalize flags.
    pub fn footer(&self) -> String {
        let mut parts = vec![if self.paused { "⏸️ Paused" } else { "▶️ Playing" }.to_string()];
        match self.loop_mode {
            LoopMode::Off => {}
            LoopMode::Single => parts.push(format!("🔂 {}", title_case(self.loop_mode.label()))),
            LoopMode::Queue => parts.push(format!("🔁 {}", title_case(self.loop_mode.label()))),
        }
        if self.autoplay {
            parts.push("✨ Autoplay".to_string());
        }
        if let Some(filter) = &self.filter {
            parts.push(format!("🎛️ {}", title_case(&filter.replace('_', " "))));
        }
        if (self.speed - 1.0).abs() > f32::EPSILON {
            parts.push(format!("⚡ {}x", self.speed));
        }
        if self.normalize {
            parts.push("📊 Normalize".to_string());
        }
        parts.join("  ")
    }
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn nothing_playing_embed() -> CreateEmbed {
    CreateEmbed::new()
        .title("🎵 Nothing Playing")
        .description("Use `/play` to queue a track.")
        .color(COLOR_IDLE)
}

pub fn player_embed(snapshot: &PlayerSnapshot) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title(&snapshot.title)
        .description(format!(
            "\n{}\n",
            progress_bar(snapshot.elapsed as i64, snapshot.duration as i64, 12)
        ))
        .color(COLOR_BLURPLE)
        .field("👤 Requested by", &snapshot.requested_by, true)
        .field(
            "🎵 Up next",
            if snapshot.queue_len > 0 {
                format!("{} tracks", snapshot.queue_len)
            } else {
                "Nothing".to_string()
            },
            true,
        )
        .field("🔊 Volume", format!("{}%", (snapshot.volume * 100.0).round() as i64), true)
        .footer(CreateEmbedFooter::new(snapshot.footer()));
    if let Some(url) = &snapshot.url {
        embed = embed.url(url);
    }
    if let Some(thumbnail) = &snapshot.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }
    embed
}

/// The player message: embed plus controls, or the idle embed.
pub fn player_message(snapshot: Option<&PlayerSnapshot>) -> (CreateEmbed, Vec<serenity::CreateActionRow>) {
    match snapshot {
        Some(snapshot) => (
            player_embed(snapshot),
            button_controls::player_buttons(snapshot.paused, snapshot.duration, snapshot.elapsed),
        ),
        None => (nothing_playing_embed(), Vec::new()),
    }
}

/// Embed kept up to date in the dedicated now-playing channel.
pub fn np_channel_embed(gq: &GuildQueue) -> Option<CreateEmbed> {
    let track = gq.current.as_ref()?;
    let mut embed = CreateEmbed::new()
        .title(&track.title)
        .color(COLOR_BLURPLE)
        .field(
            "👤 Requested by",
            track.requested_by.as_deref().unwrap_or("Unknown"),
            true,
        )
        .field("⏱️ Duration", format_duration(track.duration_secs()), true)
        .footer(CreateEmbedFooter::new(remaining_footer(gq.len())));
    if track.has_web_url() {
        embed = embed.url(&track.url);
    }
    if let Some(thumbnail) = &track.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }
    if let Some(next) = gq.queue.front() {
        embed = embed.field("⏭️ Up next", &next.title, false);
    }
    Some(embed)
}

pub fn remaining_footer(remaining: usize) -> String {
    format!("🎵 {} track{} remaining", remaining, plural(remaining))
}

pub fn total_pages(len: usize) -> usize {
    len.div_ceil(QUEUE_PAGE_SIZE).max(1)
}

/// Description and footer for one page of the queue. `page` is clamped to the last page.
pub fn queue_page(gq: &GuildQueue, page: usize) -> (String, String, usize) {
    let pages = total_pages(gq.len());
    let page = page.min(pages - 1);

    let mut lines = Vec::new();
    if let Some(current) = &gq.current {
        lines.push(format!(
            "▶️  **{}** `{}`",
            current.title,
            format_duration(current.duration_secs())
        ));
        lines.push(String::new());
    }
    let start = page * QUEUE_PAGE_SIZE;
    for (i, track) in gq.queue.iter().enumerate().skip(start).take(QUEUE_PAGE_SIZE) {
        lines.push(format!(
            "`{}.`  {} `{}`",
            i + 1,
            track.title,
            format_duration(track.duration_secs())
        ));
    }

    let mut description = lines.join("\n");
    if description.chars().count() > DESCRIPTION_LIMIT {
        description = description.chars().take(DESCRIPTION_LIMIT - 10).collect::<String>() + "\n…";
    }

    let loop_emoji = if gq.settings.loop_mode == LoopMode::Single {
        "🔂"
    } else {
        "🔁"
    };
    let footer = [
        format!("🎵 {} tracks", gq.len()),
        format!("⏱️ {}", format_duration(gq.total_duration_secs())),
        format!("{} {}", loop_emoji, title_case(gq.settings.loop_mode.label())),
        format!("🔊 {}%", (gq.settings.volume * 100.0).round() as i64),
        format!("Page {}/{}", page + 1, pages),
    ]
    .join("  ·  ");

    (description, footer, page)
}

pub fn queue_embed(gq: &GuildQueue, page: usize) -> (CreateEmbed, Vec<serenity::CreateActionRow>) {
    let (description, footer, page) = queue_page(gq, page);
    let embed = CreateEmbed::new()
        .title("📋 Queue")
        .description(description)
        .color(COLOR_BLURPLE)
        .footer(CreateEmbedFooter::new(footer));
    (embed, button_controls::queue_page_buttons(page, total_pages(gq.len())))
}

/// Shown in the text channel when someone joins the bot's voice channel mid-track.
pub fn join_notice(track: &TrackMetadata, elapsed: u64) -> CreateEmbed {
    let embed = CreateEmbed::new()
        .title("Now Playing")
        .description(format!(
            "**{}**\n{}",
            track.title,
            progress_bar(elapsed as i64, track.duration_secs(), 12)
        ))
        .color(COLOR_SUCCESS);
    match &track.thumbnail {
        Some(thumbnail) => embed.thumbnail(thumbnail),
        None => embed,
    }
}

/// `(label, id, [(command, description)])`
pub const HELP_CATEGORIES: &[(&str, &str, &[(&str, &str)])] = &[
    (
        "🎵 Playback",
        "playback",
        &[
            ("/play", "Play from a YouTube/Spotify URL or search keywords"),
            ("/playnext", "Insert a single track to play immediately after the current one"),
            ("/skip", "Skip the current track and play the next one"),
            ("/stop", "Stop playback, clear queue, and disconnect"),
            ("/pause", "Pause playback"),
            ("/resume", "Resume playback"),
            ("/replay", "Restart the current track from the beginning"),
            ("/back", "Play the previous track"),
            ("/voteskip", "Start a skip vote; half the listeners must agree"),
        ],
    ),
    (
        "📋 Queue",
        "queue",
        &[
            ("/queue", "Show the current queue"),
            ("/myqueue", "Show only the tracks you have in the queue"),
            ("/remove `<pos>`", "Remove a track by position"),
            ("/move `<from>` `<to>`", "Move a track to a different position"),
            ("/skipto `<pos>`", "Jump to a specific position in the queue"),
            ("/clear", "Clear the queue"),
            ("/shuffle", "Shuffle the queue, spreading same-artist tracks evenly"),
            ("/loop", "Cycle loop mode: off, single, queue"),
            ("/undo", "Revert the last queue change"),
            ("/queue-export", "Export the queue as a shareable code"),
            ("/queue-import `<code>`", "Import a queue from an exported code"),
        ],
    ),
    (
        "🔊 Audio",
        "audio",
        &[
            ("/volume `<1-100>`", "Adjust playback volume"),
            ("/filter", "Apply an audio filter (Bass Boost, Nightcore, Vaporwave, 8D, Karaoke)"),
            ("/seek `<time>`", "Seek to a position, absolute (`1:30`) or relative (`+30`, `-15`)"),
            ("/speed `<0.5-2.0>`", "Set playback speed"),
            ("/normalize", "Toggle loudness normalization"),
            ("/eq", "Apply an EQ preset"),
            ("/eqcustom `<band>` `<gain>`", "Boost or cut one frequency band (-12 to +12 dB)"),
            ("/crossfade `<0-10>`", "Set crossfade duration between tracks"),
        ],
    ),
    (
        "🎛️ Player",
        "player",
        &[
            ("/nowplaying", "Show the currently playing track with progress bar"),
            ("/player", "Open an interactive player with playback controls"),
            ("/lyrics", "Show lyrics for the current or a specified track"),
            ("/grab", "Send the current track info to your DMs"),
        ],
    ),
    (
        "📻 Radio",
        "radio",
        &[
            ("/autoplay", "Auto-queue similar tracks when the queue runs out"),
            ("/radio `<seed>`", "Start endless radio seeded by an artist or genre"),
            ("/radio-off", "Stop radio mode"),
            ("/similar", "Show Spotify recommendations based on the current track"),
        ],
    ),
    (
        "🔍 Search",
        "search",
        &[
            ("/search", "Search and pick from results (uses server default)"),
            ("/youtube-search", "Search YouTube and pick from results"),
            ("/spotify-search", "Search Spotify and pick from results"),
        ],
    ),
    (
        "❤️ Favorites",
        "favorites",
        &[
            ("/fav", "Save the current track to your favorites"),
            ("/favs", "List your favorite tracks"),
            ("/unfav `<pos>`", "Remove a track from your favorites by position"),
            ("/playfavs", "Queue all your favorite tracks"),
        ],
    ),
    (
        "📁 Playlists",
        "playlists",
        &[
            ("/playlist save `<name>`", "Save the current queue as a named playlist"),
            ("/playlist load `<name>`", "Queue tracks from a saved playlist"),
            ("/playlist list", "List all saved playlists"),
            ("/playlist delete `<name>`", "Delete a saved playlist"),
            ("/playlist addtrack `<name>`", "Add the current track to a playlist"),
            ("/playlist removetrack `<name>` `<pos>`", "Remove a track from a playlist"),
            ("/playlist adduser `<name>` `<user>`", "Add a collaborator to a playlist"),
            ("/playlist removeuser `<name>` `<user>`", "Remove a collaborator from a playlist"),
        ],
    ),
    (
        "🏆 Stats & Social",
        "stats",
        &[
            ("/top", "Show the most played tracks in this server"),
            ("/toprated", "Show the highest-rated tracks in this server"),
            ("/rate", "Rate the current track with thumbs up / down"),
            ("/stats", "Show server-wide listening stats"),
            ("/mystats", "Show your personal listening history and top tracks"),
        ],
    ),
    (
        "⚙️ Settings",
        "settings",
        &[
            ("/searchmode", "Toggle default search between YouTube and Spotify"),
            ("/maxqueue `<size>`", "Set the maximum queue size (default 50)"),
            ("/maxperuser `<limit>`", "Limit how many tracks each user can have in the queue"),
            ("/setnpchannel", "Set this channel as the now-playing display channel"),
            ("/clearnpchannel", "Disable the dedicated now-playing channel"),
            ("/dj `<role>`", "Restrict bot controls to a DJ role (admin only)"),
            ("/djclear", "Remove the DJ role restriction (admin only)"),
            ("/djmode", "Require DJ approval before non-DJs can add tracks (admin only)"),
            ("/24-7", "Keep the bot connected even when idle or alone"),
            ("/language `<lang>`", "Set the bot language for this server"),
        ],
    ),
];

/// One category's command list, or the overview when `category` is unknown.
pub fn help_embed(category: Option<&str>) -> CreateEmbed {
    if let Some((label, _, commands)) = HELP_CATEGORIES.iter().find(|(_, id, _)| Some(*id) == category) {
        let lines: Vec<String> = commands
            .iter()
            .map(|(command, description)| format!("`{}`: {}", command, description))
            .collect();
        return CreateEmbed::new()
            .title(*label)
            .description(lines.join("\n"))
            .color(COLOR_BLURPLE);
    }

    let lines: Vec<String> = HELP_CATEGORIES
        .iter()
        .map(|(label, _, commands)| format!("{}: {} commands", label, commands.len()))
        .collect();
    CreateEmbed::new()
        .title("🎵 Essusic Help")
        .description(format!(
            "A feature-rich music bot for Discord.\nUse the menu below to browse commands by category.\n\n{}",
            lines.join("\n")
        ))
        .color(COLOR_BLURPLE)
        .footer(CreateEmbedFooter::new("Tip: Use /player for an interactive control panel"))
}

pub fn help_components() -> Vec<serenity::CreateActionRow> {
    let categories: Vec<(&str, &str, usize)> = HELP_CATEGORIES
        .iter()
        .map(|(label, id, commands)| (*label, *id, commands.len()))
        .collect();
    button_controls::help_select(&categories)
}

pub fn help_reply() -> CreateReply {
    CreateReply::default()
        .embed(help_embed(None))
        .components(help_components())
}
