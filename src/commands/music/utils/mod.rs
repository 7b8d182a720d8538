use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

// Export music utilities
pub mod audio_filters;
pub mod button_controls;
pub mod embedded_messages;
pub mod guild_queue;
pub mod guild_settings;
pub mod permissions;
pub mod queue_export;
pub mod queue_manager;
pub mod views;

#[cfg(feature = "music")]
pub mod component_handlers;
#[cfg(feature = "music")]
pub mod enqueue;
#[cfg(feature = "music")]
pub mod event_handlers;
#[cfg(feature = "music")]
pub mod music_manager;

/// Errors that can occur during music operations
#[derive(Error, Debug)]
pub enum MusicError {
    #[error("Not in a guild")]
    NotInGuild,

    #[error("Failed to join voice channel: {0}")]
    JoinError(String),

    #[error("Not connected to a voice channel")]
    NotConnected,

    #[error("Failed to get voice manager")]
    NoVoiceManager,

    #[error("You need to be in a voice channel.")]
    UserNotInVoiceChannel,

    #[error("Audio source error: {0}")]
    AudioSourceError(String),

    #[error("External API error: {0}")]
    ExternalApiError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("No queue")]
    NoQueue,

    #[error("Nothing is playing right now")]
    NothingPlaying,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Result type for music operations
pub type MusicResult<T> = Result<T, MusicError>;

static YT_TOPIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*-\s*topic\s*$").expect("valid topic regex"));

static YT_JUNK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)\s*[\(\[]",
        r"(?:official\s*(?:music\s*)?(?:video|audio|lyric\s*video|visualizer)?|",
        r"lyrics?|hd|hq|4k|8k|remaster(?:ed)?|explicit|clean|radio\s*edit|",
        r"full\s*(?:song|album)|feat\.?[^)\]]*|ft\.?[^)\]]*|prod\.?[^)\]]*|",
        r"extended\s*(?:version|mix)?|original\s*(?:version|mix)?|topic)",
        r"[\)\]]"
    ))
    .expect("valid junk regex")
});

/// Format a number of seconds as `m:ss` or `h:mm:ss`; zero or negative durations are `LIVE`.
pub fn format_duration(seconds: i64) -> String {
    if seconds <= 0 {
        return "LIVE".to_string();
    }
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let seconds = seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Render a text progress bar, e.g. `1:05 ▬▬▬🔘▬▬▬▬▬▬▬▬▬ 4:20`.
pub fn progress_bar(elapsed: i64, total: i64, length: usize) -> String {
    if total <= 0 {
        return format!("{} / LIVE", format_duration(elapsed));
    }
    let elapsed = elapsed.clamp(0, total);
    let filled = ((length as f64) * (elapsed as f64) / (total as f64)).round() as usize;
    let filled = filled.min(length);

    format!(
        "{} {}🔘{} {}",
        format_duration(elapsed),
        "▬".repeat(filled),
        "▬".repeat(length - filled),
        format_duration(total)
    )
}

/// Parse `90`, `1:30` or `1:30:00` into seconds. Values that overflow are rejected.
pub fn parse_time(value: &str) -> Option<u64> {
    let parts = value
        .trim()
        .split(':')
        .map(|part| part.parse::<u64>())
        .collect::<Result<Vec<_>, _>>()
        .ok()?;

    match parts.as_slice() {
        [s] => Some(*s),
        [m, s] => m.checked_mul(60)?.checked_add(*s),
        [h, m, s] => h
            .checked_mul(3600)?
            .checked_add(m.checked_mul(60)?)?
            .checked_add(*s),
        _ => None,
    }
}

/// Strip YouTube noise such as `(Official Video)` or ` - Topic` from a title.
pub fn clean_title(title: &str) -> String {
    let title = YT_TOPIC_RE.replace(title, "");
    let title = YT_JUNK_RE.replace_all(&title, "");
    title
        .trim_matches(|c: char| matches!(c, ' ' | '-' | '–' | '—' | '|'))
        .to_string()
}

/// `"s"` unless `count` is exactly one.
pub fn plural(count: usize) -> &'static str {
    if count == 1 { "" } else { "s" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(0, "LIVE" ; "zero is live")]
    #[test_case(-5, "LIVE" ; "negative is live")]
    #[test_case(5, "0:05" ; "seconds only")]
    #[test_case(225, "3:45" ; "minutes")]
    #[test_case(3600, "1:00:00" ; "exact hour")]
    #[test_case(5025, "1:23:45" ; "hours")]
    fn test_format_duration(seconds: i64, expected: &str) {
        assert_eq!(format_duration(seconds), expected);
    }

    /// The knob sits at the proportional position and the bar keeps its length.
    #[test]
    fn test_progress_bar_midway() {
        let bar = progress_bar(60, 120, 12);
        assert_eq!(bar, format!("1:00 {}🔘{} 2:00", "▬".repeat(6), "▬".repeat(6)));
    }

    /// Elapsed past the end is clamped to the total.
    #[test]
    fn test_progress_bar_clamps() {
        let bar = progress_bar(500, 120, 12);
        assert_eq!(bar, format!("2:00 {}🔘 2:00", "▬".repeat(12)));
    }

    /// Streams without a duration show the elapsed time only.
    #[test]
    fn test_progress_bar_live() {
        assert_eq!(progress_bar(75, 0, 12), "1:15 / LIVE");
    }

    #[test_case("90", Some(90))]
    #[test_case("1:30", Some(90))]
    #[test_case(" 1:30:00 ", Some(5400))]
    #[test_case("1:2:3:4", None)]
    #[test_case("abc", None)]
    #[test_case("-1", None)]
    #[test_case("5124095576030432:0:0", None ; "hours overflow")]
    #[test_case("307445734561825861:0", None ; "minutes overflow")]
    #[test_case("0:0:18446744073709551615", Some(u64::MAX) ; "largest seconds")]
    #[test_case("1:0:18446744073709551615", None ; "sum overflow")]
    fn test_parse_time(input: &str, expected: Option<u64>) {
        assert_eq!(parse_time(input), expected);
    }

    #[test_case("Rick Astley - Never Gonna Give You Up (Official Music Video)", "Rick Astley - Never Gonna Give You Up")]
    #[test_case("Daft Punk - Topic", "Daft Punk")]
    #[test_case("Song [HD] (feat. Someone)", "Song")]
    #[test_case("Artist — Track (Lyrics) |", "Artist — Track")]
    fn test_clean_title(input: &str, expected: &str) {
        assert_eq!(clean_title(input), expected);
    }
}
