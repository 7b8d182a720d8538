//! This module defines how user input maps onto audio sources.
//! It classifies queries (YouTube, Spotify, SoundCloud, direct streams, plain searches)
//! and hosts the clients that turn them into playable tracks.

/// Submodule for fetching lyrics from lrclib.
pub mod lyrics;
/// Submodule implementing the Spotify Web API client.
pub mod spotify;
/// Submodule building the ffmpeg pipeline that feeds the voice driver.
pub mod stream;
/// Submodule defining the `TrackMetadata` struct used across audio sources.
pub mod track_metadata;
/// Submodule wrapping the `yt-dlp` command-line tool.
pub mod youtube;

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

/// Regex to match Spotify track/playlist/album links, capturing the kind and the id.
static SPOTIFY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:https?://)?open\.spotify\.com/(track|playlist|album)/([A-Za-z0-9]+)")
        .expect("valid spotify regex")
});

/// Regex to match anything on youtube.com or youtu.be.
static YOUTUBE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?(?:www\.|m\.)?(?:youtube\.com|youtu\.be)/?\S+")
        .expect("valid youtube regex")
});

static SOUNDCLOUD_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?(?:www\.|m\.)?soundcloud\.com/\S+").expect("valid soundcloud regex")
});

/// Path suffixes that identify a direct audio or radio stream.
const STREAM_EXTENSIONS: [&str; 8] = [".mp3", ".aac", ".ogg", ".opus", ".flac", ".m3u8", ".pls", ".m3u"];

/// What kind of input a user handed to `/play`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    YoutubeUrl,
    YoutubePlaylist,
    SpotifyTrack,
    SpotifyPlaylist,
    SpotifyAlbum,
    SoundcloudUrl,
    SoundcloudPlaylist,
    RadioStream,
    SearchQuery,
}

impl InputType {
    /// Inputs that expand to more than one track (or never end).
    pub fn is_multi_track(self) -> bool {
        matches!(
            self,
            InputType::YoutubePlaylist
                | InputType::SpotifyPlaylist
                | InputType::SpotifyAlbum
                | InputType::SoundcloudPlaylist
                | InputType::RadioStream
        )
    }

    pub fn is_spotify(self) -> bool {
        matches!(
            self,
            InputType::SpotifyTrack | InputType::SpotifyPlaylist | InputType::SpotifyAlbum
        )
    }
}

/// Classify a user query and return the cleaned value.
///
/// Spotify links yield the Spotify id, every other kind yields the trimmed input.
pub fn classify(query: &str) -> (InputType, String) {
    let query = query.trim();

    if let Some(captures) = SPOTIFY_REGEX.captures(query) {
        let kind = match &captures[1] {
            "track" => InputType::SpotifyTrack,
            "playlist" => InputType::SpotifyPlaylist,
            _ => InputType::SpotifyAlbum,
        };
        return (kind, captures[2].to_string());
    }

    if YOUTUBE_REGEX.is_match(query) {
        if query.contains("list=") {
            return (InputType::YoutubePlaylist, query.to_string());
        }
        return (InputType::YoutubeUrl, query.to_string());
    }

    if SOUNDCLOUD_REGEX.is_match(query) {
        if query.contains("/sets/") {
            return (InputType::SoundcloudPlaylist, query.to_string());
        }
        return (InputType::SoundcloudUrl, query.to_string());
    }

    if is_direct_stream(query) {
        return (InputType::RadioStream, query.to_string());
    }

    (InputType::SearchQuery, query.to_string())
}

/// An http(s) URL whose path looks like a raw audio file or an endless stream endpoint.
fn is_direct_stream(query: &str) -> bool {
    let Ok(url) = Url::parse(query) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    let path = url.path().to_ascii_lowercase();
    STREAM_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
        || path.ends_with("/stream")
        || path.ends_with("/live")
}

/// A YouTube Mix is an auto-generated playlist whose id starts with `RD`.
pub fn is_youtube_mix(url: &str) -> bool {
    query_param(url, "list").is_some_and(|list| list.starts_with("RD"))
}

/// The plain watch URL of the video a Mix link was opened from.
pub fn mix_video_url(url: &str) -> Option<String> {
    query_param(url, "v").map(|v| format!("https://www.youtube.com/watch?v={}", v))
}

/// Display name for a direct stream: the last path segment, or `Live Stream`.
pub fn stream_title(url: &str) -> String {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty() && !segment.contains(':'))
        .map(str::to_string)
        .unwrap_or_else(|| "Live Stream".to_string())
}

fn query_param(url: &str, key: &str) -> Option<String> {
    let with_scheme = if url.starts_with("http") {
        url.to_string()
    } else {
        format!("https://{}", url)
    };
    let parsed = Url::parse(&with_scheme).ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC", InputType::SpotifyTrack, "4uLU6hMCjMI75M1A2tKUQC")]
    #[case("open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M?si=abc", InputType::SpotifyPlaylist, "37i9dQZF1DXcBWIGoYBM5M")]
    #[case("check this https://open.spotify.com/album/1DFixLWuPkv3KT3TnV35m3", InputType::SpotifyAlbum, "1DFixLWuPkv3KT3TnV35m3")]
    #[case("https://www.youtube.com/watch?v=dQw4w9WgXcQ", InputType::YoutubeUrl, "https://www.youtube.com/watch?v=dQw4w9WgXcQ")]
    #[case("  youtu.be/dQw4w9WgXcQ  ", InputType::YoutubeUrl, "youtu.be/dQw4w9WgXcQ")]
    #[case("https://m.youtube.com/playlist?list=PL123", InputType::YoutubePlaylist, "https://m.youtube.com/playlist?list=PL123")]
    #[case("https://soundcloud.com/artist/track", InputType::SoundcloudUrl, "https://soundcloud.com/artist/track")]
    #[case("https://soundcloud.com/artist/sets/album", InputType::SoundcloudPlaylist, "https://soundcloud.com/artist/sets/album")]
    #[case("https://radio.example.com/live.mp3", InputType::RadioStream, "https://radio.example.com/live.mp3")]
    #[case("http://ice.example.org:8000/stream", InputType::RadioStream, "http://ice.example.org:8000/stream")]
    #[case("never gonna give you up", InputType::SearchQuery, "never gonna give you up")]
    #[case("https://example.com/page.html", InputType::SearchQuery, "https://example.com/page.html")]
    fn test_classify(#[case] query: &str, #[case] kind: InputType, #[case] value: &str) {
        assert_eq!(classify(query), (kind, value.to_string()));
    }

    /// A YouTube URL must start the query; mentioning one mid-sentence is a search.
    #[test]
    fn test_youtube_must_lead() {
        let (kind, _) = classify("songs like youtube.com/watch?v=x");
        assert_eq!(kind, InputType::SearchQuery);
    }

    /// Mix playlists are detected by their RD prefix and reduce to the seed video.
    #[test]
    fn test_youtube_mix() {
        let mix = "https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=RDdQw4w9WgXcQ&start_radio=1";
        assert!(is_youtube_mix(mix));
        assert!(!is_youtube_mix("https://www.youtube.com/playlist?list=PL123"));
        assert_eq!(
            mix_video_url(mix).as_deref(),
            Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
        );
    }

    #[test]
    fn test_stream_title() {
        assert_eq!(stream_title("https://radio.example.com/jazz.mp3"), "jazz.mp3");
        assert_eq!(stream_title("https://radio.example.com/"), "radio.example.com");
        assert_eq!(stream_title("https:"), "Live Stream");
    }

    #[test]
    fn test_multi_track_kinds() {
        assert!(InputType::RadioStream.is_multi_track());
        assert!(!InputType::SpotifyTrack.is_multi_track());
        assert!(InputType::SpotifyAlbum.is_spotify());
    }
}
