//! Wraps the `yt-dlp` command-line tool: metadata extraction, searches, playlists
//! and direct stream URLs. YouTube, SoundCloud and generic URLs all go through here.

use serde_json::Value;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::track_metadata::TrackMetadata;
use crate::commands::music::utils::{MusicError, MusicResult};

/// Audio format selector, preferring opus so ffmpeg has the least to do.
pub const AUDIO_FORMAT: &str = "bestaudio[acodec=opus]/bestaudio/best";
/// Default number of results for interactive searches.
pub const SEARCH_LIMIT: usize = 5;

/// Thin async wrapper around the `yt-dlp` binary.
#[derive(Debug, Clone)]
pub struct Ytdl {
    binary: String,
    cookies: Option<PathBuf>,
}

impl Ytdl {
    pub fn new(cookies: impl Into<PathBuf>) -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            cookies: Some(cookies.into()),
        }
    }

    /// Use a different executable (tests point this at a fake script).
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    fn base_args(&self) -> Vec<String> {
        let mut args = vec![
            "--quiet".to_string(),
            "--no-warnings".to_string(),
            "--no-check-certificates".to_string(),
            "--default-search".to_string(),
            "ytsearch".to_string(),
        ];
        if let Some(cookies) = self.cookies.as_deref().filter(|p| p.exists()) {
            args.push("--cookies".to_string());
            args.push(cookies.display().to_string());
        }
        args
    }

    /// Run yt-dlp and parse every JSON line it prints.
    async fn run(&self, extra: &[&str]) -> MusicResult<Vec<Value>> {
        let mut args = self.base_args();
        args.extend(extra.iter().map(|s| s.to_string()));
        debug!("Running {} {:?}", self.binary, args);

        let output = Command::new(&self.binary)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| MusicError::AudioSourceError(format!("Failed to run yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("unknown error");
            return Err(MusicError::AudioSourceError(reason.trim().to_string()));
        }

        parse_json_lines(&String::from_utf8_lossy(&output.stdout))
    }

    /// Resolve a URL or `ytsearch:` query to a single track's metadata.
    pub async fn resolve(&self, query: &str) -> MusicResult<TrackMetadata> {
        info!("Resolving track metadata for: {}", query);
        let values = self
            .run(&["-j", "--no-playlist", "-f", AUDIO_FORMAT, query])
            .await?;
        let first = values
            .first()
            .map(first_entry)
            .ok_or_else(|| MusicError::AudioSourceError("Could not find anything".to_string()))?;
        Ok(TrackMetadata::from_ytdlp_json(first))
    }

    /// Resolve a track's metadata together with the direct media URL that ffmpeg should read.
    pub async fn stream_url(&self, query: &str) -> MusicResult<(TrackMetadata, String)> {
        let values = self
            .run(&["-j", "--no-playlist", "-f", AUDIO_FORMAT, query])
            .await?;
        let json = values
            .first()
            .map(first_entry)
            .ok_or_else(|| MusicError::AudioSourceError(format!("No stream found for {}", query)))?;
        let stream = json["url"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| MusicError::AudioSourceError(format!("No stream found for {}", query)))?;
        Ok((TrackMetadata::from_ytdlp_json(json), stream))
    }

    /// Search YouTube and return up to `limit` watchable results.
    pub async fn search(&self, query: &str, limit: usize) -> MusicResult<Vec<TrackMetadata>> {
        let search = format!("ytsearch{}:{}", limit * 2, query);
        let values = self.run(&["-J", "--flat-playlist", &search]).await?;
        Ok(values
            .first()
            .map(|json| parse_search_results(json, limit))
            .unwrap_or_default())
    }

    /// Fetch a playlist's title and entries without resolving each one.
    pub async fn playlist(&self, url: &str) -> MusicResult<(String, Vec<TrackMetadata>)> {
        let values = self
            .run(&[
                "-J",
                "--flat-playlist",
                "--yes-playlist",
                "--extractor-args",
                "youtubetab:skip=authcheck",
                url,
            ])
            .await?;
        let json = values
            .first()
            .ok_or_else(|| MusicError::AudioSourceError("Empty playlist response".to_string()))?;
        Ok(parse_playlist(json))
    }
}

/// yt-dlp prints one JSON document per line.
fn parse_json_lines(stdout: &str) -> MusicResult<Vec<Value>> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str(line).map_err(|e| {
                MusicError::AudioSourceError(format!("Failed to parse video metadata: {}", e))
            })
        })
        .collect()
}

/// Unwrap a search/playlist wrapper to its first entry.
fn first_entry(json: &Value) -> &Value {
    match json["entries"].as_array().and_then(|entries| entries.first()) {
        Some(entry) => entry,
        None => json,
    }
}

/// Keep only video results (channels and playlists also show up in searches).
pub fn parse_search_results(json: &Value, limit: usize) -> Vec<TrackMetadata> {
    json["entries"]
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .filter(|entry| !entry.is_null())
                .map(TrackMetadata::from_ytdlp_json)
                .filter(|track| track.url.contains("watch?v=") || track.url.contains("youtu.be/"))
                .take(limit)
                .collect()
        })
        .unwrap_or_default()
}

/// Title and flat entries of a playlist extraction.
pub fn parse_playlist(json: &Value) -> (String, Vec<TrackMetadata>) {
    let title = json["title"]
        .as_str()
        .unwrap_or("YouTube playlist")
        .to_string();
    let entries: Vec<TrackMetadata> = json["entries"]
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .filter(|entry| !entry.is_null())
                .map(TrackMetadata::from_ytdlp_json)
                .filter(|track| !track.url.is_empty())
                .collect()
        })
        .unwrap_or_default();

    if entries.is_empty() {
        warn!("Playlist '{}' has no playable entries", title);
    }
    (title, entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    /// Non-video results are dropped and the limit is honoured.
    #[test]
    fn test_parse_search_results() {
        let json = json!({
            "entries": [
                { "title": "A channel", "url": "https://www.youtube.com/channel/UC123" },
                { "title": "One", "url": "https://www.youtube.com/watch?v=1", "duration": 100 },
                null,
                { "title": "Two", "url": "https://youtu.be/2" },
                { "title": "Three", "url": "https://www.youtube.com/watch?v=3" },
            ]
        });

        let results = parse_search_results(&json, 2);

        assert_eq!(
            results.iter().map(|t| t.title.as_str()).collect::<Vec<_>>(),
            vec!["One", "Two"]
        );
        assert_eq!(results[0].duration_secs(), 100);
    }

    /// Playlist entries get a URL from webpage_url, url or id, in that order.
    #[test]
    fn test_parse_playlist() {
        let json = json!({
            "title": "Road trip",
            "entries": [
                { "title": "A", "webpage_url": "https://www.youtube.com/watch?v=a", "url": "ignored" },
                { "title": "B", "url": "https://www.youtube.com/watch?v=b" },
                { "title": "C", "id": "c" },
            ]
        });

        let (title, entries) = parse_playlist(&json);

        assert_eq!(title, "Road trip");
        assert_eq!(
            entries.iter().map(|t| t.url.as_str()).collect::<Vec<_>>(),
            vec![
                "https://www.youtube.com/watch?v=a",
                "https://www.youtube.com/watch?v=b",
                "https://www.youtube.com/watch?v=c",
            ]
        );
    }

    /// Wrapped search output resolves to its first entry.
    #[test]
    fn test_first_entry() {
        let wrapped = json!({ "entries": [{ "title": "inner" }] });
        assert_eq!(first_entry(&wrapped)["title"], "inner");
        let plain = json!({ "title": "plain" });
        assert_eq!(first_entry(&plain)["title"], "plain");
    }

    /// Each stdout line is parsed as its own document; garbage is an audio source error.
    #[test]
    fn test_parse_json_lines() {
        let values = parse_json_lines("{\"a\":1}\n\n{\"b\":2}\n").unwrap();
        assert_eq!(values.len(), 2);

        match parse_json_lines("not json") {
            Err(MusicError::AudioSourceError(_)) => {}
            other => panic!("Expected AudioSourceError, got {:?}", other),
        }
    }

    /// A missing binary surfaces as an audio source error instead of a panic.
    #[tokio::test]
    async fn test_missing_binary() {
        let ytdl = Ytdl::new("/nonexistent/cookies.txt").with_binary("/nonexistent/yt-dlp");
        match ytdl.resolve("ytsearch:anything").await {
            Err(MusicError::AudioSourceError(msg)) => assert!(msg.contains("Failed to run yt-dlp")),
            other => panic!("Expected AudioSourceError, got {:?}", other),
        }
    }
}
