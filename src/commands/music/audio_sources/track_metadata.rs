//! Defines the `TrackMetadata` struct, the unified representation of a queued track
//! regardless of where it was found, and the conversion from `yt-dlp` JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Prefix of the pseudo-URL used for tracks that are resolved just before playback.
pub const YTSEARCH_PREFIX: &str = "ytsearch:";

/// Unified representation of metadata for a playable track.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackMetadata {
    /// The title of the track.
    pub title: String,
    /// Webpage URL of the track, or a `ytsearch:` query resolved at play time.
    pub url: String,
    /// The duration of the track, if known. Live streams have none.
    #[serde(with = "humantime_serde", default)]
    pub duration: Option<Duration>,
    /// URL to a thumbnail image for the track, if available.
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// The display name of the user who requested the track.
    #[serde(default)]
    pub requested_by: Option<String>,
    /// The Discord id of the requester.
    #[serde(default)]
    pub requester_id: Option<u64>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub is_live: bool,
}

impl Default for TrackMetadata {
    fn default() -> Self {
        Self {
            title: "Unknown".to_string(),
            url: String::new(),
            duration: None,
            thumbnail: None,
            requested_by: None,
            requester_id: None,
            artist: None,
            is_live: false,
        }
    }
}

impl TrackMetadata {
    /// A track that is searched on YouTube by title when it starts playing.
    pub fn from_search_term(term: impl Into<String>) -> Self {
        let title = term.into();
        Self {
            url: format!("{}{}", YTSEARCH_PREFIX, title),
            title,
            ..Default::default()
        }
    }

    /// Builds metadata from one `yt-dlp -j` object (a full extraction or a flat playlist entry).
    pub fn from_ytdlp_json(json: &Value) -> Self {
        let title = json["title"].as_str().unwrap_or("Unknown").to_string();

        let url = json["webpage_url"]
            .as_str()
            .or_else(|| json["url"].as_str())
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .or_else(|| {
                json["id"]
                    .as_str()
                    .map(|id| format!("https://www.youtube.com/watch?v={}", id))
            })
            .unwrap_or_default();

        let duration = json["duration"]
            .as_f64()
            .filter(|secs| *secs > 0.0)
            .map(Duration::from_secs_f64);

        let thumbnail = json["thumbnail"]
            .as_str()
            .or_else(|| json["thumbnails"][0]["url"].as_str())
            .map(str::to_string);

        let artist = json["artist"]
            .as_str()
            .or_else(|| json["uploader"].as_str())
            .filter(|a| !a.is_empty())
            .map(str::to_string);

        let is_live = json["is_live"].as_bool().unwrap_or(false);

        Self {
            title,
            url,
            duration,
            thumbnail,
            artist,
            is_live,
            ..Default::default()
        }
    }

    /// Attach the requesting user.
    pub fn requested(mut self, name: impl Into<String>, id: u64) -> Self {
        self.requested_by = Some(name.into());
        self.requester_id = Some(id);
        self
    }

    /// Take over whatever a fresh extraction learned that this entry is missing.
    /// The requester is kept.
    pub fn fill_from(&mut self, resolved: &TrackMetadata) {
        if !self.has_web_url() && resolved.has_web_url() {
            self.url = resolved.url.clone();
        }
        if self.duration.is_none() {
            self.duration = resolved.duration;
        }
        if self.thumbnail.is_none() {
            self.thumbnail = resolved.thumbnail.clone();
        }
        if self.artist.is_none() {
            self.artist = resolved.artist.clone();
        }
        self.is_live |= resolved.is_live;
    }

    /// Duration in whole seconds, zero when unknown.
    pub fn duration_secs(&self) -> i64 {
        self.duration.map(|d| d.as_secs() as i64).unwrap_or(0)
    }

    /// True for real webpages, false for `ytsearch:` placeholders.
    pub fn has_web_url(&self) -> bool {
        self.url.starts_with("http")
    }

    /// Markdown link when the URL is real, bold title otherwise.
    pub fn markdown_link(&self) -> String {
        if self.has_web_url() {
            format!("[{}]({})", self.title, self.url)
        } else {
            format!("**{}**", self.title)
        }
    }
}
