//! Shareable queue codes: base64 of a compact JSON array of `{t, u, d}` objects.

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{MusicError, MusicResult};
use crate::commands::music::audio_sources::track_metadata::TrackMetadata;

/// Codes up to this length are posted inline, longer ones as a file.
pub const INLINE_CODE_LIMIT: usize = 1900;

#[derive(Debug, Serialize, Deserialize)]
struct ExportedTrack {
    #[serde(default = "unknown_title")]
    t: String,
    #[serde(default)]
    u: String,
    #[serde(default)]
    d: i64,
}

fn unknown_title() -> String {
    "Unknown".to_string()
}

/// Encode the given tracks (current first, then the queue).
pub fn export_code<'a>(tracks: impl IntoIterator<Item = &'a TrackMetadata>) -> MusicResult<String> {
    let items: Vec<ExportedTrack> = tracks
        .into_iter()
        .map(|track| ExportedTrack {
            t: track.title.clone(),
            u: track.url.clone(),
            d: track.duration_secs(),
        })
        .collect();
    Ok(BASE64_STANDARD.encode(serde_json::to_vec(&items)?))
}

/// Decode a code, tolerating surrounding whitespace, line breaks and code fences.
pub fn import_code(code: &str) -> MusicResult<Vec<TrackMetadata>> {
    let cleaned: String = code
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '`')
        .collect();

    let raw = BASE64_STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|_| MusicError::InvalidInput("Invalid queue code.".to_string()))?;
    let items: Vec<ExportedTrack> = serde_json::from_slice(&raw)
        .map_err(|_| MusicError::InvalidInput("Invalid queue code.".to_string()))?;

    Ok(items
        .into_iter()
        .map(|item| TrackMetadata {
            title: item.t,
            url: item.u,
            duration: (item.d > 0).then(|| Duration::from_secs(item.d as u64)),
            ..Default::default()
        })
        .collect())
}
