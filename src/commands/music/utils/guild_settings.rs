//! Per-guild preferences that survive restarts.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use super::audio_filters::{AudioFilter, EQ_BAND_COUNT, FilterSettings};

/// Loop behaviour when a track finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum LoopMode {
    #[default]
    #[serde(rename = "OFF")]
    Off,
    #[serde(rename = "SINGLE")]
    Single,
    #[serde(rename = "QUEUE")]
    Queue,
}

impl LoopMode {
    /// Cycle `off → single → queue → off`.
    pub fn next(self) -> Self {
        match self {
            LoopMode::Off => LoopMode::Single,
            LoopMode::Single => LoopMode::Queue,
            LoopMode::Queue => LoopMode::Off,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LoopMode::Off => "off",
            LoopMode::Single => "single track",
            LoopMode::Queue => "whole queue",
        }
    }

    /// Parse a persisted name; anything unknown is `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "OFF" => Some(LoopMode::Off),
            "SINGLE" => Some(LoopMode::Single),
            "QUEUE" => Some(LoopMode::Queue),
            _ => None,
        }
    }
}

// Unknown names fall back to `Off` instead of failing the whole settings blob.
impl<'de> Deserialize<'de> for LoopMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(LoopMode::from_name(&name).unwrap_or_default())
    }
}

/// Where `/search` looks by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Youtube,
    Spotify,
}

impl SearchMode {
    pub fn toggled(self) -> Self {
        match self {
            SearchMode::Youtube => SearchMode::Spotify,
            SearchMode::Spotify => SearchMode::Youtube,
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchMode::Youtube => write!(f, "YouTube"),
            SearchMode::Spotify => write!(f, "Spotify"),
        }
    }
}

/// Persisted guild preferences. Keys missing from storage take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuildSettings {
    pub volume: f32,
    pub search_mode: SearchMode,
    pub max_queue: usize,
    pub autoplay: bool,
    pub filter_name: Option<AudioFilter>,
    pub dj_role_id: Option<u64>,
    pub stay_connected: bool,
    pub speed: f32,
    pub normalize: bool,
    pub loop_mode: LoopMode,
    #[serde(deserialize_with = "deserialize_eq_bands")]
    pub eq_bands: [f32; EQ_BAND_COUNT],
    pub crossfade_seconds: u32,
    pub locale: String,
    pub np_channel_id: Option<u64>,
    /// Zero means unlimited.
    pub max_per_user: usize,
}

impl Default for GuildSettings {
    fn default() -> Self {
        Self {
            volume: 0.5,
            search_mode: SearchMode::Youtube,
            max_queue: 50,
            autoplay: false,
            filter_name: None,
            dj_role_id: None,
            stay_connected: false,
            speed: 1.0,
            normalize: false,
            loop_mode: LoopMode::Off,
            eq_bands: [0.0; EQ_BAND_COUNT],
            crossfade_seconds: 0,
            locale: "en".to_string(),
            np_channel_id: None,
            max_per_user: 0,
        }
    }
}

impl GuildSettings {
    /// True when any EQ band is boosted or cut.
    pub fn eq_active(&self) -> bool {
        self.eq_bands.iter().any(|gain| *gain != 0.0)
    }

    /// The ffmpeg filter inputs these settings describe.
    pub fn filter_settings(&self) -> FilterSettings {
        FilterSettings {
            filter: self.filter_name,
            eq_bands: self.eq_active().then_some(self.eq_bands),
            speed: self.speed,
            normalize: self.normalize,
        }
    }
}

/// Stored band lists may have any length; pad with zeros or truncate to exactly ten.
fn deserialize_eq_bands<'de, D>(deserializer: D) -> Result<[f32; EQ_BAND_COUNT], D::Error>
where
    D: Deserializer<'de>,
{
    let stored = Vec::<f32>::deserialize(deserializer)?;
    let mut bands = [0.0; EQ_BAND_COUNT];
    for (slot, gain) in bands.iter_mut().zip(stored) {
        *slot = gain;
    }
    Ok(bands)
}
