//! Builds the ffmpeg process that decodes a remote stream into raw PCM for songbird.

use crate::commands::music::utils::audio_filters::FilterSettings;

#[cfg(feature = "music")]
use crate::commands::music::utils::{MusicError, MusicResult};

/// Sample rate the voice driver mixes at.
pub const SAMPLE_RATE: u32 = 48_000;
pub const CHANNELS: u32 = 2;

/// One playback request: where to read from and how to shape the audio.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    pub source_url: String,
    pub seek_seconds: u64,
    pub filters: FilterSettings,
    pub is_live: bool,
}

impl StreamRequest {
    /// Arguments for `ffmpeg`, writing interleaved f32 PCM to stdout.
    pub fn ffmpeg_args(&self) -> Vec<String> {
        let mut args: Vec<String> = [
            "-hide_banner",
            "-loglevel",
            "error",
            "-reconnect",
            "1",
            "-reconnect_streamed",
            "1",
            "-reconnect_delay_max",
            "5",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        if self.seek_seconds > 0 && !self.is_live {
            args.push("-ss".into());
            args.push(self.seek_seconds.to_string());
        }

        args.push("-i".into());
        args.push(self.source_url.clone());
        args.push("-vn".into());

        if !self.is_live {
            if let Some(chain) = self.filters.chain() {
                args.push("-af".into());
                args.push(chain);
            }
        }

        args.extend([
            "-ar".to_string(),
            SAMPLE_RATE.to_string(),
            "-ac".to_string(),
            CHANNELS.to_string(),
            "-f".to_string(),
            "f32le".to_string(),
            "pipe:1".to_string(),
        ]);
        args
    }

    /// Spawn ffmpeg and wrap its stdout as a songbird input.
    #[cfg(feature = "music")]
    pub fn spawn_input(&self) -> MusicResult<songbird::input::Input> {
        use songbird::input::{ChildContainer, RawAdapter};
        use std::process::{Command, Stdio};
        use symphonia::core::io::ReadOnlySource;

        let child = Command::new("ffmpeg")
            .args(self.ffmpeg_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| MusicError::AudioSourceError(format!("Failed to start ffmpeg: {}", e)))?;

        let container = ChildContainer::from(child);
        Ok(RawAdapter::new(ReadOnlySource::new(container), SAMPLE_RATE, CHANNELS).into())
    }
}
