//! ffmpeg filter expressions for effects, EQ, speed and loudness normalization.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const EQ_BAND_COUNT: usize = 10;
/// Centre frequencies of the ten EQ bands, in Hz.
pub const EQ_FREQUENCIES: [u32; EQ_BAND_COUNT] = [31, 62, 125, 250, 500, 1000, 2000, 4000, 8000, 16000];
pub const EQ_MAX_GAIN: f32 = 12.0;

/// Named effects selectable with `/filter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFilter {
    Bassboost,
    Nightcore,
    Vaporwave,
    #[serde(rename = "8d")]
    EightD,
    Karaoke,
}

impl AudioFilter {
    pub const ALL: [AudioFilter; 5] = [
        AudioFilter::Bassboost,
        AudioFilter::Nightcore,
        AudioFilter::Vaporwave,
        AudioFilter::EightD,
        AudioFilter::Karaoke,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AudioFilter::Bassboost => "bassboost",
            AudioFilter::Nightcore => "nightcore",
            AudioFilter::Vaporwave => "vaporwave",
            AudioFilter::EightD => "8d",
            AudioFilter::Karaoke => "karaoke",
        }
    }

    pub fn expression(self) -> &'static str {
        match self {
            AudioFilter::Bassboost => "bass=g=10,dynaudnorm=f=200",
            AudioFilter::Nightcore => "asetrate=48000*1.25,aresample=48000",
            AudioFilter::Vaporwave => "asetrate=48000*0.8,aresample=48000",
            AudioFilter::EightD => "apulsator=hz=0.08",
            AudioFilter::Karaoke => "pan=stereo|c0=c0-c1|c1=c1-c0",
        }
    }
}

impl fmt::Display for AudioFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AudioFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AudioFilter::ALL
            .into_iter()
            .find(|filter| filter.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown filter: {}", s))
    }
}

/// Built-in EQ curves for `/eq`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum EqPreset {
    #[name = "Flat"]
    Flat,
    #[name = "Bass Heavy"]
    BassHeavy,
    #[name = "Treble Heavy"]
    TrebleHeavy,
    #[name = "Vocal"]
    Vocal,
    #[name = "Electronic"]
    Electronic,
}

impl EqPreset {
    pub fn key(self) -> &'static str {
        match self {
            EqPreset::Flat => "flat",
            EqPreset::BassHeavy => "bass_heavy",
            EqPreset::TrebleHeavy => "treble_heavy",
            EqPreset::Vocal => "vocal",
            EqPreset::Electronic => "electronic",
        }
    }

    pub fn bands(self) -> [f32; EQ_BAND_COUNT] {
        match self {
            EqPreset::Flat => [0.0; EQ_BAND_COUNT],
            EqPreset::BassHeavy => [6.0, 5.0, 4.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            EqPreset::TrebleHeavy => [0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 4.0, 5.0, 6.0],
            EqPreset::Vocal => [-2.0, -1.0, 0.0, 2.0, 4.0, 4.0, 2.0, 0.0, -1.0, -2.0],
            EqPreset::Electronic => [5.0, 4.0, 1.0, 0.0, -2.0, 2.0, 1.0, 2.0, 4.0, 5.0],
        }
    }
}

/// Human label for a band, e.g. `1kHz` or `62Hz`.
pub fn band_label(index: usize) -> String {
    match EQ_FREQUENCIES.get(index) {
        Some(freq) if *freq >= 1000 => format!("{}kHz", freq / 1000),
        Some(freq) => format!("{}Hz", freq),
        None => "?".to_string(),
    }
}

/// Everything that shapes the ffmpeg `-af` chain.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterSettings {
    pub filter: Option<AudioFilter>,
    pub eq_bands: Option<[f32; EQ_BAND_COUNT]>,
    pub speed: f32,
    pub normalize: bool,
}

impl FilterSettings {
    /// Join the configured stages into one `-af` expression: effect, EQ, tempo, loudness.
    pub fn chain(&self) -> Option<String> {
        let mut stages: Vec<String> = Vec::new();

        if let Some(filter) = self.filter {
            stages.push(filter.expression().to_string());
        }

        if let Some(bands) = self.eq_bands {
            stages.extend(
                bands
                    .iter()
                    .zip(EQ_FREQUENCIES)
                    .filter(|(gain, _)| **gain != 0.0)
                    .map(|(gain, freq)| {
                        format!("equalizer=f={}:width_type=o:width=1:g={}", freq, gain)
                    }),
            );
        }

        if (self.speed - 1.0).abs() > f32::EPSILON && self.speed > 0.0 {
            stages.push(format!("atempo={}", self.speed));
        }

        if self.normalize {
            stages.push("loudnorm=I=-16:TP=-1.5:LRA=11".to_string());
        }

        if stages.is_empty() {
            None
        } else {
            Some(stages.join(","))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Filter names parse case-insensitively and round-trip through their display names.
    #[test]
    fn test_filter_names() {
        assert_eq!("8D".parse::<AudioFilter>(), Ok(AudioFilter::EightD));
        assert_eq!("Nightcore".parse::<AudioFilter>(), Ok(AudioFilter::Nightcore));
        assert!("none".parse::<AudioFilter>().is_err());
        assert_eq!(serde_json::to_string(&AudioFilter::EightD).unwrap(), "\"8d\"");
    }

    /// Default settings produce no filter chain at all.
    #[test]
    fn test_empty_chain() {
        let settings = FilterSettings {
            speed: 1.0,
            ..Default::default()
        };
        assert_eq!(settings.chain(), None);
    }

    /// Stages appear in a fixed order and flat EQ bands are skipped.
    #[test]
    fn test_full_chain_order() {
        let mut bands = [0.0; EQ_BAND_COUNT];
        bands[0] = 6.0;
        bands[5] = -3.5;
        let settings = FilterSettings {
            filter: Some(AudioFilter::Bassboost),
            eq_bands: Some(bands),
            speed: 1.5,
            normalize: true,
        };

        assert_eq!(
            settings.chain().unwrap(),
            "bass=g=10,dynaudnorm=f=200,\
             equalizer=f=31:width_type=o:width=1:g=6,\
             equalizer=f=1000:width_type=o:width=1:g=-3.5,\
             atempo=1.5,\
             loudnorm=I=-16:TP=-1.5:LRA=11"
        );
    }

    #[test]
    fn test_band_labels() {
        assert_eq!(band_label(0), "31Hz");
        assert_eq!(band_label(5), "1kHz");
        assert_eq!(band_label(9), "16kHz");
    }
}
