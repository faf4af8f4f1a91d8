use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BLOCK_FRAMES, DEFAULT_CHANNELS, DEFAULT_MAX_VOICES, DEFAULT_SAMPLE_RATE, MAX_CHANNELS,
    MAX_VOICES,
};
use crate::error::PlaybackError;

/// Output format and sizing of an [`super::Engine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub channels: u16,
    pub sample_rate: u32,
    pub max_voices: usize,
    /// Frames rendered per block by the output adapter.
    pub block_frames: usize,
    pub global_volume: f32,
}

impl EngineSettings {
    pub fn new(channels: u16, sample_rate: u32) -> Self {
        Self {
            channels,
            sample_rate,
            ..Self::default()
        }
    }

    /// Interleaved samples in one render block.
    pub fn block_samples(&self) -> usize {
        self.block_frames.max(1) * self.channels.max(1) as usize
    }

    /// Parse settings from JSON; absent fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub(crate) fn validate(&self) -> Result<(), PlaybackError> {
        if self.channels < 1 || self.channels > MAX_CHANNELS {
            return Err(PlaybackError::InvalidParameter);
        }
        if self.sample_rate == 0 {
            return Err(PlaybackError::InvalidParameter);
        }
        if self.max_voices == 0 || self.max_voices > MAX_VOICES {
            return Err(PlaybackError::InvalidParameter);
        }
        Ok(())
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            channels: DEFAULT_CHANNELS,
            sample_rate: DEFAULT_SAMPLE_RATE,
            max_voices: DEFAULT_MAX_VOICES,
            block_frames: DEFAULT_BLOCK_FRAMES,
            global_volume: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let settings =
            EngineSettings::from_json(r#"{"channels":1,"sample_rate":48000}"#).expect("deserialize");
        assert_eq!(settings.channels, 1);
        assert_eq!(settings.sample_rate, 48_000);
        assert_eq!(settings.max_voices, DEFAULT_MAX_VOICES);
        assert_eq!(settings.block_frames, DEFAULT_BLOCK_FRAMES);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(EngineSettings::new(0, 44_100).validate().is_err());
        assert!(EngineSettings::new(MAX_CHANNELS + 1, 44_100).validate().is_err());
        assert!(EngineSettings::new(2, 0).validate().is_err());

        let mut settings = EngineSettings::default();
        settings.max_voices = MAX_VOICES + 1;
        assert_eq!(settings.validate(), Err(PlaybackError::InvalidParameter));
    }

    #[test]
    fn json_output_parses_back() {
        let mut settings = EngineSettings::new(1, 8_000);
        settings.global_volume = 0.5;
        let json = settings.to_json_pretty().expect("serialize");
        assert!(json.contains("\"block_frames\""));
        assert_eq!(EngineSettings::from_json(&json).expect("deserialize"), settings);
    }

    #[test]
    fn block_samples_is_interleaved() {
        let mut settings = EngineSettings::new(2, 44_100);
        settings.block_frames = 256;
        assert_eq!(settings.block_samples(), 512);
    }
}
