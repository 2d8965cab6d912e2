use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration structure for the player.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub audio: AudioConfig,
    pub schedule: ScheduleConfig,
}

impl PlayerConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

/// Configuration specific to the audio subsystem and the analyser taps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Frames rendered per pull from the output device.
    pub block_size: usize,
    /// Analysis window length; yields `fft_size / 2` frequency bins.
    pub fft_size: usize,
    /// Time constant blending the previous spectrum into the next one.
    pub smoothing: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            block_size: 1024,
            fft_size: 256,
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

/// Timing knobs for transport start and MIDI event dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Delay between a start request and the shared start instant, in seconds.
    pub start_lookahead: f64,
    /// How far past the current position events are considered due.
    pub event_lookahead: f64,
    /// Tempo used when the manifest does not declare one.
    pub default_bpm: f64,
    /// Honour tempo meta-events embedded in event tracks.
    pub apply_tempo_events: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            start_lookahead: 0.05,
            event_lookahead: 0.1,
            default_bpm: crate::assets::DEFAULT_BPM,
            apply_tempo_events: false,
        }
    }
}
