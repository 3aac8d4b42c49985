//! Config sections. Every field has a serde default so partial files load.

use chordchain::{KeyMode, PolicyKind, TrackMode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How pieces are turned into a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Chords of context per transition.
    /// Default: 2
    #[serde(default = "ModelConfig::default_order")]
    pub order: usize,

    /// Default: raw
    #[serde(default)]
    pub keying: KeyMode,

    /// Default: merge
    #[serde(default)]
    pub track_mode: TrackMode,
}

impl ModelConfig {
    fn default_order() -> usize {
        2
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            order: Self::default_order(),
            keying: KeyMode::default(),
            track_mode: TrackMode::default(),
        }
    }
}

/// Random walk settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateConfig {
    /// Chords to produce, seed included.
    /// Default: 100
    #[serde(default = "GenerateConfig::default_length")]
    pub length: usize,

    /// RNG seed. Unset means a fresh seed per run.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Default: reference
    #[serde(default)]
    pub policy: PolicyKind,
}

impl GenerateConfig {
    fn default_length() -> usize {
        100
    }
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            length: Self::default_length(),
            seed: None,
            policy: PolicyKind::default(),
        }
    }
}

/// Exported MIDI file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default: gen/gen.mid
    #[serde(default = "OutputConfig::default_path")]
    pub path: PathBuf,

    #[serde(default = "OutputConfig::default_velocity")]
    pub velocity: u8,

    /// General MIDI program. Default: 0 (piano)
    #[serde(default)]
    pub program: u8,

    #[serde(default)]
    pub channel: u8,

    #[serde(default = "OutputConfig::default_tempo_bpm")]
    pub tempo_bpm: f64,
}

impl OutputConfig {
    fn default_path() -> PathBuf {
        PathBuf::from("gen/gen.mid")
    }

    fn default_velocity() -> u8 {
        100
    }

    fn default_tempo_bpm() -> f64 {
        120.0
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
            velocity: Self::default_velocity(),
            program: 0,
            channel: 0,
            tempo_bpm: Self::default_tempo_bpm(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive.
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}
