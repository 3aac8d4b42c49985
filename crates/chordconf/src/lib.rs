//! Layered configuration for chordchain tools.
//!
//! # Usage
//!
//! ```rust,no_run
//! use chordconf::ChordConfig;
//!
//! let config = ChordConfig::load().expect("Failed to load config");
//! println!("order {} over {} chords", config.model.order, config.generate.length);
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/chordchain/config.toml` (system)
//! 2. `~/.config/chordchain/config.toml` (user)
//! 3. `./chordchain.toml` (local override), or the path passed to
//!    [`ChordConfig::load_from`]
//! 4. Environment variables (`CHORDCHAIN_*`, `RUST_LOG`)
//!
//! Files are merged key by key, so a local file can change one value and
//! inherit the rest.
//!
//! # Example Config
//!
//! ```toml
//! [model]
//! order = 3
//! keying = "canonical"
//! track_mode = "merge"
//!
//! [generate]
//! length = 256
//! seed = 7
//! policy = "backoff"
//!
//! [output]
//! path = "~/music/gen/chords.mid"
//! velocity = 90
//! program = 19
//!
//! [telemetry]
//! log_level = "debug"
//! ```

pub mod loader;
pub mod sections;

pub use loader::{discover_config_files_with_override, ConfigSources};
pub use sections::{GenerateConfig, ModelConfig, OutputConfig, TelemetryConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete chordchain configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ChordConfig {
    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub generate: GenerateConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl ChordConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load with `config_path` standing in for `./chordchain.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let files = loader::discover_config_files_with_override(config_path);
        let (mut config, mut sources) = loader::load_files(&files)?;
        loader::apply_env_overrides(&mut config, &mut sources);
        Ok((config, sources))
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        let mut output = String::new();

        output.push_str("# chordchain configuration\n\n");

        output.push_str("[model]\n");
        output.push_str(&format!("order = {}\n", self.model.order));
        output.push_str(&format!("keying = \"{}\"\n", self.model.keying));
        output.push_str(&format!("track_mode = \"{}\"\n", self.model.track_mode));

        output.push_str("\n[generate]\n");
        output.push_str(&format!("length = {}\n", self.generate.length));
        match self.generate.seed {
            Some(seed) => output.push_str(&format!("seed = {}\n", seed)),
            None => output.push_str("# seed = 0\n"),
        }
        output.push_str(&format!("policy = \"{}\"\n", self.generate.policy));

        output.push_str("\n[output]\n");
        output.push_str(&format!("path = \"{}\"\n", self.output.path.display()));
        output.push_str(&format!("velocity = {}\n", self.output.velocity));
        output.push_str(&format!("program = {}\n", self.output.program));
        output.push_str(&format!("channel = {}\n", self.output.channel));
        output.push_str(&format!("tempo_bpm = {:?}\n", self.output.tempo_bpm));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!("log_level = \"{}\"\n", self.telemetry.log_level));

        output
    }
}
