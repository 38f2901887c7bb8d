// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use config::{Config, Environment, File, FileFormat};
use duration_string::DurationString;
use serde::Deserialize;

use super::error::ConfigError;
use super::sounds::SoundDefinition;
use crate::audio::mixer::DEFAULT_MIX_AHEAD;
use crate::audio::ring_buffer::MIN_RING_BUFFER_SIZE;
use crate::audio::{LimitMode, OutputFormat, SampleFormat};

const DEFAULT_DEVICE: &str = "default";
const DEFAULT_SAMPLE_RATE: u32 = 48000;
const DEFAULT_CHANNELS: u16 = 2;
const DEFAULT_MAX_VOICES: usize = 16;

/// Prefix for environment overrides, e.g. TETROMIX_DEVICE=mock.
const ENV_PREFIX: &str = "TETROMIX";

/// A YAML representation of the engine configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct EngineConfig {
    /// The output device name. `default` picks the system default, names
    /// starting with `mock` pick the mock device.
    device: Option<String>,

    /// Engine sample rate in Hz (default: 48000). Every loaded sound is
    /// resampled to this rate.
    sample_rate: Option<u32>,

    /// Output channels, 1 or 2 (default: 2).
    channels: Option<u16>,

    /// Output sample format, "float" or "int" (default: "float").
    sample_format: Option<String>,

    /// Maximum concurrent voices (default: 16).
    max_voices: Option<usize>,

    /// Lower bound on the ring buffer size in bytes (default: 64KiB).
    min_ring_buffer_size: Option<usize>,

    /// Audio rendered ahead of the device on each mixer pass (default: 100ms).
    mix_ahead: Option<String>,

    /// Fixed device callback size in frames. When unset the backend decides.
    stream_buffer_size: Option<u32>,

    /// Limiting applied to the mixed sum, "clamp" or "none" (default: "clamp").
    limit: Option<String>,

    /// Named sound effects loaded as a bank.
    #[serde(default)]
    sounds: HashMap<String, SoundDefinition>,

    /// Directory that relative sound paths are resolved against.
    #[serde(skip)]
    base_path: Option<PathBuf>,
}

impl EngineConfig {
    /// New will create a new engine configuration for the given device with
    /// every other setting at its default.
    pub fn new(device: &str) -> EngineConfig {
        EngineConfig {
            device: Some(device.to_string()),
            sample_rate: None,
            channels: None,
            sample_format: None,
            max_voices: None,
            min_ring_buffer_size: None,
            mix_ahead: None,
            stream_buffer_size: None,
            limit: None,
            sounds: HashMap::new(),
            base_path: None,
        }
    }

    /// Parses a configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<EngineConfig, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize()?)
    }

    /// Loads a configuration file, applying TETROMIX_* environment overrides.
    pub fn load(path: &Path) -> Result<EngineConfig, ConfigError> {
        let mut config: EngineConfig = Config::builder()
            .add_source(File::from(path))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;
        config.base_path = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        self.device.as_deref().unwrap_or(DEFAULT_DEVICE)
    }

    /// Returns the engine sample rate (default: 48000).
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Returns the output channel count (default: 2).
    pub fn channels(&self) -> u16 {
        self.channels.unwrap_or(DEFAULT_CHANNELS)
    }

    /// Returns the output sample format (default: Float).
    pub fn sample_format(&self) -> Result<SampleFormat, ConfigError> {
        match self.sample_format.as_deref() {
            Some(format) => {
                SampleFormat::from_str(format).map_err(|e| ConfigError::invalid("sample_format", e))
            }
            None => Ok(SampleFormat::Float),
        }
    }

    /// Returns the requested output format.
    pub fn output_format(&self) -> Result<OutputFormat, ConfigError> {
        OutputFormat::new(self.sample_rate(), self.channels(), self.sample_format()?)
            .map_err(|e| ConfigError::invalid("channels", e))
    }

    /// Returns the voice pool size (default: 16, at least 1).
    pub fn max_voices(&self) -> usize {
        self.max_voices.unwrap_or(DEFAULT_MAX_VOICES).max(1)
    }

    /// Returns the minimum ring buffer size in bytes.
    pub fn min_ring_buffer_size(&self) -> usize {
        self.min_ring_buffer_size.unwrap_or(MIN_RING_BUFFER_SIZE)
    }

    /// Returns how far ahead of the device the mixer renders (default: 100ms).
    pub fn mix_ahead(&self) -> Result<Duration, ConfigError> {
        let mix_ahead: Duration = match &self.mix_ahead {
            Some(mix_ahead) => DurationString::from_string(mix_ahead.clone())
                .map_err(|e| ConfigError::invalid("mix_ahead", e))?
                .into(),
            None => DEFAULT_MIX_AHEAD,
        };
        if mix_ahead.is_zero() {
            return Err(ConfigError::invalid("mix_ahead", "must be greater than 0"));
        }
        Ok(mix_ahead)
    }

    /// Returns the stream buffer size in frames, if fixed.
    pub fn stream_buffer_size(&self) -> Option<u32> {
        self.stream_buffer_size
    }

    /// Returns the limit mode (default: Clamp).
    pub fn limit(&self) -> Result<LimitMode, ConfigError> {
        match self.limit.as_deref() {
            Some(limit) => LimitMode::from_str(limit).map_err(|e| ConfigError::invalid("limit", e)),
            None => Ok(LimitMode::default()),
        }
    }

    /// Returns the configured sound bank.
    pub fn sounds(&self) -> &HashMap<String, SoundDefinition> {
        &self.sounds
    }

    /// Returns the directory sound files are resolved against.
    pub fn base_path(&self) -> &Path {
        self.base_path.as_deref().unwrap_or(Path::new("."))
    }
}
