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
use std::io;
use std::path::PathBuf;

use crate::config::error::ConfigError;

/// Errors raised while turning an asset into a sample buffer. These are content
/// defects: callers are expected to treat them as fatal at load time.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to load {}: {source}", path.display())]
    Asset {
        path: PathBuf,
        source: Box<LoadError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed wave data: {0}")]
    Malformed(String),

    #[error("Unsupported sample format: {bits}-bit {kind} (only 16-bit integer PCM is supported)")]
    UnsupportedFormat { bits: u16, kind: &'static str },

    #[error("Unsupported sample rate: {source_rate}Hz is above the engine rate of {engine_rate}Hz")]
    UnsupportedRate { source_rate: u32, engine_rate: u32 },

    #[error("Unsupported wave encoding")]
    UnsupportedEncoding,
}

impl LoadError {
    /// Attaches the asset path to an error.
    pub fn at(self, path: impl Into<PathBuf>) -> LoadError {
        LoadError::Asset {
            path: path.into(),
            source: Box::new(self),
        }
    }
}

impl From<hound::Error> for LoadError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::FormatError(reason) => LoadError::Malformed(reason.to_string()),
            hound::Error::IoError(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                LoadError::Malformed("unexpected end of data (missing or truncated chunk)".into())
            }
            hound::Error::IoError(e) => LoadError::Io(e),
            hound::Error::Unsupported => LoadError::UnsupportedEncoding,
            other => LoadError::Malformed(other.to_string()),
        }
    }
}

/// Errors raised while bringing up or tearing down the engine and its device.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("No audio device found with name {0}")]
    NoDevice(String),

    #[error("Unsupported output configuration: {0}")]
    UnsupportedConfig(String),

    #[error("Audio backend error: {0}")]
    Backend(String),

    #[error("Audio stream error: {0}")]
    Stream(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
