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
use serde::{Deserialize, Serialize};

/// Volume used when a sound definition leaves it out.
pub const DEFAULT_SOUND_VOLUME: f32 = 1.0;

/// A YAML representation of a named sound effect.
#[derive(Deserialize, Clone, Serialize, Debug, PartialEq)]
pub struct SoundDefinition {
    /// The wave file, relative to the config file's directory.
    file: String,

    /// Playback gain in [0, 1].
    volume: Option<f32>,

    /// Whether the sound loops until stopped.
    #[serde(default)]
    looping: bool,
}

impl SoundDefinition {
    pub fn new(file: &str, volume: Option<f32>, looping: bool) -> SoundDefinition {
        SoundDefinition {
            file: file.to_string(),
            volume,
            looping,
        }
    }

    /// Gets the wave file for this sound.
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Gets the playback volume, clamped to [0, 1].
    pub fn volume(&self) -> f32 {
        self.volume.unwrap_or(DEFAULT_SOUND_VOLUME).clamp(0.0, 1.0)
    }

    pub fn looping(&self) -> bool {
        self.looping
    }
}
