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

//! Sound loading and caching.
//!
//! Sounds are decoded entirely into memory at load time so playback never
//! touches the filesystem.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::bank::{SoundBank, SoundBankEntry};
use super::buffer::SampleBuffer;
use super::wave;
use crate::config::SoundDefinition;
use crate::error::LoadError;

/// Manages loading and caching of sound data.
pub struct SampleLoader {
    /// Cache of loaded sounds by canonical file path.
    cache: HashMap<PathBuf, SampleBuffer>,
    /// Engine sample rate every sound is resampled to.
    engine_rate: u32,
}

impl SampleLoader {
    /// Creates a new sample loader.
    pub fn new(engine_rate: u32) -> Self {
        Self {
            cache: HashMap::new(),
            engine_rate,
        }
    }

    /// Loads a sound from a file into memory.
    /// Returns a cached version if already loaded.
    pub fn load(&mut self, path: &Path) -> Result<SampleBuffer, LoadError> {
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if let Some(buffer) = self.cache.get(&key) {
            debug!(path = ?path, "Using cached sound");
            return Ok(buffer.clone());
        }

        let buffer = wave::load(path, self.engine_rate)?;

        info!(
            path = ?path,
            sample_rate = buffer.sample_rate(),
            duration_ms = buffer.duration().as_millis(),
            memory_kb = buffer.memory_size() / 1024,
            "Sound loaded"
        );

        self.cache.insert(key, buffer.clone());
        Ok(buffer)
    }

    /// Loads every sound in a bank definition. Relative files are resolved
    /// against `base_path`. The first failure aborts the load.
    pub fn load_bank(
        &mut self,
        sounds: &HashMap<String, SoundDefinition>,
        base_path: &Path,
    ) -> Result<SoundBank, LoadError> {
        let mut entries = HashMap::with_capacity(sounds.len());

        for (name, definition) in sounds {
            let full_path = if Path::new(definition.file()).is_absolute() {
                PathBuf::from(definition.file())
            } else {
                base_path.join(definition.file())
            };

            let buffer = match self.load(&full_path) {
                Ok(buffer) => buffer,
                Err(e) => {
                    warn!(sound = name, error = %e, "Failed to load sound");
                    return Err(e);
                }
            };
            entries.insert(
                name.clone(),
                SoundBankEntry::new(buffer, definition.volume(), definition.looping()),
            );
        }

        Ok(SoundBank::new(entries))
    }

    /// Number of cached sounds.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Returns the total memory used by cached sounds.
    pub fn total_memory_usage(&self) -> usize {
        self.cache.values().map(SampleBuffer::memory_size).sum()
    }
}

impl std::fmt::Debug for SampleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleLoader")
            .field("cached_sounds", &self.cache.len())
            .field("engine_rate", &self.engine_rate)
            .field("total_memory_kb", &(self.total_memory_usage() / 1024))
            .finish()
    }
}
