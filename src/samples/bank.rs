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
use std::collections::HashMap;

use super::buffer::SampleBuffer;

/// A loaded sound together with how it should be played.
#[derive(Clone, Debug)]
pub struct SoundBankEntry {
    buffer: SampleBuffer,
    volume: f32,
    looping: bool,
}

impl SoundBankEntry {
    pub fn new(buffer: SampleBuffer, volume: f32, looping: bool) -> SoundBankEntry {
        SoundBankEntry {
            buffer,
            volume,
            looping,
        }
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn looping(&self) -> bool {
        self.looping
    }
}

/// Named sounds loaded from the engine configuration.
#[derive(Clone, Debug, Default)]
pub struct SoundBank {
    entries: HashMap<String, SoundBankEntry>,
}

impl SoundBank {
    pub fn new(entries: HashMap<String, SoundBankEntry>) -> SoundBank {
        SoundBank { entries }
    }

    /// Looks up a sound by name.
    pub fn get(&self, name: &str) -> Option<&SoundBankEntry> {
        self.entries.get(name)
    }

    /// Sound names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
