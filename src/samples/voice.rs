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

//! Voice management for sound effect playback.
//!
//! The pool is a fixed set of slots allocated once. A request that finds no
//! free slot is dropped; playing voices are never evicted.

use tracing::{debug, warn};

use super::buffer::SampleBuffer;

/// One playing instance of a sample buffer.
#[derive(Clone, Default)]
pub struct Voice {
    /// The sample data being played. `None` for a slot that was never used.
    buffer: Option<SampleBuffer>,
    /// Next sample to be heard, in samples.
    position: usize,
    /// Whether playback wraps back to the start.
    looping: bool,
    /// Gain in [0, 1].
    volume: f32,
}

impl Voice {
    /// Returns true while the voice still has samples to play.
    pub fn is_active(&self) -> bool {
        self.buffer
            .as_ref()
            .is_some_and(|buffer| self.position < buffer.len())
    }

    /// Resets this slot to play `buffer` from the start.
    fn start(&mut self, buffer: &SampleBuffer, volume: f32, looping: bool) {
        self.buffer = Some(buffer.clone());
        self.position = 0;
        self.looping = looping;
        self.volume = volume.clamp(0.0, 1.0);
    }

    /// Releases the slot.
    fn stop(&mut self) {
        if let Some(buffer) = &self.buffer {
            self.position = buffer.len();
        }
        self.looping = false;
    }

    /// Moves the cursor forward by the number of samples the device played.
    pub fn advance(&mut self, samples: usize) {
        let Some(buffer) = &self.buffer else {
            return;
        };
        let count = buffer.len();
        if count == 0 {
            return;
        }

        if self.looping {
            self.position = ((self.position % count) + samples % count) % count;
        } else {
            self.position = self.position.saturating_add(samples).min(count);
        }
    }

    /// Adds this voice into interleaved `output` starting at the current cursor,
    /// writing the same sample to every channel. The stored cursor is left alone.
    /// Returns the number of frames contributed.
    pub fn mix_into(&self, output: &mut [f32], channels: usize) -> usize {
        let Some(buffer) = &self.buffer else {
            return 0;
        };
        let count = buffer.len();
        let mut position = self.position;
        let mut mixed = 0;

        for frame in output.chunks_exact_mut(channels) {
            if self.looping {
                if position == count {
                    position = 0;
                }
            } else if position >= count {
                // The rest of the buffer stays silent for this voice.
                break;
            }

            let sample = buffer.sample_f32(position) * self.volume;
            position += 1;
            for out in frame.iter_mut() {
                *out += sample;
            }
            mixed += 1;
        }

        mixed
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn buffer(&self) -> Option<&SampleBuffer> {
        self.buffer.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn set_position(&mut self, position: usize) {
        self.position = position;
    }
}

/// Fixed-size set of voice slots.
pub struct VoicePool {
    voices: Box<[Voice]>,
}

impl VoicePool {
    /// Creates a pool with `size` slots (at least one).
    pub fn new(size: usize) -> Self {
        Self {
            voices: vec![Voice::default(); size.max(1)].into_boxed_slice(),
        }
    }

    /// Starts `buffer` on the first free slot and returns the slot index.
    /// When every slot is busy the request is dropped and `None` is returned.
    pub fn play_sound(
        &mut self,
        buffer: &SampleBuffer,
        volume: f32,
        looping: bool,
    ) -> Option<usize> {
        match self.voices.iter().position(|voice| !voice.is_active()) {
            Some(slot) => {
                self.voices[slot].start(buffer, volume, looping);
                debug!(slot, samples = buffer.len(), looping, "Voice started");
                Some(slot)
            }
            None => {
                warn!(
                    max_voices = self.voices.len(),
                    "No free voice slot, dropping sound"
                );
                None
            }
        }
    }

    /// Advances every active voice by `samples`.
    pub fn advance(&mut self, samples: usize) {
        if samples == 0 {
            return;
        }
        for voice in self.voices.iter_mut().filter(|voice| voice.is_active()) {
            voice.advance(samples);
        }
    }

    /// Returns the active voices.
    pub fn iter_active(&self) -> impl Iterator<Item = &Voice> {
        self.voices.iter().filter(|voice| voice.is_active())
    }

    /// Returns the current number of active voices.
    pub fn active_count(&self) -> usize {
        self.iter_active().count()
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.voices.len()
    }

    pub fn voice(&self, slot: usize) -> Option<&Voice> {
        self.voices.get(slot)
    }

    /// Stops the voice in `slot`, freeing it for reuse.
    pub fn stop(&mut self, slot: usize) {
        if let Some(voice) = self.voices.get_mut(slot) {
            voice.stop();
        }
    }

    /// Stops every voice.
    pub fn stop_all(&mut self) {
        self.voices.iter_mut().for_each(Voice::stop);
    }

    #[cfg(test)]
    pub(crate) fn voice_mut(&mut self, slot: usize) -> &mut Voice {
        &mut self.voices[slot]
    }
}

/// Length of `buffer` in seconds at `sample_rate`.
pub fn sound_length(buffer: &SampleBuffer, sample_rate: u32) -> f32 {
    if sample_rate == 0 {
        return 0.0;
    }
    buffer.len() as f32 / sample_rate as f32
}

impl std::fmt::Debug for VoicePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoicePool")
            .field("active_voices", &self.active_count())
            .field("max_voices", &self.voices.len())
            .finish()
    }
}
