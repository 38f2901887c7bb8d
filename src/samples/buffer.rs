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
use std::sync::Arc;
use std::time::Duration;

/// Scale factor from a 16-bit sample to the [-1.0, 1.0) float range.
pub const I16_TO_F32: f32 = 1.0 / 32768.0;

/// Immutable mono 16-bit PCM at the engine sample rate.
/// The sample data is stored in an Arc so any number of voices can share it.
#[derive(Clone)]
pub struct SampleBuffer {
    samples: Arc<[i16]>,
    sample_rate: u32,
}

impl SampleBuffer {
    /// Creates a new sample buffer from mono samples.
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The sample rate the data was rendered at.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Returns the sample at `index` as a float.
    #[inline]
    pub fn sample_f32(&self, index: usize) -> f32 {
        self.samples[index] as f32 * I16_TO_F32
    }

    /// Playback length in seconds.
    pub fn seconds(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Playback length.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        std::mem::size_of_val(&*self.samples)
    }

    /// Returns true if both buffers share the same storage.
    pub fn ptr_eq(&self, other: &SampleBuffer) -> bool {
        Arc::ptr_eq(&self.samples, &other.samples)
    }
}

impl std::fmt::Debug for SampleBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleBuffer")
            .field("samples", &self.samples.len())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_and_memory() {
        let buffer = SampleBuffer::new(vec![0; 24000], 48000);
        assert_eq!(buffer.len(), 24000);
        assert_eq!(buffer.seconds(), 0.5);
        assert_eq!(buffer.duration(), Duration::from_millis(500));
        assert_eq!(buffer.memory_size(), 48000);
    }

    #[test]
    fn test_clones_share_storage() {
        let buffer = SampleBuffer::new(vec![1, 2, 3], 48000);
        let clone = buffer.clone();
        assert!(buffer.ptr_eq(&clone));
        assert!(!buffer.ptr_eq(&SampleBuffer::new(vec![1, 2, 3], 48000)));
    }

    #[test]
    fn test_sample_scaling() {
        let buffer = SampleBuffer::new(vec![i16::MIN, 0, 16384], 48000);
        assert_eq!(buffer.sample_f32(0), -1.0);
        assert_eq!(buffer.sample_f32(1), 0.0);
        assert_eq!(buffer.sample_f32(2), 0.5);
    }
}
