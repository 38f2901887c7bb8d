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
// Renders the voice pool into the ring once per game frame.
use std::{fmt, str::FromStr, time::Duration};

use super::format::{OutputFormat, SampleFormat};
use super::ring_buffer::RingBuffer;
use crate::error::EngineError;
use crate::samples::VoicePool;

/// Default amount of audio rendered ahead of the device on every pass.
pub const DEFAULT_MIX_AHEAD: Duration = Duration::from_millis(100);

/// What happens to a mixed sum that leaves the [-1.0, 1.0] range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LimitMode {
    /// Hard-limit the sum to [-1.0, 1.0].
    #[default]
    Clamp,
    /// Leave the sum alone. Integer output still saturates.
    None,
}

impl FromStr for LimitMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clamp" | "Clamp" => Ok(LimitMode::Clamp),
            "none" | "None" | "off" => Ok(LimitMode::None),
            _ => Err(EngineError::UnsupportedConfig(format!(
                "unsupported limit mode: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for LimitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitMode::Clamp => write!(f, "clamp"),
            LimitMode::None => write!(f, "none"),
        }
    }
}

/// Outcome of a single mixer pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MixReport {
    /// Frames rendered into the ring.
    pub frames_written: usize,
    /// Frames the device played since the previous pass.
    pub play_frames: usize,
    /// Voices still playing after the pass.
    pub active_voices: usize,
}

/// Sums active voices into interleaved output frames.
///
/// Scratch space is sized once in `new`, so `run` never allocates.
pub struct Mixer {
    format: OutputFormat,
    limit: LimitMode,
    /// Frames rendered per pass, before clipping to the writable region.
    mix_frames: usize,
    scratch: Vec<f32>,
    encoded: Vec<i16>,
}

impl Mixer {
    /// Creates a mixer that renders `mix_ahead` of audio per pass.
    pub fn new(format: OutputFormat, mix_ahead: Duration, limit: LimitMode) -> Mixer {
        let mix_frames = format.frames_in(mix_ahead).max(1);
        let samples = mix_frames * format.channels as usize;
        let encoded = match format.sample_format {
            SampleFormat::Int => vec![0; samples],
            SampleFormat::Float => Vec::new(),
        };

        Mixer {
            format,
            limit,
            mix_frames,
            scratch: vec![0.0; samples],
            encoded,
        }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn limit(&self) -> LimitMode {
        self.limit
    }

    /// Frames rendered per pass when the ring has room.
    pub fn mix_frames(&self) -> usize {
        self.mix_frames
    }

    /// Runs one pass: advances voices by what the device played, then renders
    /// up to `mix_frames` frames after the consumer's claim and commits them.
    pub fn run(&mut self, ring: &RingBuffer, pool: &mut VoicePool) -> MixReport {
        let bytes_per_frame = self.format.bytes_per_frame();
        let channels = self.format.channels as usize;

        let mut region = ring.begin_write();
        let frames = self.mix_frames.min(region.len() / bytes_per_frame);
        let play_frames = region.play_count() / bytes_per_frame;

        pool.advance(play_frames);

        let output = &mut self.scratch[..frames * channels];
        output.fill(0.0);
        for voice in pool.iter_active() {
            voice.mix_into(output, channels);
        }

        if self.limit == LimitMode::Clamp {
            for sample in output.iter_mut() {
                *sample = sample.clamp(-1.0, 1.0);
            }
        }

        let bytes: &[u8] = match self.format.sample_format {
            SampleFormat::Float => bytemuck::cast_slice(output),
            SampleFormat::Int => {
                let encoded = &mut self.encoded[..output.len()];
                for (out, &sample) in encoded.iter_mut().zip(output.iter()) {
                    *out = f32_to_i16(sample);
                }
                bytemuck::cast_slice(encoded)
            }
        };
        let written = region.write(0, bytes);
        ring.commit_write(region, written);

        MixReport {
            frames_written: written / bytes_per_frame,
            play_frames,
            active_voices: pool.active_count(),
        }
    }
}

/// Converts a float sample to 16 bits, saturating instead of wrapping.
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

impl fmt::Debug for Mixer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mixer")
            .field("format", &self.format)
            .field("limit", &self.limit)
            .field("mix_frames", &self.mix_frames)
            .finish()
    }
}
