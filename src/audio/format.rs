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

use std::{fmt, str::FromStr, time::Duration};

use crate::error::EngineError;

/// Maximum number of output channels the mixer will produce.
pub const MAX_OUTPUT_CHANNELS: u16 = 2;

/// Sample format of the mixed output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// 16-bit signed integer samples.
    Int,
    /// 32-bit floating point samples.
    Float,
}

impl FromStr for SampleFormat {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "float" | "Float" | "f32" => Ok(SampleFormat::Float),
            "int" | "Int" | "i16" => Ok(SampleFormat::Int),
            _ => Err(EngineError::UnsupportedConfig(format!(
                "unsupported sample format: {}",
                s
            ))),
        }
    }
}

impl SampleFormat {
    /// Convert to string representation
    pub fn as_str(self) -> &'static str {
        match self {
            SampleFormat::Float => "float",
            SampleFormat::Int => "int",
        }
    }

    /// Size of a single sample in bytes.
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::Float => std::mem::size_of::<f32>(),
            SampleFormat::Int => std::mem::size_of::<i16>(),
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The interleaved PCM layout shared by the mixer, the ring buffer and the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Interleaved channel count (1 or 2)
    pub channels: u16,
    /// Sample format (integer or float)
    pub sample_format: SampleFormat,
}

impl OutputFormat {
    /// Creates a new OutputFormat
    pub fn new(
        sample_rate: u32,
        channels: u16,
        sample_format: SampleFormat,
    ) -> Result<Self, EngineError> {
        if sample_rate == 0 {
            return Err(EngineError::UnsupportedConfig(
                "sample rate must be greater than 0".into(),
            ));
        }
        if channels == 0 || channels > MAX_OUTPUT_CHANNELS {
            return Err(EngineError::UnsupportedConfig(format!(
                "{} output channels requested, only mono and stereo are supported",
                channels
            )));
        }

        Ok(OutputFormat {
            sample_rate,
            channels,
            sample_format,
        })
    }

    /// Bytes in one frame (one sample per channel).
    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * self.sample_format.bytes_per_sample()
    }

    /// Bytes in one second of audio.
    pub fn bytes_per_second(&self) -> usize {
        self.sample_rate as usize * self.bytes_per_frame()
    }

    /// Number of whole frames contained in the given byte count.
    pub fn bytes_to_frames(&self, bytes: usize) -> usize {
        bytes / self.bytes_per_frame()
    }

    /// Number of frames that cover the given duration, rounded down.
    pub fn frames_in(&self, duration: Duration) -> usize {
        (duration.as_secs_f64() * self.sample_rate as f64) as usize
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}Hz/{}ch/{}",
            self.sample_rate, self.channels, self.sample_format
        )
    }
}
