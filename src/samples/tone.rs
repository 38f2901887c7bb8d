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
use std::f32::consts::PI;

use super::buffer::SampleBuffer;

/// Phase step per sample for the test tone: 600Hz at 48kHz.
pub const DEFAULT_TONE_STEP: f32 = PI * 0.025;

/// Volume of the test tone.
pub const DEFAULT_TONE_VOLUME: f32 = 0.5;

/// Synthesizes a sine tone at `sample_rate` lasting `seconds`, advancing the
/// phase by `step` radians per sample.
pub fn sine(sample_rate: u32, seconds: f64, step: f32, volume: f32) -> SampleBuffer {
    let count = (sample_rate as f64 * seconds.max(0.0)) as usize;
    let amplitude = 32767.0 * volume.clamp(0.0, 1.0);

    let mut theta = 0.0f32;
    let samples = (0..count)
        .map(|_| {
            let sample = (theta.sin() * amplitude).round() as i16;
            theta += step;
            sample
        })
        .collect();

    SampleBuffer::new(samples, sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_length_and_shape() {
        let tone = sine(48000, 0.5, DEFAULT_TONE_STEP, DEFAULT_TONE_VOLUME);
        assert_eq!(tone.len(), 24000);
        assert_eq!(tone.sample_rate(), 48000);
        assert_eq!(tone.samples()[0], 0);
        // A quarter period is 20 samples.
        assert!((16383..=16384).contains(&tone.samples()[20]));

        let peak = tone.samples().iter().map(|s| s.unsigned_abs()).max().unwrap();
        assert!((16383..=16384).contains(&peak));
    }

    #[test]
    fn test_sine_empty() {
        assert!(sine(48000, 0.0, DEFAULT_TONE_STEP, 1.0).is_empty());
        assert!(sine(48000, -1.0, DEFAULT_TONE_STEP, 1.0).is_empty());
    }
}
