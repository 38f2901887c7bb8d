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

//! RIFF/WAVE decoding into engine-rate mono sample buffers.
//!
//! Only 16-bit integer PCM is accepted. Multi-channel sources are averaged down
//! to mono and lower-rate sources are stretched to the engine rate with a
//! two-tap linear interpolator, which is fine for short effects.

use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use hound::WavReader;
use tracing::debug;

use super::buffer::SampleBuffer;
use crate::error::LoadError;

/// The only bit depth the loader accepts.
pub const SUPPORTED_BITS_PER_SAMPLE: u16 = 16;

/// Format information read from a wave header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveInfo {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    /// Frames (samples per channel) in the data chunk.
    pub frames: u32,
}

impl WaveInfo {
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames as f64 / self.sample_rate as f64)
    }
}

/// Opens a reader over `bytes` and checks that the stream is 16-bit PCM.
fn open(bytes: &[u8]) -> Result<WavReader<Cursor<&[u8]>>, LoadError> {
    let reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    if spec.sample_format != hound::SampleFormat::Int
        || spec.bits_per_sample != SUPPORTED_BITS_PER_SAMPLE
    {
        return Err(LoadError::UnsupportedFormat {
            bits: spec.bits_per_sample,
            kind: match spec.sample_format {
                hound::SampleFormat::Int => "integer",
                hound::SampleFormat::Float => "float",
            },
        });
    }
    if spec.channels == 0 {
        return Err(LoadError::Malformed("zero channels".into()));
    }
    if spec.sample_rate == 0 {
        return Err(LoadError::Malformed("zero sample rate".into()));
    }

    Ok(reader)
}

/// Reads the format of a wave file without decoding samples.
pub fn read_info(bytes: &[u8]) -> Result<WaveInfo, LoadError> {
    let reader = open(bytes)?;
    let spec = reader.spec();
    Ok(WaveInfo {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        bits_per_sample: spec.bits_per_sample,
        frames: reader.duration(),
    })
}

/// Decodes a wave file into a mono buffer at `engine_rate`.
pub fn decode(bytes: &[u8], engine_rate: u32) -> Result<SampleBuffer, LoadError> {
    let mut reader = open(bytes)?;
    let spec = reader.spec();

    if spec.sample_rate > engine_rate {
        return Err(LoadError::UnsupportedRate {
            source_rate: spec.sample_rate,
            engine_rate,
        });
    }

    let interleaved = reader
        .samples::<i16>()
        .collect::<Result<Vec<i16>, hound::Error>>()?;
    let mono = downmix(&interleaved, spec.channels as usize);
    let samples = resample(&mono, spec.sample_rate, engine_rate);

    debug!(
        channels = spec.channels,
        source_rate = spec.sample_rate,
        engine_rate,
        source_frames = mono.len(),
        samples = samples.len(),
        "Decoded wave data"
    );

    Ok(SampleBuffer::new(samples, engine_rate))
}

/// Reads and decodes the wave file at `path`.
pub fn load(path: &Path, engine_rate: u32) -> Result<SampleBuffer, LoadError> {
    let bytes = fs::read(path).map_err(|e| LoadError::from(e).at(path))?;
    decode(&bytes, engine_rate).map_err(|e| e.at(path))
}

/// Averages interleaved frames down to one channel. A trailing partial frame
/// is dropped.
pub fn downmix(interleaved: &[i16], channels: usize) -> Vec<i16> {
    if channels <= 1 {
        return interleaved.to_vec();
    }

    interleaved
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Stretches `input` from `source_rate` to `target_rate` by linear interpolation.
///
/// The output has `round(len * target / source)` samples and both endpoints of
/// the input map onto the first and (nearly) last output sample.
pub fn resample(input: &[i16], source_rate: u32, target_rate: u32) -> Vec<i16> {
    if source_rate == target_rate || source_rate == 0 || input.is_empty() {
        return input.to_vec();
    }

    let in_count = input.len();
    let out_count = (in_count as f64 * target_rate as f64 / source_rate as f64).round() as usize;
    let last = (in_count - 1) as f64;

    (0..out_count)
        .map(|i| {
            let position = i as f64 / out_count as f64 * last;
            let p0 = position.floor() as usize;
            let p1 = position.ceil() as usize;
            let t = position - p0 as f64;
            lerp(input[p0] as f64, input[p1] as f64, t).round() as i16
        })
        .collect()
}

fn lerp(v0: f64, v1: f64, t: f64) -> f64 {
    (1.0 - t) * v0 + t * v1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::audio::{riff, wav_bytes};

    #[test]
    fn test_decode_mono_at_engine_rate() {
        let bytes = wav_bytes(&[vec![0, 1000, -1000, i16::MAX]], 48000);
        let buffer = decode(&bytes, 48000).unwrap();
        assert_eq!(buffer.samples(), &[0, 1000, -1000, i16::MAX]);
        assert_eq!(buffer.sample_rate(), 48000);
    }

    #[test]
    fn test_decode_stereo_downmix() {
        let bytes = wav_bytes(&[vec![100, -200, i16::MAX], vec![300, 200, i16::MAX]], 48000);
        let buffer = decode(&bytes, 48000).unwrap();
        assert_eq!(buffer.samples(), &[200, 0, i16::MAX]);
    }

    #[test]
    fn test_downmix_truncates_toward_zero() {
        assert_eq!(downmix(&[1, 2, -1, -2], 2), vec![1, -1]);
        assert_eq!(downmix(&[3, 3, 3, 9], 3), vec![3]);
    }

    #[test]
    fn test_resample_duration_preserved() {
        let cases = [(22050u32, 48000u32, 2205usize), (44100, 48000, 441), (8000, 44100, 1234)];
        for (source_rate, engine_rate, in_count) in cases {
            let tone: Vec<i16> = (0..in_count)
                .map(|i| ((i as f32 * 0.05).sin() * 10000.0) as i16)
                .collect();
            let out = resample(&tone, source_rate, engine_rate);

            let expected =
                (in_count as f64 * engine_rate as f64 / source_rate as f64).round() as usize;
            assert_eq!(out.len(), expected);

            let ideal = in_count as f64 / source_rate as f64;
            let actual = out.len() as f64 / engine_rate as f64;
            assert!((ideal - actual).abs() < 1.0 / engine_rate as f64);
        }
    }

    #[test]
    fn test_resample_interpolates_linearly() {
        let out = resample(&[0, 1000], 1, 4);
        // Eight outputs spread over the single input step.
        assert_eq!(out, vec![0, 125, 250, 375, 500, 625, 750, 875]);
    }

    #[test]
    fn test_resample_single_sample_and_identity() {
        assert_eq!(resample(&[42], 24000, 48000), vec![42, 42]);
        assert_eq!(resample(&[1, 2, 3], 48000, 48000), vec![1, 2, 3]);
        assert!(resample(&[], 24000, 48000).is_empty());
    }

    #[test]
    fn test_decode_resamples_lower_rate() {
        let bytes = wav_bytes(&[vec![500; 2400]], 24000);
        let buffer = decode(&bytes, 48000).unwrap();
        assert_eq!(buffer.len(), 4800);
        assert!(buffer.samples().iter().all(|&s| s == 500));
    }

    #[test]
    fn test_rejects_higher_source_rate() {
        let bytes = wav_bytes(&[vec![0; 10]], 96000);
        assert!(matches!(
            decode(&bytes, 48000),
            Err(LoadError::UnsupportedRate {
                source_rate: 96000,
                engine_rate: 48000
            })
        ));
    }

    #[test]
    fn test_rejects_non_16_bit() {
        let bytes = riff::file(&[riff::fmt_chunk(1, 1, 48000, 8), riff::data_chunk(&[0u8; 8])]);
        assert!(matches!(
            decode(&bytes, 48000),
            Err(LoadError::UnsupportedFormat { bits: 8, .. })
        ));

        let bytes = riff::file(&[riff::fmt_chunk(3, 1, 48000, 32), riff::data_chunk(&[0u8; 8])]);
        assert!(matches!(
            decode(&bytes, 48000),
            Err(LoadError::UnsupportedFormat {
                bits: 32,
                kind: "float"
            })
        ));
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut bytes = wav_bytes(&[vec![0; 4]], 48000);
        bytes[..4].copy_from_slice(b"RIFX");
        assert!(matches!(decode(&bytes, 48000), Err(LoadError::Malformed(_))));
    }

    #[test]
    fn test_rejects_missing_data_chunk() {
        let bytes = riff::file(&[riff::fmt_chunk(1, 1, 48000, 16)]);
        assert!(decode(&bytes, 48000).is_err());

        let bytes = riff::file(&[riff::fmt_chunk(1, 1, 48000, 16), riff::chunk(b"LIST", &[0u8; 6])]);
        assert!(decode(&bytes, 48000).is_err());
    }

    #[test]
    fn test_skips_unknown_chunks_before_data() {
        let data: Vec<u8> = [10i16, -10, 20]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let bytes = riff::file(&[
            riff::fmt_chunk(1, 1, 48000, 16),
            riff::chunk(b"LIST", b"INFOISFTtest"),
            riff::chunk(b"fact", &[0u8; 4]),
            riff::data_chunk(&data),
        ]);

        let buffer = decode(&bytes, 48000).unwrap();
        assert_eq!(buffer.samples(), &[10, -10, 20]);
    }

    #[test]
    fn test_read_info() {
        let bytes = wav_bytes(&[vec![0; 2205], vec![0; 2205]], 22050);
        let info = read_info(&bytes).unwrap();
        assert_eq!(info.channels, 2);
        assert_eq!(info.sample_rate, 22050);
        assert_eq!(info.bits_per_sample, 16);
        assert_eq!(info.frames, 2205);
        assert_eq!(info.duration(), Duration::from_millis(100));
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.wav");
        let err = load(&path, 48000).unwrap_err();
        assert!(matches!(err, LoadError::Asset { .. }));
        assert!(err.to_string().contains("missing.wav"));
    }
}
