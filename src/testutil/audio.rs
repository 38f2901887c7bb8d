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

use std::{error::Error, fs, io::Cursor, path::Path};

use hound::{SampleFormat, WavSpec, WavWriter};

/// Encodes 16-bit PCM as an in-memory wave file. `channels` holds one sample
/// vector per channel; they are interleaved frame by frame.
pub fn wav_bytes(channels: &[Vec<i16>], sample_rate: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    let spec = WavSpec {
        channels: channels.len() as u16,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    {
        let mut writer =
            WavWriter::new(Cursor::new(&mut bytes), spec).expect("failed to create wav writer");
        let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
        for frame in 0..frames {
            for channel in channels {
                writer
                    .write_sample(channel[frame])
                    .expect("failed to write sample");
            }
        }
        writer.finalize().expect("failed to finalize wav");
    }

    bytes
}

/// Writes a 16-bit PCM wave file to disk.
pub fn write_wav(path: &Path, channels: &[Vec<i16>], sample_rate: u32) -> Result<(), Box<dyn Error>> {
    fs::write(path, wav_bytes(channels, sample_rate))?;
    Ok(())
}

/// Hand-built RIFF containers for exercising malformed and unusual files.
pub mod riff {
    /// Wraps chunks in a `RIFF....WAVE` header.
    pub fn file(chunks: &[Vec<u8>]) -> Vec<u8> {
        let body: Vec<u8> = chunks.concat();
        let mut bytes = Vec::with_capacity(body.len() + 12);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&((body.len() + 4) as u32).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(&body);
        bytes
    }

    /// A chunk with the given id and payload, padded to an even length.
    pub fn chunk(id: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(payload.len() + 9);
        bytes.extend_from_slice(id);
        bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        bytes.extend_from_slice(payload);
        if payload.len() % 2 == 1 {
            bytes.push(0);
        }
        bytes
    }

    /// A 16-byte `fmt ` chunk with consistent byte rate and block alignment.
    pub fn fmt_chunk(audio_format: u16, channels: u16, sample_rate: u32, bits: u16) -> Vec<u8> {
        let block_align = channels * (bits / 8);
        let byte_rate = sample_rate * block_align as u32;

        let mut payload = Vec::with_capacity(16);
        payload.extend_from_slice(&audio_format.to_le_bytes());
        payload.extend_from_slice(&channels.to_le_bytes());
        payload.extend_from_slice(&sample_rate.to_le_bytes());
        payload.extend_from_slice(&byte_rate.to_le_bytes());
        payload.extend_from_slice(&block_align.to_le_bytes());
        payload.extend_from_slice(&bits.to_le_bytes());
        chunk(b"fmt ", &payload)
    }

    pub fn data_chunk(payload: &[u8]) -> Vec<u8> {
        chunk(b"data", payload)
    }
}
