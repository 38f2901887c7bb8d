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

//! The engine ties the pieces together for the game thread.
//!
//! Sounds are loaded up front, started with `play_sound`, and rendered by
//! calling `run_mixer` once per frame. The device drains the ring on its own
//! thread; nothing here blocks on it.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, span, Level};

use crate::audio::{
    self, Device, DeviceStream, MixReport, Mixer, OutputFormat, RingBuffer, RingStats,
};
use crate::config::EngineConfig;
use crate::error::{EngineError, LoadError};
use crate::samples::{self, SampleBuffer, SampleLoader, SoundBank, SoundBankEntry, VoicePool};

/// Point-in-time view of the engine for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    pub active_voices: usize,
    pub max_voices: usize,
    pub loaded_sounds: usize,
    /// Bytes held by loaded sounds.
    pub sound_memory: usize,
    pub ring: RingStats,
}

/// A running sound effect engine. Owned by the game thread.
pub struct AudioEngine {
    device: Arc<dyn Device>,
    stream: Option<Box<dyn DeviceStream>>,
    ring: Arc<RingBuffer>,
    mixer: Mixer,
    pool: VoicePool,
    loader: SampleLoader,
    /// Underrun count as of the previous mixer pass.
    last_underruns: u64,
}

impl AudioEngine {
    /// Opens the configured device and starts the output stream.
    pub fn new(config: &EngineConfig) -> Result<AudioEngine, EngineError> {
        let device = audio::get_device(config)?;
        AudioEngine::with_device(config, device)
    }

    /// Starts the engine on an already selected device.
    pub fn with_device(
        config: &EngineConfig,
        device: Arc<dyn Device>,
    ) -> Result<AudioEngine, EngineError> {
        let span = span!(Level::INFO, "start audio engine");
        let _enter = span.enter();

        let requested = config.output_format()?;
        let spec = device.negotiate(&requested)?;
        let format = spec.format;

        let ring = Arc::new(RingBuffer::new(
            config.min_ring_buffer_size(),
            format.bytes_per_second(),
            spec.quantum_bytes(),
        ));
        let mixer = Mixer::new(format, config.mix_ahead()?, config.limit()?);
        let pool = VoicePool::new(config.max_voices());
        let loader = SampleLoader::new(format.sample_rate);

        let stream = device.start(&spec, ring.clone())?;

        info!(
            device = %device,
            format = %format,
            quantum_frames = spec.quantum_frames,
            ring_bytes = ring.capacity(),
            mix_frames = mixer.mix_frames(),
            limit = %mixer.limit(),
            max_voices = pool.capacity(),
            "Audio engine started"
        );

        Ok(AudioEngine {
            device,
            stream: Some(stream),
            ring,
            mixer,
            pool,
            loader,
            last_underruns: 0,
        })
    }

    /// The negotiated output format.
    pub fn format(&self) -> OutputFormat {
        self.mixer.format()
    }

    /// Loads a wave file at the engine rate. Repeated loads of the same file
    /// share one buffer.
    pub fn load_sound(&mut self, path: &Path) -> Result<SampleBuffer, LoadError> {
        self.loader.load(path)
    }

    /// Loads the sound bank named in the configuration.
    pub fn load_bank(&mut self, config: &EngineConfig) -> Result<SoundBank, LoadError> {
        let bank = self.loader.load_bank(config.sounds(), config.base_path())?;
        info!(
            sounds = bank.len(),
            memory_kb = self.loader.total_memory_usage() / 1024,
            "Sound bank loaded"
        );
        Ok(bank)
    }

    /// Starts a sound on a free voice. Returns the voice slot, or `None` when
    /// every voice is busy and the request was dropped.
    pub fn play_sound(&mut self, buffer: &SampleBuffer, volume: f32, looping: bool) -> Option<usize> {
        self.pool.play_sound(buffer, volume, looping)
    }

    /// Starts a bank entry with its configured volume and looping.
    pub fn play(&mut self, entry: &SoundBankEntry) -> Option<usize> {
        self.pool
            .play_sound(entry.buffer(), entry.volume(), entry.looping())
    }

    /// Length of a sound in seconds at the engine rate.
    pub fn sound_length(&self, buffer: &SampleBuffer) -> f32 {
        samples::sound_length(buffer, self.format().sample_rate)
    }

    /// Renders the next window of audio into the ring. Call once per frame.
    pub fn run_mixer(&mut self) -> MixReport {
        let report = self.mixer.run(&self.ring, &mut self.pool);

        let underruns = self.ring.underruns();
        if underruns != self.last_underruns {
            debug!(
                new_underruns = underruns - self.last_underruns,
                total = underruns,
                "Device ran out of mixed audio"
            );
            self.last_underruns = underruns;
        }

        report
    }

    /// Stops a single voice.
    pub fn stop(&mut self, slot: usize) {
        self.pool.stop(slot);
    }

    /// Stops every voice. The next mixer pass renders silence.
    pub fn stop_all(&mut self) {
        self.pool.stop_all();
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            active_voices: self.pool.active_count(),
            max_voices: self.pool.capacity(),
            loaded_sounds: self.loader.len(),
            sound_memory: self.loader.total_memory_usage(),
            ring: self.ring.stats(),
        }
    }

    /// Stops the device stream and joins its thread. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            self.pool.stop_all();
            info!(
                device = self.device.name(),
                underruns = self.ring.underruns(),
                "Audio engine stopped"
            );
        }
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for AudioEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioEngine")
            .field("device", &self.device.name())
            .field("running", &self.stream.is_some())
            .field("mixer", &self.mixer)
            .field("pool", &self.pool)
            .field("ring", &self.ring)
            .finish()
    }
}
