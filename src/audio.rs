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
use std::{fmt, sync::Arc};

use crate::config::EngineConfig;
use crate::error::EngineError;

pub mod cpal;
pub mod format;
pub mod mixer;
pub mod mock;
pub mod ring_buffer;
pub mod thread_priority;

pub use format::{OutputFormat, SampleFormat};
pub use mixer::{LimitMode, MixReport, Mixer};
pub use ring_buffer::{RingBuffer, RingStats};

/// The output layout a device agreed to, plus how much it pulls per callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpec {
    pub format: OutputFormat,
    /// Frames the device pulls per callback.
    pub quantum_frames: usize,
}

impl StreamSpec {
    /// Bytes the device pulls per callback.
    pub fn quantum_bytes(&self) -> usize {
        self.quantum_frames * self.format.bytes_per_frame()
    }
}

/// An audio output that drains a ring buffer from its own thread.
pub trait Device: fmt::Display + Send + Sync {
    /// The configured device name.
    fn name(&self) -> &str;

    /// Works out the closest format to `requested` that the device can play.
    fn negotiate(&self, requested: &OutputFormat) -> Result<StreamSpec, EngineError>;

    /// Starts a consumer thread that feeds the device from `ring`.
    fn start(
        &self,
        spec: &StreamSpec,
        ring: Arc<RingBuffer>,
    ) -> Result<Box<dyn DeviceStream>, EngineError>;
}

/// A running output stream. Dropping it stops the stream.
pub trait DeviceStream: Send {
    fn spec(&self) -> &StreamSpec;

    /// Returns true until `stop` is called or the stream thread exits.
    fn is_running(&self) -> bool;

    /// Stops the consumer and joins its thread. Safe to call more than once.
    fn stop(&mut self);
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, EngineError> {
    cpal::Device::list()
}

/// Gets the device named in the configuration. Names starting with `mock`
/// select the mock device.
pub fn get_device(config: &EngineConfig) -> Result<Arc<dyn Device>, EngineError> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(device)));
    };

    Ok(Arc::new(cpal::Device::get(device, config.stream_buffer_size())?))
}
