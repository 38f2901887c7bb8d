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
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use parking_lot::Mutex;
use tracing::{error, info};

use super::{OutputFormat, RingBuffer, StreamSpec};
use crate::error::EngineError;

/// Callbacks per second made by the paced mock consumer.
const MOCK_CALLBACK_RATE: u32 = 100;

/// A mock device. Accepts any format and drains the ring like hardware would,
/// without playing anything.
///
/// Names containing `manual` get no consumer thread; the ring is only drained
/// through `pull`.
#[derive(Clone)]
pub struct Device {
    name: String,
    manual: bool,
    is_playing: Arc<AtomicBool>,
    callbacks: Arc<AtomicU64>,
    ring: Arc<Mutex<Option<Arc<RingBuffer>>>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            manual: name.contains("manual"),
            is_playing: Arc::new(AtomicBool::new(false)),
            callbacks: Arc::new(AtomicU64::new(0)),
            ring: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns true while a stream is running.
    pub fn is_playing(&self) -> bool {
        self.is_playing.load(Ordering::Relaxed)
    }

    /// Consumer callbacks made so far, including manual pulls.
    pub fn callbacks(&self) -> u64 {
        self.callbacks.load(Ordering::Relaxed)
    }

    /// Pulls `bytes` from the running stream's ring as a device callback would.
    /// Returns an empty buffer when no stream is running.
    pub fn pull(&self, bytes: usize) -> Vec<u8> {
        let ring = self.ring.lock().clone();
        let Some(ring) = ring else {
            return Vec::new();
        };
        let mut out = vec![0u8; bytes];
        ring.consume(&mut out);
        self.callbacks.fetch_add(1, Ordering::Relaxed);
        out
    }
}

impl super::Device for Device {
    fn name(&self) -> &str {
        &self.name
    }

    /// Takes the requested format as is and pulls 10ms per callback.
    fn negotiate(&self, requested: &OutputFormat) -> Result<StreamSpec, EngineError> {
        Ok(StreamSpec {
            format: *requested,
            quantum_frames: (requested.sample_rate / MOCK_CALLBACK_RATE).max(1) as usize,
        })
    }

    fn start(
        &self,
        spec: &StreamSpec,
        ring: Arc<RingBuffer>,
    ) -> Result<Box<dyn super::DeviceStream>, EngineError> {
        info!(
            device = self.name,
            format = %spec.format,
            quantum_frames = spec.quantum_frames,
            manual = self.manual,
            "Starting mock stream."
        );

        *self.ring.lock() = Some(ring.clone());
        self.is_playing.store(true, Ordering::Relaxed);
        let stop = Arc::new(AtomicBool::new(false));

        let consumer_thread = if self.manual {
            None
        } else {
            let stop = stop.clone();
            let callbacks = self.callbacks.clone();
            let quantum = spec.quantum_bytes();
            let period = Duration::from_secs_f64(
                spec.quantum_frames as f64 / spec.format.sample_rate as f64,
            );
            let handle = thread::Builder::new()
                .name("mock-consumer".into())
                .spawn(move || {
                    let mut buffer = vec![0u8; quantum];
                    while !stop.load(Ordering::Relaxed) {
                        ring.consume(&mut buffer);
                        callbacks.fetch_add(1, Ordering::Relaxed);
                        spin_sleep::sleep(period);
                    }
                })?;
            Some(handle)
        };

        Ok(Box::new(Stream {
            spec: *spec,
            stop,
            consumer_thread,
            device: self.clone(),
        }))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}

/// A running mock stream.
struct Stream {
    spec: StreamSpec,
    stop: Arc<AtomicBool>,
    consumer_thread: Option<thread::JoinHandle<()>>,
    device: Device,
}

impl super::DeviceStream for Stream {
    fn spec(&self) -> &StreamSpec {
        &self.spec
    }

    fn is_running(&self) -> bool {
        !self.stop.load(Ordering::Relaxed)
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.consumer_thread.take() {
            if thread.join().is_err() {
                error!(device = self.device.name, "Mock consumer thread panicked");
            }
        }
        *self.device.ring.lock() = None;
        self.device.is_playing.store(false, Ordering::Relaxed);
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        super::DeviceStream::stop(self);
    }
}
