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
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, error, info, span, warn, Level};

use super::thread_priority::{ConsumerPriority, PriorityOutcome};
use super::{DeviceStream, OutputFormat, RingBuffer, SampleFormat, StreamSpec};
use crate::error::EngineError;

/// Frames per callback assumed when the backend picks its own buffer size and
/// does not report a range, or reports one that contains this value.
const DEFAULT_QUANTUM_FRAMES: u32 = 1024;

/// A small wrapper around a cpal::Device.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
    /// Fixed callback size in frames. `None` lets the backend decide.
    stream_buffer_size: Option<u32>,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn super::Device>>, EngineError> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn super::Device> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal devices that have at least one output configuration.
    fn list_cpal_devices() -> Result<Vec<Device>, EngineError> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host = cpal::host_from_id(host_id).map_err(backend_error)?;
            let host_devices = match host.output_devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let Ok(output_configs) = device.supported_output_configs() else {
                    continue;
                };
                let max_channels = output_configs
                    .map(|config| config.channels())
                    .max()
                    .unwrap_or(0);
                if max_channels == 0 {
                    continue;
                }

                let Ok(name) = device.name() else {
                    continue;
                };
                devices.push(Device {
                    name,
                    max_channels,
                    host_id,
                    device,
                    stream_buffer_size: None,
                })
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the named cpal device. `default` selects the default output of the
    /// default host.
    pub fn get(name: &str, stream_buffer_size: Option<u32>) -> Result<Device, EngineError> {
        if name == "default" {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or_else(|| EngineError::NoDevice(name.to_string()))?;
            let max_channels = device
                .supported_output_configs()
                .map_err(backend_error)?
                .map(|config| config.channels())
                .max()
                .unwrap_or(0);
            return Ok(Device {
                name: device.name().map_err(backend_error)?,
                max_channels,
                host_id: host.id(),
                device,
                stream_buffer_size,
            });
        }

        match Device::list_cpal_devices()?
            .into_iter()
            .find(|device| device.name.trim() == name)
        {
            Some(mut device) => {
                device.stream_buffer_size = stream_buffer_size;
                Ok(device)
            }
            None => Err(EngineError::NoDevice(name.to_string())),
        }
    }

    /// Returns the buffer sizes of the device's output configuration for the
    /// given layout, or `None` if the device has no such configuration.
    fn supported_buffer_size(
        &self,
        channels: u16,
        sample_rate: u32,
        sample_format: SampleFormat,
    ) -> Option<cpal::SupportedBufferSize> {
        let configs = self.device.supported_output_configs().ok()?;
        let wanted = to_cpal_format(sample_format);
        configs
            .into_iter()
            .find(|config| {
                config.channels() == channels
                    && config.sample_format() == wanted
                    && config.min_sample_rate().0 <= sample_rate
                    && sample_rate <= config.max_sample_rate().0
            })
            .map(|config| config.buffer_size().clone())
    }
}

impl super::Device for Device {
    fn name(&self) -> &str {
        &self.name
    }

    /// Prefers the requested layout, then the other sample format, then the
    /// other channel count.
    fn negotiate(&self, requested: &OutputFormat) -> Result<StreamSpec, EngineError> {
        let other_format = match requested.sample_format {
            SampleFormat::Float => SampleFormat::Int,
            SampleFormat::Int => SampleFormat::Float,
        };
        let other_channels = if requested.channels == 2 { 1 } else { 2 };
        let candidates = [
            (requested.channels, requested.sample_format),
            (requested.channels, other_format),
            (other_channels, requested.sample_format),
            (other_channels, other_format),
        ];

        let (channels, sample_format, buffer_size) = candidates
            .into_iter()
            .find_map(|(channels, format)| {
                self.supported_buffer_size(channels, requested.sample_rate, format)
                    .map(|buffer_size| (channels, format, buffer_size))
            })
            .ok_or_else(|| {
                EngineError::UnsupportedConfig(format!(
                    "device {} supports no mono or stereo stream at {}",
                    self.name, requested
                ))
            })?;

        let format = OutputFormat::new(requested.sample_rate, channels, sample_format)?;
        if format != *requested {
            warn!(
                device = self.name,
                requested = %requested,
                negotiated = %format,
                "Device does not support the requested format"
            );
        }

        let quantum_frames = quantum_frames(&buffer_size, self.stream_buffer_size);
        debug!(
            device = self.name,
            supported = ?buffer_size,
            quantum_frames,
            "Negotiated callback size"
        );

        Ok(StreamSpec {
            format,
            quantum_frames,
        })
    }

    fn start(
        &self,
        spec: &StreamSpec,
        ring: Arc<RingBuffer>,
    ) -> Result<Box<dyn DeviceStream>, EngineError> {
        let span = span!(Level::INFO, "start stream (cpal)");
        let _enter = span.enter();

        let config = cpal::StreamConfig {
            channels: spec.format.channels,
            sample_rate: cpal::SampleRate(spec.format.sample_rate),
            buffer_size: match self.stream_buffer_size {
                Some(frames) => cpal::BufferSize::Fixed(frames),
                None => cpal::BufferSize::Default,
            },
        };
        let stop = Arc::new(AtomicBool::new(false));
        let exited = Arc::new(AtomicBool::new(false));
        let (started_tx, started_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let (priority_tx, priority_rx) = crossbeam_channel::bounded::<PriorityOutcome>(1);

        // The stream is created inside the thread that owns it, since cpal
        // streams are not Send on every platform.
        let output_thread = {
            let device = self.device.clone();
            let sample_format = spec.format.sample_format;
            let stop = stop.clone();
            let exited = exited.clone();
            let priority = ConsumerPriority::from_env();
            thread::Builder::new()
                .name("tetromix-output".into())
                .spawn(move || {
                    let stream_result = match sample_format {
                        SampleFormat::Float => device.build_output_stream(
                            &config,
                            create_callback::<f32>(ring, stop, priority, priority_tx),
                            |err| error!("CPAL output stream error: {}", err),
                            None,
                        ),
                        SampleFormat::Int => device.build_output_stream(
                            &config,
                            create_callback::<i16>(ring, stop, priority, priority_tx),
                            |err| error!("CPAL output stream error: {}", err),
                            None,
                        ),
                    };

                    let stream = match stream_result {
                        Ok(stream) => stream,
                        Err(e) => {
                            let _ = started_tx.send(Err(e.to_string()));
                            exited.store(true, Ordering::Relaxed);
                            return;
                        }
                    };
                    if let Err(e) = stream.play() {
                        let _ = started_tx.send(Err(e.to_string()));
                        exited.store(true, Ordering::Relaxed);
                        return;
                    }
                    let _ = started_tx.send(Ok(()));

                    // Keep the stream alive until asked to stop or the handle is
                    // dropped, logging what the callback reports along the way.
                    loop {
                        crossbeam_channel::select! {
                            recv(stop_rx) -> _ => break,
                            recv(priority_rx) -> outcome => match outcome {
                                Ok(outcome) => outcome.log(),
                                // The callback is gone, only a stop can follow.
                                Err(_) => {
                                    let _ = stop_rx.recv();
                                    break;
                                }
                            },
                        }
                    }
                    drop(stream);
                    exited.store(true, Ordering::Relaxed);
                })?
        };

        match started_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = output_thread.join();
                return Err(EngineError::Stream(e));
            }
            Err(_) => {
                let _ = output_thread.join();
                return Err(EngineError::Stream(
                    "output thread exited before starting".into(),
                ));
            }
        }

        info!(
            device = self.name,
            format = %spec.format,
            buffer_size = ?self.stream_buffer_size,
            "CPAL output stream started"
        );

        Ok(Box::new(Stream {
            spec: *spec,
            stop,
            exited,
            stop_tx: Some(stop_tx),
            output_thread: Some(output_thread),
        }))
    }
}

/// Builds the data callback: raises thread priority once, then drains the ring
/// into the device buffer.
fn create_callback<T: bytemuck::Pod>(
    ring: Arc<RingBuffer>,
    stop: Arc<AtomicBool>,
    mut priority: ConsumerPriority,
    priority_tx: crossbeam_channel::Sender<PriorityOutcome>,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static {
    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        apply_priority(&mut priority, &priority_tx);
        fill_output(&ring, &stop, bytemuck::cast_slice_mut(data));
    }
}

/// Applies the consumer priority on the first callback and hands the outcome
/// to the output thread. Never blocks.
fn apply_priority(
    priority: &mut ConsumerPriority,
    priority_tx: &crossbeam_channel::Sender<PriorityOutcome>,
) {
    if let Some(outcome) = priority.apply() {
        let _ = priority_tx.try_send(outcome);
    }
}

/// Fills one device buffer. Never blocks or allocates.
fn fill_output(ring: &RingBuffer, stop: &AtomicBool, bytes: &mut [u8]) {
    if stop.load(Ordering::Relaxed) {
        bytes.fill(0);
        return;
    }
    ring.consume(bytes);
}

/// A running cpal stream, owned by its output thread.
struct Stream {
    spec: StreamSpec,
    stop: Arc<AtomicBool>,
    exited: Arc<AtomicBool>,
    stop_tx: Option<crossbeam_channel::Sender<()>>,
    output_thread: Option<thread::JoinHandle<()>>,
}

impl DeviceStream for Stream {
    fn spec(&self) -> &StreamSpec {
        &self.spec
    }

    fn is_running(&self) -> bool {
        !self.stop.load(Ordering::Relaxed) && !self.exited.load(Ordering::Relaxed)
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(thread) = self.output_thread.take() {
            if thread.join().is_err() {
                error!("Output thread panicked");
            }
            debug!("CPAL output stream stopped");
        }
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Frames the device pulls per callback. A fixed stream buffer size is used as
/// is. Otherwise the default is clamped into the range the backend reports.
fn quantum_frames(supported: &cpal::SupportedBufferSize, fixed: Option<u32>) -> usize {
    let frames = match (fixed, supported) {
        (Some(frames), _) => frames,
        (None, cpal::SupportedBufferSize::Range { min, max }) if min <= max => {
            DEFAULT_QUANTUM_FRAMES.clamp(*min, *max)
        }
        (None, _) => DEFAULT_QUANTUM_FRAMES,
    };
    frames.max(1) as usize
}

fn to_cpal_format(format: SampleFormat) -> cpal::SampleFormat {
    match format {
        SampleFormat::Float => cpal::SampleFormat::F32,
        SampleFormat::Int => cpal::SampleFormat::I16,
    }
}

fn backend_error<E: std::error::Error>(e: E) -> EngineError {
    EngineError::Backend(e.to_string())
}
