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
use std::{fmt, sync::Arc, thread};

use crossbeam_channel::Sender;
use tracing::{error, info};

use crate::config::EngineConfig;
use crate::error::Result;

pub mod cpal;
pub mod mixer;
pub mod mock;
pub mod sample_source;
pub mod waveform;

pub use mixer::{MixerHandle, VoiceMixer};
pub use waveform::{WaveformBuffer, SAMPLE_RATE};

/// An output that periodically asks a mixer to fill its buffers.
pub trait Device: fmt::Display + Send + Sync {
    /// Starts pulling audio from the mixer. Output continues until the
    /// returned stream is dropped.
    fn start(&self, mixer: VoiceMixer) -> Result<OutputStream>;

    /// The maximum number of output channels.
    fn max_channels(&self) -> u16;
}

/// A running output. Dropping it stops the output thread.
pub struct OutputStream {
    device: String,
    stop: Option<Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl OutputStream {
    pub(crate) fn new(device: String, stop: Sender<()>, thread: thread::JoinHandle<()>) -> Self {
        Self {
            device,
            stop: Some(stop),
            thread: Some(thread),
        }
    }
}

impl Drop for OutputStream {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!(device = self.device, "Output thread panicked");
            }
        }
        info!(device = self.device, "Output stopped");
    }
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>> {
    cpal::Device::list()
}

/// Gets the configured output device. Names starting with "mock" give a device
/// that runs the mixer on a timer without producing sound.
pub fn get_device(config: &EngineConfig) -> Result<Arc<dyn Device>> {
    let name = config.output_device();
    if name.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(name, config.buffer_size())));
    }

    Ok(Arc::new(cpal::Device::get(name, config.buffer_size())?))
}
