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
use std::{fmt, thread};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info, span, Level};

use crate::audio::{Device as AudioDevice, OutputStream, VoiceMixer, SAMPLE_RATE};
use crate::error::{Error, Result};

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
    /// Frames per callback.
    buffer_size: usize,
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

fn device_error(e: impl fmt::Display) -> Error {
    Error::Device(e.to_string())
}

/// f32 callback: the mixer writes straight into the cpal buffer.
fn create_f32_callback(
    mut mixer: VoiceMixer,
) -> impl FnMut(&mut [f32], &cpal::OutputCallbackInfo) + Send + 'static {
    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        mixer.process_into_output(data);
    }
}

/// Integer callback: mix into a scratch buffer and convert.
fn create_converting_callback<T: cpal::Sample + cpal::FromSample<f32>>(
    mut mixer: VoiceMixer,
    buffer_samples: usize,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static {
    let mut scratch = vec![0.0f32; buffer_samples];
    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        // Only grows if the host hands over a larger buffer than it was asked for.
        if scratch.len() < data.len() {
            scratch.resize(data.len(), 0.0);
        }
        let scratch = &mut scratch[..data.len()];
        mixer.process_into_output(scratch);
        for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
            *dst = T::from_sample(src);
        }
    }
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn AudioDevice>>> {
        Ok(Device::list_cpal_devices(0)?
            .into_iter()
            .map(|device| {
                let device: Box<dyn AudioDevice> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal devices.
    fn list_cpal_devices(buffer_size: usize) -> Result<Vec<Device>> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)
                .map_err(device_error)?
                .devices()
            {
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
                let output_configs = match device.supported_output_configs() {
                    Ok(output_configs) => output_configs,
                    Err(_) => continue,
                };
                let max_channels = output_configs
                    .map(|output_config| output_config.channels())
                    .max()
                    .unwrap_or(0);

                if max_channels > 0 {
                    #[allow(deprecated)]
                    let name = device.name().map_err(device_error)?;
                    devices.push(Device {
                        name,
                        max_channels,
                        host_id,
                        device,
                        buffer_size,
                    })
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the given cpal device.
    pub fn get(name: &str, buffer_size: usize) -> Result<Device> {
        match Device::list_cpal_devices(buffer_size)?
            .into_iter()
            .find(|device| device.name.trim() == name)
        {
            Some(device) => Ok(device),
            None => Err(Error::Device(format!("no device found with name {}", name))),
        }
    }
}

impl AudioDevice for Device {
    fn start(&self, mixer: VoiceMixer) -> Result<OutputStream> {
        let span = span!(Level::INFO, "output (cpal)");
        let _enter = span.enter();

        let channels = mixer.channels();
        if channels > self.max_channels {
            return Err(Error::Device(format!(
                "{} channels requested, audio device {} only has {}",
                channels, self.name, self.max_channels
            )));
        }

        let sample_format = self
            .device
            .default_output_config()
            .map_err(device_error)?
            .sample_format();
        info!(
            device = self.name,
            channels,
            buffer_size = self.buffer_size,
            format = ?sample_format,
            "Starting output."
        );

        let device = self.device.clone();
        let buffer_size = self.buffer_size;
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<()>>(1);

        // Streams are not Send on every platform, so the stream is created and
        // kept on its own thread.
        let output_thread = thread::spawn(move || {
            let config = cpal::StreamConfig {
                channels,
                sample_rate: SAMPLE_RATE as cpal::SampleRate,
                buffer_size: if buffer_size > 0 {
                    cpal::BufferSize::Fixed(buffer_size as u32)
                } else {
                    cpal::BufferSize::Default
                },
            };
            let buffer_samples = buffer_size * channels as usize;
            let on_error = |err| error!("CPAL output stream error: {}", err);

            let stream_result = match sample_format {
                cpal::SampleFormat::F32 => device.build_output_stream(
                    &config,
                    create_f32_callback(mixer),
                    on_error,
                    None,
                ),
                cpal::SampleFormat::I16 => device.build_output_stream(
                    &config,
                    create_converting_callback::<i16>(mixer, buffer_samples),
                    on_error,
                    None,
                ),
                cpal::SampleFormat::I32 => device.build_output_stream(
                    &config,
                    create_converting_callback::<i32>(mixer, buffer_samples),
                    on_error,
                    None,
                ),
                other => {
                    let _ = ready_tx.send(Err(Error::Device(format!(
                        "unsupported sample format {:?}",
                        other
                    ))));
                    return;
                }
            };

            let stream = match stream_result {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(device_error(e)));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(device_error(e)));
                return;
            }
            let _ = ready_tx.send(Ok(()));

            // Keep the stream alive until asked to stop.
            let _ = stop_rx.recv();
            drop(stream);
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!(device = self.name, "CPAL output stream started successfully");
                Ok(OutputStream::new(self.name.clone(), stop_tx, output_thread))
            }
            Ok(Err(e)) => {
                let _ = output_thread.join();
                Err(e)
            }
            Err(_) => Err(Error::Device("output thread exited early".to_string())),
        }
    }

    fn max_channels(&self) -> u16 {
        self.max_channels
    }
}
