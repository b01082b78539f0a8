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
    error::Error,
    f32::consts::PI,
    fs::{self, File},
    path::Path,
    thread,
    time::{Duration, Instant},
};

use hound::{SampleFormat, WavSpec, WavWriter};

/// Generate a sine wave.
pub fn generate_sine(frequency: f32, amplitude: f32, sample_rate: u32, count: usize) -> Vec<f32> {
    (0..count)
        .map(|i| amplitude * (2.0 * PI * frequency * i as f32 / sample_rate as f32).sin())
        .collect()
}

/// A ramp 1, 2, 3, ... that makes it easy to tell which source sample ended up where.
pub fn ramp(count: usize) -> Vec<f32> {
    (1..=count).map(|i| i as f32).collect()
}

/// Wait for the given predicate to return true or fail.
pub fn eventually<F>(predicate: F, error_msg: &str)
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    let tick = Duration::from_millis(10);
    let timeout = Duration::from_secs(3);

    loop {
        if start.elapsed() > timeout {
            panic!("{}", error_msg);
        }
        if predicate() {
            return;
        }
        thread::sleep(tick);
    }
}

/// Writes planar channels as an interleaved 32-bit float WAV, creating parent
/// directories as needed.
pub fn write_wav(path: &Path, channels: &[Vec<f32>], sample_rate: u32) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    assert!(channels.len() <= u16::MAX.into(), "Too many channels!");
    let mut writer = WavWriter::new(
        File::create(path)?,
        WavSpec {
            channels: channels.len() as u16,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        },
    )?;

    let frames = channels.iter().map(Vec::len).max().unwrap_or(0);
    for frame in 0..frames {
        for channel in channels {
            writer.write_sample(channel.get(frame).copied().unwrap_or(0.0))?;
        }
    }
    writer.finalize()?;

    Ok(())
}
