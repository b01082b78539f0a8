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
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::error::Result;

/// The system-wide sample rate. Everything is decoded, rendered and played at this rate.
pub const SAMPLE_RATE: u32 = 44100;

/// An immutable mono buffer of f32 samples at [`SAMPLE_RATE`].
///
/// The samples live behind an `Arc`, so clones share storage. Nothing can mutate a
/// buffer once it is built, which is what makes handing it to the audio thread safe.
#[derive(Clone, PartialEq)]
pub struct WaveformBuffer {
    samples: Arc<[f32]>,
}

impl WaveformBuffer {
    /// Creates a new buffer, taking ownership of the samples.
    pub fn new(samples: Vec<f32>) -> Self {
        Self {
            samples: samples.into(),
        }
    }

    /// Creates an empty buffer.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Returns the samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Returns the number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Index of the last sample, or None for an empty buffer.
    pub fn end_index(&self) -> Option<usize> {
        self.samples.len().checked_sub(1)
    }

    /// Returns the sample rate of the buffer.
    pub fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    /// Returns the playback duration of the buffer.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / SAMPLE_RATE as f64)
    }

    /// Returns the largest absolute sample value.
    pub fn peak(&self) -> f32 {
        crate::instrument::normalize::peak(&self.samples)
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.samples.len() * std::mem::size_of::<f32>()
    }

    /// Writes the buffer as a mono 32-bit float WAV file.
    pub fn write_wav(&self, path: &Path) -> Result<()> {
        let spec = WavSpec {
            channels: 1,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(path, spec)?;
        for sample in self.samples.iter() {
            writer.write_sample(*sample)?;
        }
        writer.finalize()?;
        Ok(())
    }
}

impl From<Vec<f32>> for WaveformBuffer {
    fn from(samples: Vec<f32>) -> Self {
        Self::new(samples)
    }
}

impl fmt::Debug for WaveformBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaveformBuffer")
            .field("len", &self.samples.len())
            .field("duration_ms", &self.duration().as_millis())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::WavReader;

    #[test]
    fn test_end_index() {
        assert_eq!(WaveformBuffer::empty().end_index(), None);
        assert_eq!(WaveformBuffer::new(vec![0.0; 10]).end_index(), Some(9));
    }

    #[test]
    fn test_clones_share_storage() {
        let buffer = WaveformBuffer::new(vec![0.25, -0.5]);
        let clone = buffer.clone();
        assert!(std::ptr::eq(buffer.samples(), clone.samples()));
        assert_eq!(buffer.peak(), 0.5);
    }

    #[test]
    fn test_write_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        WaveformBuffer::new(vec![0.5, -0.25, 0.0]).write_wav(&path).unwrap();

        let mut reader = WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.spec().sample_rate, SAMPLE_RATE);
        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0.5, -0.25, 0.0]);
    }

    #[test]
    fn test_duration() {
        let buffer = WaveformBuffer::new(vec![0.0; SAMPLE_RATE as usize / 2]);
        assert_eq!(buffer.duration().as_millis(), 500);
    }
}
