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
use std::path::PathBuf;

use super::error::SampleSourceError;

/// Fully decoded PCM audio, interleaved if it has more than one channel.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedAudio {
    /// Interleaved f32 samples.
    pub samples: Vec<f32>,
    /// Number of interleaved channels.
    pub channel_count: u16,
    /// Sample rate of the decoded data.
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Creates decoded mono audio.
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            channel_count: 1,
            sample_rate,
        }
    }

    /// Down-mixes to mono by averaging the channels of each frame.
    pub fn into_mono(self) -> Vec<f32> {
        let channels = self.channel_count.max(1) as usize;
        if channels == 1 {
            return self.samples;
        }

        self.samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    }
}

/// Supplies decoded audio for a named resource, e.g. `piano/mf/C4`.
///
/// The engine does not care how resources are stored; it only needs decoded
/// PCM and the rate it was recorded at.
pub trait SampleSource: Send + Sync {
    /// Decodes the named resource. Returns `SampleSourceError::NotFound` if
    /// the resource does not exist.
    fn decode(&self, resource: &str) -> Result<DecodedAudio, SampleSourceError>;

    /// Where resources are looked up, used when reporting missing resources.
    fn location(&self) -> PathBuf;
}
