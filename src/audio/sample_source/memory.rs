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
use std::collections::HashMap;
use std::path::PathBuf;

use super::error::SampleSourceError;
use super::traits::{DecodedAudio, SampleSource};

/// A sample source that serves pre-decoded audio from memory.
/// Useful for tests and for hosts that decode audio themselves.
#[derive(Default, Clone)]
pub struct MemorySampleSource {
    resources: HashMap<String, DecodedAudio>,
}

impl MemorySampleSource {
    /// Creates an empty memory sample source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a resource.
    pub fn insert(&mut self, resource: impl Into<String>, audio: DecodedAudio) {
        self.resources.insert(resource.into(), audio);
    }

    /// Adds a mono resource at the given sample rate.
    pub fn with_mono(mut self, resource: impl Into<String>, samples: Vec<f32>, rate: u32) -> Self {
        self.insert(resource, DecodedAudio::mono(samples, rate));
        self
    }

    /// Returns the number of resources held.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns true if there are no resources.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl SampleSource for MemorySampleSource {
    fn decode(&self, resource: &str) -> Result<DecodedAudio, SampleSourceError> {
        self.resources
            .get(resource)
            .cloned()
            .ok_or_else(|| SampleSourceError::NotFound(resource.to_string()))
    }

    fn location(&self) -> PathBuf {
        PathBuf::from("<memory>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source() {
        let source = MemorySampleSource::new().with_mono("drums/kick", vec![0.1, 0.2], 44100);
        assert_eq!(source.len(), 1);

        let decoded = source.decode("drums/kick").unwrap();
        assert_eq!(decoded.samples, vec![0.1, 0.2]);
        assert_eq!(decoded.channel_count, 1);

        assert!(matches!(
            source.decode("drums/snare"),
            Err(SampleSourceError::NotFound(_))
        ));
    }
}
