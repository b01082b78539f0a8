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

//! Sampled instruments.
//!
//! This module provides:
//! - Instrument kinds (piano, marimba, drum kit) described as plain data
//! - Velocity to dynamics tier and gain mapping
//! - Loading and normalisation of per-pitch, per-tier sample data

pub mod drum;
pub mod dynamics;
pub mod kind;
mod loader;
pub mod normalize;

use std::fmt;
use std::ops::RangeInclusive;

pub use drum::Drum;
pub use dynamics::{Dynamics, DynamicsLevel, MAX_VELOCITY};
pub use kind::{InstrumentKind, InstrumentProfile};
pub use loader::InstrumentLoader;

use crate::audio::WaveformBuffer;
use crate::error::{invalid, Result};

/// Normalised sample data for every pitch and dynamics tier of an instrument.
pub struct InstrumentModel {
    profile: InstrumentProfile,
    /// Indexed by `pitch - lowest pitch`, then by dynamics tier.
    clips: Vec<Vec<WaveformBuffer>>,
}

impl InstrumentModel {
    /// Creates a loaded instrument. There must be one clip per tier for every pitch.
    pub fn new(profile: InstrumentProfile, clips: Vec<Vec<WaveformBuffer>>) -> Result<Self> {
        let tiers = profile.dynamics.tier_count();
        if clips.len() != profile.pitch_count() {
            return invalid(format!(
                "{} expects {} pitches, got {}",
                profile.kind,
                profile.pitch_count(),
                clips.len()
            ));
        }
        if let Some(bad) = clips.iter().position(|pitch| pitch.len() != tiers) {
            return invalid(format!(
                "{} expects {} tiers per pitch, pitch {} has {}",
                profile.kind,
                tiers,
                *profile.pitches.start() as usize + bad,
                clips[bad].len()
            ));
        }

        Ok(Self { profile, clips })
    }

    /// Creates an instrument whose samples have not been loaded yet.
    pub fn unloaded(profile: InstrumentProfile) -> Self {
        Self {
            profile,
            clips: Vec::new(),
        }
    }

    /// Returns true once sample data is present.
    pub fn is_loaded(&self) -> bool {
        !self.clips.is_empty()
    }

    /// Returns the instrument profile.
    pub fn profile(&self) -> &InstrumentProfile {
        &self.profile
    }

    /// Returns the kind of instrument.
    pub fn kind(&self) -> InstrumentKind {
        self.profile.kind
    }

    /// Returns the pitch (or drum index) range.
    pub fn pitch_range(&self) -> RangeInclusive<u8> {
        self.profile.pitches.clone()
    }

    /// Returns the dynamics tiers.
    pub fn dynamics(&self) -> &Dynamics {
        &self.profile.dynamics
    }

    /// Returns the dynamics thresholds, empty if the instrument has no tiers.
    pub fn thresholds(&self) -> Vec<u8> {
        self.profile.dynamics.thresholds()
    }

    /// Index of the smallest dynamics tier covering the velocity.
    pub fn dynamics_index(&self, velocity: u8) -> Result<usize> {
        self.profile.dynamics.index(velocity)
    }

    /// Gain factor in [0, 1] for the velocity.
    pub fn gain_factor(&self, velocity: u8) -> Result<f32> {
        self.profile.dynamics.gain(velocity)
    }

    /// Returns the clips for every dynamics tier of a pitch, in tier order.
    /// Buffers are immutable, so the returned values are independent of the model.
    pub fn audio_data_for_pitch(&self, pitch: u8) -> Result<Vec<WaveformBuffer>> {
        Ok(self.pitch_clips(pitch)?.to_vec())
    }

    /// Returns the clip for a pitch and dynamics tier.
    pub fn waveform(&self, pitch: u8, tier: usize) -> Result<&WaveformBuffer> {
        let clips = self.pitch_clips(pitch)?;
        match clips.get(tier) {
            Some(clip) => Ok(clip),
            None => invalid(format!(
                "dynamics index {} is outside of the {} tiers of {}",
                tier,
                clips.len(),
                self.profile.kind
            )),
        }
    }

    fn pitch_clips(&self, pitch: u8) -> Result<&[WaveformBuffer]> {
        if !self.is_loaded() {
            return invalid(format!("{} is not loaded", self.profile.kind));
        }
        if !self.profile.contains(pitch) {
            return invalid(format!(
                "pitch {} is outside of the {} range {:?}",
                pitch, self.profile.kind, self.profile.pitches
            ));
        }
        Ok(&self.clips[(pitch - self.profile.pitches.start()) as usize])
    }

    /// Returns the memory used by the sample data in bytes.
    pub fn memory_size(&self) -> usize {
        self.clips
            .iter()
            .flatten()
            .map(WaveformBuffer::memory_size)
            .sum()
    }
}

impl fmt::Debug for InstrumentModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentModel")
            .field("kind", &self.profile.kind)
            .field("pitches", &self.profile.pitches)
            .field("tiers", &self.profile.dynamics.tier_count())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn tiny_piano() -> InstrumentModel {
        let profile = InstrumentProfile {
            pitches: 60..=62,
            ..InstrumentKind::Piano.profile()
        };
        let clips = profile
            .pitches
            .clone()
            .map(|pitch| {
                (0..3)
                    .map(|tier| WaveformBuffer::new(vec![pitch as f32 + tier as f32; 4]))
                    .collect()
            })
            .collect();
        InstrumentModel::new(profile, clips).unwrap()
    }

    #[test]
    fn test_audio_data_for_pitch() {
        let model = tiny_piano();
        let data = model.audio_data_for_pitch(61).unwrap();
        assert_eq!(data.len(), 3);
        assert_eq!(data[0].samples(), &[61.0; 4]);
        assert_eq!(data[2].samples(), &[63.0; 4]);
    }

    #[test]
    fn test_pitch_out_of_range() {
        let model = tiny_piano();
        assert!(matches!(
            model.audio_data_for_pitch(63),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            model.waveform(59, 0),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            model.waveform(60, 3),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_unloaded_instrument() {
        let model = InstrumentModel::unloaded(InstrumentKind::Marimba.profile());
        assert!(!model.is_loaded());
        assert!(matches!(
            model.audio_data_for_pitch(60),
            Err(Error::InvalidArgument(_))
        ));
        // Velocity mapping doesn't need samples.
        assert_eq!(model.dynamics_index(80).unwrap(), 0);
        assert!((model.gain_factor(80).unwrap() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_shape_is_validated() {
        let profile = InstrumentProfile {
            pitches: 60..=61,
            ..InstrumentKind::Piano.profile()
        };
        let missing_tier = vec![vec![WaveformBuffer::empty(); 3], vec![WaveformBuffer::empty(); 2]];
        assert!(InstrumentModel::new(profile.clone(), missing_tier).is_err());
        assert!(InstrumentModel::new(profile, vec![vec![WaveformBuffer::empty(); 3]]).is_err());
    }

    #[test]
    fn test_velocity_mapping() {
        let model = tiny_piano();
        assert_eq!(model.thresholds(), vec![50, 75, 100]);
        assert_eq!(model.dynamics_index(60).unwrap(), 1);
        assert!(model.gain_factor(101).is_err());
    }
}
