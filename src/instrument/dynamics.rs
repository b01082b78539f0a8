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

//! Velocity handling: dynamics tier selection and velocity to gain mapping.

use serde::{Deserialize, Serialize};

use crate::error::{invalid, Result};

/// Velocities run from 0 (silent) to this value (hardest strike).
pub const MAX_VELOCITY: u8 = 100;

/// A named dynamics tier with an inclusive upper velocity threshold.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct DynamicsLevel {
    /// The tier name, e.g. "mf". Used when naming sample files.
    pub name: String,
    /// The highest velocity this tier covers.
    pub threshold: u8,
}

impl DynamicsLevel {
    /// Creates a new dynamics level.
    pub fn new(name: &str, threshold: u8) -> Self {
        Self {
            name: name.to_string(),
            threshold,
        }
    }
}

/// The ordered dynamics tiers of an instrument. May be empty, in which case the
/// instrument has a single sample set and gain is simply velocity / 100.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dynamics {
    levels: Vec<DynamicsLevel>,
    /// Gain at each tier's upper threshold. Non-decreasing, last is 1.0.
    boundary_gains: Vec<f32>,
}

impl Dynamics {
    /// No dynamics tiers.
    pub fn none() -> Self {
        Self::default()
    }

    /// Creates validated dynamics tiers. Thresholds must be strictly increasing,
    /// non-zero, and the last must equal [`MAX_VELOCITY`].
    pub fn new(levels: Vec<DynamicsLevel>) -> Result<Self> {
        if levels.is_empty() {
            return Ok(Self::none());
        }

        if levels[0].threshold == 0 {
            return invalid(format!(
                "dynamics tier '{}' has a zero threshold",
                levels[0].name
            ));
        }
        for pair in levels.windows(2) {
            if pair[1].threshold <= pair[0].threshold {
                return invalid(format!(
                    "dynamics thresholds must be strictly increasing ({} then {})",
                    pair[0].threshold, pair[1].threshold
                ));
            }
        }
        let top = levels[levels.len() - 1].threshold;
        if top != MAX_VELOCITY {
            return invalid(format!(
                "the last dynamics threshold must be {}, got {}",
                MAX_VELOCITY, top
            ));
        }

        // The gain at the boundary between a tier and the one above it is
        // lower / upper threshold, so that the quieter sample at full gain meets the
        // louder sample scaled down. A running maximum keeps the mapping monotonic
        // for unevenly spaced tiers.
        let mut boundary_gains = Vec::with_capacity(levels.len());
        let mut previous = 0.0f32;
        for (i, level) in levels.iter().enumerate() {
            let gain = match levels.get(i + 1) {
                Some(next) => (level.threshold as f32 / next.threshold as f32).max(previous),
                None => 1.0,
            };
            boundary_gains.push(gain);
            previous = gain;
        }

        Ok(Self {
            levels,
            boundary_gains,
        })
    }

    /// Creates tiers from bare thresholds, naming them "t0", "t1", ...
    pub fn from_thresholds(thresholds: &[u8]) -> Result<Self> {
        Self::new(
            thresholds
                .iter()
                .enumerate()
                .map(|(i, threshold)| DynamicsLevel::new(&format!("t{}", i), *threshold))
                .collect(),
        )
    }

    /// The tiers, ordered by increasing threshold.
    pub fn levels(&self) -> &[DynamicsLevel] {
        &self.levels
    }

    /// The tier thresholds, ordered by increasing threshold.
    pub fn thresholds(&self) -> Vec<u8> {
        self.levels.iter().map(|level| level.threshold).collect()
    }

    /// Returns true if no tiers are configured.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Number of sample sets per pitch. An instrument without tiers still has one.
    pub fn tier_count(&self) -> usize {
        self.levels.len().max(1)
    }

    /// Returns the index of the smallest tier that covers the velocity, or 0 if
    /// there are no tiers.
    pub fn index(&self, velocity: u8) -> Result<usize> {
        check_velocity(velocity)?;

        let mut index = 0;
        for i in (0..self.levels.len()).rev() {
            if self.levels[i].threshold >= velocity {
                index = i;
            }
        }
        Ok(index)
    }

    /// Maps a velocity to a gain factor in [0, 1].
    ///
    /// Within a tier the gain is linear between the boundary gains at the tier's
    /// lower and upper thresholds, so the mapping is continuous across tiers.
    pub fn gain(&self, velocity: u8) -> Result<f32> {
        let index = self.index(velocity)?;
        if self.levels.is_empty() {
            return Ok(velocity as f32 / MAX_VELOCITY as f32);
        }

        let (lower, start) = match index {
            0 => (0.0, 0.0),
            i => (
                self.levels[i - 1].threshold as f32,
                self.boundary_gains[i - 1],
            ),
        };
        let upper = self.levels[index].threshold as f32;
        let end = self.boundary_gains[index];

        let position = (velocity as f32 - lower) / (upper - lower);
        Ok(start + (end - start) * position)
    }

    /// The peak a tier is normalised to, relative to the loudest tier.
    pub fn relative_peak(&self, tier: usize) -> f32 {
        match (self.levels.get(tier), self.levels.last()) {
            (Some(level), Some(top)) => level.threshold as f32 / top.threshold as f32,
            _ => 1.0,
        }
    }
}

/// Rejects velocities outside of [0, 100].
pub fn check_velocity(velocity: u8) -> Result<()> {
    if velocity > MAX_VELOCITY {
        return invalid(format!(
            "velocity {} is outside of [0, {}]",
            velocity, MAX_VELOCITY
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn piano() -> Dynamics {
        Dynamics::new(vec![
            DynamicsLevel::new("pp", 50),
            DynamicsLevel::new("mf", 75),
            DynamicsLevel::new("ff", 100),
        ])
        .unwrap()
    }

    #[test]
    fn test_index_without_tiers() {
        let dynamics = Dynamics::none();
        assert_eq!(dynamics.index(0).unwrap(), 0);
        assert_eq!(dynamics.index(100).unwrap(), 0);
        assert_eq!(dynamics.tier_count(), 1);
    }

    #[test]
    fn test_index_selects_smallest_covering_tier() {
        let dynamics = piano();
        assert_eq!(dynamics.index(0).unwrap(), 0);
        assert_eq!(dynamics.index(50).unwrap(), 0);
        assert_eq!(dynamics.index(51).unwrap(), 1);
        assert_eq!(dynamics.index(75).unwrap(), 1);
        assert_eq!(dynamics.index(76).unwrap(), 2);
        assert_eq!(dynamics.index(100).unwrap(), 2);
    }

    #[test]
    fn test_index_is_monotonic() {
        let dynamics = Dynamics::from_thresholds(&[10, 20, 45, 80, 100]).unwrap();
        let mut last = 0;
        for velocity in 0..=MAX_VELOCITY {
            let index = dynamics.index(velocity).unwrap();
            assert!(index >= last, "index dropped at velocity {}", velocity);
            last = index;
        }
        assert_eq!(last, 4);
    }

    #[test]
    fn test_gain_without_tiers() {
        let dynamics = Dynamics::none();
        assert_eq!(dynamics.gain(0).unwrap(), 0.0);
        assert!((dynamics.gain(40).unwrap() - 0.4).abs() < 1e-6);
        assert_eq!(dynamics.gain(100).unwrap(), 1.0);
    }

    #[test]
    fn test_gain_is_continuous_at_tier_boundaries() {
        let dynamics = piano();
        for boundary in [50u8, 75] {
            let below = dynamics.gain(boundary).unwrap();
            let above = dynamics.gain(boundary + 1).unwrap();
            assert!(
                (above - below).abs() < 0.01,
                "gain jumps from {} to {} at {}",
                below,
                above,
                boundary
            );
        }
        assert!((dynamics.gain(50).unwrap() - 50.0 / 75.0).abs() < 1e-6);
        assert!((dynamics.gain(75).unwrap() - 0.75).abs() < 1e-6);
        assert_eq!(dynamics.gain(100).unwrap(), 1.0);
        assert_eq!(dynamics.gain(0).unwrap(), 0.0);
    }

    #[test]
    fn test_gain_is_monotonic() {
        for dynamics in [
            piano(),
            Dynamics::from_thresholds(&[50, 55, 100]).unwrap(),
            Dynamics::from_thresholds(&[100]).unwrap(),
        ] {
            let mut last = 0.0f32;
            for velocity in 0..=MAX_VELOCITY {
                let gain = dynamics.gain(velocity).unwrap();
                assert!((0.0..=1.0).contains(&gain));
                assert!(gain >= last - 1e-6, "gain dropped at velocity {}", velocity);
                last = gain;
            }
        }
    }

    #[test]
    fn test_velocity_out_of_range() {
        assert!(matches!(piano().index(101), Err(Error::InvalidArgument(_))));
        assert!(matches!(
            Dynamics::none().gain(200),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_invalid_thresholds() {
        assert!(Dynamics::from_thresholds(&[50, 50, 100]).is_err());
        assert!(Dynamics::from_thresholds(&[75, 50, 100]).is_err());
        assert!(Dynamics::from_thresholds(&[50, 75]).is_err());
        assert!(Dynamics::from_thresholds(&[0, 100]).is_err());
        assert!(Dynamics::from_thresholds(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_relative_peak() {
        let dynamics = piano();
        assert!((dynamics.relative_peak(0) - 0.5).abs() < 1e-6);
        assert!((dynamics.relative_peak(1) - 0.75).abs() < 1e-6);
        assert_eq!(dynamics.relative_peak(2), 1.0);
        assert_eq!(Dynamics::none().relative_peak(0), 1.0);
    }
}
