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
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use super::drum::Drum;
use super::dynamics::{Dynamics, DynamicsLevel};

const NOTE_NAMES: [&str; 12] = [
    "C", "Cs", "D", "Ds", "E", "F", "Fs", "G", "Gs", "A", "As", "B",
];

/// The instruments the engine knows how to load.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    Piano,
    Marimba,
    DrumKit,
}

impl InstrumentKind {
    pub const ALL: [InstrumentKind; 3] = [
        InstrumentKind::Piano,
        InstrumentKind::Marimba,
        InstrumentKind::DrumKit,
    ];

    /// Returns the built-in profile for this kind.
    pub fn profile(self) -> InstrumentProfile {
        match self {
            InstrumentKind::Piano => InstrumentProfile {
                kind: self,
                pitches: 21..=108,
                dynamics: piano_dynamics(),
                naming: FileNaming::PitchByTier {
                    prefix: "piano".to_string(),
                },
            },
            InstrumentKind::Marimba => InstrumentProfile {
                kind: self,
                pitches: 45..=96,
                dynamics: Dynamics::none(),
                naming: FileNaming::Pitch {
                    prefix: "marimba".to_string(),
                },
            },
            InstrumentKind::DrumKit => InstrumentProfile {
                kind: self,
                pitches: 0..=Drum::COUNT - 1,
                dynamics: Dynamics::none(),
                naming: FileNaming::Drum {
                    prefix: "drums".to_string(),
                },
            },
        }
    }

    /// The name of the instrument kind.
    pub fn name(self) -> &'static str {
        match self {
            InstrumentKind::Piano => "piano",
            InstrumentKind::Marimba => "marimba",
            InstrumentKind::DrumKit => "drum_kit",
        }
    }
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn piano_dynamics() -> Dynamics {
    Dynamics::new(vec![
        DynamicsLevel::new("pp", 50),
        DynamicsLevel::new("mf", 75),
        DynamicsLevel::new("ff", 100),
    ])
    .unwrap_or_default()
}

/// How sample resources are named for an instrument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileNaming {
    /// `<prefix>/<tier>/<note><octave>`, e.g. `piano/mf/Cs4`.
    PitchByTier { prefix: String },
    /// `<prefix>/<note><octave>`, e.g. `marimba/A3`.
    Pitch { prefix: String },
    /// `<prefix>/<drum>`, e.g. `drums/open_hi_hat`.
    Drum { prefix: String },
}

/// Everything that distinguishes one instrument kind from another: which
/// pitches it has, its dynamics tiers and where its samples live.
#[derive(Clone, Debug, PartialEq)]
pub struct InstrumentProfile {
    pub kind: InstrumentKind,
    pub pitches: RangeInclusive<u8>,
    pub dynamics: Dynamics,
    pub naming: FileNaming,
}

impl InstrumentProfile {
    /// Replaces the dynamics tiers.
    pub fn with_dynamics(mut self, dynamics: Dynamics) -> Self {
        self.dynamics = dynamics;
        self
    }

    /// Number of pitches (or drums) the instrument has.
    pub fn pitch_count(&self) -> usize {
        self.pitches.clone().count()
    }

    /// Returns true if the instrument has the given pitch.
    pub fn contains(&self, pitch: u8) -> bool {
        self.pitches.contains(&pitch)
    }

    /// The resource name of the sample for a pitch and dynamics tier.
    pub fn resource(&self, pitch: u8, tier: usize) -> String {
        match &self.naming {
            FileNaming::PitchByTier { prefix } => {
                let tier_name = self
                    .dynamics
                    .levels()
                    .get(tier)
                    .map(|level| level.name.as_str())
                    .unwrap_or("default");
                format!("{}/{}/{}", prefix, tier_name, note_name(pitch))
            }
            FileNaming::Pitch { prefix } => format!("{}/{}", prefix, note_name(pitch)),
            FileNaming::Drum { prefix } => match Drum::from_index(pitch) {
                Ok(drum) => format!("{}/{}", prefix, drum.name()),
                Err(_) => format!("{}/{}", prefix, pitch),
            },
        }
    }
}

/// Scientific pitch name for a MIDI note number with sharps spelled "s",
/// e.g. 60 is "C4" and 61 is "Cs4".
pub fn note_name(pitch: u8) -> String {
    let octave = pitch as i32 / 12 - 1;
    format!("{}{}", NOTE_NAMES[pitch as usize % 12], octave)
}
