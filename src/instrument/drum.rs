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

use serde::{Deserialize, Serialize};

use crate::error::{invalid, Result};

/// The pieces of the drum kit. The discriminant is the drum's index in the kit,
/// which is also the "pitch" a drum kit instrument is addressed by.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Drum {
    Kick = 0,
    Snare = 1,
    SnareRim = 2,
    SideStick = 3,
    ClosedHiHat = 4,
    PedalHiHat = 5,
    OpenHiHat = 6,
    HighTom = 7,
    MidTom = 8,
    LowTom = 9,
    FloorTom = 10,
    Crash = 11,
    Crash2 = 12,
    Ride = 13,
    RideBell = 14,
    Splash = 15,
    China = 16,
    Cowbell = 17,
}

impl Drum {
    /// Every drum in kit order.
    pub const ALL: [Drum; 18] = [
        Drum::Kick,
        Drum::Snare,
        Drum::SnareRim,
        Drum::SideStick,
        Drum::ClosedHiHat,
        Drum::PedalHiHat,
        Drum::OpenHiHat,
        Drum::HighTom,
        Drum::MidTom,
        Drum::LowTom,
        Drum::FloorTom,
        Drum::Crash,
        Drum::Crash2,
        Drum::Ride,
        Drum::RideBell,
        Drum::Splash,
        Drum::China,
        Drum::Cowbell,
    ];

    /// The number of drums in the kit.
    pub const COUNT: u8 = Self::ALL.len() as u8;

    /// Looks up a drum by its kit index.
    pub fn from_index(index: u8) -> Result<Drum> {
        match Self::ALL.get(index as usize) {
            Some(drum) => Ok(*drum),
            None => invalid(format!(
                "drum index {} is outside of [0, {})",
                index,
                Self::COUNT
            )),
        }
    }

    /// The drum's index in the kit.
    pub fn index(self) -> u8 {
        self as u8
    }

    /// The file stem used for this drum's sample.
    pub fn name(self) -> &'static str {
        match self {
            Drum::Kick => "kick",
            Drum::Snare => "snare",
            Drum::SnareRim => "snare_rim",
            Drum::SideStick => "side_stick",
            Drum::ClosedHiHat => "closed_hi_hat",
            Drum::PedalHiHat => "pedal_hi_hat",
            Drum::OpenHiHat => "open_hi_hat",
            Drum::HighTom => "high_tom",
            Drum::MidTom => "mid_tom",
            Drum::LowTom => "low_tom",
            Drum::FloorTom => "floor_tom",
            Drum::Crash => "crash",
            Drum::Crash2 => "crash2",
            Drum::Ride => "ride",
            Drum::RideBell => "ride_bell",
            Drum::Splash => "splash",
            Drum::China => "china",
            Drum::Cowbell => "cowbell",
        }
    }

    /// True for any hit on the hi-hat, which chokes a ringing open hi-hat.
    pub fn is_hi_hat(self) -> bool {
        matches!(
            self,
            Drum::ClosedHiHat | Drum::PedalHiHat | Drum::OpenHiHat
        )
    }

    /// True for the one hit that rings until choked.
    pub fn is_open_hi_hat(self) -> bool {
        self == Drum::OpenHiHat
    }
}

impl fmt::Display for Drum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kit_order_matches_index() {
        assert_eq!(Drum::COUNT, 18);
        for (i, drum) in Drum::ALL.iter().enumerate() {
            assert_eq!(drum.index() as usize, i);
            assert_eq!(Drum::from_index(i as u8).unwrap(), *drum);
        }
        assert!(Drum::from_index(18).is_err());
    }

    #[test]
    fn test_hi_hat_flags() {
        let hi_hats: Vec<Drum> = Drum::ALL.into_iter().filter(|d| d.is_hi_hat()).collect();
        assert_eq!(
            hi_hats,
            vec![Drum::ClosedHiHat, Drum::PedalHiHat, Drum::OpenHiHat]
        );
        assert!(Drum::OpenHiHat.is_open_hi_hat());
        assert!(!Drum::ClosedHiHat.is_open_hi_hat());
    }
}
