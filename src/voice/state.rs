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
use std::sync::atomic::{AtomicU8, Ordering};

/// The externally visible state of a voice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum VoiceState {
    /// Nothing is playing.
    Idle = 0,
    /// A note was requested and the audio callback has not picked it up yet.
    Starting = 1,
    Playing = 2,
    /// Fading out after a release.
    Releasing = 3,
    Paused = 4,
}

impl VoiceState {
    fn from_u8(value: u8) -> VoiceState {
        match value {
            1 => VoiceState::Starting,
            2 => VoiceState::Playing,
            3 => VoiceState::Releasing,
            4 => VoiceState::Paused,
            _ => VoiceState::Idle,
        }
    }

    /// Returns true if the voice is producing (or about to produce) sound.
    pub fn is_sounding(self) -> bool {
        matches!(
            self,
            VoiceState::Starting | VoiceState::Playing | VoiceState::Releasing
        )
    }
}

impl fmt::Display for VoiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VoiceState::Idle => "idle",
            VoiceState::Starting => "starting",
            VoiceState::Playing => "playing",
            VoiceState::Releasing => "releasing",
            VoiceState::Paused => "paused",
        };
        write!(f, "{}", name)
    }
}

/// A voice state that can be published by the audio thread and read anywhere.
#[derive(Debug)]
pub(crate) struct AtomicVoiceState(AtomicU8);

impl AtomicVoiceState {
    pub(crate) fn new(state: VoiceState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn load(&self) -> VoiceState {
        VoiceState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, state: VoiceState) {
        self.0.store(state as u8, Ordering::Release);
    }
}
