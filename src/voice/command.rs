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

/// Capacity of each voice's command queue.
pub(crate) const COMMAND_QUEUE_SIZE: usize = 64;

/// A request from a control thread, applied at the start of the next audio callback.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Command {
    /// Start a note from `offset` in the clip of dynamics tier `tier`.
    BeginPlaying { gain: f32, tier: usize, offset: usize },
    BeginRelease,
    Pause,
    /// Continue from the current cursor.
    Resume,
    Stop,
}

/// A command tagged with the audio data generation it was issued against.
/// Commands for data that has since been replaced are dropped.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Envelope {
    pub generation: u64,
    pub command: Command,
}
