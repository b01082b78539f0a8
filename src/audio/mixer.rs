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
// Voice mixing shared by the cpal and mock outputs.
use crossbeam_channel::{Receiver, Sender};
use tracing::debug;

use crate::error::{invalid, Result};
use crate::voice::{PlaybackVoice, VoiceRenderer};

/// Voices are expected to be added up front. Adding more than this makes the
/// audio thread grow its voice list once.
const INITIAL_VOICE_CAPACITY: usize = 256;

/// Sums every voice into the output buffer. Owned by the audio thread.
pub struct VoiceMixer {
    voices: Vec<VoiceRenderer>,
    /// New voices from control threads.
    incoming: Receiver<VoiceRenderer>,
    /// Renderers whose control handle is gone, handed back to be dropped off
    /// the audio thread.
    reaped: Sender<VoiceRenderer>,
    /// Keeps the reaper channel connected so handing a renderer back never
    /// fails, even with no handle left to drain it.
    _reaped_rx: Receiver<VoiceRenderer>,
    channels: u16,
}

/// Adds voices to a running mixer and disposes of the ones it removed.
#[derive(Clone)]
pub struct MixerHandle {
    voices: Sender<VoiceRenderer>,
    reaped: Receiver<VoiceRenderer>,
}

impl VoiceMixer {
    /// Creates a mixer for interleaved output with the given channel count.
    pub fn new(channels: u16) -> (VoiceMixer, MixerHandle) {
        let (voices_tx, voices_rx) = crossbeam_channel::unbounded();
        let (reaped_tx, reaped_rx) = crossbeam_channel::unbounded();
        let mixer = VoiceMixer {
            voices: Vec::with_capacity(INITIAL_VOICE_CAPACITY),
            incoming: voices_rx,
            reaped: reaped_tx,
            _reaped_rx: reaped_rx.clone(),
            channels: channels.max(1),
        };
        let handle = MixerHandle {
            voices: voices_tx,
            reaped: reaped_rx,
        };
        (mixer, handle)
    }

    /// Returns the number of output channels.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Returns the number of voices being mixed.
    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Fills an interleaved buffer with the sum of every voice.
    pub fn process_into_output(&mut self, out: &mut [f32]) {
        while let Ok(voice) = self.incoming.try_recv() {
            self.voices.push(voice);
        }

        out.fill(0.0);
        let channels = self.channels as usize;
        for voice in self.voices.iter_mut() {
            voice.render_into(out, channels);
        }

        let mut index = 0;
        while index < self.voices.len() {
            if self.voices[index].is_detached() {
                let voice = self.voices.swap_remove(index);
                // The mixer holds a receiver, so this cannot fail.
                let _ = self.reaped.send(voice);
            } else {
                index += 1;
            }
        }
    }
}

impl MixerHandle {
    /// Creates a voice and attaches its renderer to the mixer.
    pub fn add_voice(&self, name: &str) -> Result<PlaybackVoice> {
        self.reap();
        let (voice, renderer) = PlaybackVoice::new(name);
        if self.voices.send(renderer).is_err() {
            return invalid(format!("mixer for voice '{}' is gone", name));
        }
        debug!(voice = name, "Voice added to mixer");
        Ok(voice)
    }

    /// Drops the renderers of voices the mixer has removed since the last call.
    /// Returns how many were dropped.
    pub fn reap(&self) -> usize {
        let reaped = self.reaped.try_iter().count();
        if reaped > 0 {
            debug!(reaped, "Dropped detached voices");
        }
        reaped
    }
}
