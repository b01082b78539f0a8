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

//! Songs and drum loops as timed note events.

pub mod midi;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audio::SAMPLE_RATE;
use crate::error::{invalid, Result};
use crate::instrument::dynamics::check_velocity;
use crate::instrument::{Drum, InstrumentKind};

/// One sound to mix into a rendered buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoteEvent {
    /// MIDI pitch for melodic instruments, drum index for the drum kit.
    pub sound: u8,
    /// 0 to 100.
    pub velocity: u8,
    /// Sample offset into the rendered buffer.
    pub offset: usize,
    /// For melodic notes, how many samples play before the release begins.
    /// Defaults to the full sample length.
    pub length: Option<usize>,
}

impl NoteEvent {
    pub fn new(sound: u8, velocity: u8, offset: usize) -> Self {
        Self {
            sound,
            velocity,
            offset,
            length: None,
        }
    }

    /// A drum hit.
    pub fn drum(drum: Drum, velocity: u8, offset: usize) -> Self {
        Self::new(drum.index(), velocity, offset)
    }

    pub fn with_length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }
}

/// A time signature. Only the beats per bar matter for timing; beats are
/// always counted in the tempo's unit.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(from = "[u8; 2]", into = "[u8; 2]")]
pub struct TimeSignature {
    pub beats_per_bar: u8,
    pub beat_unit: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            beats_per_bar: 4,
            beat_unit: 4,
        }
    }
}

impl From<[u8; 2]> for TimeSignature {
    fn from(value: [u8; 2]) -> Self {
        Self {
            beats_per_bar: value[0],
            beat_unit: value[1],
        }
    }
}

impl From<TimeSignature> for [u8; 2] {
    fn from(value: TimeSignature) -> Self {
        [value.beats_per_bar, value.beat_unit]
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.beats_per_bar, self.beat_unit)
    }
}

/// Converts musical time into sample offsets.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Timing {
    bpm: f64,
    time_signature: TimeSignature,
}

impl Timing {
    pub fn new(bpm: f64, time_signature: TimeSignature) -> Result<Self> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return invalid(format!("tempo {} must be a positive number of BPM", bpm));
        }
        if time_signature.beats_per_bar == 0 || time_signature.beat_unit == 0 {
            return invalid(format!("invalid time signature {}", time_signature));
        }
        Ok(Self {
            bpm,
            time_signature,
        })
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn time_signature(&self) -> TimeSignature {
        self.time_signature
    }

    pub fn samples_per_beat(&self) -> f64 {
        SAMPLE_RATE as f64 * 60.0 / self.bpm
    }

    /// The sample offset of a beat within a bar, both counted from zero.
    pub fn offset(&self, bar: u32, beat: f64) -> Result<usize> {
        let beats = bar as f64 * self.time_signature.beats_per_bar as f64 + beat;
        self.samples(beats)
    }

    /// The number of samples spanned by a number of beats.
    pub fn samples(&self, beats: f64) -> Result<usize> {
        if !beats.is_finite() || beats < 0.0 {
            return invalid(format!("{} beats is not a valid position", beats));
        }
        Ok((beats * self.samples_per_beat()).round() as usize)
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            time_signature: TimeSignature::default(),
        }
    }
}

/// A melodic song, optionally with a drum part that plays once through.
#[derive(Clone, Debug)]
pub struct Song {
    name: String,
    timing: Timing,
    instrument: InstrumentKind,
    notes: Vec<NoteEvent>,
    drums: Vec<NoteEvent>,
}

impl Song {
    /// Creates a song. Events are validated and sorted by offset.
    pub fn new(
        name: &str,
        timing: Timing,
        instrument: InstrumentKind,
        mut notes: Vec<NoteEvent>,
        mut drums: Vec<NoteEvent>,
    ) -> Result<Song> {
        if instrument == InstrumentKind::DrumKit {
            return invalid(format!(
                "song '{}' must use a melodic instrument, drums go in the drum part",
                name
            ));
        }
        if notes.is_empty() && drums.is_empty() {
            return invalid(format!("song '{}' has no notes", name));
        }
        validate_events(&notes)?;
        validate_drums(&drums)?;
        notes.sort_by_key(|note| note.offset);
        drums.sort_by_key(|hit| hit.offset);

        Ok(Song {
            name: name.to_string(),
            timing,
            instrument,
            notes,
            drums,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    pub fn instrument(&self) -> InstrumentKind {
        self.instrument
    }

    pub fn notes(&self) -> &[NoteEvent] {
        &self.notes
    }

    pub fn drums(&self) -> &[NoteEvent] {
        &self.drums
    }
}

/// A drum pattern meant to repeat. The final hit marks the loop length: it is
/// played at the start of the loop, where the next repetition begins.
#[derive(Clone, Debug)]
pub struct DrumLoop {
    name: String,
    timing: Timing,
    events: Vec<NoteEvent>,
}

impl DrumLoop {
    /// Creates a drum loop. Events are validated and sorted by offset, and the
    /// last one must come after the start.
    pub fn new(name: &str, timing: Timing, mut events: Vec<NoteEvent>) -> Result<DrumLoop> {
        validate_drums(&events)?;
        events.sort_by_key(|hit| hit.offset);
        match events.last() {
            Some(last) if last.offset > 0 => {}
            _ => {
                return invalid(format!(
                    "drum loop '{}' needs a final hit after the start to mark its length",
                    name
                ))
            }
        }

        Ok(DrumLoop {
            name: name.to_string(),
            timing,
            events,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    pub fn events(&self) -> &[NoteEvent] {
        &self.events
    }

    /// The loop length in samples: the offset of the final hit.
    pub fn length(&self) -> usize {
        self.events.last().map(|hit| hit.offset).unwrap_or(0)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.length() as f64 / SAMPLE_RATE as f64)
    }
}

fn validate_events(events: &[NoteEvent]) -> Result<()> {
    events
        .iter()
        .try_for_each(|event| check_velocity(event.velocity))
}

fn validate_drums(events: &[NoteEvent]) -> Result<()> {
    validate_events(events)?;
    events
        .iter()
        .try_for_each(|event| Drum::from_index(event.sound).map(|_| ()))
}
