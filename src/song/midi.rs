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

//! Standard MIDI File import.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;

use midly::{Format, MetaMessage, MidiMessage, Smf, TrackEventKind};
use tracing::{debug, info, warn};

use super::{NoteEvent, Song, TimeSignature, Timing};
use crate::audio::SAMPLE_RATE;
use crate::error::{Error, Result};
use crate::instrument::{Drum, InstrumentKind, InstrumentProfile};

/// MIDI channel 10, which General MIDI reserves for percussion.
const PERCUSSION_CHANNEL: u8 = 9;

/// Microseconds per beat until the file sets a tempo (120 BPM).
const DEFAULT_TEMPO: u32 = 500_000;

/// Reads a Standard MIDI File into a song. Notes on the percussion channel
/// become the drum part.
pub fn import(path: &Path, instrument: InstrumentKind) -> Result<Song> {
    let bytes = fs::read(path)?;
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "midi".to_string());
    import_bytes(&name, &bytes, instrument)
}

/// Parses Standard MIDI File data into a song.
pub fn import_bytes(name: &str, bytes: &[u8], instrument: InstrumentKind) -> Result<Song> {
    let smf = Smf::parse(bytes).map_err(|e| Error::Midi(e.to_string()))?;
    let ticks_per_beat = match smf.header.timing {
        midly::Timing::Metrical(ticks) => ticks.as_int() as u64,
        midly::Timing::Timecode(..) => {
            return Err(Error::Midi("SMPTE timecode files are not supported".to_string()))
        }
    };
    if ticks_per_beat == 0 {
        return Err(Error::Midi("zero ticks per beat".to_string()));
    }

    // Flatten every track onto one timeline of absolute ticks.
    let mut events = Vec::new();
    let mut track_start = 0u64;
    for track in smf.tracks.iter() {
        let mut tick = track_start;
        for event in track {
            tick += event.delta.as_int() as u64;
            events.push((tick, event.kind));
        }
        if smf.header.format == Format::Sequential {
            track_start = tick;
        }
    }
    events.sort_by_key(|(tick, _)| *tick);

    let profile = instrument.profile();
    let mut converter = TickConverter::new(ticks_per_beat);
    let mut initial_tempo = DEFAULT_TEMPO;
    let mut time_signature = None;
    // Overlapping notes on one key pair up first in, first out.
    let mut held: HashMap<(u8, u8), VecDeque<(usize, u8)>> = HashMap::new();
    let mut notes = Vec::new();
    let mut drums = Vec::new();
    let mut skipped = 0usize;

    for (tick, kind) in events.iter() {
        let offset = converter.offset(*tick);
        match kind {
            TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => {
                converter.set_tempo(*tick, tempo.as_int());
                if *tick == 0 {
                    initial_tempo = tempo.as_int();
                }
            }
            TrackEventKind::Meta(MetaMessage::TimeSignature(numerator, denominator, ..)) => {
                time_signature.get_or_insert(TimeSignature {
                    beats_per_bar: *numerator,
                    beat_unit: 1u8.checked_shl(*denominator as u32).unwrap_or(4),
                });
            }
            TrackEventKind::Midi { channel, message } => {
                let channel = channel.as_int();
                let (key, velocity) = match message {
                    MidiMessage::NoteOn { key, vel } => (key.as_int(), vel.as_int()),
                    MidiMessage::NoteOff { key, .. } => (key.as_int(), 0),
                    _ => continue,
                };

                if channel == PERCUSSION_CHANNEL {
                    if velocity == 0 {
                        continue;
                    }
                    match gm_drum(key) {
                        Some(drum) => {
                            drums.push(NoteEvent::drum(drum, scale_velocity(velocity), offset))
                        }
                        None => skipped += 1,
                    }
                    continue;
                }

                if velocity > 0 {
                    held
                        .entry((channel, key))
                        .or_default()
                        .push_back((offset, velocity));
                } else if let Some((start, velocity)) =
                    held.get_mut(&(channel, key)).and_then(|starts| starts.pop_front())
                {
                    push_note(&mut notes, &mut skipped, &profile, key, velocity, start, offset);
                }
            }
            _ => {}
        }
    }

    // Notes that never get a note off end with the file.
    let end = events
        .last()
        .map(|(tick, _)| converter.offset(*tick))
        .unwrap_or(0);
    for ((_, key), starts) in held {
        for (start, velocity) in starts {
            push_note(&mut notes, &mut skipped, &profile, key, velocity, start, end);
        }
    }

    if skipped > 0 {
        warn!(
            song = name,
            skipped,
            instrument = %instrument,
            "Skipped notes the instrument cannot play"
        );
    }

    let bpm = 60_000_000.0 / initial_tempo as f64;
    let timing = Timing::new(bpm, time_signature.unwrap_or_default())?;
    info!(
        song = name,
        notes = notes.len(),
        drums = drums.len(),
        bpm,
        "Imported MIDI file"
    );
    Song::new(name, timing, instrument, notes, drums)
}

fn push_note(
    notes: &mut Vec<NoteEvent>,
    skipped: &mut usize,
    profile: &InstrumentProfile,
    key: u8,
    velocity: u8,
    start: usize,
    end: usize,
) {
    if !profile.contains(key) {
        debug!(key, "Note outside of instrument range");
        *skipped += 1;
        return;
    }
    notes.push(NoteEvent::new(key, scale_velocity(velocity), start).with_length(end - start));
}

/// Scales a MIDI velocity (0 to 127) to 0 to 100.
fn scale_velocity(velocity: u8) -> u8 {
    ((velocity.min(127) as u32 * 100 + 63) / 127) as u8
}

/// Maps a General MIDI percussion key to a drum in the kit.
fn gm_drum(key: u8) -> Option<Drum> {
    Some(match key {
        35 | 36 => Drum::Kick,
        37 => Drum::SideStick,
        38 => Drum::Snare,
        40 => Drum::SnareRim,
        41 | 43 => Drum::FloorTom,
        42 => Drum::ClosedHiHat,
        44 => Drum::PedalHiHat,
        45 => Drum::LowTom,
        46 => Drum::OpenHiHat,
        47 | 48 => Drum::MidTom,
        49 => Drum::Crash,
        50 => Drum::HighTom,
        51 | 59 => Drum::Ride,
        52 => Drum::China,
        53 => Drum::RideBell,
        55 => Drum::Splash,
        56 => Drum::Cowbell,
        57 => Drum::Crash2,
        _ => return None,
    })
}

/// Converts absolute ticks to sample offsets, honouring tempo changes.
/// Ticks must be given in non-decreasing order.
struct TickConverter {
    ticks_per_beat: u64,
    tempo: u32,
    /// Tick and time, in microseconds, of the last tempo change.
    anchor_tick: u64,
    anchor_micros: f64,
}

impl TickConverter {
    fn new(ticks_per_beat: u64) -> Self {
        Self {
            ticks_per_beat,
            tempo: DEFAULT_TEMPO,
            anchor_tick: 0,
            anchor_micros: 0.0,
        }
    }

    fn micros(&self, tick: u64) -> f64 {
        let ticks = tick.saturating_sub(self.anchor_tick) as f64;
        self.anchor_micros + ticks * self.tempo as f64 / self.ticks_per_beat as f64
    }

    fn offset(&self, tick: u64) -> usize {
        (self.micros(tick) * SAMPLE_RATE as f64 / 1_000_000.0).round() as usize
    }

    fn set_tempo(&mut self, tick: u64, tempo: u32) {
        self.anchor_micros = self.micros(tick);
        self.anchor_tick = tick;
        self.tempo = tempo;
    }
}
