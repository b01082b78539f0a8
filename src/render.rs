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

//! Offline mixdown of songs and drum loops into single buffers.
//!
//! Rendering happens entirely outside the audio thread. The result is handed
//! to a [`crate::voice::PlaybackVoice`] as one clip.

pub mod choke;
pub mod mix;

use std::time::Instant;

use tracing::{debug, info};

use crate::audio::WaveformBuffer;
use crate::error::{invalid, Result};
use crate::instrument::{Drum, InstrumentKind, InstrumentModel};
use crate::song::{DrumLoop, NoteEvent, Song};
use choke::{choke_lengths, DrumHit};
use mix::{mix_into, mix_with_release, RELEASE_STEP};

/// A note resolved against its instrument, ready to mix.
struct Voiced<'a> {
    samples: &'a [f32],
    gain: f32,
    offset: usize,
    /// Samples to mix before the release (melodic) or the choke (drums).
    length: usize,
}

impl Voiced<'_> {
    fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// Renders songs and drum loops from loaded instruments.
pub struct SongRenderer<'a> {
    instrument: &'a InstrumentModel,
    drums: Option<&'a InstrumentModel>,
}

impl<'a> SongRenderer<'a> {
    /// Creates a renderer for songs played on the given melodic instrument.
    pub fn new(instrument: &'a InstrumentModel) -> Self {
        Self {
            instrument,
            drums: None,
        }
    }

    /// Adds the drum kit used for drum parts and drum loops.
    pub fn with_drums(mut self, drums: &'a InstrumentModel) -> Self {
        self.drums = Some(drums);
        self
    }

    /// Renders a song. The buffer ends when the last note's held portion (or the
    /// last drum hit) ends, so release tails past that point are cut.
    pub fn render_song(&self, song: &Song) -> Result<WaveformBuffer> {
        let start = Instant::now();
        if song.instrument() != self.instrument.kind() {
            return invalid(format!(
                "song '{}' is for {}, the renderer has {}",
                song.name(),
                song.instrument(),
                self.instrument.kind()
            ));
        }

        let notes = song
            .notes()
            .iter()
            .map(|note| self.voice_note(note))
            .collect::<Result<Vec<_>>>()?;
        let (hits, chokes) = if song.drums().is_empty() {
            (Vec::new(), 0)
        } else {
            let placed: Vec<(NoteEvent, usize)> =
                song.drums().iter().map(|hit| (*hit, hit.offset)).collect();
            self.voice_drums(&placed, None)?
        };

        let length = notes
            .iter()
            .chain(hits.iter())
            .map(Voiced::end)
            .max()
            .unwrap_or(0);
        let mut buffer = vec![0.0f32; length];

        for (note, event) in notes.iter().zip(song.notes()) {
            mix_with_release(
                &mut buffer,
                note.samples,
                note.offset,
                note.gain,
                event.length.unwrap_or(note.samples.len()),
                RELEASE_STEP,
            );
        }
        for hit in hits.iter() {
            mix_into(&mut buffer, &hit.samples[..hit.length], hit.offset, hit.gain);
        }

        info!(
            song = song.name(),
            notes = notes.len(),
            drums = hits.len(),
            chokes,
            samples = length,
            elapsed_ms = start.elapsed().as_millis(),
            "Song rendered"
        );
        Ok(WaveformBuffer::new(buffer))
    }

    /// Renders one pass of a drum loop. The buffer is exactly as long as the
    /// final hit's offset and every hit on that offset is mixed at the start,
    /// so playing the buffer on repeat closes the loop. Hits ringing past the
    /// end are cut.
    pub fn render_drum_loop(&self, drum_loop: &DrumLoop) -> Result<WaveformBuffer> {
        let start = Instant::now();
        let length = drum_loop.length();
        if length == 0 {
            return invalid(format!("drum loop '{}' is empty", drum_loop.name()));
        }

        // Move the closing hits to the front at offset 0, keeping offset order.
        let (closing, rest): (Vec<&NoteEvent>, Vec<&NoteEvent>) = drum_loop
            .events()
            .iter()
            .partition(|hit| hit.offset == length);
        let placed: Vec<(NoteEvent, usize)> = closing
            .into_iter()
            .map(|hit| (*hit, 0))
            .chain(rest.into_iter().map(|hit| (*hit, hit.offset)))
            .collect();

        let (hits, chokes) = self.voice_drums(&placed, Some(length))?;
        let mut buffer = vec![0.0f32; length];
        for hit in hits.iter() {
            mix_into(&mut buffer, &hit.samples[..hit.length], hit.offset, hit.gain);
        }

        info!(
            drum_loop = drum_loop.name(),
            hits = hits.len(),
            chokes,
            samples = length,
            elapsed_ms = start.elapsed().as_millis(),
            "Drum loop rendered"
        );
        Ok(WaveformBuffer::new(buffer))
    }

    fn voice_note(&self, note: &NoteEvent) -> Result<Voiced<'a>> {
        let instrument = self.instrument;
        let tier = instrument.dynamics_index(note.velocity)?;
        let gain = instrument.gain_factor(note.velocity)?;
        let samples = instrument.waveform(note.sound, tier)?.samples();
        Ok(Voiced {
            samples,
            gain,
            offset: note.offset,
            length: note.length.unwrap_or(samples.len()),
        })
    }

    /// Resolves drum hits placed at the given offsets, which must be sorted.
    /// Returns the hits and how many were choked.
    fn voice_drums(
        &self,
        placed: &[(NoteEvent, usize)],
        loop_length: Option<usize>,
    ) -> Result<(Vec<Voiced<'a>>, usize)> {
        let drums = match self.drums {
            Some(drums) if drums.kind() == InstrumentKind::DrumKit => drums,
            Some(other) => return invalid(format!("{} is not a drum kit", other.kind())),
            None => return invalid("no drum kit was given to the renderer"),
        };

        let hits = placed
            .iter()
            .map(|(event, offset)| {
                Ok(DrumHit {
                    drum: Drum::from_index(event.sound)?,
                    offset: *offset,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let limits = choke_lengths(&hits, loop_length);

        let mut chokes = 0;
        let mut voiced = Vec::with_capacity(placed.len());
        for (((event, offset), hit), limit) in placed.iter().zip(&hits).zip(limits) {
            let tier = drums.dynamics_index(event.velocity)?;
            let gain = drums.gain_factor(event.velocity)?;
            let samples = drums.waveform(event.sound, tier)?.samples();
            let length = match limit {
                Some(limit) if limit < samples.len() => {
                    debug!(drum = %hit.drum, offset, limit, "Hi-hat choked");
                    chokes += 1;
                    limit
                }
                _ => samples.len(),
            };
            voiced.push(Voiced {
                samples,
                gain,
                offset: *offset,
                length,
            });
        }
        Ok((voiced, chokes))
    }
}
