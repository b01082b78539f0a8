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
use std::path::Path;

use config::{Config, File, FileFormat};
use serde::Deserialize;

use super::error::ConfigError;
use crate::error::Result;
use crate::instrument::{Drum, InstrumentKind};
use crate::song::{DrumLoop, NoteEvent, Song, TimeSignature, Timing};

/// A YAML representation of a song or drum loop. Positions are given in bars
/// and beats, both counted from zero.
#[derive(Deserialize, Clone, Debug)]
pub struct SongFile {
    /// The name of the song.
    name: String,
    /// Tempo in beats per minute.
    tempo: f64,
    /// The time signature, e.g. [3, 4].
    #[serde(default)]
    time_signature: TimeSignature,
    /// The melodic instrument.
    #[serde(default = "default_instrument")]
    instrument: InstrumentKind,
    #[serde(default)]
    notes: Vec<NoteEntry>,
    #[serde(default)]
    drums: Vec<DrumEntry>,
}

/// A melodic note.
#[derive(Deserialize, Clone, Debug)]
pub struct NoteEntry {
    pitch: u8,
    velocity: u8,
    bar: u32,
    beat: f64,
    /// How long the note is held before it is released. Without it the clip
    /// plays out.
    beats: Option<f64>,
}

/// A drum hit.
#[derive(Deserialize, Clone, Debug)]
pub struct DrumEntry {
    drum: Drum,
    velocity: u8,
    bar: u32,
    beat: f64,
}

fn default_instrument() -> InstrumentKind {
    InstrumentKind::Piano
}

impl SongFile {
    /// Deserializes a file from the path into a song file.
    pub fn deserialize(path: &Path) -> Result<SongFile> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()
            .and_then(|config| config.try_deserialize::<SongFile>())
            .map_err(|source| ConfigError::File {
                path: path.to_path_buf(),
                source,
            })?)
    }

    /// Parses a song file from YAML.
    pub fn from_yaml(yaml: &str) -> Result<SongFile> {
        Ok(Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .and_then(|config| config.try_deserialize::<SongFile>())
            .map_err(ConfigError::from)?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instrument(&self) -> InstrumentKind {
        self.instrument
    }

    fn timing(&self) -> Result<Timing> {
        Timing::new(self.tempo, self.time_signature)
    }

    fn drum_events(&self, timing: &Timing) -> Result<Vec<NoteEvent>> {
        self.drums
            .iter()
            .map(|hit| {
                Ok(NoteEvent::drum(
                    hit.drum,
                    hit.velocity,
                    timing.offset(hit.bar, hit.beat)?,
                ))
            })
            .collect()
    }

    /// Converts to a song played on the given instrument, or the file's own
    /// instrument if none is given.
    pub fn to_song(&self, instrument: Option<InstrumentKind>) -> Result<Song> {
        let timing = self.timing()?;
        let notes = self
            .notes
            .iter()
            .map(|note| {
                let event = NoteEvent::new(
                    note.pitch,
                    note.velocity,
                    timing.offset(note.bar, note.beat)?,
                );
                Ok(match note.beats {
                    Some(beats) => event.with_length(timing.samples(beats)?),
                    None => event,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let drums = self.drum_events(&timing)?;

        Song::new(
            &self.name,
            timing,
            instrument.unwrap_or(self.instrument),
            notes,
            drums,
        )
    }

    /// Converts the drum part to a drum loop. Melodic notes are ignored.
    pub fn to_drum_loop(&self) -> Result<DrumLoop> {
        let timing = self.timing()?;
        let events = self.drum_events(&timing)?;
        DrumLoop::new(&self.name, timing, events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const SONG: &str = r#"
        name: Scale
        tempo: 120
        time_signature: [3, 4]
        instrument: marimba
        notes:
          - { pitch: 62, velocity: 80, bar: 1, beat: 0 }
          - { pitch: 60, velocity: 100, bar: 0, beat: 0.5, beats: 2 }
        drums:
          - { drum: open_hi_hat, velocity: 70, bar: 0, beat: 0 }
    "#;

    #[test]
    fn test_to_song() {
        let file = SongFile::from_yaml(SONG).unwrap();
        assert_eq!(file.name(), "Scale");
        assert_eq!(file.instrument(), InstrumentKind::Marimba);

        let song = file.to_song(None).unwrap();
        assert_eq!(song.instrument(), InstrumentKind::Marimba);
        assert_eq!(song.timing().time_signature().beats_per_bar, 3);
        // 22050 samples per beat, three beats per bar. Notes come out sorted.
        assert_eq!(
            song.notes(),
            &[
                NoteEvent::new(60, 100, 11025).with_length(44100),
                NoteEvent::new(62, 80, 66150),
            ]
        );
        assert_eq!(song.drums(), &[NoteEvent::drum(Drum::OpenHiHat, 70, 0)]);

        let song = file.to_song(Some(InstrumentKind::Piano)).unwrap();
        assert_eq!(song.instrument(), InstrumentKind::Piano);
    }

    #[test]
    fn test_to_drum_loop() {
        let yaml = r#"
            name: Beat
            tempo: 60
            drums:
              - { drum: kick, velocity: 100, bar: 0, beat: 0 }
              - { drum: closed_hi_hat, velocity: 60, bar: 0, beat: 2 }
              - { drum: kick, velocity: 100, bar: 1, beat: 0 }
        "#;
        let drum_loop = SongFile::from_yaml(yaml).unwrap().to_drum_loop().unwrap();
        assert_eq!(drum_loop.name(), "Beat");
        assert_eq!(drum_loop.events().len(), 3);
        assert_eq!(drum_loop.length(), 4 * 44100);
    }

    #[test]
    fn test_invalid_files() {
        assert!(matches!(
            SongFile::from_yaml("name: x\ntempo: 0\nnotes: [{pitch: 60, velocity: 50, bar: 0, beat: 0}]")
                .unwrap()
                .to_song(None),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            SongFile::from_yaml("name: x\ntempo: 90\ndrums: [{drum: gong, velocity: 50, bar: 0, beat: 0}]"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            SongFile::from_yaml("name: x\ntempo: 90\nnotes: [{pitch: 60, velocity: 50, bar: 0, beat: -1}]")
                .unwrap()
                .to_song(None),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            SongFile::deserialize(Path::new("/nonexistent/song.yaml")),
            Err(Error::Config(ConfigError::File { .. }))
        ));
    }
}
