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

//! YAML configuration: the engine settings and song files.

use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::instrument::InstrumentKind;
use crate::song::{midi, DrumLoop, Song};

mod engine;
mod error;
mod song;

pub use engine::{EngineConfig, InstrumentOverride, DEFAULT_BUFFER_SIZE};
pub use error::ConfigError;
pub use song::{DrumEntry, NoteEntry, SongFile};

/// Returns true if the path names a Standard MIDI File.
fn is_midi(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("mid") || ext.eq_ignore_ascii_case("midi"))
        .unwrap_or(false)
}

/// Loads a song from a YAML song file or a MIDI file, chosen by extension.
/// MIDI files default to the piano when no instrument is given.
pub fn load_song(path: &Path, instrument: Option<InstrumentKind>) -> Result<Song> {
    let song = if is_midi(path) {
        midi::import(path, instrument.unwrap_or(InstrumentKind::Piano))?
    } else {
        SongFile::deserialize(path)?.to_song(instrument)?
    };
    info!(
        song = song.name(),
        instrument = %song.instrument(),
        notes = song.notes().len(),
        drums = song.drums().len(),
        "Loaded song"
    );
    Ok(song)
}

/// Loads a drum loop from a YAML song file.
pub fn load_drum_loop(path: &Path) -> Result<DrumLoop> {
    let drum_loop = SongFile::deserialize(path)?.to_drum_loop()?;
    info!(
        drum_loop = drum_loop.name(),
        hits = drum_loop.events().len(),
        duration = ?drum_loop.duration(),
        "Loaded drum loop"
    );
    Ok(drum_loop)
}
