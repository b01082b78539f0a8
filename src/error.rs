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
use std::path::PathBuf;

use crate::audio::sample_source::SampleSourceError;
use crate::config::ConfigError;

/// Errors surfaced by the instrument, renderer and voice layers.
///
/// Precondition violations are reported as `InvalidArgument` rather than being
/// clamped, so that upstream defects stay visible.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Missing resource '{resource}' (looked in {})", path.display())]
    MissingResource { resource: String, path: PathBuf },

    #[error("Sample source error: {0}")]
    SampleSource(#[from] SampleSourceError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("MIDI import error: {0}")]
    Midi(String),

    #[error("Command queue for voice '{0}' is full")]
    QueueFull(String),

    #[error("Audio device error: {0}")]
    Device(String),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Shorthand for building an `InvalidArgument` error.
pub(crate) fn invalid<T>(message: impl Into<String>) -> Result<T> {
    Err(Error::InvalidArgument(message.into()))
}
