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
use std::fs::File;
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::debug;

use super::error::SampleSourceError;
use super::traits::{DecodedAudio, SampleSource};

/// Extensions tried, in order, when a resource name has none.
const EXTENSIONS: &[&str] = &["wav", "flac", "ogg", "mp3"];

/// A sample source that decodes audio files below a base directory.
/// Uses symphonia, so WAV, FLAC, OGG/Vorbis and MP3 are all accepted.
pub struct FileSampleSource {
    base_path: PathBuf,
}

impl FileSampleSource {
    /// Creates a file sample source rooted at the given directory.
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// Resolves a resource name to an existing file.
    fn resolve(&self, resource: &str) -> Option<PathBuf> {
        let direct = self.base_path.join(resource);
        if direct.extension().is_some() && direct.is_file() {
            return Some(direct);
        }

        EXTENSIONS
            .iter()
            .map(|ext| self.base_path.join(format!("{}.{}", resource, ext)))
            .find(|path| path.is_file())
    }

    /// Decodes a whole file into interleaved f32 samples.
    pub fn decode_file(path: &Path) -> Result<DecodedAudio, SampleSourceError> {
        let file = File::open(path).map_err(|e| {
            SampleSourceError::IoError(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let file_path = path.to_string_lossy().to_string();
        let probed = get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| {
                SampleSourceError::SampleConversionFailed(format!("'{}': {}", file_path, e))
            })?;
        let mut format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| {
                SampleSourceError::SampleConversionFailed(format!(
                    "'{}': no audio track found",
                    file_path
                ))
            })?;
        let track_id = track.id;
        let params = track.codec_params.clone();

        let mut decoder = get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| {
                SampleSourceError::SampleConversionFailed(format!("'{}': {}", file_path, e))
            })?;

        let mut sample_rate = params.sample_rate.unwrap_or(0);
        let mut channel_count = params.channels.map(|c| c.count() as u16).unwrap_or(0);
        let mut samples = Vec::new();
        let mut scratch: Option<SampleBuffer<f32>> = None;

        while let Some(packet) = read_next_packet(format_reader.as_mut())? {
            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                // A corrupt packet is skipped, the rest of the stream is still usable.
                Err(SymphoniaError::DecodeError(e)) => {
                    debug!(path = file_path, err = e, "Skipping undecodable packet");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let spec = *decoded.spec();
            sample_rate = spec.rate;
            channel_count = spec.channels.count() as u16;

            let capacity = decoded.capacity() as u64;
            if scratch
                .as_ref()
                .map_or(true, |buffer| (buffer.capacity() as u64) < capacity)
            {
                scratch = Some(SampleBuffer::new(capacity, spec));
            }
            if let Some(buffer) = scratch.as_mut() {
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
        }

        if sample_rate == 0 || channel_count == 0 {
            return Err(SampleSourceError::SampleConversionFailed(format!(
                "'{}': unable to determine sample rate or channel count",
                file_path
            )));
        }

        Ok(DecodedAudio {
            samples,
            channel_count,
            sample_rate,
        })
    }
}

/// Reads the next packet, mapping end-of-stream conditions to `None`.
fn read_next_packet(
    format_reader: &mut dyn FormatReader,
) -> Result<Option<Packet>, SampleSourceError> {
    match format_reader.next_packet() {
        Ok(packet) => Ok(Some(packet)),
        Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Ok(None)
        }
        // Some decoders return DecodeError at EOF instead of IoError
        Err(SymphoniaError::DecodeError(_)) => Ok(None),
        Err(e) => Err(SampleSourceError::AudioError(e)),
    }
}

impl SampleSource for FileSampleSource {
    fn decode(&self, resource: &str) -> Result<DecodedAudio, SampleSourceError> {
        let path = self
            .resolve(resource)
            .ok_or_else(|| SampleSourceError::NotFound(resource.to_string()))?;
        debug!(resource, path = ?path, "Decoding sample");
        Self::decode_file(&path)
    }

    fn location(&self) -> PathBuf {
        self.base_path.clone()
    }
}
