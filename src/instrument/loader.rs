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

//! Sample loading for instruments.
//!
//! Every clip an instrument declares is decoded, down-mixed, resampled and
//! normalised once, up front. Nothing is decoded at play time.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use rayon::prelude::*;
use rubato::{
    SincFixedIn, SincInterpolationParameters, SincInterpolationType, VecResampler, WindowFunction,
};
use tracing::{debug, info, warn};

use super::kind::InstrumentProfile;
use super::normalize::{db_to_linear, normalize, DEFAULT_TARGET_PEAK_DBFS};
use super::InstrumentModel;
use crate::audio::sample_source::{SampleSource, SampleSourceError};
use crate::audio::{WaveformBuffer, SAMPLE_RATE};
use crate::error::{Error, Result};

/// Input block size for the sinc resampler.
const INPUT_BLOCK_SIZE: usize = 1024;

/// Loads instruments from a sample source.
pub struct InstrumentLoader {
    source: Arc<dyn SampleSource>,
    /// Peak every loudest-tier clip is normalised to.
    target_peak: f32,
    /// Decoded mono clips at [`SAMPLE_RATE`], by resource name, before normalisation.
    cache: Mutex<HashMap<String, Arc<Vec<f32>>>>,
}

impl InstrumentLoader {
    /// Creates a loader normalising to the default -0.1 dBFS peak.
    pub fn new(source: Arc<dyn SampleSource>) -> Self {
        Self {
            source,
            target_peak: db_to_linear(DEFAULT_TARGET_PEAK_DBFS),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Sets the normalisation peak in dBFS.
    pub fn with_target_peak_dbfs(mut self, dbfs: f32) -> Self {
        self.target_peak = db_to_linear(dbfs);
        self
    }

    /// Returns the linear normalisation peak.
    pub fn target_peak(&self) -> f32 {
        self.target_peak
    }

    /// Loads every clip of the instrument. Any missing clip fails the whole load:
    /// an instrument with holes in its range is not usable.
    pub fn load(&self, profile: &InstrumentProfile) -> Result<InstrumentModel> {
        let start = Instant::now();
        let tiers = profile.dynamics.tier_count();
        let jobs: Vec<(u8, usize)> = profile
            .pitches
            .clone()
            .flat_map(|pitch| (0..tiers).map(move |tier| (pitch, tier)))
            .collect();

        info!(
            instrument = %profile.kind,
            pitches = profile.pitch_count(),
            tiers,
            "Loading instrument"
        );

        let clips = jobs
            .par_iter()
            .map(|&(pitch, tier)| self.load_clip(profile, pitch, tier))
            .collect::<Result<Vec<WaveformBuffer>>>()?;

        let clips: Vec<Vec<WaveformBuffer>> = clips.chunks(tiers).map(|c| c.to_vec()).collect();
        let model = InstrumentModel::new(profile.clone(), clips)?;

        info!(
            instrument = %profile.kind,
            clips = jobs.len(),
            memory_kb = model.memory_size() / 1024,
            elapsed_ms = start.elapsed().as_millis(),
            "Instrument loaded"
        );

        Ok(model)
    }

    /// Loads and normalises one clip. Each tier is normalised to a peak
    /// proportional to its threshold so the tiers keep their relative loudness.
    fn load_clip(
        &self,
        profile: &InstrumentProfile,
        pitch: u8,
        tier: usize,
    ) -> Result<WaveformBuffer> {
        let resource = profile.resource(pitch, tier);
        let mut samples = self.load_mono(&resource)?.as_ref().clone();

        let target = self.target_peak * profile.dynamics.relative_peak(tier);
        if normalize(&mut samples, target).is_none() {
            warn!(resource, "Sample is silent, leaving it unnormalised");
        }

        Ok(WaveformBuffer::new(samples))
    }

    /// Decodes a resource to mono at [`SAMPLE_RATE`], using the cache when possible.
    pub fn load_mono(&self, resource: &str) -> Result<Arc<Vec<f32>>> {
        if let Some(samples) = self.cache.lock().get(resource) {
            debug!(resource, "Using cached sample");
            return Ok(samples.clone());
        }

        let decoded = self.source.decode(resource).map_err(|e| match e {
            SampleSourceError::NotFound(resource) => Error::MissingResource {
                resource,
                path: self.source.location(),
            },
            e => Error::SampleSource(e),
        })?;

        let source_rate = decoded.sample_rate;
        let mono = decoded.into_mono();
        let samples = if source_rate != SAMPLE_RATE {
            debug!(
                resource,
                source_rate,
                target_rate = SAMPLE_RATE,
                "Resampling sample"
            );
            resample(&mono, source_rate, SAMPLE_RATE)?
        } else {
            mono
        };

        let samples = Arc::new(samples);
        self.cache
            .lock()
            .insert(resource.to_string(), samples.clone());
        Ok(samples)
    }

    /// Returns the total memory used by cached samples.
    pub fn total_memory_usage(&self) -> usize {
        self.cache
            .lock()
            .values()
            .map(|s| s.len() * std::mem::size_of::<f32>())
            .sum()
    }
}

impl std::fmt::Debug for InstrumentLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentLoader")
            .field("location", &self.source.location())
            .field("target_peak", &self.target_peak)
            .field("cached_samples", &self.cache.lock().len())
            .finish()
    }
}

/// Resamples a mono clip with a band-limited sinc resampler. The filter delay
/// is trimmed off so the clip still starts on its first sample, and the result
/// is exactly `ceil(len * target_rate / source_rate)` samples long.
fn resample(
    samples: &[f32],
    source_rate: u32,
    target_rate: u32,
) -> std::result::Result<Vec<f32>, SampleSourceError> {
    let failed = || SampleSourceError::ResamplingFailed(source_rate, target_rate);

    let sinc_params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        oversampling_factor: 128,
        interpolation: SincInterpolationType::Linear,
        window: WindowFunction::BlackmanHarris2,
    };
    let ratio = target_rate as f64 / source_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, sinc_params, INPUT_BLOCK_SIZE, 1)
        .map_err(|_e| failed())?;

    let target_len = (samples.len() as f64 * ratio).ceil() as usize;
    let delay = resampler.output_delay();
    let mut output = Vec::with_capacity(target_len + delay + INPUT_BLOCK_SIZE * 2);
    let mut scratch = resampler.output_buffer_allocate(true);

    let mut blocks = samples.chunks_exact(INPUT_BLOCK_SIZE);
    for block in blocks.by_ref() {
        let (_, written) = resampler
            .process_into_buffer(&[block.to_vec()], &mut scratch, None)
            .map_err(|_e| failed())?;
        output.extend_from_slice(&scratch[0][..written]);
    }

    let remainder = blocks.remainder();
    if !remainder.is_empty() {
        let (_, written) = resampler
            .process_partial_into_buffer(Some(&[remainder.to_vec()][..]), &mut scratch, None)
            .map_err(|_e| failed())?;
        output.extend_from_slice(&scratch[0][..written]);
    }

    // Flush the filter until the tail of the clip has come out.
    while output.len() < target_len + delay {
        let (_, written) = resampler
            .process_partial_into_buffer(None::<&[Vec<f32>]>, &mut scratch, None)
            .map_err(|_e| failed())?;
        if written == 0 {
            break;
        }
        output.extend_from_slice(&scratch[0][..written]);
    }

    output.drain(..delay.min(output.len()));
    output.resize(target_len, 0.0);
    Ok(output)
}
