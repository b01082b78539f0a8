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

/// Default normalisation peak, in dB relative to full scale.
pub const DEFAULT_TARGET_PEAK_DBFS: f32 = -0.1;

/// Converts decibels relative to full scale into a linear amplitude.
pub fn db_to_linear(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// Returns the largest absolute sample value.
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |peak, s| peak.max(s.abs()))
}

/// Scales the samples in place so that their peak equals `target_peak`.
/// Returns the applied scale, or None for silent input, which is left untouched.
pub fn normalize(samples: &mut [f32], target_peak: f32) -> Option<f32> {
    let current = peak(samples);
    if current <= f32::EPSILON {
        return None;
    }

    let scale = target_peak / current;
    samples.iter_mut().for_each(|s| *s *= scale);
    Some(scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_to_linear() {
        assert_eq!(db_to_linear(0.0), 1.0);
        assert!((db_to_linear(-6.0) - 0.501).abs() < 1e-3);
        assert!((db_to_linear(DEFAULT_TARGET_PEAK_DBFS) - 0.98855).abs() < 1e-4);
    }

    #[test]
    fn test_normalize_hits_target_peak() {
        let mut samples = vec![0.1, -0.25, 0.2, 0.0];
        let scale = normalize(&mut samples, 0.9).unwrap();
        assert!((scale - 3.6).abs() < 1e-5);
        assert!((peak(&samples) - 0.9).abs() < 1e-6);
        assert!((samples[1] + 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_silence() {
        let mut samples = vec![0.0; 8];
        assert_eq!(normalize(&mut samples, 1.0), None);
        assert!(samples.iter().all(|s| *s == 0.0));
    }
}
