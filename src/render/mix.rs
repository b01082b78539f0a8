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

/// Gain lost per sample once a melodic note is released (about half a second
/// from full gain).
pub const RELEASE_STEP: f32 = 1.0 / 22500.0;

/// Adds `src * gain` into `dest` starting at `offset`, clipped to the end of
/// `dest`. Returns the number of samples mixed.
pub fn mix_into(dest: &mut [f32], src: &[f32], offset: usize, gain: f32) -> usize {
    let Some(dest) = dest.get_mut(offset..) else {
        return 0;
    };
    let count = dest.len().min(src.len());
    for (d, s) in dest[..count].iter_mut().zip(&src[..count]) {
        *d += s * gain;
    }
    count
}

/// Mixes a melodic note: `duration` samples at full gain, then the rest of the
/// clip with a gain falling by `step` per sample until it reaches zero.
/// Returns the number of samples mixed.
pub fn mix_with_release(
    dest: &mut [f32],
    src: &[f32],
    offset: usize,
    gain: f32,
    duration: usize,
    step: f32,
) -> usize {
    let held = duration.min(src.len());
    let mut count = mix_into(dest, &src[..held], offset, gain);
    if count < held {
        return count;
    }

    let tail = &src[held..];
    let Some(dest) = dest.get_mut(offset + held..) else {
        return count;
    };
    for (i, (d, s)) in dest.iter_mut().zip(tail).enumerate() {
        let tail_gain = gain - i as f32 * step;
        if tail_gain <= 0.0 {
            break;
        }
        *d += s * tail_gain;
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ramp;

    #[test]
    fn test_mix_is_exact_at_offset() {
        let src = ramp(4);
        let mut dest = vec![0.0; 10];
        assert_eq!(mix_into(&mut dest, &src, 3, 0.5), 4);
        assert_eq!(
            dest,
            vec![0.0, 0.0, 0.0, 0.5, 1.0, 1.5, 2.0, 0.0, 0.0, 0.0]
        );
    }

    #[test]
    fn test_mix_clips_at_the_end() {
        let mut dest = vec![1.0; 4];
        assert_eq!(mix_into(&mut dest, &ramp(4), 2, 1.0), 2);
        assert_eq!(dest, vec![1.0, 1.0, 2.0, 3.0]);
        assert_eq!(mix_into(&mut dest, &ramp(4), 4, 1.0), 0);
        assert_eq!(mix_into(&mut dest, &ramp(4), 40, 1.0), 0);
    }

    #[test]
    fn test_release_tail_decays() {
        let src = vec![1.0; 10];
        let mut dest = vec![0.0; 10];
        let step = 0.25;
        let mixed = mix_with_release(&mut dest, &src, 0, 1.0, 4, step);

        // Four held samples, then 1.0, 0.75, 0.5, 0.25 and silence.
        assert_eq!(mixed, 8);
        assert_eq!(
            dest,
            vec![1.0, 1.0, 1.0, 1.0, 1.0, 0.75, 0.5, 0.25, 0.0, 0.0]
        );
    }

    #[test]
    fn test_release_uses_default_step() {
        let src = vec![1.0; 30000];
        let mut dest = vec![0.0; 30000];
        let mixed = mix_with_release(&mut dest, &src, 0, 0.5, 100, RELEASE_STEP);
        // Half gain takes 11250 samples to fade.
        assert_eq!(mixed, 100 + 11250);
        assert!((dest[100 + 5000] - (0.5 - 5000.0 / 22500.0)).abs() < 1e-5);
    }

    #[test]
    fn test_release_without_tail() {
        let mut dest = vec![0.0; 6];
        assert_eq!(mix_with_release(&mut dest, &ramp(3), 1, 1.0, 10, 0.1), 3);
        assert_eq!(dest, vec![0.0, 1.0, 2.0, 3.0, 0.0, 0.0]);
    }
}
