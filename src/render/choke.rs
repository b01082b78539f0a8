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

//! Hi-hat choke: an open hi-hat stops ringing at the next hi-hat hit.

use crate::instrument::Drum;

/// A drum hit at its position in the rendered buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrumHit {
    pub drum: Drum,
    pub offset: usize,
}

/// Returns, for each hit, how many samples it may ring before being choked, or
/// None to let it ring for its full length.
///
/// Hits must be sorted by offset. With `loop_length` set, the scan for the
/// next hi-hat wraps around to the start of the loop.
pub fn choke_lengths(hits: &[DrumHit], loop_length: Option<usize>) -> Vec<Option<usize>> {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            if !hit.drum.is_open_hi_hat() {
                return None;
            }
            next_hi_hat(hits, i, loop_length.is_some()).map(|j| {
                let next = hits[j].offset;
                match loop_length {
                    Some(length) if j <= i => length.saturating_sub(hit.offset) + next,
                    _ => next - hit.offset,
                }
            })
        })
        .collect()
}

/// Finds the next hi-hat hit after `index`. The scan visits every other hit at
/// most once, so a pattern with a single hi-hat does not choke itself.
fn next_hi_hat(hits: &[DrumHit], index: usize, wrap: bool) -> Option<usize> {
    let count = hits.len();
    (1..count)
        .map(|step| index + step)
        .filter(|&j| wrap || j < count)
        .map(|j| j % count)
        .find(|&j| hits[j].drum.is_hi_hat())
}
