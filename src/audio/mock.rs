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
use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::TryRecvError;
use tracing::{info, span, Level};

use crate::audio::{OutputStream, VoiceMixer, SAMPLE_RATE};
use crate::error::Result;

/// A mock device. Runs the mixer at the real callback cadence but discards the output.
#[derive(Clone)]
pub struct Device {
    name: String,
    buffer_size: usize,
    frames_rendered: Arc<AtomicU64>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str, buffer_size: usize) -> Device {
        Device {
            name: name.to_string(),
            buffer_size: buffer_size.max(1),
            frames_rendered: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns the number of frames the mixer has produced so far.
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }
}

impl crate::audio::Device for Device {
    fn start(&self, mut mixer: VoiceMixer) -> Result<OutputStream> {
        let span = span!(Level::INFO, "output (mock)");
        let _enter = span.enter();

        let channels = mixer.channels() as usize;
        let buffer_size = self.buffer_size;
        let period = Duration::from_secs_f64(buffer_size as f64 / SAMPLE_RATE as f64);
        info!(
            device = self.name,
            channels,
            buffer_size,
            period_ms = period.as_millis(),
            "Starting mock output."
        );

        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let frames_rendered = self.frames_rendered.clone();
        let join_handle = thread::spawn(move || {
            let mut buffer = vec![0.0f32; buffer_size * channels];
            let mut deadline = Instant::now();
            loop {
                match stop_rx.try_recv() {
                    Err(TryRecvError::Empty) => {}
                    _ => return,
                }

                mixer.process_into_output(&mut buffer);
                frames_rendered.fetch_add(buffer_size as u64, Ordering::Relaxed);

                deadline += period;
                spin_sleep::sleep(deadline.saturating_duration_since(Instant::now()));
            }
        });

        Ok(OutputStream::new(self.name.clone(), stop_tx, join_handle))
    }

    fn max_channels(&self) -> u16 {
        u16::MAX
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
