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

//! Real-time playback voices.
//!
//! A voice has two halves. [`PlaybackVoice`] is the control handle used by UI and
//! sequencing threads. [`VoiceRenderer`] lives on the audio thread and is driven
//! once per output callback. Control requests travel over a bounded queue and take
//! effect at the start of the next callback, and audio data is replaced with an
//! atomic pointer swap. The renderer never blocks, allocates or frees memory.

mod command;
pub mod state;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};
use parking_lot::Mutex;
use tracing::debug;

use crate::audio::{WaveformBuffer, SAMPLE_RATE};
use crate::error::{invalid, Error, Result};
use crate::instrument::Dynamics;
use command::{Command, Envelope, COMMAND_QUEUE_SIZE};
use state::AtomicVoiceState;

pub use state::VoiceState;

/// Number of callbacks a full-gain note takes to fade out after a release.
pub const RELEASE_STEPS: u32 = 100;

/// How long a full-gain release takes with callbacks of `buffer_size` frames.
pub fn release_duration(buffer_size: usize) -> Duration {
    Duration::from_secs_f64(RELEASE_STEPS as f64 * buffer_size as f64 / SAMPLE_RATE as f64)
}

/// The audio a voice plays: one clip per dynamics tier.
pub struct VoiceData {
    /// Bumped on every swap so the renderer can tell the data changed.
    generation: u64,
    buffers: Vec<WaveformBuffer>,
    dynamics: Dynamics,
}

impl VoiceData {
    fn empty() -> Self {
        Self {
            generation: 0,
            buffers: Vec::new(),
            dynamics: Dynamics::none(),
        }
    }

    /// The clips, indexed by dynamics tier.
    pub fn buffers(&self) -> &[WaveformBuffer] {
        &self.buffers
    }

    /// The dynamics tiers the clips correspond to.
    pub fn dynamics(&self) -> &Dynamics {
        &self.dynamics
    }

    fn is_loaded(&self) -> bool {
        !self.buffers.is_empty()
    }
}

/// State shared between the control handle and the renderer.
struct Shared {
    data: ArcSwap<VoiceData>,
    state: AtomicVoiceState,
    looping: AtomicBool,
    /// The newest generation the renderer has synced to. Set only once the
    /// renderer holds no reference to older data.
    acknowledged: AtomicU64,
}

/// The control side of a voice.
pub struct PlaybackVoice {
    name: String,
    shared: Arc<Shared>,
    commands: Sender<Envelope>,
    finished: Receiver<()>,
    /// Swapped-out data the renderer may still be reading. Kept alive here until
    /// the renderer acknowledges a newer generation, so the audio thread is never
    /// the one to drop the last reference.
    retired: Mutex<Vec<Arc<VoiceData>>>,
}

impl PlaybackVoice {
    /// Creates a voice. The renderer must be handed to whatever drives the
    /// output callback, usually a [`crate::audio::VoiceMixer`].
    pub fn new(name: &str) -> (PlaybackVoice, VoiceRenderer) {
        let shared = Arc::new(Shared {
            data: ArcSwap::from_pointee(VoiceData::empty()),
            state: AtomicVoiceState::new(VoiceState::Idle),
            looping: AtomicBool::new(false),
            acknowledged: AtomicU64::new(0),
        });
        let (commands_tx, commands_rx) = crossbeam_channel::bounded(COMMAND_QUEUE_SIZE);
        let (finished_tx, finished_rx) = crossbeam_channel::bounded(1);

        let voice = PlaybackVoice {
            name: name.to_string(),
            shared: shared.clone(),
            commands: commands_tx,
            finished: finished_rx,
            retired: Mutex::new(Vec::new()),
        };
        let renderer = VoiceRenderer {
            shared,
            commands: commands_rx,
            finished: finished_tx,
            generation: 0,
            cursor: 0,
            tier: 0,
            note_gain: 0.0,
            gain: 0.0,
            release_steps: 0,
            pending: None,
            has_note: false,
            playing: false,
            releasing: false,
            paused: false,
            published: VoiceState::Idle,
            detached: false,
        };
        (voice, renderer)
    }

    /// The name of the voice, used in logs and errors.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The state as last published by the audio thread.
    pub fn state(&self) -> VoiceState {
        self.shared.state.load()
    }

    /// Returns true once audio data has been set.
    pub fn is_loaded(&self) -> bool {
        self.shared.data.load().is_loaded()
    }

    pub fn set_looping(&self, looping: bool) {
        self.shared.looping.store(looping, Ordering::Relaxed);
    }

    pub fn is_looping(&self) -> bool {
        self.shared.looping.load(Ordering::Relaxed)
    }

    /// Receives one message each time a non-looping clip plays to its end.
    /// Completions that happen while a message is still unread are merged.
    pub fn finished(&self) -> Receiver<()> {
        self.finished.clone()
    }

    /// Replaces the audio data and resets playback. Commands issued against the
    /// previous data are discarded.
    ///
    /// With thresholds there must be one buffer per tier. Without thresholds any
    /// number of buffers may be given and are addressed by index.
    pub fn set_audio_data(&self, buffers: Vec<WaveformBuffer>, thresholds: &[u8]) -> Result<()> {
        let dynamics = Dynamics::from_thresholds(thresholds)?;
        if !dynamics.is_empty() && dynamics.tier_count() != buffers.len() {
            return invalid(format!(
                "voice '{}' got {} buffers for {} dynamics tiers",
                self.name,
                buffers.len(),
                dynamics.tier_count()
            ));
        }

        let mut retired = self.retired.lock();
        let generation = self.shared.data.load().generation + 1;
        let samples: usize = buffers.iter().map(WaveformBuffer::len).sum();
        let previous = self.shared.data.swap(Arc::new(VoiceData {
            generation,
            buffers,
            dynamics,
        }));
        retired.push(previous);
        self.release_retired(&mut retired);
        self.shared.state.store(VoiceState::Idle);

        debug!(voice = self.name, generation, samples, "Audio data replaced");
        Ok(())
    }

    /// Starts a note on the next callback.
    ///
    /// The gain must be within [0, 1], the voice must be loaded, and the start
    /// offset must fall inside the clip of the chosen dynamics tier.
    pub fn begin_playing(&self, gain: f32, tier: usize, offset: usize) -> Result<()> {
        if !(0.0..=1.0).contains(&gain) {
            return invalid(format!("gain {} is outside of [0, 1]", gain));
        }

        let data = self.shared.data.load();
        if !data.is_loaded() {
            return invalid(format!("voice '{}' has no audio data", self.name));
        }
        let clip = match data.buffers.get(tier) {
            Some(clip) => clip,
            None => {
                return invalid(format!(
                    "dynamics index {} is outside of the {} clips of voice '{}'",
                    tier,
                    data.buffers.len(),
                    self.name
                ))
            }
        };
        if offset >= clip.len() {
            return invalid(format!(
                "start offset {} is past the end of a {} sample clip",
                offset,
                clip.len()
            ));
        }

        let previous = self.shared.state.load();
        self.shared.state.store(VoiceState::Starting);
        let result = self.send(
            data.generation,
            Command::BeginPlaying { gain, tier, offset },
        );
        if result.is_err() {
            self.shared.state.store(previous);
        }
        result
    }

    /// Starts a note at a velocity, picking the tier and gain from the thresholds
    /// the audio data was set with.
    pub fn play_velocity(&self, velocity: u8, offset: usize) -> Result<()> {
        let (tier, gain) = {
            let data = self.shared.data.load();
            (data.dynamics.index(velocity)?, data.dynamics.gain(velocity)?)
        };
        self.begin_playing(gain, tier, offset)
    }

    /// Fades the current note out over [`RELEASE_STEPS`] callbacks. Does nothing
    /// if no note is playing.
    pub fn begin_release(&self) -> Result<()> {
        self.send_current(Command::BeginRelease)
    }

    /// Silences the voice, keeping the cursor.
    pub fn pause(&self) -> Result<()> {
        self.send_current(Command::Pause)
    }

    /// Continues playing from the cursor after a pause or stop.
    pub fn resume(&self) -> Result<()> {
        self.send_current(Command::Resume)
    }

    /// Stops playback on the next callback.
    pub fn stop(&self) -> Result<()> {
        self.send_current(Command::Stop)?;
        self.shared.state.store(VoiceState::Idle);
        Ok(())
    }

    /// Drops retired data older than the generation the renderer acknowledged,
    /// or all of it once the renderer is gone.
    fn release_retired(&self, retired: &mut Vec<Arc<VoiceData>>) {
        if Arc::strong_count(&self.shared) == 1 {
            retired.clear();
            return;
        }
        let acknowledged = self.shared.acknowledged.load(Ordering::Acquire);
        retired.retain(|data| data.generation >= acknowledged);
    }

    fn send_current(&self, command: Command) -> Result<()> {
        let generation = self.shared.data.load().generation;
        self.send(generation, command)
    }

    fn send(&self, generation: u64, command: Command) -> Result<()> {
        match self.commands.try_send(Envelope {
            generation,
            command,
        }) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(Error::QueueFull(self.name.clone())),
            Err(TrySendError::Disconnected(_)) => invalid(format!(
                "voice '{}' is not attached to an output",
                self.name
            )),
        }
    }
}

impl fmt::Debug for PlaybackVoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackVoice")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("looping", &self.is_looping())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

#[derive(Clone, Copy, Debug)]
struct Note {
    gain: f32,
    tier: usize,
    offset: usize,
}

/// The audio thread side of a voice.
pub struct VoiceRenderer {
    shared: Arc<Shared>,
    commands: Receiver<Envelope>,
    finished: Sender<()>,
    /// Generation of the data the counters below refer to.
    generation: u64,
    cursor: usize,
    tier: usize,
    note_gain: f32,
    gain: f32,
    release_steps: u32,
    pending: Option<Note>,
    /// A note has been started and has not finished; resume continues it.
    has_note: bool,
    playing: bool,
    releasing: bool,
    paused: bool,
    published: VoiceState,
    /// The control handle has been dropped.
    detached: bool,
}

impl VoiceRenderer {
    /// Adds this voice's output to an interleaved buffer. Each mono sample is
    /// written to every channel of its frame.
    pub fn render_into(&mut self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let synced = self.generation;
        let mut data = self.shared.data.load();
        let mut touched = self.sync_generation(&data);

        loop {
            let envelope = match self.commands.try_recv() {
                Ok(envelope) => envelope,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.detached = true;
                    break;
                }
            };
            // The data is always swapped before commands against it are sent.
            if envelope.generation > data.generation {
                data = self.shared.data.load();
                touched |= self.sync_generation(&data);
            }
            if envelope.generation == data.generation {
                self.apply(envelope.command);
                touched = true;
            }
        }

        self.advance(&data, out, channels);
        self.publish(touched);

        if self.generation != synced {
            drop(data);
            self.shared
                .acknowledged
                .store(self.generation, Ordering::Release);
        }
    }

    /// Returns true once the control handle has been dropped. A detached
    /// renderer can no longer be told to do anything and may be removed.
    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// The read position in the current clip.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn sync_generation(&mut self, data: &VoiceData) -> bool {
        if data.generation == self.generation {
            return false;
        }
        self.generation = data.generation;
        self.pending = None;
        self.finish();
        true
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::BeginPlaying { gain, tier, offset } => {
                self.pending = Some(Note { gain, tier, offset });
                self.releasing = false;
                self.paused = false;
            }
            Command::BeginRelease => {
                if self.playing || self.pending.is_some() {
                    self.releasing = true;
                }
            }
            Command::Pause => self.paused = true,
            Command::Resume => {
                self.paused = false;
                if self.has_note {
                    self.playing = true;
                }
            }
            Command::Stop => {
                self.pending = None;
                self.playing = false;
                self.paused = false;
                self.releasing = false;
            }
        }
    }

    fn advance(&mut self, data: &VoiceData, out: &mut [f32], channels: usize) {
        if let Some(note) = self.pending.take() {
            self.note_gain = note.gain;
            self.gain = note.gain;
            self.tier = note.tier;
            self.cursor = note.offset;
            self.release_steps = 0;
            self.has_note = true;
            self.playing = true;
        } else if self.releasing && self.playing && !self.paused {
            self.release_steps += 1;
            // Computed from the step count rather than accumulated so a full-gain
            // note lands on exactly zero.
            self.gain = self.note_gain - self.release_steps as f32 / RELEASE_STEPS as f32;
        }

        if !self.playing || self.paused {
            return;
        }
        if self.gain <= 0.0 {
            self.finish();
            return;
        }

        let samples = match data.buffers.get(self.tier) {
            Some(clip) if !clip.is_empty() => clip.samples(),
            _ => {
                self.finish();
                return;
            }
        };
        let gain = self.gain;

        if self.shared.looping.load(Ordering::Relaxed) {
            if self.cursor >= samples.len() {
                self.cursor = 0;
            }
            for frame in out.chunks_exact_mut(channels) {
                let sample = samples[self.cursor] * gain;
                frame.iter_mut().for_each(|o| *o += sample);
                self.cursor += 1;
                if self.cursor == samples.len() {
                    self.cursor = 0;
                }
            }
        } else {
            let remaining = samples.get(self.cursor..).unwrap_or(&[]);
            let mut written = 0;
            for (frame, sample) in out.chunks_exact_mut(channels).zip(remaining) {
                let sample = sample * gain;
                frame.iter_mut().for_each(|o| *o += sample);
                written += 1;
            }
            self.cursor += written;

            if self.cursor >= samples.len() {
                // A full channel means a completion is already waiting to be read.
                let _ = self.finished.try_send(());
                self.finish();
            }
        }
    }

    /// Ends the current note and rewinds.
    fn finish(&mut self) {
        self.cursor = 0;
        self.gain = 0.0;
        self.has_note = false;
        self.playing = false;
        self.releasing = false;
        self.paused = false;
    }

    fn publish(&mut self, force: bool) {
        let state = if !self.playing {
            VoiceState::Idle
        } else if self.paused {
            VoiceState::Paused
        } else if self.releasing {
            VoiceState::Releasing
        } else {
            VoiceState::Playing
        };

        // The control side writes Starting and Idle itself, so after applying
        // commands the state is republished even if it looks unchanged.
        if force || state != self.published {
            self.shared.state.store(state);
            self.published = state;
        }
    }
}

impl fmt::Debug for VoiceRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoiceRenderer")
            .field("generation", &self.generation)
            .field("cursor", &self.cursor)
            .field("gain", &self.gain)
            .field("state", &self.published)
            .field("detached", &self.detached)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ramp;

    fn loaded_voice(samples: Vec<f32>) -> (PlaybackVoice, VoiceRenderer) {
        let (voice, renderer) = PlaybackVoice::new("test");
        voice
            .set_audio_data(vec![WaveformBuffer::new(samples)], &[])
            .unwrap();
        (voice, renderer)
    }

    fn render(renderer: &mut VoiceRenderer, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames];
        renderer.render_into(&mut out, 1);
        out
    }

    #[test]
    fn test_loop_wraps_around() {
        let indices: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let (voice, mut renderer) = loaded_voice(indices);
        voice.set_looping(true);
        voice.begin_playing(1.0, 0, 0).unwrap();

        let out = render(&mut renderer, 25);
        let expected: Vec<f32> = (0..10).chain(0..10).chain(0..5).map(|i| i as f32).collect();
        assert_eq!(out, expected);
        assert_eq!(renderer.cursor(), 5);
        assert_eq!(voice.state(), VoiceState::Playing);
    }

    #[test]
    fn test_loop_wraps_across_callbacks() {
        let indices: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let (voice, mut renderer) = loaded_voice(indices);
        voice.set_looping(true);
        voice.begin_playing(1.0, 0, 0).unwrap();

        let mut out = Vec::new();
        for frames in [7, 7, 11] {
            out.extend(render(&mut renderer, frames));
        }
        let expected: Vec<f32> = (0..10).chain(0..10).chain(0..5).map(|i| i as f32).collect();
        assert_eq!(out, expected);
        assert_eq!(renderer.cursor(), 5);
    }

    #[test]
    fn test_release_fades_out_in_exactly_100_callbacks() {
        let (voice, mut renderer) = loaded_voice(vec![0.5; 64]);
        voice.set_looping(true);
        voice.begin_playing(1.0, 0, 0).unwrap();
        render(&mut renderer, 16);
        assert_eq!(voice.state(), VoiceState::Playing);

        voice.begin_release().unwrap();
        for step in 1..RELEASE_STEPS {
            let out = render(&mut renderer, 16);
            assert_eq!(voice.state(), VoiceState::Releasing, "step {}", step);
            let expected = 0.5 * (1.0 - step as f32 / 100.0);
            assert!((out[0] - expected).abs() < 1e-5, "step {}", step);
        }

        let out = render(&mut renderer, 16);
        assert_eq!(voice.state(), VoiceState::Idle);
        assert!(out.iter().all(|s| *s == 0.0));
        assert_eq!(renderer.cursor(), 0);
    }

    #[test]
    fn test_release_duration() {
        assert_eq!(release_duration(441), Duration::from_secs(1));
        assert_eq!(release_duration(1024).as_millis(), 2321);
        assert_eq!(release_duration(0), Duration::ZERO);
    }

    #[test]
    fn test_release_without_a_note_does_nothing() {
        let (voice, mut renderer) = loaded_voice(vec![0.5; 64]);
        voice.begin_release().unwrap();
        voice.set_looping(true);
        voice.begin_playing(1.0, 0, 0).unwrap();
        for _ in 0..200 {
            render(&mut renderer, 16);
        }
        assert_eq!(voice.state(), VoiceState::Playing);
    }

    #[test]
    fn test_begin_playing_preconditions() {
        let (voice, _renderer) = PlaybackVoice::new("test");
        assert!(matches!(
            voice.begin_playing(0.5, 0, 0),
            Err(Error::InvalidArgument(_))
        ));

        voice
            .set_audio_data(vec![WaveformBuffer::new(vec![0.0; 10])], &[])
            .unwrap();
        for (gain, tier, offset) in [(1.01, 0, 0), (-0.1, 0, 0), (f32::NAN, 0, 0), (1.0, 1, 0), (1.0, 0, 10)]
        {
            assert!(
                matches!(
                    voice.begin_playing(gain, tier, offset),
                    Err(Error::InvalidArgument(_))
                ),
                "gain {} tier {} offset {}",
                gain,
                tier,
                offset
            );
        }
        assert_eq!(voice.state(), VoiceState::Idle);
        assert!(voice.begin_playing(1.0, 0, 9).is_ok());
        assert_eq!(voice.state(), VoiceState::Starting);
    }

    #[test]
    fn test_start_offset_and_gain() {
        let (voice, mut renderer) = loaded_voice(ramp(10));
        voice.begin_playing(0.5, 0, 5).unwrap();
        let out = render(&mut renderer, 3);
        assert_eq!(out, vec![3.0, 3.5, 4.0]);
    }

    #[test]
    fn test_pause_and_resume_keep_the_cursor() {
        let (voice, mut renderer) = loaded_voice(ramp(10));
        voice.begin_playing(1.0, 0, 0).unwrap();
        assert_eq!(render(&mut renderer, 4), vec![1.0, 2.0, 3.0, 4.0]);

        voice.pause().unwrap();
        assert_eq!(render(&mut renderer, 4), vec![0.0; 4]);
        assert_eq!(voice.state(), VoiceState::Paused);
        assert_eq!(renderer.cursor(), 4);

        voice.resume().unwrap();
        assert_eq!(render(&mut renderer, 4), vec![5.0, 6.0, 7.0, 8.0]);
        assert_eq!(voice.state(), VoiceState::Playing);
    }

    #[test]
    fn test_stop_then_resume_continues() {
        let (voice, mut renderer) = loaded_voice(ramp(10));
        voice.begin_playing(1.0, 0, 0).unwrap();
        render(&mut renderer, 3);

        voice.stop().unwrap();
        assert_eq!(voice.state(), VoiceState::Idle);
        assert_eq!(render(&mut renderer, 3), vec![0.0; 3]);
        assert_eq!(voice.state(), VoiceState::Idle);

        voice.resume().unwrap();
        assert_eq!(render(&mut renderer, 2), vec![4.0, 5.0]);
    }

    #[test]
    fn test_natural_end_notifies_and_rewinds() {
        let (voice, mut renderer) = loaded_voice(ramp(10));
        let finished = voice.finished();
        voice.begin_playing(1.0, 0, 0).unwrap();

        render(&mut renderer, 8);
        assert!(finished.try_recv().is_err());

        let out = render(&mut renderer, 8);
        assert_eq!(&out[..3], &[9.0, 10.0, 0.0]);
        assert!(finished.try_recv().is_ok());
        assert_eq!(voice.state(), VoiceState::Idle);
        assert_eq!(renderer.cursor(), 0);

        // Nothing more to resume once the clip has finished.
        voice.resume().unwrap();
        assert_eq!(render(&mut renderer, 4), vec![0.0; 4]);
    }

    #[test]
    fn test_release_to_silence_does_not_notify() {
        let (voice, mut renderer) = loaded_voice(vec![0.5; 100_000]);
        let finished = voice.finished();
        voice.begin_playing(0.5, 0, 0).unwrap();
        voice.begin_release().unwrap();
        for _ in 0..60 {
            render(&mut renderer, 4);
        }
        assert_eq!(voice.state(), VoiceState::Idle);
        assert!(finished.try_recv().is_err());
    }

    #[test]
    fn test_output_is_additive_and_interleaved() {
        let (voice, mut renderer) = loaded_voice(vec![0.25, 0.5]);
        voice.begin_playing(1.0, 0, 0).unwrap();
        let mut out = vec![1.0; 6];
        renderer.render_into(&mut out, 2);
        assert_eq!(out, vec![1.25, 1.25, 1.5, 1.5, 1.0, 1.0]);
    }

    #[test]
    fn test_swapping_data_resets_playback() {
        let (voice, mut renderer) = loaded_voice(ramp(10));
        voice.set_looping(true);
        voice.begin_playing(1.0, 0, 0).unwrap();
        render(&mut renderer, 4);

        // A note requested against the old data is dropped with it.
        voice.begin_playing(1.0, 0, 2).unwrap();
        voice
            .set_audio_data(vec![WaveformBuffer::new(vec![-1.0; 4])], &[])
            .unwrap();
        assert_eq!(voice.state(), VoiceState::Idle);
        assert_eq!(render(&mut renderer, 4), vec![0.0; 4]);
        assert_eq!(voice.state(), VoiceState::Idle);
        assert_eq!(renderer.cursor(), 0);

        voice.begin_playing(1.0, 0, 0).unwrap();
        assert_eq!(render(&mut renderer, 2), vec![-1.0, -1.0]);
    }

    #[test]
    fn test_play_velocity_uses_thresholds() {
        let (voice, mut renderer) = PlaybackVoice::new("piano");
        let clips = (1..=3)
            .map(|tier| WaveformBuffer::new(vec![tier as f32; 8]))
            .collect();
        voice.set_audio_data(clips, &[50, 75, 100]).unwrap();

        voice.play_velocity(60, 0).unwrap();
        let out = render(&mut renderer, 1);
        let gain = Dynamics::from_thresholds(&[50, 75, 100])
            .unwrap()
            .gain(60)
            .unwrap();
        assert!((out[0] - 2.0 * gain).abs() < 1e-6);

        assert!(voice.play_velocity(101, 0).is_err());
        assert!(voice
            .set_audio_data(vec![WaveformBuffer::empty()], &[50, 100])
            .is_err());
    }

    fn retired_generations(voice: &PlaybackVoice) -> Vec<u64> {
        voice.retired.lock().iter().map(|data| data.generation).collect()
    }

    #[test]
    fn test_retired_data_is_kept_until_acknowledged() {
        let (voice, mut renderer) = loaded_voice(ramp(4));
        voice.begin_playing(1.0, 0, 0).unwrap();
        voice
            .set_audio_data(vec![WaveformBuffer::new(ramp(8))], &[])
            .unwrap();
        voice
            .set_audio_data(vec![WaveformBuffer::new(ramp(16))], &[])
            .unwrap();
        // Nothing has been rendered, so every earlier generation may still be in use.
        assert_eq!(retired_generations(&voice), vec![0, 1, 2]);

        render(&mut renderer, 4);
        voice
            .set_audio_data(vec![WaveformBuffer::new(ramp(32))], &[])
            .unwrap();
        assert_eq!(retired_generations(&voice), vec![3]);
    }

    #[test]
    fn test_retired_data_is_released_without_a_renderer() {
        let (voice, renderer) = loaded_voice(ramp(4));
        drop(renderer);
        voice
            .set_audio_data(vec![WaveformBuffer::new(ramp(8))], &[])
            .unwrap();
        assert!(retired_generations(&voice).is_empty());
    }

    #[test]
    fn test_renderer_notices_a_dropped_handle() {
        let (voice, mut renderer) = loaded_voice(ramp(4));
        render(&mut renderer, 2);
        assert!(!renderer.is_detached());

        drop(voice);
        render(&mut renderer, 2);
        assert!(renderer.is_detached());
    }

    #[test]
    fn test_swaps_race_the_renderer() {
        let (voice, mut renderer) = PlaybackVoice::new("race");
        voice.set_looping(true);
        let done = Arc::new(AtomicBool::new(false));

        let render_done = done.clone();
        let render_thread = std::thread::spawn(move || {
            let mut callbacks = 0;
            loop {
                let mut out = vec![0.0; 64];
                renderer.render_into(&mut out, 1);
                // One callback reads one snapshot, so it never mixes two clips.
                let first = out.iter().copied().find(|s| *s != 0.0).unwrap_or(0.0);
                assert!(
                    first == 0.0 || first == 0.25 || first == 0.5,
                    "sample {} came from no clip",
                    first
                );
                assert!(
                    out.iter().all(|s| *s == 0.0 || *s == first),
                    "callback mixed clips: {:?}",
                    out
                );
                callbacks += 1;
                if render_done.load(Ordering::Relaxed) {
                    break;
                }
            }
            callbacks
        });

        for i in 0..2000 {
            let (value, len) = if i % 2 == 0 { (0.25, 37) } else { (0.5, 101) };
            voice
                .set_audio_data(vec![WaveformBuffer::new(vec![value; len])], &[])
                .unwrap();
            for offset in [len - 1, len - 2] {
                match voice.begin_playing(1.0, 0, offset) {
                    Ok(()) | Err(Error::QueueFull(_)) => {}
                    Err(e) => panic!("begin_playing failed: {}", e),
                }
            }
        }
        done.store(true, Ordering::Relaxed);

        let callbacks = render_thread.join().expect("render thread panicked");
        assert!(callbacks > 0);
    }

    #[test]
    fn test_full_queue_is_reported() {
        let (voice, _renderer) = loaded_voice(ramp(4));
        for _ in 0..COMMAND_QUEUE_SIZE {
            voice.pause().unwrap();
        }
        assert!(matches!(voice.pause(), Err(Error::QueueFull(_))));
    }
}
