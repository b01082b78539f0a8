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

//! Song and drum loop playback.

use std::time::Duration;

use crossbeam_channel::Receiver;
use tracing::info;

use crate::audio::{MixerHandle, WaveformBuffer, SAMPLE_RATE};
use crate::error::Result;
use crate::render::SongRenderer;
use crate::song::{DrumLoop, Song};
use crate::voice::{PlaybackVoice, VoiceState};

/// Plays rendered songs once through and drum loops on repeat, each on its own
/// voice so a loop can accompany a song or live playing.
pub struct Player {
    song: PlaybackVoice,
    drum_loop: PlaybackVoice,
}

fn duration_of(buffer: &WaveformBuffer) -> Duration {
    Duration::from_secs_f64(buffer.len() as f64 / SAMPLE_RATE as f64)
}

impl Player {
    /// Creates a player with its voices attached to the mixer.
    pub fn new(mixer: &MixerHandle) -> Result<Player> {
        let song = mixer.add_voice("song")?;
        let drum_loop = mixer.add_voice("drum-loop")?;
        drum_loop.set_looping(true);
        Ok(Player { song, drum_loop })
    }

    /// Renders a song and starts playing it from the beginning, replacing
    /// whatever song was playing. Returns the song's duration.
    pub fn play_song(&self, renderer: &SongRenderer, song: &Song) -> Result<Duration> {
        let buffer = renderer.render_song(song)?;
        let duration = duration_of(&buffer);
        self.song.set_audio_data(vec![buffer], &[])?;
        self.song.begin_playing(1.0, 0, 0)?;
        info!(song = song.name(), ?duration, "Playing song");
        Ok(duration)
    }

    /// Renders a drum loop and starts repeating it. Returns the length of one
    /// pass.
    pub fn play_drum_loop(&self, renderer: &SongRenderer, drum_loop: &DrumLoop) -> Result<Duration> {
        let buffer = renderer.render_drum_loop(drum_loop)?;
        let duration = duration_of(&buffer);
        self.drum_loop.set_audio_data(vec![buffer], &[])?;
        self.drum_loop.begin_playing(1.0, 0, 0)?;
        info!(drum_loop = drum_loop.name(), ?duration, "Playing drum loop");
        Ok(duration)
    }

    /// Fades the drum loop out.
    pub fn release_drum_loop(&self) -> Result<()> {
        self.drum_loop.begin_release()
    }

    pub fn pause(&self) -> Result<()> {
        self.song.pause()?;
        self.drum_loop.pause()
    }

    pub fn resume(&self) -> Result<()> {
        self.song.resume()?;
        self.drum_loop.resume()
    }

    /// Stops the song and the drum loop.
    pub fn stop(&self) -> Result<()> {
        self.song.stop()?;
        self.drum_loop.stop()
    }

    pub fn song_state(&self) -> VoiceState {
        self.song.state()
    }

    pub fn drum_loop_state(&self) -> VoiceState {
        self.drum_loop.state()
    }

    /// Receives a message each time a song plays to its end.
    pub fn finished(&self) -> Receiver<()> {
        self.song.finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::VoiceMixer;
    use crate::instrument::{Drum, InstrumentKind, InstrumentModel, InstrumentProfile};
    use crate::song::{NoteEvent, Timing};

    fn marimba() -> InstrumentModel {
        let profile = InstrumentProfile {
            pitches: 60..=60,
            ..InstrumentKind::Marimba.profile()
        };
        InstrumentModel::new(profile, vec![vec![WaveformBuffer::new(vec![0.5; 10])]]).unwrap()
    }

    fn drum_kit() -> InstrumentModel {
        let clips = Drum::ALL
            .iter()
            .map(|_| vec![WaveformBuffer::new(vec![1.0; 2])])
            .collect();
        InstrumentModel::new(InstrumentKind::DrumKit.profile(), clips).unwrap()
    }

    #[test]
    fn test_song_plays_once() {
        let (mut mixer, handle) = VoiceMixer::new(1);
        let player = Player::new(&handle).unwrap();
        let instrument = marimba();
        let renderer = SongRenderer::new(&instrument);
        let song = Song::new(
            "test",
            Timing::default(),
            InstrumentKind::Marimba,
            vec![NoteEvent::new(60, 100, 0)],
            vec![],
        )
        .unwrap();

        let duration = player.play_song(&renderer, &song).unwrap();
        assert_eq!(duration, Duration::from_secs_f64(10.0 / 44100.0));
        assert_eq!(player.song_state(), VoiceState::Starting);

        let mut out = vec![0.0; 16];
        mixer.process_into_output(&mut out);
        assert_eq!(&out[..10], &[0.5; 10]);
        assert_eq!(&out[10..], &[0.0; 6]);
        assert_eq!(player.song_state(), VoiceState::Idle);
        assert!(player.finished().try_recv().is_ok());
    }

    #[test]
    fn test_drum_loop_repeats_until_stopped() {
        let (mut mixer, handle) = VoiceMixer::new(1);
        let player = Player::new(&handle).unwrap();
        let instrument = marimba();
        let drums = drum_kit();
        let renderer = SongRenderer::new(&instrument).with_drums(&drums);
        let drum_loop = DrumLoop::new(
            "beat",
            Timing::default(),
            vec![
                NoteEvent::drum(Drum::Kick, 100, 0),
                NoteEvent::drum(Drum::Kick, 100, 4),
            ],
        )
        .unwrap();
        player.play_drum_loop(&renderer, &drum_loop).unwrap();

        // Both hits land at the start of a four sample loop.
        let mut out = vec![0.0; 12];
        mixer.process_into_output(&mut out);
        assert_eq!(
            out,
            vec![2.0, 2.0, 0.0, 0.0, 2.0, 2.0, 0.0, 0.0, 2.0, 2.0, 0.0, 0.0]
        );
        assert_eq!(player.drum_loop_state(), VoiceState::Playing);
        assert!(player.finished().try_recv().is_err());

        player.pause().unwrap();
        mixer.process_into_output(&mut out);
        assert_eq!(out, vec![0.0; 12]);
        assert_eq!(player.drum_loop_state(), VoiceState::Paused);

        player.resume().unwrap();
        mixer.process_into_output(&mut out);
        assert_eq!(&out[..2], &[2.0, 2.0]);

        player.stop().unwrap();
        mixer.process_into_output(&mut out);
        assert_eq!(out, vec![0.0; 12]);
        assert_eq!(player.drum_loop_state(), VoiceState::Idle);
    }
}
