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

//! Live playing: one voice per key of an instrument.

use std::sync::Arc;

use tracing::{debug, info};

use crate::audio::MixerHandle;
use crate::error::{invalid, Result};
use crate::instrument::{Drum, InstrumentKind, InstrumentModel};
use crate::voice::{PlaybackVoice, VoiceState};

/// A playable instrument. Every pitch has its own voice, so notes on
/// different keys overlap and a repeated key restarts its note.
pub struct Keyboard {
    model: Arc<InstrumentModel>,
    voices: Vec<PlaybackVoice>,
}

impl Keyboard {
    /// Creates a voice for each pitch of the instrument and attaches it to
    /// the mixer.
    pub fn new(model: Arc<InstrumentModel>, mixer: &MixerHandle) -> Result<Keyboard> {
        if !model.is_loaded() {
            return invalid(format!("{} is not loaded", model.kind()));
        }

        let thresholds = model.thresholds();
        let voices = model
            .pitch_range()
            .map(|pitch| {
                let voice = mixer.add_voice(&format!("{}-{}", model.kind(), pitch))?;
                voice.set_audio_data(model.audio_data_for_pitch(pitch)?, &thresholds)?;
                Ok(voice)
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            instrument = %model.kind(),
            voices = voices.len(),
            "Keyboard ready"
        );
        Ok(Keyboard { model, voices })
    }

    pub fn instrument(&self) -> InstrumentKind {
        self.model.kind()
    }

    /// The voice playing a pitch, if the instrument has it.
    pub fn voice(&self, pitch: u8) -> Option<&PlaybackVoice> {
        let index = pitch.checked_sub(*self.model.pitch_range().start())?;
        self.voices.get(index as usize)
    }

    fn voice_for(&self, pitch: u8) -> Result<&PlaybackVoice> {
        match self.voice(pitch) {
            Some(voice) => Ok(voice),
            None => invalid(format!(
                "pitch {} is outside of the {} range {:?}",
                pitch,
                self.model.kind(),
                self.model.pitch_range()
            )),
        }
    }

    /// Starts a note from the beginning of the sample picked by the velocity.
    pub fn note_on(&self, pitch: u8, velocity: u8) -> Result<()> {
        let tier = self.model.dynamics_index(velocity)?;
        let gain = self.model.gain_factor(velocity)?;
        debug!(pitch, velocity, tier, gain, "Note on");
        self.voice_for(pitch)?.begin_playing(gain, tier, 0)
    }

    /// Releases a note. Releasing a key that isn't sounding does nothing.
    pub fn note_off(&self, pitch: u8) -> Result<()> {
        self.voice_for(pitch)?.begin_release()
    }

    /// Hits a drum. Only valid on a drum kit.
    pub fn hit(&self, drum: Drum, velocity: u8) -> Result<()> {
        if self.instrument() != InstrumentKind::DrumKit {
            return invalid(format!("{} has no drums", self.instrument()));
        }
        self.note_on(drum.index(), velocity)
    }

    /// Releases every sounding note.
    pub fn all_notes_off(&self) -> Result<()> {
        self.voices
            .iter()
            .filter(|voice| voice.state() != VoiceState::Idle)
            .try_for_each(PlaybackVoice::begin_release)
    }

    /// Number of voices currently making sound.
    pub fn sounding(&self) -> usize {
        self.voices
            .iter()
            .filter(|voice| voice.state().is_sounding())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{VoiceMixer, WaveformBuffer};
    use crate::error::Error;
    use crate::instrument::InstrumentProfile;

    fn two_key_piano() -> Arc<InstrumentModel> {
        let profile = InstrumentProfile {
            pitches: 60..=61,
            ..InstrumentKind::Piano.profile()
        };
        let clips = (0..2)
            .map(|_| {
                (1..=3)
                    .map(|tier| WaveformBuffer::new(vec![tier as f32; 1000]))
                    .collect()
            })
            .collect();
        Arc::new(InstrumentModel::new(profile, clips).unwrap())
    }

    #[test]
    fn test_note_on_picks_tier_and_gain() {
        let (mut mixer, handle) = VoiceMixer::new(1);
        let keyboard = Keyboard::new(two_key_piano(), &handle).unwrap();
        assert_eq!(mixer.voice_count(), 0);

        // Velocity 100 is the top of the loudest tier, whose samples are 3.0.
        keyboard.note_on(60, 100).unwrap();
        let mut out = vec![0.0; 4];
        mixer.process_into_output(&mut out);
        assert_eq!(mixer.voice_count(), 2);
        assert_eq!(out, vec![3.0; 4]);
        assert_eq!(keyboard.sounding(), 1);

        // Velocity 50 is the top of the quietest tier, played at 50/75 gain.
        keyboard.note_on(61, 50).unwrap();
        mixer.process_into_output(&mut out);
        let expected = 3.0 + 50.0 / 75.0;
        assert!(out.iter().all(|s| (s - expected).abs() < 1e-5), "{:?}", out);
        assert_eq!(keyboard.sounding(), 2);
    }

    #[test]
    fn test_note_off_fades_out() {
        let (mut mixer, handle) = VoiceMixer::new(1);
        let keyboard = Keyboard::new(two_key_piano(), &handle).unwrap();
        let mut out = vec![0.0; 1];

        keyboard.note_on(60, 100).unwrap();
        mixer.process_into_output(&mut out);
        keyboard.note_off(60).unwrap();
        for _ in 0..crate::voice::RELEASE_STEPS {
            mixer.process_into_output(&mut out);
        }
        assert_eq!(keyboard.voice(60).unwrap().state(), VoiceState::Idle);
        assert_eq!(out, vec![0.0]);
    }

    #[test]
    fn test_all_notes_off() {
        let (mut mixer, handle) = VoiceMixer::new(1);
        let keyboard = Keyboard::new(two_key_piano(), &handle).unwrap();
        let mut out = vec![0.0; 1];
        keyboard.note_on(60, 80).unwrap();
        keyboard.note_on(61, 80).unwrap();
        mixer.process_into_output(&mut out);

        keyboard.all_notes_off().unwrap();
        mixer.process_into_output(&mut out);
        assert_eq!(keyboard.voice(60).unwrap().state(), VoiceState::Releasing);
        assert_eq!(keyboard.voice(61).unwrap().state(), VoiceState::Releasing);
    }

    #[test]
    fn test_invalid_notes() {
        let (_mixer, handle) = VoiceMixer::new(1);
        let keyboard = Keyboard::new(two_key_piano(), &handle).unwrap();
        assert!(keyboard.voice(59).is_none());
        assert!(matches!(
            keyboard.note_on(62, 50),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            keyboard.note_on(60, 101),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            keyboard.hit(Drum::Kick, 50),
            Err(Error::InvalidArgument(_))
        ));

        let unloaded = Arc::new(InstrumentModel::unloaded(InstrumentKind::Marimba.profile()));
        assert!(Keyboard::new(unloaded, &handle).is_err());
    }
}
