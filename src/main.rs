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
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vpiano::audio::sample_source::FileSampleSource;
use vpiano::audio::{self, VoiceMixer, WaveformBuffer};
use vpiano::config::{self, EngineConfig};
use vpiano::instrument::{InstrumentKind, InstrumentLoader, InstrumentModel};
use vpiano::keyboard::Keyboard;
use vpiano::player::Player;
use vpiano::render::SongRenderer;
use vpiano::voice::release_duration;

/// Extra time allowed for a song to finish before giving up on it.
const FINISH_GRACE: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A sampled piano, marimba and drum kit."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Renders a song (YAML or MIDI) to a WAV file.
    Render {
        /// The path to the engine config.
        config_path: PathBuf,
        /// The path to the song.
        song_path: PathBuf,
        /// The WAV file to write.
        output_path: PathBuf,
        /// Plays the song on this instrument instead of its own.
        #[arg(short, long, value_parser = parse_instrument)]
        instrument: Option<InstrumentKind>,
    },
    /// Renders a drum loop repeated a number of times to a WAV file.
    RenderLoop {
        /// The path to the engine config.
        config_path: PathBuf,
        /// The path to the drum loop.
        loop_path: PathBuf,
        /// The WAV file to write.
        output_path: PathBuf,
        /// How many times to repeat the loop.
        #[arg(short, long, default_value_t = 4)]
        repeats: usize,
    },
    /// Plays a song through the configured output device.
    Play {
        /// The path to the engine config.
        config_path: PathBuf,
        /// The path to the song.
        song_path: PathBuf,
        /// Plays the song on this instrument instead of its own.
        #[arg(short, long, value_parser = parse_instrument)]
        instrument: Option<InstrumentKind>,
        /// A drum loop to play along with the song.
        #[arg(short, long)]
        drum_loop: Option<PathBuf>,
    },
    /// Plays notes one after another on a live keyboard.
    Keys {
        /// The path to the engine config.
        config_path: PathBuf,
        /// The instrument to play.
        #[arg(value_parser = parse_instrument)]
        instrument: InstrumentKind,
        /// The pitches to play, as MIDI note numbers (drum indexes on the drum kit).
        #[arg(required = true)]
        pitches: Vec<u8>,
        /// The velocity of every note, from 0 to 100.
        #[arg(short, long, default_value_t = 80)]
        velocity: u8,
        /// How long each note is held, in milliseconds.
        #[arg(short = 'l', long, default_value_t = 400)]
        hold_ms: u64,
    },
}

fn parse_instrument(name: &str) -> Result<InstrumentKind, String> {
    InstrumentKind::ALL
        .into_iter()
        .find(|kind| kind.name() == name)
        .ok_or_else(|| {
            let names: Vec<&str> = InstrumentKind::ALL.iter().map(|kind| kind.name()).collect();
            format!("unknown instrument '{}', expected one of {}", name, names.join(", "))
        })
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Render {
            config_path,
            song_path,
            output_path,
            instrument,
        } => {
            let config = EngineConfig::load(&config_path)?;
            let loader = loader(&config);
            let song = config::load_song(&song_path, instrument)?;
            let model = load_instrument(&config, &loader, song.instrument())?;
            let drums = if song.drums().is_empty() {
                None
            } else {
                Some(load_instrument(&config, &loader, InstrumentKind::DrumKit)?)
            };

            let mut renderer = SongRenderer::new(&model);
            if let Some(drums) = drums.as_ref() {
                renderer = renderer.with_drums(drums);
            }
            let buffer = renderer.render_song(&song)?;
            buffer.write_wav(&output_path)?;
            println!(
                "Rendered {} ({:.2}s) to {}",
                song.name(),
                buffer.duration().as_secs_f64(),
                output_path.display()
            );
        }
        Commands::RenderLoop {
            config_path,
            loop_path,
            output_path,
            repeats,
        } => {
            let config = EngineConfig::load(&config_path)?;
            let loader = loader(&config);
            let drum_loop = config::load_drum_loop(&loop_path)?;
            let drums = load_instrument(&config, &loader, InstrumentKind::DrumKit)?;
            let melodic = InstrumentModel::unloaded(InstrumentKind::Piano.profile());
            let renderer = SongRenderer::new(&melodic).with_drums(&drums);

            // Drive the mixer by hand, the way an output callback would, so
            // the file shows exactly what the looping voice produces.
            let (mut mixer, handle) = VoiceMixer::new(1);
            let player = Player::new(&handle)?;
            player.play_drum_loop(&renderer, &drum_loop)?;

            let total = drum_loop.length() * repeats;
            let mut samples = Vec::with_capacity(total);
            let mut block = vec![0.0f32; config.buffer_size()];
            while samples.len() < total {
                mixer.process_into_output(&mut block);
                let wanted = (total - samples.len()).min(block.len());
                samples.extend_from_slice(&block[..wanted]);
            }
            WaveformBuffer::new(samples).write_wav(&output_path)?;
            println!(
                "Rendered {} x{} to {}",
                drum_loop.name(),
                repeats,
                output_path.display()
            );
        }
        Commands::Play {
            config_path,
            song_path,
            instrument,
            drum_loop,
        } => {
            let config = EngineConfig::load(&config_path)?;
            let loader = loader(&config);
            let song = config::load_song(&song_path, instrument)?;
            let drum_loop = drum_loop
                .map(|path| config::load_drum_loop(&path))
                .transpose()?;
            let model = load_instrument(&config, &loader, song.instrument())?;
            let drums = if song.drums().is_empty() && drum_loop.is_none() {
                None
            } else {
                Some(load_instrument(&config, &loader, InstrumentKind::DrumKit)?)
            };

            let mut renderer = SongRenderer::new(&model);
            if let Some(drums) = drums.as_ref() {
                renderer = renderer.with_drums(drums);
            }

            let device = audio::get_device(&config)?;
            let (mixer, handle) = VoiceMixer::new(device.max_channels().clamp(1, 2));
            let player = Player::new(&handle)?;
            let finished = player.finished();
            let _stream = device.start(mixer)?;

            if let Some(drum_loop) = drum_loop.as_ref() {
                player.play_drum_loop(&renderer, drum_loop)?;
            }
            let duration = player.play_song(&renderer, &song)?;
            if finished.recv_timeout(duration + FINISH_GRACE).is_err() {
                warn!(song = song.name(), "Song did not report finishing");
            }
            player.stop()?;
            info!(song = song.name(), "Playback complete");
        }
        Commands::Keys {
            config_path,
            instrument,
            pitches,
            velocity,
            hold_ms,
        } => {
            let config = EngineConfig::load(&config_path)?;
            let loader = loader(&config);
            let model = Arc::new(load_instrument(&config, &loader, instrument)?);

            let device = audio::get_device(&config)?;
            let (mixer, handle) = VoiceMixer::new(device.max_channels().clamp(1, 2));
            let keyboard = Keyboard::new(model, &handle)?;
            let _stream = device.start(mixer)?;

            let hold = Duration::from_millis(hold_ms);
            for pitch in pitches {
                keyboard.note_on(pitch, velocity)?;
                thread::sleep(hold);
                keyboard.note_off(pitch)?;
            }
            // Let the last release fade.
            thread::sleep(release_duration(config.buffer_size()));
            keyboard.all_notes_off()?;
        }
    }

    Ok(())
}

fn loader(config: &EngineConfig) -> InstrumentLoader {
    InstrumentLoader::new(Arc::new(FileSampleSource::new(config.samples_path())))
        .with_target_peak_dbfs(config.target_peak_dbfs())
}

fn load_instrument(
    config: &EngineConfig,
    loader: &InstrumentLoader,
    kind: InstrumentKind,
) -> Result<InstrumentModel, Box<dyn Error>> {
    let model = loader.load(&config.profile(kind)?)?;
    info!(
        instrument = %kind,
        memory_mb = model.memory_size() / (1024 * 1024),
        "Instrument loaded"
    );
    Ok(model)
}
