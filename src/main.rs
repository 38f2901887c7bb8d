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
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{crate_version, Parser, Subcommand};
use duration_string::DurationString;
use tetromix::samples::{tone, wave, SampleBuffer};
use tetromix::{audio, AudioEngine, EngineConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Time between mixer passes, roughly one 60Hz game frame.
const FRAME_TIME: Duration = Duration::from_micros(16_667);

/// Extra time to keep mixing after the last voice ends so the ring drains.
const DRAIN_TIME: Duration = Duration::from_millis(200);

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A sound effect engine for falling-block puzzle games."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Prints the format of the given wave files and checks that they load.
    Info {
        /// The engine config, used for the engine sample rate. Defaults apply when omitted.
        #[arg[short, long]]
        config: Option<PathBuf>,
        /// The wave files to inspect.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Plays a wave file through the configured device.
    Play {
        /// The path to the engine config.
        config: PathBuf,
        /// The wave file to play.
        file: PathBuf,
        /// Playback volume between 0 and 1.
        #[arg[short, long, default_value_t = 1.0]]
        volume: f32,
        /// Loop the sound for the given duration, e.g. 5s.
        #[arg[short, long]]
        loop_for: Option<String>,
    },
    /// Plays a synthetic sine tone through the configured device.
    Tone {
        /// The path to the engine config.
        config: PathBuf,
        /// Length of the tone in seconds.
        #[arg[short, long, default_value_t = 2.0]]
        seconds: f64,
    },
    /// Loads the configured sound bank and plays each sound, or only the named one.
    Bank {
        /// The path to the engine config.
        config: PathBuf,
        /// The sound to play.
        name: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
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
        Commands::Info { config, files } => {
            let config = match config {
                Some(path) => EngineConfig::load(&path)?,
                None => EngineConfig::new("default"),
            };
            let engine_rate = config.sample_rate();

            for file in files {
                let bytes = fs::read(&file)?;
                let info = wave::read_info(&bytes).map_err(|e| e.at(&file))?;
                let buffer = wave::decode(&bytes, engine_rate).map_err(|e| e.at(&file))?;
                println!(
                    "{}: {} channel(s), {}Hz, {}-bit, {:.3}s ({} samples at {}Hz)",
                    file.display(),
                    info.channels,
                    info.sample_rate,
                    info.bits_per_sample,
                    info.duration().as_secs_f64(),
                    buffer.len(),
                    engine_rate,
                );
            }
        }
        Commands::Play {
            config,
            file,
            volume,
            loop_for,
        } => {
            let config = EngineConfig::load(&config)?;
            let mut engine = AudioEngine::new(&config)?;
            let sound = engine.load_sound(&file)?;
            match loop_for {
                Some(loop_for) => {
                    let loop_for: Duration = DurationString::from_string(loop_for)?.into();
                    play(&mut engine, &sound, volume, Some(loop_for));
                }
                None => play(&mut engine, &sound, volume, None),
            }
            engine.shutdown();
        }
        Commands::Tone { config, seconds } => {
            let config = EngineConfig::load(&config)?;
            let mut engine = AudioEngine::new(&config)?;
            let sound = tone::sine(
                engine.format().sample_rate,
                seconds,
                tone::DEFAULT_TONE_STEP,
                tone::DEFAULT_TONE_VOLUME,
            );
            play(&mut engine, &sound, 1.0, None);
            engine.shutdown();
        }
        Commands::Bank { config, name } => {
            let config = EngineConfig::load(&config)?;
            let mut engine = AudioEngine::new(&config)?;
            let bank = engine.load_bank(&config)?;

            let names: Vec<String> = match name {
                Some(name) => vec![name],
                None => bank.names().into_iter().map(String::from).collect(),
            };
            for name in names {
                let entry = bank
                    .get(&name)
                    .ok_or_else(|| format!("no sound named {} in the sound bank", name))?;
                println!("Playing {}", name);
                // Looping sounds only get one pass through.
                let loop_for = entry.looping().then_some(entry.buffer().duration());
                play(&mut engine, entry.buffer(), entry.volume(), loop_for);
            }
            engine.shutdown();
        }
    }

    Ok(())
}

/// Plays a sound and runs the mixer like a game loop until it finishes, or
/// for `loop_for` when looping.
fn play(engine: &mut AudioEngine, sound: &SampleBuffer, volume: f32, loop_for: Option<Duration>) {
    info!(
        seconds = engine.sound_length(sound),
        volume,
        looping = loop_for.is_some(),
        "Playing sound."
    );

    let Some(slot) = engine.play_sound(sound, volume, loop_for.is_some()) else {
        return;
    };

    let start = Instant::now();
    let mut finished_at: Option<Instant> = None;
    loop {
        let report = engine.run_mixer();

        if let Some(loop_for) = loop_for {
            if finished_at.is_none() && start.elapsed() >= loop_for {
                engine.stop(slot);
            }
        }
        if report.active_voices == 0 && finished_at.is_none() {
            finished_at = Some(Instant::now());
        }
        if finished_at.is_some_and(|at| at.elapsed() >= DRAIN_TIME) {
            break;
        }

        spin_sleep::sleep(FRAME_TIME);
    }

    let stats = engine.stats();
    info!(
        underruns = stats.ring.underruns,
        consumed_bytes = stats.ring.consumed,
        "Finished playing."
    );
}
