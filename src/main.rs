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
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};
use tracing::{info, warn};

use keytone::audio::{self, Waveform};
use keytone::config::Piano;
use keytone::controller::{keyboard, Controller, Event};
use keytone::playback::{EngineFactory, Playback};
use keytone::samples::SampleLoader;
use keytone::surface::Terminal;
use keytone::trigger::TriggerController;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A keyboard-driven virtual piano."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plays the piano from the keyboard.
    Play {
        /// The path to the piano config. Built-in defaults are used if not given.
        config_path: Option<String>,
        /// The device name to play through. Overrides the config.
        #[arg[short, long]]
        device: Option<String>,
        /// The waveform for synthesized notes. Overrides the config.
        #[arg[short, long]]
        waveform: Option<String>,
        /// The master volume, 0.0 to 1.0. Overrides the config.
        #[arg[short, long]]
        volume: Option<f32>,
    },
    /// Lists the notes of every row.
    Notes {
        /// The path to the piano config. Built-in defaults are used if not given.
        config_path: Option<String>,
        /// Prints the rows in config form.
        #[arg[long]]
        yaml: bool,
    },
    /// Lists the available audio output devices.
    Devices {},
    /// Verifies a piano config.
    Verify {
        /// The path to the piano config.
        config_path: String,
    },
}

/// Loads and validates the piano config, returning it with the directory that
/// relative paths in it are resolved against.
fn load_piano(config_path: Option<&String>) -> Result<(Piano, PathBuf), Box<dyn Error>> {
    match config_path {
        Some(config_path) => {
            let path = PathBuf::from(config_path);
            let piano = Piano::deserialize(&path)?;
            piano.validate()?;
            let config_dir = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            Ok((piano, config_dir))
        }
        None => Ok((Piano::default(), PathBuf::from("."))),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            config_path,
            device,
            waveform,
            volume,
        } => {
            let (piano_config, config_dir) = load_piano(config_path.as_ref())?;
            let table = piano_config.note_table()?;
            let pitches = table.pitches();

            let audio_config = match device {
                Some(device) => piano_config.audio().with_device(&device),
                None => piano_config.audio().clone(),
            };
            let factory: EngineFactory = Box::new(move || audio::get_engine(&audio_config));
            let playback = Playback::new(factory, volume.unwrap_or(piano_config.volume()));

            let mut piano =
                TriggerController::new(table, playback, Box::new(Terminal::new(io::stdout())));
            piano.set_waveform(match waveform {
                Some(waveform) => Waveform::from_str(&waveform)?,
                None => piano_config.waveform(),
            });
            piano.set_release_fade(piano_config.release_fade()?);

            let controller = Controller::new(piano_config.tap_hold()?);
            match piano_config.samples() {
                Some(samples) => {
                    let loader = SampleLoader::from_config(samples, &config_dir);
                    let events_tx = controller.sender();
                    tokio::spawn(async move {
                        let bank = loader.load(&pitches).await;
                        if events_tx.send(Event::SamplesLoaded(bank)).await.is_err() {
                            warn!("Controller closed before samples finished loading");
                        }
                    });
                }
                None => info!("No samples configured, using synthesis only."),
            }
            piano.set_sound_mode(piano_config.sound_mode());

            controller
                .run(&mut piano, Arc::new(keyboard::Driver::new()))
                .await;
        }
        Commands::Notes { config_path, yaml } => {
            let (piano_config, _) = load_piano(config_path.as_ref())?;

            if yaml {
                print!("{}", serde_yml::to_string(&piano_config.rows()?)?);
                return Ok(());
            }

            let table = piano_config.note_table()?;
            for row in 0..table.row_count() {
                let active = if row == table.active_row() {
                    " (active)"
                } else {
                    ""
                };
                println!("Row {}{}:", row, active);
                for note in table.row(row).unwrap_or_default() {
                    println!("- {} -> {}", note.key(), note);
                }
            }
        }
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
        Commands::Verify { config_path } => {
            let (piano_config, config_dir) = load_piano(Some(&config_path))?;
            let table = piano_config.note_table()?;

            println!("Config {} is valid.", config_path);
            println!("- Device: {}", piano_config.audio().device());
            println!(
                "- Rows: {} (active: {})",
                table.row_count(),
                table.active_row()
            );
            println!("- Waveform: {}", piano_config.waveform());
            println!("- Sound mode: {}", piano_config.sound_mode());
            println!("- Volume: {}", piano_config.volume());
            println!(
                "- Release: {:?} to {}",
                piano_config.release()?,
                piano_config.release_floor()
            );

            if let Some(samples) = piano_config.samples() {
                let loader = SampleLoader::from_config(samples, &config_dir);
                let missing: Vec<String> = table
                    .pitches()
                    .into_iter()
                    .filter(|pitch| !loader.path_for(pitch).is_file())
                    .collect();
                if missing.is_empty() {
                    println!("- Samples: all pitches present");
                } else {
                    println!("- Samples: missing {}", missing.join(", "));
                }
            }
        }
    }

    Ok(())
}
