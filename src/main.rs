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
mod audio;
mod config;
mod controller;
mod instrument;
mod keyboard;
mod keymap;
mod metronome;
mod midi;
mod notes;
mod piano;
mod piece;
mod playsync;
mod samples;
mod scheduler;
mod song;
mod synth;
#[cfg(test)]
mod test;
mod transport;

use clap::{crate_version, Parser, Subcommand};
use config::init_piano_and_controller;
use std::error::Error;
use std::path::PathBuf;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A virtual piano for the terminal."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Lists the available MIDI input devices.
    MidiDevices {},
    /// Prints the computer keys and the notes they play.
    Keys {},
    /// Loads a MIDI file and prints its tracks.
    Inspect {
        /// The path to the MIDI file.
        midi_file: String,
    },
    /// Starts the piano.
    Start {
        /// The path to the piano config. Defaults apply when omitted.
        config_path: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

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
        Commands::MidiDevices {} => {
            let devices = midi::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Keys {} => {
            let layout = config::Piano::default().layout()?;
            println!("Keyboard: {}", layout);
            println!("Keys:");
            for (key, note) in keymap::KeyMap::default().entries() {
                println!("- {} -> {}", key, note);
            }
        }
        Commands::Inspect { midi_file } => {
            let piece = piece::load(&PathBuf::from(&midi_file)).await?;

            println!(
                "{} ({} notes, {:.1}s):",
                piece.name().unwrap_or(midi_file.as_str()),
                piece.note_count(),
                piece.duration(),
            );
            for (i, track) in piece.tracks().iter().enumerate() {
                println!(
                    "- {}: {} notes",
                    track
                        .name()
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("Track {}", i + 1)),
                    track.notes().len()
                );
            }
        }
        Commands::Start { config_path } => {
            init_piano_and_controller(config_path.map(PathBuf::from).as_deref())?
                .join()
                .await?;
        }
    }

    Ok(())
}
