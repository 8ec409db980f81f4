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
use std::path::{Path, PathBuf};
use std::time::Duration;

use duration_string::DurationString;
use serde::Deserialize;
use tracing::info;

mod audio;
mod controller;
mod error;
mod instruments;
mod keyboard;
mod playback;

pub use self::audio::{Audio, DEFAULT_DEVICE};
pub use self::controller::{Controller, MidiController};
pub use self::error::ConfigError;
pub use self::instruments::{Instruments, Sampler};
pub use self::keyboard::Keyboard;
pub use self::playback::Playback;

/// Prefix for environment variable overrides, e.g. KEYPIANO__AUDIO__DEVICE.
const ENV_PREFIX: &str = "KEYPIANO";
const ENV_SEPARATOR: &str = "__";

/// The configuration for the piano. Every section is optional.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Piano {
    /// The audio output.
    audio: Option<Audio>,
    /// The two live instruments.
    instruments: Option<Instruments>,
    /// The visual keyboard layout.
    keyboard: Option<Keyboard>,
    /// MIDI file playback.
    midi: Option<Playback>,
    /// The controller that feeds input events.
    controller: Option<Controller>,
    /// Directory relative paths are resolved against.
    #[serde(skip)]
    root: PathBuf,
}

impl Piano {
    /// Loads the configuration from the given YAML file (if any), then applies environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Piano, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            info!(path = %path.display(), "Loading config");
            builder = builder.add_source(config::File::from(path));
        }

        let mut piano: Piano = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR))
            .build()?
            .try_deserialize()?;
        piano.root = path
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(piano)
    }

    /// Returns the audio configuration.
    pub fn audio(&self) -> Audio {
        self.audio.clone().unwrap_or_default()
    }

    /// Returns the primary instrument with its samples resolved against the config directory.
    pub fn primary(&self) -> Sampler {
        self.instruments().primary().relative_to(&self.root)
    }

    /// Returns the secondary instrument with its samples resolved against the config directory.
    pub fn secondary(&self) -> Sampler {
        self.instruments().secondary().relative_to(&self.root)
    }

    fn instruments(&self) -> Instruments {
        self.instruments.clone().unwrap_or_default()
    }

    /// Builds the visual keyboard.
    pub fn layout(&self) -> Result<crate::keyboard::Keyboard, ConfigError> {
        self.keyboard.clone().unwrap_or_default().layout()
    }

    /// Returns the MIDI file to play, resolved against the config directory.
    pub fn midi_file(&self) -> PathBuf {
        self.root.join(self.playback().file())
    }

    /// Returns the lead-in before MIDI playback starts.
    pub fn lead_in(&self) -> Result<Duration, ConfigError> {
        self.playback().lead_in()
    }

    fn playback(&self) -> Playback {
        self.midi.clone().unwrap_or_default()
    }

    /// Returns the controller configuration (default: keyboard).
    pub fn controller(&self) -> Controller {
        self.controller.clone().unwrap_or_default()
    }
}

/// Parses a human readable duration such as "500ms" or "2s".
fn parse_duration(value: &str) -> Result<Duration, ConfigError> {
    DurationString::from_string(value.to_string())
        .map(Duration::from)
        .map_err(|e| ConfigError::Duration {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Initializes the piano and controller from the given config file and returns the controller.
/// The controller owns the piano and runs until it is told to quit.
pub fn init_piano_and_controller(
    path: Option<&Path>,
) -> Result<crate::controller::Controller, Box<dyn Error>> {
    let piano_config = Piano::load(path)?;
    let device = crate::audio::get_device(&piano_config.audio())?;
    let driver = crate::controller::driver(&piano_config.controller())?;
    crate::controller::Controller::new(&piano_config, device, driver)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_load_defaults() {
        let piano = Piano::default();
        assert_eq!("default", piano.audio().device());
        assert_eq!("Piano", piano.primary().label());
        assert_eq!("Casio", piano.secondary().label());
        assert_eq!(19, piano.layout().unwrap().keys().len());
        assert_eq!(PathBuf::from("bach_846.mid"), piano.midi_file());
        assert_eq!(Duration::from_millis(500), piano.lead_in().unwrap());
        assert!(matches!(piano.controller(), Controller::Keyboard));
    }

    #[test]
    fn test_load_file() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("piano.yaml");
        let mut file = std::fs::File::create(&path)?;
        write!(
            file,
            r#"
audio:
  device: mock-device
  sample_rate: 48000
instruments:
  secondary:
    label: Organ
    base_path: organ
    samples:
      C4: c4.wav
keyboard:
  low: C4
  high: C5
midi:
  file: prelude.mid
  lead_in: 1s
controller:
  kind: keyboard
"#
        )?;

        let piano = Piano::load(Some(&path))?;
        assert_eq!("mock-device", piano.audio().device());
        assert_eq!(48000, piano.audio().sample_rate());
        assert_eq!("Piano", piano.primary().label());
        assert_eq!(
            dir.path().join("samples/salamander"),
            piano.primary().base_path()
        );
        assert_eq!("Organ", piano.secondary().label());
        assert_eq!(dir.path().join("organ"), piano.secondary().base_path());
        assert_eq!(13, piano.layout()?.keys().len());
        assert_eq!(dir.path().join("prelude.mid"), piano.midi_file());
        assert_eq!(Duration::from_secs(1), piano.lead_in()?);
        Ok(())
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            Piano::load(Some(Path::new("/nonexistent/piano.yaml"))),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(Duration::from_millis(250), parse_duration("250ms").unwrap());
        assert!(parse_duration("later").is_err());
    }
}
