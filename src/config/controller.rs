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
use std::collections::HashMap;

use serde::Deserialize;

/// Allows users to specify various controllers.
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Controller {
    #[default]
    Keyboard,
    Midi(MidiController),
    Multi(HashMap<String, Controller>),
}

/// A MIDI keyboard whose keys play the piano.
#[derive(Deserialize, Clone, Debug)]
pub struct MidiController {
    /// The MIDI input port to listen to. Partial names match.
    device: String,
}

impl MidiController {
    /// Creates a new MIDI controller configuration.
    pub fn new(device: &str) -> MidiController {
        MidiController {
            device: device.to_string(),
        }
    }

    /// Returns the MIDI input device name.
    pub fn device(&self) -> &str {
        &self.device
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;

    fn parse(yaml: &str) -> Controller {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_keyboard_controller() {
        assert!(matches!(parse("kind: keyboard"), Controller::Keyboard));
    }

    #[test]
    fn test_midi_controller() {
        match parse("kind: midi\ndevice: mock-midi") {
            Controller::Midi(midi) => assert_eq!("mock-midi", midi.device()),
            other => panic!("unexpected controller {:?}", other),
        }
    }

    #[test]
    fn test_multi_controller() {
        let yaml = r#"
            kind: multi
            keys:
              kind: keyboard
            synth:
              kind: midi
              device: mock-midi
        "#;

        match parse(yaml) {
            Controller::Multi(controllers) => {
                assert_eq!(2, controllers.len());
                assert!(matches!(controllers.get("keys"), Some(Controller::Keyboard)));
                assert!(matches!(controllers.get("synth"), Some(Controller::Midi(_))));
            }
            other => panic!("unexpected controller {:?}", other),
        }
    }
}
