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
use serde::Deserialize;

use super::error::ConfigError;
use crate::notes::Note;

/// A3, the lowest key-mapped note.
const DEFAULT_LOW: u8 = 57;
/// D#5, the highest key-mapped note.
const DEFAULT_HIGH: u8 = 75;

/// The layout of the visual keyboard.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Keyboard {
    /// Lowest key of a chromatic layout.
    low: Option<Note>,

    /// Highest key of a chromatic layout.
    high: Option<Note>,

    /// Explicit list of keys. Takes precedence over low/high.
    notes: Option<Vec<Note>>,
}

impl Keyboard {
    /// Builds the visual keyboard.
    pub fn layout(&self) -> Result<crate::keyboard::Keyboard, ConfigError> {
        if let Some(notes) = &self.notes {
            return Ok(crate::keyboard::Keyboard::new(notes.iter().copied()));
        }

        let low = match self.low {
            Some(low) => low,
            None => Note::from_midi(DEFAULT_LOW)?,
        };
        let high = match self.high {
            Some(high) => high,
            None => Note::from_midi(DEFAULT_HIGH)?,
        };
        if low > high {
            return Err(ConfigError::EmptyKeyboard {
                low: low.to_string(),
                high: high.to_string(),
            });
        }

        Ok(crate::keyboard::Keyboard::chromatic(low, high))
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;

    fn parse(yaml: &str) -> Keyboard {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_default_layout() {
        let layout = Keyboard::default().layout().unwrap();
        assert_eq!(19, layout.keys().len());
        assert_eq!("A3", layout.keys()[0].note().to_string());
        assert_eq!("D#5", layout.keys()[18].note().to_string());
    }

    #[test]
    fn test_chromatic_range() {
        let layout = parse("low: C4\nhigh: B4").layout().unwrap();
        assert_eq!(12, layout.keys().len());
    }

    #[test]
    fn test_explicit_notes() {
        let layout = parse("low: C2\nnotes: [C4, E4, G4]").layout().unwrap();
        assert_eq!(3, layout.keys().len());
        assert!(layout.key("E4".parse().unwrap()).is_some());
        assert!(layout.key("D4".parse().unwrap()).is_none());
    }

    #[test]
    fn test_inverted_range() {
        assert!(matches!(
            parse("low: C5\nhigh: C4").layout(),
            Err(ConfigError::EmptyKeyboard { .. })
        ));
    }
}
