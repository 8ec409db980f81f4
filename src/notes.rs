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

//! Note names in scientific pitch notation ("C#4", "Bb3") and their MIDI numbers.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer};

/// Pitch class names, always spelled with sharps.
const PITCH_CLASSES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// MIDI number of A4.
const A4_MIDI: f64 = 69.0;

/// Frequency of A4 in Hz.
const A4_FREQUENCY: f64 = 440.0;

/// Errors produced while parsing a note name.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum NoteError {
    #[error("empty note name")]
    Empty,
    #[error("invalid pitch class in note '{0}'")]
    PitchClass(String),
    #[error("invalid octave in note '{0}'")]
    Octave(String),
    #[error("note '{0}' is outside of the MIDI range")]
    OutOfRange(String),
}

/// A single pitch. Enharmonic spellings ("C#4", "Db4") are the same note.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Note(u8);

impl Note {
    /// Creates a note from a MIDI note number (0-127).
    pub fn from_midi(midi: u8) -> Result<Note, NoteError> {
        if midi > 127 {
            return Err(NoteError::OutOfRange(midi.to_string()));
        }
        Ok(Note(midi))
    }

    /// Returns the MIDI note number.
    pub fn midi(&self) -> u8 {
        self.0
    }

    /// Returns the octave in scientific pitch notation (middle C is C4).
    pub fn octave(&self) -> i8 {
        (self.0 / 12) as i8 - 1
    }

    /// Returns the equal-tempered frequency in Hz.
    pub fn frequency(&self) -> f64 {
        A4_FREQUENCY * 2f64.powf((self.0 as f64 - A4_MIDI) / 12.0)
    }

    /// Returns the note shifted by the given number of semitones, if it stays in range.
    pub fn transpose(&self, semitones: i16) -> Option<Note> {
        let midi = self.0 as i16 + semitones;
        if (0..=127).contains(&midi) {
            Some(Note(midi as u8))
        } else {
            None
        }
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            PITCH_CLASSES[(self.0 % 12) as usize],
            self.octave()
        )
    }
}

impl fmt::Debug for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Note({})", self)
    }
}

impl FromStr for Note {
    type Err = NoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        let letter = name.chars().next().ok_or(NoteError::Empty)?;

        let pitch_class: i32 = match letter.to_ascii_uppercase() {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(NoteError::PitchClass(name.to_string())),
        };

        let rest = &name[letter.len_utf8()..];
        let (accidental, octave) = match rest.chars().next() {
            Some('#') => (1, &rest[1..]),
            Some('b') => (-1, &rest[1..]),
            _ => (0, rest),
        };

        let octave: i32 = octave
            .parse()
            .map_err(|_| NoteError::Octave(name.to_string()))?;

        let midi = (octave + 1) * 12 + pitch_class + accidental;
        if !(0..=127).contains(&midi) {
            return Err(NoteError::OutOfRange(name.to_string()));
        }

        Ok(Note(midi as u8))
    }
}

impl<'de> Deserialize<'de> for Note {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!(60, "C4".parse::<Note>().unwrap().midi());
        assert_eq!(61, "C#4".parse::<Note>().unwrap().midi());
        assert_eq!(61, "Db4".parse::<Note>().unwrap().midi());
        assert_eq!(57, "A3".parse::<Note>().unwrap().midi());
        assert_eq!(70, "Bb4".parse::<Note>().unwrap().midi());
        assert_eq!(0, "C-1".parse::<Note>().unwrap().midi());
        assert_eq!(127, "G9".parse::<Note>().unwrap().midi());
        assert_eq!(36, " c2 ".parse::<Note>().unwrap().midi());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Err(NoteError::Empty), "".parse::<Note>());
        assert_eq!(
            Err(NoteError::PitchClass("H4".to_string())),
            "H4".parse::<Note>()
        );
        assert_eq!(
            Err(NoteError::Octave("C#".to_string())),
            "C#".parse::<Note>()
        );
        assert_eq!(
            Err(NoteError::OutOfRange("G#9".to_string())),
            "G#9".parse::<Note>()
        );
        assert!(Note::from_midi(128).is_err());
    }

    #[test]
    fn test_display_is_canonical() {
        for name in ["C4", "C#4", "D#5", "F#3", "A1", "B3", "C-1"] {
            assert_eq!(name, name.parse::<Note>().unwrap().to_string());
        }
        assert_eq!("C#4", "Db4".parse::<Note>().unwrap().to_string());
    }

    #[test]
    fn test_frequency() {
        let a4: Note = "A4".parse().unwrap();
        assert!((a4.frequency() - 440.0).abs() < 1e-9);
        let a3: Note = "A3".parse().unwrap();
        assert!((a3.frequency() - 220.0).abs() < 1e-9);
        let c4: Note = "C4".parse().unwrap();
        assert!((c4.frequency() - 261.6256).abs() < 1e-3);
    }

    #[test]
    fn test_transpose() {
        let c4: Note = "C4".parse().unwrap();
        assert_eq!(Some("C5".parse().unwrap()), c4.transpose(12));
        assert_eq!(None, c4.transpose(-61));
    }
}
