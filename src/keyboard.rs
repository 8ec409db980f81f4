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
use std::fmt;

use crate::notes::Note;

/// A visual key element. The pressed flag is purely cosmetic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    note: Note,
    pressed: bool,
}

impl Key {
    /// The note identifier attached to this key.
    pub fn note(&self) -> Note {
        self.note
    }

    /// Whether the key is drawn as pressed.
    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    fn is_black(&self) -> bool {
        matches!(self.note.midi() % 12, 1 | 3 | 6 | 8 | 10)
    }
}

/// The on-screen keyboard: an ordered set of visual keys.
#[derive(Debug, Clone)]
pub struct Keyboard {
    keys: Vec<Key>,
}

impl Keyboard {
    /// Creates a keyboard with one key per note, in the given order. Duplicates are dropped.
    pub fn new(notes: impl IntoIterator<Item = Note>) -> Keyboard {
        let mut keys: Vec<Key> = Vec::new();
        for note in notes {
            if !keys.iter().any(|key| key.note == note) {
                keys.push(Key {
                    note,
                    pressed: false,
                });
            }
        }
        Keyboard { keys }
    }

    /// Creates a keyboard covering every note from low to high, inclusive.
    pub fn chromatic(low: Note, high: Note) -> Keyboard {
        Keyboard::new(
            (low.midi()..=high.midi()).filter_map(|midi| Note::from_midi(midi).ok()),
        )
    }

    /// Finds the key element for the given note.
    pub fn key(&self, note: Note) -> Option<&Key> {
        self.keys.iter().find(|key| key.note == note)
    }

    /// Marks the key as pressed. Returns false if no key exists for the note.
    pub fn press(&mut self, note: Note) -> bool {
        self.set_pressed(note, true)
    }

    /// Marks the key as released. Returns false if no key exists for the note.
    pub fn release(&mut self, note: Note) -> bool {
        self.set_pressed(note, false)
    }

    fn set_pressed(&mut self, note: Note, pressed: bool) -> bool {
        match self.keys.iter_mut().find(|key| key.note == note) {
            Some(key) => {
                key.pressed = pressed;
                true
            }
            None => false,
        }
    }

    /// Returns all keys in display order.
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }
}

impl fmt::Display for Keyboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for key in self.keys.iter() {
            let face = match (key.is_black(), key.pressed) {
                (false, false) => "[ ]",
                (false, true) => "[#]",
                (true, false) => "[:]",
                (true, true) => "[*]",
            };
            write!(f, "{}", face)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn note(name: &str) -> Note {
        name.parse().unwrap()
    }

    #[test]
    fn test_chromatic_layout() {
        let keyboard = Keyboard::chromatic(note("A3"), note("D#5"));
        assert_eq!(19, keyboard.keys().len());
        assert_eq!(note("A3"), keyboard.keys()[0].note());
        assert_eq!(note("D#5"), keyboard.keys()[18].note());
    }

    #[test]
    fn test_press_and_release() {
        let mut keyboard = Keyboard::chromatic(note("C4"), note("B4"));
        assert!(keyboard.press(note("E4")));
        assert!(keyboard.key(note("E4")).unwrap().is_pressed());
        assert!(keyboard.release(note("E4")));
        assert!(!keyboard.key(note("E4")).unwrap().is_pressed());

        assert!(!keyboard.press(note("C5")));
        assert!(keyboard.key(note("C5")).is_none());
    }

    #[test]
    fn test_duplicates_dropped() {
        let keyboard = Keyboard::new(vec![note("C4"), note("C4"), note("D4")]);
        assert_eq!(2, keyboard.keys().len());
    }

    #[test]
    fn test_display() {
        let mut keyboard = Keyboard::chromatic(note("C4"), note("D4"));
        keyboard.press(note("C#4"));
        assert_eq!("[ ][*][ ]", keyboard.to_string());
    }
}
