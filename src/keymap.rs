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

use tracing::warn;

use crate::notes::Note;

/// Physical keys and the notes they play. The home row holds the white keys
/// from C4, the row above holds the black keys, and `n`/`m` reach down to A3/B3.
pub const KEY_MAPPING: [(char, &str); 18] = [
    ('a', "C4"),
    ('w', "C#4"),
    ('s', "D4"),
    ('e', "D#4"),
    ('d', "E4"),
    ('f', "F4"),
    ('t', "F#4"),
    ('g', "G4"),
    ('y', "G#4"),
    ('h', "A4"),
    ('u', "A#4"),
    ('j', "B4"),
    ('k', "C5"),
    ('o', "C#5"),
    ('l', "D5"),
    ('p', "D#5"),
    ('m', "B3"),
    ('n', "A3"),
];

/// Lookup table from physical key to note.
#[derive(Debug, Clone)]
pub struct KeyMap {
    notes: HashMap<char, Note>,
}

impl KeyMap {
    /// Returns the note mapped to the given key, if any.
    pub fn note(&self, key: char) -> Option<Note> {
        self.notes.get(&key).copied()
    }

    /// Returns the mapping sorted by pitch.
    pub fn entries(&self) -> Vec<(char, Note)> {
        let mut entries: Vec<(char, Note)> = self.notes.iter().map(|(k, n)| (*k, *n)).collect();
        entries.sort_by_key(|(_, note)| *note);
        entries
    }
}

impl Default for KeyMap {
    fn default() -> Self {
        let mut notes = HashMap::with_capacity(KEY_MAPPING.len());
        for (key, name) in KEY_MAPPING {
            match name.parse::<Note>() {
                Ok(note) => {
                    notes.insert(key, note);
                }
                Err(e) => warn!(key = %key, err = %e, "Skipping unparseable key mapping"),
            }
        }
        KeyMap { notes }
    }
}
