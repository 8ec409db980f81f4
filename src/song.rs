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
use std::time::Duration;

use tracing::{info, warn};

use crate::{controller::Event, notes::Note, scheduler::Scheduler};

/// The opening of Debussy's Clair de Lune as (note, offset in seconds).
pub const CLAIR_DE_LUNE: [(&str, f64); 29] = [
    ("F4", 0.0),
    ("G#4", 0.0),
    ("F5", 1.0),
    ("G#5", 1.0),
    ("C#5", 2.0),
    ("F5", 2.0),
    ("F#4", 3.5),
    ("A4", 3.5),
    ("C5", 4.0),
    ("D#5", 4.0),
    ("F5", 4.5),
    ("C5", 5.0),
    ("D#5", 5.0),
    ("F4", 6.5),
    ("G#4", 6.5),
    ("A#4", 7.0),
    ("C#5", 7.0),
    ("D#5", 7.5),
    ("A#4", 8.0),
    ("C#5", 8.0),
    ("F5", 8.5),
    ("C#5", 9.5),
    ("D#4", 10.0),
    ("F#4", 10.0),
    ("G#4", 10.5),
    ("C5", 10.5),
    ("C#5", 11.0),
    ("G#4", 11.5),
    ("C5", 11.5),
];

/// How long a simulated key press is held.
pub const PRESS_LENGTH: Duration = Duration::from_millis(500);

/// The length of the direct attack that accompanies each press, in seconds.
pub const ATTACK_LENGTH: f64 = 1.0;

/// A hardcoded note sequence.
#[derive(Debug, Clone)]
pub struct Song {
    name: String,
    notes: Vec<(Note, Duration)>,
}

impl Song {
    /// Creates a song from (note name, offset in seconds) pairs. Unparseable names are skipped.
    pub fn new(name: &str, notes: &[(&str, f64)]) -> Song {
        let notes = notes
            .iter()
            .filter_map(|(name, offset)| match name.parse::<Note>() {
                Ok(note) => Some((note, Duration::from_secs_f64(offset.max(0.0)))),
                Err(e) => {
                    warn!(note = name, err = %e, "Skipping unparseable song note");
                    None
                }
            })
            .collect();
        Song {
            name: name.to_string(),
            notes,
        }
    }

    pub fn clair_de_lune() -> Song {
        Song::new("Clair de Lune", &CLAIR_DE_LUNE)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn notes(&self) -> &[(Note, Duration)] {
        &self.notes
    }

    /// Schedules a simulated key press and a direct attack for every note at its offset.
    /// Returns the number of scheduled actions.
    pub fn play(&self, scheduler: &dyn Scheduler) -> usize {
        info!(song = self.name, notes = self.notes.len(), "Playing song.");
        for (note, offset) in self.notes.iter() {
            scheduler.schedule(*offset, Event::SongPress(*note));
            scheduler.schedule(*offset, Event::SongAttack(*note));
        }
        self.notes.len() * 2
    }
}
