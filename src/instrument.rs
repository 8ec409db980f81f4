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
use std::sync::Arc;

use tracing::info;

use crate::notes::Note;

/// Anything that can sound notes.
pub trait Instrument: Send + Sync {
    /// Returns the display name of the instrument.
    fn name(&self) -> &str;

    /// Starts sounding the note now. It sounds until note_off.
    fn note_on(&self, note: Note);

    /// Releases every sounding voice of the note now.
    fn note_off(&self, note: Note);

    /// Sounds the note at `start` (audio clock seconds) for `duration` seconds.
    /// Velocity ranges from 0 to 1.
    fn attack_release(&self, note: Note, duration: f64, start: f64, velocity: f32);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    Primary,
    Secondary,
}

/// Holds the two live instruments and which one is active.
pub struct InstrumentSwitch {
    primary: Arc<dyn Instrument>,
    secondary: Arc<dyn Instrument>,
    active: Slot,
}

impl InstrumentSwitch {
    /// Creates a switch with the primary instrument active.
    pub fn new(primary: Arc<dyn Instrument>, secondary: Arc<dyn Instrument>) -> InstrumentSwitch {
        InstrumentSwitch {
            primary,
            secondary,
            active: Slot::Primary,
        }
    }

    /// Returns the active instrument.
    pub fn active(&self) -> &Arc<dyn Instrument> {
        match self.active {
            Slot::Primary => &self.primary,
            Slot::Secondary => &self.secondary,
        }
    }

    /// The label shown for the active instrument.
    pub fn label(&self) -> &str {
        self.active().name()
    }

    /// Flips to the other instrument and returns its label. Sounding notes are not released.
    pub fn toggle(&mut self) -> &str {
        self.active = match self.active {
            Slot::Primary => Slot::Secondary,
            Slot::Secondary => Slot::Primary,
        };
        info!(instrument = self.label(), "Switched instrument.");
        self.label()
    }
}
