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

use crate::{
    instrument::Instrument,
    notes::{Note, NoteError},
    transport::{Loop, LoopCallback, Subdivision, Transport},
};

/// The note the click is played at.
const CLICK_NOTE: &str = "C2";
/// The click sounds once per beat.
const CLICK_INTERVAL: Subdivision = Subdivision::Quarter;
/// Each click lasts an eighth note.
const CLICK_LENGTH: Subdivision = Subdivision::Eighth;

/// A click on every beat of the transport.
pub struct Metronome {
    transport: Arc<dyn Transport>,
    click: Arc<dyn Instrument>,
    note: Note,
    /// Created the first time the metronome starts and reused afterwards.
    click_loop: Option<Box<dyn Loop>>,
    running: bool,
}

impl Metronome {
    pub fn new(
        transport: Arc<dyn Transport>,
        click: Arc<dyn Instrument>,
    ) -> Result<Metronome, NoteError> {
        Ok(Metronome {
            transport,
            click,
            note: CLICK_NOTE.parse()?,
            click_loop: None,
            running: false,
        })
    }

    /// Returns true while the metronome is clicking.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Starts the metronome if it is stopped, stops it otherwise. Returns the new state.
    pub fn toggle(&mut self) -> bool {
        if self.running {
            if let Some(click_loop) = self.click_loop.as_ref() {
                click_loop.stop();
            }
            self.transport.stop();
            self.running = false;
            info!("Metronome stopped.");
        } else {
            let click_loop = self.click_loop.get_or_insert_with(|| {
                let click = self.click.clone();
                let note = self.note;
                let length = CLICK_LENGTH.seconds(self.transport.bpm());
                let callback: LoopCallback =
                    Arc::new(move |time| click.attack_release(note, length, time, 1.0));
                self.transport.create_loop(callback, CLICK_INTERVAL)
            });
            self.transport.start();
            click_loop.start(0.0);
            self.running = true;
            info!(bpm = self.transport.bpm(), "Metronome started.");
        }
        self.running
    }
}
