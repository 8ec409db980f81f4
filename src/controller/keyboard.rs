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
use std::io;

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::Event;
use crate::notes::Note;

const SWITCH: &str = "switch";
const SONG: &str = "song";
const MIDI: &str = "midi";
const METRONOME: &str = "metronome";
const QUIT: &str = "quit";

const DOWN: &str = "down";
const UP: &str = "up";
const LEAVE: &str = "leave";

/// A controller that plays the piano from a terminal. Each line is either a command, a
/// pointer action on a visual key (`down C4`), keys to hold (`+asd`) or release (`-asd`),
/// or keys to tap (`asd`).
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Reads one line and sends its events. Returns false once input is done.
    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Keys or command ({}, {}, {}, {}, {}): ",
            SWITCH, SONG, MIDI, METRONOME, QUIT,
        )?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            info!("Input closed.");
            events_tx
                .blocking_send(Event::Quit)
                .map_err(io::Error::other)?;
            return Ok(false);
        }

        let Some(events) = parse_input(&input) else {
            warn!(input = input.trim(), "Unrecognized input");
            return Ok(true);
        };

        let mut running = true;
        for event in events {
            running &= event != Event::Quit;
            events_tx.blocking_send(event).map_err(io::Error::other)?;
        }
        Ok(running)
    }
}

/// Turns one line of input into events.
fn parse_input(input: &str) -> Option<Vec<Event>> {
    let input = input.trim();
    match input.to_lowercase().as_str() {
        "" => return Some(Vec::new()),
        SWITCH => return Some(vec![Event::SwitchInstrument]),
        SONG => return Some(vec![Event::PlaySong]),
        MIDI => return Some(vec![Event::PlayMidi]),
        METRONOME => return Some(vec![Event::ToggleMetronome]),
        QUIT => return Some(vec![Event::Quit]),
        _ => {}
    }

    if let Some((action, note)) = input.split_once(char::is_whitespace) {
        let note: Note = note.trim().parse().ok()?;
        return match action.to_lowercase().as_str() {
            DOWN => Some(vec![Event::PointerDown(note)]),
            UP => Some(vec![Event::PointerUp(note)]),
            LEAVE => Some(vec![Event::PointerLeave(note)]),
            _ => None,
        };
    }

    let (keys, press, release) = if let Some(keys) = input.strip_prefix('+') {
        (keys, true, false)
    } else if let Some(keys) = input.strip_prefix('-') {
        (keys, false, true)
    } else {
        (input, true, true)
    };
    if keys.is_empty() || !keys.chars().all(|key| key.is_ascii_lowercase()) {
        return None;
    }

    let mut events = Vec::with_capacity(keys.len() * 2);
    for key in keys.chars() {
        if press {
            events.push(Event::KeyDown(key));
        }
        if release {
            events.push(Event::KeyUp(key));
        }
    }
    Some(events)
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}
            info!("Keyboard driver stopped.");
            Ok(())
        })
    }
}
