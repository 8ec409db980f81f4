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
use std::{io, sync::Arc};

use midly::{live::LiveEvent, MidiMessage};
use tokio::{
    sync::mpsc::{self, Sender},
    task::JoinHandle,
};
use tracing::{error, info, span, warn, Level};

use super::Event;
use crate::{midi::Device, notes::Note};

/// A controller that plays the piano from a MIDI keyboard. Keys behave like pointer presses
/// on the visual keyboard.
pub struct Driver {
    /// The MIDI device.
    midi_device: Arc<dyn Device>,
}

impl Driver {
    pub fn new(midi_device: Arc<dyn Device>) -> Driver {
        Driver { midi_device }
    }
}

/// Translates a raw MIDI message. Anything other than a note on or off is ignored.
fn to_event(raw_event: &[u8]) -> Option<Event> {
    let event = match LiveEvent::parse(raw_event) {
        Ok(event) => event,
        Err(e) => {
            error!(err = format!("{:?}", e), "Error parsing event.");
            return None;
        }
    };

    let (key, pressed) = match event {
        LiveEvent::Midi {
            message: MidiMessage::NoteOn { key, vel },
            ..
        } => (key, vel.as_int() > 0),
        LiveEvent::Midi {
            message: MidiMessage::NoteOff { key, .. },
            ..
        } => (key, false),
        _ => return None,
    };

    match Note::from_midi(key.as_int()) {
        Ok(note) if pressed => Some(Event::PointerDown(note)),
        Ok(note) => Some(Event::PointerUp(note)),
        Err(e) => {
            warn!(err = %e, "Ignoring MIDI note.");
            None
        }
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        let (midi_events_tx, mut midi_events_rx) = mpsc::channel::<Vec<u8>>(10);
        let device = self.midi_device.clone();

        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "MIDI driver");
            let _enter = span.enter();

            info!(device = device.name(), "MIDI driver started.");

            if let Err(e) = device.watch_events(midi_events_tx) {
                error!(err = e.to_string(), "Error watching MIDI events");
            }
        });

        let device = self.midi_device.clone();
        tokio::spawn(async move {
            loop {
                let raw_event = match midi_events_rx.recv().await {
                    Some(raw_event) => raw_event,
                    None => {
                        info!("MIDI watcher closed.");
                        device.stop_watch_events();
                        return Ok(());
                    }
                };

                let Some(event) = to_event(&raw_event) else {
                    continue;
                };
                if events_tx.send(event).await.is_err() {
                    info!("Controller closed, no longer watching MIDI events.");
                    device.stop_watch_events();
                    return Ok(());
                }
            }
        })
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, sync::Arc, time::Duration};

    use tokio::sync::mpsc;

    use crate::{
        controller::{Driver as _, Event},
        midi,
        notes::Note,
        test::eventually,
    };

    use super::to_event;

    fn note(name: &str) -> Note {
        name.parse().unwrap()
    }

    #[test]
    fn test_to_event() {
        assert_eq!(
            Some(Event::PointerDown(note("C4"))),
            to_event(&[0x90, 60, 100])
        );
        assert_eq!(Some(Event::PointerUp(note("C4"))), to_event(&[0x90, 60, 0]));
        assert_eq!(Some(Event::PointerUp(note("D4"))), to_event(&[0x81, 62, 64]));
        // Program change.
        assert_eq!(None, to_event(&[0xC0, 5]));
        assert_eq!(None, to_event(&[1, 2, 3, 4, 5, 6, 7, 8]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_midi_controller() -> Result<(), Box<dyn Error>> {
        let midi_device = midi::test::Device::get("mock-midi-device");
        let driver = super::Driver::new(Arc::new(midi_device.clone()));

        let (events_tx, mut events_rx) = mpsc::channel(10);
        let handle = driver.monitor_events(events_tx);
        eventually(|| midi_device.is_watching(), "MIDI device never watched");

        // Unrecognized and invalid events in between are ignored.
        midi_device.mock_event(&[0xC0, 5]);
        midi_device.mock_event(&[1, 2, 3]);
        midi_device.mock_event(&[0x90, 64, 127]);
        midi_device.mock_event(&[0x80, 64, 0]);

        let mut received = Vec::new();
        for _ in 0..2 {
            let event = tokio::time::timeout(Duration::from_secs(3), events_rx.recv()).await?;
            received.push(event.ok_or("events closed")?);
        }
        assert_eq!(
            vec![
                Event::PointerDown(note("E4")),
                Event::PointerUp(note("E4"))
            ],
            received
        );

        // Closing the controller stops the watch.
        drop(events_rx);
        midi_device.mock_event(&[0x90, 64, 127]);
        handle.await??;
        assert!(!midi_device.is_watching());
        Ok(())
    }
}
