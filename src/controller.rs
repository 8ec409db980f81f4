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
use std::error::Error;
use std::io;
use std::sync::Arc;

use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, span, Instrument, Level};

use crate::{
    audio, config,
    notes::Note,
    piano::Piano,
    piece::MidiPiece,
    scheduler::TokioScheduler,
};

pub mod keyboard;
pub mod midi;
pub mod multi;

/// How many events may queue up before senders wait.
const EVENT_BUFFER: usize = 64;

/// Events that drive the piano. Drivers produce the input events; the piano schedules the
/// song and MIDI events for itself.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A physical key went down.
    KeyDown(char),

    /// A physical key came up.
    KeyUp(char),

    /// A visual key was pressed.
    PointerDown(Note),

    /// A visual key was released.
    PointerUp(Note),

    /// The pointer left a visual key. Treated as a release.
    PointerLeave(Note),

    /// Flips between the two live instruments.
    SwitchInstrument,

    /// Plays the canned song.
    PlaySong,

    /// Loads and plays the configured MIDI file.
    PlayMidi,

    /// Starts or stops the metronome.
    ToggleMetronome,

    /// Stops the controller.
    Quit,

    /// A song note's simulated key press.
    SongPress(Note),

    /// A song note's direct attack on the active instrument.
    SongAttack(Note),

    /// A MIDI file finished loading and is ready to play.
    MidiLoaded(Arc<MidiPiece>),
}

/// A source of input events.
pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Runs the piano, feeding it events until it is told to quit.
pub struct Controller {
    handle: JoinHandle<()>,
}

impl Controller {
    /// Creates the piano and starts the driver. Must be called from within a tokio runtime.
    pub fn new(
        config: &config::Piano,
        device: Arc<dyn audio::Device>,
        driver: Arc<dyn Driver>,
    ) -> Result<Controller, Box<dyn Error>> {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let scheduler = Arc::new(TokioScheduler::new(events_tx.clone()));
        let piano = Piano::new(config, device, scheduler)?;
        let monitor = driver.monitor_events(events_tx);

        let span = span!(Level::INFO, "controller");
        Ok(Controller {
            handle: tokio::spawn(
                Controller::trigger_events(piano, events_rx, monitor).instrument(span),
            ),
        })
    }

    /// Join will block until the controller finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    /// Hands every event to the piano in the order it arrives.
    async fn trigger_events(
        mut piano: Piano,
        mut events_rx: Receiver<Event>,
        monitor: JoinHandle<Result<(), io::Error>>,
    ) {
        info!(instrument = piano.label(), "Controller started.");

        while let Some(event) = events_rx.recv().await {
            debug!(event = ?event, "Received event.");
            if !piano.handle(event) {
                break;
            }
        }

        info!("Controller closing.");
        // A driver blocked on input can't be joined, so stop waiting on it.
        if !monitor.is_finished() {
            monitor.abort();
        }
    }
}

/// Creates the driver described by the configuration.
pub fn driver(config: &config::Controller) -> Result<Arc<dyn Driver>, Box<dyn Error>> {
    match config {
        config::Controller::Keyboard => Ok(Arc::new(keyboard::Driver::new())),
        config::Controller::Midi(midi_config) => Ok(Arc::new(midi::Driver::new(
            crate::midi::get_device(midi_config.device())?,
        ))),
        config::Controller::Multi(controllers) => {
            let drivers = controllers
                .iter()
                .map(|(name, controller)| match controller {
                    config::Controller::Multi(_) => Err(format!(
                        "controller {}: nested multi controllers are not supported",
                        name
                    )
                    .into()),
                    controller => driver(controller),
                })
                .collect::<Result<Vec<Arc<dyn Driver>>, Box<dyn Error>>>()?;
            Ok(Arc::new(multi::Driver::new(drivers)))
        }
    }
}
