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
use std::{
    error::Error,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;
use tracing::info;

use crate::{
    config,
    notes::Note,
    synth::{MembraneOptions, PolyOptions},
    transport::{self, LoopCallback, Subdivision},
};

/// A call made on a mock instrument.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    NoteOn(Note),
    NoteOff(Note),
    AttackRelease {
        note: Note,
        duration: f64,
        start: f64,
        velocity: f32,
    },
}

/// An instrument that records every call instead of playing.
pub struct Instrument {
    name: String,
    calls: Mutex<Vec<Call>>,
}

impl Instrument {
    pub fn new(name: &str) -> Instrument {
        Instrument {
            name: name.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Returns the calls made so far.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Forgets the calls made so far.
    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

impl crate::instrument::Instrument for Instrument {
    fn name(&self) -> &str {
        &self.name
    }

    fn note_on(&self, note: Note) {
        self.calls.lock().push(Call::NoteOn(note));
    }

    fn note_off(&self, note: Note) {
        self.calls.lock().push(Call::NoteOff(note));
    }

    fn attack_release(&self, note: Note, duration: f64, start: f64, velocity: f32) {
        self.calls.lock().push(Call::AttackRelease {
            note,
            duration,
            start,
            velocity,
        });
    }
}

/// The state of a loop created on the mock transport.
pub struct LoopState {
    callback: LoopCallback,
    interval: Subdivision,
    /// Offsets passed to start, in order.
    starts: Mutex<Vec<f64>>,
    stops: AtomicU64,
}

impl LoopState {
    pub fn interval(&self) -> Subdivision {
        self.interval
    }

    pub fn starts(&self) -> Vec<f64> {
        self.starts.lock().clone()
    }

    pub fn stops(&self) -> u64 {
        self.stops.load(Ordering::Relaxed)
    }

    /// Invokes the loop's callback as if a tick fell at the given time.
    pub fn fire(&self, time: f64) {
        (self.callback)(time);
    }
}

struct Loop {
    state: Arc<LoopState>,
}

impl transport::Loop for Loop {
    fn start(&self, offset: f64) {
        self.state.starts.lock().push(offset);
    }

    fn stop(&self) {
        self.state.stops.fetch_add(1, Ordering::Relaxed);
    }
}

/// A transport that records calls and only ticks when told to.
#[derive(Default)]
pub struct Transport {
    starts: AtomicU64,
    stops: AtomicU64,
    loops: Mutex<Vec<Arc<LoopState>>>,
}

impl Transport {
    pub fn starts(&self) -> u64 {
        self.starts.load(Ordering::Relaxed)
    }

    pub fn stops(&self) -> u64 {
        self.stops.load(Ordering::Relaxed)
    }

    /// Returns every loop created so far.
    pub fn loops(&self) -> Vec<Arc<LoopState>> {
        self.loops.lock().clone()
    }
}

impl transport::Transport for Transport {
    fn bpm(&self) -> f64 {
        transport::DEFAULT_BPM
    }

    fn start(&self) {
        self.starts.fetch_add(1, Ordering::Relaxed);
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::Relaxed);
    }

    fn create_loop(
        &self,
        callback: LoopCallback,
        interval: Subdivision,
    ) -> Box<dyn transport::Loop> {
        let state = Arc::new(LoopState {
            callback,
            interval,
            starts: Mutex::new(Vec::new()),
            stops: AtomicU64::new(0),
        });
        self.loops.lock().push(state.clone());
        Box::new(Loop { state })
    }
}

/// A mock device. Doesn't actually play anything; every instrument it creates records its
/// calls, and its clock only moves when set.
pub struct Device {
    name: String,
    /// The audio clock in microseconds.
    now_micros: AtomicU64,
    instruments: Mutex<Vec<Arc<Instrument>>>,
    transport: Arc<Transport>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            now_micros: AtomicU64::new(0),
            instruments: Mutex::new(Vec::new()),
            transport: Arc::new(Transport::default()),
        }
    }

    /// Moves the audio clock.
    pub fn set_now(&self, seconds: f64) {
        self.now_micros
            .store((seconds.max(0.0) * 1e6).round() as u64, Ordering::Relaxed);
    }

    /// Returns the most recently created instrument with the given name.
    pub fn instrument(&self, name: &str) -> Option<Arc<Instrument>> {
        self.instruments
            .lock()
            .iter()
            .rev()
            .find(|instrument| instrument.name == name)
            .cloned()
    }

    /// Returns the number of instruments created with the given name.
    pub fn created(&self, name: &str) -> usize {
        self.instruments
            .lock()
            .iter()
            .filter(|instrument| instrument.name == name)
            .count()
    }

    /// Returns the mock transport.
    pub fn mock_transport(&self) -> Arc<Transport> {
        self.transport.clone()
    }

    fn create(&self, name: &str) -> Arc<Instrument> {
        info!(device = self.name, instrument = name, "Creating mock instrument.");
        let instrument = Arc::new(Instrument::new(name));
        self.instruments.lock().push(instrument.clone());
        instrument
    }
}

impl crate::audio::Device for Device {
    fn name(&self) -> &str {
        &self.name
    }

    fn now(&self) -> f64 {
        self.now_micros.load(Ordering::Relaxed) as f64 / 1e6
    }

    fn sampler(
        &self,
        config: &config::Sampler,
    ) -> Result<Arc<dyn crate::instrument::Instrument>, Box<dyn Error>> {
        Ok(self.create(config.label()))
    }

    fn poly_synth(&self, _: PolyOptions) -> Arc<dyn crate::instrument::Instrument> {
        self.create("PolySynth")
    }

    fn membrane_synth(&self, _: MembraneOptions) -> Arc<dyn crate::instrument::Instrument> {
        self.create("MembraneSynth")
    }

    fn transport(&self) -> Arc<dyn transport::Transport> {
        self.transport.clone()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
