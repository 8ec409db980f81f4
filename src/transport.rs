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

//! A tempo-driven timeline with looping callbacks.
//!
//! The transport keeps its own position relative to the audio clock. Loops are
//! evaluated slightly ahead of the clock so that every callback receives the exact
//! audio time its tick should sound at.

use std::{
    fmt,
    str::FromStr,
    sync::{Arc, Weak},
    thread,
    time::Duration,
};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::audio::Clock;

/// The fixed tempo.
pub const DEFAULT_BPM: f64 = 120.0;

/// How far ahead of the audio clock loop ticks are produced.
const LOOKAHEAD: f64 = 0.1;

/// How often the background thread polls the transport.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Called with the audio time of each loop tick.
pub type LoopCallback = Arc<dyn Fn(f64) + Send + Sync>;

/// A tempo-relative interval in 4/4 time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Subdivision {
    Whole,
    Half,
    Quarter,
    Eighth,
    Sixteenth,
}

impl Subdivision {
    /// The length of the subdivision in beats (quarter notes).
    pub fn beats(&self) -> f64 {
        match self {
            Subdivision::Whole => 4.0,
            Subdivision::Half => 2.0,
            Subdivision::Quarter => 1.0,
            Subdivision::Eighth => 0.5,
            Subdivision::Sixteenth => 0.25,
        }
    }

    /// The length of the subdivision in seconds at the given tempo.
    pub fn seconds(&self, bpm: f64) -> f64 {
        self.beats() * 60.0 / bpm
    }
}

impl fmt::Display for Subdivision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Subdivision::Whole => "1n",
            Subdivision::Half => "2n",
            Subdivision::Quarter => "4n",
            Subdivision::Eighth => "8n",
            Subdivision::Sixteenth => "16n",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Subdivision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1n" => Ok(Subdivision::Whole),
            "2n" => Ok(Subdivision::Half),
            "4n" => Ok(Subdivision::Quarter),
            "8n" => Ok(Subdivision::Eighth),
            "16n" => Ok(Subdivision::Sixteenth),
            _ => Err(format!("unknown subdivision {}", s)),
        }
    }
}

/// A shared timeline with tempo, start and stop.
pub trait Transport: Send + Sync {
    /// Returns the tempo in beats per minute.
    fn bpm(&self) -> f64;

    /// Starts the timeline. Starting a running transport does nothing.
    fn start(&self);

    /// Stops the timeline and rewinds it to the beginning.
    fn stop(&self);

    /// Creates a loop that calls back once per subdivision while started.
    fn create_loop(&self, callback: LoopCallback, interval: Subdivision) -> Box<dyn Loop>;
}

/// A repeating action bound to a transport.
pub trait Loop: Send + Sync {
    /// Starts the loop at the given transport position in seconds.
    fn start(&self, offset: f64);

    /// Stops the loop.
    fn stop(&self);
}

struct LoopState {
    id: u64,
    callback: LoopCallback,
    interval: Subdivision,
    /// Transport position of the first tick, None while stopped.
    offset: Option<f64>,
    /// Index of the next tick to fire, None until the loop is next polled.
    next_tick: Option<u64>,
}

#[derive(Default)]
struct TransportState {
    /// Audio time of transport position zero, None while stopped.
    origin: Option<f64>,
    loops: Vec<LoopState>,
    next_loop_id: u64,
}

/// A transport that follows the audio clock.
pub struct ClockTransport {
    clock: Arc<dyn Clock>,
    bpm: f64,
    state: Arc<Mutex<TransportState>>,
}

impl ClockTransport {
    /// Creates a transport driven by the given clock. Nothing fires until poll is called.
    pub fn new(clock: Arc<dyn Clock>) -> ClockTransport {
        ClockTransport {
            clock,
            bpm: DEFAULT_BPM,
            state: Arc::new(Mutex::new(TransportState::default())),
        }
    }

    /// Creates a transport and a background thread that polls it until it is dropped.
    pub fn spawn(clock: Arc<dyn Clock>) -> Arc<ClockTransport> {
        let transport = Arc::new(ClockTransport::new(clock));
        let weak: Weak<ClockTransport> = Arc::downgrade(&transport);
        thread::spawn(move || {
            debug!("Transport thread started.");
            loop {
                spin_sleep::sleep(POLL_INTERVAL);
                match weak.upgrade() {
                    Some(transport) => transport.poll(),
                    None => break,
                }
            }
            debug!("Transport thread finished.");
        });
        transport
    }

    /// Fires every loop tick that falls within the lookahead window.
    pub fn poll(&self) {
        let now = self.clock.now();
        let horizon = now + LOOKAHEAD;

        let mut due: Vec<(LoopCallback, f64)> = Vec::new();
        {
            let mut state = self.state.lock();
            let Some(origin) = state.origin else {
                return;
            };

            for state_loop in state.loops.iter_mut() {
                let Some(offset) = state_loop.offset else {
                    continue;
                };
                let interval = state_loop.interval.seconds(self.bpm);
                let next_tick = *state_loop.next_tick.get_or_insert_with(|| {
                    // Join a running transport at the next tick boundary.
                    let elapsed = now - origin - offset;
                    if elapsed <= 0.0 {
                        0
                    } else {
                        (elapsed / interval).ceil() as u64
                    }
                });

                let mut tick = next_tick;
                loop {
                    let time = origin + offset + tick as f64 * interval;
                    if time > horizon {
                        break;
                    }
                    due.push((state_loop.callback.clone(), time));
                    tick += 1;
                }
                state_loop.next_tick = Some(tick);
            }
        }

        // Callbacks run outside of the lock so they may use the transport.
        for (callback, time) in due {
            callback(time);
        }
    }
}

impl Transport for ClockTransport {
    fn bpm(&self) -> f64 {
        self.bpm
    }

    fn start(&self) {
        let mut state = self.state.lock();
        if state.origin.is_none() {
            let origin = self.clock.now() + LOOKAHEAD;
            state.origin = Some(origin);
            info!(bpm = self.bpm, origin, "Transport started.");
        }
    }

    fn stop(&self) {
        let mut state = self.state.lock();
        state.origin = None;
        for state_loop in state.loops.iter_mut() {
            state_loop.next_tick = None;
        }
        info!("Transport stopped.");
    }

    fn create_loop(&self, callback: LoopCallback, interval: Subdivision) -> Box<dyn Loop> {
        let mut state = self.state.lock();
        let id = state.next_loop_id;
        state.next_loop_id += 1;
        state.loops.push(LoopState {
            id,
            callback,
            interval,
            offset: None,
            next_tick: None,
        });
        debug!(id, interval = %interval, "Loop created.");

        Box::new(ClockLoop {
            id,
            state: self.state.clone(),
        })
    }
}

/// A loop on a ClockTransport.
struct ClockLoop {
    id: u64,
    state: Arc<Mutex<TransportState>>,
}

impl ClockLoop {
    fn update(&self, offset: Option<f64>) {
        let mut state = self.state.lock();
        if let Some(state_loop) = state.loops.iter_mut().find(|l| l.id == self.id) {
            state_loop.offset = offset;
            state_loop.next_tick = None;
        }
    }
}

impl Loop for ClockLoop {
    fn start(&self, offset: f64) {
        self.update(Some(offset.max(0.0)));
    }

    fn stop(&self) {
        self.update(None);
    }
}

impl Drop for ClockLoop {
    fn drop(&mut self) {
        self.state.lock().loops.retain(|l| l.id != self.id);
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    /// A clock that only moves when told to.
    #[derive(Default)]
    struct ManualClock {
        now: Mutex<f64>,
    }

    impl ManualClock {
        fn set(&self, now: f64) {
            *self.now.lock() = now;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> f64 {
            *self.now.lock()
        }
    }

    fn recorder() -> (LoopCallback, Arc<Mutex<Vec<f64>>>) {
        let ticks = Arc::new(Mutex::new(Vec::new()));
        let callback: LoopCallback = {
            let ticks = ticks.clone();
            Arc::new(move |time| ticks.lock().push(time))
        };
        (callback, ticks)
    }

    fn assert_times(expected: &[f64], actual: &[f64]) {
        assert_eq!(expected.len(), actual.len(), "{:?} != {:?}", expected, actual);
        for (expected, actual) in expected.iter().zip(actual.iter()) {
            assert!(
                (expected - actual).abs() < 1e-9,
                "{:?} != {:?}",
                expected,
                actual
            );
        }
    }

    #[test]
    fn test_subdivision() {
        assert_eq!(0.5, Subdivision::Quarter.seconds(120.0));
        assert_eq!(0.25, Subdivision::Eighth.seconds(120.0));
        assert_eq!(2.0, Subdivision::Whole.seconds(120.0));
        assert_eq!(Ok(Subdivision::Sixteenth), "16n".parse());
        assert_eq!("4n", Subdivision::Quarter.to_string());
        assert!("3n".parse::<Subdivision>().is_err());
    }

    #[test]
    fn test_quarter_note_loop() {
        let clock = Arc::new(ManualClock::default());
        let transport = ClockTransport::new(clock.clone());
        let (callback, ticks) = recorder();
        let quarter = transport.create_loop(callback, Subdivision::Quarter);

        clock.set(1.0);
        transport.start();
        quarter.start(0.0);

        // Beat zero lands one lookahead after the start.
        transport.poll();
        assert_times(&[1.1], &ticks.lock());

        clock.set(1.55);
        transport.poll();
        assert_times(&[1.1, 1.6], &ticks.lock());

        // Polling late still delivers every tick with its exact time.
        clock.set(2.6);
        transport.poll();
        assert_times(&[1.1, 1.6, 2.1, 2.6], &ticks.lock());
    }

    #[test]
    fn test_stop_silences_and_rewinds() {
        let clock = Arc::new(ManualClock::default());
        let transport = ClockTransport::new(clock.clone());
        let (callback, ticks) = recorder();
        let quarter = transport.create_loop(callback, Subdivision::Quarter);

        transport.start();
        quarter.start(0.0);
        transport.poll();
        assert_eq!(1, ticks.lock().len());

        quarter.stop();
        transport.stop();
        clock.set(5.0);
        transport.poll();
        assert_eq!(1, ticks.lock().len());

        // A restart begins a fresh bar from the new start time.
        transport.start();
        quarter.start(0.0);
        transport.poll();
        assert_times(&[0.1, 5.1], &ticks.lock());
    }

    #[test]
    fn test_loop_joins_running_transport() {
        let clock = Arc::new(ManualClock::default());
        let transport = ClockTransport::new(clock.clone());
        transport.start();

        clock.set(1.0);
        let (callback, ticks) = recorder();
        let quarter = transport.create_loop(callback, Subdivision::Quarter);
        quarter.start(0.0);
        transport.poll();

        // Position is 0.9s, so the next boundary is 1.0s, i.e. audio time 1.1.
        assert_times(&[1.1], &ticks.lock());
    }

    #[test]
    fn test_dropped_loop_removed() {
        let clock = Arc::new(ManualClock::default());
        let transport = ClockTransport::new(clock.clone());
        let (callback, ticks) = recorder();
        let quarter = transport.create_loop(callback, Subdivision::Quarter);
        quarter.start(0.0);
        drop(quarter);

        transport.start();
        transport.poll();
        assert!(ticks.lock().is_empty());
        assert!(transport.state.lock().loops.is_empty());
    }
}
