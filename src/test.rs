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
    thread,
    time::{Duration, Instant},
};

use parking_lot::Mutex;

use crate::{
    controller::Event,
    scheduler::{Deferred, Scheduler},
};

/// Wait for the given predicate to return true or fail.
#[inline]
pub fn eventually<F>(predicate: F, error_msg: &str)
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    let tick = Duration::from_millis(10);
    let timeout = Duration::from_secs(3);

    while !predicate() {
        if start.elapsed() > timeout {
            panic!("{}", error_msg);
        }
        thread::sleep(tick);
    }
}

/// Records everything scheduled instead of running it.
#[derive(Default)]
pub struct RecordingScheduler {
    scheduled: Mutex<Vec<(Duration, Event)>>,
    deferred: Mutex<Vec<Deferred>>,
}

impl RecordingScheduler {
    /// Takes the scheduled events, in the order they were scheduled.
    pub fn take_scheduled(&self) -> Vec<(Duration, Event)> {
        std::mem::take(&mut *self.scheduled.lock())
    }

    /// Takes the deferred futures.
    pub fn take_deferred(&self) -> Vec<Deferred> {
        std::mem::take(&mut *self.deferred.lock())
    }
}

impl Scheduler for RecordingScheduler {
    fn schedule(&self, delay: Duration, event: Event) {
        self.scheduled.lock().push((delay, event));
    }

    fn defer(&self, future: Deferred) {
        self.deferred.lock().push(future);
    }
}
