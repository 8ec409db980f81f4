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

//! One-shot deferred delivery of events back into the controller.

use std::{future::Future, pin::Pin, time::Duration};

use tokio::sync::mpsc::Sender;
use tracing::debug;

use crate::controller::Event;

/// Work that runs off the event loop and may produce an event for it.
pub type Deferred = Pin<Box<dyn Future<Output = Option<Event>> + Send>>;

/// Delivers events to the piano later.
pub trait Scheduler: Send + Sync {
    /// Delivers the event once the delay has passed.
    fn schedule(&self, delay: Duration, event: Event);

    /// Runs the future in the background and delivers its event, if it produces one.
    fn defer(&self, future: Deferred);
}

/// A scheduler built on tokio timers. Must be used from within a tokio runtime.
pub struct TokioScheduler {
    events_tx: Sender<Event>,
}

impl TokioScheduler {
    pub fn new(events_tx: Sender<Event>) -> TokioScheduler {
        TokioScheduler { events_tx }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, event: Event) {
        let events_tx = self.events_tx.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if let Err(e) = events_tx.send(event).await {
                debug!(event = ?e.0, "Controller closed before scheduled event.");
            }
        });
    }

    fn defer(&self, future: Deferred) {
        let events_tx = self.events_tx.clone();
        tokio::spawn(async move {
            let Some(event) = future.await else {
                return;
            };
            if let Err(e) = events_tx.send(event).await {
                debug!(event = ?e.0, "Controller closed before deferred event.");
            }
        });
    }
}
