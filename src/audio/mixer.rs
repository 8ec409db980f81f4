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
// Core audio mixing logic shared by the cpal output and the tests.
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use super::source::Source;
use super::Clock;
use crate::playsync::CancelHandle;

/// Marker for a voice that has no release scheduled yet.
pub const NO_RELEASE: u64 = u64::MAX;

/// Channel used to hand new voices to the mixer without taking its lock.
pub type SourceSender = Sender<ActiveSource>;

/// A voice handed to the mixer along with its schedule.
pub struct ActiveSource {
    /// Unique ID for this source.
    pub id: u64,
    /// The voice itself.
    pub source: Box<dyn Source>,
    /// The frame at which the voice starts sounding.
    pub start_at_sample: u64,
    /// The frame at which the voice enters its release stage, NO_RELEASE if not scheduled.
    pub release_at_sample: Arc<AtomicU64>,
    /// Set by the mixer once the voice has finished or was cancelled.
    pub is_finished: Arc<AtomicBool>,
    /// Cancelling stops the voice immediately, skipping its release.
    pub cancel_handle: CancelHandle,
}

impl ActiveSource {
    fn finish(&self) {
        self.is_finished.store(true, Ordering::Relaxed);
    }
}

/// Orders pending sources so the earliest start is popped first.
struct Pending(ActiveSource);

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.0.start_at_sample == other.0.start_at_sample && self.0.id == other.0.id
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        (other.0.start_at_sample, other.0.id).cmp(&(self.0.start_at_sample, self.0.id))
    }
}

/// A voice that has started sounding.
struct Playing {
    source: ActiveSource,
    released: bool,
}

#[derive(Default)]
struct MixState {
    pending: BinaryHeap<Pending>,
    playing: Vec<Playing>,
}

/// Mixes scheduled mono voices into interleaved output frames and keeps the audio clock.
pub struct AudioMixer {
    /// Number of output channels.
    num_channels: u16,
    /// Output sample rate.
    sample_rate: u32,
    /// Frames mixed so far. This is the audio clock.
    current_sample: AtomicU64,
    /// Sender side handed out to instruments.
    source_tx: SourceSender,
    /// Receiver drained at the start of every block.
    source_rx: Receiver<ActiveSource>,
    /// Pending and playing voices.
    state: Mutex<MixState>,
}

impl AudioMixer {
    /// Creates a new audio mixer.
    pub fn new(num_channels: u16, sample_rate: u32) -> Self {
        let (source_tx, source_rx) = crossbeam_channel::unbounded();
        Self {
            num_channels: num_channels.max(1),
            sample_rate,
            current_sample: AtomicU64::new(0),
            source_tx,
            source_rx,
            state: Mutex::new(MixState::default()),
        }
    }

    /// Returns a sender that instruments use to add voices.
    pub fn sender(&self) -> SourceSender {
        self.source_tx.clone()
    }

    /// Gets the number of output channels.
    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    /// Gets the sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Gets the number of frames mixed so far.
    pub fn current_sample(&self) -> u64 {
        self.current_sample.load(Ordering::Acquire)
    }

    /// Converts an audio-clock time to a frame, never earlier than the current frame.
    pub fn sample_at(&self, seconds: f64) -> u64 {
        let sample = (seconds.max(0.0) * self.sample_rate as f64).round() as u64;
        sample.max(self.current_sample())
    }

    /// Returns the number of voices waiting to start and the number sounding.
    pub fn source_counts(&self) -> (usize, usize) {
        let state = self.state.lock();
        (state.pending.len(), state.playing.len())
    }

    /// Mixes as many frames as fit into the interleaved output buffer.
    pub fn process_into(&self, output: &mut [f32]) {
        let channels = self.num_channels as usize;
        let mut state = self.state.lock();

        while let Ok(source) = self.source_rx.try_recv() {
            state.pending.push(Pending(source));
        }

        let mut current = self.current_sample();
        for frame in output.chunks_exact_mut(channels) {
            while state
                .pending
                .peek()
                .is_some_and(|pending| pending.0.start_at_sample <= current)
            {
                if let Some(Pending(source)) = state.pending.pop() {
                    if source.cancel_handle.is_cancelled() {
                        source.finish();
                    } else {
                        state.playing.push(Playing {
                            source,
                            released: false,
                        });
                    }
                }
            }

            let mut sum = 0.0f32;
            state.playing.retain_mut(|playing| {
                if playing.source.cancel_handle.is_cancelled() {
                    playing.source.finish();
                    return false;
                }

                if !playing.released
                    && playing.source.release_at_sample.load(Ordering::Relaxed) <= current
                {
                    playing.released = true;
                    playing.source.source.release();
                }

                match playing.source.source.next_sample() {
                    Some(sample) => {
                        sum += sample;
                        true
                    }
                    None => {
                        playing.source.finish();
                        false
                    }
                }
            });

            frame.fill(sum.clamp(-1.0, 1.0));
            current += 1;
        }

        self.current_sample.store(current, Ordering::Release);
    }

    /// Mixes the given number of frames into a new buffer.
    pub fn process_frames(&self, num_frames: usize) -> Vec<f32> {
        let mut frames = vec![0.0f32; num_frames * self.num_channels as usize];
        self.process_into(&mut frames);
        frames
    }
}

impl Clock for AudioMixer {
    fn now(&self) -> f64 {
        self.current_sample() as f64 / self.sample_rate as f64
    }
}
