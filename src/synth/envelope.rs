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

/// Linear attack/decay/sustain/release settings. Times are in seconds, sustain is a level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub attack: f64,
    pub decay: f64,
    pub sustain: f32,
    pub release: f64,
}

/// The running state of an envelope for one voice.
#[derive(Debug, Clone)]
pub struct EnvelopeState {
    attack: u64,
    decay: u64,
    sustain: f32,
    release: u64,
    /// Frames since the voice started.
    position: u64,
    /// Frame and level at which the release began.
    released: Option<(u64, f32)>,
}

fn frames(seconds: f64, sample_rate: u32) -> u64 {
    (seconds.max(0.0) * sample_rate as f64).round() as u64
}

impl EnvelopeState {
    pub fn new(envelope: Envelope, sample_rate: u32) -> EnvelopeState {
        EnvelopeState {
            attack: frames(envelope.attack, sample_rate),
            decay: frames(envelope.decay, sample_rate),
            sustain: envelope.sustain.clamp(0.0, 1.0),
            release: frames(envelope.release, sample_rate).max(1),
            position: 0,
            released: None,
        }
    }

    fn held_level(&self, position: u64) -> f32 {
        if position < self.attack {
            return position as f32 / self.attack as f32;
        }
        let into_decay = position - self.attack;
        if into_decay < self.decay {
            return 1.0 - (1.0 - self.sustain) * (into_decay as f32 / self.decay as f32);
        }
        self.sustain
    }

    /// Enters the release stage from the current level. Later calls do nothing.
    pub fn release(&mut self) {
        if self.released.is_none() {
            self.released = Some((self.position, self.held_level(self.position)));
        }
    }

    /// Returns the gain for the current frame and advances, or None once the envelope is silent
    /// for good.
    pub fn next_gain(&mut self) -> Option<f32> {
        let position = self.position;
        self.position += 1;

        match self.released {
            Some((start, level)) => {
                let into_release = position - start;
                if into_release >= self.release {
                    return None;
                }
                Some(level * (1.0 - into_release as f32 / self.release as f32))
            }
            None => {
                // With no sustain, a held voice is done after the decay.
                if self.sustain <= 0.0 && position >= self.attack + self.decay {
                    return None;
                }
                Some(self.held_level(position))
            }
        }
    }
}
