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

//! Oscillator-based instruments.

use std::f64::consts::TAU;

use crate::audio::source::Source;

mod envelope;
mod membrane;
mod poly;

use envelope::EnvelopeState;

pub use envelope::Envelope;
pub use membrane::MembraneSynth;
pub use poly::PolySynth;

/// Oscillator waveforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Triangle,
    Square,
    Sawtooth,
}

impl Waveform {
    /// Samples the waveform at the given phase, in cycles (0 to 1).
    fn sample(&self, phase: f64) -> f32 {
        let value = match self {
            Waveform::Sine => (phase * TAU).sin(),
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => 2.0 * phase - 1.0,
        };
        value as f32
    }
}

/// Settings for the polyphonic synthesizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolyOptions {
    pub waveform: Waveform,
    pub envelope: Envelope,
}

impl Default for PolyOptions {
    /// The MIDI playback voice: a triangle with a short attack and a one second tail.
    fn default() -> Self {
        PolyOptions {
            waveform: Waveform::Triangle,
            envelope: Envelope {
                attack: 0.02,
                decay: 0.1,
                sustain: 0.3,
                release: 1.0,
            },
        }
    }
}

/// Settings for the membrane synthesizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MembraneOptions {
    /// Time for the pitch to fall to the played note, in seconds.
    pub pitch_decay: f64,
    /// The starting pitch as a multiple of the played note's frequency.
    pub octaves: f64,
    pub envelope: Envelope,
}

impl Default for MembraneOptions {
    /// The metronome click.
    fn default() -> Self {
        MembraneOptions {
            pitch_decay: 0.05,
            octaves: 10.0,
            envelope: Envelope {
                attack: 0.001,
                decay: 0.1,
                sustain: 0.0,
                release: 1.4,
            },
        }
    }
}

/// An exponential glide from one frequency to another.
#[derive(Debug, Clone, Copy)]
struct Glide {
    from: f64,
    to: f64,
    frames: u64,
}

impl Glide {
    fn steady(frequency: f64) -> Glide {
        Glide {
            from: frequency,
            to: frequency,
            frames: 0,
        }
    }

    fn frequency_at(&self, position: u64) -> f64 {
        if position >= self.frames || self.from <= 0.0 {
            return self.to;
        }
        self.from * (self.to / self.from).powf(position as f64 / self.frames as f64)
    }
}

/// One oscillator voice shaped by an envelope.
pub(crate) struct SynthVoice {
    waveform: Waveform,
    glide: Glide,
    envelope: EnvelopeState,
    gain: f32,
    sample_rate: f64,
    phase: f64,
    position: u64,
}

impl SynthVoice {
    /// A voice at a fixed frequency.
    pub(crate) fn new(
        waveform: Waveform,
        frequency: f64,
        envelope: Envelope,
        gain: f32,
        sample_rate: u32,
    ) -> SynthVoice {
        SynthVoice {
            waveform,
            glide: Glide::steady(frequency),
            envelope: EnvelopeState::new(envelope, sample_rate),
            gain,
            sample_rate: sample_rate as f64,
            phase: 0.0,
            position: 0,
        }
    }

    /// Starts the voice at a different frequency and glides to its own over the given time.
    pub(crate) fn with_glide(mut self, from: f64, seconds: f64) -> SynthVoice {
        self.glide = Glide {
            from,
            to: self.glide.to,
            frames: (seconds.max(0.0) * self.sample_rate).round() as u64,
        };
        self
    }
}

impl Source for SynthVoice {
    fn next_sample(&mut self) -> Option<f32> {
        let gain = self.envelope.next_gain()?;
        let sample = self.waveform.sample(self.phase) * gain * self.gain;

        let frequency = self.glide.frequency_at(self.position);
        self.phase = (self.phase + frequency / self.sample_rate).fract();
        self.position += 1;
        Some(sample)
    }

    fn release(&mut self) {
        self.envelope.release();
    }
}
