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
use crate::{audio::voice::VoicePool, instrument::Instrument, notes::Note};

use super::{MembraneOptions, SynthVoice, Waveform};

const LEVEL: f32 = 0.8;

/// A kick-drum style synthesizer: a sine whose pitch drops quickly onto the played note.
/// Plays one voice at a time; a new hit cuts off the previous one.
pub struct MembraneSynth {
    options: MembraneOptions,
    pool: VoicePool,
}

impl MembraneSynth {
    /// Creates a new membrane synth. The pool should hold a single voice.
    pub fn new(options: MembraneOptions, pool: VoicePool) -> MembraneSynth {
        MembraneSynth { options, pool }
    }

    fn voice(&self, note: Note, velocity: f32) -> Box<SynthVoice> {
        let frequency = note.frequency();
        Box::new(
            SynthVoice::new(
                Waveform::Sine,
                frequency,
                self.options.envelope,
                LEVEL * velocity.clamp(0.0, 1.0),
                self.pool.sample_rate(),
            )
            .with_glide(frequency * self.options.octaves, self.options.pitch_decay),
        )
    }
}

impl Instrument for MembraneSynth {
    fn name(&self) -> &str {
        "MembraneSynth"
    }

    fn note_on(&self, note: Note) {
        self.pool.start(note, self.voice(note, 1.0), None, None);
    }

    fn note_off(&self, note: Note) {
        self.pool.release(note, None);
    }

    fn attack_release(&self, note: Note, duration: f64, start: f64, velocity: f32) {
        self.pool
            .start(note, self.voice(note, velocity), Some(start), Some(duration));
    }
}
