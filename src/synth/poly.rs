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

use super::{PolyOptions, SynthVoice};

/// Keeps a full chord below clipping.
const LEVEL: f32 = 0.2;

/// A polyphonic oscillator synthesizer.
pub struct PolySynth {
    options: PolyOptions,
    pool: VoicePool,
}

impl PolySynth {
    pub fn new(options: PolyOptions, pool: VoicePool) -> PolySynth {
        PolySynth { options, pool }
    }

    fn voice(&self, note: Note, velocity: f32) -> Box<SynthVoice> {
        Box::new(SynthVoice::new(
            self.options.waveform,
            note.frequency(),
            self.options.envelope,
            LEVEL * velocity.clamp(0.0, 1.0),
            self.pool.sample_rate(),
        ))
    }
}

impl Instrument for PolySynth {
    fn name(&self) -> &str {
        "PolySynth"
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
