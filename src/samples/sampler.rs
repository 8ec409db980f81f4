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
use std::{error::Error, sync::Arc};

use tracing::{debug, info};

use super::loader::{LoadedSample, SampleLoader};
use crate::{
    audio::{
        source::{Fade, Source},
        voice::VoicePool,
    },
    config,
    instrument::Instrument,
    notes::Note,
};

/// A sampled instrument. Notes without their own sample are pitched from the nearest one.
pub struct Sampler {
    name: String,
    /// Samples sorted by note.
    zones: Vec<(Note, LoadedSample)>,
    /// Release time in seconds.
    release: f64,
    pool: VoicePool,
}

impl Sampler {
    /// Creates a sampler from already loaded samples.
    pub fn new(
        name: &str,
        mut zones: Vec<(Note, LoadedSample)>,
        release: f64,
        pool: VoicePool,
    ) -> Sampler {
        zones.sort_by_key(|(note, _)| *note);
        Sampler {
            name: name.to_string(),
            zones,
            release,
            pool,
        }
    }

    /// Loads every sample in the configuration and creates the sampler.
    pub fn load(
        config: &config::Sampler,
        loader: &mut SampleLoader,
        pool: VoicePool,
    ) -> Result<Sampler, Box<dyn Error>> {
        let zones = config
            .samples()?
            .into_iter()
            .map(|(note, path)| Ok((note, loader.load(&path)?)))
            .collect::<Result<Vec<(Note, LoadedSample)>, Box<dyn Error>>>()?;

        info!(
            instrument = config.label(),
            samples = zones.len(),
            "Sampler loaded"
        );
        Ok(Sampler::new(
            config.label(),
            zones,
            config.release()?.as_secs_f64(),
            pool,
        ))
    }

    /// Finds the sample closest to the note and how many semitones it has to be shifted.
    /// On a tie the higher sample wins.
    fn nearest(&self, note: Note) -> Option<(&LoadedSample, i16)> {
        self.zones
            .iter()
            .min_by_key(|(zone, _)| {
                let interval = note.midi() as i16 - zone.midi() as i16;
                (interval.abs(), interval)
            })
            .map(|(zone, sample)| (sample, note.midi() as i16 - zone.midi() as i16))
    }

    fn voice(&self, note: Note, velocity: f32) -> Option<Box<SampleVoice>> {
        let Some((sample, semitones)) = self.nearest(note) else {
            debug!(instrument = self.name, note = %note, "No samples to play");
            return None;
        };

        Some(Box::new(SampleVoice {
            data: sample.data(),
            position: 0.0,
            step: 2f64.powf(semitones as f64 / 12.0),
            gain: velocity.clamp(0.0, 1.0),
            fade: Fade::new(self.release, self.pool.sample_rate()),
        }))
    }
}

impl Instrument for Sampler {
    fn name(&self) -> &str {
        &self.name
    }

    fn note_on(&self, note: Note) {
        if let Some(voice) = self.voice(note, 1.0) {
            self.pool.start(note, voice, None, None);
        }
    }

    fn note_off(&self, note: Note) {
        self.pool.release(note, None);
    }

    fn attack_release(&self, note: Note, duration: f64, start: f64, velocity: f32) {
        if let Some(voice) = self.voice(note, velocity) {
            self.pool.start(note, voice, Some(start), Some(duration));
        }
    }
}

/// Plays one sample, resampled to shift its pitch.
struct SampleVoice {
    data: Arc<Vec<f32>>,
    /// Read position in source frames.
    position: f64,
    /// Source frames advanced per output frame.
    step: f64,
    gain: f32,
    fade: Fade,
}

impl Source for SampleVoice {
    fn next_sample(&mut self) -> Option<f32> {
        let index = self.position as usize;
        let s0 = *self.data.get(index)?;
        let fade = self.fade.next_gain()?;
        let s1 = self.data.get(index + 1).copied().unwrap_or(s0);
        let frac = self.position.fract() as f32;

        self.position += self.step;
        Some((s0 + (s1 - s0) * frac) * self.gain * fade)
    }

    fn release(&mut self) {
        self.fade.start();
    }
}
