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

use crate::config;
use crate::instrument::Instrument;
use crate::synth::{MembraneOptions, PolyOptions};
use crate::transport::Transport;

pub mod cpal;
pub mod mixer;
pub mod mock;
pub mod source;
pub mod voice;

/// Global atomic counter for generating unique source IDs.
static SOURCE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Returns a new unique source ID.
pub fn next_source_id() -> u64 {
    SOURCE_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// The audio clock: seconds of audio rendered since the device started.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

/// An audio output along with everything that plays through it.
pub trait Device: fmt::Display + Send + Sync {
    /// Returns the name of the device.
    fn name(&self) -> &str;

    /// Returns the current audio clock time in seconds.
    fn now(&self) -> f64;

    /// Creates a sampled instrument from the given sample map.
    fn sampler(&self, config: &config::Sampler) -> Result<Arc<dyn Instrument>, Box<dyn Error>>;

    /// Creates a polyphonic synthesizer.
    fn poly_synth(&self, options: PolyOptions) -> Arc<dyn Instrument>;

    /// Creates a monophonic percussive synthesizer.
    fn membrane_synth(&self, options: MembraneOptions) -> Arc<dyn Instrument>;

    /// Returns the shared transport.
    fn transport(&self) -> Arc<dyn Transport>;
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Gets the device described by the configuration.
pub fn get_device(config: &config::Audio) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(device)));
    };

    Ok(Arc::new(cpal::Device::get(config)?))
}
