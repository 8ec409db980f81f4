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
use std::{error::Error, fmt, sync::Arc, thread};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use tracing::{error, info, span, Level};

use crate::{
    audio::{mixer::AudioMixer, voice::VoicePool, Device as AudioDevice},
    config,
    instrument::Instrument,
    playsync::CancelHandle,
    samples::{SampleLoader, Sampler},
    synth::{MembraneOptions, MembraneSynth, PolyOptions, PolySynth},
    transport::{ClockTransport, Transport},
};

/// The piano is mixed in stereo at most.
const MAX_OUTPUT_CHANNELS: u16 = 2;

/// A small wrapper around a cpal::Device. Owns the mixer that every instrument plays
/// through and the transport that runs on its clock.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
    /// Mixes every voice. Its frame counter is the audio clock.
    mixer: Arc<AudioMixer>,
    /// The transport driven by the audio clock.
    transport: Arc<ClockTransport>,
    /// Sample cache shared by the samplers on this device.
    loader: Mutex<SampleLoader>,
    /// Polyphony limit per instrument.
    max_voices: u32,
    /// The running output stream, if the device has been opened.
    output: Option<Output>,
}

/// The thread that owns the cpal stream.
struct Output {
    cancel_handle: CancelHandle,
    thread: Option<thread::JoinHandle<()>>,
}

impl Drop for Output {
    fn drop(&mut self) {
        self.cancel_handle.cancel();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Audio output thread panicked");
            }
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

/// f32 callback: mix straight into the cpal buffer.
fn create_f32_callback(
    mixer: Arc<AudioMixer>,
) -> impl FnMut(&mut [f32], &cpal::OutputCallbackInfo) + Send + 'static {
    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        mixer.process_into(data);
    }
}

/// Integer callback: mix into a scratch buffer and convert.
fn create_int_callback<T: cpal::SizedSample + cpal::FromSample<f32>>(
    mixer: Arc<AudioMixer>,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static {
    let mut scratch: Vec<f32> = Vec::new();
    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        scratch.resize(data.len(), 0.0);
        mixer.process_into(&mut scratch);
        for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
            *dst = T::from_sample(src);
        }
    }
}

/// Builds the output stream in its own thread and keeps it alive until cancelled.
fn start_output_thread(
    device: cpal::Device,
    mixer: Arc<AudioMixer>,
    sample_format: cpal::SampleFormat,
) -> Output {
    let cancel_handle = CancelHandle::new();
    let thread = {
        let cancel_handle = cancel_handle.clone();
        thread::spawn(move || {
            let span = span!(Level::INFO, "audio output");
            let _enter = span.enter();

            let config = cpal::StreamConfig {
                channels: mixer.num_channels(),
                sample_rate: cpal::SampleRate(mixer.sample_rate()),
                buffer_size: cpal::BufferSize::Default,
            };

            let stream_result = match sample_format {
                cpal::SampleFormat::F32 => device.build_output_stream(
                    &config,
                    create_f32_callback(mixer.clone()),
                    |err| error!(err = %err, "CPAL output stream error"),
                    None,
                ),
                cpal::SampleFormat::I16 => device.build_output_stream(
                    &config,
                    create_int_callback::<i16>(mixer.clone()),
                    |err| error!(err = %err, "CPAL output stream error"),
                    None,
                ),
                cpal::SampleFormat::I32 => device.build_output_stream(
                    &config,
                    create_int_callback::<i32>(mixer.clone()),
                    |err| error!(err = %err, "CPAL output stream error"),
                    None,
                ),
                other => {
                    error!(format = %other, "Unsupported output sample format");
                    return;
                }
            };

            let stream = match stream_result {
                Ok(stream) => stream,
                Err(e) => {
                    error!(err = %e, "Failed to create CPAL stream");
                    return;
                }
            };
            if let Err(e) = stream.play() {
                error!(err = %e, "Failed to start CPAL stream");
                return;
            }
            info!(
                channels = config.channels,
                sample_rate = mixer.sample_rate(),
                "CPAL output stream started"
            );

            // The stream stops when it is dropped.
            cancel_handle.wait();
            info!("CPAL output stream stopped");
        })
    };

    Output {
        cancel_handle,
        thread: Some(thread),
    }
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn AudioDevice>>, Box<dyn Error>> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn AudioDevice> = Box::new(device);
                device
            })
            .collect())
    }

    /// Wraps a cpal device without opening it.
    fn new(
        host_id: cpal::HostId,
        device: cpal::Device,
        max_channels: u16,
        config: &config::Audio,
    ) -> Result<Device, Box<dyn Error>> {
        let mixer = Arc::new(AudioMixer::new(
            max_channels.min(MAX_OUTPUT_CHANNELS),
            config.sample_rate(),
        ));
        Ok(Device {
            name: device.name()?,
            max_channels,
            host_id,
            device,
            transport: Arc::new(ClockTransport::new(mixer.clone())),
            loader: Mutex::new(SampleLoader::new(config.sample_rate())),
            mixer,
            max_voices: config.max_voices(),
            output: None,
        })
    }

    /// Returns the largest channel count of the device's output configs, zero if it has none.
    fn max_output_channels(device: &cpal::Device) -> u16 {
        match device.supported_output_configs() {
            Ok(configs) => configs.map(|config| config.channels()).max().unwrap_or(0),
            Err(_) => 0,
        }
    }

    /// Lists cpal devices.
    fn list_cpal_devices() -> Result<Vec<Device>, Box<dyn Error>> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let listing_config = config::Audio::new(config::DEFAULT_DEVICE);
        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let max_channels = Device::max_output_channels(&device);
                if max_channels > 0 {
                    devices.push(Device::new(host_id, device, max_channels, &listing_config)?);
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Finds the host's default output device.
    fn default_cpal_device(config: &config::Audio) -> Result<Device, Box<dyn Error>> {
        let host = cpal::default_host();
        let device = {
            let _shh_stderr = shh::stderr()?;
            host.default_output_device()
        }
        .ok_or("no default output device")?;

        let max_channels = Device::max_output_channels(&device);
        if max_channels == 0 {
            return Err("default output device has no output configs".into());
        }
        Device::new(host.id(), device, max_channels, config)
    }

    /// Gets and opens the given cpal device. The name "default" selects the host's default
    /// output device.
    pub fn get(config: &config::Audio) -> Result<Device, Box<dyn Error>> {
        let name = config.device();
        let mut device = if name == config::DEFAULT_DEVICE {
            Device::default_cpal_device(config)?
        } else {
            let device = Device::list_cpal_devices()?
                .into_iter()
                .find(|device| device.name.trim() == name)
                .ok_or_else(|| format!("no device found with name {}", name))?;
            Device::new(device.host_id, device.device, device.max_channels, config)?
        };

        let sample_format = device.device.default_output_config()?.sample_format();
        device.output = Some(start_output_thread(
            device.device.clone(),
            device.mixer.clone(),
            sample_format,
        ));
        device.transport = ClockTransport::spawn(device.mixer.clone());

        info!(
            device = device.name,
            sample_rate = device.mixer.sample_rate(),
            channels = device.mixer.num_channels(),
            format = %sample_format,
            "Opened audio device"
        );
        Ok(device)
    }
}

impl AudioDevice for Device {
    fn name(&self) -> &str {
        &self.name
    }

    fn now(&self) -> f64 {
        crate::audio::Clock::now(self.mixer.as_ref())
    }

    fn sampler(&self, config: &config::Sampler) -> Result<Arc<dyn Instrument>, Box<dyn Error>> {
        let pool = VoicePool::new(config.label(), self.mixer.clone(), self.max_voices);
        let sampler = Sampler::load(config, &mut self.loader.lock(), pool)?;
        Ok(Arc::new(sampler))
    }

    fn poly_synth(&self, options: PolyOptions) -> Arc<dyn Instrument> {
        let pool = VoicePool::new("PolySynth", self.mixer.clone(), self.max_voices);
        Arc::new(PolySynth::new(options, pool))
    }

    fn membrane_synth(&self, options: MembraneOptions) -> Arc<dyn Instrument> {
        let pool = VoicePool::new("MembraneSynth", self.mixer.clone(), 1);
        Arc::new(MembraneSynth::new(options, pool))
    }

    fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }
}
