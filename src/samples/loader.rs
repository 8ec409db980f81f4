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

//! Sample loading and caching for sampled instruments.
//!
//! Samples are decoded entirely into memory at startup, downmixed to mono and
//! converted to the output sample rate so voices can read them directly.

use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info, warn};

/// Error types for sample loading.
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("IO error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Unable to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: SymphoniaError,
    },

    #[error("No audio track found in {0}")]
    NoTrack(PathBuf),

    #[error("Sample rate not specified in {0}")]
    NoSampleRate(PathBuf),
}

/// A loaded mono sample at the output sample rate.
/// The sample data is stored in an Arc for efficient sharing between voices.
#[derive(Clone, Debug)]
pub struct LoadedSample {
    data: Arc<Vec<f32>>,
    sample_rate: u32,
}

impl LoadedSample {
    /// Wraps already decoded mono data.
    pub fn new(data: Vec<f32>, sample_rate: u32) -> LoadedSample {
        LoadedSample {
            data: Arc::new(data),
            sample_rate,
        }
    }

    /// Returns the sample data.
    pub fn data(&self) -> Arc<Vec<f32>> {
        self.data.clone()
    }

    /// Returns the sample rate of the data.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the length of the sample.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.data.len() as f64 / self.sample_rate.max(1) as f64)
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

/// Manages loading and caching of sample data.
pub struct SampleLoader {
    /// Cache of loaded samples by file path.
    cache: HashMap<PathBuf, LoadedSample>,
    /// Target sample rate for transcoding (matches audio output).
    target_sample_rate: u32,
}

impl SampleLoader {
    /// Creates a new sample loader.
    pub fn new(target_sample_rate: u32) -> Self {
        Self {
            cache: HashMap::new(),
            target_sample_rate,
        }
    }

    /// Loads a sample from a file into memory.
    /// Returns a cached version if already loaded.
    pub fn load(&mut self, path: &Path) -> Result<LoadedSample, SampleError> {
        if let Some(sample) = self.cache.get(path) {
            debug!(path = ?path, "Using cached sample");
            return Ok(sample.clone());
        }

        info!(path = ?path, "Loading sample into memory");

        let (samples, channel_count, source_sample_rate) = decode_file(path)?;
        let mono = downmix(&samples, channel_count);

        let final_samples = if source_sample_rate != self.target_sample_rate {
            debug!(
                source_rate = source_sample_rate,
                target_rate = self.target_sample_rate,
                "Transcoding sample"
            );
            transcode_samples(&mono, source_sample_rate, self.target_sample_rate)
        } else {
            mono
        };

        let loaded = LoadedSample::new(final_samples, self.target_sample_rate);
        info!(
            path = ?path,
            channels = channel_count,
            source_rate = source_sample_rate,
            duration_ms = loaded.duration().as_millis(),
            memory_kb = loaded.memory_size() / 1024,
            "Sample loaded"
        );

        self.cache.insert(path.to_path_buf(), loaded.clone());
        Ok(loaded)
    }

    /// Returns the total memory used by cached samples.
    pub fn total_memory_usage(&self) -> usize {
        self.cache.values().map(|s| s.memory_size()).sum()
    }
}

impl std::fmt::Debug for SampleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleLoader")
            .field("cached_samples", &self.cache.len())
            .field("target_sample_rate", &self.target_sample_rate)
            .field("total_memory_kb", &(self.total_memory_usage() / 1024))
            .finish()
    }
}

/// Decodes a whole audio file. Returns the interleaved samples, the channel count and the
/// sample rate.
fn decode_file(path: &Path) -> Result<(Vec<f32>, u16, u32), SampleError> {
    let decode_error = |source: SymphoniaError| SampleError::Decode {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(|source| SampleError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // Create a hint to help the format registry guess the format
    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();
    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &fmt_opts, &meta_opts)
        .map_err(decode_error)?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| SampleError::NoTrack(path.to_path_buf()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channel_count = track
        .codec_params
        .channels
        .map(|channels| channels.count() as u16)
        .unwrap_or(1);

    let decoder_opts: DecoderOptions = Default::default();
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &decoder_opts)
        .map_err(decode_error)?;

    let mut samples = Vec::new();
    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(decode_error(e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                warn!(path = ?path, err = e, "Skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(decode_error(e)),
        };

        let spec = *decoded.spec();
        sample_rate = sample_rate.or(Some(spec.rate));
        channel_count = spec.channels.count() as u16;

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buffer.samples());
    }

    let sample_rate = sample_rate.ok_or_else(|| SampleError::NoSampleRate(path.to_path_buf()))?;
    Ok((samples, channel_count.max(1), sample_rate))
}

/// Averages interleaved channels into a single channel.
fn downmix(samples: &[f32], channel_count: u16) -> Vec<f32> {
    if channel_count <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channel_count as usize)
        .map(|frame| frame.iter().sum::<f32>() / channel_count as f32)
        .collect()
}

/// Transcodes mono samples from one sample rate to another using linear interpolation.
/// Linear interpolation is sufficient for sustained instrument samples.
fn transcode_samples(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    let ratio = target_rate as f64 / source_rate as f64;
    let target_frames = (samples.len() as f64 * ratio).ceil() as usize;

    let mut output = Vec::with_capacity(target_frames);
    for target_frame in 0..target_frames {
        let source_pos = target_frame as f64 / ratio;
        let source_frame = source_pos.floor() as usize;
        let frac = source_pos.fract() as f32;

        let s0 = samples.get(source_frame).copied().unwrap_or(0.0);
        let s1 = samples.get(source_frame + 1).copied().unwrap_or(s0);
        output.push(s0 + (s1 - s0) * frac);
    }
    output
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    fn write_wav(path: &Path, channels: u16, sample_rate: u32, frames: &[Vec<i16>]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for frame in frames {
            for sample in frame {
                writer.write_sample(*sample).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_transcode_samples() {
        // Simple mono sine wave at 44100Hz
        let source_rate = 44100;
        let target_rate = 48000;
        let source_samples: Vec<f32> = (0..4410)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / source_rate as f32).sin())
            .collect();

        let result = transcode_samples(&source_samples, source_rate, target_rate);

        // Should have more samples at higher rate
        let expected_len = (4410.0_f64 * 48000.0 / 44100.0).ceil() as usize;
        assert_eq!(result.len(), expected_len);
    }

    #[test]
    fn test_transcode_interpolates() {
        let result = transcode_samples(&[0.0, 1.0], 1, 2);
        assert_eq!(vec![0.0, 0.5, 1.0, 1.0], result);
    }

    #[test]
    fn test_downmix() {
        assert_eq!(vec![0.0, 0.5], downmix(&[1.0, -1.0, 0.25, 0.75], 2));
        assert_eq!(vec![0.25], downmix(&[0.25], 1));
    }

    #[test]
    fn test_load_stereo_wav() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("stereo.wav");
        let frames: Vec<Vec<i16>> = (0..100).map(|_| vec![i16::MAX / 2, 0]).collect();
        write_wav(&path, 2, 44100, &frames);

        let mut loader = SampleLoader::new(44100);
        let sample = loader.load(&path)?;

        assert_eq!(100, sample.data().len());
        assert_eq!(44100, sample.sample_rate());
        // Half scale on the left channel averages to a quarter.
        assert!((sample.data()[0] - 0.25).abs() < 0.01);
        Ok(())
    }

    #[test]
    fn test_load_resamples_and_caches() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("mono.wav");
        let frames: Vec<Vec<i16>> = (0..220).map(|_| vec![1000]).collect();
        write_wav(&path, 1, 22050, &frames);

        let mut loader = SampleLoader::new(44100);
        let first = loader.load(&path)?;
        assert_eq!(440, first.data().len());
        assert_eq!(44100, first.sample_rate());

        // The second load is served from the cache even if the file is gone.
        std::fs::remove_file(&path)?;
        let second = loader.load(&path)?;
        assert!(Arc::ptr_eq(&first.data(), &second.data()));
        Ok(())
    }

    #[test]
    fn test_load_missing_file() {
        let mut loader = SampleLoader::new(44100);
        assert!(matches!(
            loader.load(Path::new("/nonexistent/C4.mp3")),
            Err(SampleError::Io { .. })
        ));
    }
}
