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
    collections::HashMap,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use super::{error::ConfigError, parse_duration};
use crate::notes::Note;

const DEFAULT_RELEASE: Duration = Duration::from_secs(1);

/// Salamander grand piano samples, every minor third from C3 to A5.
const PIANO_SAMPLES: [(&str, &str); 12] = [
    ("C3", "C3.mp3"),
    ("D#3", "Ds3.mp3"),
    ("F#3", "Fs3.mp3"),
    ("A3", "A3.mp3"),
    ("C4", "C4.mp3"),
    ("D#4", "Ds4.mp3"),
    ("F#4", "Fs4.mp3"),
    ("A4", "A4.mp3"),
    ("C5", "C5.mp3"),
    ("D#5", "Ds5.mp3"),
    ("F#5", "Fs5.mp3"),
    ("A5", "A5.mp3"),
];

const CASIO_SAMPLES: [(&str, &str); 2] = [("A1", "A1.mp3"), ("A2", "A2.mp3")];

/// A sampled instrument: a map of notes to audio files.
#[derive(Deserialize, Clone, Debug)]
pub struct Sampler {
    /// The name shown for the instrument.
    label: String,

    /// Directory the sample files are relative to.
    base_path: Option<String>,

    /// How long notes fade out after release (default: 1s).
    release: Option<String>,

    /// Note name to sample file.
    samples: HashMap<String, String>,
}

impl Sampler {
    /// Creates a new sampler configuration.
    pub fn new(label: &str, base_path: &str, release: &str, samples: &[(&str, &str)]) -> Sampler {
        Sampler {
            label: label.to_string(),
            base_path: Some(base_path.to_string()),
            release: Some(release.to_string()),
            samples: samples
                .iter()
                .map(|(note, file)| (note.to_string(), file.to_string()))
                .collect(),
        }
    }

    /// The default primary instrument.
    pub fn piano() -> Sampler {
        Sampler::new("Piano", "samples/salamander", "1s", &PIANO_SAMPLES)
    }

    /// The default secondary instrument.
    pub fn casio() -> Sampler {
        Sampler::new("Casio", "samples/casio", "2s", &CASIO_SAMPLES)
    }

    /// Returns the instrument label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the directory sample files are loaded from.
    pub fn base_path(&self) -> PathBuf {
        PathBuf::from(self.base_path.as_deref().unwrap_or("."))
    }

    /// Returns the release time.
    pub fn release(&self) -> Result<Duration, ConfigError> {
        match &self.release {
            Some(release) => parse_duration(release),
            None => Ok(DEFAULT_RELEASE),
        }
    }

    /// Returns the sample map with the files resolved against the base path, sorted by note.
    pub fn samples(&self) -> Result<Vec<(Note, PathBuf)>, ConfigError> {
        let base_path = self.base_path();
        let mut samples = self
            .samples
            .iter()
            .map(|(note, file)| Ok((note.parse::<Note>()?, base_path.join(file))))
            .collect::<Result<Vec<(Note, PathBuf)>, ConfigError>>()?;
        samples.sort_by_key(|(note, _)| *note);
        Ok(samples)
    }

    /// Resolves a relative base path against the given directory.
    pub(super) fn relative_to(mut self, dir: &Path) -> Sampler {
        let base_path = self.base_path();
        if base_path.is_relative() {
            self.base_path = Some(dir.join(base_path).to_string_lossy().to_string());
        }
        self
    }
}

/// The two live instruments.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Instruments {
    /// The instrument active at startup (default: the Salamander piano).
    primary: Option<Sampler>,

    /// The alternate instrument (default: the Casio).
    secondary: Option<Sampler>,
}

impl Instruments {
    /// Returns the primary instrument.
    pub fn primary(&self) -> Sampler {
        self.primary.clone().unwrap_or_else(Sampler::piano)
    }

    /// Returns the secondary instrument.
    pub fn secondary(&self) -> Sampler {
        self.secondary.clone().unwrap_or_else(Sampler::casio)
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;

    #[test]
    fn test_default_instruments() {
        let instruments = Instruments::default();

        let piano = instruments.primary();
        assert_eq!("Piano", piano.label());
        assert_eq!(Duration::from_secs(1), piano.release().unwrap());
        let samples = piano.samples().unwrap();
        assert_eq!(12, samples.len());
        assert_eq!("C3".parse::<Note>().unwrap(), samples[0].0);
        assert_eq!(PathBuf::from("samples/salamander/C3.mp3"), samples[0].1);
        assert_eq!(PathBuf::from("samples/salamander/Ds3.mp3"), samples[1].1);

        let casio = instruments.secondary();
        assert_eq!("Casio", casio.label());
        assert_eq!(Duration::from_secs(2), casio.release().unwrap());
        assert_eq!(2, casio.samples().unwrap().len());
    }

    #[test]
    fn test_sampler_deserialize() {
        let yaml = r#"
            primary:
              label: Rhodes
              base_path: /opt/rhodes
              release: 1500ms
              samples:
                C4: c4.wav
                A4: a4.wav
        "#;

        let instruments: Instruments = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        let rhodes = instruments.primary();
        assert_eq!("Rhodes", rhodes.label());
        assert_eq!(Duration::from_millis(1500), rhodes.release().unwrap());
        assert_eq!(
            vec![
                ("C4".parse::<Note>().unwrap(), PathBuf::from("/opt/rhodes/c4.wav")),
                ("A4".parse::<Note>().unwrap(), PathBuf::from("/opt/rhodes/a4.wav")),
            ],
            rhodes.samples().unwrap()
        );
        assert_eq!("Casio", instruments.secondary().label());
    }

    #[test]
    fn test_bad_sample_note() {
        let sampler = Sampler::new("Broken", ".", "1s", &[("H4", "h4.wav")]);
        assert!(matches!(sampler.samples(), Err(ConfigError::Note(_))));
    }

    #[test]
    fn test_relative_to() {
        let sampler = Sampler::piano().relative_to(Path::new("/etc/keypiano"));
        assert_eq!(
            PathBuf::from("/etc/keypiano/samples/salamander"),
            sampler.base_path()
        );

        let absolute =
            Sampler::new("Abs", "/srv/samples", "1s", &[]).relative_to(Path::new("/etc"));
        assert_eq!(PathBuf::from("/srv/samples"), absolute.base_path());
    }
}
