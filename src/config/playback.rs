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
use std::{path::PathBuf, time::Duration};

use serde::Deserialize;

use super::{error::ConfigError, parse_duration};

const DEFAULT_MIDI_FILE: &str = "bach_846.mid";
const DEFAULT_LEAD_IN: Duration = Duration::from_millis(500);

/// Configuration for MIDI file playback.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Playback {
    /// The MIDI file to play (default: bach_846.mid).
    file: Option<String>,

    /// Delay between loading the file and its first beat (default: 500ms).
    lead_in: Option<String>,
}

impl Playback {
    /// Returns the MIDI file path, relative to the config file unless absolute.
    pub fn file(&self) -> PathBuf {
        PathBuf::from(self.file.as_deref().unwrap_or(DEFAULT_MIDI_FILE))
    }

    /// Returns the lead-in before playback starts.
    pub fn lead_in(&self) -> Result<Duration, ConfigError> {
        match &self.lead_in {
            Some(lead_in) => parse_duration(lead_in),
            None => Ok(DEFAULT_LEAD_IN),
        }
    }
}
