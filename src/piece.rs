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

//! Standard MIDI File playback: an async load into an immutable piece, and a pure
//! schedule of that piece onto an instrument.

use std::{
    collections::{HashMap, VecDeque},
    io,
    path::{Path, PathBuf},
};

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use tracing::{debug, info};

use crate::{instrument::Instrument, notes::Note};

/// The tempo until the first Set Tempo event, in microseconds per beat (120 BPM).
const DEFAULT_TEMPO: u32 = 500_000;

/// Failure to load a MIDI file.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("unable to read MIDI file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unable to parse MIDI file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: midly::Error,
    },
}

/// One note of a piece, timed in seconds from the start of the piece.
#[derive(Debug, Clone, PartialEq)]
pub struct PieceNote {
    pub note: Note,
    pub time: f64,
    pub duration: f64,
    /// From 0 to 1.
    pub velocity: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    name: Option<String>,
    notes: Vec<PieceNote>,
}

impl Track {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The notes of the track ordered by start time.
    pub fn notes(&self) -> &[PieceNote] {
        &self.notes
    }
}

/// A parsed MIDI file.
#[derive(Debug, Clone, PartialEq)]
pub struct MidiPiece {
    name: Option<String>,
    tracks: Vec<Track>,
}

impl MidiPiece {
    /// The name of the piece, taken from the first track's name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// The total number of notes across all tracks.
    pub fn note_count(&self) -> usize {
        self.tracks.iter().map(|track| track.notes.len()).sum()
    }

    /// The time at which the last note ends, in seconds.
    pub fn duration(&self) -> f64 {
        self.tracks
            .iter()
            .flat_map(|track| track.notes.iter())
            .map(|note| note.time + note.duration)
            .fold(0.0, f64::max)
    }
}

/// Converts ticks to seconds, following every tempo change in the file.
struct TempoMap {
    ticks_per_beat: f64,
    /// (tick, seconds at that tick, microseconds per beat from there on), ordered by tick.
    segments: Vec<(u64, f64, f64)>,
}

impl TempoMap {
    fn new(smf: &Smf) -> TempoMap {
        let ticks_per_beat = match smf.header.timing {
            Timing::Metrical(ticks_per_beat) => ticks_per_beat.as_int().max(1) as f64,
            Timing::Timecode(fps, subframes) => {
                // Timecode timing is absolute: one "beat" per second, tempo events do not apply.
                return TempoMap {
                    ticks_per_beat: fps.as_f32() as f64 * subframes.max(1) as f64,
                    segments: vec![(0, 0.0, 1_000_000.0)],
                };
            }
        };

        let mut changes: Vec<(u64, u32)> = Vec::new();
        for track in smf.tracks.iter() {
            let mut tick: u64 = 0;
            for event in track.iter() {
                tick += event.delta.as_int() as u64;
                if let TrackEventKind::Meta(MetaMessage::Tempo(tempo)) = event.kind {
                    changes.push((tick, tempo.as_int()));
                }
            }
        }
        changes.sort_by_key(|(tick, _)| *tick);

        let mut tempo_map = TempoMap {
            ticks_per_beat,
            segments: vec![(0, 0.0, DEFAULT_TEMPO as f64)],
        };
        for (tick, tempo) in changes {
            let seconds = tempo_map.seconds(tick);
            tempo_map.segments.push((tick, seconds, tempo as f64));
        }
        tempo_map
    }

    fn seconds(&self, tick: u64) -> f64 {
        let index = self
            .segments
            .partition_point(|(start, _, _)| *start <= tick)
            .saturating_sub(1);
        let (start, seconds, tempo) = self.segments[index];
        seconds + (tick - start) as f64 * tempo / 1_000_000.0 / self.ticks_per_beat
    }
}

/// A note waiting for its note-off.
struct OpenNote {
    tick: u64,
    velocity: u8,
}

fn parse(data: &[u8]) -> Result<MidiPiece, midly::Error> {
    let smf = Smf::parse(data)?;
    let tempo_map = TempoMap::new(&smf);

    let mut tracks = Vec::with_capacity(smf.tracks.len());
    for track in smf.tracks.iter() {
        let mut name: Option<String> = None;
        let mut notes: Vec<PieceNote> = Vec::new();
        let mut open: HashMap<(u8, u8), VecDeque<OpenNote>> = HashMap::new();
        let mut close = |key: u8, open_note: OpenNote, end: u64| {
            let Ok(note) = Note::from_midi(key) else {
                return;
            };
            let time = tempo_map.seconds(open_note.tick);
            notes.push(PieceNote {
                note,
                time,
                duration: tempo_map.seconds(end) - time,
                velocity: open_note.velocity as f32 / 127.0,
            });
        };

        let mut tick: u64 = 0;
        for event in track.iter() {
            tick += event.delta.as_int() as u64;
            match event.kind {
                TrackEventKind::Meta(MetaMessage::TrackName(raw)) if name.is_none() => {
                    name = Some(String::from_utf8_lossy(raw).trim().to_string());
                }
                TrackEventKind::Midi { channel, message } => {
                    let (key, velocity, is_on) = match message {
                        MidiMessage::NoteOn { key, vel } => {
                            (key.as_int(), vel.as_int(), vel.as_int() > 0)
                        }
                        MidiMessage::NoteOff { key, vel } => (key.as_int(), vel.as_int(), false),
                        _ => continue,
                    };
                    let queue = open.entry((channel.as_int(), key)).or_default();
                    if is_on {
                        queue.push_back(OpenNote { tick, velocity });
                    } else if let Some(open_note) = queue.pop_front() {
                        close(key, open_note, tick);
                    }
                }
                _ => {}
            }
        }

        // Notes still sounding at the end of the track end with it.
        for ((_, key), queue) in open {
            for open_note in queue {
                close(key, open_note, tick);
            }
        }

        notes.sort_by(|a, b| a.time.total_cmp(&b.time).then(a.note.cmp(&b.note)));
        tracks.push(Track { name, notes });
    }

    Ok(MidiPiece {
        name: tracks.first().and_then(|track| track.name.clone()),
        tracks,
    })
}

/// Reads and parses a Standard MIDI File.
pub async fn load(path: &Path) -> Result<MidiPiece, LoadError> {
    debug!(path = ?path, "Loading MIDI file.");
    let data = tokio::fs::read(path).await.map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let piece = parse(&data).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    info!(
        path = ?path,
        name = piece.name().unwrap_or_default(),
        tracks = piece.tracks().len(),
        notes = piece.note_count(),
        "MIDI file loaded."
    );
    Ok(piece)
}

/// Schedules every note of every track on the instrument, relative to the origin on the
/// audio clock. Returns the number of scheduled notes.
pub fn schedule(piece: &MidiPiece, instrument: &dyn Instrument, origin: f64) -> usize {
    let mut scheduled = 0;
    for track in piece.tracks() {
        for note in track.notes() {
            instrument.attack_release(note.note, note.duration, origin + note.time, note.velocity);
            scheduled += 1;
        }
    }
    info!(
        instrument = instrument.name(),
        notes = scheduled,
        origin,
        "MIDI piece scheduled."
    );
    scheduled
}
