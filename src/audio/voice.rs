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

//! Voice management for polyphonic instruments.
//!
//! Handles voice allocation, stealing, and note-off behavior.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info};

use super::mixer::{ActiveSource, AudioMixer, SourceSender, NO_RELEASE};
use super::source::Source;
use super::Clock;
use crate::notes::Note;
use crate::playsync::CancelHandle;

/// Represents a voice handed to the mixer.
pub struct Voice {
    /// The mixer source ID.
    id: u64,
    /// The MIDI note this voice plays (for note-off matching).
    note: u8,
    /// The frame the voice starts at. Older voices are stolen first.
    start_sample: u64,
    /// Shared with the mixer: when to start the release stage.
    release_at_sample: Arc<AtomicU64>,
    /// Shared with the mixer: set once the voice is done.
    is_finished: Arc<AtomicBool>,
    /// Cancel handle for cutting the voice off.
    cancel_handle: CancelHandle,
}

impl Voice {
    /// Creates a new voice.
    pub fn new(
        id: u64,
        note: u8,
        start_sample: u64,
        release_at_sample: Arc<AtomicU64>,
        is_finished: Arc<AtomicBool>,
        cancel_handle: CancelHandle,
    ) -> Self {
        Self {
            id,
            note,
            start_sample,
            release_at_sample,
            is_finished,
            cancel_handle,
        }
    }

    fn is_finished(&self) -> bool {
        self.is_finished.load(Ordering::Relaxed) || self.cancel_handle.is_cancelled()
    }

    fn release_at_sample(&self) -> u64 {
        self.release_at_sample.load(Ordering::Relaxed)
    }

    /// Schedules the release, keeping an earlier release if one is already set.
    fn release_at(&self, sample: u64) {
        self.release_at_sample.fetch_min(sample, Ordering::Relaxed);
    }
}

/// Tracks the voices of one instrument and enforces its polyphony limit.
pub struct VoiceManager {
    /// Voices that may still be sounding.
    voices: Vec<Voice>,
    /// Maximum number of simultaneous voices.
    max_voices: u32,
}

impl VoiceManager {
    /// Creates a new voice manager.
    pub fn new(max_voices: u32) -> Self {
        Self {
            voices: Vec::new(),
            max_voices: max_voices.max(1),
        }
    }

    /// Adds a new voice. Only voices still held when the new voice starts count toward the
    /// limit. The oldest of those is stolen: cut off if it is already sounding at `now`,
    /// otherwise released when the new voice starts. Returns the cancel handles of the voices
    /// to cut off.
    pub fn add_voice(&mut self, voice: Voice, now: u64) -> Vec<CancelHandle> {
        self.voices.retain(|v| !v.is_finished());

        let start = voice.start_sample;
        let mut to_stop = Vec::new();
        loop {
            let held: Vec<&Voice> = self
                .voices
                .iter()
                .filter(|v| v.start_sample <= start && v.release_at_sample() > start)
                .collect();
            if held.len() < self.max_voices as usize {
                break;
            }
            let Some(oldest) = held.into_iter().min_by_key(|v| (v.start_sample, v.id)) else {
                break;
            };

            debug!(max_voices = self.max_voices, "Voice limit reached, stealing oldest");
            if oldest.start_sample <= now {
                let oldest_id = oldest.id;
                to_stop.push(oldest.cancel_handle.clone());
                self.voices.retain(|v| v.id != oldest_id);
            } else {
                oldest.release_at(start);
            }
        }

        self.voices.push(voice);
        to_stop
    }

    /// Schedules the release of every voice playing the given note. Voices scheduled to
    /// start after the release are left alone. Returns the number of voices released.
    pub fn handle_note_off(&mut self, note: u8, at_sample: u64) -> usize {
        self.voices.retain(|v| !v.is_finished());

        let mut released = 0;
        for voice in self.voices.iter().filter(|v| v.note == note && v.start_sample <= at_sample)
        {
            voice.release_at(at_sample);
            released += 1;
        }
        released
    }

    /// Returns the current number of voices that may still be sounding.
    pub fn active_count(&self) -> usize {
        self.voices.iter().filter(|v| !v.is_finished()).count()
    }

    /// Clears all voices and returns their cancel handles.
    pub fn clear(&mut self) -> Vec<CancelHandle> {
        let handles: Vec<CancelHandle> = self
            .voices
            .iter()
            .map(|v| v.cancel_handle.clone())
            .collect();
        self.voices.clear();
        handles
    }
}

impl std::fmt::Debug for VoiceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceManager")
            .field("active_voices", &self.active_count())
            .field("max_voices", &self.max_voices)
            .finish()
    }
}

/// Connects an instrument to the mixer: schedules voices and routes note-offs to them.
pub struct VoicePool {
    /// Instrument name, for logging.
    name: String,
    /// The mixer, used as the audio clock.
    mixer: Arc<AudioMixer>,
    /// Channel into the mixer.
    source_tx: SourceSender,
    /// Voice bookkeeping.
    voices: Mutex<VoiceManager>,
}

impl VoicePool {
    /// Creates a new voice pool for the named instrument.
    pub fn new(name: &str, mixer: Arc<AudioMixer>, max_voices: u32) -> VoicePool {
        let source_tx = mixer.sender();
        VoicePool {
            name: name.to_string(),
            mixer,
            source_tx,
            voices: Mutex::new(VoiceManager::new(max_voices)),
        }
    }

    /// Returns the output sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.mixer.sample_rate()
    }

    /// Returns the current audio clock time.
    pub fn now(&self) -> f64 {
        self.mixer.now()
    }

    /// Schedules a voice for the note. `at` is an audio-clock time (now if None) and
    /// `duration` schedules the release relative to the start.
    pub fn start(
        &self,
        note: Note,
        source: Box<dyn Source>,
        at: Option<f64>,
        duration: Option<f64>,
    ) {
        let start_at_sample = match at {
            Some(at) => self.mixer.sample_at(at),
            None => self.mixer.current_sample(),
        };
        let release = match duration {
            Some(duration) => {
                start_at_sample + (duration.max(0.0) * self.sample_rate() as f64).round() as u64
            }
            None => NO_RELEASE,
        };

        let id = super::next_source_id();
        let release_at_sample = Arc::new(AtomicU64::new(release));
        let is_finished = Arc::new(AtomicBool::new(false));
        let cancel_handle = CancelHandle::new();

        // Hold the voice lock while sending so a concurrent note-off sees the new voice.
        let mut voices = self.voices.lock();
        let voice = Voice::new(
            id,
            note.midi(),
            start_at_sample,
            release_at_sample.clone(),
            is_finished.clone(),
            cancel_handle.clone(),
        );
        for stolen in voices.add_voice(voice, self.mixer.current_sample()) {
            stolen.cancel();
        }

        let active_source = ActiveSource {
            id,
            source,
            start_at_sample,
            release_at_sample,
            is_finished,
            cancel_handle,
        };
        if let Err(e) = self.source_tx.send(active_source) {
            error!(instrument = self.name, err = %e, "Failed to send voice to mixer");
            return;
        }
        drop(voices);

        debug!(
            instrument = self.name,
            note = %note,
            start_at_sample,
            id,
            "Voice scheduled"
        );
    }

    /// Releases every voice playing the note at the given audio-clock time (now if None).
    pub fn release(&self, note: Note, at: Option<f64>) {
        let at_sample = match at {
            Some(at) => self.mixer.sample_at(at),
            None => self.mixer.current_sample(),
        };
        let released = self.voices.lock().handle_note_off(note.midi(), at_sample);
        if released == 0 {
            debug!(instrument = self.name, note = %note, "Note off without sounding voice");
        }
    }

    /// Cuts every voice immediately.
    pub fn stop_all(&self) {
        let handles = self.voices.lock().clear();
        if !handles.is_empty() {
            info!(
                instrument = self.name,
                stopped = handles.len(),
                "All voices stopped"
            );
        }
        for handle in handles {
            handle.cancel();
        }
    }

    /// Returns the number of voices that may still be sounding.
    pub fn active_count(&self) -> usize {
        self.voices.lock().active_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_voice(note: u8, id: u64, start: u64) -> Voice {
        Voice::new(
            id,
            note,
            start,
            Arc::new(AtomicU64::new(NO_RELEASE)),
            Arc::new(AtomicBool::new(false)),
            CancelHandle::new(),
        )
    }

    #[test]
    fn test_voice_manager_global_limit() {
        let mut manager = VoiceManager::new(3);

        for i in 1..=3 {
            let stopped = manager.add_voice(make_voice(60 + i as u8, i, i), 4);
            assert!(stopped.is_empty());
        }

        // Add 4th voice - should steal the oldest.
        let stopped = manager.add_voice(make_voice(70, 4, 4), 4);
        assert_eq!(stopped.len(), 1);
        assert_eq!(manager.active_count(), 3);
    }

    #[test]
    fn test_note_off_releases_matching_voices() {
        let mut manager = VoiceManager::new(32);
        let first = make_voice(60, 1, 0);
        let second = make_voice(60, 2, 10);
        let other = make_voice(62, 3, 0);
        let first_release = first.release_at_sample.clone();
        let other_release = other.release_at_sample.clone();
        manager.add_voice(first, 0);
        manager.add_voice(second, 0);
        manager.add_voice(other, 0);

        assert_eq!(2, manager.handle_note_off(60, 100));
        assert_eq!(100, first_release.load(Ordering::Relaxed));
        assert_eq!(NO_RELEASE, other_release.load(Ordering::Relaxed));

        // An earlier release already scheduled is kept.
        assert_eq!(2, manager.handle_note_off(60, 200));
        assert_eq!(100, first_release.load(Ordering::Relaxed));
    }

    #[test]
    fn test_finished_voices_pruned() {
        let mut manager = VoiceManager::new(1);
        let voice = make_voice(60, 1, 0);
        let finished = voice.is_finished.clone();
        manager.add_voice(voice, 0);
        finished.store(true, Ordering::Relaxed);

        // The finished voice frees its slot without being stolen.
        assert!(manager.add_voice(make_voice(61, 2, 5), 5).is_empty());
        assert_eq!(0, manager.handle_note_off(60, 10));
    }

    #[test]
    fn test_pending_voice_released_instead_of_stolen() {
        let mut manager = VoiceManager::new(1);
        let pending = make_voice(60, 1, 10);
        let release = pending.release_at_sample.clone();
        let cancel = pending.cancel_handle.clone();
        assert!(manager.add_voice(pending, 0).is_empty());

        // The later voice ends the pending one at its own start rather than cancelling it.
        assert!(manager.add_voice(make_voice(62, 2, 20), 0).is_empty());
        assert_eq!(20, release.load(Ordering::Relaxed));
        assert!(!cancel.is_cancelled());

        // A voice starting before the pending one does not overlap it.
        assert!(manager.add_voice(make_voice(64, 3, 5), 0).is_empty());
        assert_eq!(20, release.load(Ordering::Relaxed));
    }

    #[test]
    fn test_sequential_voices_beyond_limit_all_play() {
        struct Tone {
            released: bool,
        }
        impl Source for Tone {
            fn next_sample(&mut self) -> Option<f32> {
                (!self.released).then_some(0.5)
            }
            fn release(&mut self) {
                self.released = true;
            }
        }

        let mixer = Arc::new(AudioMixer::new(1, 100));
        let pool = VoicePool::new("test", mixer.clone(), 4);
        let note: Note = "C4".parse().unwrap();
        for i in 0..10 {
            let voice = Box::new(Tone { released: false });
            pool.start(note, voice, Some(i as f64 * 0.1), Some(0.05));
        }

        let frames = mixer.process_frames(1000);
        assert_eq!(vec![0.5; 5], frames[..5].to_vec());
        assert_eq!(50, frames.iter().filter(|sample| **sample == 0.5).count());
        assert_eq!((0, 0), mixer.source_counts());
    }

    #[test]
    fn test_pool_schedules_and_releases() {
        struct Hold;
        impl Source for Hold {
            fn next_sample(&mut self) -> Option<f32> {
                Some(0.5)
            }
            fn release(&mut self) {}
        }

        let mixer = Arc::new(AudioMixer::new(1, 100));
        let pool = VoicePool::new("test", mixer.clone(), 2);
        let note: Note = "C4".parse().unwrap();

        pool.start(note, Box::new(Hold), Some(0.1), None);
        mixer.process_frames(10);
        assert_eq!((1, 0), mixer.source_counts());
        mixer.process_frames(1);
        assert_eq!((0, 1), mixer.source_counts());

        pool.start(note, Box::new(Hold), None, None);
        pool.start(note, Box::new(Hold), None, None);
        // The first voice was stolen when the third one arrived.
        mixer.process_frames(1);
        assert_eq!((0, 2), mixer.source_counts());

        pool.stop_all();
        mixer.process_frames(1);
        assert_eq!((0, 0), mixer.source_counts());
    }
}
