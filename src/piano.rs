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

//! The input-to-playback router. Owns every piece of live state and is driven one event at
//! a time by the controller.

use std::{collections::HashSet, error::Error, path::PathBuf, sync::Arc, time::Duration};

use tracing::{debug, error, info};

use crate::{
    audio, config,
    controller::Event,
    instrument::InstrumentSwitch,
    keyboard::Keyboard,
    keymap::KeyMap,
    metronome::Metronome,
    notes::Note,
    piece::{self, MidiPiece},
    scheduler::Scheduler,
    song::{self, Song},
    synth::{MembraneOptions, PolyOptions},
};

pub struct Piano {
    device: Arc<dyn audio::Device>,
    scheduler: Arc<dyn Scheduler>,
    keymap: KeyMap,
    keyboard: Keyboard,
    /// Physical keys currently held down.
    held: HashSet<char>,
    instruments: InstrumentSwitch,
    song: Song,
    metronome: Metronome,
    midi_file: PathBuf,
    lead_in: Duration,
}

impl Piano {
    /// Creates the piano's instruments on the device and lays out the keyboard.
    pub fn new(
        config: &config::Piano,
        device: Arc<dyn audio::Device>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<Piano, Box<dyn Error>> {
        let primary = device.sampler(&config.primary())?;
        let secondary = device.sampler(&config.secondary())?;
        let metronome = Metronome::new(
            device.transport(),
            device.membrane_synth(MembraneOptions::default()),
        )?;

        let piano = Piano {
            keymap: KeyMap::default(),
            keyboard: config.layout()?,
            held: HashSet::new(),
            instruments: InstrumentSwitch::new(primary, secondary),
            song: Song::clair_de_lune(),
            metronome,
            midi_file: config.midi_file(),
            lead_in: config.lead_in()?,
            device,
            scheduler,
        };
        info!(
            device = %piano.device,
            instrument = piano.label(),
            keys = piano.keyboard.keys().len(),
            "Piano ready."
        );
        Ok(piano)
    }

    /// Handles a single event. Returns false once the piano has been told to quit.
    pub fn handle(&mut self, event: Event) -> bool {
        match event {
            Event::KeyDown(key) => self.key_down(key),
            Event::KeyUp(key) => self.key_up(key),
            Event::PointerDown(note) => self.pointer_down(note),
            Event::PointerUp(note) | Event::PointerLeave(note) => self.pointer_up(note),
            Event::SwitchInstrument => {
                self.switch_instrument();
            }
            Event::PlaySong => {
                self.play_song();
            }
            Event::PlayMidi => self.play_midi(),
            Event::ToggleMetronome => {
                self.toggle_metronome();
            }
            Event::SongPress(note) => self.song_press(note),
            Event::SongAttack(note) => self.song_attack(note),
            Event::MidiLoaded(piece) => {
                self.midi_loaded(&piece);
            }
            Event::Quit => return false,
        }
        true
    }

    /// The visual keyboard.
    pub fn keyboard(&self) -> &Keyboard {
        &self.keyboard
    }

    /// The label of the active instrument.
    pub fn label(&self) -> &str {
        self.instruments.label()
    }

    pub fn is_held(&self, key: char) -> bool {
        self.held.contains(&key)
    }

    /// A physical key went down. Repeats while the key is held are ignored.
    pub fn key_down(&mut self, key: char) {
        let Some(note) = self.keymap.note(key) else {
            debug!(key = %key, "Unmapped key.");
            return;
        };
        if self.held.contains(&key) {
            return;
        }
        if self.press_key(note) {
            self.held.insert(key);
        }
    }

    /// A physical key came up.
    pub fn key_up(&mut self, key: char) {
        let Some(note) = self.keymap.note(key) else {
            debug!(key = %key, "Unmapped key.");
            return;
        };
        if self.keyboard.key(note).is_some() {
            self.pointer_up(note);
            self.held.remove(&key);
        }
    }

    /// A visual key was pressed.
    pub fn pointer_down(&mut self, note: Note) {
        self.instruments.active().note_on(note);
        self.keyboard.press(note);
        debug!(note = %note, keyboard = %self.keyboard, "Note on.");
    }

    /// A visual key was released or the pointer left it.
    pub fn pointer_up(&mut self, note: Note) {
        self.instruments.active().note_off(note);
        self.keyboard.release(note);
        debug!(note = %note, keyboard = %self.keyboard, "Note off.");
    }

    /// Presses the visual key for the note, if there is one.
    fn press_key(&mut self, note: Note) -> bool {
        if self.keyboard.key(note).is_none() {
            debug!(note = %note, "No key for note.");
            return false;
        }
        self.pointer_down(note);
        true
    }

    /// Flips the live instrument and returns the new label.
    pub fn switch_instrument(&mut self) -> &str {
        self.instruments.toggle()
    }

    /// Schedules the canned song. Returns the number of scheduled actions.
    pub fn play_song(&self) -> usize {
        self.song.play(self.scheduler.as_ref())
    }

    fn song_press(&mut self, note: Note) {
        if self.press_key(note) {
            self.scheduler
                .schedule(song::PRESS_LENGTH, Event::PointerUp(note));
        }
    }

    fn song_attack(&self, note: Note) {
        self.instruments
            .active()
            .attack_release(note, song::ATTACK_LENGTH, self.device.now(), 1.0);
    }

    /// Loads the MIDI file in the background. It plays once loaded; failures are only logged.
    pub fn play_midi(&self) {
        let path = self.midi_file.clone();
        info!(path = ?path, "Loading MIDI file for playback.");
        self.scheduler.defer(Box::pin(async move {
            match piece::load(&path).await {
                Ok(piece) => Some(Event::MidiLoaded(Arc::new(piece))),
                Err(e) => {
                    error!(err = %e, "Failed to load MIDI file.");
                    None
                }
            }
        }));
    }

    /// Plays a loaded piece on a new synthesizer after the lead-in. Returns the number of
    /// scheduled notes.
    pub fn midi_loaded(&self, piece: &MidiPiece) -> usize {
        let synth = self.device.poly_synth(PolyOptions::default());
        let origin = self.device.now() + self.lead_in.as_secs_f64();
        piece::schedule(piece, synth.as_ref(), origin)
    }

    /// Starts or stops the metronome. Returns true if it is now running.
    pub fn toggle_metronome(&mut self) -> bool {
        self.metronome.toggle()
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, fs, sync::Arc, time::Duration};

    use crate::{
        audio::mock::{self, Call},
        config,
        controller::Event,
        keymap::KeyMap,
        notes::Note,
        test::RecordingScheduler,
    };

    use super::Piano;

    /// A single C4 at time 0, one second long (two beats at 120 BPM), velocity 102.
    const SINGLE_NOTE_MIDI: [u8; 35] = [
        b'M', b'T', b'h', b'd', 0, 0, 0, 6, 0, 0, 0, 1, 0x01, 0xE0, // header, 480 ticks per beat
        b'M', b'T', b'r', b'k', 0, 0, 0, 13, // track
        0x00, 0x90, 0x3C, 0x66, // note on
        0x87, 0x40, 0x80, 0x3C, 0x00, // note off 960 ticks later
        0x00, 0xFF, 0x2F, 0x00, // end of track
    ];

    struct Fixture {
        piano: Piano,
        device: Arc<mock::Device>,
        scheduler: Arc<RecordingScheduler>,
    }

    impl Fixture {
        fn new(config: &config::Piano) -> Fixture {
            let device = Arc::new(mock::Device::get("mock-device"));
            let scheduler = Arc::new(RecordingScheduler::default());
            let piano = Piano::new(config, device.clone(), scheduler.clone()).unwrap();
            Fixture {
                piano,
                device,
                scheduler,
            }
        }

        fn instrument(&self, name: &str) -> Arc<mock::Instrument> {
            self.device.instrument(name).unwrap()
        }
    }

    fn note(name: &str) -> Note {
        name.parse().unwrap()
    }

    #[test]
    fn test_every_mapped_key_plays_once() {
        let mut fixture = Fixture::new(&config::Piano::default());

        for (key, note) in KeyMap::default().entries() {
            fixture.piano.key_down(key);
            fixture.piano.key_down(key);
            fixture.piano.key_down(key);
            assert!(fixture.piano.is_held(key));
            assert!(fixture.piano.keyboard().key(note).unwrap().is_pressed());

            let piano = fixture.instrument("Piano");
            assert_eq!(vec![Call::NoteOn(note)], piano.calls());
            piano.clear();
        }
    }

    #[test]
    fn test_key_release() {
        let mut fixture = Fixture::new(&config::Piano::default());
        let piano = fixture.instrument("Piano");

        fixture.piano.key_down('a');
        fixture.piano.key_up('a');
        assert!(!fixture.piano.is_held('a'));
        assert!(!fixture.piano.keyboard().key(note("C4")).unwrap().is_pressed());
        assert_eq!(
            vec![Call::NoteOn(note("C4")), Call::NoteOff(note("C4"))],
            piano.calls()
        );

        // Released without a press: still one note-off, and the key is not held afterwards.
        piano.clear();
        fixture.piano.key_up('s');
        assert!(!fixture.piano.is_held('s'));
        assert_eq!(vec![Call::NoteOff(note("D4"))], piano.calls());

        // The key can be pressed again after release.
        piano.clear();
        fixture.piano.key_down('a');
        assert_eq!(vec![Call::NoteOn(note("C4"))], piano.calls());
    }

    #[test]
    fn test_unmapped_and_missing_keys_are_silent() {
        let mut fixture = Fixture::new(&config::Piano::default());
        let piano = fixture.instrument("Piano");

        fixture.piano.key_down('z');
        fixture.piano.key_up('z');
        assert!(piano.calls().is_empty());
        assert!(!fixture.piano.is_held('z'));
    }

    #[test]
    fn test_mapped_key_without_visual_key() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("piano.yaml");
        fs::write(&path, "keyboard:\n  low: C4\n  high: B4\n")?;
        let mut fixture = Fixture::new(&config::Piano::load(Some(&path))?);
        let piano = fixture.instrument("Piano");

        // 'n' plays A3, which is not on this keyboard.
        fixture.piano.key_down('n');
        assert!(!fixture.piano.is_held('n'));
        fixture.piano.key_up('n');
        assert!(piano.calls().is_empty());
        Ok(())
    }

    #[test]
    fn test_pointer_events() {
        let mut fixture = Fixture::new(&config::Piano::default());
        let piano = fixture.instrument("Piano");

        assert!(fixture.piano.handle(Event::PointerDown(note("E4"))));
        assert!(fixture.piano.keyboard().key(note("E4")).unwrap().is_pressed());
        fixture.piano.handle(Event::PointerLeave(note("E4")));
        assert!(!fixture.piano.keyboard().key(note("E4")).unwrap().is_pressed());
        fixture.piano.handle(Event::PointerUp(note("E4")));

        assert_eq!(
            vec![
                Call::NoteOn(note("E4")),
                Call::NoteOff(note("E4")),
                Call::NoteOff(note("E4"))
            ],
            piano.calls()
        );
    }

    #[test]
    fn test_switch_instrument() {
        let mut fixture = Fixture::new(&config::Piano::default());
        assert_eq!("Piano", fixture.piano.label());

        assert_eq!("Casio", fixture.piano.switch_instrument());
        assert_eq!("Casio", fixture.piano.label());
        fixture.piano.key_down('a');
        assert_eq!(
            vec![Call::NoteOn(note("C4"))],
            fixture.instrument("Casio").calls()
        );

        assert_eq!("Piano", fixture.piano.switch_instrument());
        assert_eq!("Piano", fixture.piano.label());
        // The note started on the Casio is released on the piano.
        fixture.piano.key_up('a');
        assert_eq!(
            vec![Call::NoteOff(note("C4"))],
            fixture.instrument("Piano").calls()
        );
    }

    #[test]
    fn test_play_song() {
        let mut fixture = Fixture::new(&config::Piano::default());

        assert_eq!(58, fixture.piano.play_song());
        let scheduled = fixture.scheduler.take_scheduled();
        assert_eq!(58, scheduled.len());
        assert_eq!(
            (Duration::ZERO, Event::SongPress(note("F4"))),
            scheduled[0]
        );
        assert_eq!(
            (Duration::ZERO, Event::SongAttack(note("G#4"))),
            scheduled[3]
        );

        // Fire the first note's actions.
        fixture.device.set_now(3.0);
        for (_, event) in scheduled.into_iter().take(2) {
            fixture.piano.handle(event);
        }
        assert_eq!(
            vec![
                Call::NoteOn(note("F4")),
                Call::AttackRelease {
                    note: note("F4"),
                    duration: 1.0,
                    start: 3.0,
                    velocity: 1.0
                }
            ],
            fixture.instrument("Piano").calls()
        );
        assert!(fixture.piano.keyboard().key(note("F4")).unwrap().is_pressed());

        // The press releases itself half a second later.
        let release = fixture.scheduler.take_scheduled();
        assert_eq!(
            vec![(Duration::from_millis(500), Event::PointerUp(note("F4")))],
            release
        );
        fixture.piano.handle(release[0].1.clone());
        assert!(!fixture.piano.keyboard().key(note("F4")).unwrap().is_pressed());
    }

    #[test]
    fn test_song_note_without_visual_key() {
        let mut fixture = Fixture::new(&config::Piano::default());

        // F5 is above the default keyboard: only the direct attack sounds.
        fixture.piano.handle(Event::SongPress(note("F5")));
        fixture.piano.handle(Event::SongAttack(note("F5")));
        assert!(fixture.scheduler.take_scheduled().is_empty());
        assert_eq!(
            vec![Call::AttackRelease {
                note: note("F5"),
                duration: 1.0,
                start: 0.0,
                velocity: 1.0
            }],
            fixture.instrument("Piano").calls()
        );
    }

    #[test]
    fn test_metronome_toggle() {
        let mut fixture = Fixture::new(&config::Piano::default());
        let transport = fixture.device.mock_transport();

        for cycle in 1..=4 {
            assert!(fixture.piano.toggle_metronome());
            assert_eq!(cycle, transport.starts());
            assert!(!fixture.piano.toggle_metronome());
            assert_eq!(cycle, transport.stops());
        }
        assert_eq!(1, transport.loops().len());
        assert_eq!(1, fixture.device.created("MembraneSynth"));
    }

    #[tokio::test]
    async fn test_midi_loaded() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let midi_path = dir.path().join("single.mid");
        fs::write(&midi_path, SINGLE_NOTE_MIDI)?;
        let piece = crate::piece::load(&midi_path).await?;

        let fixture = Fixture::new(&config::Piano::default());
        fixture.device.set_now(2.0);
        assert_eq!(1, fixture.piano.midi_loaded(&piece));

        let calls = fixture.instrument("PolySynth").calls();
        assert_eq!(1, calls.len());
        match &calls[0] {
            Call::AttackRelease {
                note,
                duration,
                start,
                velocity,
            } => {
                assert_eq!("C4".parse::<Note>()?, *note);
                assert!((duration - 1.0).abs() < 1e-9);
                assert!((start - 2.5).abs() < 1e-9);
                assert!((velocity - 0.8).abs() < 0.01);
            }
            other => panic!("unexpected call {:?}", other),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_play_midi() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("single.mid"), SINGLE_NOTE_MIDI)?;
        let path = dir.path().join("piano.yaml");
        fs::write(&path, "midi:\n  file: single.mid\n  lead_in: 1s\n")?;
        let mut fixture = Fixture::new(&config::Piano::load(Some(&path))?);

        fixture.piano.handle(Event::PlayMidi);
        let mut deferred = fixture.scheduler.take_deferred();
        assert_eq!(1, deferred.len());
        let event = deferred.remove(0).await;
        let Some(Event::MidiLoaded(piece)) = event.clone() else {
            panic!("unexpected event {:?}", event);
        };
        assert_eq!(1, piece.note_count());

        fixture.piano.handle(Event::MidiLoaded(piece));
        let calls = fixture.instrument("PolySynth").calls();
        assert!(matches!(calls[..], [Call::AttackRelease { start, .. }] if start == 1.0));
        Ok(())
    }

    #[tokio::test]
    async fn test_play_midi_missing_file() {
        let mut fixture = Fixture::new(&config::Piano::default());
        fixture.piano.handle(Event::PlayMidi);

        let mut deferred = fixture.scheduler.take_deferred();
        assert_eq!(None, deferred.remove(0).await);
        assert!(fixture.device.instrument("PolySynth").is_none());
    }

    #[test]
    fn test_quit() {
        let mut fixture = Fixture::new(&config::Piano::default());
        assert!(!fixture.piano.handle(Event::Quit));
    }
}
