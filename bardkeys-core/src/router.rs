//! The event router owns one performance session: it decides, per event,
//! whether a note goes straight out, becomes a chord or feeds the
//! arpeggiator, and it interprets the reserved control notes.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bardkeys_types::{ArpPattern, ArpSettings, ChordQuality, CycleDirection, InputEvent, Note};
use crossbeam_channel::Receiver;

use crate::arp::Arpeggiator;
use crate::chord::ChordEngine;
use crate::keymap::NoteActionMap;
use crate::notation::{self, Recorder, RECORD_QUARTER_SECS};
use crate::output::KeystrokeOutput;
use crate::spectrum::{SharedSpectrum, DECAY_FACTOR, DECAY_INTERVAL};

/// Cycle the selector backward.
pub const CONTROL_PREV: u8 = 24;
/// Toggle arpeggiator mode.
pub const CONTROL_TOGGLE_ARP: u8 = 25;
/// Cycle the selector forward.
pub const CONTROL_NEXT: u8 = 26;
/// Arpeggiator off, chord mode on.
pub const CONTROL_CHORD_MODE: u8 = 27;
/// Controller whose value sets the arpeggiator tempo.
pub const TEMPO_CONTROLLER: u8 = 16;

pub fn is_control_note(note: u8) -> bool {
    (CONTROL_PREV..=CONTROL_CHORD_MODE).contains(&note)
}

/// Mode and tempo a session starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionSettings {
    pub quality: ChordQuality,
    pub arp_enabled: bool,
    pub arp: ArpSettings,
}

/// Everything the router can be asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Input(InputEvent),
    CycleSelector(CycleDirection),
    ToggleArp,
    ChordMode,
    ToggleRecording,
    SetBpm(u32),
    Shutdown,
}

impl From<InputEvent> for Command {
    fn from(event: InputEvent) -> Self {
        Command::Input(event)
    }
}

/// Which path a note-on took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Direct,
    Chord(ChordQuality),
    Arpeggio(ArpPattern),
}

pub struct EventRouter {
    output: Arc<KeystrokeOutput>,
    keymap: Arc<NoteActionMap>,
    chord: ChordEngine,
    arp: Arpeggiator,
    recorder: Recorder,
    record_path: Option<PathBuf>,
    spectrum: SharedSpectrum,
    /// Notes pressed on the direct path and not yet released.
    direct: BTreeSet<Note>,
    quality: ChordQuality,
    arp_enabled: bool,
}

impl EventRouter {
    pub fn new(output: Arc<KeystrokeOutput>, keymap: Arc<NoteActionMap>, settings: SessionSettings) -> Self {
        let spectrum = SharedSpectrum::default();
        let mut chord = ChordEngine::new(Arc::clone(&output), Arc::clone(&keymap));
        chord.set_spectrum(spectrum.clone());
        let mut arp = Arpeggiator::new(Arc::clone(&output), Arc::clone(&keymap), settings.arp);
        arp.set_spectrum(spectrum.clone());
        Self {
            chord,
            arp,
            recorder: Recorder::new(RECORD_QUARTER_SECS),
            record_path: None,
            spectrum,
            direct: BTreeSet::new(),
            quality: settings.quality,
            arp_enabled: settings.arp_enabled,
            output,
            keymap,
        }
    }

    /// Where a finished recording is saved.
    pub fn with_record_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.record_path = Some(path.into());
        self
    }

    pub fn with_record_quarter_secs(mut self, quarter_secs: f64) -> Self {
        self.recorder = Recorder::new(quarter_secs);
        self
    }

    pub fn with_chord_gap(mut self, gap: Duration) -> Self {
        self.chord.set_note_gap(gap);
        self
    }

    pub fn mode(&self) -> Mode {
        if self.arp_enabled {
            Mode::Arpeggio(self.arp.settings().pattern)
        } else if self.quality.is_chord() {
            Mode::Chord(self.quality)
        } else {
            Mode::Direct
        }
    }

    pub fn quality(&self) -> ChordQuality {
        self.quality
    }

    pub fn arp_enabled(&self) -> bool {
        self.arp_enabled
    }

    pub fn arp_settings(&self) -> ArpSettings {
        self.arp.settings()
    }

    pub fn arpeggiator(&self) -> &Arpeggiator {
        &self.arp
    }

    pub fn chord(&self) -> &ChordEngine {
        &self.chord
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Levels fed by played notes, chord tones and arpeggio steps. Clone the
    /// handle to read it from a display thread.
    pub fn spectrum(&self) -> &SharedSpectrum {
        &self.spectrum
    }

    /// Apply one command. Returns false once the session should end.
    pub fn apply(&mut self, command: Command) -> bool {
        match command {
            Command::Input(event) => self.handle(event),
            Command::CycleSelector(direction) => self.cycle(direction),
            Command::ToggleArp => self.toggle_arp(),
            Command::ChordMode => self.chord_mode(),
            Command::ToggleRecording => {
                self.toggle_recording();
            }
            Command::SetBpm(bpm) => self.arp.set_bpm(bpm),
            Command::Shutdown => return false,
        }
        true
    }

    /// Route one raw input event.
    pub fn handle(&mut self, event: InputEvent) {
        match event.normalized() {
            InputEvent::NoteOn { note, .. } if is_control_note(note) => self.control(note),
            // Releases of control notes carry no meaning.
            InputEvent::NoteOff { note } if is_control_note(note) => {}
            InputEvent::NoteOn { note, velocity } => match Note::new(note) {
                Some(n) => self.note_on(n, velocity),
                None => log::debug!(target: "router", "ignoring note {} outside the playable range", note),
            },
            InputEvent::NoteOff { note } => match Note::new(note) {
                Some(n) => self.note_off(n),
                None => log::debug!(target: "router", "ignoring release of note {}", note),
            },
            InputEvent::ControlChange {
                controller: TEMPO_CONTROLLER,
                value,
            } => {
                let bpm = ArpSettings::bpm_from_controller(value);
                self.arp.set_bpm(bpm);
            }
            InputEvent::ControlChange { controller, value } => {
                log::debug!(target: "router", "unhandled controller {} = {}", controller, value);
            }
        }
    }

    fn control(&mut self, note: u8) {
        match note {
            CONTROL_PREV => self.cycle(CycleDirection::Backward),
            CONTROL_NEXT => self.cycle(CycleDirection::Forward),
            CONTROL_TOGGLE_ARP => self.toggle_arp(),
            CONTROL_CHORD_MODE => self.chord_mode(),
            _ => {}
        }
    }

    fn note_on(&mut self, note: Note, velocity: u8) {
        self.spectrum.note_on(note, velocity);
        if self.recorder.is_recording() {
            self.recorder.note_on(note, Instant::now());
        }

        if self.arp_enabled {
            self.arp.note_on(note);
        } else if self.quality.is_chord() {
            self.chord.trigger(note, self.quality);
        } else {
            self.press_direct(note);
        }
    }

    fn note_off(&mut self, note: Note) {
        self.spectrum.note_off(note);
        if self.recorder.is_recording() {
            self.recorder.note_off(note, Instant::now());
        }

        if self.chord.owns(note) {
            self.chord.release(note);
        } else if self.arp.is_holding(note) {
            self.arp.note_off(note);
        } else if self.direct.remove(&note) {
            if let Some(action) = self.keymap.lookup(note) {
                self.output.send(action, false);
            }
        }
    }

    fn press_direct(&mut self, note: Note) {
        let Some(action) = self.keymap.lookup(note) else {
            log::info!(target: "router", "{} has no key, dropped", note.name());
            return;
        };
        log::debug!(target: "router", "{} -> {}", note.name(), action.label());
        if self.output.send(action, true) {
            self.direct.insert(note);
        } else {
            log::warn!(target: "router", "could not play {}", note.name());
        }
    }

    fn cycle(&mut self, direction: CycleDirection) {
        if self.arp_enabled {
            let current = self.arp.settings().pattern;
            let pattern = match direction {
                CycleDirection::Forward => current.next(),
                CycleDirection::Backward => current.prev(),
            };
            self.arp.set_pattern(pattern);
        } else {
            self.quality = match direction {
                CycleDirection::Forward => self.quality.next(),
                CycleDirection::Backward => self.quality.prev(),
            };
            log::info!(target: "router", "chord: {}", self.quality.name());
        }
    }

    fn toggle_arp(&mut self) {
        self.arp_enabled = !self.arp_enabled;
        if self.arp_enabled {
            self.chord.release_active();
            log::info!(target: "router", "arpeggiator on ({})", self.arp.settings().pattern.name());
        } else {
            self.arp.clear();
            self.quality = ChordQuality::None;
            log::info!(target: "router", "arpeggiator off");
        }
    }

    fn chord_mode(&mut self) {
        if self.arp_enabled {
            self.arp_enabled = false;
            self.arp.clear();
        }
        if !self.quality.is_chord() {
            self.quality = ChordQuality::Major;
        }
        log::info!(target: "router", "chord mode: {}", self.quality.name());
    }

    /// Start a recording, or finish the current one and return its text.
    /// A finished recording is saved when a record path is set.
    pub fn toggle_recording(&mut self) -> Option<String> {
        if !self.recorder.is_recording() {
            self.recorder.start();
            return None;
        }
        let text = self.recorder.stop();
        if let Some(path) = &self.record_path {
            if let Err(e) = notation::save(path, &text) {
                log::warn!(target: "router", "recording not saved: {}", e);
            }
        }
        Some(text)
    }

    /// Release everything and stop background playback.
    pub fn shutdown(&mut self) {
        self.chord.release_active();
        for note in std::mem::take(&mut self.direct) {
            if let Some(action) = self.keymap.lookup(note) {
                self.output.send(action, false);
            }
        }
        self.arp.stop();
        if self.recorder.is_recording() {
            self.toggle_recording();
        }
        self.output.release_all();
        log::info!(target: "router", "session closed");
    }

    /// Apply commands until the channel closes or a shutdown arrives,
    /// decaying the spectrum between commands.
    pub fn run(&mut self, commands: Receiver<Command>) {
        let mut last_decay = Instant::now();
        loop {
            let remaining = DECAY_INTERVAL.saturating_sub(last_decay.elapsed());
            crossbeam_channel::select! {
                recv(commands) -> result => match result {
                    Ok(command) => {
                        if !self.apply(command) {
                            break;
                        }
                    }
                    Err(_) => break,
                },
                default(remaining) => {}
            }
            if last_decay.elapsed() >= DECAY_INTERVAL {
                self.spectrum.decay(DECAY_FACTOR);
                last_decay = Instant::now();
            }
        }
        self.shutdown();
    }
}

impl Drop for EventRouter {
    fn drop(&mut self) {
        self.output.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{OutputTiming, TestSink};
    use bardkeys_types::VirtualKey;

    fn router(settings: SessionSettings) -> (EventRouter, TestSink) {
        let sink = TestSink::new();
        let output = Arc::new(KeystrokeOutput::with_timing(
            Box::new(sink.clone()),
            OutputTiming::IMMEDIATE,
        ));
        let r = EventRouter::new(output, Arc::new(NoteActionMap::new()), settings)
            .with_chord_gap(Duration::ZERO);
        (r, sink)
    }

    fn on(note: u8) -> InputEvent {
        InputEvent::NoteOn { note, velocity: 100 }
    }

    fn off(note: u8) -> InputEvent {
        InputEvent::NoteOff { note }
    }

    #[test]
    fn control_notes_never_reach_output() {
        let (mut r, sink) = router(SessionSettings::default());
        for n in 24..=27 {
            r.handle(on(n));
            r.handle(off(n));
        }
        assert!(sink.key_events().is_empty());
    }

    #[test]
    fn cycling_changes_quality_outside_arp_mode() {
        let (mut r, _) = router(SessionSettings::default());
        r.handle(on(CONTROL_NEXT));
        assert_eq!(r.quality(), ChordQuality::None.next());
        r.handle(on(CONTROL_PREV));
        r.handle(on(CONTROL_PREV));
        assert_eq!(r.quality(), ChordQuality::None.prev());
    }

    #[test]
    fn cycling_changes_pattern_in_arp_mode() {
        let (mut r, _) = router(SessionSettings::default());
        r.handle(on(CONTROL_TOGGLE_ARP));
        assert!(r.arp_enabled());
        r.handle(on(CONTROL_NEXT));
        assert_eq!(r.arp_settings().pattern, ArpPattern::Up.next());
        assert_eq!(r.quality(), ChordQuality::None);
    }

    #[test]
    fn toggling_arp_off_clears_quality() {
        let (mut r, _) = router(SessionSettings {
            quality: ChordQuality::Minor,
            ..SessionSettings::default()
        });
        r.apply(Command::ToggleArp);
        r.apply(Command::ToggleArp);
        assert!(!r.arp_enabled());
        assert_eq!(r.mode(), Mode::Direct);
    }

    #[test]
    fn chord_mode_forces_major_and_disables_arp() {
        let (mut r, _) = router(SessionSettings {
            arp_enabled: true,
            ..SessionSettings::default()
        });
        r.handle(on(CONTROL_CHORD_MODE));
        assert_eq!(r.mode(), Mode::Chord(ChordQuality::Major));
    }

    #[test]
    fn tempo_controller_sets_bpm() {
        let (mut r, _) = router(SessionSettings::default());
        r.handle(InputEvent::ControlChange {
            controller: TEMPO_CONTROLLER,
            value: 127,
        });
        assert_eq!(r.arp_settings().bpm, 200);
        r.handle(InputEvent::ControlChange {
            controller: TEMPO_CONTROLLER,
            value: 0,
        });
        assert_eq!(r.arp_settings().bpm, 60);
        r.handle(InputEvent::ControlChange { controller: 7, value: 100 });
        assert_eq!(r.arp_settings().bpm, 60);
    }

    #[test]
    fn direct_note_presses_and_releases() {
        let (mut r, sink) = router(SessionSettings::default());
        r.handle(on(60));
        r.handle(InputEvent::NoteOn { note: 60, velocity: 0 });
        assert_eq!(
            sink.key_events(),
            vec![(VirtualKey::new(0x38), true), (VirtualKey::new(0x38), false)]
        );
    }

    #[test]
    fn unmapped_and_out_of_range_notes_are_dropped() {
        let (mut r, sink) = router(SessionSettings::default());
        r.handle(on(30));
        r.handle(on(120));
        r.handle(off(30));
        assert!(sink.key_events().is_empty());
    }

    #[test]
    fn chord_root_release_releases_chord() {
        let (mut r, sink) = router(SessionSettings {
            quality: ChordQuality::Major,
            ..SessionSettings::default()
        });
        r.handle(on(67));
        assert!(r.chord().owns(Note::new(67).unwrap()));
        r.handle(off(67));
        assert!(r.chord().active().is_none());
        assert!(r.keymap.lookup_raw(67).is_some());
        assert!(sink.presses().len() >= 2);
    }

    #[test]
    fn recording_captures_played_notes() {
        let (mut r, _) = router(SessionSettings::default());
        assert!(r.toggle_recording().is_none());
        r.handle(on(60));
        r.handle(off(60));
        r.handle(on(CONTROL_NEXT));
        let text = r.toggle_recording().unwrap();
        assert!(text.contains("Complete"));
        assert_eq!(notation::decode_notes(&text).len(), 1);
    }

    #[test]
    fn spectrum_follows_velocity() {
        let (mut r, _) = router(SessionSettings::default());
        r.handle(InputEvent::NoteOn { note: 60, velocity: 127 });
        assert!((r.spectrum().level(Note::new(60).unwrap()) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn chord_tones_and_decay_reach_the_spectrum() {
        let (mut r, _) = router(SessionSettings {
            quality: ChordQuality::Major,
            ..SessionSettings::default()
        });
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = r.spectrum().clone();
        let worker = std::thread::spawn(move || {
            r.run(rx);
        });
        tx.send(Command::from(InputEvent::NoteOn { note: 50, velocity: 127 })).unwrap();
        let lit = 100.0 / 127.0;
        let fifth = Note::new(57).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while handle.level(fifth) == 0.0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(handle.level(fifth) > 0.0 && handle.level(fifth) <= lit + 1e-6);
        // Held chord tones fade on their own while the session runs.
        std::thread::sleep(DECAY_INTERVAL * 4);
        assert!(handle.level(fifth) < lit);
        tx.send(Command::Shutdown).unwrap();
        worker.join().unwrap();
    }

    #[test]
    fn enabling_arp_releases_sounding_chord() {
        let (mut r, sink) = router(SessionSettings {
            quality: ChordQuality::Major,
            ..SessionSettings::default()
        });
        r.handle(on(50));
        assert!(r.chord().active().is_some());
        sink.clear();

        r.apply(Command::ToggleArp);
        assert!(r.chord().active().is_none());
        assert_eq!(r.mode(), Mode::Arpeggio(ArpPattern::Up));
        let released: Vec<VirtualKey> = sink
            .key_events()
            .into_iter()
            .filter(|(_, down)| !down)
            .map(|(vk, _)| vk)
            .collect();
        // 54 is a Ctrl tap, already up; the plain tones need key-ups.
        for key in [0x32, 0x36] {
            assert!(released.contains(&VirtualKey::new(key)), "{:#x} still down", key);
        }
        assert!(r.output.held_keys().is_empty());

        // The root's release is no longer owned by anything.
        sink.clear();
        r.handle(off(50));
        assert!(sink.key_events().is_empty());
    }

    #[test]
    fn disabling_arp_stops_worker_and_orphans_releases() {
        let (mut r, sink) = router(SessionSettings {
            arp_enabled: true,
            arp: ArpSettings::default().with_bpm(bardkeys_types::MAX_BPM),
            ..SessionSettings::default()
        });
        r.handle(on(60));
        r.handle(on(64));
        let deadline = Instant::now() + Duration::from_secs(5);
        while sink.presses().is_empty() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(!sink.presses().is_empty());

        r.apply(Command::ToggleArp);
        assert_eq!(r.mode(), Mode::Direct);
        assert!(r.arpeggiator().held().is_empty());
        let deadline = Instant::now() + Duration::from_secs(5);
        while r.arpeggiator().is_running() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(!r.arpeggiator().is_running());

        sink.clear();
        r.handle(off(60));
        r.handle(off(64));
        std::thread::sleep(Duration::from_millis(50));
        assert!(sink.key_events().is_empty());
        assert!(r.output.held_keys().is_empty());
    }

    #[test]
    fn run_stops_on_shutdown_and_releases() {
        let (mut r, sink) = router(SessionSettings::default());
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(Command::from(on(60))).unwrap();
        tx.send(Command::Shutdown).unwrap();
        tx.send(Command::from(on(62))).unwrap();
        r.run(rx);
        assert_eq!(sink.presses(), vec![VirtualKey::new(0x38)]);
        assert!(sink.key_events().contains(&(VirtualKey::new(0x38), false)));
        assert!(r.output.held_keys().is_empty());
    }
}
