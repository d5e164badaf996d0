//! Chord mode: one root note in, a whole chord of keystrokes out.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bardkeys_types::{ChordQuality, Modifier, Note, OutputAction};

use crate::keymap::NoteActionMap;
use crate::output::KeystrokeOutput;
use crate::spectrum::{SharedSpectrum, CHORD_VELOCITY};

/// Gap between chord notes so the game does not swallow simultaneous presses.
pub const CHORD_NOTE_GAP: Duration = Duration::from_millis(20);

/// Index of the seventh in `ChordQuality::Major7.intervals()`.
const SEVENTH_DEGREE: usize = 3;

/// The chord currently sounding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveChord {
    pub root: Note,
    pub notes: Vec<Note>,
}

pub struct ChordEngine {
    output: Arc<KeystrokeOutput>,
    keymap: Arc<NoteActionMap>,
    active: Option<ActiveChord>,
    note_gap: Duration,
    spectrum: Option<SharedSpectrum>,
}

impl ChordEngine {
    pub fn new(output: Arc<KeystrokeOutput>, keymap: Arc<NoteActionMap>) -> Self {
        Self {
            output,
            keymap,
            active: None,
            note_gap: CHORD_NOTE_GAP,
            spectrum: None,
        }
    }

    pub fn with_note_gap(mut self, gap: Duration) -> Self {
        self.note_gap = gap;
        self
    }

    pub fn set_note_gap(&mut self, gap: Duration) {
        self.note_gap = gap;
    }

    /// Show chord tones on `spectrum` as they are pressed and released.
    pub fn set_spectrum(&mut self, spectrum: SharedSpectrum) {
        self.spectrum = Some(spectrum);
    }

    pub fn active(&self) -> Option<&ActiveChord> {
        self.active.as_ref()
    }

    /// Whether `root` started the chord that is currently sounding.
    pub fn owns(&self, root: Note) -> bool {
        self.active.as_ref().is_some_and(|c| c.root == root)
    }

    /// Notes for `root` under `quality`, without playing anything.
    ///
    /// Every returned note is in range and mapped. For `Major7` the seventh
    /// drops a semitone when it would need Shift+Ctrl, which the game tends
    /// to lose; the third and fifth are never touched.
    pub fn voicing(&self, root: Note, quality: ChordQuality) -> Vec<Note> {
        let mut notes = quality.expand(root);

        if quality == ChordQuality::Major7 {
            let seventh = root.transpose(ChordQuality::Major7.intervals()[SEVENTH_DEGREE]);
            if let Some(seventh) = seventh {
                if self.needs_double_modifier(seventh) {
                    if let Some(flat) = seventh.transpose(-1).filter(|n| self.keymap.is_mapped(*n)) {
                        log::debug!(
                            target: "chord",
                            "substituting {} for {} in {} maj7",
                            flat.name(),
                            seventh.name(),
                            root.name()
                        );
                        for n in notes.iter_mut() {
                            if *n == seventh {
                                *n = flat;
                            }
                        }
                    }
                }
            }
        }

        notes.retain(|n| self.keymap.is_mapped(*n));
        notes.sort();
        notes.dedup();
        notes
    }

    fn needs_double_modifier(&self, note: Note) -> bool {
        matches!(
            self.keymap.lookup(note),
            Some(OutputAction::Modified(Modifier::ShiftCtrl, _))
        )
    }

    /// Release the current chord, then build and press the chord for `root`.
    ///
    /// An unmapped root produces nothing and leaves the current chord alone.
    pub fn trigger(&mut self, root: Note, quality: ChordQuality) -> Vec<Note> {
        if !self.keymap.is_mapped(root) {
            log::info!(target: "chord", "{} is not playable, no chord", root.name());
            return Vec::new();
        }

        self.release_active();

        let notes = self.voicing(root, quality);
        self.active = Some(ActiveChord {
            root,
            notes: notes.clone(),
        });

        log::debug!(
            target: "chord",
            "{} {}: {:?}",
            root.name(),
            quality.name(),
            notes.iter().map(|n| n.get()).collect::<Vec<_>>()
        );

        for (i, &note) in notes.iter().enumerate() {
            if i > 0 {
                thread::sleep(self.note_gap);
            }
            if let Some(action) = self.keymap.lookup(note) {
                if !self.output.send(action, true) {
                    log::warn!(target: "chord", "press failed for {}", note.name());
                }
            }
            if let Some(spectrum) = &self.spectrum {
                spectrum.note_on(note, CHORD_VELOCITY);
            }
        }
        notes
    }

    /// Release the chord started by `root`. A second call is a no-op.
    pub fn release(&mut self, root: Note) {
        if self.owns(root) {
            self.release_active();
        }
    }

    /// Release whatever chord is sounding.
    pub fn release_active(&mut self) {
        let Some(chord) = self.active.take() else {
            return;
        };
        for note in chord.notes {
            if let Some(action) = self.keymap.lookup(note) {
                self.output.send(action, false);
            }
            if let Some(spectrum) = &self.spectrum {
                spectrum.note_off(note);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{OutputTiming, TestSink};
    use bardkeys_types::VirtualKey;

    fn engine() -> (ChordEngine, TestSink) {
        let sink = TestSink::new();
        let output = Arc::new(KeystrokeOutput::with_timing(
            Box::new(sink.clone()),
            OutputTiming::IMMEDIATE,
        ));
        let engine = ChordEngine::new(output, Arc::new(NoteActionMap::new()))
            .with_note_gap(Duration::ZERO);
        (engine, sink)
    }

    fn n(raw: u8) -> Note {
        Note::new(raw).unwrap()
    }

    fn raw(notes: &[Note]) -> Vec<u8> {
        notes.iter().map(|n| n.get()).collect()
    }

    #[test]
    fn none_quality_is_single_note() {
        let (mut e, _) = engine();
        assert_eq!(raw(&e.trigger(n(60), ChordQuality::None)), vec![60]);
    }

    #[test]
    fn d_major() {
        let (mut e, sink) = engine();
        assert_eq!(raw(&e.trigger(n(50), ChordQuality::Major)), vec![50, 54, 57]);
        assert_eq!(
            sink.presses(),
            vec![VirtualKey::new(0x32), VirtualKey::new(0x35), VirtualKey::new(0x36)]
        );
    }

    #[test]
    fn major7_seventh_avoids_shift_ctrl() {
        let (e, _) = engine();
        // D3 maj7: C#4 (61) needs Shift+Ctrl, C4 (60) is plain.
        assert_eq!(raw(&e.voicing(n(50), ChordQuality::Major7)), vec![50, 54, 57, 60]);
        // C3 maj7: B3 (59) is plain, kept.
        assert_eq!(raw(&e.voicing(n(48), ChordQuality::Major7)), vec![48, 52, 55, 59]);
    }

    #[test]
    fn minor7_is_not_substituted() {
        let (e, _) = engine();
        // F3 m7 reaches D#4 (63), Shift+Ctrl, left as is.
        assert_eq!(raw(&e.voicing(n(53), ChordQuality::Minor7)), vec![53, 56, 60, 63]);
    }

    #[test]
    fn unmapped_chord_tones_are_dropped() {
        let (e, _) = engine();
        // G4 major: D5 (74) is off the instrument.
        assert_eq!(raw(&e.voicing(n(67), ChordQuality::Major)), vec![67, 71]);
    }

    #[test]
    fn every_voicing_is_mapped_and_in_range() {
        let (e, _) = engine();
        let map = NoteActionMap::new();
        for root in 21..=108u8 {
            let root = n(root);
            if !map.is_mapped(root) {
                continue;
            }
            for q in ChordQuality::ALL {
                for note in e.voicing(root, q) {
                    assert!(map.is_mapped(note), "{} {:?} -> {}", root, q, note);
                }
            }
        }
    }

    #[test]
    fn new_trigger_releases_previous_chord_first() {
        let (mut e, sink) = engine();
        e.trigger(n(48), ChordQuality::Major);
        sink.clear();
        e.trigger(n(50), ChordQuality::None);
        let events = sink.key_events();
        // 48 is plain 0x31, released before 50 (0x32) is pressed.
        let up = events.iter().position(|e| *e == (VirtualKey::new(0x31), false)).unwrap();
        let down = events.iter().position(|e| *e == (VirtualKey::new(0x32), true)).unwrap();
        assert!(up < down);
        assert_eq!(e.active().map(|c| c.root), Some(n(50)));
    }

    #[test]
    fn unmapped_root_keeps_current_chord() {
        let (mut e, sink) = engine();
        e.trigger(n(60), ChordQuality::Major);
        sink.clear();
        assert!(e.trigger(n(80), ChordQuality::Major).is_empty());
        assert!(sink.operations().is_empty());
        assert!(e.owns(n(60)));
    }

    #[test]
    fn release_is_idempotent() {
        let (mut e, sink) = engine();
        e.trigger(n(60), ChordQuality::None);
        e.release(n(60));
        let after_first = sink.operations().len();
        e.release(n(60));
        assert_eq!(sink.operations().len(), after_first);
        assert!(e.active().is_none());
    }

    #[test]
    fn release_of_other_note_is_ignored() {
        let (mut e, _) = engine();
        e.trigger(n(60), ChordQuality::Major);
        e.release(n(64));
        assert!(e.owns(n(60)));
    }

    #[test]
    fn chord_tones_light_the_spectrum() {
        let (mut e, _) = engine();
        let spectrum = SharedSpectrum::default();
        e.set_spectrum(spectrum.clone());
        e.trigger(n(50), ChordQuality::Major);
        let lit = 100.0 / 127.0;
        for note in [50, 54, 57] {
            assert!((spectrum.level(n(note)) - lit).abs() < 1e-6);
        }
        e.release(n(50));
        assert!((spectrum.level(n(54)) - lit * 0.7).abs() < 1e-6);
    }
}
