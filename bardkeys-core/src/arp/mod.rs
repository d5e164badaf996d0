//! Arpeggiator: plays the held notes as a repeating sequence on its own thread.
//!
//! The router owns an [`Arpeggiator`] and feeds it note-on/note-off. The
//! first held note starts a worker thread; when the last is released the
//! worker finishes the step it is on (releasing any key it pressed) and
//! exits. Every wait inside the loop wakes early on release, so a stop takes
//! effect within one step.

pub mod sequence;

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bardkeys_types::{ArpPattern, ArpSettings, Note, MAX_ARP_OCTAVES, MAX_BPM, MIN_BPM};

use crate::keymap::NoteActionMap;
use crate::output::KeystrokeOutput;
use crate::spectrum::{SharedSpectrum, ARP_VELOCITY};

pub use sequence::{generate_sequence, Lcg};

/// Fraction of each step the key is held down.
pub const GATE: f64 = 0.8;

#[derive(Debug)]
struct ArpState {
    /// Held notes in press order, no duplicates.
    held: Vec<Note>,
    settings: ArpSettings,
    /// Generation of the worker currently running, if any.
    worker: Option<u64>,
    next_worker: u64,
    shutdown: bool,
}

impl ArpState {
    fn running(&self, id: u64) -> bool {
        !self.shutdown && !self.held.is_empty() && self.worker == Some(id)
    }
}

struct Shared {
    state: Mutex<ArpState>,
    changed: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ArpState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sleep for `dur`, waking early if worker `id` should stop.
    /// Returns whether it is still running.
    fn wait(&self, id: u64, dur: Duration) -> bool {
        let deadline = Instant::now() + dur;
        let mut state = self.lock();
        loop {
            if !state.running(id) {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            state = match self.changed.wait_timeout(state, deadline - now) {
                Ok((guard, _)) => guard,
                Err(e) => e.into_inner().0,
            };
        }
    }
}

/// Clears the worker slot and lifts modifiers however the loop ends,
/// including by panic.
struct WorkerGuard {
    id: u64,
    shared: Arc<Shared>,
    output: Arc<KeystrokeOutput>,
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        {
            let mut state = self.shared.lock();
            if state.worker == Some(self.id) {
                state.worker = None;
            }
        }
        if thread::panicking() {
            log::error!(target: "arp", "arpeggiator loop panicked, stopping");
        }
        self.output.reset_modifiers();
        self.shared.changed.notify_all();
    }
}

pub struct Arpeggiator {
    shared: Arc<Shared>,
    output: Arc<KeystrokeOutput>,
    keymap: Arc<NoteActionMap>,
    spectrum: Option<SharedSpectrum>,
    handle: Option<JoinHandle<()>>,
}

impl Arpeggiator {
    pub fn new(
        output: Arc<KeystrokeOutput>,
        keymap: Arc<NoteActionMap>,
        settings: ArpSettings,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(ArpState {
                    held: Vec::new(),
                    settings,
                    worker: None,
                    next_worker: 0,
                    shutdown: false,
                }),
                changed: Condvar::new(),
            }),
            output,
            keymap,
            spectrum: None,
            handle: None,
        }
    }

    /// Show each arpeggiated step on `spectrum`. Takes effect from the next
    /// worker started.
    pub fn set_spectrum(&mut self, spectrum: SharedSpectrum) {
        self.spectrum = Some(spectrum);
    }

    pub fn settings(&self) -> ArpSettings {
        self.shared.lock().settings
    }

    pub fn set_pattern(&self, pattern: ArpPattern) {
        self.shared.lock().settings.pattern = pattern;
        log::info!(target: "arp", "pattern: {}", pattern.name());
    }

    pub fn set_bpm(&self, bpm: u32) {
        let bpm = bpm.clamp(MIN_BPM, MAX_BPM);
        self.shared.lock().settings.bpm = bpm;
        log::debug!(target: "arp", "tempo: {} bpm", bpm);
    }

    pub fn set_octaves(&self, octaves: u8) {
        self.shared.lock().settings.octaves = octaves.clamp(1, MAX_ARP_OCTAVES);
    }

    /// Notes currently held, in press order.
    pub fn held(&self) -> Vec<Note> {
        self.shared.lock().held.clone()
    }

    pub fn is_holding(&self, note: Note) -> bool {
        self.shared.lock().held.contains(&note)
    }

    /// Whether a playback loop is alive.
    pub fn is_running(&self) -> bool {
        self.shared.lock().worker.is_some()
    }

    /// Add a held note, starting playback if this is the first.
    pub fn note_on(&mut self, note: Note) {
        let start = {
            let mut state = self.shared.lock();
            if state.shutdown {
                return;
            }
            if !state.held.contains(&note) {
                state.held.push(note);
            }
            if state.worker.is_some() {
                None
            } else {
                let id = state.next_worker;
                state.next_worker += 1;
                state.worker = Some(id);
                Some(id)
            }
        };
        self.shared.changed.notify_all();

        if let Some(id) = start {
            self.spawn(id);
        }
    }

    /// Remove a held note. Playback stops once none remain.
    pub fn note_off(&mut self, note: Note) {
        let stopped = {
            let mut state = self.shared.lock();
            state.held.retain(|n| *n != note);
            state.held.is_empty()
        };
        self.shared.changed.notify_all();
        if stopped {
            log::debug!(target: "arp", "all notes released");
        }
    }

    /// Drop every held note.
    pub fn clear(&mut self) {
        self.shared.lock().held.clear();
        self.shared.changed.notify_all();
    }

    /// Stop playback and wait for the worker to finish its step.
    pub fn stop(&mut self) {
        self.clear();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!(target: "arp", "arpeggiator thread ended with a panic");
            }
        }
    }

    fn spawn(&mut self, id: u64) {
        // Previous worker has already given up its slot.
        if let Some(old) = self.handle.take() {
            let _ = old.join();
        }

        let guard = WorkerGuard {
            id,
            shared: Arc::clone(&self.shared),
            output: Arc::clone(&self.output),
        };
        let keymap = Arc::clone(&self.keymap);
        let spectrum = self.spectrum.clone();

        let spawned = thread::Builder::new()
            .name("arpeggiator".into())
            .spawn(move || run(guard, keymap, spectrum));

        match spawned {
            Ok(handle) => {
                log::info!(target: "arp", "arpeggiator started");
                self.handle = Some(handle);
            }
            Err(e) => {
                // The guard was dropped with the closure and freed the slot.
                log::error!(target: "arp", "could not start arpeggiator thread: {}", e);
            }
        }
    }
}

impl Drop for Arpeggiator {
    fn drop(&mut self) {
        self.shared.lock().shutdown = true;
        self.stop();
    }
}

fn run(guard: WorkerGuard, keymap: Arc<NoteActionMap>, spectrum: Option<SharedSpectrum>) {
    let id = guard.id;
    let shared = Arc::clone(&guard.shared);
    let output = Arc::clone(&guard.output);
    let mut rng = Lcg::from_time();

    loop {
        let (sequence, step) = {
            let mut state = shared.lock();
            if !state.running(id) {
                // Give up the slot under the same lock that saw the set empty,
                // so a concurrent note_on starts a fresh worker.
                if state.worker == Some(id) {
                    state.worker = None;
                }
                break;
            }
            let settings = state.settings;
            let seq = generate_sequence(
                &state.held,
                settings.pattern,
                settings.octaves,
                &keymap,
                &mut rng,
            );
            (seq, settings.step_secs())
        };

        if sequence.is_empty() {
            shared.wait(id, Duration::from_secs_f64(step));
            continue;
        }

        for note in sequence {
            let step = {
                let state = shared.lock();
                if !state.running(id) {
                    break;
                }
                state.settings.step_secs()
            };

            if let Some(action) = keymap.lookup(note) {
                log::debug!(target: "arp", "{} -> {}", note.name(), action.label());
                if !output.send(action, true) {
                    log::debug!(target: "arp", "press dropped for {}", note.name());
                }
                if let Some(spectrum) = &spectrum {
                    spectrum.note_on(note, ARP_VELOCITY);
                }
                shared.wait(id, Duration::from_secs_f64(step * GATE));
                output.send(action, false);
                if let Some(spectrum) = &spectrum {
                    spectrum.note_off(note);
                }
            }

            if !shared.wait(id, Duration::from_secs_f64(step * (1.0 - GATE))) {
                break;
            }
        }
    }

    log::info!(target: "arp", "arpeggiator stopped");
    drop(guard);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{OutputTiming, TestSink};
    use bardkeys_types::VirtualKey;

    fn arp(settings: ArpSettings) -> (Arpeggiator, TestSink) {
        let sink = TestSink::new();
        let output = Arc::new(KeystrokeOutput::with_timing(
            Box::new(sink.clone()),
            OutputTiming::IMMEDIATE,
        ));
        (
            Arpeggiator::new(output, Arc::new(NoteActionMap::new()), settings),
            sink,
        )
    }

    fn n(raw: u8) -> Note {
        Note::new(raw).unwrap()
    }

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn held_set_has_no_duplicates() {
        let (mut a, _) = arp(ArpSettings::default().with_bpm(MAX_BPM));
        a.note_on(n(60));
        a.note_on(n(60));
        a.note_on(n(64));
        assert_eq!(a.held(), vec![n(60), n(64)]);
        a.note_off(n(60));
        assert_eq!(a.held(), vec![n(64)]);
        a.stop();
    }

    #[test]
    fn plays_down_pattern_in_order() {
        let settings = ArpSettings {
            pattern: ArpPattern::Down,
            octaves: 1,
            bpm: MAX_BPM,
        };
        let (mut a, sink) = arp(settings);
        a.note_on(n(60));
        a.note_on(n(64));
        a.note_on(n(67));
        assert!(wait_for(|| sink.presses().len() >= 7));
        a.stop();

        // 67 = '5', 64 = Shift+'3', 60 = '8'. The first pass may have
        // started before every note arrived, so check from the second.
        let presses = sink.presses();
        let expected = [VirtualKey::new(0x35), VirtualKey::new(0x33), VirtualKey::new(0x38)];
        let start = presses
            .windows(3)
            .position(|w| w == expected)
            .expect("full pass not found");
        for (i, key) in presses[start..].iter().enumerate() {
            assert_eq!(*key, expected[i % 3]);
        }
    }

    #[test]
    fn releasing_last_note_stops_the_loop() {
        let (mut a, sink) = arp(ArpSettings::default().with_bpm(MAX_BPM));
        a.note_on(n(60));
        assert!(wait_for(|| !sink.presses().is_empty()));
        a.note_off(n(60));
        assert!(wait_for(|| !a.is_running()));

        let count = sink.presses().len();
        thread::sleep(Duration::from_millis(100));
        assert_eq!(sink.presses().len(), count);

        // Every plain press was matched by a release.
        let events = sink.key_events();
        let downs = events.iter().filter(|e| **e == (VirtualKey::new(0x38), true)).count();
        let ups = events.iter().filter(|e| **e == (VirtualKey::new(0x38), false)).count();
        assert!(ups >= downs);
    }

    #[test]
    fn restarts_after_idle() {
        let (mut a, sink) = arp(ArpSettings::default().with_bpm(MAX_BPM));
        a.note_on(n(60));
        a.note_off(n(60));
        assert!(wait_for(|| !a.is_running()));
        sink.clear();
        a.note_on(n(62));
        assert!(a.is_running());
        assert!(wait_for(|| !sink.presses().is_empty()));
        a.stop();
        assert!(!a.is_running());
    }

    #[test]
    fn steps_show_on_the_spectrum() {
        let (mut a, sink) = arp(ArpSettings::default().with_bpm(MAX_BPM));
        let spectrum = SharedSpectrum::default();
        a.set_spectrum(spectrum.clone());
        a.note_on(n(60));
        assert!(wait_for(|| !sink.presses().is_empty()));
        a.stop();
        // Lit at 80 and then released, so somewhere in (0, 80/127].
        let level = spectrum.level(n(60));
        assert!(level > 0.0 && level <= 80.0 / 127.0 + 1e-6, "level {}", level);
    }

    #[test]
    fn settings_are_clamped() {
        let (a, _) = arp(ArpSettings::default());
        a.set_bpm(1000);
        a.set_octaves(9);
        assert_eq!(a.settings().bpm, MAX_BPM);
        assert_eq!(a.settings().octaves, MAX_ARP_OCTAVES);
        a.set_pattern(ArpPattern::Lydian);
        assert_eq!(a.settings().pattern, ArpPattern::Lydian);
    }
}
