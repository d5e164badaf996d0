//! Per-key intensity levels for a piano-roll style visualiser. The engine
//! only keeps the numbers; drawing them is up to the front end.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bardkeys_types::Note;

/// Level kept by a key when it is released.
const RELEASE_FACTOR: f32 = 0.7;
/// How often a running session decays the levels.
pub const DECAY_INTERVAL: Duration = Duration::from_millis(50);
/// Factor applied on every decay tick.
pub const DECAY_FACTOR: f32 = 0.95;
/// Velocity shown for chord tones.
pub const CHORD_VELOCITY: u8 = 100;
/// Velocity shown for arpeggiated notes.
pub const ARP_VELOCITY: u8 = 80;

#[derive(Debug, Clone)]
pub struct NoteSpectrum {
    levels: [f32; Note::KEY_COUNT],
    sensitivity: f32,
}

impl NoteSpectrum {
    pub fn new(sensitivity: f32) -> Self {
        Self {
            levels: [0.0; Note::KEY_COUNT],
            sensitivity,
        }
    }

    pub fn note_on(&mut self, raw: u8, velocity: u8) {
        if let Some(note) = Note::new(raw) {
            self.levels[note.key_index()] = velocity.min(127) as f32 / 127.0 * self.sensitivity;
        }
    }

    pub fn note_off(&mut self, raw: u8) {
        if let Some(note) = Note::new(raw) {
            self.levels[note.key_index()] *= RELEASE_FACTOR;
        }
    }

    /// Scale every level by `factor`, snapping tiny values to zero.
    pub fn decay(&mut self, factor: f32) {
        for level in self.levels.iter_mut() {
            *level *= factor;
            if *level < 0.001 {
                *level = 0.0;
            }
        }
    }

    pub fn level(&self, note: Note) -> f32 {
        self.levels[note.key_index()]
    }

    pub fn levels(&self) -> &[f32] {
        &self.levels
    }

    pub fn set_sensitivity(&mut self, sensitivity: f32) {
        self.sensitivity = sensitivity;
    }

    pub fn clear(&mut self) {
        self.levels = [0.0; Note::KEY_COUNT];
    }
}

impl Default for NoteSpectrum {
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// A spectrum written by the router, the chord engine and the arpeggiator
/// thread at once.
#[derive(Debug, Clone, Default)]
pub struct SharedSpectrum(Arc<Mutex<NoteSpectrum>>);

impl SharedSpectrum {
    pub fn new(spectrum: NoteSpectrum) -> Self {
        Self(Arc::new(Mutex::new(spectrum)))
    }

    pub fn lock(&self) -> MutexGuard<'_, NoteSpectrum> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn note_on(&self, note: Note, velocity: u8) {
        self.lock().note_on(note.get(), velocity);
    }

    pub fn note_off(&self, note: Note) {
        self.lock().note_off(note.get());
    }

    pub fn decay(&self, factor: f32) {
        self.lock().decay(factor);
    }

    pub fn level(&self, note: Note) -> f32 {
        self.lock().level(note)
    }

    /// Copy of the current levels.
    pub fn snapshot(&self) -> NoteSpectrum {
        self.lock().clone()
    }
}
