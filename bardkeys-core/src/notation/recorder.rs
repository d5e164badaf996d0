use std::collections::HashMap;
use std::time::Instant;

use bardkeys_types::{DurationBucket, Note};

use super::{note_with_duration, RECORD_QUARTER_SECS};

const IN_PROGRESS: &str = "Recording...";
const NOTES_PER_LINE: usize = 16;

fn header() -> String {
    format!(
        "% bardkeys ABC Export - {}\nX: 1\nT: MIDI Recording\nM: 4/4\nL: 1/4\nQ: 120\nK: C\n% Notes:\n",
        IN_PROGRESS
    )
}

/// Builds a notation document from live note-on/note-off timing.
///
/// Each note is written when it is released, so the document is always a
/// valid prefix of the finished recording.
#[derive(Debug)]
pub struct Recorder {
    quarter_secs: f64,
    started: HashMap<Note, Instant>,
    text: String,
    notes: usize,
    active: bool,
}

impl Recorder {
    pub fn new(quarter_secs: f64) -> Self {
        Self {
            quarter_secs,
            started: HashMap::new(),
            text: String::new(),
            notes: 0,
            active: false,
        }
    }

    /// Begin a fresh document, discarding any previous one.
    pub fn start(&mut self) {
        self.started.clear();
        self.text = header();
        self.notes = 0;
        self.active = true;
        log::info!(target: "notation", "recording started");
    }

    pub fn is_recording(&self) -> bool {
        self.active
    }

    pub fn note_count(&self) -> usize {
        self.notes
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn note_on(&mut self, note: Note, at: Instant) {
        if self.active {
            self.started.insert(note, at);
        }
    }

    /// Close the note and append its token. Returns the token written.
    pub fn note_off(&mut self, note: Note, at: Instant) -> Option<String> {
        if !self.active {
            return None;
        }
        let start = self.started.remove(&note)?;
        let held = at.saturating_duration_since(start).as_secs_f64();
        let bucket = DurationBucket::from_ratio(held / self.quarter_secs);
        let token = note_with_duration(note, bucket.ratio());

        self.text.push_str(&token);
        self.text.push(' ');
        self.notes += 1;
        if self.notes % NOTES_PER_LINE == 0 {
            self.text.push_str("|\n");
        }
        log::debug!(target: "notation", "recorded {}", token);
        Some(token)
    }

    /// Finish the document and return it. Notes still held are dropped.
    pub fn stop(&mut self) -> String {
        if !self.active {
            return self.text.clone();
        }
        self.active = false;
        self.started.clear();
        self.text = self.text.replacen(IN_PROGRESS, "Complete", 1);
        self.text.push_str("|\n% End of recording");
        log::info!(target: "notation", "recording stopped, {} notes", self.notes);
        self.text.clone()
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new(RECORD_QUARTER_SECS)
    }
}
