//! MIDI file to notation.

use std::collections::{HashMap, VecDeque};
use std::path::Path;

use bardkeys_types::{DurationBucket, InputEvent, Note};

use super::note_with_duration;
use crate::error::NotationError;
use crate::midi::MidiTimeline;

const NOTES_PER_BAR: usize = 8;

const HEADER: &str = "% MIDI Import - Converted to ABC\n\
X: 1\n\
T: MIDI Import\n\
M: 4/4\n\
L: 1/4\n\
Q: 120\n\
K: C\n\
% Notes:\n";

const FOOTER: &str = "|\n% End of MIDI conversion\n";

/// Convert every note of a timeline to a notation token, in onset order.
///
/// A note lasts until the next note-off of the same pitch, measured in
/// quarters and quantized to the nearest of five lengths. A note that is
/// never released counts as a quarter. Notes outside the playable range are
/// skipped.
pub fn midi_to_notation(timeline: &MidiTimeline) -> Result<String, NotationError> {
    let tpq = timeline.ticks_per_quarter.max(1) as f64;

    // (onset tick, note, length in quarters)
    let mut notes: Vec<(u64, Note, Option<f64>)> = Vec::new();
    let mut open: HashMap<u8, VecDeque<usize>> = HashMap::new();

    for timed in &timeline.events {
        match timed.event {
            InputEvent::NoteOn { note, .. } => {
                let Some(n) = Note::new(note) else {
                    log::debug!(target: "notation", "import skips out-of-range note {}", note);
                    continue;
                };
                open.entry(note).or_default().push_back(notes.len());
                notes.push((timed.tick, n, None));
            }
            InputEvent::NoteOff { note } => {
                if let Some(idx) = open.get_mut(&note).and_then(VecDeque::pop_front) {
                    let (onset, _, length) = &mut notes[idx];
                    *length = Some(timed.tick.saturating_sub(*onset) as f64 / tpq);
                }
            }
            InputEvent::ControlChange { .. } => {}
        }
    }

    if notes.is_empty() {
        return Err(NotationError::NoPlayableNotes);
    }

    let mut out = String::from(HEADER);
    for (i, (_, note, length)) in notes.iter().enumerate() {
        let bucket = DurationBucket::from_ratio(length.unwrap_or(1.0));
        out.push_str(&note_with_duration(*note, bucket.ratio()));
        out.push(' ');
        if (i + 1) % NOTES_PER_BAR == 0 {
            out.push_str("|\n");
        }
    }
    out.push_str(FOOTER);

    log::info!(target: "notation", "imported {} notes", notes.len());
    Ok(out)
}

/// Read a MIDI file and convert it.
pub fn import_midi_file(path: &Path) -> Result<String, NotationError> {
    let timeline = MidiTimeline::load(path)?;
    midi_to_notation(&timeline)
}
