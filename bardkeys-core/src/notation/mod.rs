//! ABC-style text notation: live recording, decoding, playback and MIDI
//! conversion in both directions.
//!
//! The dialect is a small subset of ABC. A note is an optional accidental
//! (`^` sharp, `_` flat, `=` natural), a letter, octave marks (`,` down,
//! `'` up) and an optional length (`2`, `/2`, `3/2`) relative to the quarter
//! note. Uppercase `C` is middle C (60), lowercase `c` the octave above.

pub mod decode;
pub mod import;
pub mod player;
pub mod recorder;
pub mod smf;

use std::path::Path;

use bardkeys_types::{DurationRatio, Note};

use crate::error::NotationError;

pub use decode::{decode, decode_notes};
pub use import::{import_midi_file, midi_to_notation};
pub use player::{NotationPlayer, PlaybackTiming};
pub use recorder::Recorder;
pub use smf::{export_midi, notation_to_smf};

/// Seconds per quarter note when quantizing a live recording.
pub const RECORD_QUARTER_SECS: f64 = 0.6;
/// Seconds per quarter note when playing notation back.
pub const PLAYBACK_QUARTER_SECS: f64 = 0.4;
/// SMF resolution for export.
pub const TICKS_PER_QUARTER: u16 = 480;

/// Lines starting with any of these are header or comment lines.
pub const HEADER_PREFIXES: [&str; 22] = [
    "X:", "T:", "M:", "L:", "Q:", "K:", "%", "P:", "C:", "A:", "B:", "H:", "I:", "N:", "O:",
    "R:", "S:", "U:", "V:", "W:", "w:", "Z:",
];

const NOTE_NAMES: [&str; 12] = [
    "C", "^C", "D", "^D", "E", "F", "^F", "G", "^G", "A", "^A", "B",
];

pub fn is_header_line(line: &str) -> bool {
    let line = line.trim();
    HEADER_PREFIXES.iter().any(|p| line.starts_with(p))
}

/// Body text with header lines removed and everything but note, accidental,
/// octave, length and whitespace characters stripped. Lines are joined with
/// a single space.
pub fn body(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !is_header_line(line))
        .map(|line| {
            line.chars()
                .filter(|c| {
                    c.is_alphabetic()
                        || c.is_ascii_digit()
                        || matches!(*c, '^' | '_' | '=' | ',' | '\'' | '/' | ' ')
                })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether the text has anything besides headers and comments.
pub fn has_playable_notes(text: &str) -> bool {
    !decode_notes(text).is_empty()
}

/// Notation token for a note, e.g. `C`, `^F,`, `c'`.
pub fn note_token(note: Note) -> String {
    let raw = note.get() as i32;
    let name = NOTE_NAMES[(raw % 12) as usize];
    let octave = raw / 12 - 1;
    if octave <= 4 {
        let marks = ",".repeat((4 - octave) as usize);
        format!("{}{}", name, marks)
    } else {
        let marks = "'".repeat((octave - 5) as usize);
        format!("{}{}", name.to_lowercase(), marks)
    }
}

/// Note token with its length suffix.
pub fn note_with_duration(note: Note, duration: DurationRatio) -> String {
    format!("{}{}", note_token(note), duration.suffix())
}

/// Write notation to disk, refusing text without any notes.
pub fn save(path: &Path, text: &str) -> Result<(), NotationError> {
    if !has_playable_notes(text) {
        return Err(NotationError::NoPlayableNotes);
    }
    std::fs::write(path, text).map_err(|e| NotationError::io(path, e))?;
    log::info!(target: "notation", "saved {}", path.display());
    Ok(())
}

pub fn load(path: &Path) -> Result<String, NotationError> {
    std::fs::read_to_string(path).map_err(|e| NotationError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(raw: u8) -> Note {
        Note::new(raw).unwrap()
    }

    #[test]
    fn tokens_follow_abc_octaves() {
        assert_eq!(note_token(n(60)), "C");
        assert_eq!(note_token(n(61)), "^C");
        assert_eq!(note_token(n(71)), "B");
        assert_eq!(note_token(n(72)), "c");
        assert_eq!(note_token(n(84)), "c'");
        assert_eq!(note_token(n(48)), "C,");
        assert_eq!(note_token(n(59)), "B,");
        assert_eq!(note_token(n(47)), "B,,");
        assert_eq!(note_token(n(36)), "C,,");
    }

    #[test]
    fn tokens_decode_back_to_the_same_note() {
        for raw in 21..=108 {
            let token = note_token(n(raw));
            assert_eq!(decode_notes(&token), vec![(n(raw), DurationRatio::ONE)], "{}", token);
        }
    }

    #[test]
    fn headers_are_skipped() {
        assert!(is_header_line("X: 1"));
        assert!(is_header_line("% comment"));
        assert!(is_header_line("  K: C"));
        assert!(!is_header_line("C D E"));
    }

    #[test]
    fn body_strips_bar_lines() {
        let text = "X: 1\nT: Tune\nC D | E2 |\n% end\nF";
        assert_eq!(body(text), "C D  E2  F");
    }

    #[test]
    fn header_only_text_has_no_notes() {
        assert!(!has_playable_notes("X: 1\nT: Empty\n% Notes:\n|\n"));
        assert!(has_playable_notes("X: 1\nC"));
    }

    #[test]
    fn save_rejects_empty_notation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.abc");
        let err = save(&path, "X: 1\nK: C\n").unwrap_err();
        assert!(matches!(err, NotationError::NoPlayableNotes));
        assert!(!path.exists());

        save(&path, "X: 1\nC D E\n").unwrap();
        assert_eq!(load(&path).unwrap(), "X: 1\nC D E\n");
    }
}
