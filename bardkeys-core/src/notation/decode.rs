//! Notation text to an ordered stream of notes and rests.

use bardkeys_types::{DurationRatio, NotationItem, Note};

use super::body;

fn letter_pitch(c: char) -> Option<i32> {
    let base = match c.to_ascii_uppercase() {
        'C' => 60,
        'D' => 62,
        'E' => 64,
        'F' => 65,
        'G' => 67,
        'A' => 69,
        'B' => 71,
        _ => return None,
    };
    Some(if c.is_ascii_lowercase() { base + 12 } else { base })
}

fn accidental(c: char) -> Option<i32> {
    match c {
        '^' => Some(1),
        '_' => Some(-1),
        '=' => Some(0),
        _ => None,
    }
}

/// Parse a length suffix. `None` when it is malformed or zero.
pub fn parse_duration(text: &str) -> Option<DurationRatio> {
    if text.is_empty() {
        return Some(DurationRatio::ONE);
    }
    match text.split_once('/') {
        None => DurationRatio::new(text.parse().ok()?, 1),
        Some((num, den)) => {
            let num = if num.is_empty() { 1 } else { num.parse().ok()? };
            DurationRatio::new(num, den.parse().ok()?)
        }
    }
}

/// Decode notation text into notes and rests, with lengths in quarter notes.
///
/// Header lines are skipped and bar lines stripped first. Any character that
/// does not start a note, whitespace included, is a rest of half a quarter.
/// A malformed length falls back to one quarter; the decode never fails.
/// Pitches outside the piano range become rests of the same length.
pub fn decode(text: &str) -> Vec<NotationItem> {
    let chars: Vec<char> = body(text).chars().collect();
    let mut items = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let mut c = chars[i];
        let mut shift = 0;
        if let Some(s) = accidental(c) {
            shift = s;
            i += 1;
            match chars.get(i) {
                Some(&next) => c = next,
                None => break,
            }
        }

        let Some(pitch) = letter_pitch(c) else {
            items.push(NotationItem::Rest {
                duration: DurationRatio::HALF,
            });
            i += 1;
            continue;
        };
        i += 1;

        let mut pitch = pitch + shift;
        while let Some(&mark) = chars.get(i) {
            match mark {
                ',' => pitch -= 12,
                '\'' => pitch += 12,
                _ => break,
            }
            i += 1;
        }

        let start = i;
        while chars.get(i).is_some_and(|c| c.is_ascii_digit() || *c == '/') {
            i += 1;
        }
        let length: String = chars[start..i].iter().collect();
        let duration = parse_duration(&length).unwrap_or_else(|| {
            log::debug!(target: "notation", "bad length '{}', using a quarter", length);
            DurationRatio::ONE
        });

        match Note::from_i32(pitch) {
            Some(note) => items.push(NotationItem::Note { note, duration }),
            None => {
                log::debug!(target: "notation", "pitch {} out of range, resting", pitch);
                items.push(NotationItem::Rest { duration });
            }
        }
    }
    items
}

/// Only the notes of [`decode`], with their lengths.
pub fn decode_notes(text: &str) -> Vec<(Note, DurationRatio)> {
    decode(text)
        .into_iter()
        .filter_map(|item| match item {
            NotationItem::Note { note, duration } => Some((note, duration)),
            NotationItem::Rest { .. } => None,
        })
        .collect()
}
