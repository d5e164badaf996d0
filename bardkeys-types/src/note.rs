use serde::{Deserialize, Serialize};

const NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// MIDI note number in the playable piano range.
///
/// Raw MIDI carries 0–127, but only 21 (A0) through 108 (C8) mean anything to
/// the engine. Construction outside that range fails, so every `Note` that
/// exists is one the engine is allowed to consider.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct Note(u8);

impl Note {
    pub const LOWEST: u8 = 21;
    pub const HIGHEST: u8 = 108;

    /// Number of keys on a piano, i.e. slots in `LOWEST..=HIGHEST`.
    pub const KEY_COUNT: usize = (Self::HIGHEST - Self::LOWEST + 1) as usize;

    pub fn new(raw: u8) -> Option<Self> {
        if (Self::LOWEST..=Self::HIGHEST).contains(&raw) {
            Some(Self(raw))
        } else {
            None
        }
    }

    /// Build from a signed value (e.g. root + interval), rejecting anything out of range.
    pub fn from_i32(raw: i32) -> Option<Self> {
        u8::try_from(raw).ok().and_then(Self::new)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Offset by a signed number of semitones, `None` if the result leaves the range.
    pub fn transpose(self, semitones: i32) -> Option<Self> {
        Self::from_i32(self.0 as i32 + semitones)
    }

    /// Index into an 88-slot array (0 = A0).
    pub fn key_index(self) -> usize {
        (self.0 - Self::LOWEST) as usize
    }

    /// Pitch class, 0 = C.
    pub fn pitch_class(self) -> u8 {
        self.0 % 12
    }

    /// Scientific octave number (C4 = 60).
    pub fn octave(self) -> i32 {
        (self.0 / 12) as i32 - 1
    }

    /// Scientific pitch name, e.g. `C4`, `F#3`.
    pub fn name(self) -> String {
        format!("{}{}", NAMES[self.pitch_class() as usize], self.octave())
    }
}

impl TryFrom<u8> for Note {
    type Error = String;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Note::new(raw).ok_or_else(|| {
            format!(
                "note {} outside playable range {}..={}",
                raw,
                Note::LOWEST,
                Note::HIGHEST
            )
        })
    }
}

impl From<Note> for u8 {
    fn from(note: Note) -> u8 {
        note.0
    }
}

impl std::fmt::Display for Note {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_bounds() {
        assert!(Note::new(20).is_none());
        assert!(Note::new(21).is_some());
        assert!(Note::new(108).is_some());
        assert!(Note::new(109).is_none());
        assert!(Note::from_i32(-3).is_none());
        assert_eq!(Note::KEY_COUNT, 88);
    }

    #[test]
    fn names() {
        assert_eq!(Note::new(60).unwrap().name(), "C4");
        assert_eq!(Note::new(54).unwrap().name(), "F#3");
        assert_eq!(Note::new(21).unwrap().name(), "A0");
    }

    #[test]
    fn transpose_clamps_to_range() {
        let c4 = Note::new(60).unwrap();
        assert_eq!(c4.transpose(7).map(Note::get), Some(67));
        assert!(Note::new(105).unwrap().transpose(4).is_none());
    }

    #[test]
    fn key_index_is_zero_based() {
        assert_eq!(Note::new(21).unwrap().key_index(), 0);
        assert_eq!(Note::new(108).unwrap().key_index(), 87);
    }
}
