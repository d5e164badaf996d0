use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Note, ParseNameError};

/// Chord quality selected for chord mode. `None` plays single notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChordQuality {
    #[default]
    None,
    Major,
    Minor,
    Sus2,
    Sus4,
    Diminished,
    Augmented,
    Major7,
    Minor7,
}

impl ChordQuality {
    /// Selector cycle order.
    pub const ALL: [ChordQuality; 9] = [
        ChordQuality::None,
        ChordQuality::Major,
        ChordQuality::Minor,
        ChordQuality::Sus2,
        ChordQuality::Sus4,
        ChordQuality::Diminished,
        ChordQuality::Augmented,
        ChordQuality::Major7,
        ChordQuality::Minor7,
    ];

    /// Semitone offsets from the root, root included.
    pub fn intervals(&self) -> &'static [i32] {
        match self {
            ChordQuality::None => &[0],
            ChordQuality::Major => &[0, 4, 7],
            ChordQuality::Minor => &[0, 3, 7],
            ChordQuality::Sus2 => &[0, 2, 7],
            ChordQuality::Sus4 => &[0, 5, 7],
            ChordQuality::Diminished => &[0, 3, 6],
            ChordQuality::Augmented => &[0, 4, 8],
            ChordQuality::Major7 => &[0, 4, 7, 11],
            ChordQuality::Minor7 => &[0, 3, 7, 10],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChordQuality::None => "None",
            ChordQuality::Major => "Major",
            ChordQuality::Minor => "Minor",
            ChordQuality::Sus2 => "Sus2",
            ChordQuality::Sus4 => "Sus4",
            ChordQuality::Diminished => "Diminished",
            ChordQuality::Augmented => "Augmented",
            ChordQuality::Major7 => "Major 7th",
            ChordQuality::Minor7 => "Minor 7th",
        }
    }

    pub fn is_chord(&self) -> bool {
        *self != ChordQuality::None
    }

    fn index(&self) -> usize {
        Self::ALL.iter().position(|q| q == self).unwrap_or(0)
    }

    pub fn next(&self) -> ChordQuality {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(&self) -> ChordQuality {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    /// Root plus each interval, dropping anything outside the playable range.
    /// Ascending, since every interval list is.
    pub fn expand(&self, root: Note) -> Vec<Note> {
        self.intervals()
            .iter()
            .filter_map(|&offset| root.transpose(offset))
            .collect()
    }
}

impl FromStr for ChordQuality {
    type Err = ParseNameError;

    /// Accepts the display name or a short alias, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        let quality = match key.as_str() {
            "none" | "single" => ChordQuality::None,
            "major" | "maj" => ChordQuality::Major,
            "minor" | "min" | "m" => ChordQuality::Minor,
            "sus2" => ChordQuality::Sus2,
            "sus4" => ChordQuality::Sus4,
            "diminished" | "dim" => ChordQuality::Diminished,
            "augmented" | "aug" => ChordQuality::Augmented,
            "major7th" | "major7" | "maj7" => ChordQuality::Major7,
            "minor7th" | "minor7" | "min7" | "m7" => ChordQuality::Minor7,
            _ => return Err(ParseNameError::new("chord quality", s)),
        };
        Ok(quality)
    }
}

impl std::fmt::Display for ChordQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
