use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ParseNameError;

pub const MIN_BPM: u32 = 60;
pub const MAX_BPM: u32 = 200;
pub const MAX_ARP_OCTAVES: u8 = 4;

/// Ordering rule the arpeggiator applies to held notes.
///
/// Linear patterns reorder the held notes themselves. Scale patterns ignore
/// everything but the lowest held note and walk a fixed interval list from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ArpPattern {
    #[default]
    Up,
    Down,
    UpDown,
    Random,
    AsPlayed,
    Pentatonic,
    Diatonic,
    Chromatic,
    Mixolydian,
    Dorian,
    Lydian,
    BluesScale,
}

impl ArpPattern {
    /// Selector cycle order.
    pub const ALL: [ArpPattern; 12] = [
        ArpPattern::Up,
        ArpPattern::Down,
        ArpPattern::UpDown,
        ArpPattern::Random,
        ArpPattern::AsPlayed,
        ArpPattern::Pentatonic,
        ArpPattern::Diatonic,
        ArpPattern::Chromatic,
        ArpPattern::Mixolydian,
        ArpPattern::Dorian,
        ArpPattern::Lydian,
        ArpPattern::BluesScale,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ArpPattern::Up => "Up",
            ArpPattern::Down => "Down",
            ArpPattern::UpDown => "Up-Down",
            ArpPattern::Random => "Random",
            ArpPattern::AsPlayed => "As Played",
            ArpPattern::Pentatonic => "Pentatonic",
            ArpPattern::Diatonic => "Diatonic",
            ArpPattern::Chromatic => "Chromatic",
            ArpPattern::Mixolydian => "Mixolydian",
            ArpPattern::Dorian => "Dorian",
            ArpPattern::Lydian => "Lydian",
            ArpPattern::BluesScale => "Blues Scale",
        }
    }

    /// Semitone offsets from the lowest held note, for scale patterns only.
    pub fn scale_intervals(&self) -> Option<&'static [i32]> {
        let intervals: &'static [i32] = match self {
            ArpPattern::Pentatonic => &[0, 2, 4, 7, 9],
            ArpPattern::Diatonic => &[0, 2, 4, 5, 7, 9, 11],
            ArpPattern::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
            ArpPattern::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
            ArpPattern::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            ArpPattern::Lydian => &[0, 2, 4, 6, 7, 9, 11],
            ArpPattern::BluesScale => &[0, 3, 5, 6, 7, 10],
            ArpPattern::Up
            | ArpPattern::Down
            | ArpPattern::UpDown
            | ArpPattern::Random
            | ArpPattern::AsPlayed => return None,
        };
        Some(intervals)
    }

    pub fn is_scale(&self) -> bool {
        self.scale_intervals().is_some()
    }

    fn index(&self) -> usize {
        Self::ALL.iter().position(|p| p == self).unwrap_or(0)
    }

    pub fn next(&self) -> ArpPattern {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(&self) -> ArpPattern {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl FromStr for ArpPattern {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| {
                let name: String = p
                    .name()
                    .chars()
                    .filter(|c| c.is_ascii_alphanumeric())
                    .collect::<String>()
                    .to_ascii_lowercase();
                name == key || (key == "blues" && *p == ArpPattern::BluesScale)
            })
            .ok_or_else(|| ParseNameError::new("arpeggio pattern", s))
    }
}

impl std::fmt::Display for ArpPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Arpeggiator parameters shared between the router and the playback loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArpSettings {
    pub pattern: ArpPattern,
    pub octaves: u8, // 1-4
    pub bpm: u32,    // 60-200
}

impl Default for ArpSettings {
    fn default() -> Self {
        Self {
            pattern: ArpPattern::Up,
            octaves: 1,
            bpm: 120,
        }
    }
}

impl ArpSettings {
    pub fn with_bpm(mut self, bpm: u32) -> Self {
        self.bpm = bpm.clamp(MIN_BPM, MAX_BPM);
        self
    }

    pub fn with_octaves(mut self, octaves: u8) -> Self {
        self.octaves = octaves.clamp(1, MAX_ARP_OCTAVES);
        self
    }

    /// One sixteenth note at the current tempo, in seconds.
    pub fn step_secs(&self) -> f64 {
        60.0 / (self.bpm.max(1) as f64 * 4.0)
    }

    /// Map a 0-127 controller value linearly onto the tempo range.
    pub fn bpm_from_controller(value: u8) -> u32 {
        let value = value.min(127) as f64;
        let span = (MAX_BPM - MIN_BPM) as f64;
        MIN_BPM + (value / 127.0 * span) as u32
    }
}
