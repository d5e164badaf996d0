//! # bardkeys-types
//!
//! Shared value types for the bardkeys workspace: notes, keystroke actions,
//! chord qualities, arpeggiator patterns, raw input events and notation items.
//! Nothing in here touches the OS or spawns threads.

pub mod action;
pub mod arp;
pub mod chord;
pub mod event;
pub mod notation;
pub mod note;

pub use action::{Modifier, OutputAction, VirtualKey};
pub use arp::{ArpPattern, ArpSettings, MAX_ARP_OCTAVES, MAX_BPM, MIN_BPM};
pub use chord::ChordQuality;
pub use event::InputEvent;
pub use notation::{DurationBucket, DurationRatio, NotationItem};
pub use note::Note;

/// Error returned when a name does not match any variant of a closed enumeration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseNameError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseNameError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Direction for cycling through a selector (chord quality or arp pattern).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CycleDirection {
    Backward,
    Forward,
}
