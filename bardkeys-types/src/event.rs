use serde::{Deserialize, Serialize};

/// Raw performance event, as delivered by a controller or a MIDI file.
///
/// Note numbers are raw 0-127 here; range filtering happens downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputEvent {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
    ControlChange { controller: u8, value: u8 },
}

impl InputEvent {
    /// Normalise a note-on with velocity 0 into a note-off.
    pub fn normalized(self) -> Self {
        match self {
            InputEvent::NoteOn { note, velocity: 0 } => InputEvent::NoteOff { note },
            other => other,
        }
    }

    pub fn note(&self) -> Option<u8> {
        match self {
            InputEvent::NoteOn { note, .. } | InputEvent::NoteOff { note } => Some(*note),
            InputEvent::ControlChange { .. } => None,
        }
    }
}
