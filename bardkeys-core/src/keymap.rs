//! Note to keystroke table.
//!
//! The instrument exposes two octaves, B2 (47) to C5 (72), on the number row.
//! Naturals are plain keys; sharps and flats borrow the neighbouring key with
//! Ctrl (lower octave) or Shift+Ctrl (upper octave). The upper octave's
//! naturals sit under Shift.

use std::collections::BTreeMap;

use bardkeys_types::{Modifier, Note, OutputAction};
use serde::Serialize;

const KEY_1: u16 = 0x31;
const KEY_2: u16 = 0x32;
const KEY_3: u16 = 0x33;
const KEY_4: u16 = 0x34;
const KEY_5: u16 = 0x35;
const KEY_6: u16 = 0x36;
const KEY_7: u16 = 0x37;
const KEY_8: u16 = 0x38;

const DEFAULT_TABLE: [(u8, OutputAction); 26] = [
    (47, OutputAction::modified(Modifier::Ctrl, KEY_1)),
    (48, OutputAction::plain(KEY_1)),
    (49, OutputAction::modified(Modifier::Ctrl, KEY_2)),
    (50, OutputAction::plain(KEY_2)),
    (51, OutputAction::modified(Modifier::Ctrl, KEY_3)),
    (52, OutputAction::plain(KEY_3)),
    (53, OutputAction::plain(KEY_4)),
    (54, OutputAction::modified(Modifier::Ctrl, KEY_5)),
    (55, OutputAction::plain(KEY_5)),
    (56, OutputAction::modified(Modifier::Ctrl, KEY_6)),
    (57, OutputAction::plain(KEY_6)),
    (58, OutputAction::modified(Modifier::Ctrl, KEY_7)),
    (59, OutputAction::plain(KEY_7)),
    (60, OutputAction::plain(KEY_8)),
    (61, OutputAction::modified(Modifier::ShiftCtrl, KEY_1)),
    (62, OutputAction::modified(Modifier::Shift, KEY_2)),
    (63, OutputAction::modified(Modifier::ShiftCtrl, KEY_3)),
    (64, OutputAction::modified(Modifier::Shift, KEY_3)),
    (65, OutputAction::modified(Modifier::Shift, KEY_4)),
    (66, OutputAction::modified(Modifier::ShiftCtrl, KEY_5)),
    (67, OutputAction::modified(Modifier::Shift, KEY_5)),
    (68, OutputAction::modified(Modifier::ShiftCtrl, KEY_6)),
    (69, OutputAction::modified(Modifier::Shift, KEY_6)),
    (70, OutputAction::modified(Modifier::ShiftCtrl, KEY_7)),
    (71, OutputAction::modified(Modifier::Shift, KEY_7)),
    (72, OutputAction::modified(Modifier::Shift, KEY_8)),
];

/// One row of the table, for display and JSON export.
#[derive(Debug, Clone, Serialize)]
pub struct KeymapEntry {
    pub note: u8,
    pub name: String,
    pub keys: String,
    pub action: OutputAction,
}

/// Immutable note to action lookup, built once at startup and shared.
#[derive(Debug, Clone)]
pub struct NoteActionMap {
    table: BTreeMap<Note, OutputAction>,
}

impl NoteActionMap {
    pub fn new() -> Self {
        let table = DEFAULT_TABLE
            .iter()
            .filter_map(|&(raw, action)| Note::new(raw).map(|n| (n, action)))
            .collect();
        Self { table }
    }

    /// Absent means the note is unplayable, never an error.
    pub fn lookup(&self, note: Note) -> Option<OutputAction> {
        self.table.get(&note).copied()
    }

    /// Lookup for a raw MIDI number, rejecting anything outside the piano range.
    pub fn lookup_raw(&self, raw: u8) -> Option<OutputAction> {
        Note::new(raw).and_then(|n| self.lookup(n))
    }

    pub fn is_mapped(&self, note: Note) -> bool {
        self.table.contains_key(&note)
    }

    pub fn lowest(&self) -> Option<Note> {
        self.table.keys().next().copied()
    }

    pub fn highest(&self) -> Option<Note> {
        self.table.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Note, OutputAction)> + '_ {
        self.table.iter().map(|(n, a)| (*n, *a))
    }

    pub fn entries(&self) -> Vec<KeymapEntry> {
        self.iter()
            .map(|(note, action)| KeymapEntry {
                note: note.get(),
                name: note.name(),
                keys: action.label(),
                action,
            })
            .collect()
    }
}

impl Default for NoteActionMap {
    fn default() -> Self {
        Self::new()
    }
}
