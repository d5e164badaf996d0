//! Notation to Standard MIDI File.

use std::path::Path;

use bardkeys_types::{DurationRatio, NotationItem};
use midly::num::{u15, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};

use super::decode;
use crate::error::NotationError;

const VELOCITY: u8 = 80;
const PROGRAM: u8 = 0;
const MAX_DELTA: u64 = 0x0FFF_FFFF;

fn ticks(duration: DurationRatio, ticks_per_quarter: u16) -> u64 {
    ticks_per_quarter as u64 * duration.num() as u64 / duration.den() as u64
}

fn delta(ticks: u64) -> u28 {
    u28::new(ticks.min(MAX_DELTA) as u32)
}

fn midi(delta_ticks: u64, message: MidiMessage) -> TrackEvent<'static> {
    TrackEvent {
        delta: delta(delta_ticks),
        kind: TrackEventKind::Midi {
            channel: u4::new(0),
            message,
        },
    }
}

/// Encode notation as a single-track SMF.
///
/// The track opens with a program change, then each note becomes a note-on
/// and a note-off separated by its length in ticks. Rests push the next
/// note-on later.
pub fn notation_to_smf(text: &str, ticks_per_quarter: u16) -> Result<Vec<u8>, NotationError> {
    let items = decode(text);
    if !items.iter().any(|i| i.note().is_some()) {
        return Err(NotationError::NoPlayableNotes);
    }

    let tpq = ticks_per_quarter.clamp(1, 0x7FFF);
    let mut track = vec![midi(
        0,
        MidiMessage::ProgramChange {
            program: u7::new(PROGRAM),
        },
    )];

    let mut wait = 0u64;
    for item in items {
        match item {
            NotationItem::Note { note, duration } => {
                let key = u7::new(note.get());
                track.push(midi(
                    wait,
                    MidiMessage::NoteOn {
                        key,
                        vel: u7::new(VELOCITY),
                    },
                ));
                track.push(midi(
                    ticks(duration, tpq),
                    MidiMessage::NoteOff {
                        key,
                        vel: u7::new(0),
                    },
                ));
                wait = 0;
            }
            NotationItem::Rest { duration } => wait += ticks(duration, tpq),
        }
    }
    track.push(TrackEvent {
        delta: delta(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let mut smf = Smf::new(Header::new(
        Format::SingleTrack,
        Timing::Metrical(u15::new(tpq)),
    ));
    smf.tracks.push(track);

    let mut bytes = Vec::new();
    smf.write_std(&mut bytes)
        .map_err(|e| NotationError::MidiEncode(e.to_string()))?;
    Ok(bytes)
}

/// Convert notation to a MIDI file on disk. Nothing is written on failure.
pub fn export_midi(text: &str, path: &Path, ticks_per_quarter: u16) -> Result<(), NotationError> {
    let bytes = notation_to_smf(text, ticks_per_quarter)?;
    std::fs::write(path, bytes).map_err(|e| NotationError::io(path, e))?;
    log::info!(target: "notation", "exported {}", path.display());
    Ok(())
}
