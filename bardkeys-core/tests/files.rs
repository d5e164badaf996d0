mod common;

use std::sync::Arc;
use std::time::Duration;

use bardkeys_core::error::NotationError;
use bardkeys_core::keymap::NoteActionMap;
use bardkeys_core::midi::{MidiFilePlayer, MidiTimeline};
use bardkeys_core::notation::{self, export_midi, import_midi_file, notation_to_smf};
use bardkeys_core::output::OutputTiming;
use bardkeys_core::router::{Command, EventRouter, SessionSettings};

use common::vk;

#[test]
fn exported_midi_reimports_as_the_same_tune() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tune.mid");
    export_midi("X: 1\nK: C\nC D E2\n", &path, 480).unwrap();

    let timeline = MidiTimeline::load(&path).unwrap();
    assert_eq!(timeline.note_count(), 3);
    assert_eq!(timeline.ticks_per_quarter, 480);
    // C at 0, D after a quarter plus a half-quarter rest.
    assert_eq!(timeline.events[2].tick, 720);
    assert_eq!(timeline.events[2].at, Duration::from_millis(750));

    let text = import_midi_file(&path).unwrap();
    assert!(text.contains("C D E2 |"));
}

#[test]
fn empty_notation_writes_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.mid");
    let err = export_midi("X: 1\n% nothing here\n", &path, 480).unwrap_err();
    assert!(matches!(err, NotationError::NoPlayableNotes));
    assert!(!path.exists());

    let abc = dir.path().join("empty.abc");
    assert!(notation::save(&abc, "T: header only\n").is_err());
    assert!(!abc.exists());
}

#[test]
fn recording_is_saved_on_stop() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("take.abc");
    let (output, _sink) = common::output(OutputTiming::IMMEDIATE);
    let mut router = EventRouter::new(output, Arc::new(NoteActionMap::new()), SessionSettings::default())
        .with_record_path(&path);

    router.apply(Command::ToggleRecording);
    router.handle(common::on(60));
    std::thread::sleep(Duration::from_millis(20));
    router.handle(common::off(60));
    router.handle(common::on(67));
    router.handle(common::off(67));
    router.apply(Command::ToggleRecording);

    let saved = notation::load(&path).unwrap();
    assert!(saved.starts_with("% bardkeys ABC Export - Complete"));
    assert!(saved.trim_end().ends_with("% End of recording"));
    let notes: Vec<u8> = notation::decode_notes(&saved).iter().map(|(n, _)| n.get()).collect();
    assert_eq!(notes, vec![60, 67]);
}

#[test]
fn midi_file_plays_through_the_router() {
    let bytes = notation_to_smf("C D", 480).unwrap();
    let timeline = MidiTimeline::parse(&bytes).unwrap();
    let (mut router, sink) = common::router(SessionSettings::default());

    let (tx, rx) = crossbeam_channel::unbounded::<Command>();
    let player = MidiFilePlayer::start(timeline, 20.0, tx).unwrap();
    // The channel closes when playback ends.
    router.run(rx);

    assert_eq!(player.wait(), 4);
    assert_eq!(sink.presses(), vec![vk(0x38), vk(0x32)]);
}
