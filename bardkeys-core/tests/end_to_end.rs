mod common;

use std::sync::Arc;
use std::time::Duration;

use bardkeys_core::arp::{generate_sequence, Lcg};
use bardkeys_core::keymap::NoteActionMap;
use bardkeys_core::notation::decode_notes;
use bardkeys_core::router::SessionSettings;
use bardkeys_types::{ArpPattern, ArpSettings, ChordQuality, DurationRatio, Note, VirtualKey};

use common::{off, on, vk};

#[test]
fn direct_note_is_one_plain_press_then_release() {
    let (mut router, sink) = common::router(SessionSettings::default());
    router.handle(on(60));
    router.handle(off(60));
    assert_eq!(sink.key_events(), vec![(vk(0x38), true), (vk(0x38), false)]);
}

#[test]
fn d_major_chord_mixes_plain_and_ctrl_actions() {
    let (mut router, sink) = common::router(SessionSettings {
        quality: ChordQuality::Major,
        ..SessionSettings::default()
    });
    router.handle(on(50));

    let chord: Vec<u8> = router
        .chord()
        .active()
        .unwrap()
        .notes
        .iter()
        .map(|n| n.get())
        .collect();
    assert_eq!(chord, vec![50, 54, 57]);
    assert_eq!(sink.presses(), vec![vk(0x32), vk(0x35), vk(0x36)]);

    let events = sink.key_events();
    assert!(common::contains_run(
        &events,
        &[
            (VirtualKey::CONTROL, true),
            (vk(0x35), true),
            (vk(0x35), false),
            (VirtualKey::CONTROL, false),
        ]
    ));

    router.handle(off(50));
    assert!(router.chord().active().is_none());
    assert!(sink.key_events().ends_with(&[(vk(0x36), false)]));
}

#[test]
fn notation_decodes_relative_to_the_quarter() {
    let decoded: Vec<(u8, DurationRatio)> = decode_notes("C D E2")
        .into_iter()
        .map(|(n, d)| (n.get(), d))
        .collect();
    assert_eq!(
        decoded,
        vec![
            (60, DurationRatio::ONE),
            (62, DurationRatio::ONE),
            (64, DurationRatio::new(2, 1).unwrap()),
        ]
    );
}

#[test]
fn down_pattern_over_c_major_triad() {
    let keymap = NoteActionMap::new();
    let held: Vec<Note> = [60, 64, 67].iter().map(|&n| Note::new(n).unwrap()).collect();
    let seq = generate_sequence(&held, ArpPattern::Down, 1, &keymap, &mut Lcg::new(1));
    assert_eq!(seq.iter().map(|n| n.get()).collect::<Vec<_>>(), vec![67, 64, 60]);
}

#[test]
fn arpeggiator_repeats_until_released() {
    let (mut router, sink) = common::router(SessionSettings {
        arp_enabled: true,
        arp: ArpSettings {
            pattern: ArpPattern::Down,
            octaves: 1,
            bpm: 200,
        },
        ..SessionSettings::default()
    });
    router.handle(on(60));
    router.handle(on(64));
    router.handle(on(67));

    // G4 Shift+5, E4 Shift+3, C4 8
    let pass = [vk(0x35), vk(0x33), vk(0x38)];
    assert!(common::wait_until(Duration::from_secs(5), || {
        let presses = sink.presses();
        presses.len() >= 9 && common::contains_run(&presses, &pass)
    }));

    router.handle(off(60));
    router.handle(off(64));
    router.handle(off(67));
    assert!(common::wait_until(Duration::from_secs(2), || !router.arpeggiator().is_running()));

    let settled = sink.presses().len();
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(sink.presses().len(), settled);
    assert!(!sink.key_events().ends_with(&[(vk(0x38), true)]));
}

#[test]
fn missing_window_drops_notes_without_stopping_the_session() {
    let (output, sink) = common::output(bardkeys_core::output::OutputTiming::IMMEDIATE);
    let mut router = bardkeys_core::router::EventRouter::new(
        output,
        Arc::new(NoteActionMap::new()),
        SessionSettings::default(),
    );
    sink.set_window_missing(true);
    router.handle(on(62));
    router.handle(on(60));
    assert!(sink.key_events().is_empty());

    sink.set_window_missing(false);
    router.handle(on(60));
    assert_eq!(sink.presses(), vec![vk(0x38)]);
}
