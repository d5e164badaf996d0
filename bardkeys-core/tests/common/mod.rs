#![allow(dead_code)]
//! Test harness utilities for bardkeys-core integration tests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bardkeys_core::keymap::NoteActionMap;
use bardkeys_core::output::{KeystrokeOutput, OutputTiming, TestSink};
use bardkeys_core::router::{EventRouter, SessionSettings};
use bardkeys_types::{InputEvent, VirtualKey};

/// Output protocol writing into a fresh recording sink.
pub fn output(timing: OutputTiming) -> (Arc<KeystrokeOutput>, TestSink) {
    let sink = TestSink::new();
    let output = Arc::new(KeystrokeOutput::with_timing(Box::new(sink.clone()), timing));
    (output, sink)
}

/// A router with no protocol delays and no gap between chord notes.
pub fn router(settings: SessionSettings) -> (EventRouter, TestSink) {
    let (output, sink) = output(OutputTiming::IMMEDIATE);
    let router = EventRouter::new(output, Arc::new(NoteActionMap::new()), settings)
        .with_chord_gap(Duration::ZERO);
    (router, sink)
}

pub fn vk(code: u16) -> VirtualKey {
    VirtualKey::new(code)
}

pub fn on(note: u8) -> InputEvent {
    InputEvent::NoteOn { note, velocity: 100 }
}

pub fn off(note: u8) -> InputEvent {
    InputEvent::NoteOff { note }
}

/// Poll `f` until it returns true or `timeout` passes.
pub fn wait_until<F: FnMut() -> bool>(timeout: Duration, mut f: F) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if f() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    f()
}

/// Whether `needle` occurs as a contiguous run inside `haystack`.
pub fn contains_run<T: PartialEq>(haystack: &[T], needle: &[T]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}
