//! Keystroke output protocol.
//!
//! Every keystroke from every source (direct play, chords, the arpeggiator,
//! notation playback) goes through one [`KeystrokeOutput`]. It holds a single
//! lock for the whole of each `send`, so modifier sequences from concurrent
//! callers never interleave at the OS level.
//!
//! Modified actions are taps: focus, release every modifier, press the
//! modifiers (Shift before Ctrl), press and release the key, then release the
//! modifiers in reverse. Plain actions are held: press and release are two
//! separate calls.

pub mod sink;
#[cfg(windows)]
pub mod windows;

use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use bardkeys_types::{Modifier, OutputAction, VirtualKey};

pub use sink::{DryRunSink, KeySink, SinkOp, TestSink, WindowHandle};

/// Delays around one modifier combination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComboTiming {
    /// After focusing the window.
    pub focus_settle: Duration,
    /// After force-releasing all modifiers.
    pub reset_settle: Duration,
    /// Between consecutive modifier presses.
    pub modifier_step: Duration,
    /// Between the last modifier and the key.
    pub modifier_to_key: Duration,
    /// Key held down.
    pub key_hold: Duration,
    /// Between key-up and the first modifier release.
    pub key_to_release: Duration,
    /// Between consecutive modifier releases.
    pub release_step: Duration,
}

impl ComboTiming {
    const fn ms(
        focus: u64,
        reset: u64,
        step: u64,
        to_key: u64,
        hold: u64,
        to_release: u64,
        release_step: u64,
    ) -> Self {
        Self {
            focus_settle: Duration::from_millis(focus),
            reset_settle: Duration::from_millis(reset),
            modifier_step: Duration::from_millis(step),
            modifier_to_key: Duration::from_millis(to_key),
            key_hold: Duration::from_millis(hold),
            key_to_release: Duration::from_millis(to_release),
            release_step: Duration::from_millis(release_step),
        }
    }

    pub const ZERO: ComboTiming = ComboTiming::ms(0, 0, 0, 0, 0, 0, 0);
}

/// All protocol delays. The game drops input sent too fast, and the
/// threshold grows with the number of modifiers involved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputTiming {
    /// Ctrl, Shift or Alt alone.
    pub single: ComboTiming,
    /// Shift+Ctrl.
    pub double: ComboTiming,
    /// After releasing a plain key.
    pub plain_release: Duration,
}

impl OutputTiming {
    pub const DEFAULT: OutputTiming = OutputTiming {
        single: ComboTiming::ms(2, 2, 1, 1, 1, 1, 1),
        double: ComboTiming::ms(5, 5, 5, 5, 10, 3, 3),
        plain_release: Duration::from_millis(1),
    };

    /// No delays at all, for tests.
    pub const IMMEDIATE: OutputTiming = OutputTiming {
        single: ComboTiming::ZERO,
        double: ComboTiming::ZERO,
        plain_release: Duration::ZERO,
    };

    pub fn for_modifier(&self, modifier: Modifier) -> &ComboTiming {
        if modifier.depth() > 1 {
            &self.double
        } else {
            &self.single
        }
    }
}

impl Default for OutputTiming {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Modifiers believed to be down at the OS level. Only ever trusted for
/// shutdown bookkeeping; every combination starts by releasing all of them.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ModifierState {
    asserted: Vec<VirtualKey>,
}

impl ModifierState {
    pub fn asserted(&self) -> &[VirtualKey] {
        &self.asserted
    }

    pub fn is_clear(&self) -> bool {
        self.asserted.is_empty()
    }

    fn press(&mut self, key: VirtualKey) {
        if !self.asserted.contains(&key) {
            self.asserted.push(key);
        }
    }

    fn release(&mut self, key: VirtualKey) {
        self.asserted.retain(|k| *k != key);
    }

    fn clear(&mut self) {
        self.asserted.clear();
    }
}

struct OutputState {
    sink: Box<dyn KeySink>,
    modifiers: ModifierState,
    held: Vec<VirtualKey>,
}

impl OutputState {
    /// Key-up for every modifier, whatever we think is down.
    fn release_modifiers(&mut self, target: WindowHandle) {
        for key in VirtualKey::MODIFIERS {
            self.sink.key_event(target, key, false);
        }
        self.modifiers.clear();
    }

    fn key(&mut self, target: WindowHandle, key: VirtualKey, down: bool) -> bool {
        log::debug!(target: "output", "{} {}", if down { "down" } else { "up" }, key.label());
        self.sink.key_event(target, key, down)
    }
}

/// Serialized keystroke delivery to the target window.
pub struct KeystrokeOutput {
    state: Mutex<OutputState>,
    timing: OutputTiming,
}

impl KeystrokeOutput {
    pub fn new(sink: Box<dyn KeySink>) -> Self {
        Self::with_timing(sink, OutputTiming::DEFAULT)
    }

    pub fn with_timing(sink: Box<dyn KeySink>, timing: OutputTiming) -> Self {
        Self {
            state: Mutex::new(OutputState {
                sink,
                modifiers: ModifierState::default(),
                held: Vec::new(),
            }),
            timing,
        }
    }

    pub fn timing(&self) -> &OutputTiming {
        &self.timing
    }

    fn lock(&self) -> MutexGuard<'_, OutputState> {
        // A panic elsewhere must not stop us releasing keys.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Send one action. Returns false if the window is missing or the OS
    /// rejected an event; the caller logs and carries on.
    pub fn send(&self, action: OutputAction, press: bool) -> bool {
        match action {
            OutputAction::Plain(key) => self.send_plain(key, press),
            OutputAction::Modified(modifier, key) => {
                if press {
                    self.tap_combo(modifier, key)
                } else {
                    // Already released inside the press call.
                    true
                }
            }
        }
    }

    /// Convenience for one press followed by one release.
    pub fn tap(&self, action: OutputAction) -> bool {
        let pressed = self.send(action, true);
        let released = self.send(action, false);
        pressed && released
    }

    fn send_plain(&self, key: VirtualKey, press: bool) -> bool {
        let mut state = self.lock();
        let Some(target) = state.sink.find_target() else {
            log::warn!(target: "output", "target window not found, dropping {}", key.label());
            return false;
        };

        let ok = state.key(target, key, press);
        if press {
            if ok {
                if !state.held.contains(&key) {
                    state.held.push(key);
                }
            } else {
                state.key(target, key, false);
                state.release_modifiers(target);
            }
        } else {
            state.held.retain(|k| *k != key);
            thread::sleep(self.timing.plain_release);
        }
        ok
    }

    fn tap_combo(&self, modifier: Modifier, key: VirtualKey) -> bool {
        let timing = *self.timing.for_modifier(modifier);
        let mut state = self.lock();
        let Some(target) = state.sink.find_target() else {
            log::warn!(
                target: "output",
                "target window not found, dropping {}+{}",
                modifier.name(),
                key.label()
            );
            return false;
        };

        if !state.sink.focus(target) {
            log::debug!(target: "output", "focus request refused");
        }
        thread::sleep(timing.focus_settle);

        state.release_modifiers(target);
        thread::sleep(timing.reset_settle);

        let keys = modifier.keys();
        for (i, &m) in keys.iter().enumerate() {
            if i > 0 {
                thread::sleep(timing.modifier_step);
            }
            if !state.key(target, m, true) {
                return self.abort(&mut state, target, key);
            }
            state.modifiers.press(m);
        }
        thread::sleep(timing.modifier_to_key);

        if !state.key(target, key, true) {
            return self.abort(&mut state, target, key);
        }
        thread::sleep(timing.key_hold);
        let key_up = state.key(target, key, false);
        thread::sleep(timing.key_to_release);

        let mut ok = key_up;
        for (i, &m) in keys.iter().rev().enumerate() {
            if i > 0 {
                thread::sleep(timing.release_step);
            }
            ok &= state.key(target, m, false);
            state.modifiers.release(m);
        }

        if !ok {
            return self.abort(&mut state, target, key);
        }
        true
    }

    fn abort(&self, state: &mut OutputState, target: WindowHandle, key: VirtualKey) -> bool {
        log::warn!(target: "output", "key sequence for {} failed, releasing modifiers", key.label());
        state.sink.key_event(target, key, false);
        state.release_modifiers(target);
        false
    }

    /// Force every modifier up. Used after a loop dies mid-sequence.
    pub fn reset_modifiers(&self) {
        let mut state = self.lock();
        match state.sink.find_target() {
            Some(target) => state.release_modifiers(target),
            None => state.modifiers.clear(),
        }
    }

    /// Release every held plain key and every modifier. Call on shutdown.
    pub fn release_all(&self) {
        let mut state = self.lock();
        let held = std::mem::take(&mut state.held);
        let Some(target) = state.sink.find_target() else {
            state.modifiers.clear();
            return;
        };
        for key in held {
            state.key(target, key, false);
        }
        state.release_modifiers(target);
    }

    /// Plain keys currently held down.
    pub fn held_keys(&self) -> Vec<VirtualKey> {
        self.lock().held.clone()
    }

    pub fn modifier_state(&self) -> ModifierState {
        self.lock().modifiers.clone()
    }
}

impl Drop for KeystrokeOutput {
    fn drop(&mut self) {
        self.release_all();
    }
}
