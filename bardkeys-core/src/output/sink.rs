//! Keystroke sink trait: the OS-facing edge of the output protocol.
//!
//! `KeySink` captures what the protocol *means* to do (find the game window,
//! focus it, post one key transition) independently of how it is done. This
//! keeps the sequencing rules in [`super::KeystrokeOutput`] testable without
//! a real window.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bardkeys_types::VirtualKey;

/// Opaque handle to the target window.
pub type WindowHandle = isize;

/// Low-level keystroke backend.
///
/// Every method is a single OS interaction. Ordering, delays and modifier
/// hygiene are the caller's job.
pub trait KeySink: Send {
    /// Look the target window up. Called on every send; never cached.
    fn find_target(&mut self) -> Option<WindowHandle>;

    /// Bring the window to the foreground.
    fn focus(&mut self, target: WindowHandle) -> bool;

    /// Post a single key-down or key-up to the window.
    fn key_event(&mut self, target: WindowHandle, key: VirtualKey, down: bool) -> bool;
}

// ─── Dry-run Sink ───────────────────────────────────────────────────

/// Sink that pretends a window always exists and logs what it would send.
#[derive(Debug, Default)]
pub struct DryRunSink;

impl DryRunSink {
    pub fn new() -> Self {
        Self
    }
}

impl KeySink for DryRunSink {
    fn find_target(&mut self) -> Option<WindowHandle> {
        Some(0)
    }

    fn focus(&mut self, _target: WindowHandle) -> bool {
        true
    }

    fn key_event(&mut self, _target: WindowHandle, key: VirtualKey, down: bool) -> bool {
        log::info!(
            target: "output",
            "{} {}",
            if down { "down" } else { "up  " },
            key.label()
        );
        true
    }
}

// ─── Test Sink ──────────────────────────────────────────────────────

/// An interaction recorded by `TestSink`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkOp {
    Find { found: bool },
    Focus,
    Key { key: VirtualKey, down: bool },
}

#[derive(Debug, Default)]
struct TestSinkState {
    ops: Vec<SinkOp>,
    window_missing: bool,
    fail_key: Option<VirtualKey>,
}

/// A sink that records every interaction for assertions.
///
/// Clones share the same log, so a test keeps one clone and hands the other
/// to the protocol. By default a window is always found and every key event
/// succeeds.
#[derive(Debug, Clone, Default)]
pub struct TestSink {
    state: Arc<Mutex<TestSinkState>>,
}

impl TestSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TestSinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Simulate the game window being closed (or open again).
    pub fn set_window_missing(&self, missing: bool) {
        self.lock().window_missing = missing;
    }

    /// Make every event for `key` fail.
    pub fn fail_on(&self, key: Option<VirtualKey>) {
        self.lock().fail_key = key;
    }

    /// All recorded operations.
    pub fn operations(&self) -> Vec<SinkOp> {
        self.lock().ops.clone()
    }

    /// Only the key transitions, in order.
    pub fn key_events(&self) -> Vec<(VirtualKey, bool)> {
        self.lock()
            .ops
            .iter()
            .filter_map(|op| match op {
                SinkOp::Key { key, down } => Some((*key, *down)),
                _ => None,
            })
            .collect()
    }

    /// Non-modifier keys pressed, in order.
    pub fn presses(&self) -> Vec<VirtualKey> {
        self.key_events()
            .into_iter()
            .filter(|(key, down)| *down && !key.is_modifier())
            .map(|(key, _)| key)
            .collect()
    }

    /// Count operations matching a predicate.
    pub fn count<F: Fn(&SinkOp) -> bool>(&self, f: F) -> usize {
        self.lock().ops.iter().filter(|op| f(op)).count()
    }

    pub fn clear(&self) {
        self.lock().ops.clear();
    }
}

impl KeySink for TestSink {
    fn find_target(&mut self) -> Option<WindowHandle> {
        let mut state = self.lock();
        let found = !state.window_missing;
        state.ops.push(SinkOp::Find { found });
        found.then_some(1)
    }

    fn focus(&mut self, _target: WindowHandle) -> bool {
        self.lock().ops.push(SinkOp::Focus);
        true
    }

    fn key_event(&mut self, _target: WindowHandle, key: VirtualKey, down: bool) -> bool {
        let mut state = self.lock();
        state.ops.push(SinkOp::Key { key, down });
        state.fail_key != Some(key)
    }
}
