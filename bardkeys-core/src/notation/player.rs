//! Real-time notation playback through the keystroke protocol.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bardkeys_types::{DurationRatio, NotationItem};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

use super::{decode, PLAYBACK_QUARTER_SECS};
use crate::error::NotationError;
use crate::keymap::NoteActionMap;
use crate::output::KeystrokeOutput;

/// How decoded lengths turn into wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackTiming {
    pub quarter_secs: f64,
    /// Shortest time a key is held, however short the note.
    pub min_hold_secs: f64,
    /// Silence carved from the end of each note.
    pub release_gap_secs: f64,
}

impl Default for PlaybackTiming {
    fn default() -> Self {
        Self {
            quarter_secs: PLAYBACK_QUARTER_SECS,
            min_hold_secs: 0.05,
            release_gap_secs: 0.02,
        }
    }
}

impl PlaybackTiming {
    pub fn with_quarter_secs(quarter_secs: f64) -> Self {
        Self {
            quarter_secs,
            ..Self::default()
        }
    }

    pub fn length_secs(&self, duration: DurationRatio) -> f64 {
        duration.as_f64() * self.quarter_secs
    }

    /// Key-down time for a note of `total` seconds.
    pub fn hold_secs(&self, total: f64) -> f64 {
        (total - self.release_gap_secs)
            .min(total * 0.9)
            .max(self.min_hold_secs)
    }
}

/// Waits that end early when a stop is requested.
struct Pacer {
    stop: Receiver<()>,
}

impl Pacer {
    /// Returns false once stopped.
    fn wait(&self, secs: f64) -> bool {
        if secs <= 0.0 {
            return self.stop.try_recv().is_err();
        }
        match self.stop.recv_timeout(Duration::from_secs_f64(secs)) {
            Err(RecvTimeoutError::Timeout) => true,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }
}

/// Releases modifiers and flags completion however playback ends.
struct PlaybackGuard {
    output: Arc<KeystrokeOutput>,
    finished: Arc<AtomicBool>,
}

impl Drop for PlaybackGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            log::error!(target: "notation", "playback thread panicked");
        }
        self.output.reset_modifiers();
        self.finished.store(true, Ordering::SeqCst);
    }
}

/// A notation piece playing on its own thread.
pub struct NotationPlayer {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<usize>>,
    finished: Arc<AtomicBool>,
}

impl NotationPlayer {
    /// Decode `text` and start playing it. Fails up front if there is
    /// nothing to play.
    pub fn start(
        text: &str,
        output: Arc<KeystrokeOutput>,
        keymap: Arc<NoteActionMap>,
        timing: PlaybackTiming,
    ) -> Result<Self, NotationError> {
        let items = decode(text);
        if !items.iter().any(|i| i.note().is_some()) {
            return Err(NotationError::NoPlayableNotes);
        }

        let (stop_tx, stop_rx) = bounded(1);
        let finished = Arc::new(AtomicBool::new(false));
        let guard = PlaybackGuard {
            output: Arc::clone(&output),
            finished: Arc::clone(&finished),
        };

        let handle = thread::Builder::new()
            .name("notation-playback".into())
            .spawn(move || {
                let played = play(&items, &output, &keymap, &timing, &Pacer { stop: stop_rx });
                drop(guard);
                played
            })
            .map_err(NotationError::Spawn)?;

        log::info!(target: "notation", "playback started");
        Ok(Self {
            stop: Some(stop_tx),
            handle: Some(handle),
            finished,
        })
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Ask playback to stop; takes effect within one note.
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop.take() {
            let _ = tx.try_send(());
        }
    }

    /// Block until playback ends. Returns the number of notes sent.
    pub fn wait(mut self) -> usize {
        self.join()
    }

    fn join(&mut self) -> usize {
        match self.handle.take().map(JoinHandle::join) {
            Some(Ok(played)) => played,
            Some(Err(_)) => {
                log::warn!(target: "notation", "playback thread ended with a panic");
                0
            }
            None => 0,
        }
    }
}

impl Drop for NotationPlayer {
    fn drop(&mut self) {
        self.stop();
        self.join();
    }
}

fn play(
    items: &[NotationItem],
    output: &KeystrokeOutput,
    keymap: &NoteActionMap,
    timing: &PlaybackTiming,
    pacer: &Pacer,
) -> usize {
    let mut played = 0;
    for item in items {
        let total = timing.length_secs(item.duration());
        let running = match *item {
            NotationItem::Rest { .. } => pacer.wait(total),
            NotationItem::Note { note, .. } => match keymap.lookup(note) {
                Some(action) => {
                    log::debug!(target: "notation", "{} -> {} ({:.2}s)", note.name(), action.label(), total);
                    output.send(action, true);
                    let hold = timing.hold_secs(total);
                    let running = pacer.wait(hold);
                    output.send(action, false);
                    played += 1;
                    running && pacer.wait(total - hold)
                }
                None => {
                    log::info!(target: "notation", "no key for {}, skipping", note.name());
                    pacer.wait(total)
                }
            },
        };
        if !running {
            log::info!(target: "notation", "playback stopped after {} notes", played);
            return played;
        }
    }
    log::info!(target: "notation", "finished playing {} notes", played);
    played
}
