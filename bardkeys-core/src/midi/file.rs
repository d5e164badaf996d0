//! Standard MIDI Files as an input source.
//!
//! A file is flattened into one chronological list of [`InputEvent`]s with
//! absolute times, merging all tracks and following tempo changes from any
//! of them. The list can then be replayed in real time into the router or
//! converted to notation.

use std::path::Path;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bardkeys_types::InputEvent;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};

use crate::error::NotationError;

/// 120 bpm.
const DEFAULT_US_PER_QUARTER: u64 = 500_000;

/// One event at an absolute position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedEvent {
    pub tick: u64,
    pub at: Duration,
    pub event: InputEvent,
}

/// Tempo changes in tick order, for tick to wall-clock conversion.
struct TempoMap {
    /// (first tick, microseconds per quarter) in tick order
    segments: Vec<(u64, u64)>,
    /// Ticks per quarter, or per second for timecode files.
    ticks_per_unit: u64,
}

impl TempoMap {
    fn new(timing: Timing, mut changes: Vec<(u64, u32)>) -> Self {
        match timing {
            Timing::Metrical(tpq) => {
                changes.sort_by_key(|(tick, _)| *tick);
                let mut segments = vec![(0, DEFAULT_US_PER_QUARTER)];
                for (tick, us_per_quarter) in changes {
                    let us_per_quarter = us_per_quarter as u64;
                    match segments.last_mut() {
                        Some(last) if last.0 == tick => last.1 = us_per_quarter,
                        _ => segments.push((tick, us_per_quarter)),
                    }
                }
                Self {
                    segments,
                    ticks_per_unit: tpq.as_int().max(1) as u64,
                }
            }
            // Tempo meta events have no effect on timecode files.
            Timing::Timecode(fps, subframes) => Self {
                segments: vec![(0, 1_000_000)],
                ticks_per_unit: (fps.as_int() as u64 * subframes as u64).max(1),
            },
        }
    }

    fn to_duration(&self, tick: u64) -> Duration {
        let mut us: u128 = 0;
        for (i, &(start, rate)) in self.segments.iter().enumerate() {
            if tick <= start {
                break;
            }
            let end = self
                .segments
                .get(i + 1)
                .map_or(tick, |next| next.0.min(tick));
            us += (end - start) as u128 * rate as u128;
        }
        let us = us / self.ticks_per_unit as u128;
        Duration::from_micros(us.min(u64::MAX as u128) as u64)
    }
}

/// A parsed file, flattened.
#[derive(Debug, Clone)]
pub struct MidiTimeline {
    pub events: Vec<TimedEvent>,
    /// Resolution, 480 for timecode-based files.
    pub ticks_per_quarter: u16,
    pub tracks: usize,
    pub length: Duration,
}

impl MidiTimeline {
    pub fn parse(bytes: &[u8]) -> Result<Self, NotationError> {
        let smf = Smf::parse(bytes).map_err(|e| NotationError::MidiParse(e.to_string()))?;

        let ticks_per_quarter = match smf.header.timing {
            Timing::Metrical(tpq) => tpq.as_int(),
            Timing::Timecode(..) => 480,
        };

        let mut tempo_changes = Vec::new();
        let mut raw = Vec::new();
        for track in &smf.tracks {
            let mut tick = 0u64;
            for ev in track {
                tick += ev.delta.as_int() as u64;
                match ev.kind {
                    TrackEventKind::Meta(MetaMessage::Tempo(t)) => {
                        tempo_changes.push((tick, t.as_int()));
                    }
                    TrackEventKind::Midi { message, .. } => {
                        let event = match message {
                            MidiMessage::NoteOn { key, vel } => InputEvent::NoteOn {
                                note: key.as_int(),
                                velocity: vel.as_int(),
                            }
                            .normalized(),
                            MidiMessage::NoteOff { key, .. } => InputEvent::NoteOff { note: key.as_int() },
                            MidiMessage::Controller { controller, value } => InputEvent::ControlChange {
                                controller: controller.as_int(),
                                value: value.as_int(),
                            },
                            _ => continue,
                        };
                        raw.push((tick, event));
                    }
                    _ => {}
                }
            }
        }

        // Stable sort keeps per-track order for simultaneous events.
        raw.sort_by_key(|(tick, _)| *tick);
        let tempo = TempoMap::new(smf.header.timing, tempo_changes);
        let events: Vec<TimedEvent> = raw
            .into_iter()
            .map(|(tick, event)| TimedEvent {
                tick,
                at: tempo.to_duration(tick),
                event,
            })
            .collect();
        let length = events.last().map_or(Duration::ZERO, |e| e.at);

        Ok(Self {
            events,
            ticks_per_quarter,
            tracks: smf.tracks.len(),
            length,
        })
    }

    pub fn load(path: &Path) -> Result<Self, NotationError> {
        let bytes = std::fs::read(path).map_err(|e| NotationError::io(path, e))?;
        Self::parse(&bytes)
    }

    pub fn note_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.event, InputEvent::NoteOn { .. }))
            .count()
    }
}

/// Replays a timeline in real time on its own thread, sending each event
/// down a channel as it falls due.
pub struct MidiFilePlayer {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<usize>>,
}

impl MidiFilePlayer {
    /// `speed` scales playback rate: 2.0 plays twice as fast.
    pub fn start<T>(timeline: MidiTimeline, speed: f64, tx: Sender<T>) -> Result<Self, NotationError>
    where
        T: From<InputEvent> + Send + 'static,
    {
        let speed = if speed > 0.0 { speed } else { 1.0 };
        let (stop_tx, stop_rx) = bounded(1);
        let handle = thread::Builder::new()
            .name("midi-file-playback".into())
            .spawn(move || replay(&timeline, speed, &stop_rx, &tx))
            .map_err(NotationError::Spawn)?;
        Ok(Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.stop.take() {
            let _ = tx.try_send(());
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Block until playback ends. Returns the number of events delivered.
    pub fn wait(mut self) -> usize {
        self.handle.take().and_then(|h| h.join().ok()).unwrap_or(0)
    }
}

impl Drop for MidiFilePlayer {
    fn drop(&mut self) {
        self.stop();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

fn replay<T: From<InputEvent>>(
    timeline: &MidiTimeline,
    speed: f64,
    stop: &Receiver<()>,
    tx: &Sender<T>,
) -> usize {
    let start = Instant::now();
    let mut sent = 0;
    for timed in &timeline.events {
        let due = start + timed.at.div_f64(speed);
        let now = Instant::now();
        if due > now {
            match stop.recv_timeout(due - now) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        } else if stop.try_recv().is_ok() {
            break;
        }
        if tx.send(T::from(timed.event)).is_err() {
            log::warn!(target: "midi", "router gone, stopping file playback");
            break;
        }
        sent += 1;
    }
    log::info!(target: "midi", "file playback finished, {} events", sent);
    sent
}
