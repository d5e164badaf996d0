//! # bardkeys-core
//!
//! Engine that turns a musical performance into keystrokes for a game
//! window. Notes arrive from a MIDI controller, a MIDI file or text notation,
//! are shaped into single notes, chords or arpeggios, and leave as carefully
//! sequenced key and modifier events.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bardkeys_core::config::Config;
//! use bardkeys_core::keymap::NoteActionMap;
//! use bardkeys_core::output::{DryRunSink, KeystrokeOutput};
//! use bardkeys_core::router::{Command, EventRouter};
//!
//! let config = Config::load();
//! let output = Arc::new(KeystrokeOutput::new(Box::new(DryRunSink::new())));
//! let keymap = Arc::new(NoteActionMap::new());
//! let mut router = EventRouter::new(output, keymap, config.session_settings()?);
//!
//! let (tx, rx) = crossbeam_channel::unbounded::<Command>();
//! // hand `tx` to a MIDI input or file player, then:
//! router.run(rx);
//! ```
//!
//! ## Module Overview
//!
//! - [`keymap`]: the fixed note to keystroke table
//! - [`output`]: `KeystrokeOutput`, the serialized keystroke protocol, and
//!   the `KeySink` backends it drives
//! - [`chord`]: chord voicing and the active chord
//! - [`arp`]: held-note set, sequence generation and the timed playback loop
//! - [`notation`]: ABC-style recording, decoding, playback and MIDI conversion
//! - [`router`]: `EventRouter`, mode dispatch and control notes
//! - [`midi`]: live controller input and MIDI file timelines
//! - [`spectrum`]: per-key intensity levels
//! - [`config`]: TOML configuration (embedded defaults + user override)
//! - [`error`]: error types

pub mod arp;
pub mod chord;
pub mod config;
pub mod error;
pub mod keymap;
pub mod midi;
pub mod notation;
pub mod output;
pub mod router;
pub mod spectrum;
