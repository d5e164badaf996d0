//! Error types for the fallible edges of the engine: files, configuration
//! and MIDI devices. Keystroke delivery itself never returns an error; see
//! [`crate::output`].

use std::path::PathBuf;

use bardkeys_types::ParseNameError;
use thiserror::Error;

/// Failure while reading, writing or converting notation and MIDI files.
#[derive(Debug, Error)]
pub enum NotationError {
    #[error("notation contains no playable notes")]
    NoPlayableNotes,

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not start playback thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("invalid MIDI file: {0}")]
    MidiParse(String),

    #[error("could not encode MIDI file: {0}")]
    MidiEncode(String),
}

impl NotationError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        NotationError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Invalid configuration. Raised when settings are built, not when they are used.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    UnknownName(#[from] ParseNameError),

    #[error("arp_octaves must be between 1 and {max}, got {value}")]
    OctavesOutOfRange { value: u8, max: u8 },

    #[error("bpm must be between {min} and {max}, got {value}")]
    BpmOutOfRange { value: u32, min: u32, max: u32 },

    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("could not read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Failure to open a live MIDI input.
#[derive(Debug, Error)]
pub enum MidiInputError {
    #[error("MIDI backend unavailable: {0}")]
    Init(String),

    #[error("no MIDI input ports found")]
    NoPorts,

    #[error("no MIDI input port matching '{0}'")]
    PortNotFound(String),

    #[error("could not connect to '{port}': {reason}")]
    Connect { port: String, reason: String },
}
