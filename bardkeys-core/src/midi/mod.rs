//! MIDI input: live controller ports through `midir` and Standard MIDI
//! Files through [`file`]. Both produce [`InputEvent`]s.

pub mod file;

use bardkeys_types::InputEvent;
use crossbeam_channel::Sender;
use midir::{MidiInput, MidiInputConnection};

use crate::error::MidiInputError;

pub use file::{MidiFilePlayer, MidiTimeline, TimedEvent};

const CLIENT_NAME: &str = "bardkeys";

/// Information about an available MIDI port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiPortInfo {
    pub index: usize,
    pub name: String,
}

/// Put ports whose name contains `preferred` (case-insensitive) first,
/// keeping the original order within each group.
pub fn order_ports(ports: &[MidiPortInfo], preferred: &str) -> Vec<MidiPortInfo> {
    let needle = preferred.to_uppercase();
    let matches = |p: &MidiPortInfo| !needle.is_empty() && p.name.to_uppercase().contains(&needle);
    let (mut first, rest): (Vec<_>, Vec<_>) = ports.iter().cloned().partition(|p| matches(p));
    first.extend(rest);
    first
}

/// Live MIDI input manager
pub struct MidiInputManager {
    midi_in: Option<MidiInput>,
    connection: Option<MidiInputConnection<()>>,
    connected_port_name: Option<String>,
    available_ports: Vec<MidiPortInfo>,
}

impl MidiInputManager {
    pub fn new() -> Self {
        let midi_in = match MidiInput::new(CLIENT_NAME) {
            Ok(m) => Some(m),
            Err(e) => {
                log::warn!(target: "midi", "MIDI input unavailable: {}", e);
                None
            }
        };
        Self {
            midi_in,
            connection: None,
            connected_port_name: None,
            available_ports: Vec::new(),
        }
    }

    /// Refresh the list of available MIDI input ports
    pub fn refresh_ports(&mut self) {
        self.available_ports.clear();

        if let Some(ref midi_in) = self.midi_in {
            for (index, port) in midi_in.ports().iter().enumerate() {
                if let Ok(name) = midi_in.port_name(port) {
                    self.available_ports.push(MidiPortInfo { index, name });
                }
            }
        }
        log::debug!(target: "midi", "found {} input ports", self.available_ports.len());
    }

    pub fn list_ports(&self) -> &[MidiPortInfo] {
        &self.available_ports
    }

    /// Pick a port: an exact or substring match for `requested` if given,
    /// otherwise the first port whose name contains `preferred`, otherwise
    /// the first port.
    pub fn select_port(&self, requested: Option<&str>, preferred: &str) -> Result<MidiPortInfo, MidiInputError> {
        if self.available_ports.is_empty() {
            return Err(MidiInputError::NoPorts);
        }
        if let Some(want) = requested {
            let want_upper = want.to_uppercase();
            return self
                .available_ports
                .iter()
                .find(|p| p.name == want)
                .or_else(|| {
                    self.available_ports
                        .iter()
                        .find(|p| p.name.to_uppercase().contains(&want_upper))
                })
                .cloned()
                .ok_or_else(|| MidiInputError::PortNotFound(want.to_string()));
        }
        order_ports(&self.available_ports, preferred)
            .into_iter()
            .next()
            .ok_or(MidiInputError::NoPorts)
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn connected_port_name(&self) -> Option<&str> {
        self.connected_port_name.as_deref()
    }

    /// Connect to a port by index and forward every recognised message to
    /// `tx`. The callback runs on the backend's thread.
    pub fn connect<T>(&mut self, port_index: usize, tx: Sender<T>) -> Result<(), MidiInputError>
    where
        T: From<InputEvent> + Send + 'static,
    {
        self.disconnect();

        // midir consumes the MidiInput on connect.
        let midi_in = MidiInput::new(CLIENT_NAME).map_err(|e| MidiInputError::Init(e.to_string()))?;
        let ports = midi_in.ports();
        let port = ports
            .get(port_index)
            .ok_or_else(|| MidiInputError::PortNotFound(format!("#{}", port_index)))?;
        let port_name = midi_in
            .port_name(port)
            .unwrap_or_else(|_| "Unknown".to_string());

        let connection = midi_in
            .connect(
                port,
                "bardkeys-input",
                move |_timestamp, message, _| {
                    if let Some(event) = parse_midi_message(message) {
                        let _ = tx.send(T::from(event));
                    }
                },
                (),
            )
            .map_err(|e| MidiInputError::Connect {
                port: port_name.clone(),
                reason: e.to_string(),
            })?;

        log::info!(target: "midi", "listening on {}", port_name);
        self.connection = Some(connection);
        self.connected_port_name = Some(port_name);
        self.midi_in = MidiInput::new(CLIENT_NAME).ok();
        Ok(())
    }

    pub fn disconnect(&mut self) {
        if let Some(conn) = self.connection.take() {
            conn.close();
            if let Some(name) = self.connected_port_name.take() {
                log::info!(target: "midi", "closed {}", name);
            }
        }
        self.connected_port_name = None;
    }
}

impl Default for MidiInputManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MidiInputManager {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Parse a raw MIDI message. Only notes and controllers matter here; the
/// channel is ignored.
pub fn parse_midi_message(data: &[u8]) -> Option<InputEvent> {
    let (&status, rest) = data.split_first()?;
    match (status & 0xF0, rest) {
        (0x80, [note, _, ..]) => Some(InputEvent::NoteOff { note: *note }),
        (0x90, [note, velocity, ..]) => Some(
            InputEvent::NoteOn {
                note: *note,
                velocity: *velocity,
            }
            .normalized(),
        ),
        (0xB0, [controller, value, ..]) => Some(InputEvent::ControlChange {
            controller: *controller,
            value: *value,
        }),
        _ => None,
    }
}
