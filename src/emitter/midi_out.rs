use super::KeyEmitter;
use crate::error::EmitError;
use midir::{MidiOutput, MidiOutputConnection};
use std::time::Duration;

const CLIENT_NAME: &str = "bardbox";
const NOTE_ON: u8 = 0x90;
const NOTE_OFF: u8 = 0x80;

pub fn list_output_ports() -> Result<Vec<String>, EmitError> {
    let midi_out = MidiOutput::new(CLIENT_NAME).map_err(|e| EmitError::Port(e.to_string()))?;
    Ok(midi_out
        .ports()
        .iter()
        .filter_map(|port| midi_out.port_name(port).ok())
        .collect())
}

/// Plays each note on a MIDI output port: note-on, optional hold, note-off.
pub struct MidiOutEmitter {
    connection: MidiOutputConnection,
    channel: u8,
    velocity: u8,
    hold: Duration,
}

impl MidiOutEmitter {
    /// Connects to the first output port whose name contains `port_match`
    /// (case-insensitive).
    pub fn connect(port_match: &str, hold: Duration) -> Result<Self, EmitError> {
        let pattern = port_match.to_lowercase();
        let midi_out = MidiOutput::new(CLIENT_NAME).map_err(|e| EmitError::Port(e.to_string()))?;

        let ports = midi_out.ports();
        let port = ports
            .iter()
            .find(|port| {
                midi_out
                    .port_name(port)
                    .map(|name| name.to_lowercase().contains(&pattern))
                    .unwrap_or(false)
            })
            .ok_or_else(|| EmitError::Port(format!("no output port matching '{port_match}'")))?;

        let name = midi_out
            .port_name(port)
            .map_err(|e| EmitError::Port(e.to_string()))?;
        let connection = midi_out
            .connect(port, "bardbox-out")
            .map_err(|e| EmitError::Port(e.to_string()))?;

        tracing::info!(port = %name, "connected MIDI output");

        Ok(Self {
            connection,
            channel: 0,
            velocity: 100,
            hold,
        })
    }

    fn send(&mut self, pitch: u8, message: [u8; 3]) -> Result<(), EmitError> {
        self.connection
            .send(&message)
            .map_err(|e| EmitError::Send {
                pitch,
                reason: e.to_string(),
            })
    }
}

impl KeyEmitter for MidiOutEmitter {
    fn emit(&mut self, pitch: u8) -> Result<(), EmitError> {
        let pitch = pitch & 0x7F;
        self.send(pitch, [NOTE_ON | self.channel, pitch, self.velocity])?;
        if !self.hold.is_zero() {
            std::thread::sleep(self.hold);
        }
        self.send(pitch, [NOTE_OFF | self.channel, pitch, 0])
    }
}
