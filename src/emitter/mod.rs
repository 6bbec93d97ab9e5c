//! Where sounding notes leave the engine.
//!
//! The scheduler calls [`KeyEmitter::emit`] once per (tick, pitch), in tick
//! order, only for pitches in the [`NoteKeyMap`], and never while muted. A
//! failed emit is logged and dropped; it never stalls the timeline.

mod keymap;
mod midi_out;

pub use keymap::{KeyStroke, Modifier, NoteKeyMap};
pub use midi_out::{MidiOutEmitter, list_output_ports};

use crate::error::EmitError;

pub trait KeyEmitter: Send {
    fn emit(&mut self, pitch: u8) -> Result<(), EmitError>;
}

impl<F> KeyEmitter for F
where
    F: FnMut(u8) -> Result<(), EmitError> + Send,
{
    fn emit(&mut self, pitch: u8) -> Result<(), EmitError> {
        self(pitch)
    }
}

/// Dry-run emitter: logs the key stroke each note maps to.
pub struct LogEmitter {
    keymap: NoteKeyMap,
}

impl LogEmitter {
    pub fn new(keymap: NoteKeyMap) -> Self {
        Self { keymap }
    }
}

impl KeyEmitter for LogEmitter {
    fn emit(&mut self, pitch: u8) -> Result<(), EmitError> {
        match self.keymap.get(pitch) {
            Some(stroke) => tracing::info!(pitch, key = %stroke, "note"),
            None => tracing::debug!(pitch, "unmapped note"),
        }
        Ok(())
    }
}
