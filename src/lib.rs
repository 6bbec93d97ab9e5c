//! Plays MIDI scores as timed key presses.
//!
//! A scheduler thread walks a merged note timeline in real time and hands each
//! note to a [`KeyEmitter`]. The control surface steers it through the shared
//! [`PlaybackState`], and reconfigures the active tracks mid-song through the
//! mixer handshake.

pub mod config;
pub mod emitter;
pub mod engine;
pub mod error;
pub mod events;
pub mod handshake;
pub mod mixer;
pub mod playlist;
pub mod score;
pub mod selection;
pub mod state;
pub mod timing;
pub mod ui;

pub use config::Config;
pub use emitter::{KeyEmitter, LogEmitter, MidiOutEmitter, NoteKeyMap};
pub use engine::{EngineHandle, EngineOptions, spawn_engine};
pub use events::{ControlCommand, EngineUpdate, PlayStatus, Progress};
pub use mixer::{MixerSession, TrackSummary};
pub use score::{MemoryDecoder, MidiFileDecoder, ScoreDecoder, ScoreFile, Track};
pub use selection::{
    MemorySelectionStore, PersistedSelection, RonSelectionStore, SelectionStore,
};
pub use state::{NowPlaying, PlaybackState, TrackSource};
pub use ui::ControlSurface;
