use std::path::PathBuf;

/// The score file could not be read or understood. Never fatal: the engine
/// skips the song.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed MIDI data: {0}")]
    Parse(#[from] midly::Error),

    #[error("SMPTE timecode timing is not supported")]
    UnsupportedTiming,

    #[error("no score registered for {0}")]
    Missing(PathBuf),
}

/// A timeline could not be produced from an otherwise valid score.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("score has no tracks")]
    NoTracks,

    #[error("no selected or fallback track contains notes")]
    EmptySelection,
}

#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    #[error("output port error: {0}")]
    Port(String),

    #[error("failed to send note {pitch}: {reason}")]
    Send { pitch: u8, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("selection store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize selections: {0}")]
    Serialize(#[from] ron::Error),

    #[error("failed to parse selections: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] ron::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, thiserror::Error)]
pub enum MixerError {
    #[error("no song is loaded")]
    NoSong,

    #[error("scheduler did not pause for the mixer in time")]
    Timeout,

    #[error("engine stopped")]
    Stopped,

    #[error("a mixer session is already open")]
    AlreadyOpen,

    #[error("no mixer session is open")]
    NotOpen,

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum PlaylistError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no MIDI files under {0}")]
    Empty(PathBuf),
}

/// Failures of the interactive control surface.
#[derive(Debug, thiserror::Error)]
pub enum UiError {
    #[error("terminal I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Playlist(#[from] PlaylistError),

    #[error(transparent)]
    Mixer(#[from] MixerError),
}
