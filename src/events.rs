use crate::state::NowPlaying;
use std::path::PathBuf;

/// Discrete commands the control surface issues.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlCommand {
    NextSong,
    PrevSong,
    TogglePause,
    ToggleMute,
    ToggleLoop,
    SpeedUp,
    SpeedDown,
    SetSpeed(f64),
    /// Relative seek in seconds of score time.
    Seek(f64),
    SeekForward,
    SeekBack,
    OpenMixer,
    OpenMenu,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayStatus {
    Seeking,
    Paused,
    Muted,
    Looping,
    Playing,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub position_secs: f64,
    pub total_secs: f64,
    pub status: PlayStatus,
    pub speed: f64,
}

/// Scheduler -> control surface notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineUpdate {
    NowPlaying(NowPlaying),
    Progress(Progress),
    SongSkipped {
        index: usize,
        path: PathBuf,
        reason: String,
    },
    SongFinished {
        index: usize,
    },
    Stopped,
}
