mod dashboard;
mod menu;

pub use dashboard::{
    BAR_WIDTH, HOTKEY_LEGEND, format_time, now_playing_header, progress_bar, source_label,
    status_label, status_line,
};
pub use menu::{PlaylistChoice, render_mixer, run_mixer, select_playlist};

use crate::engine::EngineHandle;
use crate::error::{MixerError, UiError};
use crate::events::{ControlCommand, EngineUpdate};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{self, ClearType, disable_raw_mode, enable_raw_mode};
use crossterm::{cursor, execute};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

const KEY_POLL: Duration = Duration::from_millis(100);

/// Hotkey bindings of the dashboard.
pub fn map_key(key: KeyEvent) -> Option<ControlCommand> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    let command = match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => ControlCommand::Stop,
        KeyCode::Right => ControlCommand::NextSong,
        KeyCode::Left => ControlCommand::PrevSong,
        KeyCode::Up => ControlCommand::SpeedUp,
        KeyCode::Down => ControlCommand::SpeedDown,
        KeyCode::PageDown => ControlCommand::SeekForward,
        KeyCode::PageUp => ControlCommand::SeekBack,
        KeyCode::F(3) => ControlCommand::TogglePause,
        KeyCode::F(4) => ControlCommand::Stop,
        KeyCode::F(5) => ControlCommand::OpenMenu,
        KeyCode::F(6) => ControlCommand::ToggleMute,
        KeyCode::F(7) => ControlCommand::OpenMixer,
        KeyCode::Char('l') | KeyCode::Char('L') => ControlCommand::ToggleLoop,
        _ => return None,
    };
    Some(command)
}

/// Leaves raw mode when dropped, including on early return.
struct RawMode {
    enabled: bool,
}

impl RawMode {
    fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self { enabled: true })
    }

    fn suspend(&mut self) -> io::Result<()> {
        if self.enabled {
            disable_raw_mode()?;
            self.enabled = false;
        }
        Ok(())
    }

    fn resume(&mut self) -> io::Result<()> {
        if !self.enabled {
            enable_raw_mode()?;
            self.enabled = true;
        }
        Ok(())
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if self.enabled {
            let _ = disable_raw_mode();
        }
    }
}

/// Terminal front end: hotkeys, the status line and the menus.
pub struct ControlSurface {
    engine: EngineHandle,
    midi_root: PathBuf,
    status: String,
}

impl ControlSurface {
    pub fn new(engine: EngineHandle, midi_root: PathBuf) -> Self {
        Self {
            engine,
            midi_root,
            status: String::new(),
        }
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    /// Runs the playlist menu in cooked mode and applies the choice.
    pub fn open_menu(&mut self) -> Result<(), UiError> {
        let state = self.engine.state().clone();
        let was_paused = state.is_paused();
        state.set_paused(true);

        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut output = io::stdout();
        match select_playlist(&mut input, &mut output, &self.midi_root)? {
            Some(choice) => {
                tracing::info!(folder = %choice.folder, songs = choice.songs.len(), "playlist selected");
                self.engine.set_playlist(choice.songs, choice.start_index);
            }
            None => state.set_paused(was_paused),
        }
        Ok(())
    }

    /// Suspends playback, runs the mixer in cooked mode and commits it.
    pub fn open_mixer(&mut self) -> Result<(), UiError> {
        let mut session = match self.engine.open_mixer() {
            Ok(session) => session,
            Err(e @ (MixerError::NoSong | MixerError::Timeout)) => {
                tracing::warn!(error = %e, "mixer unavailable");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut output = io::stdout();
        if let Err(e) = run_mixer(&mut input, &mut output, &mut session) {
            self.engine.cancel_mixer();
            return Err(e.into());
        }
        self.engine.commit_mixer(session)?;
        Ok(())
    }

    /// Main loop. Returns once the engine stops.
    pub fn run(&mut self) -> Result<(), UiError> {
        let mut raw = RawMode::enable()?;

        while self.engine.is_running() {
            self.drain_updates()?;

            if !event::poll(KEY_POLL)? {
                continue;
            }
            let Event::Key(key) = event::read()? else {
                continue;
            };
            let Some(command) = map_key(key) else {
                continue;
            };

            match command {
                ControlCommand::OpenMenu | ControlCommand::OpenMixer => {
                    raw.suspend()?;
                    println!();
                    let result = if command == ControlCommand::OpenMenu {
                        self.open_menu()
                    } else {
                        self.open_mixer()
                    };
                    if let Err(e) = result {
                        tracing::error!(error = %e, "menu failed");
                    }
                    raw.resume()?;
                }
                command => self.engine.send(command),
            }
        }

        self.drain_updates()?;
        raw.suspend()?;
        println!();
        Ok(())
    }

    fn drain_updates(&mut self) -> io::Result<()> {
        let updates: Vec<EngineUpdate> = self.engine.updates().try_iter().collect();
        for update in updates {
            match update {
                EngineUpdate::NowPlaying(now) => {
                    let playlist_len = self.engine.state().playlist().len();
                    let mut stdout = io::stdout();
                    execute!(stdout, cursor::MoveToColumn(0), terminal::Clear(ClearType::CurrentLine))?;
                    for line in now_playing_header(&now, playlist_len) {
                        write!(stdout, "{line}\r\n")?;
                    }
                    self.status.clear();
                }
                EngineUpdate::Progress(progress) => {
                    let line = status_line(&progress);
                    if line != self.status {
                        let mut stdout = io::stdout();
                        execute!(stdout, cursor::MoveToColumn(0), terminal::Clear(ClearType::CurrentLine))?;
                        write!(stdout, "{line}")?;
                        stdout.flush()?;
                        self.status = line;
                    }
                }
                EngineUpdate::SongSkipped { path, reason, .. } => {
                    let mut stdout = io::stdout();
                    execute!(stdout, cursor::MoveToColumn(0), terminal::Clear(ClearType::CurrentLine))?;
                    write!(stdout, "Skipped {}: {reason}\r\n", path.display())?;
                }
                EngineUpdate::SongFinished { .. } => {}
                EngineUpdate::Stopped => {
                    tracing::debug!("engine reported stop");
                }
            }
        }
        Ok(())
    }
}
