use crate::config::Config;
use crate::emitter::{KeyEmitter, NoteKeyMap};
use crate::error::MixerError;
use crate::events::{ControlCommand, EngineUpdate};
use crate::handshake::{self, ControlHandshake, SchedulerHandshake, SignalWait};
use crate::mixer::MixerSession;
use crate::score::ScoreDecoder;
use crate::selection::{PersistedSelection, SelectionStore, selection_key};
use crate::state::{DEFAULT_SPEED, NowPlaying, PlaybackState, TrackSource};
use crate::timing::{BuiltTimeline, Interruption, Phase, PlaybackScheduler, TimelineBuilder};
use crossbeam::channel::{Receiver, Sender};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const UPDATE_CAPACITY: usize = 1024;

/// Timing and input tuning for the engine. Usually derived from [`Config`].
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub keymap: NoteKeyMap,
    pub poll_interval: Duration,
    pub strum_delay: Duration,
    pub song_cooldown: Duration,
    pub handshake_timeout: Duration,
    pub speed_step: f64,
    pub seek_step_secs: f64,
}

impl From<&Config> for EngineOptions {
    fn from(config: &Config) -> Self {
        Self {
            keymap: config.keymap.clone(),
            poll_interval: config.poll_interval(),
            strum_delay: config.chord_strum_delay(),
            song_cooldown: config.song_cooldown(),
            handshake_timeout: config.handshake_timeout(),
            speed_step: config.speed_step,
            seek_step_secs: config.seek_step_secs,
        }
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// Control-side view of a running engine. Dropping it stops the engine.
pub struct EngineHandle {
    state: Arc<PlaybackState>,
    update_rx: Receiver<EngineUpdate>,
    control: ControlHandshake,
    decoder: Arc<dyn ScoreDecoder>,
    store: Arc<dyn SelectionStore>,
    speed_step: f64,
    seek_step_secs: f64,
    handshake_timeout: Duration,
    mixer_open: bool,
    thread: Option<JoinHandle<()>>,
}

pub fn spawn_engine(
    state: Arc<PlaybackState>,
    emitter: Box<dyn KeyEmitter>,
    decoder: Arc<dyn ScoreDecoder>,
    store: Arc<dyn SelectionStore>,
    options: EngineOptions,
) -> EngineHandle {
    let (update_tx, update_rx) = crossbeam::channel::bounded(UPDATE_CAPACITY);
    let (scheduler_side, control_side) = handshake::handshake();

    let scheduler = PlaybackScheduler::new(state.clone(), emitter, options.keymap.clone())
        .with_poll_interval(options.poll_interval)
        .with_strum_delay(options.strum_delay)
        .with_updates(update_tx.clone());

    let engine = Engine {
        state: state.clone(),
        decoder: decoder.clone(),
        store: store.clone(),
        handshake: scheduler_side,
        poll_interval: scheduler.poll_interval(),
        scheduler,
        update_tx,
        song_cooldown: options.song_cooldown,
        loaded_path: None,
        timeline: None,
        failures: 0,
        stalled: false,
    };

    let thread = std::thread::spawn(move || {
        engine.run();
    });

    EngineHandle {
        state,
        update_rx,
        control: control_side,
        decoder,
        store,
        speed_step: options.speed_step,
        seek_step_secs: options.seek_step_secs,
        handshake_timeout: options.handshake_timeout,
        mixer_open: false,
        thread: Some(thread),
    }
}

impl EngineHandle {
    pub fn state(&self) -> &Arc<PlaybackState> {
        &self.state
    }

    pub fn updates(&self) -> &Receiver<EngineUpdate> {
        &self.update_rx
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn send(&self, command: ControlCommand) {
        tracing::debug!(?command, "control command");
        match command {
            ControlCommand::NextSong => self.state.next_song(),
            ControlCommand::PrevSong => self.state.prev_song(),
            ControlCommand::TogglePause => {
                self.state.toggle_pause();
            }
            ControlCommand::ToggleMute => {
                self.state.toggle_mute();
            }
            ControlCommand::ToggleLoop => {
                self.state.toggle_loop();
            }
            ControlCommand::SpeedUp => {
                let speed = self.state.adjust_speed(self.speed_step);
                self.persist_speed(speed);
            }
            ControlCommand::SpeedDown => {
                let speed = self.state.adjust_speed(-self.speed_step);
                self.persist_speed(speed);
            }
            ControlCommand::SetSpeed(speed) => {
                let speed = self.state.set_speed(speed);
                self.persist_speed(speed);
            }
            ControlCommand::Seek(delta) => self.state.request_seek(delta),
            ControlCommand::SeekForward => self.state.request_seek(self.seek_step_secs),
            ControlCommand::SeekBack => self.state.request_seek(-self.seek_step_secs),
            ControlCommand::Stop => self.state.stop(),
            ControlCommand::OpenMixer | ControlCommand::OpenMenu => {
                tracing::debug!(?command, "left to the control surface");
            }
        }
        self.state.notify();
    }

    /// Replaces the playlist and restarts on `start_index` at default speed.
    pub fn set_playlist(&self, playlist: Vec<PathBuf>, start_index: usize) {
        tracing::info!(songs = playlist.len(), start_index, "new playlist");
        self.state.set_playlist(playlist, start_index);
    }

    /// Stops the scheduler at its current tick and returns the track list of
    /// the current song.
    ///
    /// Every successful call must be followed by [`EngineHandle::commit_mixer`]
    /// or [`EngineHandle::cancel_mixer`], or playback stays suspended.
    pub fn open_mixer(&mut self) -> Result<MixerSession, MixerError> {
        if self.mixer_open {
            return Err(MixerError::AlreadyOpen);
        }
        if !self.state.is_running() {
            return Err(MixerError::Stopped);
        }
        if self.state.current_song().is_none() {
            return Err(MixerError::NoSong);
        }

        self.control.begin();
        self.state.set_paused(false);
        self.state.set_mixer_requested(true);

        match self.control.wait_scheduler_paused(self.handshake_timeout) {
            SignalWait::Received => {}
            SignalWait::TimedOut => {
                tracing::warn!("scheduler did not pause for the mixer");
                self.state.set_mixer_requested(false);
                return Err(MixerError::Timeout);
            }
            SignalWait::Disconnected => {
                self.state.set_mixer_requested(false);
                return Err(MixerError::Stopped);
            }
        }
        self.mixer_open = true;

        let Some((index, path)) = self.state.current_song() else {
            self.release_mixer();
            return Err(MixerError::NoSong);
        };
        tracing::debug!(
            index,
            resume = self.state.resume_from_tick(),
            "scheduler paused for mixer"
        );

        let score = match self.decoder.decode(&path) {
            Ok(score) => score,
            Err(e) => {
                self.release_mixer();
                return Err(e.into());
            }
        };
        let file_name = selection_key(&path);
        let saved = self.store.get(&file_name);
        Ok(MixerSession::new(file_name, &score, saved.as_ref()))
    }

    /// Stores the session's selection and lets the scheduler resume from where
    /// it stopped. The selection takes effect even if persisting it fails.
    pub fn commit_mixer(&mut self, session: MixerSession) -> Result<(), MixerError> {
        if !self.mixer_open {
            return Err(MixerError::NotOpen);
        }
        let file_name = session.file_name.clone();
        let tracks = session.into_selection();
        tracing::info!(file = %file_name, ?tracks, "mixer committed");

        let persisted = self.store.put(
            &file_name,
            PersistedSelection {
                tracks: tracks.clone(),
                speed: self.state.speed(),
            },
        );
        self.state.set_selected_tracks(Some(tracks));
        self.release_mixer();
        persisted.map_err(Into::into)
    }

    pub fn cancel_mixer(&mut self) {
        if self.mixer_open {
            self.release_mixer();
        }
    }

    pub fn shutdown(&mut self) {
        self.state.stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("engine thread panicked");
            }
        }
    }

    fn release_mixer(&mut self) {
        self.state.set_mixer_requested(false);
        self.control.finish_mixer();
        self.mixer_open = false;
    }

    fn persist_speed(&self, speed: f64) {
        let Some((_, path)) = self.state.current_song() else {
            return;
        };
        let file_name = selection_key(&path);
        let saved = self.store.get(&file_name);
        if saved.is_none() && speed == DEFAULT_SPEED {
            return;
        }
        // now_playing still describes the previous song until the next build
        let playing = self
            .state
            .now_playing()
            .filter(|now| now.path == path)
            .map(|now| now.tracks.clone());
        let Some(tracks) = saved.map(|s| s.tracks).or(playing) else {
            tracing::debug!(file = %file_name, "song not built yet, speed not persisted");
            return;
        };
        if let Err(e) = self
            .store
            .put(&file_name, PersistedSelection { tracks, speed })
        {
            tracing::warn!(file = %file_name, error = %e, "failed to persist speed");
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Engine {
    state: Arc<PlaybackState>,
    decoder: Arc<dyn ScoreDecoder>,
    store: Arc<dyn SelectionStore>,
    handshake: SchedulerHandshake,
    scheduler: PlaybackScheduler,
    update_tx: Sender<EngineUpdate>,
    poll_interval: Duration,
    song_cooldown: Duration,
    // a different path at build means a fresh start
    loaded_path: Option<PathBuf>,
    timeline: Option<BuiltTimeline>,
    failures: usize,
    stalled: bool,
}

impl Engine {
    fn run(mut self) {
        tracing::info!("engine started");
        let mut phase = Phase::Idle;

        while self.state.is_running() {
            let next = match phase {
                Phase::Idle => Some(self.idle()),
                Phase::Building => Some(self.build()),
                Phase::Running => self.run_pass(),
                Phase::Interrupted(reason) => self.interrupted(reason),
                Phase::SongComplete => Some(self.song_complete()),
            };
            let Some(next) = next else {
                break;
            };
            if next != phase {
                tracing::trace!(from = phase.label(), to = next.label(), "phase");
            }
            phase = next;
        }

        self.state.set_now_playing(None);
        let _ = self.update_tx.try_send(EngineUpdate::Stopped);
        tracing::info!("engine stopped");
    }

    fn idle(&mut self) -> Phase {
        if self.stalled {
            if self.state.restart_requested() || self.state.mixer_requested() {
                self.stalled = false;
                self.failures = 0;
                return Phase::Building;
            }
        } else if self.state.current_song().is_some() {
            return Phase::Building;
        }
        self.state.wait_timeout(self.poll_interval);
        Phase::Idle
    }

    fn build(&mut self) -> Phase {
        self.state.take_restart();
        let Some((index, path)) = self.state.current_song() else {
            return Phase::Idle;
        };
        let file_name = selection_key(&path);
        let saved = self.store.get(&file_name);

        if self.loaded_path.as_deref() != Some(path.as_path()) {
            self.state.set_resume_from_tick(0);
            self.state.take_seek();
            self.state.set_selected_tracks(None);
            if let Some(saved) = &saved {
                self.state.set_speed(saved.speed);
            }
            self.loaded_path = Some(path.clone());
        }

        if self.state.mixer_requested() {
            return Phase::Interrupted(Interruption::Mixer);
        }

        let manual = self.state.selected_tracks();
        let requested = manual
            .as_deref()
            .or(saved.as_ref().map(|saved| &saved.tracks));

        let score = match self.decoder.decode(&path) {
            Ok(score) => score,
            Err(e) => return self.skip(index, &path, e.to_string()),
        };
        let built = match TimelineBuilder::build(&score, requested) {
            Ok(built) => built,
            Err(e) => return self.skip(index, &path, e.to_string()),
        };

        let source = match built.auto_track {
            Some(track) => TrackSource::Auto(track),
            None if manual.is_some() => TrackSource::Mixer,
            None => TrackSource::Saved,
        };
        let now_playing = NowPlaying {
            index,
            path,
            file_name,
            tracks: built.tracks.clone(),
            playable_tracks: score.playable_track_count(),
            source,
            total_seconds: built.total_seconds(),
        };
        tracing::info!(
            index,
            file = %now_playing.file_name,
            ?source,
            tracks = ?now_playing.tracks,
            resume = self.state.resume_from_tick(),
            "now playing"
        );
        self.state.set_now_playing(Some(now_playing.clone()));
        let _ = self
            .update_tx
            .try_send(EngineUpdate::NowPlaying(now_playing));

        self.failures = 0;
        self.timeline = Some(built);
        Phase::Running
    }

    fn skip(&mut self, index: usize, path: &Path, reason: String) -> Phase {
        tracing::warn!(index, path = %path.display(), %reason, "skipping song");
        let _ = self.update_tx.try_send(EngineUpdate::SongSkipped {
            index,
            path: path.to_path_buf(),
            reason,
        });

        self.failures += 1;
        if self.failures >= self.state.playlist().len() {
            tracing::warn!("no playable song in playlist");
            self.stalled = true;
            return Phase::Idle;
        }
        self.state.advance_index();
        Phase::Idle
    }

    fn run_pass(&mut self) -> Option<Phase> {
        let Some(built) = self.timeline.take() else {
            return Some(Phase::Building);
        };
        Phase::after_pass(self.scheduler.play(&built))
    }

    fn interrupted(&mut self, reason: Interruption) -> Option<Phase> {
        match reason {
            Interruption::Mixer => self.await_mixer(),
            Interruption::Restart | Interruption::Seek => Some(Phase::Building),
        }
    }

    fn await_mixer(&mut self) -> Option<Phase> {
        tracing::debug!(resume = self.state.resume_from_tick(), "paused for mixer");
        self.handshake.pause_for_mixer();

        loop {
            if !self.state.is_running() {
                return None;
            }
            match self.handshake.wait_mixer_done(self.poll_interval) {
                SignalWait::Received => return Some(Phase::Building),
                SignalWait::TimedOut => {
                    if !self.state.mixer_requested() {
                        tracing::debug!("mixer request withdrawn, resuming");
                        return Some(Phase::Building);
                    }
                }
                SignalWait::Disconnected => {
                    if self.state.mixer_requested() {
                        tracing::warn!("control surface dropped with mixer open");
                        self.state.stop();
                        return None;
                    }
                    return Some(Phase::Building);
                }
            }
        }
    }

    fn song_complete(&mut self) -> Phase {
        let index = self.state.current_index();
        tracing::debug!(index, "song complete");
        let _ = self.update_tx.try_send(EngineUpdate::SongFinished { index });

        if !self.cooldown() {
            return Phase::Building;
        }
        if self.state.is_looping() {
            return Phase::Building;
        }
        self.state.advance_index();
        Phase::Idle
    }

    // false when cut short by a restart or stop
    fn cooldown(&self) -> bool {
        let deadline = Instant::now() + self.song_cooldown;
        loop {
            if !self.state.is_running() || self.state.restart_requested() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            self.state
                .wait_timeout((deadline - now).min(self.poll_interval));
        }
    }
}
