//! The control block shared by the scheduler actor and the control surface.
//!
//! Every field is independently atomic. Compound decisions (is the mixer
//! requested *and* has the scheduler let go?) are sequenced through the
//! [`crate::handshake`] signals rather than by reading several fields here.

use arc_swap::{ArcSwap, ArcSwapOption};
use parking_lot::{Condvar, Mutex};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

pub const MIN_SPEED: f64 = 0.1;
pub const MAX_SPEED: f64 = 10.0;
pub const DEFAULT_SPEED: f64 = 1.0;

/// Clamps to `[MIN_SPEED, MAX_SPEED]` and snaps to two decimals so repeated
/// ±0.1 steps do not drift.
pub fn clamp_speed(speed: f64) -> f64 {
    if speed.is_nan() {
        return DEFAULT_SPEED;
    }
    ((speed * 100.0).round() / 100.0).clamp(MIN_SPEED, MAX_SPEED)
}

/// Where the active track selection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSource {
    Saved,
    Mixer,
    /// Busiest track, picked automatically.
    Auto(usize),
}

/// What the scheduler is currently playing. Published at every build.
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlaying {
    pub index: usize,
    pub path: PathBuf,
    pub file_name: String,
    pub tracks: BTreeSet<usize>,
    pub playable_tracks: usize,
    pub source: TrackSource,
    pub total_seconds: f64,
}

pub struct PlaybackState {
    running: AtomicBool,
    paused: AtomicBool,
    muted: AtomicBool,
    looping: AtomicBool,
    // f64 bits
    speed: AtomicU64,
    selected_tracks: ArcSwapOption<BTreeSet<usize>>,
    resume_from_tick: AtomicU64,
    restart_requested: AtomicBool,
    mixer_requested: AtomicBool,
    // score seconds
    pending_seek: Mutex<Option<f64>>,
    playlist: ArcSwap<Vec<PathBuf>>,
    current_index: AtomicUsize,
    now_playing: ArcSwapOption<NowPlaying>,
    wake_generation: Mutex<u64>,
    wake: Condvar,
}

impl PlaybackState {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            paused: AtomicBool::new(false),
            muted: AtomicBool::new(false),
            looping: AtomicBool::new(false),
            speed: AtomicU64::new(DEFAULT_SPEED.to_bits()),
            selected_tracks: ArcSwapOption::empty(),
            resume_from_tick: AtomicU64::new(0),
            restart_requested: AtomicBool::new(false),
            mixer_requested: AtomicBool::new(false),
            pending_seek: Mutex::new(None),
            playlist: ArcSwap::from_pointee(Vec::new()),
            current_index: AtomicUsize::new(0),
            now_playing: ArcSwapOption::empty(),
            wake_generation: Mutex::new(0),
            wake: Condvar::new(),
        }
    }

    pub fn with_playlist(playlist: Vec<PathBuf>, start_index: usize) -> Self {
        let state = Self::new();
        let index = if playlist.is_empty() {
            0
        } else {
            start_index.min(playlist.len() - 1)
        };
        state.playlist.store(Arc::new(playlist));
        state.current_index.store(index, Ordering::SeqCst);
        state
    }

    /// Wakes any actor blocked in [`PlaybackState::wait_timeout`].
    pub fn notify(&self) {
        let mut generation = self.wake_generation.lock();
        *generation = generation.wrapping_add(1);
        self.wake.notify_all();
    }

    /// Blocks for at most `timeout`, returning early on [`PlaybackState::notify`].
    pub fn wait_timeout(&self, timeout: Duration) {
        let mut generation = self.wake_generation.lock();
        let seen = *generation;
        let deadline = std::time::Instant::now() + timeout;
        while *generation == seen {
            if self.wake.wait_until(&mut generation, deadline).timed_out() {
                break;
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.restart_requested.store(true, Ordering::SeqCst);
        self.notify();
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
        self.notify();
    }

    pub fn toggle_pause(&self) -> bool {
        let paused = !self.paused.fetch_xor(true, Ordering::SeqCst);
        self.notify();
        paused
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
        self.notify();
    }

    pub fn toggle_mute(&self) -> bool {
        let muted = !self.muted.fetch_xor(true, Ordering::SeqCst);
        self.notify();
        muted
    }

    pub fn is_looping(&self) -> bool {
        self.looping.load(Ordering::SeqCst)
    }

    pub fn set_looping(&self, looping: bool) {
        self.looping.store(looping, Ordering::SeqCst);
        self.notify();
    }

    pub fn toggle_loop(&self) -> bool {
        let looping = !self.looping.fetch_xor(true, Ordering::SeqCst);
        self.notify();
        looping
    }

    pub fn speed(&self) -> f64 {
        f64::from_bits(self.speed.load(Ordering::SeqCst))
    }

    pub fn set_speed(&self, speed: f64) -> f64 {
        let speed = clamp_speed(speed);
        self.speed.store(speed.to_bits(), Ordering::SeqCst);
        self.notify();
        speed
    }

    pub fn adjust_speed(&self, delta: f64) -> f64 {
        let mut updated = DEFAULT_SPEED;
        let _ = self
            .speed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |bits| {
                updated = clamp_speed(f64::from_bits(bits) + delta);
                Some(updated.to_bits())
            });
        self.notify();
        updated
    }

    pub fn selected_tracks(&self) -> Option<Arc<BTreeSet<usize>>> {
        self.selected_tracks.load_full()
    }

    pub fn set_selected_tracks(&self, tracks: Option<BTreeSet<usize>>) {
        self.selected_tracks.store(tracks.map(Arc::new));
    }

    pub fn resume_from_tick(&self) -> u64 {
        self.resume_from_tick.load(Ordering::SeqCst)
    }

    pub fn set_resume_from_tick(&self, tick: u64) {
        self.resume_from_tick.store(tick, Ordering::SeqCst);
    }

    pub fn restart_requested(&self) -> bool {
        self.restart_requested.load(Ordering::SeqCst)
    }

    pub fn request_restart(&self) {
        self.restart_requested.store(true, Ordering::SeqCst);
        self.notify();
    }

    pub fn take_restart(&self) -> bool {
        self.restart_requested.swap(false, Ordering::SeqCst)
    }

    pub fn mixer_requested(&self) -> bool {
        self.mixer_requested.load(Ordering::SeqCst)
    }

    pub fn set_mixer_requested(&self, requested: bool) {
        self.mixer_requested.store(requested, Ordering::SeqCst);
        self.notify();
    }

    /// Queues a seek of `delta_secs` score seconds (negative seeks back).
    /// Speed does not scale the offset.
    pub fn request_seek(&self, delta_secs: f64) {
        {
            let mut pending = self.pending_seek.lock();
            *pending = Some(pending.unwrap_or(0.0) + delta_secs);
        }
        self.notify();
    }

    pub fn has_pending_seek(&self) -> bool {
        self.pending_seek.lock().is_some()
    }

    pub fn take_seek(&self) -> Option<f64> {
        self.pending_seek.lock().take()
    }

    pub fn playlist(&self) -> Arc<Vec<PathBuf>> {
        self.playlist.load_full()
    }

    pub fn current_index(&self) -> usize {
        self.current_index.load(Ordering::SeqCst)
    }

    pub fn current_song(&self) -> Option<(usize, PathBuf)> {
        let playlist = self.playlist.load();
        let index = self.current_index();
        playlist.get(index).map(|path| (index, path.clone()))
    }

    pub fn set_playlist(&self, playlist: Vec<PathBuf>, start_index: usize) {
        let index = start_index.min(playlist.len().saturating_sub(1));
        self.selected_tracks.store(None);
        self.playlist.store(Arc::new(playlist));
        self.current_index.store(index, Ordering::SeqCst);
        self.speed.store(DEFAULT_SPEED.to_bits(), Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
        self.request_restart();
    }

    pub fn next_song(&self) {
        self.step_song(1);
    }

    pub fn prev_song(&self) {
        self.step_song(-1);
    }

    // leaves the restart flag alone
    pub fn advance_index(&self) -> usize {
        let len = self.playlist.load().len();
        if len == 0 {
            return 0;
        }
        let next = (self.current_index() + 1) % len;
        self.current_index.store(next, Ordering::SeqCst);
        next
    }

    fn step_song(&self, step: isize) {
        let len = self.playlist.load().len();
        if len == 0 {
            return;
        }
        // selection first so a build that sees the new index never sees the
        // old song's tracks
        self.selected_tracks.store(None);
        let current = self.current_index() as isize;
        let next = (current + step).rem_euclid(len as isize) as usize;
        self.current_index.store(next, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
        self.request_restart();
    }

    pub fn now_playing(&self) -> Option<Arc<NowPlaying>> {
        self.now_playing.load_full()
    }

    pub fn set_now_playing(&self, now_playing: Option<NowPlaying>) {
        self.now_playing.store(now_playing.map(Arc::new));
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new()
    }
}
