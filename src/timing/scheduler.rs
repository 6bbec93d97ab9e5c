use super::state_machine::{Interruption, PassOutcome};
use super::timeline::BuiltTimeline;
use super::Clock;
use crate::emitter::{KeyEmitter, NoteKeyMap};
use crate::events::{EngineUpdate, PlayStatus, Progress};
use crate::state::PlaybackState;
use crossbeam::channel::Sender;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);
pub const MAX_POLL_INTERVAL: Duration = Duration::from_millis(100);

enum WaitOutcome {
    Ready,
    Interrupted(Interruption),
    Stopped,
}

/// Walks a timeline in real time and fires its notes.
///
/// Between notes the scheduler sleeps in slices of at most the poll interval,
/// re-checking pause, stop, mixer, restart and seek requests on every slice.
pub struct PlaybackScheduler {
    state: Arc<PlaybackState>,
    emitter: Box<dyn KeyEmitter>,
    keymap: NoteKeyMap,
    poll_interval: Duration,
    strum_delay: Duration,
    updates: Option<Sender<EngineUpdate>>,
    last_report: Option<Instant>,
}

impl PlaybackScheduler {
    pub fn new(state: Arc<PlaybackState>, emitter: Box<dyn KeyEmitter>, keymap: NoteKeyMap) -> Self {
        Self {
            state,
            emitter,
            keymap,
            poll_interval: DEFAULT_POLL_INTERVAL,
            strum_delay: Duration::ZERO,
            updates: None,
            last_report: None,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.clamp(Duration::from_millis(1), MAX_POLL_INTERVAL);
        self
    }

    /// Pause after each emitted note, so chords roll slightly.
    pub fn with_strum_delay(mut self, delay: Duration) -> Self {
        self.strum_delay = delay;
        self
    }

    pub fn with_updates(mut self, updates: Sender<EngineUpdate>) -> Self {
        self.updates = Some(updates);
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// One pass over `built`, starting at the state's `resume_from_tick`.
    ///
    /// Ticks before the resume point are skipped without waiting; the resume
    /// point is then zeroed. On a mixer or seek interruption the new resume
    /// tick is written before returning.
    pub fn play(&mut self, built: &BuiltTimeline) -> PassOutcome {
        let clock = built.clock;
        let total_secs = built.total_seconds();
        let resume = self.state.resume_from_tick();
        let mut seeking = resume > 0;
        let mut previous = 0u64;
        self.last_report = None;

        tracing::debug!(
            resume,
            ticks = built.timeline.len(),
            total_secs,
            "starting pass"
        );

        for (tick, notes) in built.timeline.iter() {
            if !self.state.is_running() {
                return PassOutcome::Stopped;
            }

            if seeking {
                if tick < resume {
                    self.report(clock.ticks_to_seconds(tick), total_secs, true);
                    continue;
                }
                self.state.set_resume_from_tick(0);
                previous = resume;
                seeking = false;
            }

            match self.wait_for_tick(tick, previous, clock, built) {
                WaitOutcome::Ready => {}
                WaitOutcome::Interrupted(reason) => {
                    tracing::debug!(tick, ?reason, "pass interrupted");
                    return PassOutcome::Interrupted(reason);
                }
                WaitOutcome::Stopped => return PassOutcome::Stopped,
            }

            self.fire(tick, notes);
            previous = tick;
        }

        if seeking {
            // resume point lay past the last note
            self.state.set_resume_from_tick(0);
        }

        self.report(total_secs, total_secs, false);
        PassOutcome::Complete
    }

    fn wait_for_tick(
        &mut self,
        tick: u64,
        previous: u64,
        clock: Clock,
        built: &BuiltTimeline,
    ) -> WaitOutcome {
        let total_secs = built.total_seconds();
        let start_secs = clock.ticks_to_seconds(previous);
        let delta_secs = clock.ticks_to_seconds(tick.saturating_sub(previous));
        // score seconds covered so far; scaled by the speed at each slice so a
        // speed change mid-wait takes effect immediately
        let mut covered = 0.0;

        loop {
            if !self.state.is_running() {
                return WaitOutcome::Stopped;
            }
            if let Some(reason) = self.check_interruption(tick, clock, built) {
                return WaitOutcome::Interrupted(reason);
            }

            if self.state.is_paused() {
                self.report(start_secs + covered, total_secs, false);
                self.state.wait_timeout(self.poll_interval);
                continue;
            }

            let speed = self.state.speed();
            let remaining = (delta_secs - covered) / speed;
            if remaining <= 0.0 {
                return WaitOutcome::Ready;
            }

            self.report(start_secs + covered, total_secs, false);
            let slice = Duration::from_secs_f64(remaining).min(self.poll_interval);
            let started = Instant::now();
            self.state.wait_timeout(slice);
            covered += started.elapsed().as_secs_f64() * speed;
        }
    }

    // mixer, then restart, then seek
    fn check_interruption(
        &self,
        tick: u64,
        clock: Clock,
        built: &BuiltTimeline,
    ) -> Option<Interruption> {
        match Interruption::requested(&self.state) {
            Some(Interruption::Mixer) => {
                self.state.set_resume_from_tick(tick);
                return Some(Interruption::Mixer);
            }
            Some(reason) => return Some(reason),
            None => {}
        }

        let delta = self.state.take_seek()?;
        let target_secs = (clock.ticks_to_seconds(tick) + delta).clamp(0.0, built.total_seconds());
        let target = clock.seconds_to_ticks(target_secs).min(built.total_ticks);
        tracing::debug!(from = tick, to = target, delta, "seek");
        self.state.set_resume_from_tick(target);
        Some(Interruption::Seek)
    }

    fn fire(&mut self, tick: u64, notes: &[u8]) {
        for &pitch in notes {
            if !self.keymap.contains(pitch) {
                tracing::trace!(tick, pitch, "dropping unmapped note");
                continue;
            }
            if self.state.is_muted() {
                continue;
            }
            if let Err(e) = self.emitter.emit(pitch) {
                tracing::warn!(tick, pitch, error = %e, "emit failed");
            }
            if !self.strum_delay.is_zero() {
                std::thread::sleep(self.strum_delay);
            }
        }
    }

    fn report(&mut self, position_secs: f64, total_secs: f64, seeking: bool) {
        let Some(updates) = &self.updates else {
            return;
        };
        let now = Instant::now();
        if let Some(last) = self.last_report {
            if now.duration_since(last) < self.poll_interval && position_secs < total_secs {
                return;
            }
        }
        self.last_report = Some(now);

        let status = if seeking {
            PlayStatus::Seeking
        } else if self.state.is_paused() {
            PlayStatus::Paused
        } else if self.state.is_muted() {
            PlayStatus::Muted
        } else if self.state.is_looping() {
            PlayStatus::Looping
        } else {
            PlayStatus::Playing
        };

        let _ = updates.try_send(EngineUpdate::Progress(Progress {
            position_secs,
            total_secs,
            status,
            speed: self.state.speed(),
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EmitError;
    use crate::timing::Timeline;
    use parking_lot::Mutex;
    use std::collections::BTreeSet;
    use std::thread;

    // 480 ticks = 1ms
    fn fast_clock() -> Clock {
        Clock::new(480, 1_000)
    }

    fn built(pairs: &[(u64, u8)], clock: Clock) -> BuiltTimeline {
        let timeline: Timeline = pairs.iter().copied().collect();
        BuiltTimeline {
            total_ticks: timeline.last_tick(),
            timeline,
            clock,
            tracks: BTreeSet::from([0]),
            auto_track: None,
        }
    }

    fn scenario() -> BuiltTimeline {
        built(
            &[(0, 60), (480, 64), (480, 67), (960, 72), (1440, 74), (1440, 77)],
            fast_clock(),
        )
    }

    type Log = Arc<Mutex<Vec<u8>>>;

    fn recorder(log: &Log) -> Box<dyn KeyEmitter> {
        let log = log.clone();
        Box::new(move |pitch: u8| -> Result<(), EmitError> {
            log.lock().push(pitch);
            Ok(())
        })
    }

    fn scheduler(state: &Arc<PlaybackState>, emitter: Box<dyn KeyEmitter>) -> PlaybackScheduler {
        PlaybackScheduler::new(state.clone(), emitter, NoteKeyMap::default())
            .with_poll_interval(Duration::from_millis(5))
    }

    #[test]
    fn plays_every_note_in_order() {
        let state = Arc::new(PlaybackState::new());
        let log = Log::default();
        let outcome = scheduler(&state, recorder(&log)).play(&scenario());

        assert_eq!(outcome, PassOutcome::Complete);
        assert_eq!(*log.lock(), vec![60, 64, 67, 72, 74, 77]);
    }

    #[test]
    fn unmapped_notes_are_dropped() {
        let state = Arc::new(PlaybackState::new());
        let log = Log::default();
        let timeline = built(&[(0, 20), (0, 60), (10, 120), (20, 62)], fast_clock());
        let outcome = scheduler(&state, recorder(&log)).play(&timeline);

        assert_eq!(outcome, PassOutcome::Complete);
        assert_eq!(*log.lock(), vec![60, 62]);
    }

    #[test]
    fn muted_emits_nothing_but_completes() {
        let state = Arc::new(PlaybackState::new());
        state.set_muted(true);
        let log = Log::default();
        let outcome = scheduler(&state, recorder(&log)).play(&scenario());

        assert_eq!(outcome, PassOutcome::Complete);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn resume_skips_earlier_ticks_and_is_consumed() {
        let state = Arc::new(PlaybackState::new());
        state.set_resume_from_tick(900);
        let log = Log::default();
        let outcome = scheduler(&state, recorder(&log)).play(&scenario());

        assert_eq!(outcome, PassOutcome::Complete);
        assert_eq!(*log.lock(), vec![72, 74, 77]);
        assert_eq!(state.resume_from_tick(), 0);
    }

    #[test]
    fn resume_past_end_is_cleared() {
        let state = Arc::new(PlaybackState::new());
        state.set_resume_from_tick(10_000);
        let log = Log::default();
        let outcome = scheduler(&state, recorder(&log)).play(&scenario());

        assert_eq!(outcome, PassOutcome::Complete);
        assert!(log.lock().is_empty());
        assert_eq!(state.resume_from_tick(), 0);
    }

    #[test]
    fn mixer_interrupt_resumes_exactly() {
        let state = Arc::new(PlaybackState::new());
        let log = Log::default();

        // raise the mixer request as soon as tick 480 has sounded, so the
        // scheduler is waiting on tick 960 when it sees it
        let emitter = {
            let log = log.clone();
            let state = state.clone();
            Box::new(move |pitch: u8| -> Result<(), EmitError> {
                log.lock().push(pitch);
                if pitch == 67 {
                    state.set_mixer_requested(true);
                }
                Ok(())
            })
        };
        let mut scheduler = scheduler(&state, emitter);
        let timeline = scenario();

        let outcome = scheduler.play(&timeline);
        assert_eq!(outcome, PassOutcome::Interrupted(Interruption::Mixer));
        assert_eq!(state.resume_from_tick(), 960);
        assert_eq!(*log.lock(), vec![60, 64, 67]);

        state.set_mixer_requested(false);
        let outcome = scheduler.play(&timeline);
        assert_eq!(outcome, PassOutcome::Complete);
        assert_eq!(*log.lock(), vec![60, 64, 67, 72, 74, 77]);
        assert_eq!(state.resume_from_tick(), 0);
    }

    #[test]
    fn restart_interrupts_without_resume_point() {
        let state = Arc::new(PlaybackState::new());
        state.request_restart();
        let log = Log::default();
        let outcome = scheduler(&state, recorder(&log)).play(&scenario());

        assert_eq!(outcome, PassOutcome::Interrupted(Interruption::Restart));
        assert!(log.lock().is_empty());
        assert_eq!(state.resume_from_tick(), 0);
    }

    #[test]
    fn seek_sets_resume_tick() {
        // 480 ticks per beat, 120 bpm: 10s = 9600 ticks
        let clock = Clock::new(480, 500_000);
        let timeline = built(&[(0, 60), (4800, 62), (9600, 64), (14400, 65)], clock);

        let state = Arc::new(PlaybackState::new());
        state.request_seek(10.0);
        let log = Log::default();
        let outcome = scheduler(&state, recorder(&log)).play(&timeline);

        assert_eq!(outcome, PassOutcome::Interrupted(Interruption::Seek));
        assert_eq!(state.resume_from_tick(), 9600);
        assert!(!state.has_pending_seek());
    }

    #[test]
    fn seek_is_clamped_to_timeline() {
        let clock = Clock::new(480, 500_000);
        let timeline = built(&[(0, 60), (960, 62)], clock);

        let state = Arc::new(PlaybackState::new());
        state.request_seek(-10.0);
        let outcome = scheduler(&state, recorder(&Log::default())).play(&timeline);
        assert_eq!(outcome, PassOutcome::Interrupted(Interruption::Seek));
        assert_eq!(state.resume_from_tick(), 0);

        state.request_seek(60.0);
        let outcome = scheduler(&state, recorder(&Log::default())).play(&timeline);
        assert_eq!(outcome, PassOutcome::Interrupted(Interruption::Seek));
        assert_eq!(state.resume_from_tick(), 960);
    }

    #[test]
    fn stop_emits_nothing() {
        let state = Arc::new(PlaybackState::new());
        state.stop();
        let log = Log::default();
        let outcome = scheduler(&state, recorder(&log)).play(&scenario());

        assert_eq!(outcome, PassOutcome::Stopped);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn failed_emit_does_not_stall() {
        let state = Arc::new(PlaybackState::new());
        let log = Log::default();
        let emitter = {
            let log = log.clone();
            Box::new(move |pitch: u8| -> Result<(), EmitError> {
                if pitch == 64 {
                    return Err(EmitError::Send {
                        pitch,
                        reason: "port gone".into(),
                    });
                }
                log.lock().push(pitch);
                Ok(())
            })
        };
        let outcome = scheduler(&state, emitter).play(&scenario());

        assert_eq!(outcome, PassOutcome::Complete);
        assert_eq!(*log.lock(), vec![60, 67, 72, 74, 77]);
    }

    #[test]
    fn speed_scales_wait() {
        // one beat = 300ms at speed 1.0
        let clock = Clock::new(480, 300_000);
        let timeline = built(&[(0, 60), (480, 64)], clock);

        let state = Arc::new(PlaybackState::new());
        state.set_speed(2.0);
        let started = Instant::now();
        let outcome = scheduler(&state, recorder(&Log::default())).play(&timeline);
        let elapsed = started.elapsed();

        assert_eq!(outcome, PassOutcome::Complete);
        assert!(elapsed >= Duration::from_millis(140), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(290), "{elapsed:?}");
    }

    #[test]
    fn pause_holds_until_resumed() {
        let state = Arc::new(PlaybackState::new());
        state.set_paused(true);
        let log = Log::default();

        let unpause = {
            let state = state.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(100));
                state.set_paused(false);
            })
        };

        let started = Instant::now();
        let outcome = scheduler(&state, recorder(&log)).play(&scenario());
        unpause.join().unwrap();

        assert_eq!(outcome, PassOutcome::Complete);
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(log.lock().len(), 6);
    }

    #[test]
    fn progress_reported() {
        let state = Arc::new(PlaybackState::new());
        let (tx, rx) = crossbeam::channel::bounded(64);
        let outcome = scheduler(&state, recorder(&Log::default()))
            .with_updates(tx)
            .play(&scenario());

        assert_eq!(outcome, PassOutcome::Complete);
        let last = rx.try_iter().last();
        match last {
            Some(EngineUpdate::Progress(progress)) => {
                assert_eq!(progress.position_secs, progress.total_secs);
                assert_eq!(progress.status, PlayStatus::Playing);
            }
            other => panic!("unexpected update {other:?}"),
        }
    }
}
