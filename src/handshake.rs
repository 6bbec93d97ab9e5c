//! Mixer rendezvous between the scheduler actor and the control surface.
//!
//! Two one-shot signals, each a single-slot channel:
//!
//! - **paused-for-mixer** (scheduler → control): raised once the scheduler has
//!   stopped the timeline and written `resume_from_tick`.
//! - **mixer-done** (control → scheduler): raised once the new selection is
//!   stored and `mixer_requested` is cleared.
//!
//! Receiving a signal consumes it, and each side drains stale signals before
//! starting a new round, so a second mixer session never fires on leftovers.

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalWait {
    Received,
    TimedOut,
    /// The other side is gone.
    Disconnected,
}

struct SignalTx(Sender<()>);

struct SignalRx(Receiver<()>);

fn signal() -> (SignalTx, SignalRx) {
    let (tx, rx) = channel::bounded(1);
    (SignalTx(tx), SignalRx(rx))
}

impl SignalTx {
    /// Raising an already-raised signal is a no-op.
    fn raise(&self) {
        match self.0.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                tracing::debug!("handshake peer dropped before signal was raised");
            }
        }
    }
}

impl SignalRx {
    fn wait(&self, timeout: Duration) -> SignalWait {
        match self.0.recv_timeout(timeout) {
            Ok(()) => SignalWait::Received,
            Err(RecvTimeoutError::Timeout) => SignalWait::TimedOut,
            Err(RecvTimeoutError::Disconnected) => SignalWait::Disconnected,
        }
    }

    fn reset(&self) {
        while self.0.try_recv().is_ok() {}
    }
}

/// Scheduler half.
pub struct SchedulerHandshake {
    paused_for_mixer: SignalTx,
    mixer_done: SignalRx,
}

/// Control-surface half.
pub struct ControlHandshake {
    paused_for_mixer: SignalRx,
    mixer_done: SignalTx,
}

pub fn handshake() -> (SchedulerHandshake, ControlHandshake) {
    let (paused_tx, paused_rx) = signal();
    let (done_tx, done_rx) = signal();
    (
        SchedulerHandshake {
            paused_for_mixer: paused_tx,
            mixer_done: done_rx,
        },
        ControlHandshake {
            paused_for_mixer: paused_rx,
            mixer_done: done_tx,
        },
    )
}

impl SchedulerHandshake {
    /// Call only after `resume_from_tick` has been written.
    pub fn pause_for_mixer(&self) {
        self.mixer_done.reset();
        self.paused_for_mixer.raise();
    }

    pub fn wait_mixer_done(&self, timeout: Duration) -> SignalWait {
        self.mixer_done.wait(timeout)
    }
}

impl ControlHandshake {
    /// Drops a paused-for-mixer signal left over from an earlier round. Call
    /// before setting `mixer_requested`.
    pub fn begin(&self) {
        self.paused_for_mixer.reset();
    }

    pub fn wait_scheduler_paused(&self, timeout: Duration) -> SignalWait {
        self.paused_for_mixer.wait(timeout)
    }

    /// Call only after the selection is written and `mixer_requested` cleared.
    pub fn finish_mixer(&self) {
        self.mixer_done.raise();
    }
}
