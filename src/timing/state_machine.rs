use crate::state::PlaybackState;

/// Why a running pass stopped before the end of the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    Mixer,
    Restart,
    Seek,
}

impl Interruption {
    /// Pending seeks are not reported here; they need the current tick.
    pub fn requested(state: &PlaybackState) -> Option<Self> {
        if state.mixer_requested() {
            Some(Self::Mixer)
        } else if state.restart_requested() {
            Some(Self::Restart)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    Complete,
    Interrupted(Interruption),
    /// `running` went false.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Building,
    Running,
    Interrupted(Interruption),
    SongComplete,
}

impl Phase {
    pub fn after_pass(outcome: PassOutcome) -> Option<Self> {
        match outcome {
            PassOutcome::Complete => Some(Phase::SongComplete),
            PassOutcome::Interrupted(reason) => Some(Phase::Interrupted(reason)),
            PassOutcome::Stopped => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Building => "building",
            Phase::Running => "running",
            Phase::Interrupted(_) => "interrupted",
            Phase::SongComplete => "song-complete",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixer_outranks_restart() {
        let state = PlaybackState::new();
        assert_eq!(Interruption::requested(&state), None);

        state.request_restart();
        assert_eq!(Interruption::requested(&state), Some(Interruption::Restart));

        state.set_mixer_requested(true);
        assert_eq!(Interruption::requested(&state), Some(Interruption::Mixer));
    }

    #[test]
    fn pass_outcome_picks_next_phase() {
        assert_eq!(
            Phase::after_pass(PassOutcome::Complete),
            Some(Phase::SongComplete)
        );
        assert_eq!(
            Phase::after_pass(PassOutcome::Interrupted(Interruption::Seek)),
            Some(Phase::Interrupted(Interruption::Seek))
        );
        assert_eq!(Phase::after_pass(PassOutcome::Stopped), None);
    }
}
