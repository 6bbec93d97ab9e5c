/// Converts between score ticks and wall-clock time for a single resolved
/// tempo. There is no tempo map: one tempo covers the whole piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clock {
    ticks_per_beat: u16,
    micros_per_beat: u32,
}

impl Clock {
    pub fn new(ticks_per_beat: u16, micros_per_beat: u32) -> Self {
        Self {
            ticks_per_beat: ticks_per_beat.max(1),
            micros_per_beat,
        }
    }

    pub fn ticks_to_seconds(&self, ticks: u64) -> f64 {
        ticks as f64 * self.micros_per_beat as f64 / self.ticks_per_beat as f64 / 1_000_000.0
    }

    /// Inverse of [`Clock::ticks_to_seconds`], rounded to the nearest tick.
    /// Negative input maps to tick 0.
    pub fn seconds_to_ticks(&self, seconds: f64) -> u64 {
        if self.micros_per_beat == 0 || seconds.is_nan() || seconds <= 0.0 {
            return 0;
        }
        let ticks = seconds * 1_000_000.0 * self.ticks_per_beat as f64 / self.micros_per_beat as f64;
        ticks.round() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_second_per_beat_at_120_bpm() {
        let clock = Clock::new(480, 500_000);
        assert_eq!(clock.ticks_to_seconds(480), 0.5);
        assert_eq!(clock.ticks_to_seconds(960), 1.0);
    }

    #[test]
    fn seconds_to_ticks_round_trip() {
        let clocks = [
            Clock::new(480, 500_000),
            Clock::new(96, 652_174),
            Clock::new(1024, 333_333),
            Clock::new(7, 1_000_001),
        ];
        for clock in clocks {
            for ticks in (0..50_000u64).step_by(37) {
                let back = clock.seconds_to_ticks(clock.ticks_to_seconds(ticks));
                assert!(back.abs_diff(ticks) <= 1, "{clock:?}: {ticks} -> {back}");
            }
        }
    }

    #[test]
    fn negative_seconds_clamp_to_zero() {
        let clock = Clock::new(480, 500_000);
        assert_eq!(clock.seconds_to_ticks(-3.0), 0);
        assert_eq!(clock.seconds_to_ticks(10.0), 9600);
    }

    #[test]
    fn zero_ticks_per_beat_is_guarded() {
        let clock = Clock::new(0, 500_000);
        assert_eq!(clock.ticks_to_seconds(2), 1.0);
    }
}
