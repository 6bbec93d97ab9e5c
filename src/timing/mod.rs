mod clock;
mod scheduler;
mod state_machine;
mod timeline;

pub use clock::Clock;
pub use scheduler::{DEFAULT_POLL_INTERVAL, MAX_POLL_INTERVAL, PlaybackScheduler};
pub use state_machine::{Interruption, PassOutcome, Phase};
pub use timeline::{BuiltTimeline, Timeline, TimelineBuilder};
