use super::Clock;
use crate::error::BuildError;
use crate::score::{EventKind, ScoreFile};
use std::collections::{BTreeMap, BTreeSet};

/// Absolute tick -> pitches sounding at that tick, merged across tracks.
///
/// Iteration is always in ascending tick order. Identical pitches at the same
/// tick are kept, so a note struck by two merged tracks is emitted twice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timeline {
    events: BTreeMap<u64, Vec<u8>>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tick: u64, pitch: u8) {
        self.events.entry(tick).or_default().push(pitch);
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &[u8])> + '_ {
        self.events.iter().map(|(tick, notes)| (*tick, notes.as_slice()))
    }

    pub fn notes_at(&self, tick: u64) -> Option<&[u8]> {
        self.events.get(&tick).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn note_count(&self) -> usize {
        self.events.values().map(Vec::len).sum()
    }

    pub fn last_tick(&self) -> u64 {
        self.events.keys().next_back().copied().unwrap_or(0)
    }
}

impl FromIterator<(u64, u8)> for Timeline {
    fn from_iter<I: IntoIterator<Item = (u64, u8)>>(iter: I) -> Self {
        let mut timeline = Timeline::new();
        for (tick, pitch) in iter {
            timeline.insert(tick, pitch);
        }
        timeline
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuiltTimeline {
    pub timeline: Timeline,
    pub total_ticks: u64,
    pub clock: Clock,
    /// Tracks that actually went into the timeline.
    pub tracks: BTreeSet<usize>,
    /// Set when the track was picked automatically rather than requested.
    pub auto_track: Option<usize>,
}

impl BuiltTimeline {
    pub fn total_seconds(&self) -> f64 {
        self.clock.ticks_to_seconds(self.total_ticks)
    }
}

pub struct TimelineBuilder;

impl TimelineBuilder {
    /// Merges `tracks` of `score` into one timeline.
    ///
    /// With no requested tracks, or when the requested ones hold no notes,
    /// the busiest track is used instead. Out-of-range indices are ignored.
    pub fn build(
        score: &ScoreFile,
        tracks: Option<&BTreeSet<usize>>,
    ) -> Result<BuiltTimeline, BuildError> {
        if score.tracks.is_empty() {
            return Err(BuildError::NoTracks);
        }

        let clock = Clock::new(score.ticks_per_beat, score.tempo());

        let requested: BTreeSet<usize> = tracks
            .map(|set| {
                set.iter()
                    .copied()
                    .filter(|&i| i < score.tracks.len())
                    .collect()
            })
            .unwrap_or_default();

        if !requested.is_empty() {
            let timeline = merge(score, &requested);
            if !timeline.is_empty() {
                return Ok(BuiltTimeline {
                    total_ticks: timeline.last_tick(),
                    timeline,
                    clock,
                    tracks: requested,
                    auto_track: None,
                });
            }
            tracing::warn!(
                ?requested,
                "selected tracks contain no notes, falling back to busiest track"
            );
        }

        let best = score.busiest_track().ok_or(BuildError::NoTracks)?;
        let chosen = BTreeSet::from([best]);
        let timeline = merge(score, &chosen);
        if timeline.is_empty() {
            return Err(BuildError::EmptySelection);
        }

        Ok(BuiltTimeline {
            total_ticks: timeline.last_tick(),
            timeline,
            clock,
            tracks: chosen,
            auto_track: Some(best),
        })
    }
}

fn merge(score: &ScoreFile, tracks: &BTreeSet<usize>) -> Timeline {
    let mut timeline = Timeline::new();
    for track in tracks.iter().filter_map(|&i| score.tracks.get(i)) {
        let mut tick = 0u64;
        for event in &track.events {
            tick += event.delta as u64;
            if let EventKind::NoteOn {
                pitch, velocity, ..
            } = event.kind
            {
                if velocity > 0 {
                    timeline.insert(tick, pitch);
                }
            }
        }
    }
    timeline
}
