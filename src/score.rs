//! Decoded score files.
//!
//! A [`ScoreFile`] is the already-parsed form of a Standard MIDI File: one
//! list of `(delta, event)` pairs per track, with only the event kinds the
//! player cares about kept distinct. Decoding is done with `midly`.

use crate::error::DecodeError;
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// General MIDI percussion lives on channel 10 (zero-based 9).
pub const PERCUSSION_CHANNEL: u8 = 9;

/// 120 BPM, used when the meta track never sets a tempo.
pub const DEFAULT_MICROS_PER_BEAT: u32 = 500_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    NoteOn { pitch: u8, velocity: u8, channel: u8 },
    ProgramChange { program: u8, channel: u8 },
    TempoChange { micros_per_beat: u32 },
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackEvent {
    pub delta: u32,
    pub kind: EventKind,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Track {
    pub name: String,
    pub events: Vec<TrackEvent>,
}

impl Track {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            events: Vec::new(),
        }
    }

    /// Appends an event `delta` ticks after the previous one.
    pub fn with_event(mut self, delta: u32, kind: EventKind) -> Self {
        self.events.push(TrackEvent { delta, kind });
        self
    }

    pub fn with_note(self, delta: u32, pitch: u8) -> Self {
        self.with_event(
            delta,
            EventKind::NoteOn {
                pitch,
                velocity: 100,
                channel: 0,
            },
        )
    }

    pub fn note_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.kind, EventKind::NoteOn { velocity, .. } if velocity > 0))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreFile {
    pub ticks_per_beat: u16,
    pub tracks: Vec<Track>,
}

impl ScoreFile {
    pub fn new(ticks_per_beat: u16, tracks: Vec<Track>) -> Self {
        Self {
            ticks_per_beat,
            tracks,
        }
    }

    /// Puts a tempo change at the start of the first track.
    pub fn with_tempo(mut self, micros_per_beat: u32) -> Self {
        if let Some(meta) = self.tracks.first_mut() {
            meta.events.insert(
                0,
                TrackEvent {
                    delta: 0,
                    kind: EventKind::TempoChange { micros_per_beat },
                },
            );
        }
        self
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        let smf = Smf::parse(data)?;

        let ticks_per_beat = match smf.header.timing {
            Timing::Metrical(ticks) => ticks.as_int(),
            Timing::Timecode(..) => return Err(DecodeError::UnsupportedTiming),
        };

        let tracks = smf
            .tracks
            .iter()
            .map(|raw| {
                let mut track = Track::default();
                for event in raw {
                    let kind = match event.kind {
                        TrackEventKind::Midi { channel, message } => match message {
                            MidiMessage::NoteOn { key, vel } => EventKind::NoteOn {
                                pitch: key.as_int(),
                                velocity: vel.as_int(),
                                channel: channel.as_int(),
                            },
                            MidiMessage::ProgramChange { program } => EventKind::ProgramChange {
                                program: program.as_int(),
                                channel: channel.as_int(),
                            },
                            _ => EventKind::Other,
                        },
                        TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => {
                            EventKind::TempoChange {
                                micros_per_beat: tempo.as_int(),
                            }
                        }
                        TrackEventKind::Meta(MetaMessage::TrackName(name)) => {
                            if track.name.is_empty() {
                                track.name = String::from_utf8_lossy(name).trim().to_string();
                            }
                            EventKind::Other
                        }
                        _ => EventKind::Other,
                    };
                    track.events.push(TrackEvent {
                        delta: event.delta.as_int(),
                        kind,
                    });
                }
                track
            })
            .collect();

        Ok(Self {
            ticks_per_beat,
            tracks,
        })
    }

    /// Index of the track with the most sounding notes. Ties go to the lowest
    /// index.
    pub fn busiest_track(&self) -> Option<usize> {
        let mut best: Option<(usize, usize)> = None;
        for (index, track) in self.tracks.iter().enumerate() {
            let count = track.note_count();
            match best {
                Some((_, max)) if count <= max => {}
                _ => best = Some((index, count)),
            }
        }
        best.map(|(index, _)| index)
    }

    /// The last tempo change found in the first (meta) track. Tempo changes in
    /// other tracks, and all but the last change, are ignored.
    pub fn tempo(&self) -> u32 {
        self.tracks
            .first()
            .and_then(|meta| {
                meta.events.iter().rev().find_map(|e| match e.kind {
                    EventKind::TempoChange { micros_per_beat } => Some(micros_per_beat),
                    _ => None,
                })
            })
            .unwrap_or(DEFAULT_MICROS_PER_BEAT)
    }

    pub fn playable_track_count(&self) -> usize {
        self.tracks.iter().filter(|t| t.note_count() > 0).count()
    }
}

pub trait ScoreDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<ScoreFile, DecodeError>;
}

/// Reads Standard MIDI Files from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct MidiFileDecoder;

impl ScoreDecoder for MidiFileDecoder {
    fn decode(&self, path: &Path) -> Result<ScoreFile, DecodeError> {
        let data = fs::read(path).map_err(|source| DecodeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        ScoreFile::from_bytes(&data)
    }
}

/// Serves pre-built scores keyed by path. Paths that were never inserted fail
/// to decode.
#[derive(Debug, Default, Clone)]
pub struct MemoryDecoder {
    scores: HashMap<PathBuf, ScoreFile>,
}

impl MemoryDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, score: ScoreFile) {
        self.scores.insert(path.into(), score);
    }
}

impl ScoreDecoder for MemoryDecoder {
    fn decode(&self, path: &Path) -> Result<ScoreFile, DecodeError> {
        self.scores
            .get(path)
            .cloned()
            .ok_or_else(|| DecodeError::Missing(path.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(tag: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = tag.to_vec();
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(body);
        out
    }

    fn two_track_file(division: [u8; 2]) -> Vec<u8> {
        let mut data = chunk(b"MThd", &[0, 1, 0, 2, division[0], division[1]]);
        data.extend(chunk(
            b"MTrk",
            &[
                0x00, 0xFF, 0x51, 0x03, 0x06, 0x1A, 0x80, // tempo 400_000
                0x00, 0xFF, 0x03, 0x04, b'M', b'e', b't', b'a', // name
                0x00, 0xFF, 0x2F, 0x00,
            ],
        ));
        data.extend(chunk(
            b"MTrk",
            &[
                0x00, 0xFF, 0x03, 0x05, b'L', b'e', b'a', b'd', b' ', // name
                0x00, 0xC0, 0x18, // program 24
                0x00, 0x90, 0x3C, 0x64, // C4 on
                0x83, 0x60, 0x80, 0x3C, 0x40, // 480 ticks later, C4 off
                0x00, 0x90, 0x40, 0x00, // velocity-0 note on
                0x00, 0x99, 0x24, 0x50, // kick on channel 10
                0x00, 0xFF, 0x2F, 0x00,
            ],
        ));
        data
    }

    #[test]
    fn decode_standard_file() {
        let score = ScoreFile::from_bytes(&two_track_file([0x01, 0xE0])).unwrap();

        assert_eq!(score.ticks_per_beat, 480);
        assert_eq!(score.tracks.len(), 2);
        assert_eq!(score.tracks[0].name, "Meta");
        assert_eq!(score.tracks[1].name, "Lead");
        assert_eq!(score.tempo(), 400_000);

        let lead = &score.tracks[1];
        assert_eq!(
            lead.events[1].kind,
            EventKind::ProgramChange {
                program: 24,
                channel: 0
            }
        );
        assert_eq!(
            lead.events[2].kind,
            EventKind::NoteOn {
                pitch: 60,
                velocity: 100,
                channel: 0
            }
        );
        assert_eq!(lead.events[3].delta, 480);
        assert_eq!(lead.events[3].kind, EventKind::Other);
        assert_eq!(
            lead.events[5].kind,
            EventKind::NoteOn {
                pitch: 36,
                velocity: 80,
                channel: 9
            }
        );
        // velocity-0 note on does not count
        assert_eq!(lead.note_count(), 2);
    }

    #[test]
    fn timecode_rejected() {
        let result = ScoreFile::from_bytes(&two_track_file([0xE7, 0x28]));
        assert!(matches!(result, Err(DecodeError::UnsupportedTiming)));
    }

    #[test]
    fn garbage_rejected() {
        let result = ScoreFile::from_bytes(b"definitely not a midi file");
        assert!(matches!(result, Err(DecodeError::Parse(_))));
    }

    #[test]
    fn default_tempo() {
        let score = ScoreFile::new(96, vec![Track::new("only").with_note(0, 60)]);
        assert_eq!(score.tempo(), DEFAULT_MICROS_PER_BEAT);
    }

    #[test]
    fn tempo_only_from_first_track() {
        let tempo = |micros_per_beat| EventKind::TempoChange { micros_per_beat };
        let score = ScoreFile::new(
            96,
            vec![
                Track::new("meta")
                    .with_event(0, tempo(600_000))
                    .with_event(100, tempo(300_000)),
                Track::new("lead")
                    .with_event(0, tempo(1_000_000))
                    .with_note(0, 60),
            ],
        );
        assert_eq!(score.tempo(), 300_000);
    }

    #[test]
    fn busiest_track_tie_goes_to_lowest_index() {
        let score = ScoreFile::new(
            96,
            vec![
                Track::new("meta"),
                Track::new("a").with_note(0, 60).with_note(10, 62),
                Track::new("b").with_note(0, 64).with_note(10, 65),
                Track::new("c").with_note(0, 67),
            ],
        );
        assert_eq!(score.busiest_track(), Some(1));
        assert_eq!(score.playable_track_count(), 3);
    }

    #[test]
    fn memory_decoder_missing_path() {
        let decoder = MemoryDecoder::new();
        let result = decoder.decode(Path::new("nope.mid"));
        assert!(matches!(result, Err(DecodeError::Missing(_))));
    }

    #[test]
    fn file_decoder_missing_file() {
        let result = MidiFileDecoder.decode(Path::new("/definitely/not/here.mid"));
        assert!(matches!(result, Err(DecodeError::Io { .. })));
    }
}
