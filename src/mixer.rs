//! Track mixer: which tracks of a song get played.

use crate::score::{EventKind, PERCUSSION_CHANNEL, ScoreFile};
use crate::selection::PersistedSelection;
use std::collections::BTreeSet;

pub const DRUM_LABEL: &str = "DRUMS (Ch10)";
pub const UNKNOWN_INSTRUMENT: &str = "Unknown";

/// General MIDI level 1 program names.
pub const GM_INSTRUMENTS: [&str; 128] = [
    "Acoustic Grand Piano",
    "Bright Acoustic Piano",
    "Electric Grand Piano",
    "Honky-tonk Piano",
    "Electric Piano 1",
    "Electric Piano 2",
    "Harpsichord",
    "Clavinet",
    "Celesta",
    "Glockenspiel",
    "Music Box",
    "Vibraphone",
    "Marimba",
    "Xylophone",
    "Tubular Bells",
    "Dulcimer",
    "Drawbar Organ",
    "Percussive Organ",
    "Rock Organ",
    "Church Organ",
    "Reed Organ",
    "Accordion",
    "Harmonica",
    "Tango Accordion",
    "Acoustic Guitar (nylon)",
    "Acoustic Guitar (steel)",
    "Electric Guitar (jazz)",
    "Electric Guitar (clean)",
    "Electric Guitar (muted)",
    "Overdriven Guitar",
    "Distortion Guitar",
    "Guitar Harmonics",
    "Acoustic Bass",
    "Electric Bass (finger)",
    "Electric Bass (pick)",
    "Fretless Bass",
    "Slap Bass 1",
    "Slap Bass 2",
    "Synth Bass 1",
    "Synth Bass 2",
    "Violin",
    "Viola",
    "Cello",
    "Contrabass",
    "Tremolo Strings",
    "Pizzicato Strings",
    "Orchestral Harp",
    "Timpani",
    "String Ensemble 1",
    "String Ensemble 2",
    "Synth Strings 1",
    "Synth Strings 2",
    "Choir Aahs",
    "Voice Oohs",
    "Synth Voice",
    "Orchestra Hit",
    "Trumpet",
    "Trombone",
    "Tuba",
    "Muted Trumpet",
    "French Horn",
    "Brass Section",
    "Synth Brass 1",
    "Synth Brass 2",
    "Soprano Sax",
    "Alto Sax",
    "Tenor Sax",
    "Baritone Sax",
    "Oboe",
    "English Horn",
    "Bassoon",
    "Clarinet",
    "Piccolo",
    "Flute",
    "Recorder",
    "Pan Flute",
    "Blown Bottle",
    "Shakuhachi",
    "Whistle",
    "Ocarina",
    "Lead 1 (square)",
    "Lead 2 (sawtooth)",
    "Lead 3 (calliope)",
    "Lead 4 (chiff)",
    "Lead 5 (charang)",
    "Lead 6 (voice)",
    "Lead 7 (fifths)",
    "Lead 8 (bass + lead)",
    "Pad 1 (new age)",
    "Pad 2 (warm)",
    "Pad 3 (polysynth)",
    "Pad 4 (choir)",
    "Pad 5 (bowed)",
    "Pad 6 (metallic)",
    "Pad 7 (halo)",
    "Pad 8 (sweep)",
    "FX 1 (rain)",
    "FX 2 (soundtrack)",
    "FX 3 (crystal)",
    "FX 4 (atmosphere)",
    "FX 5 (brightness)",
    "FX 6 (goblins)",
    "FX 7 (echoes)",
    "FX 8 (sci-fi)",
    "Sitar",
    "Banjo",
    "Shamisen",
    "Koto",
    "Kalimba",
    "Bag pipe",
    "Fiddle",
    "Shanai",
    "Tinkle Bell",
    "Agogo",
    "Steel Drums",
    "Woodblock",
    "Taiko Drum",
    "Melodic Tom",
    "Synth Drum",
    "Reverse Cymbal",
    "Guitar Fret Noise",
    "Breath Noise",
    "Seashore",
    "Bird Tweet",
    "Telephone Ring",
    "Helicopter",
    "Applause",
    "Gunshot",
];

pub fn instrument_name(program: u8) -> &'static str {
    GM_INSTRUMENTS
        .get(program as usize)
        .copied()
        .unwrap_or(UNKNOWN_INSTRUMENT)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSummary {
    pub index: usize,
    pub name: String,
    pub note_count: usize,
    pub instrument: &'static str,
    pub is_drum: bool,
}

/// One summary per track that has sounding notes, in track order.
///
/// The instrument is decided by whichever comes first in the track: a
/// program change (its GM name) or a note on the percussion channel.
pub fn summarize(score: &ScoreFile) -> Vec<TrackSummary> {
    score
        .tracks
        .iter()
        .enumerate()
        .filter_map(|(index, track)| {
            let note_count = track.note_count();
            if note_count == 0 {
                return None;
            }

            let mut instrument = UNKNOWN_INSTRUMENT;
            let mut is_drum = false;
            for event in &track.events {
                match event.kind {
                    EventKind::ProgramChange { program, .. } => {
                        instrument = instrument_name(program);
                        break;
                    }
                    EventKind::NoteOn { channel, .. } if channel == PERCUSSION_CHANNEL => {
                        instrument = DRUM_LABEL;
                        is_drum = true;
                        break;
                    }
                    _ => {}
                }
            }

            Some(TrackSummary {
                index,
                name: track.name.trim().to_string(),
                note_count,
                instrument,
                is_drum,
            })
        })
        .collect()
}

/// An open mixer: the track list of the current song and the working
/// selection. Nothing is applied until the session is committed through the
/// engine handle.
#[derive(Debug, Clone)]
pub struct MixerSession {
    pub file_name: String,
    pub tracks: Vec<TrackSummary>,
    selected: BTreeSet<usize>,
}

impl MixerSession {
    /// Starts from the persisted selection if there is one, otherwise from
    /// the busiest track.
    pub fn new(file_name: String, score: &ScoreFile, saved: Option<&PersistedSelection>) -> Self {
        let tracks = summarize(score);
        let selected = match saved {
            Some(saved) => saved.tracks.clone(),
            None => tracks
                .iter()
                .fold(None::<&TrackSummary>, |best, t| match best {
                    Some(b) if b.note_count >= t.note_count => Some(b),
                    _ => Some(t),
                })
                .map(|t| BTreeSet::from([t.index]))
                .unwrap_or_default(),
        };
        Self {
            file_name,
            tracks,
            selected,
        }
    }

    /// Indices not listed in the mixer are ignored.
    pub fn toggle(&mut self, index: usize) -> bool {
        if !self.tracks.iter().any(|t| t.index == index) {
            return false;
        }
        if !self.selected.remove(&index) {
            self.selected.insert(index);
        }
        true
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.selected.contains(&index)
    }

    pub fn selected(&self) -> &BTreeSet<usize> {
        &self.selected
    }

    pub fn into_selection(self) -> BTreeSet<usize> {
        self.selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::Track;

    fn score() -> ScoreFile {
        let drum = EventKind::NoteOn {
            pitch: 36,
            velocity: 90,
            channel: PERCUSSION_CHANNEL,
        };
        ScoreFile::new(
            480,
            vec![
                Track::new("conductor"),
                Track::new("  Melody ")
                    .with_event(0, EventKind::ProgramChange { program: 73, channel: 0 })
                    .with_note(0, 60)
                    .with_note(10, 62),
                Track::new("Kit").with_event(0, drum).with_event(10, drum).with_event(10, drum),
                Track::new("Bass").with_note(0, 40),
            ],
        )
    }

    #[test]
    fn summarize_lists_tracks_with_notes() {
        let summary = summarize(&score());
        assert_eq!(summary.len(), 3);

        assert_eq!(summary[0].index, 1);
        assert_eq!(summary[0].name, "Melody");
        assert_eq!(summary[0].note_count, 2);
        assert_eq!(summary[0].instrument, "Flute");
        assert!(!summary[0].is_drum);

        assert_eq!(summary[1].instrument, DRUM_LABEL);
        assert!(summary[1].is_drum);

        assert_eq!(summary[2].instrument, UNKNOWN_INSTRUMENT);
    }

    #[test]
    fn program_change_after_drum_note() {
        let score = ScoreFile::new(
            480,
            vec![
                Track::new("odd")
                    .with_event(
                        0,
                        EventKind::NoteOn {
                            pitch: 38,
                            velocity: 0,
                            channel: PERCUSSION_CHANNEL,
                        },
                    )
                    .with_event(0, EventKind::ProgramChange { program: 0, channel: 0 })
                    .with_note(0, 60),
            ],
        );
        let summary = summarize(&score);
        assert_eq!(summary[0].instrument, DRUM_LABEL);
    }

    #[test]
    fn new_session_defaults_to_busiest() {
        let session = MixerSession::new("song.mid".into(), &score(), None);
        assert_eq!(session.selected(), &BTreeSet::from([2]));
    }

    #[test]
    fn new_session_uses_saved_selection() {
        let saved = PersistedSelection {
            tracks: BTreeSet::from([1, 3]),
            speed: 1.0,
        };
        let session = MixerSession::new("song.mid".into(), &score(), Some(&saved));
        assert!(session.is_selected(1));
        assert!(session.is_selected(3));
        assert!(!session.is_selected(2));
    }

    #[test]
    fn toggles_tracks_in_and_out() {
        let mut session = MixerSession::new("song.mid".into(), &score(), None);
        assert!(session.toggle(1));
        assert!(session.toggle(2));
        assert_eq!(session.selected(), &BTreeSet::from([1]));

        // conductor track has no notes and is not listed
        assert!(!session.toggle(0));
        assert!(!session.toggle(99));
        assert_eq!(session.into_selection(), BTreeSet::from([1]));
    }

    #[test]
    fn instrument_table() {
        assert_eq!(instrument_name(0), "Acoustic Grand Piano");
        assert_eq!(instrument_name(127), "Gunshot");
        assert_eq!(instrument_name(200), UNKNOWN_INSTRUMENT);
    }
}
