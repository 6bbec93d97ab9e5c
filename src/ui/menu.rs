//! Line-based menus: playlist selection and the track mixer.
//!
//! These run with the terminal in cooked mode and read whole lines, so they
//! take any reader/writer pair.

use crate::error::{PlaylistError, UiError};
use crate::mixer::MixerSession;
use crate::playlist;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

const RULE_WIDTH: usize = 70;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistChoice {
    /// "ALL" or the subfolder name.
    pub folder: String,
    pub songs: Vec<PathBuf>,
    pub start_index: usize,
}

/// Reads one line, trimmed. `None` at end of input.
fn prompt<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    label: &str,
) -> std::io::Result<Option<String>> {
    write!(output, "{label}")?;
    output.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn rule<W: Write>(output: &mut W) -> std::io::Result<()> {
    writeln!(output, "{}", "=".repeat(RULE_WIDTH))
}

/// Asks for a folder under `root` and a start song. `None` when the user
/// backs out or the folder holds no songs.
pub fn select_playlist<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    root: &Path,
) -> Result<Option<PlaylistChoice>, UiError> {
    let folders = playlist::subfolders(root)?;

    rule(output)?;
    writeln!(output, "PLAYLIST SELECTION")?;
    rule(output)?;
    writeln!(output, "[1]  ALL SONGS")?;
    for (i, folder) in folders.iter().enumerate() {
        writeln!(output, "[{}]  {}", i + 2, folder)?;
    }

    let Some(answer) = prompt(input, output, "\nSelect folder # > ")? else {
        return Ok(None);
    };
    let Ok(choice) = answer.parse::<usize>() else {
        return Ok(None);
    };
    let folder = match choice {
        1 => None,
        n if n >= 2 && n - 2 < folders.len() => Some(folders[n - 2].as_str()),
        _ => return Ok(None),
    };

    let songs = match playlist::scan(root, folder) {
        Ok(songs) => songs,
        Err(PlaylistError::Empty(dir)) => {
            writeln!(output, "No MIDI files in {}", dir.display())?;
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };
    let folder = folder.unwrap_or("ALL").to_string();

    writeln!(output, "--- SONGS IN: {folder} ---")?;
    for (i, song) in songs.iter().enumerate() {
        writeln!(output, "[{}] {}", i + 1, playlist::display_name(root, song))?;
    }

    let start_index = prompt(input, output, "\nStart song # > ")?
        .and_then(|answer| answer.parse::<usize>().ok())
        .filter(|&n| n >= 1 && n <= songs.len())
        .map(|n| n - 1)
        .unwrap_or(0);

    Ok(Some(PlaylistChoice {
        folder,
        songs,
        start_index,
    }))
}

pub fn render_mixer(session: &MixerSession) -> String {
    let mut out = String::new();
    let rule = "=".repeat(RULE_WIDTH);
    let thin = "-".repeat(RULE_WIDTH);

    out.push_str(&format!("{rule}\nTRACK MIXER: {}\n{rule}\n", session.file_name));
    out.push_str("Toggle tracks by number. Press ENTER to resume.\n");
    out.push_str(&format!("{thin}\n"));
    out.push_str(&format!(
        "{:<4} {:<5} {:<8} {:<25} NAME\n",
        "#", "[x]", "NOTES", "INSTRUMENT"
    ));
    for track in &session.tracks {
        let check = if session.is_selected(track.index) {
            "[x]"
        } else {
            "[ ]"
        };
        let warning = if track.is_drum { " (drums)" } else { "" };
        out.push_str(&format!(
            "{:<4} {:<5} {:<8} {:<25} {}{}\n",
            track.index, check, track.note_count, track.instrument, track.name, warning
        ));
    }
    out.push_str(&format!("{thin}\n"));
    out
}

/// Toggles tracks until an empty line (or end of input).
pub fn run_mixer<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    session: &mut MixerSession,
) -> std::io::Result<()> {
    loop {
        write!(output, "{}", render_mixer(session))?;
        let Some(answer) = prompt(input, output, "Toggle # > ")? else {
            return Ok(());
        };
        if answer.is_empty() {
            return Ok(());
        }
        match answer.parse::<usize>() {
            Ok(index) => {
                if !session.toggle(index) {
                    writeln!(output, "No track {index} in this song")?;
                }
            }
            Err(_) => writeln!(output, "Not a track number: {answer}")?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::{ScoreFile, Track};
    use std::collections::BTreeSet;
    use std::fs;
    use std::io::Cursor;

    fn library() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("classics")).unwrap();
        fs::create_dir_all(dir.path().join("empty")).unwrap();
        for file in ["one.mid", "two.mid", "classics/three.mid"] {
            fs::write(dir.path().join(file), b"").unwrap();
        }
        dir
    }

    fn select(root: &Path, answers: &str) -> Option<PlaylistChoice> {
        let mut input = Cursor::new(answers.as_bytes().to_vec());
        let mut output = Vec::new();
        select_playlist(&mut input, &mut output, root).unwrap()
    }

    #[test]
    fn select_all_songs() {
        let dir = library();
        let choice = select(dir.path(), "1\n3\n").unwrap();
        assert_eq!(choice.folder, "ALL");
        assert_eq!(choice.songs.len(), 3);
        assert_eq!(choice.start_index, 2);
    }

    #[test]
    fn select_subfolder() {
        let dir = library();
        // folders are listed sorted: classics = 2, empty = 3
        let choice = select(dir.path(), "2\n\n").unwrap();
        assert_eq!(choice.folder, "classics");
        assert_eq!(choice.songs, vec![dir.path().join("classics/three.mid")]);
        assert_eq!(choice.start_index, 0);
    }

    #[test]
    fn select_backs_out() {
        let dir = library();
        assert_eq!(select(dir.path(), "\n"), None);
        assert_eq!(select(dir.path(), "9\n"), None);
        assert_eq!(select(dir.path(), "abc\n"), None);
        assert_eq!(select(dir.path(), "3\n"), None);
        assert_eq!(select(dir.path(), ""), None);
    }

    #[test]
    fn bad_start_song_falls_back_to_first() {
        let dir = library();
        assert_eq!(select(dir.path(), "1\n42\n").unwrap().start_index, 0);
    }

    fn session() -> MixerSession {
        let score = ScoreFile::new(
            480,
            vec![
                Track::new("meta"),
                Track::new("Piano").with_note(0, 60).with_note(0, 64),
                Track::new("Bass").with_note(0, 40),
            ],
        );
        MixerSession::new("song.mid".into(), &score, None)
    }

    #[test]
    fn run_mixer_toggles_until_blank_line() {
        let mut session = session();
        let mut input = Cursor::new(b"2\n1\n7\nx\n\n2\n".to_vec());
        let mut output = Vec::new();
        run_mixer(&mut input, &mut output, &mut session).unwrap();

        assert_eq!(session.selected(), &BTreeSet::from([2]));
        let printed = String::from_utf8(output).unwrap();
        assert!(printed.contains("No track 7 in this song"));
        assert!(printed.contains("Not a track number: x"));
    }

    #[test]
    fn lists_tracks_with_checkboxes() {
        let rendered = render_mixer(&session());
        assert!(rendered.contains("TRACK MIXER: song.mid"));
        assert!(rendered.contains("1    [x]   2        Unknown"));
        assert!(rendered.contains("2    [ ]   1"));
        assert!(!rendered.contains("meta"));
    }
}
