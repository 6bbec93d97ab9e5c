//! Finding songs on disk.

use crate::error::PlaylistError;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const MIDI_EXTENSIONS: [&str; 2] = ["mid", "midi"];

pub fn is_midi(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| MIDI_EXTENSIONS.iter().any(|m| ext.eq_ignore_ascii_case(m)))
        .unwrap_or(false)
}

/// All MIDI files under `root`, sorted. With `folder` set, only the files
/// directly inside `root/folder`; otherwise the whole tree.
pub fn scan(root: &Path, folder: Option<&str>) -> Result<Vec<PathBuf>, PlaylistError> {
    let (dir, depth) = match folder {
        Some(name) => (root.join(name), 1),
        None => (root.to_path_buf(), usize::MAX),
    };
    if !dir.is_dir() {
        return Err(PlaylistError::Io {
            path: dir,
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        });
    }

    let mut files: Vec<PathBuf> = WalkDir::new(&dir)
        .max_depth(depth)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_midi(e.path()))
        .map(|e| e.path().to_path_buf())
        .collect();

    if files.is_empty() {
        return Err(PlaylistError::Empty(dir));
    }
    files.sort();
    tracing::debug!(dir = %dir.display(), count = files.len(), "scanned playlist");
    Ok(files)
}

/// Names of the immediate subdirectories of `root`, sorted.
pub fn subfolders(root: &Path) -> Result<Vec<String>, PlaylistError> {
    let entries = fs::read_dir(root).map_err(|source| PlaylistError::Io {
        path: root.to_path_buf(),
        source,
    })?;

    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    Ok(names)
}

/// `path` relative to `root` for display, falling back to the file name.
pub fn display_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| crate::selection::selection_key(path))
}
