//! Per-file track selection and speed, remembered between sessions.
//!
//! Entries are keyed by file name (not full path) so a library can be moved
//! without losing its mixes. The on-disk store is a single RON map.

use crate::error::StoreError;
use crate::state::DEFAULT_SPEED;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSelection {
    pub tracks: BTreeSet<usize>,
    #[serde(default = "default_speed")]
    pub speed: f64,
}

fn default_speed() -> f64 {
    DEFAULT_SPEED
}

pub fn selection_key(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

pub trait SelectionStore: Send + Sync {
    fn get(&self, file_name: &str) -> Option<PersistedSelection>;
    fn put(&self, file_name: &str, selection: PersistedSelection) -> Result<(), StoreError>;
}

/// Selections kept in a RON file, rewritten on every `put`.
pub struct RonSelectionStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, PersistedSelection>>,
}

impl RonSelectionStore {
    /// Opens `path`, failing on unreadable or malformed content. A missing
    /// file is an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = if path.exists() {
            let text = fs::read_to_string(&path)?;
            ron::from_str(&text)?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Like [`RonSelectionStore::load`], but a corrupt file is replaced by an
    /// empty store on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::load(path.clone()) {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable selection store");
                Self {
                    path,
                    entries: Mutex::new(BTreeMap::new()),
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn save(&self, entries: &BTreeMap<String, PersistedSelection>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let text = ron::ser::to_string_pretty(entries, ron::ser::PrettyConfig::default())?;
        fs::write(&self.path, text)?;
        Ok(())
    }
}

impl SelectionStore for RonSelectionStore {
    fn get(&self, file_name: &str) -> Option<PersistedSelection> {
        self.entries.lock().get(file_name).cloned()
    }

    fn put(&self, file_name: &str, selection: PersistedSelection) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        entries.insert(file_name.to_string(), selection);
        self.save(&entries)
    }
}

#[derive(Default)]
pub struct MemorySelectionStore {
    entries: Mutex<BTreeMap<String, PersistedSelection>>,
}

impl MemorySelectionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SelectionStore for MemorySelectionStore {
    fn get(&self, file_name: &str) -> Option<PersistedSelection> {
        self.entries.lock().get(file_name).cloned()
    }

    fn put(&self, file_name: &str, selection: PersistedSelection) -> Result<(), StoreError> {
        self.entries.lock().insert(file_name.to_string(), selection);
        Ok(())
    }
}
