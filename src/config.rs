use crate::emitter::NoteKeyMap;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub midi_root: PathBuf,
    pub db_file: PathBuf,
    pub note_hold_ms: u64,
    pub chord_strum_delay_ms: u64,
    pub speed_step: f64,
    pub seek_step_secs: f64,
    pub poll_interval_ms: u64,
    pub song_cooldown_ms: u64,
    pub handshake_timeout_ms: u64,
    /// Substring of a MIDI output port name. Unset means dry run.
    pub midi_out_port: Option<String>,
    pub keymap: NoteKeyMap,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            midi_root: PathBuf::from("midis"),
            db_file: PathBuf::from("track_selections.ron"),
            note_hold_ms: 0,
            chord_strum_delay_ms: 2,
            speed_step: 0.1,
            seek_step_secs: 10.0,
            poll_interval_ms: 50,
            song_cooldown_ms: 1000,
            handshake_timeout_ms: 2000,
            midi_out_port: None,
            keymap: NoteKeyMap::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ron_string = fs::read_to_string(path)?;
        let config: Config = ron::from_str(&ron_string)?;
        config.validate()?;
        Ok(config)
    }

    /// Missing file yields the defaults; a present but broken file is an error.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let ron_string = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        fs::write(path, ron_string)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.poll_interval_ms) {
            return Err(ConfigError::Invalid(format!(
                "poll_interval_ms must be between 1 and 100, got {}",
                self.poll_interval_ms
            )));
        }
        if !(self.speed_step.is_finite() && self.speed_step > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "speed_step must be positive, got {}",
                self.speed_step
            )));
        }
        if !(self.seek_step_secs.is_finite() && self.seek_step_secs > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "seek_step_secs must be positive, got {}",
                self.seek_step_secs
            )));
        }
        if self.handshake_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "handshake_timeout_ms must be non-zero".to_string(),
            ));
        }
        if self.keymap.is_empty() {
            return Err(ConfigError::Invalid("keymap is empty".to_string()));
        }
        Ok(())
    }

    pub fn note_hold(&self) -> Duration {
        Duration::from_millis(self.note_hold_ms)
    }

    pub fn chord_strum_delay(&self) -> Duration {
        Duration::from_millis(self.chord_strum_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn song_cooldown(&self) -> Duration {
        Duration::from_millis(self.song_cooldown_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.poll_interval(), Duration::from_millis(50));
        assert_eq!(config.keymap.len(), 36);
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("bardbox.ron");

        let config = Config {
            midi_root: PathBuf::from("/srv/songs"),
            midi_out_port: Some("loopMIDI".to_string()),
            chord_strum_delay_ms: 0,
            ..Config::default()
        };
        config.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bardbox.ron");
        fs::write(&path, "(song_cooldown_ms: 0, seek_step_secs: 5.0)").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.song_cooldown_ms, 0);
        assert_eq!(config.seek_step_secs, 5.0);
        assert_eq!(config.midi_root, PathBuf::from("midis"));
        assert_eq!(config.keymap, NoteKeyMap::default());
    }

    #[test]
    fn load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("absent.ron")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn poll_interval_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bardbox.ron");
        fs::write(&path, "(poll_interval_ms: 250)").unwrap();

        assert!(matches!(Config::load(&path), Err(ConfigError::Invalid(_))));

        let config = Config {
            poll_interval_ms: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bardbox.ron");
        fs::write(&path, "(midi_root: ").unwrap();
        assert!(matches!(
            Config::load_or_default(&path),
            Err(ConfigError::Parse(_))
        ));
    }
}
