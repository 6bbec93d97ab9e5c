use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Modifier {
    Shift,
    Ctrl,
}

/// A key press, optionally chorded with a modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyStroke {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier: Option<Modifier>,
    pub key: char,
}

impl KeyStroke {
    pub const fn plain(key: char) -> Self {
        Self {
            modifier: None,
            key,
        }
    }

    pub const fn with(modifier: Modifier, key: char) -> Self {
        Self {
            modifier: Some(modifier),
            key,
        }
    }
}

impl fmt::Display for KeyStroke {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.modifier {
            Some(Modifier::Shift) => write!(f, "shift+{}", self.key),
            Some(Modifier::Ctrl) => write!(f, "ctrl+{}", self.key),
            None => write!(f, "{}", self.key),
        }
    }
}

const LOWEST_NOTE: u8 = 48;

const ROWS: [&str; 3] = ["zxcvbnm", "asdfghj", "qwertyu"];

/// Semitone -> (modifier, natural key column) within one octave row.
const OCTAVE_LAYOUT: [(Option<Modifier>, usize); 12] = [
    (None, 0),
    (Some(Modifier::Shift), 0),
    (None, 1),
    (Some(Modifier::Ctrl), 2),
    (None, 2),
    (None, 3),
    (Some(Modifier::Shift), 3),
    (None, 4),
    (Some(Modifier::Shift), 4),
    (None, 5),
    (Some(Modifier::Ctrl), 6),
    (None, 6),
];

/// Pitch -> key stroke. Pitches outside the map are never emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteKeyMap(BTreeMap<u8, KeyStroke>);

impl NoteKeyMap {
    pub fn new(map: BTreeMap<u8, KeyStroke>) -> Self {
        Self(map)
    }

    pub fn get(&self, pitch: u8) -> Option<KeyStroke> {
        self.0.get(&pitch).copied()
    }

    pub fn contains(&self, pitch: u8) -> bool {
        self.0.contains_key(&pitch)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for NoteKeyMap {
    /// Three octaves from C3 (48) to B5 (83) on the z/a/q rows.
    fn default() -> Self {
        let mut map = BTreeMap::new();
        for (octave, row) in ROWS.iter().enumerate() {
            let keys: Vec<char> = row.chars().collect();
            for (semitone, (modifier, column)) in OCTAVE_LAYOUT.iter().enumerate() {
                let pitch = LOWEST_NOTE + (octave * 12 + semitone) as u8;
                map.insert(
                    pitch,
                    KeyStroke {
                        modifier: *modifier,
                        key: keys[*column],
                    },
                );
            }
        }
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout() {
        let map = NoteKeyMap::default();
        assert_eq!(map.len(), 36);
        assert_eq!(map.get(48), Some(KeyStroke::plain('z')));
        assert_eq!(map.get(49), Some(KeyStroke::with(Modifier::Shift, 'z')));
        assert_eq!(map.get(51), Some(KeyStroke::with(Modifier::Ctrl, 'c')));
        assert_eq!(map.get(60), Some(KeyStroke::plain('a')));
        assert_eq!(map.get(70), Some(KeyStroke::with(Modifier::Ctrl, 'j')));
        assert_eq!(map.get(83), Some(KeyStroke::plain('u')));
        assert!(!map.contains(47));
        assert!(!map.contains(84));
    }

    #[test]
    fn display() {
        assert_eq!(KeyStroke::with(Modifier::Shift, 'q').to_string(), "shift+q");
        assert_eq!(KeyStroke::plain('m').to_string(), "m");
    }

    #[test]
    fn parse_custom_map() {
        let text = "{60: (key: 'a'), 61: (modifier: Some(Shift), key: 'a')}";
        let map: NoteKeyMap = ron::from_str(text).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(60), Some(KeyStroke::plain('a')));
        assert_eq!(map.get(61), Some(KeyStroke::with(Modifier::Shift, 'a')));
    }
}
