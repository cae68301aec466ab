//! Camelot wheel notation for harmonic mixing.
//!
//! Twelve positions, each with a minor (`A`) and major (`B`) key. Neighbouring
//! positions and the relative major/minor at the same position mix cleanly.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Wheel position for each pitch class (C = 0) in a major key.
const MAJOR_POSITIONS: [u8; 12] = [8, 3, 10, 5, 12, 7, 2, 9, 4, 11, 6, 1];
/// Wheel position for each pitch class (C = 0) in a minor key.
const MINOR_POSITIONS: [u8; 12] = [5, 12, 7, 2, 9, 4, 11, 6, 1, 8, 3, 10];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CamelotLetter {
    /// Minor
    A,
    /// Major
    B,
}

impl CamelotLetter {
    pub const fn flipped(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

/// A wheel label such as `8B`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CamelotKey {
    number: u8,
    letter: CamelotLetter,
}

lazy_static::lazy_static! {
    /// Every label mapped to its four compatible labels, itself included.
    pub static ref KEY_COMPATIBILITY: HashMap<CamelotKey, [CamelotKey; 4]> = CamelotKey::all()
        .map(|key| (key, key.compatible()))
        .collect();
}

impl CamelotKey {
    /// `number` must be 1..=12.
    pub fn new(number: u8, letter: CamelotLetter) -> Option<Self> {
        (1..=12).contains(&number).then_some(Self { number, letter })
    }

    /// Label for a pitch class (0..=11) and mode (1 major, 0 minor).
    pub fn from_key_mode(key: u8, mode: u8) -> Option<Self> {
        let index = usize::from(key);
        if index >= 12 {
            return None;
        }
        let (positions, letter) = if mode == 1 {
            (MAJOR_POSITIONS, CamelotLetter::B)
        } else {
            (MINOR_POSITIONS, CamelotLetter::A)
        };
        Some(Self {
            number: positions[index],
            letter,
        })
    }

    pub fn all() -> impl Iterator<Item = Self> {
        (1..=12).flat_map(|number| {
            [CamelotLetter::A, CamelotLetter::B]
                .into_iter()
                .map(move |letter| Self { number, letter })
        })
    }

    pub const fn number(&self) -> u8 {
        self.number
    }

    pub const fn letter(&self) -> CamelotLetter {
        self.letter
    }

    /// Itself, one step either way round the wheel, and the relative key.
    pub fn compatible(&self) -> [Self; 4] {
        let up = self.number % 12 + 1;
        let down = (self.number + 10) % 12 + 1;
        [
            *self,
            Self { number: down, letter: self.letter },
            Self { number: up, letter: self.letter },
            Self { number: self.number, letter: self.letter.flipped() },
        ]
    }

    pub fn is_compatible_with(&self, other: &Self) -> bool {
        self.compatible().contains(other)
    }

    /// Steps between the two positions going the short way round (0..=6).
    pub fn wheel_distance(&self, other: &Self) -> u8 {
        let diff = self.number.abs_diff(other.number);
        diff.min(12 - diff)
    }
}

impl fmt::Display for CamelotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self.letter {
            CamelotLetter::A => 'A',
            CamelotLetter::B => 'B',
        };
        write!(f, "{}{}", self.number, letter)
    }
}

impl FromStr for CamelotKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let Some((split, last)) = s.char_indices().last() else {
            anyhow::bail!("Camelot key is empty");
        };
        let letter = match last {
            'A' | 'a' => CamelotLetter::A,
            'B' | 'b' => CamelotLetter::B,
            _ => anyhow::bail!("Camelot key '{s}' must end in A or B"),
        };
        let number: u8 = s[..split]
            .parse()
            .with_context(|| format!("Camelot key '{s}' has no valid wheel number"))?;
        Self::new(number, letter)
            .ok_or_else(|| anyhow::anyhow!("Camelot wheel number {number} is outside 1..=12"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(label: &str) -> CamelotKey {
        label.parse().unwrap()
    }

    #[test]
    fn test_known_key_mode_labels() {
        // C major, A minor, F# minor, B major
        assert_eq!(CamelotKey::from_key_mode(0, 1).unwrap().to_string(), "8B");
        assert_eq!(CamelotKey::from_key_mode(9, 0).unwrap().to_string(), "8A");
        assert_eq!(CamelotKey::from_key_mode(6, 0).unwrap().to_string(), "11A");
        assert_eq!(CamelotKey::from_key_mode(11, 1).unwrap().to_string(), "1B");
        assert!(CamelotKey::from_key_mode(12, 1).is_none());
    }

    #[test]
    fn test_lookup_covers_all_24_labels() {
        let labels: std::collections::HashSet<String> = (0..12)
            .flat_map(|k| [0, 1].map(|m| CamelotKey::from_key_mode(k, m).unwrap().to_string()))
            .collect();
        assert_eq!(labels.len(), 24);
    }

    #[test]
    fn test_compatibility_table_shape() {
        assert_eq!(KEY_COMPATIBILITY.len(), 24);
        for (label, compatible) in KEY_COMPATIBILITY.iter() {
            assert!(compatible.contains(label), "{label} must be self-compatible");
            let unique: std::collections::HashSet<_> = compatible.iter().collect();
            assert_eq!(unique.len(), 4, "{label} must have 4 distinct entries");
        }
    }

    #[test]
    fn test_wraparound_at_wheel_edges() {
        let one_a = KEY_COMPATIBILITY[&key("1A")];
        assert!(one_a.contains(&key("12A")));
        assert!(one_a.contains(&key("2A")));
        assert!(one_a.contains(&key("1B")));

        let twelve_b = KEY_COMPATIBILITY[&key("12B")];
        assert!(twelve_b.contains(&key("11B")));
        assert!(twelve_b.contains(&key("1B")));
        assert!(twelve_b.contains(&key("12A")));
    }

    #[test]
    fn test_wheel_distance_is_circular() {
        assert_eq!(key("1A").wheel_distance(&key("12A")), 1);
        assert_eq!(key("3B").wheel_distance(&key("9A")), 6);
        assert_eq!(key("5A").wheel_distance(&key("5B")), 0);
    }

    #[test]
    fn test_parse_rejects_bad_labels() {
        assert!("13A".parse::<CamelotKey>().is_err());
        assert!("0B".parse::<CamelotKey>().is_err());
        assert!("8C".parse::<CamelotKey>().is_err());
        assert!("".parse::<CamelotKey>().is_err());
        assert_eq!(key(" 10b ").to_string(), "10B");
    }
}
