//! Festival identifiers: a two-letter prefix plus a four-digit counter.
//!
//! `"guild usable"` gets prefix `GU`; the registry hands out `GU0001`,
//! `GU0002`, ... and the ID is appended to the directory name as
//! `guild-usable_GU0001`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

use crate::error::FestError;

/// Highest counter representable in four digits.
pub const MAX_COUNTER: u32 = 9999;

/// Prefix used when a name has no letters at all.
pub const FALLBACK_PREFIX: &str = "FE";

/// Words skipped when picking prefix letters.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "at", "by", "for", "in", "of", "on", "or", "the", "to", "with",
];

/// Immutable festival ID such as `GU0001`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    prefix: String,
    counter: u32,
}

impl EntityId {
    /// Build an ID from parts.
    ///
    /// # Errors
    ///
    /// Returns [`FestError::InvalidEntityId`] unless `prefix` is two ASCII
    /// uppercase letters and `counter` is in `1..=9999`.
    pub fn new(prefix: &str, counter: u32) -> Result<Self, FestError> {
        if !is_valid_prefix(prefix) || counter == 0 || counter > MAX_COUNTER {
            return Err(FestError::InvalidEntityId(format!("{prefix}{counter:04}")));
        }
        Ok(Self {
            prefix: prefix.to_string(),
            counter,
        })
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub const fn counter(&self) -> u32 {
        self.counter
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:04}", self.prefix, self.counter)
    }
}

impl FromStr for EntityId {
    type Err = FestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || FestError::InvalidEntityId(s.to_string());
        if s.len() != 6 || !s.is_ascii() {
            return Err(invalid());
        }
        let (prefix, digits) = s.split_at(2);
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let counter: u32 = digits.parse().map_err(|_| invalid())?;
        Self::new(prefix, counter).map_err(|_| invalid())
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

fn is_valid_prefix(prefix: &str) -> bool {
    prefix.len() == 2 && prefix.bytes().all(|b| b.is_ascii_uppercase())
}

/// Derive the two-letter prefix for a festival name.
///
/// Takes the first letter of each of the first two significant words, or
/// the first two letters of the only significant word. Stop words count as
/// significant only when nothing else is left.
#[must_use]
pub fn derive_prefix(name: &str) -> String {
    let words: Vec<String> = name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .map(|w| w.chars().filter(char::is_ascii_alphabetic).collect::<String>())
        .filter(|w| !w.is_empty())
        .collect();

    let significant: Vec<&String> = words
        .iter()
        .filter(|w| !STOP_WORDS.contains(&w.to_ascii_lowercase().as_str()))
        .collect();
    let chosen: Vec<&String> = if significant.is_empty() {
        words.iter().collect()
    } else {
        significant
    };

    let letters: String = match chosen.as_slice() {
        [] => return FALLBACK_PREFIX.to_string(),
        [only] => {
            let mut it = only.chars();
            let first = it.next().unwrap_or('F');
            let second = it.next().unwrap_or(first);
            [first, second].iter().collect()
        }
        [first, second, ..] => [first.chars().next(), second.chars().next()]
            .into_iter()
            .flatten()
            .collect(),
    };

    letters.to_ascii_uppercase()
}

/// Pull a trailing `_PPNNNN` ID out of a festival directory name.
///
/// Returns `None` for names without a valid suffix; such festivals predate
/// the registry and are simply unregistered.
#[must_use]
pub fn extract_id_from_dir_name(name: &str) -> Option<EntityId> {
    let (stem, suffix) = name.rsplit_once('_')?;
    if stem.is_empty() {
        return None;
    }
    suffix.parse().ok()
}

/// Festival slug: lowercase words joined with `-`.
#[must_use]
pub fn festival_slug(name: &str) -> String {
    let words: Vec<String> = name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_ascii_lowercase)
        .collect();
    if words.is_empty() {
        "festival".to_string()
    } else {
        words.join("-")
    }
}

/// Directory name for a festival, with its ID suffix.
#[must_use]
pub fn festival_dir_name(name: &str, id: &EntityId) -> String {
    format!("{}_{id}", festival_slug(name))
}
