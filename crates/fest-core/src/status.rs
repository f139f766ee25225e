use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::FestError;

/// The four festival lifecycle states. Each is a directory under the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Planned,
    Active,
    Completed,
    Dungeon,
}

impl Status {
    pub const ALL: [Self; 4] = [Self::Planned, Self::Active, Self::Completed, Self::Dungeon];

    /// Directory name under the festivals root.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Dungeon => "dungeon",
        }
    }

    /// Whether entering this state files the festival under a `YYYY-MM`
    /// subdirectory.
    #[must_use]
    pub const fn is_dated(self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = FestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "planned" => Ok(Self::Planned),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "dungeon" => Ok(Self::Dungeon),
            _ => Err(FestError::InvalidStatus(s.to_string())),
        }
    }
}

/// Parse a `YYYY-MM` date directory name.
#[must_use]
pub fn parse_month_dir(name: &str) -> Option<(i32, u32)> {
    let (year, month) = name.split_once('-')?;
    if year.len() != 4 || month.len() != 2 {
        return None;
    }
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    (1..=12).contains(&month).then_some((year, month))
}

/// Format a `YYYY-MM` date directory name.
#[must_use]
pub fn month_dir_name(year: i32, month: u32) -> String {
    format!("{year:04}-{month:02}")
}
