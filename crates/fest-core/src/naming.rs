//! Numeric-prefix names for phases, sequences, and tasks.
//!
//! ```text
//! 001_PLANNING/            phase     (3-digit prefix, directory)
//!   01_requirements/       sequence  (2-digit prefix, directory)
//!     01_gather_inputs.md  task      (2-digit prefix, markdown file)
//! ```
//!
//! Formatting always pads to the kind's width. Parsing accepts any run of
//! leading digits followed by `_` or `-` so hand-edited and older trees
//! still scan.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::FestError;

/// Slug used when a name contains no usable characters.
pub const FALLBACK_SLUG: &str = "untitled";

/// Separator written between the number and the slug.
pub const NUMBER_SEPARATOR: char = '_';

/// The three kinds of numbered entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Phase,
    Sequence,
    Task,
}

impl EntryKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Phase => "phase",
            Self::Sequence => "sequence",
            Self::Task => "task",
        }
    }

    /// Zero-padded width of the number prefix.
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::Phase => 3,
            Self::Sequence | Self::Task => 2,
        }
    }

    /// File extension for file-backed kinds, including the dot.
    #[must_use]
    pub const fn extension(self) -> Option<&'static str> {
        match self {
            Self::Task => Some(".md"),
            Self::Phase | Self::Sequence => None,
        }
    }

    /// Whether entries of this kind are directories (otherwise files).
    #[must_use]
    pub const fn is_dir(self) -> bool {
        matches!(self, Self::Phase | Self::Sequence)
    }

    /// Phase names are labels like `PLANNING` and keep their case; the
    /// nested kinds are lowercased.
    const fn preserves_case(self) -> bool {
        matches!(self, Self::Phase)
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryKind {
    type Err = FestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "phase" => Ok(Self::Phase),
            "sequence" | "seq" => Ok(Self::Sequence),
            "task" => Ok(Self::Task),
            _ => Err(FestError::InvalidEntryName(s.to_string())),
        }
    }
}

/// Reduce a human name to a filesystem-safe slug for `kind`.
///
/// Runs of non-alphanumeric characters collapse to a single `_`, leading and
/// trailing separators are trimmed, and an empty result becomes
/// [`FALLBACK_SLUG`].
#[must_use]
pub fn slugify(kind: EntryKind, name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_sep = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push(NUMBER_SEPARATOR);
            }
            pending_sep = false;
            if kind.preserves_case() {
                slug.push(c);
            } else {
                slug.push(c.to_ascii_lowercase());
            }
        } else {
            pending_sep = true;
        }
    }

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// Format the on-disk name for entry `number` of `kind` called `name`.
#[must_use]
pub fn format_name(kind: EntryKind, number: u32, name: &str) -> String {
    let slug = slugify(kind, name);
    let ext = kind.extension().unwrap_or("");
    format!(
        "{number:0width$}{NUMBER_SEPARATOR}{slug}{ext}",
        width = kind.width()
    )
}

/// A successfully parsed numeric-prefix name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub number: u32,
    /// Separator found after the digits (`_` or `-`).
    pub separator: char,
    /// Everything after the separator, extension included.
    pub rest: String,
}

impl ParsedName {
    /// The slug, with a task's `.md` extension removed.
    #[must_use]
    pub fn slug(&self) -> &str {
        self.rest.strip_suffix(".md").unwrap_or(&self.rest)
    }

    /// The same name carrying a different number, re-padded to `kind`'s
    /// width. The separator and the text after it are kept verbatim.
    #[must_use]
    pub fn renumbered(&self, kind: EntryKind, number: u32) -> String {
        format!(
            "{number:0width$}{}{}",
            self.separator,
            self.rest,
            width = kind.width()
        )
    }
}

/// Parse a numeric-prefix name. Returns `None` for anything that does not
/// start with a positive number followed by a separator and a non-empty
/// remainder.
#[must_use]
pub fn parse_name(name: &str) -> Option<ParsedName> {
    let digits_end = name
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(name.len(), |(i, _)| i);
    if digits_end == 0 {
        return None;
    }

    let number: u32 = name[..digits_end].parse().ok()?;
    if number == 0 {
        return None;
    }

    let mut tail = name[digits_end..].chars();
    let separator = tail.next().filter(|c| *c == '_' || *c == '-')?;
    let rest = tail.as_str();
    if rest.is_empty() {
        return None;
    }

    Some(ParsedName {
        number,
        separator,
        rest: rest.to_string(),
    })
}

/// Parse a name as an entry of `kind`: tasks must carry the `.md`
/// extension, directory kinds must not.
#[must_use]
pub fn parse_kind_name(kind: EntryKind, name: &str) -> Option<ParsedName> {
    let parsed = parse_name(name)?;
    let has_md = parsed.rest.ends_with(".md");
    match kind.extension() {
        Some(_) if has_md && !parsed.slug().is_empty() => Some(parsed),
        None if !has_md => Some(parsed),
        _ => None,
    }
}
