use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    EntryNotFound,
    FestivalNotFound,
    InvalidEntryName,
    InvalidStatus,
    InvalidEntityId,
    DestinationExists,
    CounterExhausted,
    RegistryCorrupt,
    HistoryCorrupt,
    ShiftAborted,
    FilesystemFailed,
    Cancelled,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::EntryNotFound => "E2001",
            Self::FestivalNotFound => "E2002",
            Self::InvalidEntryName => "E3001",
            Self::InvalidStatus => "E3002",
            Self::InvalidEntityId => "E3003",
            Self::DestinationExists => "E3004",
            Self::CounterExhausted => "E3005",
            Self::RegistryCorrupt => "E4001",
            Self::HistoryCorrupt => "E4002",
            Self::ShiftAborted => "E5001",
            Self::FilesystemFailed => "E5002",
            Self::Cancelled => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Festivals root not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::EntryNotFound => "Numbered entry not found",
            Self::FestivalNotFound => "Festival not found",
            Self::InvalidEntryName => "Malformed entry name",
            Self::InvalidStatus => "Invalid lifecycle status",
            Self::InvalidEntityId => "Invalid festival ID",
            Self::DestinationExists => "Destination already exists",
            Self::CounterExhausted => "ID counter exhausted for prefix",
            Self::RegistryCorrupt => "ID registry is corrupt",
            Self::HistoryCorrupt => "Status history is corrupt",
            Self::ShiftAborted => "Renumbering aborted part-way",
            Self::FilesystemFailed => "Filesystem operation failed",
            Self::Cancelled => "Operation cancelled",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `fest init` in the festivals root."),
            Self::ConfigParseError => Some("Fix syntax in .festival/config.toml and retry."),
            Self::EntryNotFound | Self::FestivalNotFound => None,
            Self::InvalidEntryName => Some("Entry names look like `001_NAME`, `01_name` or `01_name.md`."),
            Self::InvalidStatus => Some("Use one of: planned, active, completed, dungeon."),
            Self::InvalidEntityId => Some("IDs are two uppercase letters and four digits, e.g. GU0001."),
            Self::DestinationExists => Some("Move or rename the existing directory first; fest never overwrites."),
            Self::CounterExhausted => Some("Pick a name with a different two-letter prefix."),
            Self::RegistryCorrupt => Some("Run `fest reconcile` to rebuild the registry from disk."),
            Self::HistoryCorrupt => Some("Inspect .fest/status_history.json inside the festival."),
            Self::ShiftAborted => {
                Some("Inspect the listed renames and repair the directory by hand before retrying.")
            }
            Self::FilesystemFailed => Some("Check permissions and free disk space."),
            Self::Cancelled => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Coarse error taxonomy callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    NotFound,
    Validation,
    Io,
    Cancelled,
}

/// One rename performed by a shift.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct AppliedRename {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// Errors produced by the festival store.
#[derive(Debug, thiserror::Error)]
pub enum FestError {
    /// No `.festival/` marker was found at or above the given path.
    #[error("no festivals root found from {}", .0.display())]
    NotInitialized(PathBuf),

    /// `.festival/config.toml` could not be parsed.
    #[error("failed to parse {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    /// A parent directory or numbered sibling is missing.
    #[error("{what} not found: {}", path.display())]
    NotFound { what: &'static str, path: PathBuf },

    /// No festival matches the ID, name, or path given.
    #[error("festival not found: {0}")]
    FestivalNotFound(String),

    /// A name does not follow the numeric-prefix convention.
    #[error("malformed entry name '{0}'")]
    InvalidEntryName(String),

    /// Unknown lifecycle status text.
    #[error("invalid status '{0}'")]
    InvalidStatus(String),

    /// Text that is not a `PPNNNN` festival ID.
    #[error("invalid festival ID '{0}'")]
    InvalidEntityId(String),

    /// The target of a rename or move already exists.
    #[error("destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),

    /// All 9999 counters for a prefix have been issued.
    #[error("ID counter exhausted for prefix {0}")]
    CounterExhausted(String),

    /// The registry file exists but is not valid JSON.
    #[error("registry {} is corrupt: {source}", path.display())]
    RegistryCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The status history file exists but is not valid JSON.
    #[error("status history {} is corrupt: {source}", path.display())]
    HistoryCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A filesystem call failed.
    #[error("{op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A multi-rename shift stopped part-way. Renames in `applied` were not
    /// rolled back.
    #[error(
        "renumbering in {} aborted after {} rename(s): {source}",
        parent.display(),
        applied.len()
    )]
    ShiftAborted {
        parent: PathBuf,
        applied: Vec<AppliedRename>,
        #[source]
        source: Box<FestError>,
    },

    /// A [`CancelToken`](crate::cancel::CancelToken) was triggered.
    #[error("operation cancelled")]
    Cancelled,
}

impl FestError {
    /// Wrap an IO error with the operation and path that failed.
    pub fn io(op: &'static str, path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            op,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized(_) => ErrorCode::NotInitialized,
            Self::Config { .. } => ErrorCode::ConfigParseError,
            Self::NotFound { .. } => ErrorCode::EntryNotFound,
            Self::FestivalNotFound(_) => ErrorCode::FestivalNotFound,
            Self::InvalidEntryName(_) => ErrorCode::InvalidEntryName,
            Self::InvalidStatus(_) => ErrorCode::InvalidStatus,
            Self::InvalidEntityId(_) => ErrorCode::InvalidEntityId,
            Self::DestinationExists(_) => ErrorCode::DestinationExists,
            Self::CounterExhausted(_) => ErrorCode::CounterExhausted,
            Self::RegistryCorrupt { .. } => ErrorCode::RegistryCorrupt,
            Self::HistoryCorrupt { .. } => ErrorCode::HistoryCorrupt,
            Self::Io { .. } => ErrorCode::FilesystemFailed,
            Self::ShiftAborted { .. } => ErrorCode::ShiftAborted,
            Self::Cancelled => ErrorCode::Cancelled,
        }
    }

    /// Taxonomy bucket for this error. A shift abort reports the category of
    /// the failure that caused it.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotInitialized(_) | Self::NotFound { .. } | Self::FestivalNotFound(_) => {
                ErrorCategory::NotFound
            }
            Self::Config { .. }
            | Self::InvalidEntryName(_)
            | Self::InvalidStatus(_)
            | Self::InvalidEntityId(_)
            | Self::DestinationExists(_)
            | Self::CounterExhausted(_)
            | Self::RegistryCorrupt { .. }
            | Self::HistoryCorrupt { .. } => ErrorCategory::Validation,
            Self::Io { .. } => ErrorCategory::Io,
            Self::ShiftAborted { source, .. } => source.category(),
            Self::Cancelled => ErrorCategory::Cancelled,
        }
    }

    /// Optional remediation hint for operators and agents.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

pub type Result<T, E = FestError> = std::result::Result<T, E>;
