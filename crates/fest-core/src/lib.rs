//! fest-core library.
//!
//! A festivals root holds one directory per lifecycle status. Each festival
//! contains numbered phases (`001_PLANNING/`), sequences (`01_requirements/`)
//! and task files (`01_scope.md`).
//!
//! # Conventions
//!
//! - **Errors**: [`FestError`] with a stable [`ErrorCode`]; `anyhow` only for
//!   config loading.
//! - **Logging**: `tracing` macros. `debug!` per rename or copy, `info!` per
//!   completed operation, `warn!` for side records that were skipped.
//! - **Concurrency**: one writer per festivals root. Nothing here takes a
//!   lock; the registry and history files are replaced atomically.

pub mod cancel;
pub mod config;
pub mod error;
pub mod fsops;
pub mod history;
pub mod id;
pub mod lifecycle;
pub mod naming;
pub mod registry;
pub mod renumber;
pub mod root;
pub mod scan;
pub mod status;

pub use cancel::CancelToken;
pub use error::{AppliedRename, ErrorCategory, ErrorCode, FestError, Result};
pub use id::EntityId;
pub use lifecycle::{SideRecord, StatusEngine, Transition, TransitionOutcome};
pub use naming::EntryKind;
pub use registry::{Registry, RegistryEntry};
pub use renumber::{InsertOutcome, RemoveOutcome, Renumberer};
pub use status::Status;
