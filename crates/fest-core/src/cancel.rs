//! Cooperative cancellation for multi-step filesystem operations.
//!
//! Mutating operations check the token on entry and once per loop iteration.
//! Cancellation stops further mutation; renames that already happened stay.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{FestError, Result};

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Return [`FestError::Cancelled`] if cancellation was requested.
    ///
    /// # Errors
    ///
    /// Returns [`FestError::Cancelled`] once [`cancel`](Self::cancel) has been called.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(FestError::Cancelled)
        } else {
            Ok(())
        }
    }
}
