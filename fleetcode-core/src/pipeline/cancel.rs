//! First-error-wins cancellation shared by the tasks of one job.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use once_cell::sync::OnceCell;

use crate::error::CoreError;

/// Broadcast cancellation flag. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Holds the first error reported by any task and cancels the token
/// when it is set.
#[derive(Debug)]
pub struct ErrorSlot {
    error: OnceCell<CoreError>,
    token: CancellationToken,
}

impl ErrorSlot {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            error: OnceCell::new(),
            token,
        }
    }

    /// Records `err` unless an error is already stored, then cancels.
    /// Returns true when `err` was the first.
    pub fn fail(&self, err: CoreError) -> bool {
        let first = self.error.set(err).is_ok();
        self.token.cancel();
        first
    }

    pub fn is_set(&self) -> bool {
        self.error.get().is_some()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn into_error(self) -> Option<CoreError> {
        self.error.into_inner()
    }
}
