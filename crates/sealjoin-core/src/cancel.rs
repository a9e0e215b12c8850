//! Cooperative cancellation for long-running merge and stamp work

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::SealJoinError;

/// Shared flag raised when the owning session is abandoned.
///
/// Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Bail out with [`SealJoinError::Cancelled`] once raised
    pub fn check(&self) -> Result<(), SealJoinError> {
        if self.is_cancelled() {
            Err(SealJoinError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Check an optional flag
pub(crate) fn check(flag: Option<&CancelFlag>) -> Result<(), SealJoinError> {
    flag.map_or(Ok(()), CancelFlag::check)
}
