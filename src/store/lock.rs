//! Interruptible lock acquisition
//!
//! Device locks block without a timeout. A caller that wants to be able to
//! abandon the wait passes a [`CancelToken`]; the wait then polls the lock in
//! short timed slices and gives up with `Interrupted` once the token fires.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{Result, StoreError};

/// Slice of time between cancellation checks while waiting
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Shared cancellation flag for lock waits
///
/// Clones share the same flag, so one thread can cancel another's wait.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal every holder of this token
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Clear the signal so the token can be reused
    pub fn clear(&self) {
        self.cancelled.store(false, Ordering::Release);
    }
}

/// Acquire the writer side, failing if `token` fires first
///
/// A token that is already cancelled fails immediately, even if the lock is
/// free, so no mutation happens after a cancellation has been observed.
pub fn write<'a, T>(lock: &'a RwLock<T>, token: Option<&CancelToken>) -> Result<RwLockWriteGuard<'a, T>> {
    let Some(token) = token else {
        return Ok(lock.write());
    };

    loop {
        if token.is_cancelled() {
            return Err(StoreError::Interrupted);
        }
        if let Some(guard) = lock.try_write_for(POLL_INTERVAL) {
            return Ok(guard);
        }
    }
}

/// Acquire the reader side, failing if `token` fires first
pub fn read<'a, T>(lock: &'a RwLock<T>, token: Option<&CancelToken>) -> Result<RwLockReadGuard<'a, T>> {
    let Some(token) = token else {
        return Ok(lock.read());
    };

    loop {
        if token.is_cancelled() {
            return Err(StoreError::Interrupted);
        }
        if let Some(guard) = lock.try_read_for(POLL_INTERVAL) {
            return Ok(guard);
        }
    }
}
