//! Per-instance re-entrancy guard.

use parking_lot::{Mutex, MutexGuard};

use crate::error::LaunchpadError;

/// Guarded operations on one instance never nest or overlap.
/// The flag lives exactly as long as the returned [`GuardScope`].
#[derive(Default)]
pub struct AtomicGuard {
    exec: Mutex<()>,
}

/// Releases the guard when dropped, on every exit path.
#[must_use = "the guard is released as soon as the scope is dropped"]
pub struct GuardScope<'a> {
    _held: MutexGuard<'a, ()>,
}

impl AtomicGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self) -> Result<GuardScope<'_>, LaunchpadError> {
        self.exec
            .try_lock()
            .map(|held| GuardScope { _held: held })
            .ok_or(LaunchpadError::ReentrantCall)
    }

    pub fn is_entered(&self) -> bool {
        self.exec.is_locked()
    }
}
