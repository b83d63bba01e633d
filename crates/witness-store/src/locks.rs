// ABOUTME: In-process advisory locks keyed by log id, for callers that want one writer per log.
// ABOUTME: A lease is released when dropped; nothing here coordinates separate processes.

use std::collections::HashSet;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Default)]
pub(crate) struct LogLocks {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

impl LogLocks {
    /// Wait up to `timeout` for exclusive use of `log_id`.
    /// Returns `None` on timeout.
    pub(crate) fn acquire(
        self: &Arc<Self>,
        log_id: &str,
        timeout: Duration,
    ) -> Option<LogLease> {
        let deadline = Instant::now() + timeout;
        let mut held = self.lock_held();

        while held.contains(log_id) {
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, _) = self
                .released
                .wait_timeout(held, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            held = guard;
        }

        held.insert(log_id.to_string());
        Some(LogLease {
            locks: Arc::clone(self),
            log_id: log_id.to_string(),
        })
    }

    fn lock_held(&self) -> MutexGuard<'_, HashSet<String>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive claim on one log id.
pub(crate) struct LogLease {
    locks: Arc<LogLocks>,
    log_id: String,
}

impl Drop for LogLease {
    fn drop(&mut self) {
        self.locks.lock_held().remove(&self.log_id);
        self.locks.released.notify_all();
    }
}
