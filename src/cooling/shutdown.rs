//! Shutdown signal shared between the signal handler and the control loop.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

/// Cloneable one-way shutdown flag with an interruptible wait.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    fn flag(&self) -> MutexGuard<'_, bool> {
        // A poisoned flag is still a valid bool
        self.inner.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Request shutdown and wake every waiter.
    pub fn trigger(&self) {
        *self.flag() = true;
        self.inner.1.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        *self.flag()
    }

    /// Sleep for `timeout` or until shutdown is requested.
    ///
    /// Returns `true` if shutdown was requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = self.flag();
        let (guard, _) = self
            .inner
            .1
            .wait_timeout_while(guard, timeout, |triggered| !*triggered)
            .unwrap_or_else(|e| e.into_inner());
        *guard
    }
}
