use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct CancelInner {
    canceled: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

/// Shared cooperative cancellation flag.
///
/// Workers poll [`CancelToken::is_canceled`] between units of work and use
/// [`CancelToken::wait_timeout`] instead of sleeping, so a cancel request wakes them immediately.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl CancelToken {
    /// Create an un-canceled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation and wake every waiter.
    pub fn cancel(&self) {
        self.inner.canceled.store(true, Ordering::SeqCst);
        let _guard = self.inner.lock.lock();
        self.inner.wake.notify_all();
    }

    /// `true` once [`CancelToken::cancel`] has been called on any clone.
    pub fn is_canceled(&self) -> bool {
        self.inner.canceled.load(Ordering::SeqCst)
    }

    /// Block for at most `timeout`, returning early on cancellation.
    ///
    /// Returns `true` when the token is canceled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.inner.lock.lock();
        while !self.is_canceled() {
            if self.inner.wake.wait_until(&mut guard, deadline).timed_out() {
                break;
            }
        }
        self.is_canceled()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/cancel.rs"]
mod tests;
