//! Cooperative cancellation shared by every suspension point.
//!
//! A [`CancelToken`] replaces thread interruption: passengers sleep through
//! [`CancelToken::sleep`] between retries, the controller sleeps through it
//! during a ride and while polling, and blocking car waits check it every
//! time they wake. Once cancelled, a token stays cancelled.

use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Returned by a suspension that ended because cancellation was requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("cancelled")
    }
}

impl Error for Cancelled {}

struct Inner {
    /// Lock-free fast path for `is_cancelled`.
    flag: AtomicBool,
    /// Guards the sleepers' predicate; mirrors `flag`.
    cancelled: Mutex<bool>,
    wake: Condvar,
}

/// Cloneable handle to a shared cancellation flag.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

// Compile-time assertion: CancelToken must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<CancelToken>();
};

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl CancelToken {
    /// Create a token in the running state.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                flag: AtomicBool::new(false),
                cancelled: Mutex::new(false),
                wake: Condvar::new(),
            }),
        }
    }

    /// Request cancellation and wake every thread sleeping on this token.
    ///
    /// Returns `true` for the call that actually flipped the flag.
    pub fn cancel(&self) -> bool {
        let mut cancelled = self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *cancelled {
            return false;
        }
        *cancelled = true;
        self.inner.flag.store(true, Ordering::Release);
        self.inner.wake.notify_all();
        true
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::Acquire)
    }

    /// Return `Err(Cancelled)` if cancellation has been requested.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleep for `duration`, returning early with `Err(Cancelled)` as soon
    /// as the token is cancelled. A zero duration only checks the flag.
    pub fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        let guard = self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (guard, _timeout) = self
            .inner
            .wake
            .wait_timeout_while(guard, duration, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        if *guard {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}
