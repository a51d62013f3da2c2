//! Wait strategies and outcomes for the controller's rendezvous points.

use std::fmt;
use std::time::Duration;

/// How [`Car::wait_until_full`](crate::Car::wait_until_full) and
/// [`Car::wait_until_empty`](crate::Car::wait_until_empty) suspend.
///
/// Both strategies satisfy the same contract: they return immediately if
/// the predicate already holds, return once it becomes true, and return
/// within bounded time after cancellation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WaitStrategy {
    /// Block on the car's condition variables. Boarding and disembarking
    /// signal them; the waiter re-checks its predicate after every wake.
    #[default]
    Blocking,
    /// Re-check the predicate under the lock, sleeping `interval` between
    /// checks.
    Polling {
        /// Sleep between checks. Must be non-zero.
        interval: Duration,
    },
}

impl fmt::Display for WaitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blocking => f.write_str("blocking"),
            Self::Polling { interval } => write!(f, "polling every {interval:?}"),
        }
    }
}

/// What the controller does when an open boarding window can never fill.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StrandedPolicy {
    /// Keep waiting. Only cancellation ends the wait.
    Wait,
    /// Report [`WaitOutcome::Stranded`] so the controller retires the car.
    #[default]
    Retire,
}

/// Result of a controller wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The predicate holds.
    Ready,
    /// Cancellation was requested before the predicate held.
    Cancelled,
    /// Boarding is open but `occupants + queued < capacity`; it cannot fill.
    Stranded,
}
