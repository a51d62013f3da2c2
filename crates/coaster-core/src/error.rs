//! Error types for the car state machine.
//!
//! Contention (boarding a full car, disembarking at the wrong time) is not
//! an error: those operations return `false` and the caller retries.
//! [`CarError`] covers only broken protocol invariants, which indicate a
//! caller outside the controller changing phases or a synchronization bug.

use std::error::Error;
use std::fmt;

use crate::phase::Phase;

/// A phase-changing operation was invoked in a state that forbids it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CarError {
    /// The operation requires a different phase or occupancy.
    InvalidTransition {
        /// Name of the rejected operation.
        operation: &'static str,
        /// Phase observed under the lock.
        phase: Phase,
        /// Occupancy observed under the lock.
        occupancy: usize,
    },
    /// Occupancy escaped `0..=capacity`.
    CapacityExceeded {
        /// Occupancy observed under the lock.
        occupancy: usize,
        /// Configured capacity.
        capacity: usize,
    },
}

impl fmt::Display for CarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTransition {
                operation,
                phase,
                occupancy,
            } => write!(
                f,
                "{operation} is not allowed while {phase} with {occupancy} occupant(s)"
            ),
            Self::CapacityExceeded {
                occupancy,
                capacity,
            } => write!(f, "occupancy {occupancy} exceeds capacity {capacity}"),
        }
    }
}

impl Error for CarError {}
