//! The car's position in its boarding / running / unboarding cycle.
//!
//! The original design tracked four independent flags (`moving`,
//! `ready`, `allow_boarding`, `allow_unboarding`). A single enum makes the
//! forbidden combinations (boarding and unboarding open together, running
//! while accepting passengers) unrepresentable; the flag-style queries
//! below are derived from it.

use std::fmt;

/// Exactly one phase holds at any instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Stopped at the platform with both doors closed.
    Idle,
    /// Boarding window open: admission is the only allowed mutation.
    Boarding,
    /// Full and waiting for the controller to start the ride.
    ReadyToRun,
    /// Riding. Nobody boards or disembarks.
    Running,
    /// Unboarding window open: removal is the only allowed mutation.
    Unboarding,
}

impl Phase {
    /// The car is not moving.
    pub fn is_stopped(self) -> bool {
        !matches!(self, Self::Running)
    }

    /// The car is full and waiting to run.
    pub fn is_ready(self) -> bool {
        matches!(self, Self::ReadyToRun)
    }

    /// Passengers may board.
    pub fn allows_boarding(self) -> bool {
        matches!(self, Self::Boarding)
    }

    /// Passengers may disembark.
    pub fn allows_unboarding(self) -> bool {
        matches!(self, Self::Unboarding)
    }

    /// Stopped, not ready, and both doors closed.
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Lower-case name used in events and error messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Boarding => "boarding",
            Self::ReadyToRun => "ready_to_run",
            Self::Running => "running",
            Self::Unboarding => "unboarding",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
