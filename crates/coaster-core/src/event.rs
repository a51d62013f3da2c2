//! Observability events emitted by the car and its actors.
//!
//! Events are built while the car lock is held and sent after it is
//! released, so arrival order on the channel can differ from the order in
//! which the transitions happened. Every event carries a `seq` drawn from a
//! single counter; for transitions of the car itself the counter is bumped
//! under the lock, so sorting by `seq` recovers the exact lock order.

use std::fmt;

use smallvec::SmallVec;

use crate::id::{PassengerId, RideId};

/// Passengers on board when a ride starts, in boarding order.
pub type Manifest = SmallVec<[PassengerId; 8]>;

/// Why the controller ended service before the ride budget ran out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetireReason {
    /// The open boarding window can never fill with the passengers left.
    Undersubscribed,
}

impl fmt::Display for RetireReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undersubscribed => f.write_str("not enough passengers left to fill the car"),
        }
    }
}

/// What happened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// A passenger joined the back of the boarding queue.
    Queued {
        /// The passenger.
        passenger: PassengerId,
    },
    /// The controller opened the boarding window.
    BoardingOpened {
        /// Ride being boarded.
        ride: RideId,
    },
    /// A passenger was admitted.
    Boarded {
        /// The passenger.
        passenger: PassengerId,
        /// Occupancy after admission.
        occupancy: usize,
    },
    /// The last seat was taken; the car is ready to run.
    CarFull {
        /// Ride that is ready.
        ride: RideId,
    },
    /// The car left the platform.
    RideStarted {
        /// The ride.
        ride: RideId,
        /// Everyone on board.
        manifest: Manifest,
    },
    /// The car is back at the platform.
    RideEnded {
        /// The ride.
        ride: RideId,
        /// The simulated ride delay was cut short by cancellation.
        interrupted: bool,
    },
    /// The controller opened the unboarding window.
    UnboardingOpened {
        /// Ride whose riders may now leave.
        ride: RideId,
    },
    /// A passenger left the car.
    Disembarked {
        /// The passenger.
        passenger: PassengerId,
        /// Occupancy after removal.
        occupancy: usize,
    },
    /// The car is empty and the controller closed the unboarding window.
    UnboardingClosed,
    /// A queued passenger gave up because the car stopped operating.
    TurnedAway {
        /// The passenger.
        passenger: PassengerId,
    },
    /// The controller ended service early.
    Retired {
        /// Why.
        reason: RetireReason,
        /// Passengers released from a partial load.
        released: usize,
    },
    /// The controller reached its terminal state.
    Closed {
        /// Rides performed.
        rides_completed: u32,
    },
    /// The simulation was cancelled.
    Cancelled,
}

/// A sequenced event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CarEvent {
    /// Position in the car's global event order.
    pub seq: u64,
    /// Payload.
    pub kind: EventKind,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued { passenger } => write!(f, "passenger {passenger} is in line"),
            Self::BoardingOpened { ride } => write!(f, "boarding ride {ride}"),
            Self::Boarded {
                passenger,
                occupancy,
            } => write!(f, "passenger {passenger} is on board ({occupancy} seated)"),
            Self::CarFull { ride } => write!(f, "car full, ride {ride} ready"),
            Self::RideStarted { ride, manifest } => {
                write!(f, "ride {ride} started with [")?;
                for (i, p) in manifest.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{p}")?;
                }
                f.write_str("]")
            }
            Self::RideEnded { ride, interrupted } => {
                write!(f, "ride {ride} ended")?;
                if *interrupted {
                    f.write_str(" early")?;
                }
                Ok(())
            }
            Self::UnboardingOpened { ride } => write!(f, "unboarding ride {ride}"),
            Self::Disembarked {
                passenger,
                occupancy,
            } => write!(f, "passenger {passenger} disembarked ({occupancy} seated)"),
            Self::UnboardingClosed => f.write_str("car empty"),
            Self::TurnedAway { passenger } => {
                write!(f, "passenger {passenger} left the line")
            }
            Self::Retired { reason, released } => {
                write!(f, "car retired: {reason}")?;
                if *released > 0 {
                    write!(f, ", releasing {released} passenger(s)")?;
                }
                Ok(())
            }
            Self::Closed { rides_completed } => {
                write!(f, "the car closed after {rides_completed} ride(s)")
            }
            Self::Cancelled => f.write_str("simulation cancelled"),
        }
    }
}
