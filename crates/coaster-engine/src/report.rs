//! Per-ride records and the end-of-run summary.
//!
//! [`RideRecord`] is produced by [`Car::run`](crate::Car::run) for every
//! completed ride; [`SimulationReport`] collects them together with each
//! passenger's outcome once every thread has been joined.

use std::time::Duration;

use coaster_core::{Manifest, PassengerId, RideId};

use crate::controller::ControllerExit;
use crate::passenger::PassengerOutcome;

/// One completed ride.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RideRecord {
    /// Which ride.
    pub ride: RideId,
    /// Occupants for the whole ride, in boarding order.
    pub manifest: Manifest,
    /// Wall-clock time spent running.
    pub duration: Duration,
    /// Cancellation cut the ride delay short.
    pub interrupted: bool,
}

/// Summary of a finished simulation.
#[derive(Clone, Debug)]
pub struct SimulationReport {
    /// How the controller loop ended.
    pub exit: ControllerExit,
    /// Completed rides in order.
    pub rides: Vec<RideRecord>,
    /// Outcome of every passenger, in id order.
    pub passengers: Vec<(PassengerId, PassengerOutcome)>,
    /// Passenger threads that panicked instead of returning an outcome.
    pub passengers_panicked: usize,
    /// Wall-clock time from start to the last join.
    pub elapsed: Duration,
}

impl SimulationReport {
    /// Number of rides performed.
    pub fn rides_completed(&self) -> usize {
        self.rides.len()
    }

    /// Passengers that finished a ride and got off.
    pub fn riders(&self) -> usize {
        self.count(|o| matches!(o, PassengerOutcome::Rode { .. }))
    }

    /// Passengers that left the queue because the car stopped operating.
    pub fn turned_away(&self) -> usize {
        self.count(|o| matches!(o, PassengerOutcome::TurnedAway))
    }

    /// Passengers released from a partial load when the car retired.
    pub fn released(&self) -> usize {
        self.count(|o| matches!(o, PassengerOutcome::Released))
    }

    /// Passengers stopped by cancellation.
    pub fn cancelled(&self) -> usize {
        self.count(|o| matches!(o, PassengerOutcome::Cancelled { .. }))
    }

    /// Whether the run ended on its own rather than by cancellation.
    pub fn completed(&self) -> bool {
        matches!(self.exit, ControllerExit::Closed { .. })
    }

    fn count(&self, pred: impl Fn(&PassengerOutcome) -> bool) -> usize {
        self.passengers.iter().filter(|(_, o)| pred(o)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn counts_outcomes_by_kind() {
        let report = SimulationReport {
            exit: ControllerExit::Closed { rides_completed: 1 },
            rides: vec![RideRecord {
                ride: RideId(1),
                manifest: smallvec![PassengerId(1)],
                duration: Duration::from_millis(1),
                interrupted: false,
            }],
            passengers: vec![
                (PassengerId(1), PassengerOutcome::Rode { ride: RideId(1) }),
                (PassengerId(2), PassengerOutcome::TurnedAway),
                (PassengerId(3), PassengerOutcome::Cancelled { on_board: false }),
            ],
            passengers_panicked: 0,
            elapsed: Duration::from_millis(5),
        };
        assert_eq!(report.rides_completed(), 1);
        assert_eq!(report.riders(), 1);
        assert_eq!(report.turned_away(), 1);
        assert_eq!(report.cancelled(), 1);
        assert_eq!(report.released(), 0);
        assert!(report.completed());
    }
}
