//! Passenger actor: queue, board, ride, disembark.
//!
//! Each passenger runs on its own thread and talks to nobody but the
//! [`Car`]. It retries with a fixed back-off instead of waiting on the
//! car's conditions; those belong to the controller.

use std::sync::Arc;
use std::time::Duration;

use coaster_core::{PassengerId, RideId};

use crate::car::{Car, Disembarkation};

/// How a passenger's thread ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassengerOutcome {
    /// Rode and got off.
    Rode {
        /// The ride taken.
        ride: RideId,
    },
    /// Boarded, but the car retired before running and let them off.
    Released,
    /// Left the queue because the car stopped operating.
    TurnedAway,
    /// Stopped by cancellation.
    Cancelled {
        /// Still seated when cancelled.
        on_board: bool,
    },
}

/// One passenger and its handle on the shared car.
pub struct Passenger {
    id: PassengerId,
    car: Arc<Car>,
    retry_interval: Duration,
}

impl Passenger {
    /// Create a passenger and put it at the back of the car's queue.
    ///
    /// Queueing happens here, on the creating thread, so queue order is
    /// creation order regardless of how the actor threads get scheduled.
    pub fn new(id: PassengerId, car: Arc<Car>, retry_interval: Duration) -> Self {
        car.join_queue(id);
        Self {
            id,
            car,
            retry_interval,
        }
    }

    /// This passenger's id.
    pub fn id(&self) -> PassengerId {
        self.id
    }

    /// Run the actor to completion.
    pub fn run(self) -> PassengerOutcome {
        if let Err(outcome) = self.approach() {
            return outcome;
        }
        self.ride()
    }

    /// Wait in line until boarded. Only the front of the queue tries to
    /// board, so admission follows queue order.
    fn approach(&self) -> Result<(), PassengerOutcome> {
        let token = self.car.cancel_token();
        loop {
            if token.is_cancelled() {
                self.car.leave_queue(self.id);
                return Err(PassengerOutcome::Cancelled { on_board: false });
            }
            if !self.car.is_operational() {
                self.car.leave_queue(self.id);
                return Err(PassengerOutcome::TurnedAway);
            }
            if self.car.is_next_in_line(self.id) && self.car.board(self.id).is_some() {
                return Ok(());
            }
            // Cancellation is picked up at the top of the loop.
            let _ = token.sleep(self.retry_interval);
        }
    }

    /// Seated: keep trying the door until the car lets us off.
    fn ride(&self) -> PassengerOutcome {
        let token = self.car.cancel_token();
        loop {
            match self.car.disembark(self.id) {
                Some(Disembarkation::AfterRide(ride)) => return PassengerOutcome::Rode { ride },
                Some(Disembarkation::Released) => return PassengerOutcome::Released,
                None => {}
            }
            if token.sleep(self.retry_interval).is_err() {
                return PassengerOutcome::Cancelled { on_board: true };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::config::CarConfig;
    use crate::events::EventSink;
    use crate::wait::StrandedPolicy;
    use coaster_core::Phase;
    use std::thread;

    const RETRY: Duration = Duration::from_millis(1);

    fn shared_car(capacity: usize, max_rides: u32) -> Arc<Car> {
        let config = CarConfig {
            capacity,
            max_rides,
            stranded: StrandedPolicy::Wait,
            ..CarConfig::default()
        };
        Arc::new(Car::new(config, CancelToken::new(), EventSink::disabled()).unwrap())
    }

    #[test]
    fn new_passenger_joins_queue_in_order() {
        let car = shared_car(2, 1);
        let a = Passenger::new(PassengerId(1), Arc::clone(&car), RETRY);
        let _b = Passenger::new(PassengerId(2), Arc::clone(&car), RETRY);
        assert_eq!(a.id(), PassengerId(1));
        assert_eq!(car.snapshot().queued, vec![PassengerId(1), PassengerId(2)]);
    }

    #[test]
    fn rides_once_then_exits() {
        let car = shared_car(1, 1);
        let passenger = Passenger::new(PassengerId(1), Arc::clone(&car), RETRY);
        let handle = thread::spawn(move || passenger.run());

        car.open_boarding().unwrap();
        car.wait_until_full();
        car.run(Duration::ZERO).unwrap();
        car.open_unboarding().unwrap();
        car.wait_until_empty();
        car.close_unboarding().unwrap();

        assert_eq!(handle.join().unwrap(), PassengerOutcome::Rode { ride: RideId(1) });
        assert!(car.is_empty());
    }

    #[test]
    fn exhausted_car_turns_queue_away() {
        let car = shared_car(1, 1);
        car.open_boarding().unwrap();
        assert!(car.try_board(PassengerId(9)));
        car.run(Duration::ZERO).unwrap();
        assert!(!car.is_operational());

        let passenger = Passenger::new(PassengerId(1), Arc::clone(&car), RETRY);
        assert_eq!(passenger.run(), PassengerOutcome::TurnedAway);
        assert_eq!(car.queue_len(), 0);
    }

    #[test]
    fn only_front_of_queue_boards() {
        let car = shared_car(2, 1);
        let first = Passenger::new(PassengerId(1), Arc::clone(&car), RETRY);
        let second = Passenger::new(PassengerId(2), Arc::clone(&car), RETRY);
        car.open_boarding().unwrap();

        let late = thread::spawn(move || second.run());
        thread::sleep(Duration::from_millis(20));
        assert!(car.is_empty(), "second in line boarded ahead of the first");

        let early = thread::spawn(move || first.run());
        assert_eq!(car.wait_until_full(), crate::WaitOutcome::Ready);
        assert_eq!(car.occupants(), vec![PassengerId(1), PassengerId(2)]);

        car.cancel();
        assert_eq!(
            early.join().unwrap(),
            PassengerOutcome::Cancelled { on_board: true }
        );
        assert_eq!(
            late.join().unwrap(),
            PassengerOutcome::Cancelled { on_board: true }
        );
    }

    #[test]
    fn cancel_releases_waiting_passenger() {
        let car = shared_car(4, 1);
        let passenger = Passenger::new(PassengerId(1), Arc::clone(&car), Duration::from_secs(60));
        let handle = thread::spawn(move || passenger.run());
        thread::sleep(Duration::from_millis(10));
        assert_eq!(car.phase(), Phase::Idle);
        car.cancel();
        assert_eq!(
            handle.join().unwrap(),
            PassengerOutcome::Cancelled { on_board: false }
        );
        assert_eq!(car.queue_len(), 0);
    }
}
