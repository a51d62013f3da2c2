//! Benchmark profiles for the coaster simulation.
//!
//! - [`contended_profile`]: many passengers, zero-length rides, so the run
//!   is dominated by lock and wait traffic
//! - [`drive_cycle`]: one full board/run/unboard cycle on a single thread

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::time::Duration;

use coaster_core::{CarError, PassengerId};
use coaster_engine::{
    Car, CarConfig, PassengerCount, RideTime, SimConfig, StrandedPolicy, WaitStrategy,
};

/// A run where every passenger gets exactly one ride.
///
/// `passengers` is rounded down to a whole number of loads.
pub fn contended_profile(capacity: usize, passengers: u32, strategy: WaitStrategy) -> SimConfig {
    let loads = passengers / capacity.max(1) as u32;
    SimConfig {
        car: CarConfig {
            capacity,
            max_rides: loads.max(1),
            wait_strategy: strategy,
            wait_slice: Duration::from_millis(5),
            stranded: StrandedPolicy::Retire,
        },
        passengers: PassengerCount::Fixed(loads * capacity as u32),
        ride_time: RideTime::Fixed(Duration::ZERO),
        retry_interval: Duration::from_micros(50),
        seed: 0,
        deadline: Some(Duration::from_secs(30)),
    }
}

/// Drive one board/run/unboard cycle from the calling thread, seating
/// passengers `first..first + capacity`.
pub fn drive_cycle(car: &Car, first: u32) -> Result<(), CarError> {
    let seats = car.capacity() as u32;
    car.open_boarding()?;
    for id in first..first + seats {
        car.try_board(PassengerId(id));
    }
    car.run(Duration::ZERO);
    car.open_unboarding()?;
    for id in first..first + seats {
        car.try_disembark(PassengerId(id));
    }
    car.close_unboarding()
}
