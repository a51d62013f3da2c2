//! Fast configurations for scenario tests.
//!
//! Rides take a millisecond and everyone retries every millisecond, so a
//! full run finishes in well under a second under either wait strategy.

use std::time::Duration;

use coaster_engine::{
    CarConfig, PassengerCount, RideTime, SimConfig, StrandedPolicy, WaitStrategy,
};

/// Both wait strategies, for tests that must hold under each.
pub const STRATEGIES: [WaitStrategy; 2] = [
    WaitStrategy::Blocking,
    WaitStrategy::Polling {
        interval: Duration::from_millis(1),
    },
];

/// Generous cap so a broken test fails instead of hanging.
pub const TEST_DEADLINE: Duration = Duration::from_secs(10);

/// A run with `passengers` passengers and near-zero delays.
pub fn fast_config(
    capacity: usize,
    max_rides: u32,
    passengers: u32,
    strategy: WaitStrategy,
) -> SimConfig {
    SimConfig {
        car: CarConfig {
            capacity,
            max_rides,
            wait_strategy: strategy,
            wait_slice: Duration::from_millis(5),
            stranded: StrandedPolicy::Retire,
        },
        passengers: PassengerCount::Fixed(passengers),
        ride_time: RideTime::Fixed(Duration::from_millis(1)),
        retry_interval: Duration::from_millis(1),
        seed: 0,
        deadline: Some(TEST_DEADLINE),
    }
}

/// [`fast_config`] with a car that waits forever on an unfillable window.
pub fn waiting_config(
    capacity: usize,
    max_rides: u32,
    passengers: u32,
    strategy: WaitStrategy,
    deadline: Duration,
) -> SimConfig {
    let mut config = fast_config(capacity, max_rides, passengers, strategy);
    config.car.stranded = StrandedPolicy::Wait;
    config.deadline = Some(deadline);
    config
}
