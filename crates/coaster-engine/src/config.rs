//! Simulation configuration, validation, and error types.
//!
//! [`SimConfig`] is the input for [`Simulation::start`](crate::Simulation::start).
//! [`validate()`](SimConfig::validate) checks every parameter up front so
//! the actors themselves never have to handle a degenerate setup.
//! [`CarConfig`] is the subset the [`Car`](crate::Car) needs on its own.

use std::error::Error;
use std::fmt;
use std::ops::RangeInclusive;
use std::time::Duration;

use rand::Rng;

use crate::wait::{StrandedPolicy, WaitStrategy};

// ── PassengerCount ─────────────────────────────────────────────────

/// How many passengers the simulation spawns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PassengerCount {
    /// Exactly this many.
    Fixed(u32),
    /// Uniformly drawn from `min..=max` using the simulation seed.
    Range {
        /// Smallest count.
        min: u32,
        /// Largest count.
        max: u32,
    },
}

impl PassengerCount {
    /// Resolve to a concrete count.
    pub fn resolve<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        match *self {
            Self::Fixed(n) => n,
            Self::Range { min, max } => rng.random_range(min..=max),
        }
    }
}

// ── RideTime ───────────────────────────────────────────────────────

/// Simulated duration of one ride.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RideTime {
    /// Every ride takes this long.
    Fixed(Duration),
    /// Each ride draws a duration from `min..=max` (millisecond resolution).
    Uniform {
        /// Shortest ride.
        min: Duration,
        /// Longest ride.
        max: Duration,
    },
}

impl RideTime {
    /// Draw the duration of the next ride.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        match *self {
            Self::Fixed(d) => d,
            Self::Uniform { min, max } => {
                let range: RangeInclusive<u64> = millis(min)..=millis(max);
                Duration::from_millis(rng.random_range(range))
            }
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during [`SimConfig::validate()`].
#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// The car has no seats.
    ZeroCapacity,
    /// The ride budget is zero.
    ZeroRides,
    /// A passenger range has `min > max`.
    InvalidPassengerRange {
        /// Configured lower bound.
        min: u32,
        /// Configured upper bound.
        max: u32,
    },
    /// A ride-time range has `min > max`.
    InvalidRideTime {
        /// Configured lower bound.
        min: Duration,
        /// Configured upper bound.
        max: Duration,
    },
    /// A retry, polling or wait-slice interval is zero.
    ZeroInterval {
        /// Which setting.
        name: &'static str,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroCapacity => write!(f, "capacity must be at least 1"),
            Self::ZeroRides => write!(f, "max_rides must be at least 1"),
            Self::InvalidPassengerRange { min, max } => {
                write!(f, "passenger range {min}..={max} is empty")
            }
            Self::InvalidRideTime { min, max } => {
                write!(f, "ride time range {min:?}..={max:?} is empty")
            }
            Self::ZeroInterval { name } => write!(f, "{name} must be non-zero"),
        }
    }
}

impl Error for ConfigError {}

// ── CarConfig ──────────────────────────────────────────────────────

/// Parameters fixed when a [`Car`](crate::Car) is constructed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CarConfig {
    /// Seats. Default: 4.
    pub capacity: usize,
    /// Ride budget. Default: 4.
    pub max_rides: u32,
    /// How controller waits suspend. Default: blocking.
    pub wait_strategy: WaitStrategy,
    /// Longest a blocking wait sleeps before re-checking cancellation.
    /// Bounds the wake-up latency when the token is cancelled without
    /// going through [`Car::cancel`](crate::Car::cancel). Default: 50 ms.
    pub wait_slice: Duration,
    /// Reaction to a boarding window that can never fill. Default: retire.
    pub stranded: StrandedPolicy,
}

impl Default for CarConfig {
    fn default() -> Self {
        Self {
            capacity: 4,
            max_rides: 4,
            wait_strategy: WaitStrategy::Blocking,
            wait_slice: Duration::from_millis(50),
            stranded: StrandedPolicy::Retire,
        }
    }
}

impl CarConfig {
    /// Validate the car parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.max_rides == 0 {
            return Err(ConfigError::ZeroRides);
        }
        if self.wait_slice.is_zero() {
            return Err(ConfigError::ZeroInterval { name: "wait_slice" });
        }
        if let WaitStrategy::Polling { interval } = self.wait_strategy {
            if interval.is_zero() {
                return Err(ConfigError::ZeroInterval {
                    name: "poll_interval",
                });
            }
        }
        Ok(())
    }
}

// ── SimConfig ──────────────────────────────────────────────────────

/// Complete configuration for one simulation run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimConfig {
    /// The car.
    pub car: CarConfig,
    /// Passenger population. Default: 15..=24.
    pub passengers: PassengerCount,
    /// Ride duration. Default: 1..=4 s.
    pub ride_time: RideTime,
    /// Passenger back-off between board/disembark attempts. Default: 5 ms.
    pub retry_interval: Duration,
    /// Seed for passenger count and ride durations. Default: 0.
    pub seed: u64,
    /// Cancel the run if the controller has not finished by then.
    pub deadline: Option<Duration>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            car: CarConfig::default(),
            passengers: PassengerCount::Range { min: 15, max: 24 },
            ride_time: RideTime::Uniform {
                min: Duration::from_secs(1),
                max: Duration::from_secs(4),
            },
            retry_interval: Duration::from_millis(5),
            seed: 0,
            deadline: None,
        }
    }
}

impl SimConfig {
    /// Validate all parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.car.validate()?;
        if let PassengerCount::Range { min, max } = self.passengers {
            if min > max {
                return Err(ConfigError::InvalidPassengerRange { min, max });
            }
        }
        if let RideTime::Uniform { min, max } = self.ride_time {
            if min > max {
                return Err(ConfigError::InvalidRideTime { min, max });
            }
        }
        if self.retry_interval.is_zero() {
            return Err(ConfigError::ZeroInterval {
                name: "retry_interval",
            });
        }
        Ok(())
    }
}
