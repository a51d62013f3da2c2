//! Controller loop: the only thread that changes the car's phase.
//!
//! Each pass takes one [`CarSnapshot`](crate::CarSnapshot) and fires the
//! first matching branch of a strict priority list, then starts over from
//! the top:
//!
//! 1. not operational, empty, idle: close the car (terminal)
//! 2. idle and full: open unboarding, wait until empty, close unboarding
//! 3. operational, idle and empty: open boarding, wait until full
//! 4. operational and ready: run
//! 5. unboarding (left open by a retirement): wait until empty, close
//!
//! A boarding window found still open (a wait interrupted by the caller
//! stepping manually) is resumed by waiting again. Anything else means the
//! protocol is broken and the loop stops with an error.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use coaster_core::{CarError, Phase, RetireReason};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::car::Car;
use crate::config::RideTime;
use crate::report::RideRecord;
use crate::wait::WaitOutcome;

/// How the controller loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerExit {
    /// Terminal state reached: budget spent (or car retired) and empty.
    Closed {
        /// Rides performed.
        rides_completed: u32,
    },
    /// Cancellation was requested.
    Cancelled,
}

/// The controller found the car in a state its protocol cannot produce.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControllerError {
    /// A phase operation was refused.
    Car(CarError),
    /// No branch of the loop matches the observed state.
    Unexpected {
        /// Phase observed.
        phase: Phase,
        /// Occupancy observed.
        occupancy: usize,
        /// Whether the car was operational.
        operational: bool,
    },
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Car(e) => write!(f, "car: {e}"),
            Self::Unexpected {
                phase,
                occupancy,
                operational,
            } => write!(
                f,
                "no controller step for phase {phase} with {occupancy} occupant(s) \
                 (operational: {operational})"
            ),
        }
    }
}

impl Error for ControllerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Car(e) => Some(e),
            Self::Unexpected { .. } => None,
        }
    }
}

impl From<CarError> for ControllerError {
    fn from(e: CarError) -> Self {
        Self::Car(e)
    }
}

/// Result of one controller pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// Evaluate the priority list again.
    Continue,
    /// The loop is over.
    Exit(ControllerExit),
}

/// Drives one car through its cycles.
pub struct Controller {
    car: Arc<Car>,
    ride_time: RideTime,
    rng: ChaCha8Rng,
    rides: Vec<RideRecord>,
}

impl Controller {
    /// Create a controller. Ride durations are drawn from `ride_time` with
    /// a generator seeded by `seed`.
    pub fn new(car: Arc<Car>, ride_time: RideTime, seed: u64) -> Self {
        Self::with_rng(car, ride_time, ChaCha8Rng::seed_from_u64(seed))
    }

    /// Create a controller that continues an existing generator.
    pub fn with_rng(car: Arc<Car>, ride_time: RideTime, rng: ChaCha8Rng) -> Self {
        Self {
            car,
            ride_time,
            rng,
            rides: Vec::new(),
        }
    }

    /// Rides completed so far.
    pub fn rides(&self) -> &[RideRecord] {
        &self.rides
    }

    /// Run passes until the loop exits. Returns the exit and every ride.
    pub fn run(mut self) -> Result<(ControllerExit, Vec<RideRecord>), ControllerError> {
        loop {
            if let Step::Exit(exit) = self.step()? {
                return Ok((exit, self.rides));
            }
        }
    }

    /// Evaluate the priority list once and fire exactly one branch.
    pub fn step(&mut self) -> Result<Step, ControllerError> {
        if self.car.is_cancelled() {
            return Ok(Step::Exit(ControllerExit::Cancelled));
        }

        let snap = self.car.snapshot();
        let operational = snap.is_operational();

        if !operational && snap.is_empty() && snap.phase == Phase::Idle {
            let rides_completed = self.car.close()?;
            return Ok(Step::Exit(ControllerExit::Closed { rides_completed }));
        }

        if snap.phase == Phase::Idle && snap.is_full() {
            self.car.open_unboarding()?;
            return self.finish_unboarding();
        }

        if operational && snap.phase == Phase::Idle && snap.is_empty() {
            self.car.open_boarding()?;
            return self.await_boarding();
        }

        if operational && snap.phase == Phase::Boarding {
            return self.await_boarding();
        }

        if operational && snap.phase == Phase::ReadyToRun {
            let ride_time = self.ride_time.sample(&mut self.rng);
            if let Some(record) = self.car.run(ride_time) {
                self.rides.push(record);
            }
            return Ok(Step::Continue);
        }

        if snap.phase == Phase::Unboarding {
            return self.finish_unboarding();
        }

        Err(ControllerError::Unexpected {
            phase: snap.phase,
            occupancy: snap.occupants.len(),
            operational,
        })
    }

    fn await_boarding(&mut self) -> Result<Step, ControllerError> {
        match self.car.wait_until_full() {
            WaitOutcome::Ready => Ok(Step::Continue),
            WaitOutcome::Cancelled => Ok(Step::Exit(ControllerExit::Cancelled)),
            WaitOutcome::Stranded => match self.car.retire(RetireReason::Undersubscribed) {
                Ok(_) => Ok(Step::Continue),
                // Filled after all between the wait and the retirement.
                Err(_) if self.car.phase() == Phase::ReadyToRun => Ok(Step::Continue),
                Err(e) => Err(e.into()),
            },
        }
    }

    fn finish_unboarding(&mut self) -> Result<Step, ControllerError> {
        match self.car.wait_until_empty() {
            WaitOutcome::Ready => {
                self.car.close_unboarding()?;
                Ok(Step::Continue)
            }
            WaitOutcome::Cancelled | WaitOutcome::Stranded => {
                Ok(Step::Exit(ControllerExit::Cancelled))
            }
        }
    }
}
