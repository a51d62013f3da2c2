//! Thread wiring: one controller, N passengers, one car.
//!
//! [`Simulation::start`] validates the configuration, builds the car,
//! enqueues every passenger on the calling thread, and then spawns the
//! actor threads. [`Simulation::join`] waits for the controller (cancelling
//! the run if the configured deadline passes first), then joins every
//! passenger and assembles a [`SimulationReport`].
//!
//! Dropping a `Simulation` that was never joined cancels the car and joins
//! all threads, so a stuck run never outlives its handle.

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use coaster_core::PassengerId;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::car::Car;
use crate::config::{ConfigError, SimConfig};
use crate::controller::{Controller, ControllerError, ControllerExit};
use crate::events::EventSink;
use crate::passenger::{Passenger, PassengerOutcome};
use crate::report::{RideRecord, SimulationReport};

const CONTROLLER_THREAD: &str = "coaster-controller";

type ControllerHandle = JoinHandle<Result<(ControllerExit, Vec<RideRecord>), ControllerError>>;

// ── SimulationError ────────────────────────────────────────────────

/// Errors from starting or joining a simulation.
#[derive(Debug, PartialEq, Eq)]
pub enum SimulationError {
    /// The configuration was rejected.
    Config(ConfigError),
    /// The controller stopped on a protocol violation.
    Controller(ControllerError),
    /// The OS refused to spawn a thread.
    ThreadSpawnFailed {
        /// The OS error message.
        reason: String,
    },
    /// A thread panicked before producing its result.
    ThreadPanicked {
        /// Name of the thread.
        thread: String,
    },
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Controller(e) => write!(f, "controller: {e}"),
            Self::ThreadSpawnFailed { reason } => write!(f, "failed to spawn thread: {reason}"),
            Self::ThreadPanicked { thread } => write!(f, "thread {thread} panicked"),
        }
    }
}

impl Error for SimulationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Controller(e) => Some(e),
            Self::ThreadSpawnFailed { .. } | Self::ThreadPanicked { .. } => None,
        }
    }
}

impl From<ConfigError> for SimulationError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<ControllerError> for SimulationError {
    fn from(e: ControllerError) -> Self {
        Self::Controller(e)
    }
}

// ── Simulation ─────────────────────────────────────────────────────

/// A running simulation.
pub struct Simulation {
    car: Arc<Car>,
    controller: Option<ControllerHandle>,
    passengers: Vec<(PassengerId, JoinHandle<PassengerOutcome>)>,
    /// Disconnects when the controller thread exits, panics included.
    controller_done: Receiver<()>,
    deadline: Option<Duration>,
    started: Instant,
}

impl Simulation {
    /// Validate `config`, build the car and spawn every actor.
    pub fn start(config: SimConfig, events: EventSink) -> Result<Self, SimulationError> {
        config.validate()?;

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let count = config.passengers.resolve(&mut rng);
        let car = Arc::new(Car::new(config.car.clone(), CancelToken::new(), events)?);
        debug!(
            passengers = count,
            capacity = car.capacity(),
            max_rides = car.max_rides(),
            strategy = %car.wait_strategy(),
            "starting simulation"
        );

        // Enqueue before any thread runs so the queue is complete when the
        // controller first checks whether boarding can fill.
        let riders: Vec<Passenger> = (1..=count)
            .map(|i| Passenger::new(PassengerId(i), Arc::clone(&car), config.retry_interval))
            .collect();

        let (done_tx, controller_done) = crossbeam_channel::bounded::<()>(0);
        let controller = Controller::with_rng(Arc::clone(&car), config.ride_time.clone(), rng);
        let started = Instant::now();
        let handle = thread::Builder::new()
            .name(CONTROLLER_THREAD.into())
            .spawn(move || {
                let _done = done_tx;
                controller.run()
            })
            .map_err(|e| SimulationError::ThreadSpawnFailed {
                reason: e.to_string(),
            })?;

        let mut sim = Self {
            car,
            controller: Some(handle),
            passengers: Vec::with_capacity(riders.len()),
            controller_done,
            deadline: config.deadline,
            started,
        };

        for passenger in riders {
            let id = passenger.id();
            let handle = thread::Builder::new()
                .name(format!("coaster-passenger-{id}"))
                .spawn(move || passenger.run())
                .map_err(|e| SimulationError::ThreadSpawnFailed {
                    reason: e.to_string(),
                })?;
            sim.passengers.push((id, handle));
        }
        Ok(sim)
    }

    /// Start and join in one call.
    pub fn run(config: SimConfig, events: EventSink) -> Result<SimulationReport, SimulationError> {
        Self::start(config, events)?.join()
    }

    /// The shared car, for inspection while the run is in progress.
    pub fn car(&self) -> &Arc<Car> {
        &self.car
    }

    /// Number of passenger threads spawned.
    pub fn passenger_count(&self) -> usize {
        self.passengers.len()
    }

    /// Whether the controller thread has exited.
    pub fn is_finished(&self) -> bool {
        self.controller
            .as_ref()
            .is_none_or(|handle| handle.is_finished())
    }

    /// Request cancellation of every actor.
    pub fn cancel(&self) -> bool {
        self.car.cancel()
    }

    /// Wait for the run to end and collect the report.
    ///
    /// If a deadline is configured and the controller is still running when
    /// it expires, the car is cancelled and the report records
    /// [`ControllerExit::Cancelled`].
    pub fn join(mut self) -> Result<SimulationReport, SimulationError> {
        self.await_controller();

        let joined = self.controller.take().map(JoinHandle::join);
        let controller = match joined {
            Some(Ok(result)) => result.map_err(SimulationError::from),
            Some(Err(_)) | None => Err(SimulationError::ThreadPanicked {
                thread: CONTROLLER_THREAD.into(),
            }),
        };
        if !matches!(controller, Ok((ControllerExit::Closed { .. }, _))) {
            // Passengers only stop on their own once the car has closed.
            self.car.cancel();
        }

        let (passengers, passengers_panicked) = self.join_passengers();
        let (exit, rides) = controller?;
        let elapsed = self.started.elapsed();
        debug!(
            ?exit,
            rides = rides.len(),
            passengers = passengers.len(),
            passengers_panicked,
            ?elapsed,
            "simulation finished"
        );
        Ok(SimulationReport {
            exit,
            rides,
            passengers,
            passengers_panicked,
            elapsed,
        })
    }

    fn await_controller(&self) {
        match self.deadline {
            // Nothing is ever sent; both calls return once the sender drops.
            None => {
                let _ = self.controller_done.recv();
            }
            Some(limit) => {
                let remaining = limit.saturating_sub(self.started.elapsed());
                if let Err(RecvTimeoutError::Timeout) = self.controller_done.recv_timeout(remaining)
                {
                    warn!(deadline = ?limit, "deadline reached, cancelling simulation");
                    self.car.cancel();
                }
            }
        }
    }

    fn join_passengers(&mut self) -> (Vec<(PassengerId, PassengerOutcome)>, usize) {
        let mut outcomes = Vec::with_capacity(self.passengers.len());
        let mut panicked = 0;
        for (id, handle) in self.passengers.drain(..) {
            match handle.join() {
                Ok(outcome) => outcomes.push((id, outcome)),
                Err(_) => {
                    warn!(passenger = %id, "passenger thread panicked");
                    panicked += 1;
                }
            }
        }
        (outcomes, panicked)
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        if self.controller.is_none() && self.passengers.is_empty() {
            return;
        }
        self.car.cancel();
        if let Some(handle) = self.controller.take() {
            let _ = handle.join();
        }
        let _ = self.join_passengers();
    }
}
