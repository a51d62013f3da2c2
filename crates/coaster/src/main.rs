//! `coaster` binary: run one simulation and log every car event.
//!
//! ```text
//! main() -> Simulation::start() --events--> coaster-events thread -> tracing
//!                 |
//!                 v
//!           Simulation::join() -> summary, exit code
//! ```
//!
//! Exits non-zero when the configuration is rejected, when the controller
//! reports a protocol violation, or when `--timeout-secs` expires first.

use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use crossbeam_channel::Receiver;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use coaster::prelude::*;

#[derive(Parser)]
#[command(name = "coaster")]
#[command(about = "Simulate a roller-coaster car shared by a controller and passenger threads")]
struct Cli {
    /// Seats in the car
    #[arg(long, default_value_t = 4)]
    capacity: usize,
    /// Rides before the car closes
    #[arg(long, default_value_t = 4)]
    max_rides: u32,
    /// Exact passenger count (overrides the min/max range)
    #[arg(long)]
    passengers: Option<u32>,
    /// Smallest random passenger count
    #[arg(long, default_value_t = 15)]
    min_passengers: u32,
    /// Largest random passenger count
    #[arg(long, default_value_t = 24)]
    max_passengers: u32,
    /// How the controller waits for a full or empty car
    #[arg(long, value_enum, default_value_t = Strategy::Blocking)]
    strategy: Strategy,
    /// Polling interval for `--strategy polling`
    #[arg(long, default_value_t = 10)]
    poll_interval_ms: u64,
    /// Shortest ride
    #[arg(long, default_value_t = 1000)]
    min_ride_ms: u64,
    /// Longest ride
    #[arg(long, default_value_t = 4000)]
    max_ride_ms: u64,
    /// Millisecond rides and retries, for quick runs
    #[arg(long)]
    fast: bool,
    /// Passenger back-off between attempts
    #[arg(long, default_value_t = 5)]
    retry_ms: u64,
    /// Seed for passenger count and ride times
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Cancel the run if it has not finished after this long
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// What to do when the queue can no longer fill the car
    #[arg(long, value_enum, default_value_t = Stranded::Retire)]
    stranded: Stranded,
}

#[derive(Clone, Copy, ValueEnum)]
enum Strategy {
    Blocking,
    Polling,
}

#[derive(Clone, Copy, ValueEnum)]
enum Stranded {
    Wait,
    Retire,
}

impl Cli {
    fn config(&self) -> SimConfig {
        let ms = Duration::from_millis;
        let (ride_time, retry_interval, poll_interval) = if self.fast {
            (
                RideTime::Uniform {
                    min: ms(1),
                    max: ms(5),
                },
                ms(1),
                ms(1),
            )
        } else {
            (
                RideTime::Uniform {
                    min: ms(self.min_ride_ms),
                    max: ms(self.max_ride_ms),
                },
                ms(self.retry_ms),
                ms(self.poll_interval_ms),
            )
        };

        SimConfig {
            car: CarConfig {
                capacity: self.capacity,
                max_rides: self.max_rides,
                wait_strategy: match self.strategy {
                    Strategy::Blocking => WaitStrategy::Blocking,
                    Strategy::Polling => WaitStrategy::Polling {
                        interval: poll_interval,
                    },
                },
                stranded: match self.stranded {
                    Stranded::Wait => StrandedPolicy::Wait,
                    Stranded::Retire => StrandedPolicy::Retire,
                },
                ..CarConfig::default()
            },
            passengers: match self.passengers {
                Some(n) => PassengerCount::Fixed(n),
                None => PassengerCount::Range {
                    min: self.min_passengers,
                    max: self.max_passengers,
                },
            },
            ride_time,
            retry_interval,
            seed: self.seed,
            deadline: self.timeout_secs.map(Duration::from_secs),
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let (sink, events) = EventSink::channel();
    let sim = Simulation::start(cli.config(), sink).context("failed to start simulation")?;
    info!(passengers = sim.passenger_count(), "simulation started");

    // Ends when the car, and with it the last sender, is dropped by join().
    let logger = thread::Builder::new()
        .name("coaster-events".into())
        .spawn(move || log_events(&events))
        .context("failed to spawn event logger")?;

    let report = sim.join().context("simulation failed")?;
    if logger.join().is_err() {
        warn!("event logger panicked");
    }

    info!(
        rides = report.rides_completed(),
        riders = report.riders(),
        released = report.released(),
        turned_away = report.turned_away(),
        cancelled = report.cancelled(),
        elapsed = ?report.elapsed,
        "simulation finished"
    );
    if !report.completed() {
        bail!(
            "deadline reached after {} ride(s); simulation cancelled",
            report.rides_completed()
        );
    }
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(env_filter)
        .init();
}

fn log_events(events: &Receiver<CarEvent>) {
    for event in events {
        let seq = event.seq;
        match &event.kind {
            EventKind::Queued { passenger } => debug!(seq, %passenger, "queued"),
            EventKind::BoardingOpened { ride } => info!(seq, %ride, "boarding open"),
            EventKind::Boarded {
                passenger,
                occupancy,
            } => info!(seq, %passenger, occupancy, "boarded"),
            EventKind::CarFull { ride } => info!(seq, %ride, "car full"),
            EventKind::RideStarted { ride, manifest } => {
                info!(seq, %ride, riders = ?manifest.as_slice(), "ride started")
            }
            EventKind::RideEnded { ride, interrupted } => {
                info!(seq, %ride, interrupted, "ride ended")
            }
            EventKind::UnboardingOpened { ride } => info!(seq, %ride, "unboarding open"),
            EventKind::Disembarked {
                passenger,
                occupancy,
            } => info!(seq, %passenger, occupancy, "disembarked"),
            EventKind::UnboardingClosed => info!(seq, "unboarding closed"),
            EventKind::TurnedAway { passenger } => info!(seq, %passenger, "turned away"),
            EventKind::Retired { reason, released } => {
                warn!(seq, ?reason, released, "car retired early")
            }
            EventKind::Closed { rides_completed } => info!(seq, rides_completed, "car closed"),
            EventKind::Cancelled => warn!(seq, "cancelled"),
        }
    }
}
