//! Coaster: a roller-coaster car shared by one controller and many
//! passenger threads.
//!
//! This is the top-level facade crate that re-exports the public API of
//! the coaster sub-crates.
//!
//! # Quick start
//!
//! ```rust
//! use std::time::Duration;
//! use coaster::prelude::*;
//!
//! let config = SimConfig {
//!     passengers: PassengerCount::Fixed(8),
//!     ride_time: RideTime::Fixed(Duration::from_millis(1)),
//!     retry_interval: Duration::from_millis(1),
//!     ..SimConfig::default()
//! };
//! let report = Simulation::run(config, EventSink::disabled()).unwrap();
//! assert!(report.completed());
//! assert_eq!(report.rides_completed(), 2);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `coaster-core` | IDs, phases, events, `CarError` |
//! | [`engine`] | `coaster-engine` | Car, actors, configuration, simulation runner |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// IDs, phases, events and the car error type (`coaster-core`).
pub use coaster_core as types;

/// The car, passenger and controller actors, and the runner (`coaster-engine`).
///
/// [`engine::Simulation`] spawns a whole run from a [`engine::SimConfig`];
/// [`engine::Car`] can also be driven directly.
pub use coaster_engine as engine;

/// Common imports for typical coaster usage.
pub mod prelude {
    // Core types
    pub use coaster_core::{CarEvent, EventKind, PassengerId, Phase, RideId};

    // Errors
    pub use coaster_core::CarError;
    pub use coaster_engine::{ConfigError, ControllerError, SimulationError};

    // Engine
    pub use coaster_engine::{
        Car, CarConfig, EventSink, PassengerCount, RideTime, SimConfig, Simulation,
        SimulationReport, StrandedPolicy, WaitStrategy,
    };
}
