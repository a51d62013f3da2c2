//! Synchronization core of the roller-coaster simulation.
//!
//! A single [`Car`] is shared by one [`Controller`] thread and any number
//! of [`Passenger`] threads. The car owns the only lock; the controller is
//! the only caller allowed to change phases; passengers only try to board
//! and disembark. [`Simulation`] wires those pieces together from a
//! validated [`SimConfig`].
//!
//! # Architecture
//!
//! ```text
//! Passenger threads (N)           Car (Mutex + 2 Condvars)        Controller thread
//!     |                                   |                              |
//!     |--join_queue() (at spawn)--------->|                              |
//!     |                                   |<-----------open_boarding()---|
//!     |--try_board() [front of queue]---->|                              |
//!     |   retry every retry_interval      |--notify "full"-------------->| wait_until_full()
//!     |                                   |<---------------------run()---|
//!     |                                   |<---------open_unboarding()---|
//!     |--try_disembark()----------------->|                              |
//!     |                                   |--notify "empty"------------->| wait_until_empty()
//!     |                                   |<--------close_unboarding()---|
//!     |                                   |                              |
//!     +------------- CarEvent (crossbeam channel, sent outside the lock) ---------> observer
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod cancel;
pub mod car;
pub mod config;
pub mod controller;
pub mod events;
pub mod passenger;
pub mod report;
pub mod simulation;
pub mod wait;

pub use cancel::{CancelToken, Cancelled};
pub use car::{Car, CarSnapshot, Disembarkation};
pub use config::{CarConfig, ConfigError, PassengerCount, RideTime, SimConfig};
pub use controller::{Controller, ControllerError, ControllerExit, Step};
pub use events::EventSink;
pub use passenger::{Passenger, PassengerOutcome};
pub use report::{RideRecord, SimulationReport};
pub use simulation::{Simulation, SimulationError};
pub use wait::{StrandedPolicy, WaitOutcome, WaitStrategy};
