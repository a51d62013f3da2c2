//! Core types for the roller-coaster car simulation.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! vocabulary shared by the engine, the test utilities and the CLI:
//! identifiers, the car [`Phase`], observability events and error types.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod event;
pub mod id;
pub mod phase;

pub use error::CarError;
pub use event::{CarEvent, EventKind, Manifest, RetireReason};
pub use id::{PassengerId, RideId};
pub use phase::Phase;
