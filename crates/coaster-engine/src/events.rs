//! Non-blocking delivery of [`CarEvent`]s to an external observer.
//!
//! The sink wraps an unbounded crossbeam sender: `send` never blocks, so
//! emitting an event can never stall an actor or the controller. The car
//! collects events while it holds its lock and hands them to the sink only
//! after the lock is released.

use coaster_core::CarEvent;
use crossbeam_channel::{Receiver, Sender};

/// Destination for car events. A disabled sink drops everything.
#[derive(Clone, Debug, Default)]
pub struct EventSink {
    tx: Option<Sender<CarEvent>>,
}

impl EventSink {
    /// A sink that discards every event.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Create a connected sink and the receiving end for the observer.
    pub fn channel() -> (Self, Receiver<CarEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx: Some(tx) }, rx)
    }

    /// Whether events are delivered anywhere.
    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Deliver one event.
    pub fn emit(&self, event: CarEvent) {
        if let Some(tx) = &self.tx {
            // Best-effort: the observer may have dropped its receiver.
            let _ = tx.send(event);
        }
    }

    /// Deliver a batch in order.
    pub fn emit_all(&self, events: impl IntoIterator<Item = CarEvent>) {
        for event in events {
            self.emit(event);
        }
    }
}
