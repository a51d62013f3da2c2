//! Test utilities for coaster development.
//!
//! [`EventLog`] collects the events a run emitted and puts them back in
//! lock order; [`EventLog::check`] replays them against the car's rules.
//! [`fixtures`] has fast configurations for scenario tests.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::collections::HashSet;

use coaster_core::{CarEvent, EventKind, Manifest, PassengerId, Phase, RideId};
use crossbeam_channel::Receiver;

/// Every event of one run, sorted by `seq`.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: Vec<CarEvent>,
}

impl EventLog {
    /// Take everything currently in the channel. Call after the run has
    /// been joined so nothing is still in flight.
    pub fn drain(rx: &Receiver<CarEvent>) -> Self {
        Self::from_events(rx.try_iter().collect())
    }

    pub fn from_events(mut events: Vec<CarEvent>) -> Self {
        events.sort_by_key(|e| e.seq);
        Self { events }
    }

    pub fn events(&self) -> &[CarEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of events matching `pred`.
    pub fn count(&self, pred: impl Fn(&EventKind) -> bool) -> usize {
        self.events.iter().filter(|e| pred(&e.kind)).count()
    }

    /// Every started ride with its manifest, in order.
    pub fn rides(&self) -> Vec<(RideId, Manifest)> {
        self.events
            .iter()
            .filter_map(|e| match &e.kind {
                EventKind::RideStarted { ride, manifest } => Some((*ride, manifest.clone())),
                _ => None,
            })
            .collect()
    }

    /// Replay the log and report the first rule it breaks.
    pub fn check(&self, capacity: usize, max_rides: u32) -> Result<(), String> {
        let mut replay = Replay::new(capacity, max_rides);
        for (index, event) in self.events.iter().enumerate() {
            if event.seq != index as u64 {
                return Err(format!("seq gap: expected {index}, found {}", event.seq));
            }
            replay
                .apply(&event.kind)
                .map_err(|e| format!("event {} ({}): {e}", event.seq, event.kind))?;
        }
        Ok(())
    }
}

/// Order `events` by `seq` and replay them. See [`EventLog::check`].
pub fn check_invariants(
    events: impl IntoIterator<Item = CarEvent>,
    capacity: usize,
    max_rides: u32,
) -> Result<(), String> {
    EventLog::from_events(events.into_iter().collect()).check(capacity, max_rides)
}

/// Shadow car rebuilt from events alone.
struct Replay {
    capacity: usize,
    max_rides: u32,
    phase: Phase,
    occupants: Vec<PassengerId>,
    boarded_ever: HashSet<PassengerId>,
    rides: u32,
    retired: bool,
}

impl Replay {
    fn new(capacity: usize, max_rides: u32) -> Self {
        Self {
            capacity,
            max_rides,
            phase: Phase::Idle,
            occupants: Vec::new(),
            boarded_ever: HashSet::new(),
            rides: 0,
            retired: false,
        }
    }

    fn expect_phase(&self, want: Phase) -> Result<(), String> {
        if self.phase != want {
            return Err(format!("expected phase {want}, car is {}", self.phase));
        }
        Ok(())
    }

    fn apply(&mut self, kind: &EventKind) -> Result<(), String> {
        match kind {
            EventKind::Queued { .. } | EventKind::Cancelled => {}
            EventKind::TurnedAway { passenger } => {
                if self.occupants.contains(passenger) {
                    return Err(format!("{passenger} turned away while on board"));
                }
            }
            EventKind::BoardingOpened { ride } => {
                self.expect_phase(Phase::Idle)?;
                if !self.occupants.is_empty() {
                    return Err("boarding opened on an occupied car".into());
                }
                if self.retired || self.rides >= self.max_rides {
                    return Err("boarding opened on a car out of service".into());
                }
                if *ride != RideId::next_after(self.rides) {
                    return Err(format!("boarding for {ride} after {} rides", self.rides));
                }
                self.phase = Phase::Boarding;
            }
            EventKind::Boarded {
                passenger,
                occupancy,
            } => {
                self.expect_phase(Phase::Boarding)?;
                if !self.boarded_ever.insert(*passenger) {
                    return Err(format!("{passenger} boarded twice"));
                }
                self.occupants.push(*passenger);
                if self.occupants.len() > self.capacity {
                    return Err(format!("{} aboard, capacity {}", self.occupants.len(), self.capacity));
                }
                if *occupancy != self.occupants.len() {
                    return Err(format!("occupancy {occupancy}, replay has {}", self.occupants.len()));
                }
            }
            EventKind::CarFull { .. } => {
                self.expect_phase(Phase::Boarding)?;
                if self.occupants.len() != self.capacity {
                    return Err("car reported full while seats were free".into());
                }
                self.phase = Phase::ReadyToRun;
            }
            EventKind::RideStarted { ride, manifest } => {
                self.expect_phase(Phase::ReadyToRun)?;
                if manifest.len() != self.capacity {
                    return Err(format!("ride started with {} aboard", manifest.len()));
                }
                if manifest.as_slice() != self.occupants.as_slice() {
                    return Err("manifest differs from boarding order".into());
                }
                if *ride != RideId::next_after(self.rides) {
                    return Err(format!("{ride} started after {} rides", self.rides));
                }
                self.phase = Phase::Running;
            }
            EventKind::RideEnded { ride, .. } => {
                self.expect_phase(Phase::Running)?;
                self.rides += 1;
                if ride.0 != self.rides {
                    return Err(format!("{ride} ended as ride {}", self.rides));
                }
                if self.rides > self.max_rides {
                    return Err(format!("{} rides, budget {}", self.rides, self.max_rides));
                }
                self.phase = Phase::Idle;
            }
            EventKind::UnboardingOpened { .. } => {
                self.expect_phase(Phase::Idle)?;
                if self.occupants.len() != self.capacity {
                    return Err("unboarding opened on a car that is not full".into());
                }
                self.phase = Phase::Unboarding;
            }
            EventKind::Disembarked {
                passenger,
                occupancy,
            } => {
                self.expect_phase(Phase::Unboarding)?;
                let Some(pos) = self.occupants.iter().position(|p| p == passenger) else {
                    return Err(format!("{passenger} got off without being aboard"));
                };
                self.occupants.remove(pos);
                if *occupancy != self.occupants.len() {
                    return Err(format!("occupancy {occupancy}, replay has {}", self.occupants.len()));
                }
            }
            EventKind::UnboardingClosed => {
                self.expect_phase(Phase::Unboarding)?;
                if !self.occupants.is_empty() {
                    return Err("unboarding closed with riders aboard".into());
                }
                self.phase = Phase::Idle;
            }
            EventKind::Retired { released, .. } => {
                if !matches!(self.phase, Phase::Idle | Phase::Boarding) {
                    return Err(format!("retired while {}", self.phase));
                }
                if *released != self.occupants.len() {
                    return Err(format!("released {released}, replay has {}", self.occupants.len()));
                }
                self.retired = true;
                self.phase = if *released > 0 {
                    Phase::Unboarding
                } else {
                    Phase::Idle
                };
            }
            EventKind::Closed { rides_completed } => {
                self.expect_phase(Phase::Idle)?;
                if !self.occupants.is_empty() {
                    return Err("closed with riders aboard".into());
                }
                if *rides_completed != self.rides {
                    return Err(format!("closed at {rides_completed}, replay has {}", self.rides));
                }
            }
        }
        Ok(())
    }
}
