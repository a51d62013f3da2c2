//! The shared car: phase state machine, occupancy, and rendezvous waits.
//!
//! Every field lives behind one `Mutex`; no operation observes a partial
//! update. Two condition variables carry the full/empty handshake from the
//! passengers to the controller. Events are stamped under the lock and
//! sent after it is released (see [`coaster_core::event`]).
//!
//! Phase-changing operations ([`open_boarding`](Car::open_boarding),
//! [`run`](Car::run), [`open_unboarding`](Car::open_unboarding),
//! [`close_unboarding`](Car::close_unboarding), [`retire`](Car::retire),
//! [`close`](Car::close)) belong to the controller. The one exception is
//! the `Boarding -> ReadyToRun` step, taken by whichever passenger takes
//! the last seat.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use coaster_core::{
    CarError, CarEvent, EventKind, Manifest, PassengerId, Phase, RetireReason, RideId,
};
use indexmap::IndexSet;
use smallvec::SmallVec;

use crate::cancel::CancelToken;
use crate::config::{CarConfig, ConfigError};
use crate::events::EventSink;
use crate::report::RideRecord;
use crate::wait::{StrandedPolicy, WaitOutcome, WaitStrategy};

/// Events produced by one critical section.
type Pending = SmallVec<[CarEvent; 2]>;

/// Why a passenger was let off.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disembarkation {
    /// Normal unboarding after the given ride.
    AfterRide(RideId),
    /// The car retired before running; the partial load is released.
    Released,
}

struct CarState {
    phase: Phase,
    /// Boarding order is kept for ride manifests.
    occupants: IndexSet<PassengerId>,
    queue: VecDeque<PassengerId>,
    rides_completed: u32,
    retired: bool,
    /// Ride whose riders are leaving; `None` while releasing a partial load.
    unloading: Option<RideId>,
}

/// Consistent copy of the car's state taken under one lock acquisition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CarSnapshot {
    /// Current phase.
    pub phase: Phase,
    /// Occupants in boarding order.
    pub occupants: Vec<PassengerId>,
    /// Boarding queue, front first.
    pub queued: Vec<PassengerId>,
    /// Rides performed so far.
    pub rides_completed: u32,
    /// Seats.
    pub capacity: usize,
    /// Ride budget.
    pub max_rides: u32,
    /// Retired early by the controller.
    pub retired: bool,
}

impl CarSnapshot {
    /// Every seat is taken.
    pub fn is_full(&self) -> bool {
        self.occupants.len() == self.capacity
    }

    /// Nobody is on board.
    pub fn is_empty(&self) -> bool {
        self.occupants.is_empty()
    }

    /// The car will still perform rides.
    pub fn is_operational(&self) -> bool {
        !self.retired && self.rides_completed < self.max_rides
    }
}

/// The roller-coaster car shared by the controller and all passengers.
pub struct Car {
    config: CarConfig,
    state: Mutex<CarState>,
    full: Condvar,
    empty: Condvar,
    seq: AtomicU64,
    cancel: CancelToken,
    events: EventSink,
}

// Compile-time assertion: Car must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<Car>();
};

impl Car {
    /// Create an idle, empty car.
    ///
    /// `cancel` is shared with every actor that should stop when the car
    /// does; `events` receives all transitions.
    pub fn new(
        config: CarConfig,
        cancel: CancelToken,
        events: EventSink,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            state: Mutex::new(CarState {
                phase: Phase::Idle,
                occupants: IndexSet::with_capacity(config.capacity),
                queue: VecDeque::new(),
                rides_completed: 0,
                retired: false,
                unloading: None,
            }),
            config,
            full: Condvar::new(),
            empty: Condvar::new(),
            seq: AtomicU64::new(0),
            cancel,
            events,
        })
    }

    fn lock(&self) -> MutexGuard<'_, CarState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Assign the next sequence number. Called with the lock held for car
    /// transitions so that `seq` order equals lock order.
    fn stamp(&self, kind: EventKind) -> CarEvent {
        CarEvent {
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            kind,
        }
    }

    fn invalid(&self, operation: &'static str, state: &CarState) -> CarError {
        CarError::InvalidTransition {
            operation,
            phase: state.phase,
            occupancy: state.occupants.len(),
        }
    }

    fn is_full_locked(&self, state: &CarState) -> bool {
        state.occupants.len() == self.config.capacity
    }

    fn is_operational_locked(&self, state: &CarState) -> bool {
        !state.retired && state.rides_completed < self.config.max_rides
    }

    fn is_stranded_locked(&self, state: &CarState) -> bool {
        self.config.stranded == StrandedPolicy::Retire
            && state.phase == Phase::Boarding
            && state.occupants.len() + state.queue.len() < self.config.capacity
    }

    fn check_capacity(&self, state: &CarState) -> Result<(), CarError> {
        let occupancy = state.occupants.len();
        if occupancy > self.config.capacity {
            return Err(CarError::CapacityExceeded {
                occupancy,
                capacity: self.config.capacity,
            });
        }
        Ok(())
    }

    // ── Configuration ────────────────────────────────────────────

    /// Seats.
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Ride budget.
    pub fn max_rides(&self) -> u32 {
        self.config.max_rides
    }

    /// Strategy used by the controller waits.
    pub fn wait_strategy(&self) -> WaitStrategy {
        self.config.wait_strategy
    }

    /// The token this car stops on.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    // ── Queries ──────────────────────────────────────────────────

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    /// Every seat is taken.
    pub fn is_full(&self) -> bool {
        self.is_full_locked(&self.lock())
    }

    /// Nobody is on board.
    pub fn is_empty(&self) -> bool {
        self.lock().occupants.is_empty()
    }

    /// The ride budget is used up.
    pub fn is_exhausted(&self) -> bool {
        self.lock().rides_completed >= self.config.max_rides
    }

    /// Retired early by the controller.
    pub fn is_retired(&self) -> bool {
        self.lock().retired
    }

    /// The car will still perform rides: not exhausted and not retired.
    pub fn is_operational(&self) -> bool {
        self.is_operational_locked(&self.lock())
    }

    /// Rides performed so far.
    pub fn rides_completed(&self) -> u32 {
        self.lock().rides_completed
    }

    /// Passengers on board.
    pub fn occupancy(&self) -> usize {
        self.lock().occupants.len()
    }

    /// Occupants in boarding order.
    pub fn occupants(&self) -> Vec<PassengerId> {
        self.lock().occupants.iter().copied().collect()
    }

    /// Whether `id` is on board.
    pub fn is_in_car(&self, id: PassengerId) -> bool {
        self.lock().occupants.contains(&id)
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// All fields under a single lock acquisition.
    pub fn snapshot(&self) -> CarSnapshot {
        let state = self.lock();
        CarSnapshot {
            phase: state.phase,
            occupants: state.occupants.iter().copied().collect(),
            queued: state.queue.iter().copied().collect(),
            rides_completed: state.rides_completed,
            capacity: self.config.capacity,
            max_rides: self.config.max_rides,
            retired: state.retired,
        }
    }

    // ── Boarding queue ───────────────────────────────────────────

    /// Put `id` at the back of the boarding queue.
    ///
    /// Returns `false` if it is already queued or on board.
    pub fn join_queue(&self, id: PassengerId) -> bool {
        let event = {
            let mut state = self.lock();
            if state.queue.contains(&id) || state.occupants.contains(&id) {
                return false;
            }
            state.queue.push_back(id);
            self.stamp(EventKind::Queued { passenger: id })
        };
        self.events.emit(event);
        true
    }

    /// Remove `id` from the boarding queue without boarding.
    ///
    /// Wakes the controller, since a shorter queue may strand an open
    /// boarding window.
    pub fn leave_queue(&self, id: PassengerId) -> bool {
        let event = {
            let mut state = self.lock();
            let Some(pos) = state.queue.iter().position(|p| *p == id) else {
                return false;
            };
            state.queue.remove(pos);
            self.full.notify_all();
            self.stamp(EventKind::TurnedAway { passenger: id })
        };
        self.events.emit(event);
        true
    }

    /// Whether `id` is at the front of the boarding queue.
    pub fn is_next_in_line(&self, id: PassengerId) -> bool {
        self.lock().queue.front() == Some(&id)
    }

    /// Passengers waiting in the boarding queue.
    pub fn queue_len(&self) -> usize {
        self.lock().queue.len()
    }

    // ── Passenger operations ─────────────────────────────────────

    /// Admit `id`. See [`board`](Self::board).
    pub fn try_board(&self, id: PassengerId) -> bool {
        self.board(id).is_some()
    }

    /// Admit `id` if boarding is open, a seat is free, and `id` is not
    /// already on board. Returns the ride it boarded.
    ///
    /// A successful admission also removes `id` from the boarding queue.
    /// Taking the last seat moves the car to [`Phase::ReadyToRun`] and
    /// wakes the controller.
    pub fn board(&self, id: PassengerId) -> Option<RideId> {
        let mut pending = Pending::new();
        let ride = {
            let mut state = self.lock();
            if !state.phase.allows_boarding()
                || self.is_full_locked(&state)
                || state.occupants.contains(&id)
            {
                return None;
            }
            state.occupants.insert(id);
            if let Some(pos) = state.queue.iter().position(|p| *p == id) {
                state.queue.remove(pos);
            }
            debug_assert!(state.occupants.len() <= self.config.capacity);

            let ride = RideId::next_after(state.rides_completed);
            pending.push(self.stamp(EventKind::Boarded {
                passenger: id,
                occupancy: state.occupants.len(),
            }));
            if self.is_full_locked(&state) {
                state.phase = Phase::ReadyToRun;
                pending.push(self.stamp(EventKind::CarFull { ride }));
                self.full.notify_all();
            }
            ride
        };
        self.events.emit_all(pending);
        Some(ride)
    }

    /// Let `id` off. See [`disembark`](Self::disembark).
    pub fn try_disembark(&self, id: PassengerId) -> bool {
        self.disembark(id).is_some()
    }

    /// Remove `id` if unboarding is open and `id` is on board.
    ///
    /// Emptying the car wakes the controller; the unboarding window stays
    /// open until the controller closes it.
    pub fn disembark(&self, id: PassengerId) -> Option<Disembarkation> {
        let (how, event) = {
            let mut state = self.lock();
            if !state.phase.allows_unboarding() || !state.occupants.shift_remove(&id) {
                return None;
            }
            if state.occupants.is_empty() {
                self.empty.notify_all();
            }
            let how = match state.unloading {
                Some(ride) => Disembarkation::AfterRide(ride),
                None => Disembarkation::Released,
            };
            let event = self.stamp(EventKind::Disembarked {
                passenger: id,
                occupancy: state.occupants.len(),
            });
            (how, event)
        };
        self.events.emit(event);
        Some(how)
    }

    // ── Controller operations ────────────────────────────────────

    /// Open the boarding window for the next ride.
    ///
    /// Requires an idle, empty, operational car.
    pub fn open_boarding(&self) -> Result<RideId, CarError> {
        let (ride, event) = {
            let mut state = self.lock();
            if !state.phase.is_closed()
                || !state.occupants.is_empty()
                || !self.is_operational_locked(&state)
            {
                return Err(self.invalid("open_boarding", &state));
            }
            state.phase = Phase::Boarding;
            let ride = RideId::next_after(state.rides_completed);
            (ride, self.stamp(EventKind::BoardingOpened { ride }))
        };
        self.events.emit(event);
        Ok(ride)
    }

    /// Start the ride, hold the car in [`Phase::Running`] for `ride_time`,
    /// then return to [`Phase::Idle`] with the ride counted.
    ///
    /// The lock is released during the ride; the `Running` phase alone
    /// keeps passengers from boarding or disembarking. Cancellation cuts
    /// the delay short but the ride is still counted, so the invariants
    /// hold for whoever inspects the car afterwards.
    ///
    /// A call in any phase other than [`Phase::ReadyToRun`] does nothing
    /// and returns `None`.
    pub fn run(&self, ride_time: Duration) -> Option<RideRecord> {
        let (ride, manifest, event) = {
            let mut state = self.lock();
            if !state.phase.is_ready() {
                return None;
            }
            debug_assert!(self.is_full_locked(&state), "ready car is not full");
            state.phase = Phase::Running;
            let ride = RideId::next_after(state.rides_completed);
            let manifest: Manifest = state.occupants.iter().copied().collect();
            let event = self.stamp(EventKind::RideStarted {
                ride,
                manifest: manifest.clone(),
            });
            (ride, manifest, event)
        };
        self.events.emit(event);

        let started = Instant::now();
        let interrupted = self.cancel.sleep(ride_time).is_err();
        let duration = started.elapsed();

        let event = {
            let mut state = self.lock();
            debug_assert_eq!(state.phase, Phase::Running);
            state.rides_completed += 1;
            state.phase = Phase::Idle;
            self.stamp(EventKind::RideEnded { ride, interrupted })
        };
        self.events.emit(event);

        Some(RideRecord {
            ride,
            manifest,
            duration,
            interrupted,
        })
    }

    /// Open the unboarding window after a ride.
    ///
    /// Requires a stopped, full car with both doors closed.
    pub fn open_unboarding(&self) -> Result<RideId, CarError> {
        let (ride, event) = {
            let mut state = self.lock();
            if !state.phase.is_closed()
                || !self.is_full_locked(&state)
                || state.rides_completed == 0
            {
                return Err(self.invalid("open_unboarding", &state));
            }
            self.check_capacity(&state)?;
            state.phase = Phase::Unboarding;
            let ride = RideId(state.rides_completed);
            state.unloading = Some(ride);
            (ride, self.stamp(EventKind::UnboardingOpened { ride }))
        };
        self.events.emit(event);
        Ok(ride)
    }

    /// Close the unboarding window once the car is empty.
    pub fn close_unboarding(&self) -> Result<(), CarError> {
        let event = {
            let mut state = self.lock();
            if !state.phase.allows_unboarding() || !state.occupants.is_empty() {
                return Err(self.invalid("close_unboarding", &state));
            }
            state.phase = Phase::Idle;
            state.unloading = None;
            self.stamp(EventKind::UnboardingClosed)
        };
        self.events.emit(event);
        Ok(())
    }

    /// End service before the ride budget runs out.
    ///
    /// From an open boarding window with a partial load the car moves to
    /// [`Phase::Unboarding`] so the riders can get off without a ride; an
    /// empty boarding window or idle empty car just goes idle. Returns the
    /// number of passengers released.
    pub fn retire(&self, reason: RetireReason) -> Result<usize, CarError> {
        let (released, event) = {
            let mut state = self.lock();
            let released = state.occupants.len();
            match state.phase {
                Phase::Boarding if released > 0 => {
                    state.phase = Phase::Unboarding;
                    state.unloading = None;
                }
                Phase::Boarding | Phase::Idle if released == 0 => {
                    state.phase = Phase::Idle;
                }
                _ => return Err(self.invalid("retire", &state)),
            }
            state.retired = true;
            (released, self.stamp(EventKind::Retired { reason, released }))
        };
        self.events.emit(event);
        Ok(released)
    }

    /// Announce the terminal state: idle, empty, and no longer operational.
    /// Returns the number of rides performed.
    pub fn close(&self) -> Result<u32, CarError> {
        let (rides, event) = {
            let state = self.lock();
            if !state.phase.is_closed()
                || !state.occupants.is_empty()
                || self.is_operational_locked(&state)
            {
                return Err(self.invalid("close", &state));
            }
            let rides_completed = state.rides_completed;
            (
                rides_completed,
                self.stamp(EventKind::Closed { rides_completed }),
            )
        };
        self.events.emit(event);
        Ok(rides)
    }

    /// Cancel the shared token and wake every waiter on the car.
    ///
    /// Returns `true` for the call that actually cancelled.
    pub fn cancel(&self) -> bool {
        if !self.cancel.cancel() {
            return false;
        }
        let event = {
            let _state = self.lock();
            self.full.notify_all();
            self.empty.notify_all();
            self.stamp(EventKind::Cancelled)
        };
        self.events.emit(event);
        true
    }

    // ── Rendezvous waits ─────────────────────────────────────────

    /// Wait until every seat is taken.
    ///
    /// Returns [`WaitOutcome::Stranded`] instead if the stranded policy is
    /// [`StrandedPolicy::Retire`] and the queue can no longer fill the car.
    pub fn wait_until_full(&self) -> WaitOutcome {
        self.wait_for(&self.full, true, |car, state| car.is_full_locked(state))
    }

    /// Wait until nobody is on board.
    pub fn wait_until_empty(&self) -> WaitOutcome {
        self.wait_for(&self.empty, false, |_, state| state.occupants.is_empty())
    }

    fn wait_for(
        &self,
        signal: &Condvar,
        detect_stranded: bool,
        ready: impl Fn(&Car, &CarState) -> bool,
    ) -> WaitOutcome {
        let check = |state: &CarState| {
            if ready(self, state) {
                Some(WaitOutcome::Ready)
            } else if self.cancel.is_cancelled() {
                Some(WaitOutcome::Cancelled)
            } else if detect_stranded && self.is_stranded_locked(state) {
                Some(WaitOutcome::Stranded)
            } else {
                None
            }
        };

        match self.config.wait_strategy {
            WaitStrategy::Blocking => {
                let mut state = self.lock();
                loop {
                    if let Some(outcome) = check(&*state) {
                        return outcome;
                    }
                    state = signal
                        .wait_timeout(state, self.config.wait_slice)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
            WaitStrategy::Polling { interval } => loop {
                if let Some(outcome) = check(&*self.lock()) {
                    return outcome;
                }
                if self.cancel.sleep(interval).is_err() {
                    return WaitOutcome::Cancelled;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::thread;

    const STRATEGIES: [WaitStrategy; 2] = [
        WaitStrategy::Blocking,
        WaitStrategy::Polling {
            interval: Duration::from_millis(1),
        },
    ];

    fn car_with(capacity: usize, max_rides: u32, wait_strategy: WaitStrategy) -> Car {
        let config = CarConfig {
            capacity,
            max_rides,
            wait_strategy,
            wait_slice: Duration::from_millis(5),
            stranded: StrandedPolicy::Wait,
        };
        Car::new(config, CancelToken::new(), EventSink::disabled()).unwrap()
    }

    fn car(capacity: usize, max_rides: u32) -> Car {
        car_with(capacity, max_rides, WaitStrategy::Blocking)
    }

    fn fill(car: &Car, ids: impl IntoIterator<Item = u32>) {
        for id in ids {
            assert!(car.try_board(PassengerId(id)), "passenger {id} failed to board");
        }
    }

    #[test]
    fn new_car_is_idle_and_empty() {
        let car = car(4, 2);
        assert_eq!(car.phase(), Phase::Idle);
        assert!(car.is_empty());
        assert!(!car.is_full());
        assert!(car.is_operational());
        assert_eq!(car.rides_completed(), 0);
    }

    #[test]
    fn invalid_config_rejected() {
        let config = CarConfig {
            capacity: 0,
            ..CarConfig::default()
        };
        assert!(matches!(
            Car::new(config, CancelToken::new(), EventSink::disabled()),
            Err(ConfigError::ZeroCapacity)
        ));
    }

    #[test]
    fn board_requires_open_window() {
        let car = car(2, 1);
        assert!(!car.try_board(PassengerId(1)));
        assert!(car.is_empty());
    }

    #[test]
    fn double_boarding_rejected() {
        let car = car(3, 1);
        car.open_boarding().unwrap();
        assert!(car.try_board(PassengerId(1)));
        assert!(!car.try_board(PassengerId(1)));
        assert_eq!(car.occupancy(), 1);
    }

    #[test]
    fn last_seat_makes_car_ready() {
        let car = car(2, 1);
        assert_eq!(car.open_boarding().unwrap(), RideId(1));
        assert_eq!(car.board(PassengerId(1)), Some(RideId(1)));
        assert_eq!(car.phase(), Phase::Boarding);
        fill(&car, [2]);
        assert_eq!(car.phase(), Phase::ReadyToRun);
        assert!(car.is_full());
        assert!(!car.try_board(PassengerId(3)));
    }

    #[test]
    fn boarding_removes_from_queue() {
        let car = car(2, 1);
        assert!(car.join_queue(PassengerId(1)));
        assert!(car.join_queue(PassengerId(2)));
        assert!(!car.join_queue(PassengerId(1)));
        assert!(car.is_next_in_line(PassengerId(1)));
        car.open_boarding().unwrap();
        fill(&car, [1]);
        assert!(car.is_next_in_line(PassengerId(2)));
        assert_eq!(car.queue_len(), 1);
        assert!(!car.join_queue(PassengerId(1)), "occupant cannot rejoin the queue");
    }

    #[test]
    fn leave_queue_only_removes_queued() {
        let car = car(2, 1);
        car.join_queue(PassengerId(1));
        assert!(car.leave_queue(PassengerId(1)));
        assert!(!car.leave_queue(PassengerId(1)));
        assert_eq!(car.queue_len(), 0);
    }

    #[test]
    fn run_is_noop_unless_ready() {
        let car = car(2, 1);
        assert!(car.run(Duration::ZERO).is_none());
        car.open_boarding().unwrap();
        fill(&car, [1]);
        assert!(car.run(Duration::ZERO).is_none());
        assert_eq!(car.phase(), Phase::Boarding);
        assert_eq!(car.rides_completed(), 0);
    }

    #[test]
    fn full_cycle() {
        let car = car(2, 1);
        car.open_boarding().unwrap();
        fill(&car, [1, 2]);

        let record = car.run(Duration::ZERO).unwrap();
        assert_eq!(record.ride, RideId(1));
        assert_eq!(record.manifest.as_slice(), &[PassengerId(1), PassengerId(2)]);
        assert!(!record.interrupted);
        assert_eq!(car.phase(), Phase::Idle);
        assert_eq!(car.rides_completed(), 1);
        assert!(!car.is_operational());

        assert!(!car.try_disembark(PassengerId(1)), "unboarding not open yet");
        assert_eq!(car.open_unboarding().unwrap(), RideId(1));
        assert!(!car.try_board(PassengerId(3)));
        assert_eq!(
            car.disembark(PassengerId(2)),
            Some(Disembarkation::AfterRide(RideId(1)))
        );
        assert!(!car.try_disembark(PassengerId(2)));
        assert!(car.close_unboarding().is_err(), "still occupied");
        assert!(car.try_disembark(PassengerId(1)));
        car.close_unboarding().unwrap();

        assert_eq!(car.phase(), Phase::Idle);
        assert_eq!(car.close().unwrap(), 1);
    }

    #[test]
    fn controller_operations_reject_wrong_phase() {
        let car = car(1, 2);
        assert!(car.open_unboarding().is_err());
        assert!(car.close_unboarding().is_err());
        assert!(car.close().is_err(), "still operational");

        car.open_boarding().unwrap();
        assert!(matches!(
            car.open_boarding(),
            Err(CarError::InvalidTransition {
                operation: "open_boarding",
                phase: Phase::Boarding,
                occupancy: 0,
            })
        ));
        fill(&car, [1]);
        assert!(car.open_unboarding().is_err(), "ready, not yet run");
        car.run(Duration::ZERO).unwrap();
        assert!(car.open_boarding().is_err(), "full car cannot reopen boarding");
    }

    #[test]
    fn exhausted_car_refuses_boarding() {
        let car = car(1, 1);
        car.open_boarding().unwrap();
        fill(&car, [1]);
        car.run(Duration::ZERO).unwrap();
        car.open_unboarding().unwrap();
        assert!(car.try_disembark(PassengerId(1)));
        car.close_unboarding().unwrap();
        assert!(car.is_exhausted());
        assert!(car.open_boarding().is_err());
    }

    #[test]
    fn retire_releases_partial_load() {
        let car = car(3, 2);
        car.open_boarding().unwrap();
        fill(&car, [1, 2]);
        assert_eq!(car.retire(RetireReason::Undersubscribed).unwrap(), 2);
        assert_eq!(car.phase(), Phase::Unboarding);
        assert!(!car.is_operational());
        assert_eq!(car.disembark(PassengerId(1)), Some(Disembarkation::Released));
        assert!(car.try_disembark(PassengerId(2)));
        car.close_unboarding().unwrap();
        assert_eq!(car.close().unwrap(), 0);
    }

    #[test]
    fn retire_empty_boarding_goes_idle() {
        let car = car(2, 1);
        car.open_boarding().unwrap();
        assert_eq!(car.retire(RetireReason::Undersubscribed).unwrap(), 0);
        assert_eq!(car.phase(), Phase::Idle);
        assert!(car.is_retired());
    }

    #[test]
    fn retire_rejected_mid_cycle() {
        let car = car(1, 2);
        car.open_boarding().unwrap();
        fill(&car, [1]);
        assert!(car.retire(RetireReason::Undersubscribed).is_err());
    }

    #[test]
    fn waits_return_immediately_when_predicate_holds() {
        for strategy in STRATEGIES {
            let car = car_with(1, 1, strategy);
            assert_eq!(car.wait_until_empty(), WaitOutcome::Ready, "{strategy}");
            car.open_boarding().unwrap();
            fill(&car, [1]);
            assert_eq!(car.wait_until_full(), WaitOutcome::Ready, "{strategy}");
        }
    }

    #[test]
    fn wait_until_full_wakes_on_last_seat() {
        for strategy in STRATEGIES {
            let car = Arc::new(car_with(3, 1, strategy));
            car.open_boarding().unwrap();
            let boarder = Arc::clone(&car);
            let handle = thread::spawn(move || {
                for id in 1..=3 {
                    thread::sleep(Duration::from_millis(2));
                    assert!(boarder.try_board(PassengerId(id)));
                }
            });
            assert_eq!(car.wait_until_full(), WaitOutcome::Ready, "{strategy}");
            assert!(car.is_full());
            handle.join().unwrap();
        }
    }

    #[test]
    fn wait_until_empty_wakes_on_last_exit() {
        for strategy in STRATEGIES {
            let car = Arc::new(car_with(2, 1, strategy));
            car.open_boarding().unwrap();
            fill(&car, [1, 2]);
            car.run(Duration::ZERO).unwrap();
            car.open_unboarding().unwrap();
            let leaver = Arc::clone(&car);
            let handle = thread::spawn(move || {
                for id in 1..=2 {
                    thread::sleep(Duration::from_millis(2));
                    assert!(leaver.try_disembark(PassengerId(id)));
                }
            });
            assert_eq!(car.wait_until_empty(), WaitOutcome::Ready, "{strategy}");
            handle.join().unwrap();
        }
    }

    #[test]
    fn cancel_releases_blocked_wait() {
        for strategy in STRATEGIES {
            let car = Arc::new(car_with(4, 1, strategy));
            car.open_boarding().unwrap();
            let waiter = Arc::clone(&car);
            let handle = thread::spawn(move || waiter.wait_until_full());
            thread::sleep(Duration::from_millis(20));
            assert!(car.cancel());
            assert!(!car.cancel());
            assert_eq!(handle.join().unwrap(), WaitOutcome::Cancelled, "{strategy}");
        }
    }

    #[test]
    fn token_cancel_without_car_still_ends_wait() {
        let car = Arc::new(car(4, 1));
        car.open_boarding().unwrap();
        let waiter = Arc::clone(&car);
        let handle = thread::spawn(move || waiter.wait_until_full());
        thread::sleep(Duration::from_millis(10));
        car.cancel_token().cancel();
        assert_eq!(handle.join().unwrap(), WaitOutcome::Cancelled);
    }

    #[test]
    fn stranded_boarding_detected_under_retire_policy() {
        for strategy in STRATEGIES {
            let config = CarConfig {
                capacity: 3,
                max_rides: 1,
                wait_strategy: strategy,
                wait_slice: Duration::from_millis(5),
                stranded: StrandedPolicy::Retire,
            };
            let car = Car::new(config, CancelToken::new(), EventSink::disabled()).unwrap();
            car.join_queue(PassengerId(1));
            car.open_boarding().unwrap();
            fill(&car, [1]);
            assert_eq!(car.wait_until_full(), WaitOutcome::Stranded, "{strategy}");
        }
    }

    #[test]
    fn interrupted_ride_still_counts() {
        let car = Arc::new(car(1, 3));
        car.open_boarding().unwrap();
        fill(&car, [1]);
        let rider = Arc::clone(&car);
        let handle = thread::spawn(move || rider.run(Duration::from_secs(60)));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(car.phase(), Phase::Running);
        assert!(!car.try_disembark(PassengerId(1)));
        car.cancel();
        let record = handle.join().unwrap().unwrap();
        assert!(record.interrupted);
        assert_eq!(car.rides_completed(), 1);
        assert_eq!(car.phase(), Phase::Idle);
    }

    #[test]
    fn events_are_sequenced_in_lock_order() {
        let (sink, rx) = EventSink::channel();
        let car = Car::new(
            CarConfig {
                capacity: 1,
                max_rides: 1,
                ..CarConfig::default()
            },
            CancelToken::new(),
            sink,
        )
        .unwrap();
        car.join_queue(PassengerId(1));
        car.open_boarding().unwrap();
        fill(&car, [1]);
        car.run(Duration::ZERO).unwrap();
        car.open_unboarding().unwrap();
        car.try_disembark(PassengerId(1));
        car.close_unboarding().unwrap();
        car.close().unwrap();

        let events: Vec<CarEvent> = rx.try_iter().collect();
        let seqs: Vec<u64> = events.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, (0..events.len() as u64).collect::<Vec<_>>());
        assert!(matches!(events[0].kind, EventKind::Queued { .. }));
        assert!(matches!(events[3].kind, EventKind::CarFull { ride: RideId(1) }));
        assert!(matches!(
            events.last().unwrap().kind,
            EventKind::Closed { rides_completed: 1 }
        ));
    }

    // ── Property tests ───────────────────────────────────────────

    #[derive(Clone, Debug)]
    enum Op {
        Queue(u32),
        Board(u32),
        Disembark(u32),
        OpenBoarding,
        Run,
        OpenUnboarding,
        CloseUnboarding,
        Retire,
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u32..8).prop_map(Op::Queue),
            (0u32..8).prop_map(Op::Board),
            (0u32..8).prop_map(Op::Disembark),
            Just(Op::OpenBoarding),
            Just(Op::Run),
            Just(Op::OpenUnboarding),
            Just(Op::CloseUnboarding),
            Just(Op::Retire),
        ]
    }

    proptest! {
        #[test]
        fn invariants_hold_for_any_call_sequence(
            capacity in 1usize..5,
            max_rides in 1u32..4,
            ops in prop::collection::vec(arb_op(), 0..128),
        ) {
            let car = car(capacity, max_rides);
            let mut last_rides = 0;
            for op in ops {
                match op {
                    Op::Queue(id) => { car.join_queue(PassengerId(id)); }
                    Op::Board(id) => { car.try_board(PassengerId(id)); }
                    Op::Disembark(id) => { car.try_disembark(PassengerId(id)); }
                    Op::OpenBoarding => { let _ = car.open_boarding(); }
                    Op::Run => {
                        let before = car.snapshot();
                        if let Some(record) = car.run(Duration::ZERO) {
                            prop_assert!(before.is_full(), "ran with {} of {capacity}", before.occupants.len());
                            prop_assert_eq!(record.manifest.len(), capacity);
                        }
                    }
                    Op::OpenUnboarding => { let _ = car.open_unboarding(); }
                    Op::CloseUnboarding => { let _ = car.close_unboarding(); }
                    Op::Retire => { let _ = car.retire(RetireReason::Undersubscribed); }
                }

                let snap = car.snapshot();
                prop_assert!(snap.occupants.len() <= capacity);
                prop_assert!(snap.phase != Phase::Running);
                if snap.phase == Phase::ReadyToRun {
                    prop_assert!(snap.is_full());
                }
                let mut seen = snap.occupants.clone();
                seen.sort();
                seen.dedup();
                prop_assert_eq!(seen.len(), snap.occupants.len());
                prop_assert!(snap.rides_completed <= max_rides);
                prop_assert!(snap.rides_completed == last_rides || snap.rides_completed == last_rides + 1);
                last_rides = snap.rides_completed;
            }
        }
    }
}
