use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::error::Error;
use crate::event::{ButtonEvent, IoEvent};
use crate::floor::{validate_floor, Floor};
use crate::io::{Io, IoState};
use crate::route::Route;
use crate::strategy::{self, EstimationLimits, Strategy};

struct ElevatorInner {
    io: Io,
    route: Mutex<Route>,
    strategy: Arc<dyn Strategy>,
    limits: EstimationLimits,
    min_floor: Floor,
    max_floor: Floor,
    listener: Mutex<Option<JoinHandle<()>>>,
}

/// One elevator car: an `Io` state machine, the `Route` it is working
/// through, and the `Strategy` deciding what to do next. Cheaply
/// cloneable, like `Io`; every clone shares the same car.
#[derive(Clone)]
pub struct Elevator {
    inner: Arc<ElevatorInner>,
}

impl Elevator {
    pub fn new(io: Io, strategy: Arc<dyn Strategy>, limits: EstimationLimits, min_floor: Floor, max_floor: Floor) -> Self {
        Elevator {
            inner: Arc::new(ElevatorInner {
                io,
                route: Mutex::new(Route::new()),
                strategy,
                limits,
                min_floor,
                max_floor,
                listener: Mutex::new(None),
            }),
        }
    }

    /// True iff `other` shares this car's underlying state: same `Io`,
    /// same `Route`, same listener handle. Used by `Bank::add_elevator`
    /// to tell "re-adding the same car" apart from "a different car
    /// claiming the same id."
    pub fn ptr_eq(&self, other: &Elevator) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Admits a ride unless the strategy vetoes it, in which case it is
    /// logged and dropped silently rather than surfaced as an error:
    /// only floor validation is a caller-visible failure here. Triggers
    /// an immediate decision step after enqueueing, since a newly added
    /// ride may change what an idle car should do next.
    pub fn add_ride(&self, pickup: Floor, dropoff: Option<Floor>) -> Result<(), Error> {
        let pickup = validate_floor(pickup, self.inner.min_floor, self.inner.max_floor)?;
        let dropoff = dropoff.map(|d| validate_floor(d, self.inner.min_floor, self.inner.max_floor)).transpose()?;

        let current = self.inner.io.current_floor();
        let mut route = self.inner.route.lock();
        if self.inner.strategy.check_if_ride_is_vetoed(&route, current, pickup, dropoff) {
            log::info!("elevator: ride to {pickup} (dropoff {dropoff:?}) vetoed by strategy, dropping");
            return Ok(());
        }
        route.add_ride(pickup, dropoff);
        drop(route);

        self.decision_step();
        Ok(())
    }

    /// Read-only veto check, for a dispatcher comparing candidate
    /// elevators before committing a ride to any one of them.
    pub fn check_if_ride_is_vetoed(&self, pickup: Floor, dropoff: Option<Floor>) -> bool {
        let current = self.inner.io.current_floor();
        let route = self.inner.route.lock();
        self.inner.strategy.check_if_ride_is_vetoed(&route, current, pickup, dropoff)
    }

    /// Estimated time to pick up and (if given) drop off, against a
    /// private copy of this car's route. Never mutates real state.
    pub async fn estimate_pickup_dropoff_time(&self, pickup: Floor, dropoff: Option<Floor>) -> i64 {
        let route_copy = self.inner.route.lock().copy();
        let current = self.inner.io.current_floor();
        strategy::estimate_pickup_dropoff_time(
            self.inner.strategy.as_ref(),
            route_copy,
            current,
            pickup,
            dropoff,
            &self.inner.limits,
        )
        .await
    }

    pub fn is_free(&self) -> bool {
        self.inner.io.is_idle() && self.inner.route.lock().length() == 0
    }

    pub fn get_route_length(&self) -> usize {
        self.inner.route.lock().length()
    }

    pub fn state(&self) -> IoState {
        self.inner.io.state()
    }

    pub fn subscribe_io(&self) -> broadcast::Receiver<IoEvent> {
        self.inner.io.subscribe()
    }

    pub fn subscribe_buttons(&self) -> broadcast::Receiver<ButtonEvent> {
        self.inner.route.lock().subscribe_buttons()
    }

    pub fn pushed_buttons(&self) -> Vec<Floor> {
        self.inner.route.lock().pushed_buttons()
    }

    /// Starts the background listener that re-runs the decision step
    /// whenever the car settles into `Idle`. `soft` skips the initial
    /// decision step, leaving the car parked until its next event.
    pub fn start(&self, soft: bool) {
        let mut listener = self.inner.listener.lock();
        if listener.is_some() {
            return;
        }

        if !soft {
            self.decision_step();
        }

        let this = self.clone();
        let mut events = self.inner.io.subscribe();
        *listener = Some(tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                if matches!(event, IoEvent::Idle(_)) {
                    this.decision_step();
                }
            }
        }));
    }

    pub fn is_running(&self) -> bool {
        self.inner.listener.lock().is_some()
    }

    pub fn shutdown(&self) {
        if let Some(handle) = self.inner.listener.lock().take() {
            handle.abort();
        }
        self.inner.io.shutdown();
    }

    /// The core dispatch loop step: if idle and parked on a floor that
    /// is due a stop, open the doors; otherwise ask the strategy how
    /// far to move and issue that move. Failures are logged, not
    /// propagated: a single bad decision should not take the whole
    /// elevator offline.
    fn decision_step(&self) {
        let state = self.inner.io.state();
        if !state.is_idle() {
            return;
        }
        let current = state.current_floor();

        let mut route = self.inner.route.lock();
        if route.should_visit(current) {
            route.visit_now(current);
            drop(route);
            if let Err(e) = self.inner.io.open_doors() {
                log::warn!("elevator: failed to open doors at floor {current}: {e}");
            }
            return;
        }

        let n = self.inner.strategy.nr_floors_to_move(&route, current);
        drop(route);
        if n != 0 {
            if let Err(e) = self.inner.io.move_by(n) {
                log::warn!("elevator: failed to move {n} floors from {current}: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::route::Route as RouteForVeto;
    use crate::strategy::InsertOrder;

    fn limits() -> EstimationLimits {
        EstimationLimits { travel_time_per_floor_ms: 1000, door_open_time_ms: 2000, estimation_limit_ms: 600_000 }
    }

    #[tokio::test(start_paused = true)]
    async fn add_ride_drives_an_idle_car_toward_the_pickup() {
        let io = Io::new(0, 1000, 2000);
        let elevator = Elevator::new(io.clone(), Arc::new(InsertOrder), limits(), -100, 100);

        elevator.add_ride(5, None).unwrap();
        match io.state() {
            IoState::MovingUp { to, .. } => assert_eq!(to, 5),
            other => panic!("expected MovingUp, got {other:?}"),
        }

        tokio::time::advance(Duration::from_millis(5000)).await;
        tokio::task::yield_now().await;
        assert_eq!(io.current_floor(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn started_elevator_opens_doors_on_arrival_without_manual_prompting() {
        let io = Io::new(0, 1000, 2000);
        let elevator = Elevator::new(io.clone(), Arc::new(InsertOrder), limits(), -100, 100);
        elevator.start(false);

        elevator.add_ride(3, None).unwrap();
        tokio::time::advance(Duration::from_millis(3000)).await;
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        assert!(matches!(io.state(), IoState::DoorsOpen { .. }));
        assert_eq!(elevator.get_route_length(), 0);

        elevator.shutdown();
    }

    #[tokio::test]
    async fn is_free_reflects_both_idle_io_and_an_empty_route() {
        let io = Io::new(0, 1000, 2000);
        let elevator = Elevator::new(io.clone(), Arc::new(InsertOrder), limits(), -100, 100);
        assert!(elevator.is_free());

        elevator.add_ride(4, None).unwrap();
        assert!(!elevator.is_free());
    }

    #[derive(Clone, Copy, Default)]
    struct AlwaysVeto;

    impl Strategy for AlwaysVeto {
        fn ordered_stops(
            &self,
            route: &mut RouteForVeto,
            _current: Floor,
            _target: Option<Floor>,
            _stop_early: &mut dyn FnMut(Floor, &[Floor]) -> bool,
        ) -> Vec<Floor> {
            route.iter().collect()
        }

        fn nr_floors_to_move(&self, _route: &RouteForVeto, _current: Floor) -> i32 {
            0
        }

        fn check_if_ride_is_vetoed(
            &self,
            _route: &RouteForVeto,
            _current: Floor,
            _pickup: Floor,
            _dropoff: Option<Floor>,
        ) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn vetoed_rides_are_dropped_silently_and_never_reach_the_route() {
        let io = Io::new(0, 1000, 2000);
        let elevator = Elevator::new(io, Arc::new(AlwaysVeto), limits(), -100, 100);
        assert!(elevator.add_ride(4, None).is_ok());
        assert_eq!(elevator.get_route_length(), 0);
    }
}
