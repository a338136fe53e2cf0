use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::elevator::Elevator;
use crate::error::Error;
use crate::event::{AvailabilityEvent, BankButtonEvent, BankStateEvent, IoEvent};
use crate::floor::{validate_floor, Floor};
use crate::io::{Io, IoState};
use crate::strategy::{EstimationLimits, Strategy};

const BANK_CHANNEL_CAPACITY: usize = 256;

pub type ElevatorId = String;

/// Per-elevator bookkeeping the bank owns in addition to the `Elevator`
/// itself: the re-emitter task forwarding its IO/button events onto the
/// bank's aggregated streams, and the dynamic per-id channel described
/// in the external interfaces (listening by elevator id).
struct Tracked {
    elevator: Elevator,
    per_elevator_tx: broadcast::Sender<IoEvent>,
    relay: JoinHandle<()>,
}

struct BankInner {
    order: Mutex<Vec<ElevatorId>>,
    elevators: Mutex<HashMap<ElevatorId, Tracked>>,
    config: Config,
    strategy: Arc<dyn Strategy>,
    running: Mutex<bool>,
    state_tx: broadcast::Sender<BankStateEvent>,
    availability_tx: broadcast::Sender<AvailabilityEvent>,
    buttons_tx: broadcast::Sender<BankButtonEvent>,
}

/// The multi-elevator dispatcher. Owns every `Elevator` in the pool,
/// chooses one per incoming ride via a three-tier policy (free-first,
/// then minimum estimated time, then shortest pending route), and fans
/// each car's events into aggregated streams.
#[derive(Clone)]
pub struct Bank {
    inner: Arc<BankInner>,
}

impl Bank {
    /// Builds a bank with `config.nr_of_elevators` cars, all idle at
    /// `config.initial_floor`, sharing `strategy`. Elevators and their
    /// `Route`/`Io` are created here and destroyed with the bank (or
    /// with an explicit `remove_elevator`); a `Bank` never outlives
    /// knowledge of what it built.
    pub fn new(config: Config, strategy: Arc<dyn Strategy>) -> Result<Self, Error> {
        config.validate()?;

        let (state_tx, _) = broadcast::channel(BANK_CHANNEL_CAPACITY);
        let (availability_tx, _) = broadcast::channel(BANK_CHANNEL_CAPACITY);
        let (buttons_tx, _) = broadcast::channel(BANK_CHANNEL_CAPACITY);

        let bank = Bank {
            inner: Arc::new(BankInner {
                order: Mutex::new(Vec::new()),
                elevators: Mutex::new(HashMap::new()),
                config,
                strategy: strategy.clone(),
                running: Mutex::new(false),
                state_tx,
                availability_tx,
                buttons_tx,
            }),
        };

        let limits = EstimationLimits {
            travel_time_per_floor_ms: config.travel_time_per_floor_ms as i64,
            door_open_time_ms: config.door_open_time_ms as i64,
            estimation_limit_ms: config.estimation_limit_ms,
        };

        for i in 0..config.nr_of_elevators {
            let id = i.to_string();
            let io = Io::new(config.initial_floor, config.travel_time_per_floor_ms, config.door_open_time_ms);
            let elevator = Elevator::new(io, strategy.clone(), limits, config.min_floor, config.max_floor);
            bank.add_elevator(id, elevator)?;
        }

        Ok(bank)
    }

    /// Inserts `elevator` under `id`. Re-inserting the same id with the
    /// same instance is a no-op (warned); re-inserting with a different
    /// instance is a `DomainError`, since that would silently orphan the
    /// previous car's listeners. If the bank is already running, the new
    /// car is started `soft` so it waits for its first event instead of
    /// immediately trying to move an empty route.
    pub fn add_elevator(&self, id: ElevatorId, elevator: Elevator) -> Result<(), Error> {
        {
            let elevators = self.inner.elevators.lock();
            if let Some(existing) = elevators.get(&id) {
                if existing.elevator.ptr_eq(&elevator) {
                    log::warn!("bank: elevator '{id}' already added, ignoring");
                    return Ok(());
                }
                return Err(Error::domain(format!("elevator id '{id}' already in use by a different instance")));
            }
        }

        let (per_elevator_tx, _) = broadcast::channel(BANK_CHANNEL_CAPACITY);

        let relay = {
            let relay_id = id.clone();
            let mut io_events = elevator.subscribe_io();
            let mut button_events = elevator.subscribe_buttons();
            let per_elevator_tx = per_elevator_tx.clone();
            let state_tx = self.inner.state_tx.clone();
            let buttons_tx = self.inner.buttons_tx.clone();

            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        io_event = io_events.recv() => {
                            match io_event {
                                Ok(event) => {
                                    if let IoEvent::Change { from, to } = &event {
                                        let _ = state_tx.send(BankStateEvent {
                                            elevator: relay_id.clone(),
                                            from: *from,
                                            to: *to,
                                        });
                                    }
                                    let _ = per_elevator_tx.send(event);
                                }
                                Err(_) => break,
                            }
                        }
                        button_event = button_events.recv() => {
                            match button_event {
                                Ok(event) => {
                                    let _ = buttons_tx.send(BankButtonEvent {
                                        elevator: relay_id.clone(),
                                        floor: event.floor,
                                        active: event.active,
                                    });
                                }
                                Err(_) => break,
                            }
                        }
                    }
                }
            })
        };

        if *self.inner.running.lock() {
            elevator.start(true);
        }

        let state = elevator.state();
        self.inner.order.lock().push(id.clone());
        self.inner.elevators.lock().insert(id.clone(), Tracked { elevator, per_elevator_tx, relay });
        let _ = self.inner.availability_tx.send(AvailabilityEvent::Added { elevator: id, state });
        Ok(())
    }

    /// Shuts the elevator down (cancelling its pending timer and
    /// detaching its listeners), removes it from the bank, and detaches
    /// the bank's own re-emitter for that id. Unknown id is a no-op.
    pub fn remove_elevator(&self, id: &str) {
        let removed = self.inner.elevators.lock().remove(id);
        match removed {
            Some(tracked) => {
                tracked.elevator.shutdown();
                tracked.relay.abort();
                self.inner.order.lock().retain(|existing| existing != id);
                let _ = self.inner.availability_tx.send(AvailabilityEvent::Removed { elevator: id.to_string() });
            }
            None => log::warn!("bank: no elevator '{id}' to remove"),
        }
    }

    /// Every elevator id, in insertion order.
    pub fn list_elevators(&self) -> Vec<ElevatorId> {
        self.inner.order.lock().clone()
    }

    pub fn get_elevator_state(&self, id: &str) -> Result<IoState, Error> {
        self.with_elevator(id, |tracked| tracked.elevator.state())
    }

    pub fn get_all_elevator_states(&self) -> Vec<(ElevatorId, IoState)> {
        self.for_each_in_order(|id, tracked| (id.clone(), tracked.elevator.state()))
    }

    pub fn get_pushed_buttons(&self, id: &str) -> Result<Vec<Floor>, Error> {
        self.with_elevator(id, |tracked| tracked.elevator.pushed_buttons())
    }

    pub fn get_all_pushed_buttons(&self) -> Vec<(ElevatorId, Vec<Floor>)> {
        self.for_each_in_order(|id, tracked| (id.clone(), tracked.elevator.pushed_buttons()))
    }

    /// The core dispatch path: validates the floors, narrows to
    /// non-vetoing candidates, then picks one by free-first (if
    /// enabled), else minimum estimated time, else shortest pending
    /// route. Ties at every tier favor the candidate inserted earliest.
    pub async fn add_ride(&self, pickup: Floor, dropoff: Option<Floor>) -> Result<ElevatorId, Error> {
        let config = self.inner.config;
        validate_floor(pickup, config.min_floor, config.max_floor)?;
        if let Some(d) = dropoff {
            validate_floor(d, config.min_floor, config.max_floor)?;
        }

        let candidates: Vec<(ElevatorId, Elevator)> = {
            let order = self.inner.order.lock();
            let elevators = self.inner.elevators.lock();
            order
                .iter()
                .filter_map(|id| elevators.get(id).map(|tracked| (id.clone(), tracked.elevator.clone())))
                .filter(|(_, elevator)| !elevator.check_if_ride_is_vetoed(pickup, dropoff))
                .collect()
        };

        if candidates.is_empty() {
            return Err(Error::domain("all elevators vetoed this ride"));
        }

        if config.use_free_first {
            if let Some((id, elevator)) = candidates.iter().find(|(_, elevator)| elevator.is_free()) {
                elevator.add_ride(pickup, dropoff)?;
                return Ok(id.clone());
            }
        }

        let estimates = futures::future::join_all(candidates.iter().map(|(id, elevator)| {
            let id = id.clone();
            let elevator = elevator.clone();
            async move {
                let estimate = elevator.estimate_pickup_dropoff_time(pickup, dropoff).await;
                (id, estimate)
            }
        }))
        .await;

        if let Some((id, _)) = estimates.iter().filter(|(_, estimate)| *estimate > -1).min_by_key(|(_, estimate)| *estimate) {
            let (_, elevator) = candidates.iter().find(|(cid, _)| cid == id).expect("estimate id came from candidates");
            elevator.add_ride(pickup, dropoff)?;
            return Ok(id.clone());
        }

        match candidates.iter().min_by_key(|(_, elevator)| elevator.get_route_length()) {
            Some((id, elevator)) => {
                elevator.add_ride(pickup, dropoff)?;
                Ok(id.clone())
            }
            None => Err(Error::internal_bug(
                "bank::add_ride",
                "no candidate survived the shortest-route fallback despite a non-empty candidate list",
                format!("pickup={pickup} dropoff={dropoff:?}"),
            )),
        }
    }

    /// Starts every elevator (non-soft: each immediately runs its
    /// decision step).
    pub fn start(&self) {
        *self.inner.running.lock() = true;
        for tracked in self.inner.elevators.lock().values() {
            tracked.elevator.start(false);
        }
    }

    pub fn shutdown(&self) {
        *self.inner.running.lock() = false;
        for tracked in self.inner.elevators.lock().values() {
            tracked.elevator.shutdown();
        }
    }

    /// True iff every elevator reports running; short-circuits false on
    /// the first one that isn't.
    pub fn is_running(&self) -> bool {
        self.inner.elevators.lock().values().all(|tracked| tracked.elevator.is_running())
    }

    pub fn subscribe_state(&self) -> broadcast::Receiver<BankStateEvent> {
        self.inner.state_tx.subscribe()
    }

    pub fn subscribe_availability(&self) -> broadcast::Receiver<AvailabilityEvent> {
        self.inner.availability_tx.subscribe()
    }

    pub fn subscribe_buttons(&self) -> broadcast::Receiver<BankButtonEvent> {
        self.inner.buttons_tx.subscribe()
    }

    pub fn subscribe_elevator(&self, id: &str) -> Result<broadcast::Receiver<IoEvent>, Error> {
        self.with_elevator(id, |tracked| tracked.per_elevator_tx.subscribe())
    }

    fn with_elevator<T>(&self, id: &str, f: impl FnOnce(&Tracked) -> T) -> Result<T, Error> {
        self.inner
            .elevators
            .lock()
            .get(id)
            .map(f)
            .ok_or_else(|| Error::domain(format!("no elevator with id '{id}'")))
    }

    fn for_each_in_order<T>(&self, mut f: impl FnMut(&ElevatorId, &Tracked) -> T) -> Vec<T> {
        let order = self.inner.order.lock();
        let elevators = self.inner.elevators.lock();
        order.iter().filter_map(|id| elevators.get(id).map(|tracked| f(id, tracked))).collect()
    }
}
