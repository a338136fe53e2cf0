//! A discrete-event elevator bank controller.
//!
//! Three layers, leaf to root:
//!
//! - [`route`]: the ordered, idempotent queue of floors one elevator
//!   must visit, with conditional-after-pickup reservations.
//! - [`strategy`]: pure planners (`InsertOrder`, `StopEnRoute`) that
//!   turn a route into an ordered list of stops, plus the shared
//!   batched estimation algorithm built on top of them.
//! - [`io`]: the four-state discrete-event state machine (idle,
//!   moving up, moving down, doors open), driven by scheduled,
//!   cancellable one-shot timers.
//!
//! [`elevator`] glues those three together into one car; [`bank`]
//! holds a pool of cars and dispatches incoming rides to one of them.
//!
//! The CLI shell, HTTP endpoints, config-file loading, and the
//! periodic health monitor are external collaborators that call into
//! [`Bank`]'s public operations and consume its event streams; none of
//! that is this crate's concern.

pub mod bank;
pub mod config;
pub mod elevator;
pub mod error;
pub mod event;
pub mod floor;
pub mod io;
pub mod logging;
pub mod route;
pub mod strategy;

pub use bank::{Bank, ElevatorId};
pub use config::{Config, LogLevel};
pub use elevator::Elevator;
pub use error::Error;
pub use event::{AvailabilityEvent, BankButtonEvent, BankStateEvent, ButtonEvent, IoEvent};
pub use floor::Floor;
pub use io::{Io, IoState};
pub use route::{ConditionalFloor, Route, RouteItem};
pub use strategy::{InsertOrder, StopEnRoute, Strategy};
