use serde::{Deserialize, Serialize};

use crate::floor::Floor;
use crate::io::IoState;

/// A pushed/cleared call button, emitted by `Route` and re-emitted by
/// `Bank` on its aggregated `buttons` stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonEvent {
    pub floor: Floor,
    pub active: bool,
}

/// Emitted by an `Io` instance whenever its state changes. `Change` is
/// always emitted alongside a per-variant event so a listener can
/// subscribe either to "something happened" or to a specific transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IoEvent {
    Idle(IoState),
    MovingUp(IoState),
    MovingDown(IoState),
    DoorsOpen(IoState),
    Change { from: IoState, to: IoState },
}

impl IoEvent {
    pub fn state(&self) -> &IoState {
        match self {
            IoEvent::Idle(s) | IoEvent::MovingUp(s) | IoEvent::MovingDown(s) | IoEvent::DoorsOpen(s) => s,
            IoEvent::Change { to, .. } => to,
        }
    }
}

/// The aggregated per-elevator transition event re-emitted on `Bank`'s
/// `state` stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankStateEvent {
    pub elevator: String,
    pub from: IoState,
    pub to: IoState,
}

/// A `ButtonEvent` tagged with the elevator it came from, re-emitted on
/// `Bank`'s aggregated `buttons` stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankButtonEvent {
    pub elevator: String,
    pub floor: Floor,
    pub active: bool,
}

/// Emitted on `Bank`'s `availability` stream whenever an elevator is
/// added or removed from the bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AvailabilityEvent {
    Added { elevator: String, state: IoState },
    Removed { elevator: String },
}
