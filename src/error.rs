use crate::floor::Floor;

/// Errors surfaced by the core. Precondition violations (`InvalidFloor`,
/// `InvalidStateTransition`, `DomainError`) are returned to the caller;
/// `InternalBug` marks an unreachable state or a defect in a `Strategy`
/// implementation and carries diagnostic context rather than silently
/// corrupting state.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("floor {floor} is outside the configured range [{min}, {max}]")]
    InvalidFloor { floor: Floor, min: Floor, max: Floor },

    #[error("domain error: {0}")]
    DomainError(String),

    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// Reserved for the external health monitor's estimation-limit
    /// reporting. Never constructed by this crate: the estimation
    /// algorithm reports the sentinel `-1` instead of failing.
    #[error("timeout: {0}")]
    Timeout(String),

    #[error("internal bug in {label}: {detail} (context: {context})")]
    InternalBug {
        label: String,
        detail: String,
        context: String,
    },
}

impl Error {
    pub fn domain(msg: impl Into<String>) -> Self {
        Error::DomainError(msg.into())
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Error::InvalidStateTransition(msg.into())
    }

    pub fn internal_bug(label: impl Into<String>, detail: impl Into<String>, context: impl Into<String>) -> Self {
        Error::InternalBug {
            label: label.into(),
            detail: detail.into(),
            context: context.into(),
        }
    }
}
