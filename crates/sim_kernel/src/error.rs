use std::fmt;
use std::io;

use uuid::Uuid;

/// Errors surfaced by the simulation kernel.
///
/// Setup errors ([SimError::MissingRegistry]) fail before any virtual time
/// advances. Resolution errors ([SimError::UnknownTarget]) are fatal and not
/// retried. [SimError::EmptyQueue] is recovered by [crate::environment::Environment::run]
/// as normal termination and only surfaces from a bare `step()`.
#[derive(Debug)]
pub enum SimError {
    /// The scheduler was stepped without an attached component registry.
    MissingRegistry,
    /// No further events are scheduled.
    EmptyQueue,
    /// A negative or non-finite delay was requested at schedule time.
    InvalidDelay(f64),
    /// A single-targeted event references a component id that is not registered.
    UnknownTarget(Uuid),
    /// A failed event fired without any listener defusing it.
    RoutineFailed(String),
    Io(io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::MissingRegistry => {
                write!(f, "no component registry attached; call attach() before stepping")
            }
            SimError::EmptyQueue => write!(f, "event queue is empty"),
            SimError::InvalidDelay(delay) => {
                write!(f, "invalid delay {delay}; delays must be finite and non-negative")
            }
            SimError::UnknownTarget(id) => {
                write!(f, "event targets unknown component {id}")
            }
            SimError::RoutineFailed(message) => {
                write!(f, "unhandled routine failure: {message}")
            }
            SimError::Io(err) => write!(f, "event log io error: {err}"),
            SimError::Json(err) => write!(f, "event log serialization error: {err}"),
        }
    }
}

impl std::error::Error for SimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimError::Io(err) => Some(err),
            SimError::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for SimError {
    fn from(err: io::Error) -> Self {
        SimError::Io(err)
    }
}

impl From<serde_json::Error> for SimError {
    fn from(err: serde_json::Error) -> Self {
        SimError::Json(err)
    }
}
