use crate::net::message::MessageId;
use crate::time::SimTime;
use std::any::Any;
use thiserror::Error;

///
/// An error raised by the scheduling surface of the future event set.
///
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulingError {
    /// The message is already queued in the future event set.
    #[error("message #{0} is already scheduled")]
    AlreadyScheduled(MessageId),
    /// The message is not queued, so it cannot be cancelled.
    #[error("message #{0} is not scheduled")]
    NotScheduled(MessageId),
    /// The requested arrival time lies before the current simulation time.
    #[error("cannot schedule event at {time}, current time is {now}")]
    TimeInPast {
        /// The requested arrival time.
        time: SimTime,
        /// The simulation time at the point of the request.
        now: SimTime,
    },
}

///
/// A structured failure of a simulation run.
///
#[derive(Debug, Error)]
pub enum SimError {
    /// Malformed configuration, unknown type names, missing bindings.
    #[error("configuration error: {0}")]
    Config(String),
    /// Invalid network topology: missing gates, bad connections.
    #[error("build error: {0}")]
    Build(String),
    /// Misuse of the event scheduling surface.
    #[error("scheduling error: {0}")]
    Scheduling(#[from] SchedulingError),
    /// An operation on a message not owned by the caller.
    #[error("ownership error: {0}")]
    Ownership(String),
    /// An operation invalid in the current lifecycle state.
    #[error("state error: {0}")]
    State(String),
    /// A failure reported by the model itself.
    #[error("model error: {0}")]
    User(String),
    /// A violated kernel invariant.
    #[error("fatal kernel error: {0}")]
    Fatal(String),
}

impl SimError {
    /// The process exit code associated with this kind of failure.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            SimError::Config(_) => 2,
            _ => 1,
        }
    }
}

// The panic payload used to carry a typed `SimError` through an unwind
// out of module code. Raised by `error(..)` and by kernel-side misuse
// checks; caught by the delivery harness.
pub(crate) struct SimUnwind(pub(crate) SimError);

// Raises a typed failure out of the current module scope.
pub(crate) fn raise(error: SimError) -> ! {
    std::panic::panic_any(SimUnwind(error))
}

// Converts an arbitrary unwind payload into a `SimError`, preserving
// typed payloads and stringifying plain panics.
pub(crate) fn unwind_to_error(unwind: Box<dyn Any + Send + 'static>) -> SimError {
    match unwind.downcast::<SimUnwind>() {
        Ok(sim_unwind) => sim_unwind.0,
        Err(other) => {
            if let Some(s) = other.downcast_ref::<&str>() {
                SimError::User(format!("module panicked: {s}"))
            } else if let Some(s) = other.downcast_ref::<String>() {
                SimError::User(format!("module panicked: {s}"))
            } else {
                SimError::User("module panicked".to_string())
            }
        }
    }
}
