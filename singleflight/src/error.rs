use std::sync::Arc;
use thiserror::Error;

/// Error shared by every caller attached to one flight.
///
/// Only `Work` comes from the work function itself; it is handed out
/// verbatim. The other variants describe what happened to the flight, or to
/// this particular waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error<E> {
    /// The work function returned an error.
    #[error("{0}")]
    Work(E),
    /// This caller gave up waiting. The flight itself kept running.
    #[error("gave up waiting for the in-flight call")]
    Cancelled,
    /// The work function panicked before producing a result.
    #[error("in-flight call panicked")]
    Panicked,
    /// The owner of the flight was dropped before its work finished.
    #[error("in-flight call was dropped before it completed")]
    Abandoned,
}

impl<E> Error<E> {
    /// Returns the work function's error, if that is what this is.
    pub fn work_error(&self) -> Option<&E> {
        match self {
            Error::Work(e) => Some(e),
            _ => None,
        }
    }

    /// Consumes the error, returning the work function's error if there is one.
    pub fn into_work_error(self) -> Option<E> {
        match self {
            Error::Work(e) => Some(e),
            _ => None,
        }
    }

    /// Whether this caller gave up waiting.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// Clonable error for work functions whose own errors are not `Clone`.
///
/// ```
/// use singleflight::{Group, SharedError};
///
/// let group: Group<String, u16, SharedError> = Group::new();
/// let outcome = group.work("status".to_string(), || {
///     "not a number"
///         .parse::<u16>()
///         .map_err(|e| SharedError::new(e.into()))
/// });
/// assert!(outcome.result.is_err());
/// ```
pub type SharedError = Arc<anyhow::Error>;
