use std::borrow::Cow;

use crate::error::Error;

/// Options represents the options for a singleflight group
#[derive(Debug, Clone)]
pub struct Options {
    /// Name is the label recorded on every span the group emits. default is "singleflight"
    /// set it when several groups live in one process to tell their traces apart.
    pub name: Cow<'static, str>,
    /// CountCancelledWaiters decides whether a waiter that gave up still counts toward
    /// the owner's `shared` flag. default is false
    /// when false, a cancelled waiter is subtracted and the owner reports `shared`
    /// only if someone else actually received its result.
    pub count_cancelled_waiters: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            name: Cow::Borrowed("singleflight"),
            count_cancelled_waiters: false,
        }
    }
}

/// What one caller got out of a flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<T, E> {
    /// The flight's result, identical for every caller attached to it.
    pub result: Result<T, Error<E>>,
    /// Whether the result was handed to more than one caller.
    pub shared: bool,
}

impl<T, E> Outcome<T, E> {
    /// Drops the `shared` flag and returns the result.
    pub fn into_result(self) -> Result<T, Error<E>> {
        self.result
    }

    /// Whether the result was handed to more than one caller.
    pub fn is_shared(&self) -> bool {
        self.shared
    }
}
