use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::Notify;

use crate::error::Error;

pub(crate) type Published<T, E> = Result<T, Error<E>>;

/// One in-flight execution of a work function.
///
/// The result slot goes from `None` to `Some` exactly once. Blocking waiters
/// park on `cvar`, async waiters on `notify`; `publish` wakes both at once.
pub(crate) struct Call<T, E> {
    state: Mutex<Option<Published<T, E>>>,
    cvar: Condvar,
    notify: Notify,
    waiters: AtomicUsize,
}

impl<T, E> Call<T, E> {
    pub(crate) fn new() -> Self {
        Call {
            state: Mutex::new(None),
            cvar: Condvar::new(),
            notify: Notify::new(),
            waiters: AtomicUsize::new(1),
        }
    }

    /// Must be called under the registry lock.
    pub(crate) fn join(&self) {
        self.waiters.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn leave(&self) {
        self.waiters.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn waiters(&self) -> usize {
        self.waiters.load(Ordering::Acquire)
    }

    pub(crate) fn publish(&self, result: Published<T, E>) {
        let mut state = self.state.lock();
        debug_assert!(state.is_none(), "flight published twice");
        *state = Some(result);
        drop(state);

        self.cvar.notify_all();
        self.notify.notify_waiters();
    }
}

impl<T: Clone, E: Clone> Call<T, E> {
    pub(crate) fn wait(&self) -> Published<T, E> {
        let mut state = self.state.lock();
        loop {
            if let Some(result) = state.as_ref() {
                return result.clone();
            }
            self.cvar.wait(&mut state);
        }
    }

    /// Like `wait`, but returns `None` once `deadline` passes.
    pub(crate) fn wait_until(&self, deadline: Instant) -> Option<Published<T, E>> {
        let mut state = self.state.lock();
        loop {
            if let Some(result) = state.as_ref() {
                return Some(result.clone());
            }
            if self.cvar.wait_until(&mut state, deadline).timed_out() {
                return state.as_ref().cloned();
            }
        }
    }

    pub(crate) async fn wait_async(&self) -> Published<T, E> {
        loop {
            // Registered before the check so a publish in between is not missed.
            let notified = self.notify.notified();
            let ready = self.state.lock().clone();
            if let Some(result) = ready {
                return result;
            }
            notified.await;
        }
    }
}
