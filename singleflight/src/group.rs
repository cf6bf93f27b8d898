use core::fmt;
use core::future::Future;
use core::hash::Hash;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, instrument, trace, warn};

use crate::call::{Call, Published};
use crate::error::Error;
use crate::flight::Flight;
use crate::types::{Options, Outcome};

type Registry<K, T, E> = Mutex<HashMap<K, Arc<Call<T, E>>>>;

struct Inner<K, T, E> {
    options: Options,
    calls: Registry<K, T, E>,
}

/// Group represents a class of work and creates a space in which units of work
/// can be executed with duplicate suppression.
///
/// Clones share the same registry. Separate `Group::new()` values never see
/// each other's flights.
pub struct Group<K, T, E> {
    inner: Arc<Inner<K, T, E>>,
}

impl<K, T, E> Clone for Group<K, T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K: Hash + Eq, T, E> Default for Group<K, T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T, E> fmt::Debug for Group<K, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.inner.options.name)
            .field("in_flight", &self.inner.calls.lock().len())
            .finish()
    }
}

impl<K: Hash + Eq, T, E> Group<K, T, E> {
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> Self {
        Group {
            inner: Arc::new(Inner {
                options,
                calls: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn options(&self) -> &Options {
        &self.inner.options
    }

    /// Number of flights currently pending.
    pub fn in_flight(&self) -> usize {
        self.inner.calls.lock().len()
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        self.inner.calls.lock().contains_key(key)
    }
}

impl<K, T, E> Group<K, T, E>
where
    K: Hash + Eq + Clone + fmt::Debug,
    T: Clone,
    E: Clone,
{
    /// work executes and returns the results of the given function, making
    /// sure that only one execution is in-flight for a given key at a
    /// time. If a duplicate comes in, the duplicate caller waits for the
    /// original to complete and receives the same results.
    /// The returned `shared` indicates whether the result was given to multiple callers.
    #[instrument(skip(self, work), fields(group = %self.inner.options.name))]
    pub fn work<F>(&self, key: K, work: F) -> Outcome<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        match self.enter(&key) {
            Role::Waiter(waiter) => waiter.wait(),
            Role::Owner(owner) => {
                trace!("working...");
                let result = work().map_err(Error::Work);
                owner.finish(result)
            }
        }
    }

    /// work_timeout is like work, but a caller that joins an existing flight
    /// stops waiting after `timeout` and gets `Error::Cancelled`.
    ///
    /// The timeout does not apply to the owner: a caller that starts the
    /// flight runs the work to completion for the benefit of everyone else.
    #[instrument(skip(self, work), fields(group = %self.inner.options.name))]
    pub fn work_timeout<F>(&self, key: K, timeout: Duration, work: F) -> Outcome<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        match self.enter(&key) {
            Role::Waiter(waiter) => match Instant::now().checked_add(timeout) {
                Some(deadline) => waiter.wait_until(deadline),
                None => waiter.wait(),
            },
            Role::Owner(owner) => {
                trace!("working...");
                let result = work().map_err(Error::Work);
                owner.finish(result)
            }
        }
    }

    /// async_work is like work but awaits the future produced by `work`.
    ///
    /// Dropping the returned future while it waits on someone else's flight
    /// detaches only this caller. Dropping it while it owns the flight
    /// releases the attached waiters with `Error::Abandoned`.
    #[instrument(skip(self, work), fields(group = %self.inner.options.name))]
    pub async fn async_work<F, Fut>(&self, key: K, work: F) -> Outcome<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.enter(&key) {
            Role::Waiter(waiter) => waiter.wait_async().await,
            Role::Owner(owner) => {
                trace!("working...");
                let result = work().await.map_err(Error::Work);
                owner.finish(result)
            }
        }
    }

    /// async_work_cancellable is like async_work, but a caller that joins an
    /// existing flight returns `Error::Cancelled` as soon as `token` fires.
    ///
    /// The token is ignored by the owner, whose work keeps running.
    #[instrument(skip(self, token, work), fields(group = %self.inner.options.name))]
    pub async fn async_work_cancellable<F, Fut>(
        &self,
        key: K,
        token: &CancellationToken,
        work: F,
    ) -> Outcome<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.enter(&key) {
            Role::Waiter(waiter) => waiter.wait_cancellable(token).await,
            Role::Owner(owner) => {
                trace!("working...");
                let result = work().await.map_err(Error::Work);
                owner.finish(result)
            }
        }
    }

    /// spawn_work runs async_work on a new tokio task and hands back a
    /// [`Flight`] to await the outcome.
    ///
    /// Dropping the `Flight` never cancels the work.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn spawn_work<F, Fut>(&self, key: K, work: F) -> Flight<T, E>
    where
        K: Send + Sync + 'static,
        T: Send + Sync + 'static,
        E: Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let group = self.clone();
        Flight::new(tokio::spawn(
            async move { group.async_work(key, work).await },
        ))
    }

    /// Joins the flight for `key`, or registers a new one owned by the caller.
    fn enter<'a>(&'a self, key: &'a K) -> Role<'a, K, T, E> {
        let mut calls = self.inner.calls.lock();
        if let Some(call) = calls.get(key) {
            call.join();
            trace!("joining in-flight call");
            return Role::Waiter(Waiter {
                call: call.clone(),
                count_cancelled: self.inner.options.count_cancelled_waiters,
                done: false,
            });
        }

        let call = Arc::new(Call::new());
        calls.insert(key.clone(), call.clone());
        trace!("entry inited");
        Role::Owner(Owner {
            registry: &self.inner.calls,
            key,
            call,
            finished: false,
        })
    }
}

enum Role<'a, K: Hash + Eq, T, E> {
    Owner(Owner<'a, K, T, E>),
    Waiter(Waiter<T, E>),
}

/// The caller that runs the work. Dropping it without `finish` (a panic, or
/// a dropped future) still clears the registry entry and wakes the waiters.
struct Owner<'a, K: Hash + Eq, T, E> {
    registry: &'a Registry<K, T, E>,
    key: &'a K,
    call: Arc<Call<T, E>>,
    finished: bool,
}

impl<K: Hash + Eq, T, E> Owner<'_, K, T, E> {
    /// Removes the entry and returns the final waiter count. No caller can
    /// join once the entry is gone.
    fn retire(&self) -> usize {
        let mut calls = self.registry.lock();
        calls.remove(self.key);
        let waiters = self.call.waiters();
        drop(calls);

        trace!(waiters, "entry removed");
        waiters
    }
}

impl<K: Hash + Eq, T: Clone, E: Clone> Owner<'_, K, T, E> {
    fn finish(mut self, result: Published<T, E>) -> Outcome<T, E> {
        // A panicking clone must still reach the drop path.
        let published = result.clone();
        self.finished = true;
        let waiters = self.retire();
        self.call.publish(published);

        trace!(shared = waiters > 1, "work done");
        Outcome {
            result,
            shared: waiters > 1,
        }
    }
}

impl<K: Hash + Eq, T, E> Drop for Owner<'_, K, T, E> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let err = if std::thread::panicking() {
            error!("work panicked, releasing waiters");
            Error::Panicked
        } else {
            warn!("owner dropped before work finished, releasing waiters");
            Error::Abandoned
        };
        self.retire();
        self.call.publish(Err(err));
    }
}

/// A caller attached to someone else's flight. Dropping it before the result
/// arrives counts as giving up.
struct Waiter<T, E> {
    call: Arc<Call<T, E>>,
    count_cancelled: bool,
    done: bool,
}

impl<T: Clone, E: Clone> Waiter<T, E> {
    fn wait(mut self) -> Outcome<T, E> {
        let result = self.call.wait();
        self.received(result)
    }

    fn wait_until(mut self, deadline: Instant) -> Outcome<T, E> {
        match self.call.wait_until(deadline) {
            Some(result) => self.received(result),
            None => self.cancelled(),
        }
    }

    async fn wait_async(mut self) -> Outcome<T, E> {
        let result = self.call.wait_async().await;
        self.received(result)
    }

    async fn wait_cancellable(mut self, token: &CancellationToken) -> Outcome<T, E> {
        let call = self.call.clone();
        tokio::select! {
            result = call.wait_async() => self.received(result),
            () = token.cancelled() => self.cancelled(),
        }
    }

    fn received(&mut self, result: Published<T, E>) -> Outcome<T, E> {
        self.done = true;
        trace!("work done noticed");
        Outcome {
            result,
            shared: true,
        }
    }

    fn cancelled(&self) -> Outcome<T, E> {
        trace!("gave up waiting");
        Outcome {
            result: Err(Error::Cancelled),
            shared: true,
        }
    }
}

impl<T, E> Drop for Waiter<T, E> {
    fn drop(&mut self) {
        if !self.done && !self.count_cancelled {
            self.call.leave();
        }
    }
}
