use core::future::Future;
use core::pin::Pin;
use core::task::{ready, Context, Poll};
use tokio::task::JoinHandle;

use crate::error::Error;
use crate::types::Outcome;

/// Handle to a flight started with [`Group::spawn_work`](crate::Group::spawn_work).
///
/// Awaiting it yields the flight's outcome. Dropping it only stops this
/// caller from listening: the spawned task keeps running the work, and every
/// other caller attached to the flight still gets the result.
#[derive(Debug)]
pub struct Flight<T, E> {
    handle: JoinHandle<Outcome<T, E>>,
}

impl<T, E> Flight<T, E> {
    pub(crate) fn new(handle: JoinHandle<Outcome<T, E>>) -> Self {
        Flight { handle }
    }

    /// Whether the spawned task has finished.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl<T, E> Future for Flight<T, E> {
    type Output = Outcome<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let outcome = match ready!(Pin::new(&mut self.handle).poll(cx)) {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => Outcome {
                result: Err(Error::Panicked),
                shared: false,
            },
            Err(_) => Outcome {
                result: Err(Error::Abandoned),
                shared: false,
            },
        };
        Poll::Ready(outcome)
    }
}
