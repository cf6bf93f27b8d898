//! Duplicate call suppression.
//!
//! A [`Group`] runs at most one call per key at a time. Callers that arrive
//! while a call for their key is in flight wait for it and receive a copy of
//! its result, value or error, instead of running the work again. Once the
//! result is handed out the key is forgotten, so the next caller starts over.
//!
//! ```
//! use singleflight::Group;
//!
//! let group: Group<&str, u32, String> = Group::new();
//! let outcome = group.work("answer", || Ok(42));
//! assert_eq!(outcome.result, Ok(42));
//! assert!(!outcome.shared);
//! ```
//!
//! Blocking callers use [`Group::work`] and [`Group::work_timeout`]; async
//! callers use [`Group::async_work`], [`Group::async_work_cancellable`] and
//! [`Group::spawn_work`]. Both kinds can share flights in the same group.

mod call;
mod error;
mod flight;
mod group;
mod types;

pub use error::{Error, SharedError};
pub use flight::Flight;
pub use group::Group;
pub use types::{Options, Outcome};
