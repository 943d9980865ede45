//! Conflux Convergence - Waiting on eventually-consistent resources
//!
//! Cloud resources become visible, attach, enable and disable asynchronously.
//! [`ConvergenceWaiter::wait`] polls a `describe` operation and hands every
//! observation to a caller-supplied classifier:
//!
//! - [`Classification::Retry`]: not there yet, poll again after a backoff
//! - [`Classification::Success`]: converged, return the value
//! - [`Classification::Fail`]: reached a state it will never leave, stop
//!
//! Backoff is exponential with jitter and capped; the whole wait is bounded by
//! a deadline, after which the wait returns [`ConvergenceTimeout`].
//!
//! ## Example
//!
//! ```ignore
//! let role = waiter
//!     .wait(
//!         "role cfx-acme-enricher-exec",
//!         || store.get_role(&name),
//!         |role| match role {
//!             Some(role) => Classification::Success(role),
//!             None => Classification::Retry,
//!         },
//!     )
//!     .await?;
//! ```
//!
//! A waiter holds only its configuration. Each call keeps its own backoff
//! state on its own stack, so any number of waits on independent resources
//! can run concurrently and none of them holds a lock while sleeping.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

mod config;
mod error;
mod waiter;

pub use config::WaiterConfig;
pub use error::{ConvergenceTimeout, InvalidWaiterConfig, WaitError};
pub use waiter::{Classification, ConvergenceWaiter};
