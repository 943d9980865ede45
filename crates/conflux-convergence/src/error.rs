//! Wait errors

use std::time::Duration;
use thiserror::Error;

/// A resource did not reach the expected state before the deadline
///
/// Retryable: every step that waits is safe to repeat.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{resource} did not converge within {waited:?} after {attempts} polls (last observed: {last_observed})")]
pub struct ConvergenceTimeout {
    pub resource: String,
    pub waited: Duration,
    pub attempts: u32,
    pub last_observed: String,
}

/// Waiter settings that cannot drive a backoff loop
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid waiter config: {0}")]
pub struct InvalidWaiterConfig(pub String);

/// Outcome of a wait that did not succeed
#[derive(Debug, Error)]
pub enum WaitError<E> {
    /// Deadline expired while the classifier still asked to retry
    #[error(transparent)]
    Timeout(ConvergenceTimeout),

    /// The classifier saw a state the resource will not leave
    #[error("convergence failed: {0}")]
    Failed(E),

    /// The describe call itself failed; not retried
    #[error("describe failed: {0}")]
    Describe(E),
}

impl<E> WaitError<E> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
