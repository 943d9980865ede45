//! Call counting and failure injection

use crate::error::{Result, RuntimeError};
use dashmap::DashMap;
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Per-operation call counters and injected failures
///
/// Operations are keyed by their trait method name, e.g. `"create_role"`.
#[derive(Debug, Default)]
pub struct OperationHooks {
    calls: DashMap<&'static str, u64>,
    once: DashMap<&'static str, VecDeque<RuntimeError>>,
    always: DashMap<&'static str, RuntimeError>,
}

impl OperationHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next call of `op`; queued failures are used in order
    pub fn fail_next(&self, op: &'static str, error: RuntimeError) {
        self.once.entry(op).or_default().push_back(error);
    }

    /// Fail every call of `op` until cleared
    pub fn fail_always(&self, op: &'static str, error: RuntimeError) {
        self.always.insert(op, error);
    }

    pub fn clear(&self, op: &str) {
        self.once.remove(op);
        self.always.remove(op);
    }

    /// Number of calls of `op`, failed ones included
    pub fn calls(&self, op: &str) -> u64 {
        self.calls.get(op).map(|count| *count).unwrap_or(0)
    }

    pub(crate) fn enter(&self, op: &'static str) -> Result<()> {
        let calls = {
            let mut count = self.calls.entry(op).or_insert(0);
            *count += 1;
            *count
        };
        trace!(op, calls, "Simulated call");

        let injected = match self.always.get(op) {
            Some(error) => Some(error.clone()),
            None => self.once.get_mut(op).and_then(|mut queue| queue.pop_front()),
        };
        match injected {
            Some(error) => {
                debug!(op, error = %error, "Injected failure");
                Err(error)
            }
            None => Ok(()),
        }
    }
}
