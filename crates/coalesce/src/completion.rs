//! Flush completion signalling.
//!
//! [`FlushCycle`] wakes the writers whose bytes went out in one flush of the
//! blocking coalescer. A fresh cycle is installed every time the worker
//! detaches the buffer, so each waiter reads the outcome of its own flush
//! even if later cycles complete before it is scheduled.
//!
//! [`ErrorSlot`] parks asynchronous flush failures of the deferred coalescer
//! until a caller observes them.

use crate::error::{CoalesceError, Result};
use std::sync::{Condvar, Mutex};
use tracing::warn;

/// One flush of the blocking coalescer, as seen by its waiters.
#[derive(Debug, Default)]
pub(crate) struct FlushCycle {
    outcome: Mutex<Option<Result<()>>>,
    done: Condvar,
}

impl FlushCycle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Publishes the flush outcome and wakes every waiter.
    pub(crate) fn complete(&self, outcome: Result<()>) {
        let mut slot = self.outcome.lock().unwrap_or_else(|err| err.into_inner());
        *slot = Some(outcome);
        drop(slot);
        self.done.notify_all();
    }

    /// Blocks until the cycle completes and returns its outcome.
    pub(crate) fn wait(&self) -> Result<()> {
        let slot = self.outcome.lock().unwrap_or_else(|err| err.into_inner());
        let slot = self
            .done
            .wait_while(slot, |outcome| outcome.is_none())
            .unwrap_or_else(|err| err.into_inner());
        (*slot).clone().unwrap_or(Ok(()))
    }
}

/// Holds at most one unobserved flush error.
///
/// A newer error replaces an older one that nobody has taken yet.
#[derive(Debug, Default)]
pub(crate) struct ErrorSlot {
    slot: Mutex<Option<CoalesceError>>,
}

impl ErrorSlot {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Parks `err`, replacing any error still waiting to be observed.
    pub(crate) fn put(&self, err: CoalesceError) {
        let mut slot = self.slot.lock().unwrap_or_else(|err| err.into_inner());
        if let Some(previous) = slot.replace(err) {
            warn!(error = %previous, "Dropping unobserved flush error in favour of a newer one");
        }
    }

    /// Takes the parked error, if any.
    pub(crate) fn take(&self) -> Option<CoalesceError> {
        self.slot
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .take()
    }
}
