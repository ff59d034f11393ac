//! Single-slot flush trigger.
//!
//! Writers signal the flush worker through a channel of capacity one. A
//! signal sent while another is still pending is dropped, so any number of
//! writes landing before the worker wakes up collapse into one wakeup.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::trace;

/// Sending half of the flush trigger, owned by the coalescer facade.
#[derive(Debug)]
pub(crate) struct FlushTrigger {
    tx: Sender<()>,
}

/// Creates a trigger and the receiver handed to the flush worker.
pub(crate) fn channel() -> (FlushTrigger, Receiver<()>) {
    let (tx, rx) = bounded(1);
    (FlushTrigger { tx }, rx)
}

impl FlushTrigger {
    /// Signals the worker without blocking.
    ///
    /// Returns `true` if this call queued a new wakeup, `false` if one was
    /// already pending or the worker is gone.
    pub(crate) fn notify(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => {
                trace!("Flush already pending, coalescing signal");
                false
            }
            Err(TrySendError::Disconnected(())) => false,
        }
    }
}
