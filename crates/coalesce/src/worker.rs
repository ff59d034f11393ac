//! Background flush thread and its shutdown handshake.

use crate::error::{CoalesceError, Result};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// How a coalescing window ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wake {
    /// The full timeout elapsed.
    Elapsed,
    /// The caller-supplied readiness check passed before the timeout.
    Ready,
    /// Shutdown was requested.
    Shutdown,
}

/// Channels the worker thread listens on.
pub(crate) struct WorkerSignals {
    trigger: Receiver<()>,
    shutdown: Receiver<()>,
}

impl WorkerSignals {
    /// Blocks until a flush is requested.
    ///
    /// Returns `false` once shutdown has been requested.
    pub(crate) fn wait_trigger(&self) -> bool {
        select! {
            recv(self.trigger) -> msg => msg.is_ok(),
            recv(self.shutdown) -> _ => false,
        }
    }

    /// Holds the coalescing window open for up to `timeout`.
    ///
    /// Triggers arriving during the window are absorbed; `ready` is checked
    /// after each one so the window can end early.
    pub(crate) fn hold_window(&self, timeout: Duration, mut ready: impl FnMut() -> bool) -> Wake {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            if ready() {
                return Wake::Ready;
            }
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => timeout,
            };
            if remaining.is_zero() {
                return Wake::Elapsed;
            }
            select! {
                recv(self.shutdown) -> _ => return Wake::Shutdown,
                recv(self.trigger) -> msg => {
                    if msg.is_err() {
                        return Wake::Shutdown;
                    }
                }
                default(remaining) => return Wake::Elapsed,
            }
        }
    }
}

/// Handle to a running flush thread.
///
/// Dropping the shutdown sender disconnects the worker's shutdown channel,
/// which every wait in [`WorkerSignals`] observes.
#[derive(Debug)]
pub(crate) struct FlushWorker {
    name: String,
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl FlushWorker {
    /// Spawns a named thread running `body`.
    pub(crate) fn spawn<F>(name: &str, trigger: Receiver<()>, body: F) -> Result<Self>
    where
        F: FnOnce(WorkerSignals) + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = bounded(0);
        let signals = WorkerSignals {
            trigger,
            shutdown: shutdown_rx,
        };

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(signals))
            .map_err(|err| CoalesceError::Spawn(Arc::new(err)))?;

        debug!(worker = name, "Spawned flush worker");
        Ok(Self {
            name: name.to_string(),
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Requests shutdown and waits for the thread to exit.
    ///
    /// Calling this more than once is a no-op.
    pub(crate) fn stop(&mut self) {
        drop(self.shutdown.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!(worker = %self.name, "Flush worker panicked");
            } else {
                debug!(worker = %self.name, "Flush worker stopped");
            }
        }
    }
}
