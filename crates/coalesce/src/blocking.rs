//! Blocking write coalescer.
//!
//! Every [`BlockingCoalescer::write`] call parks its caller until the bytes it
//! appended have gone out to the sink. Writers that land in the same
//! coalescing window share one sink write and return together.
//!
//! # Architecture
//!
//! ```text
//! writer ─┐                                   ┌─ wakes writers of cycle N
//! writer ─┼→ buffer (cycle N) → trigger → worker → sink.write(buffer)
//! writer ─┘                                   └─ installs cycle N+1
//! ```
//!
//! The worker holds a coalescing window of `timeout` after the first trigger
//! unless the buffer already holds `max_size` bytes, in which case it flushes
//! at once. The window also ends early when writers push the buffer past the
//! threshold while it is open.

use crate::buffer::{flush_into, FlushCounters, FlushStats, WriteBuffer};
use crate::completion::FlushCycle;
use crate::config::CoalescerConfig;
use crate::error::{CoalesceError, Result};
use crate::sink::Sink;
use crate::trigger::{self, FlushTrigger};
use crate::worker::{FlushWorker, Wake, WorkerSignals};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, trace, warn};

struct State {
    buffer: WriteBuffer,
    /// Cycle that will carry the bytes currently in `buffer`.
    cycle: Arc<FlushCycle>,
    closed: bool,
}

struct Shared<S> {
    state: Mutex<State>,
    sink: Mutex<S>,
    counters: FlushCounters,
    config: CoalescerConfig,
}

impl<S: Sink> Shared<S> {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }

    fn lock_sink(&self) -> MutexGuard<'_, S> {
        self.sink.lock().unwrap_or_else(|err| err.into_inner())
    }

    fn buffered(&self) -> usize {
        self.lock_state().buffer.len()
    }

    fn run(&self, signals: WorkerSignals) {
        let max_size = self.config.max_size;
        while signals.wait_trigger() {
            // A trigger left over from a flush that already took its bytes.
            // Nobody waits on the current cycle, so there is nothing to time.
            if self.buffered() == 0 {
                trace!("Skipping window for stale trigger");
                continue;
            }
            if self.buffered() < max_size {
                let wake = signals.hold_window(self.config.timeout, || self.buffered() >= max_size);
                trace!(?wake, "Coalescing window closed");
                if wake == Wake::Shutdown {
                    break;
                }
            }
            self.flush_cycle();
        }

        // Writers still parked on the current cycle are released here.
        self.flush_cycle();
    }

    /// Detaches the buffer with its cycle, writes it, and wakes the cycle's
    /// writers. The state lock is not held across the sink write.
    fn flush_cycle(&self) {
        let (data, cycle) = {
            let mut state = self.lock_state();
            let data = state.buffer.take();
            let cycle = std::mem::replace(&mut state.cycle, Arc::new(FlushCycle::new()));
            (data, cycle)
        };

        let outcome = {
            let mut sink = self.lock_sink();
            flush_into(&mut *sink, &data, &self.counters)
        };
        cycle.complete(outcome);
    }
}

/// Write coalescer whose writes return only after their bytes are flushed.
///
/// # Examples
/// ```rust
/// use alopex_coalesce::{BlockingCoalescer, IoSink};
/// use std::time::Duration;
///
/// let coalescer = BlockingCoalescer::with_params(
///     IoSink::new(Vec::new()),
///     Duration::from_millis(5),
///     1024,
/// )
/// .unwrap();
///
/// assert_eq!(coalescer.write(b"hello").unwrap(), 5);
/// coalescer.close().unwrap();
/// ```
pub struct BlockingCoalescer<S: Sink + 'static> {
    shared: Arc<Shared<S>>,
    trigger: FlushTrigger,
    worker: Mutex<FlushWorker>,
}

impl<S: Sink + 'static> BlockingCoalescer<S> {
    /// Creates a coalescer in front of `sink` and starts its flush worker.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the worker thread
    /// cannot be spawned.
    pub fn new(sink: S, config: CoalescerConfig) -> Result<Self> {
        config.validate()?;

        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                buffer: WriteBuffer::with_capacity(config.max_size),
                cycle: Arc::new(FlushCycle::new()),
                closed: false,
            }),
            sink: Mutex::new(sink),
            counters: FlushCounters::default(),
            config,
        });

        let (trigger, trigger_rx) = trigger::channel();
        let worker_shared = Arc::clone(&shared);
        let worker = FlushWorker::spawn("coalesce-blocking", trigger_rx, move |signals| {
            worker_shared.run(signals)
        })?;

        debug!(
            timeout_ms = config.timeout.as_millis() as u64,
            max_size = config.max_size,
            "Created blocking coalescer"
        );

        Ok(Self {
            shared,
            trigger,
            worker: Mutex::new(worker),
        })
    }

    /// Shorthand for [`BlockingCoalescer::new`] with explicit parameters.
    pub fn with_params(sink: S, timeout: Duration, max_size: usize) -> Result<Self> {
        Self::new(sink, CoalescerConfig::new(timeout, max_size))
    }

    /// Buffers `buf` and blocks until the flush carrying it completes.
    ///
    /// Returns `buf.len()` if that flush succeeded. If it failed, the error
    /// is returned to every writer whose bytes it carried, and those bytes
    /// are gone. An empty `buf` returns `Ok(0)` immediately.
    ///
    /// # Errors
    ///
    /// Returns [`CoalesceError::Closed`] after [`close`](Self::close), or the
    /// error of the failed flush.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        let cycle = {
            let mut state = self.shared.lock_state();
            if state.closed {
                return Err(CoalesceError::Closed);
            }
            if buf.is_empty() {
                return Ok(0);
            }
            state.buffer.append(buf);
            Arc::clone(&state.cycle)
        };

        self.trigger.notify();
        cycle.wait()?;
        Ok(buf.len())
    }

    /// Flushes residual bytes, stops the worker and closes the sink.
    ///
    /// Writers blocked at the time of the call are woken with the outcome of
    /// the final flush. Returns the result of [`Sink::close`].
    ///
    /// # Errors
    ///
    /// Returns [`CoalesceError::Closed`] if already closed, or the sink's
    /// close error.
    pub fn close(&self) -> Result<()> {
        {
            let mut state = self.shared.lock_state();
            if state.closed {
                return Err(CoalesceError::Closed);
            }
            state.closed = true;
        }

        self.worker
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .stop();

        let result = self.shared.lock_sink().close().map_err(CoalesceError::from);
        debug!(ok = result.is_ok(), "Closed blocking coalescer");
        result
    }

    /// Returns the coalescing window.
    pub fn timeout(&self) -> Duration {
        self.shared.config.timeout
    }

    /// Returns the flush threshold in bytes.
    pub fn max_size(&self) -> usize {
        self.shared.config.max_size
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CoalescerConfig {
        &self.shared.config
    }

    /// Returns the number of bytes buffered but not yet handed to the sink.
    pub fn pending_bytes(&self) -> usize {
        self.shared.buffered()
    }

    /// Returns a snapshot of the flush counters.
    pub fn stats(&self) -> FlushStats {
        self.shared.counters.snapshot()
    }
}

impl<S: Sink + 'static> Drop for BlockingCoalescer<S> {
    fn drop(&mut self) {
        match self.close() {
            Ok(()) | Err(CoalesceError::Closed) => {}
            Err(e) => warn!("Failed to close blocking coalescer on drop: {:?}", e),
        }
    }
}

impl<S: Sink + 'static> io::Write for &BlockingCoalescer<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        BlockingCoalescer::write(*self, buf).map_err(io::Error::from)
    }

    /// Acknowledged writes are already flushed.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<S: Sink + 'static> io::Write for BlockingCoalescer<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        BlockingCoalescer::write(&*self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
