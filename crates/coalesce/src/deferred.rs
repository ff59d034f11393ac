//! Non-blocking write coalescer with deferred error reporting.
//!
//! [`DeferredCoalescer::write`] returns as soon as the payload is buffered.
//! The flush worker writes the buffer out `timeout` after the first pending
//! write; a failure of that background flush is parked and returned by the
//! next `write`, `flush` or `close` call instead.
//!
//! A write that brings the buffer to `max_size` bytes flushes inline on the
//! calling thread and reports that flush's outcome directly.

use crate::buffer::{flush_into, FlushCounters, FlushStats, WriteBuffer};
use crate::completion::ErrorSlot;
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
    closed: bool,
}

struct Shared<S> {
    state: Mutex<State>,
    sink: Mutex<S>,
    errors: ErrorSlot,
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

    /// Flushes the buffer while the caller holds the state lock.
    ///
    /// Lock order is always state, then sink.
    fn flush_locked(&self, state: &mut State) -> Result<()> {
        if state.buffer.is_empty() {
            return Ok(());
        }
        let outcome = {
            let mut sink = self.lock_sink();
            flush_into(&mut *sink, state.buffer.as_slice(), &self.counters)
        };
        state.buffer.clear();
        outcome
    }

    fn run(&self, signals: WorkerSignals) {
        while signals.wait_trigger() {
            if signals.hold_window(self.config.timeout, || false) == Wake::Shutdown {
                break;
            }

            let outcome = {
                let mut state = self.lock_state();
                self.flush_locked(&mut state)
            };
            if let Err(err) = outcome {
                trace!(error = %err, "Parking background flush error");
                self.errors.put(err);
            }
        }
    }
}

/// Write coalescer whose writes return as soon as they are buffered.
///
/// # Examples
/// ```rust
/// use alopex_coalesce::{DeferredCoalescer, IoSink};
/// use std::time::Duration;
///
/// let coalescer = DeferredCoalescer::with_params(
///     IoSink::new(Vec::new()),
///     Duration::from_millis(5),
///     1024,
/// )
/// .unwrap();
///
/// coalescer.write(b"hello").unwrap();
/// // Residual bytes are flushed and any parked error reported here.
/// coalescer.close().unwrap();
/// ```
pub struct DeferredCoalescer<S: Sink + 'static> {
    shared: Arc<Shared<S>>,
    trigger: FlushTrigger,
    worker: Mutex<FlushWorker>,
}

impl<S: Sink + 'static> DeferredCoalescer<S> {
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
                closed: false,
            }),
            sink: Mutex::new(sink),
            errors: ErrorSlot::new(),
            counters: FlushCounters::default(),
            config,
        });

        let (trigger, trigger_rx) = trigger::channel();
        let worker_shared = Arc::clone(&shared);
        let worker = FlushWorker::spawn("coalesce-deferred", trigger_rx, move |signals| {
            worker_shared.run(signals)
        })?;

        debug!(
            timeout_ms = config.timeout.as_millis() as u64,
            max_size = config.max_size,
            "Created deferred coalescer"
        );

        Ok(Self {
            shared,
            trigger,
            worker: Mutex::new(worker),
        })
    }

    /// Shorthand for [`DeferredCoalescer::new`] with explicit parameters.
    pub fn with_params(sink: S, timeout: Duration, max_size: usize) -> Result<Self> {
        Self::new(sink, CoalescerConfig::new(timeout, max_size))
    }

    /// Buffers `buf` and returns without waiting for the sink.
    ///
    /// # Errors
    ///
    /// Returns a parked background flush error without buffering `buf`, the
    /// error of the inline flush if this write reached `max_size`, or
    /// [`CoalesceError::Closed`] after [`close`](Self::close).
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        if let Some(err) = self.shared.errors.take() {
            return Err(err);
        }

        let mut state = self.shared.lock_state();
        if state.closed {
            return Err(CoalesceError::Closed);
        }
        if buf.is_empty() {
            return Ok(0);
        }
        state.buffer.append(buf);

        if state.buffer.len() >= self.shared.config.max_size {
            trace!(
                buffered = state.buffer.len(),
                "Buffer reached threshold, flushing inline"
            );
            self.shared.flush_locked(&mut state)?;
        } else {
            drop(state);
            self.trigger.notify();
        }

        Ok(buf.len())
    }

    /// Flushes the buffer now, on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns a parked background flush error if one is waiting,
    /// [`CoalesceError::Closed`] after [`close`](Self::close), otherwise the
    /// outcome of this flush.
    pub fn flush(&self) -> Result<()> {
        if let Some(err) = self.shared.errors.take() {
            return Err(err);
        }
        let mut state = self.shared.lock_state();
        if state.closed {
            return Err(CoalesceError::Closed);
        }
        self.shared.flush_locked(&mut state)
    }

    /// Stops the worker, flushes residual bytes and closes the sink.
    ///
    /// All three steps always run. The first error among a parked background
    /// error, the final flush and [`Sink::close`] is returned.
    ///
    /// # Errors
    ///
    /// Returns [`CoalesceError::Closed`] if already closed, otherwise the
    /// first error encountered as described above.
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

        let parked = self.shared.errors.take();
        let flushed = {
            let mut state = self.shared.lock_state();
            self.shared.flush_locked(&mut state)
        };
        let sink_closed = self.shared.lock_sink().close().map_err(CoalesceError::from);

        let result = match (parked, flushed) {
            (Some(err), flushed) => {
                if let Err(e) = flushed {
                    warn!(error = %e, "Final flush failed behind a parked error, residual bytes lost");
                }
                if let Err(e) = &sink_closed {
                    warn!(error = %e, "Sink close failed behind a parked error");
                }
                Err(err)
            }
            (None, Err(err)) => {
                if let Err(e) = &sink_closed {
                    warn!(error = %e, "Sink close failed behind a final flush error");
                }
                Err(err)
            }
            (None, Ok(())) => sink_closed,
        };
        debug!(ok = result.is_ok(), "Closed deferred coalescer");
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
        self.shared.lock_state().buffer.len()
    }

    /// Returns a snapshot of the flush counters.
    pub fn stats(&self) -> FlushStats {
        self.shared.counters.snapshot()
    }
}

impl<S: Sink + 'static> Drop for DeferredCoalescer<S> {
    fn drop(&mut self) {
        match self.close() {
            Ok(()) | Err(CoalesceError::Closed) => {}
            Err(e) => warn!("Failed to close deferred coalescer on drop: {:?}", e),
        }
    }
}

impl<S: Sink + 'static> io::Write for &DeferredCoalescer<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        DeferredCoalescer::write(*self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        DeferredCoalescer::flush(*self).map_err(io::Error::from)
    }
}

impl<S: Sink + 'static> io::Write for DeferredCoalescer<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        DeferredCoalescer::write(&*self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        DeferredCoalescer::flush(&*self).map_err(io::Error::from)
    }
}
