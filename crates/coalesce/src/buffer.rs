//! Shared write buffer and flush bookkeeping.
//!
//! Both coalescer variants accumulate bytes in a [`WriteBuffer`] and hand the
//! whole buffer to the sink through [`flush_into`], which performs exactly one
//! [`Sink::write`] call and classifies its outcome.

use crate::error::{CoalesceError, Result};
use crate::sink::Sink;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error};

/// Append-only byte accumulator, drained as a whole by each flush.
#[derive(Debug, Default)]
pub(crate) struct WriteBuffer {
    data: Vec<u8>,
}

impl WriteBuffer {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn append(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn clear(&mut self) {
        self.data.clear();
    }

    /// Detaches the buffered bytes, leaving an empty buffer with the same
    /// capacity hint behind.
    pub(crate) fn take(&mut self) -> Vec<u8> {
        let capacity = self.data.capacity();
        std::mem::replace(&mut self.data, Vec::with_capacity(capacity))
    }
}

/// Point-in-time view of a coalescer's flush counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Number of sink write calls issued.
    pub flushes: u64,
    /// Bytes the sink accepted across all flushes.
    pub bytes_flushed: u64,
    /// Flushes that ended in an error, short writes included.
    pub failed_flushes: u64,
    /// Flushes where the sink accepted fewer bytes than requested.
    pub short_writes: u64,
}

#[derive(Debug, Default)]
pub(crate) struct FlushCounters {
    flushes: AtomicU64,
    bytes_flushed: AtomicU64,
    failed_flushes: AtomicU64,
    short_writes: AtomicU64,
}

impl FlushCounters {
    pub(crate) fn snapshot(&self) -> FlushStats {
        FlushStats {
            flushes: self.flushes.load(Ordering::Relaxed),
            bytes_flushed: self.bytes_flushed.load(Ordering::Relaxed),
            failed_flushes: self.failed_flushes.load(Ordering::Relaxed),
            short_writes: self.short_writes.load(Ordering::Relaxed),
        }
    }

    fn record(&self, accepted: usize, outcome: &Result<()>) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.bytes_flushed.fetch_add(accepted as u64, Ordering::Relaxed);
        match outcome {
            Ok(()) => {}
            Err(CoalesceError::ShortWrite { .. }) => {
                self.short_writes.fetch_add(1, Ordering::Relaxed);
                self.failed_flushes.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.failed_flushes.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Writes `data` to `sink` in a single call.
///
/// Empty input is a no-op and does not touch the sink. A panic inside
/// [`Sink::write`] is caught and reported as [`CoalesceError::SinkPanicked`],
/// so the flush still completes for everyone waiting on it.
pub(crate) fn flush_into<S: Sink + ?Sized>(
    sink: &mut S,
    data: &[u8],
    counters: &FlushCounters,
) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }

    let expected = data.len();
    let written = panic::catch_unwind(AssertUnwindSafe(|| sink.write(data)));
    let (accepted, outcome) = match written {
        Ok(Ok(written)) if written >= expected => (expected, Ok(())),
        Ok(Ok(written)) => (
            written,
            Err(CoalesceError::ShortWrite { written, expected }),
        ),
        Ok(Err(err)) => (0, Err(CoalesceError::from(err))),
        Err(_) => {
            error!(bytes = expected, "Sink panicked during flush");
            (0, Err(CoalesceError::SinkPanicked))
        }
    };
    counters.record(accepted, &outcome);

    match &outcome {
        Ok(()) => debug!(bytes = expected, "Flushed coalesced buffer"),
        Err(err) => debug!(bytes = expected, error = %err, "Coalesced flush failed"),
    }

    outcome
}
