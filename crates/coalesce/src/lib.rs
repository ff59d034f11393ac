//! Alopex Coalesce - write coalescing for byte sinks
//!
//! This crate merges bursts of small writes into fewer, larger writes on an
//! underlying [`Sink`], trading a bounded amount of latency for fewer I/O
//! calls (network packets, syscalls, metered requests).
//!
//! # Components
//!
//! - [`BlockingCoalescer`]: writes block until their bytes are flushed;
//!   concurrent writers in one window return together
//! - [`DeferredCoalescer`]: writes return once buffered; flush errors surface
//!   on a later write or on close
//! - [`Sink`] / [`IoSink`]: the flush destination
//! - [`CoalescerConfig`]: coalescing window and size threshold
//!
//! # Flushing
//!
//! A flush always drains the entire buffer in one [`Sink::write`] call. It
//! happens `timeout` after the first pending write, or sooner once the
//! buffer holds `max_size` bytes. Failed flushes are never retried.
//!
//! # Example
//!
//! ```rust
//! use alopex_coalesce::{BlockingCoalescer, CoalescerConfig, IoSink};
//! use std::sync::Arc;
//! use std::thread;
//! use std::time::Duration;
//!
//! let config = CoalescerConfig::new(Duration::from_millis(20), 4096);
//! let coalescer = Arc::new(BlockingCoalescer::new(IoSink::new(Vec::new()), config)?);
//!
//! let writers: Vec<_> = (0..4)
//!     .map(|i| {
//!         let coalescer = Arc::clone(&coalescer);
//!         thread::spawn(move || coalescer.write(format!("msg{i};").as_bytes()))
//!     })
//!     .collect();
//!
//! for writer in writers {
//!     writer.join().unwrap()?;
//! }
//! coalescer.close()?;
//! # Ok::<(), alopex_coalesce::CoalesceError>(())
//! ```

#![deny(missing_docs)]

pub mod blocking;
mod buffer;
mod completion;
pub mod config;
pub mod deferred;
pub mod error;
pub mod sink;
mod trigger;
mod worker;

pub use blocking::BlockingCoalescer;
pub use buffer::FlushStats;
pub use config::{CoalescerConfig, DEFAULT_MAX_SIZE, DEFAULT_TIMEOUT};
pub use deferred::DeferredCoalescer;
pub use error::{CoalesceError, Result};
pub use sink::{IoSink, Sink};
