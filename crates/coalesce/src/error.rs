//! Error and Result types for coalescer operations.

use std::io;
use std::sync::Arc;
use thiserror::Error;

/// A convenience `Result` type for coalescer operations.
pub type Result<T> = std::result::Result<T, CoalesceError>;

/// The error type for coalescer operations.
///
/// Cloneable so that one failed flush can be handed to every caller whose
/// bytes were part of it.
#[derive(Debug, Clone, Error)]
pub enum CoalesceError {
    /// The sink accepted fewer bytes than were buffered.
    ///
    /// The buffer is cleared regardless; the unwritten tail is lost.
    #[error("Short write: sink accepted {written} of {expected} bytes")]
    ShortWrite {
        /// Bytes the sink reported as written.
        written: usize,
        /// Bytes handed to the sink.
        expected: usize,
    },

    /// Error returned by the sink's write or close operation.
    #[error("Sink error: {0}")]
    Sink(#[source] Arc<io::Error>),

    /// The sink panicked inside a write call.
    ///
    /// The flush is failed like any other and the coalescer keeps running.
    #[error("Sink panicked during flush")]
    SinkPanicked,

    /// The coalescer has been closed.
    #[error("Coalescer is closed")]
    Closed,

    /// Configuration rejected at construction.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The background flush thread could not be started.
    #[error("Failed to spawn flush worker: {0}")]
    Spawn(#[source] Arc<io::Error>),
}

impl From<io::Error> for CoalesceError {
    fn from(err: io::Error) -> Self {
        CoalesceError::Sink(Arc::new(err))
    }
}

impl From<CoalesceError> for io::Error {
    fn from(err: CoalesceError) -> Self {
        match err {
            CoalesceError::Sink(inner) | CoalesceError::Spawn(inner) => {
                match Arc::try_unwrap(inner) {
                    Ok(inner) => inner,
                    Err(shared) => io::Error::new(shared.kind(), shared.to_string()),
                }
            }
            other => {
                let kind = match &other {
                    CoalesceError::ShortWrite { .. } => io::ErrorKind::WriteZero,
                    CoalesceError::Closed => io::ErrorKind::BrokenPipe,
                    CoalesceError::SinkPanicked => io::ErrorKind::Other,
                    _ => io::ErrorKind::InvalidInput,
                };
                io::Error::new(kind, other)
            }
        }
    }
}
