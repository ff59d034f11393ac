//! The byte sink a coalescer flushes into.

use std::io::{self, Write};

/// Destination for flushed bytes.
///
/// A flush hands the whole buffer to a single [`Sink::write`] call. Returning
/// fewer bytes than requested is reported to callers as a short write; the
/// coalescer never retries the remainder.
pub trait Sink: Send {
    /// Writes `buf`, returning how many bytes were accepted.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Releases the sink. Called once, after the final flush.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).write(buf)
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// Adapts any [`std::io::Write`] into a [`Sink`].
///
/// Closing the sink flushes the writer.
///
/// # Examples
/// ```rust
/// use alopex_coalesce::{IoSink, Sink};
///
/// let mut sink = IoSink::new(Vec::new());
/// sink.write(b"abc").unwrap();
/// sink.close().unwrap();
/// assert_eq!(sink.into_inner(), b"abc");
/// ```
#[derive(Debug)]
pub struct IoSink<W> {
    inner: W,
}

impl<W> IoSink<W> {
    /// Wraps a writer.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Returns a reference to the wrapped writer.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Unwraps the sink, returning the writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write + Send> Sink for IoSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn close(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
