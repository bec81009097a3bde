//! Bounded output guard
//!
//! [`BoundedWriter`] wraps a sink and fails fast once a fixed budget is
//! exhausted, so rendering a huge value cannot consume unbounded memory.
//!
//! ## Policy
//!
//! - A write that would take the total past the limit is rejected whole:
//!   nothing from that call reaches the sink.
//! - Otherwise the counter grows and the data is forwarded unchanged.
//! - `flush` and `close` are forwarded and never counted.
//!
//! Character sinks (`fmt::Write`, e.g. `String`) are budgeted in chars.
//! Byte sinks (`io::Write`, e.g. `Vec<u8>`) are budgeted in bytes. A
//! rejected byte write surfaces as an `io::Error` wrapping the
//! `BoundExceeded` error; [`sink_error`] unwraps it again.

use std::fmt;
use std::io;
use tempo_core::{Result, ScriptError};

/// Counting pass-through around a sink
#[derive(Debug)]
pub struct BoundedWriter<W> {
    inner: W,
    limit: usize,
    written: usize,
}

impl<W> BoundedWriter<W> {
    pub fn new(inner: W, limit: usize) -> Self {
        Self {
            inner,
            limit,
            written: 0,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn remaining(&self) -> usize {
        self.limit - self.written
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    fn reserve(&mut self, requested: usize) -> Result<()> {
        if requested > self.limit - self.written {
            return Err(ScriptError::bound_exceeded(self.limit));
        }
        self.written += requested;
        Ok(())
    }
}

impl<W: fmt::Write> BoundedWriter<W> {
    /// Append text, reporting the bound violation directly
    pub fn append(&mut self, s: &str) -> Result<()> {
        self.reserve(s.chars().count())?;
        self.inner
            .write_str(s)
            .map_err(|_| ScriptError::Io(io::Error::other("formatter error")))
    }
}

impl<W: fmt::Write> fmt::Write for BoundedWriter<W> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.append(s).map_err(|_| fmt::Error)
    }
}

impl<W: io::Write> BoundedWriter<W> {
    /// Flush and release the underlying sink
    pub fn close(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: io::Write> io::Write for BoundedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.reserve(buf.len()).map_err(io::Error::other)?;
        self.inner.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Convert an error from a byte sink back into a [`ScriptError`]
///
/// A bound violation raised by a [`BoundedWriter`] comes back as
/// `BoundExceeded`, anything else as `Io`.
pub fn sink_error(err: io::Error) -> ScriptError {
    let limit = err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<ScriptError>())
        .and_then(|inner| match inner {
            ScriptError::BoundExceeded { limit, .. } => Some(*limit),
            _ => None,
        });
    match limit {
        Some(limit) => ScriptError::bound_exceeded(limit),
        None => ScriptError::Io(err),
    }
}
