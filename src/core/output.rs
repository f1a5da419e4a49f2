//! Output (sink) contract consumed by appenders

use super::encoder::{BufferHints, ContentType};
use super::error::Result;
use super::event::Event;
use serde::Serialize;

/// Result of asking an output to reopen its underlying resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStatus {
    /// The resource was reopened (e.g. a rotated file was recreated)
    Reopened,
    /// The output has nothing to reopen
    Ignored,
    /// The output is closed and cannot be reopened
    Closed,
}

/// Destination for encoded events.
///
/// Outputs are driven by exactly one appender, which guarantees that at most
/// one thread is inside `write`/`flush`/`close` at any instant.
pub trait Output: Send {
    /// Write one encoded event
    fn write(&mut self, event: &Event, payload: &[u8], content_type: ContentType) -> Result<()>;

    fn flush(&mut self) -> Result<()>;

    fn close(&mut self) -> Result<()>;

    /// Reopen the underlying resource, used to signal log rotation
    fn reopen(&mut self) -> Result<OutputStatus> {
        Ok(OutputStatus::Ignored)
    }

    /// Representation this output prefers, so encoders avoid conversions
    fn buffer_hints(&self) -> BufferHints {
        BufferHints::default()
    }

    fn name(&self) -> &str;
}

impl<O: Output + ?Sized> Output for Box<O> {
    fn write(&mut self, event: &Event, payload: &[u8], content_type: ContentType) -> Result<()> {
        (**self).write(event, payload, content_type)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn reopen(&mut self) -> Result<OutputStatus> {
        (**self).reopen()
    }

    fn buffer_hints(&self) -> BufferHints {
        (**self).buffer_hints()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
