//! Encoder contract and the reusable scratch buffer it writes into

use super::error::Result;
use super::event::Event;
use super::output::Output;
use serde::Serialize;
use std::fmt;
use std::io;

/// Physical representation an output prefers to receive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum BufferKind {
    /// UTF-8 text, e.g. terminals and line-oriented files
    #[default]
    Text,
    /// Opaque bytes, e.g. binary or network framing
    Bytes,
}

/// Sizing and representation hints an output gives to encoders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BufferHints {
    pub kind: BufferKind,
    /// Initial capacity of a freshly acquired buffer
    pub capacity: usize,
}

impl BufferHints {
    pub const DEFAULT_CAPACITY: usize = 512;

    pub fn text() -> Self {
        Self {
            kind: BufferKind::Text,
            capacity: Self::DEFAULT_CAPACITY,
        }
    }

    pub fn bytes() -> Self {
        Self {
            kind: BufferKind::Bytes,
            capacity: Self::DEFAULT_CAPACITY,
        }
    }

    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

impl Default for BufferHints {
    fn default() -> Self {
        Self::text()
    }
}

/// MIME type of an encoded payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ContentType(&'static str);

impl ContentType {
    pub const TEXT: ContentType = ContentType("text/plain; charset=utf-8");
    pub const JSON: ContentType = ContentType("application/json");
    pub const OCTET_STREAM: ContentType = ContentType("application/octet-stream");

    pub const fn new(mime: &'static str) -> Self {
        ContentType(mime)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Reusable scratch space for one in-flight encode.
///
/// A buffer has exactly one owner at a time; `&mut` access enforces that it
/// is never encoded into from two threads at once. Clearing keeps the
/// allocation, so a buffer kept by an appender stops allocating once it has
/// grown to the largest event it has seen.
#[derive(Debug)]
pub struct Buffer {
    data: Vec<u8>,
    kind: BufferKind,
    content_type: ContentType,
}

impl Buffer {
    pub fn new(hints: BufferHints, content_type: ContentType) -> Self {
        Self {
            data: Vec::with_capacity(hints.capacity),
            kind: hints.kind,
            content_type,
        }
    }

    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Contents as text, if they are valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    pub fn push_str(&mut self, s: &str) {
        self.data.extend_from_slice(s.as_bytes());
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Reset the position, keeping the allocation
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Hand the contents to `output` and reset the buffer.
    ///
    /// The buffer is cleared whether or not the write succeeds.
    pub fn drain(&mut self, output: &mut dyn Output, event: &Event) -> Result<()> {
        let result = output.write(event, &self.data, self.content_type);
        self.data.clear();
        result
    }
}

impl fmt::Write for Buffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push_str(s);
        Ok(())
    }
}

impl io::Write for Buffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Stateless event encoder
pub trait Encoder: Send {
    /// Acquire a buffer suited to the output's hints
    fn buffer(&self, hints: BufferHints) -> Buffer {
        Buffer::new(hints, self.content_type())
    }

    /// Write `event` into `buffer`; must not touch any output
    fn encode(&self, event: &Event, buffer: &mut Buffer) -> Result<()>;

    fn content_type(&self) -> ContentType;

    fn name(&self) -> &str;
}

impl<E: Encoder + ?Sized> Encoder for Box<E> {
    fn buffer(&self, hints: BufferHints) -> Buffer {
        (**self).buffer(hints)
    }

    fn encode(&self, event: &Event, buffer: &mut Buffer) -> Result<()> {
        (**self).encode(event, buffer)
    }

    fn content_type(&self) -> ContentType {
        (**self).content_type()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
