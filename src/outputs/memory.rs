//! In-memory output capturing every payload
//!
//! Useful for tests and for embedding the pipeline where log lines are
//! inspected programmatically.

use crate::core::{BufferHints, ContentType, Event, Output, OutputStatus, PipelineError, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

type FailurePredicate = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

#[derive(Debug, Default)]
struct MemoryState {
    bytes: Vec<u8>,
    writes: usize,
    flushes: usize,
    closes: usize,
    reopens: usize,
    closed: bool,
}

/// Output that appends payloads to a shared in-memory buffer
pub struct MemoryOutput {
    state: Arc<Mutex<MemoryState>>,
    fail_when: Option<FailurePredicate>,
    write_delay: Option<Duration>,
    hints: BufferHints,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            fail_when: None,
            write_delay: None,
            hints: BufferHints::text(),
        }
    }

    /// Handle for reading what has been written
    pub fn handle(&self) -> MemoryHandle {
        MemoryHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Fail writes of events matching `predicate`
    #[must_use]
    pub fn fail_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        self.fail_when = Some(Arc::new(predicate));
        self
    }

    /// Sleep before every write, simulating a slow sink
    #[must_use]
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    #[must_use]
    pub fn with_hints(mut self, hints: BufferHints) -> Self {
        self.hints = hints;
        self
    }
}

impl Default for MemoryOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl Output for MemoryOutput {
    fn write(&mut self, event: &Event, payload: &[u8], _content_type: ContentType) -> Result<()> {
        if let Some(delay) = self.write_delay {
            std::thread::sleep(delay);
        }
        if let Some(ref predicate) = self.fail_when {
            if predicate(event) {
                return Err(PipelineError::other(format!(
                    "memory output rejected '{}'",
                    event.message()
                )));
            }
        }

        let mut state = self.state.lock();
        if state.closed {
            return Err(PipelineError::other("memory output is closed"));
        }
        state.bytes.extend_from_slice(payload);
        state.writes += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.state.lock().flushes += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.closed = true;
        state.closes += 1;
        Ok(())
    }

    fn reopen(&mut self) -> Result<OutputStatus> {
        let mut state = self.state.lock();
        if state.closed {
            return Ok(OutputStatus::Closed);
        }
        state.reopens += 1;
        Ok(OutputStatus::Reopened)
    }

    fn buffer_hints(&self) -> BufferHints {
        self.hints
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Cloneable read handle of a [`MemoryOutput`]
#[derive(Debug, Clone)]
pub struct MemoryHandle {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryHandle {
    pub fn bytes(&self) -> Vec<u8> {
        self.state.lock().bytes.clone()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.state.lock().bytes).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.text().lines().map(String::from).collect()
    }

    pub fn write_count(&self) -> usize {
        self.state.lock().writes
    }

    pub fn flush_count(&self) -> usize {
        self.state.lock().flushes
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().closes
    }

    pub fn reopen_count(&self) -> usize {
        self.state.lock().reopens
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Write count observed when the output was closed, if it was.
    ///
    /// Lets tests assert that every event arrived before the close.
    pub fn writes_before_close(&self) -> Option<usize> {
        let state = self.state.lock();
        state.closed.then_some(state.writes)
    }
}
