//! Appenders: one encoder bound to one output
//!
//! Thread-safety is expressed in the types. [`OutputAppender`] needs `&mut`
//! access and is meant to be owned by exactly one thread, such as an async
//! publisher's worker. [`LockedAppender`] wraps any appender in a mutex so
//! producer threads can share it directly.

use super::encoder::{Buffer, Encoder};
use super::error::{PipelineError, Result};
use super::event::Event;
use super::meta_error::{catch_panic, ErrorReporter};
use super::output::{Output, OutputStatus};
use parking_lot::Mutex;
use std::sync::Arc;

pub trait Appender: Send {
    /// Encode and write one event, then flush
    fn append(&mut self, event: &Event) -> Result<()>;

    /// Encode and write a batch of events, flushing once at the end.
    ///
    /// `events` is the valid prefix of the caller's reusable batch. The
    /// result is byte-for-byte what sequential [`Appender::append`] calls
    /// would produce. A failing event is reported once on `errors` and does
    /// not stop the rest of the batch. Returns the number of failed events.
    fn append_batch(&mut self, events: &[Arc<Event>], errors: &dyn ErrorReporter) -> usize {
        let mut failures = 0;
        for event in events {
            let outcome = catch_panic(|| self.append(event));
            if let Some(error) = failure(self.name(), outcome) {
                failures += 1;
                errors.report(self.name(), &error);
            }
        }
        if let Err(e) = self.flush() {
            errors.report(self.name(), &e);
        }
        failures
    }

    fn flush(&mut self) -> Result<()>;

    /// Flush and release the output; later appends fail
    fn close(&mut self) -> Result<()>;

    fn reopen(&mut self) -> Result<OutputStatus> {
        Ok(OutputStatus::Ignored)
    }

    fn name(&self) -> &str;
}

fn failure(name: &str, outcome: std::result::Result<Result<()>, String>) -> Option<PipelineError> {
    match outcome {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e),
        Err(panic_msg) => Some(PipelineError::appender_panic(name, panic_msg)),
    }
}

impl<A: Appender + ?Sized> Appender for Box<A> {
    fn append(&mut self, event: &Event) -> Result<()> {
        (**self).append(event)
    }

    fn append_batch(&mut self, events: &[Arc<Event>], errors: &dyn ErrorReporter) -> usize {
        (**self).append_batch(events, errors)
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

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Unsynchronized appender owning an encoder, an output and one buffer.
///
/// The buffer is taken out of its slot for the duration of an encode and put
/// back afterwards, so it is allocated once and reused. If an encode panics
/// the buffer is simply dropped and a fresh one is allocated next time.
///
/// # Example
///
/// ```
/// use rust_log_pipeline::core::{Appender, Event, Level, OutputAppender};
/// use rust_log_pipeline::encoders::TextEncoder;
/// use rust_log_pipeline::outputs::MemoryOutput;
///
/// let output = MemoryOutput::new();
/// let handle = output.handle();
/// let mut appender = OutputAppender::new("memory", TextEncoder::plain(), output);
///
/// appender.append(&Event::new("app", Level::Info, "ready")).unwrap();
/// assert!(handle.text().contains("ready"));
/// ```
pub struct OutputAppender<E, O> {
    name: String,
    encoder: E,
    output: O,
    buffer: Option<Buffer>,
    closed: bool,
}

impl<E: Encoder, O: Output> OutputAppender<E, O> {
    pub fn new(name: impl Into<String>, encoder: E, output: O) -> Self {
        Self {
            name: name.into(),
            encoder,
            output,
            buffer: None,
            closed: false,
        }
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn acquire(&mut self) -> Buffer {
        match self.buffer.take() {
            Some(buffer) => buffer,
            None => self.encoder.buffer(self.output.buffer_hints()),
        }
    }

    fn release(&mut self, mut buffer: Buffer) {
        buffer.clear();
        self.buffer = Some(buffer);
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(PipelineError::appender_closed(&self.name));
        }
        Ok(())
    }

    fn encode_and_drain(&mut self, buffer: &mut Buffer, event: &Event) -> Result<()> {
        self.encoder.encode(event, buffer)?;
        buffer.drain(&mut self.output, event)
    }
}

impl<E: Encoder, O: Output> Appender for OutputAppender<E, O> {
    fn append(&mut self, event: &Event) -> Result<()> {
        self.ensure_open()?;
        let mut buffer = self.acquire();
        let result = self.encode_and_drain(&mut buffer, event);
        self.release(buffer);
        result?;
        self.output.flush()
    }

    fn append_batch(&mut self, events: &[Arc<Event>], errors: &dyn ErrorReporter) -> usize {
        if events.is_empty() {
            return 0;
        }
        if let Err(e) = self.ensure_open() {
            errors.report(&self.name, &e);
            return events.len();
        }

        let mut failures = 0;
        let mut buffer = self.acquire();
        for event in events {
            let outcome = catch_panic(|| self.encode_and_drain(&mut buffer, event));
            // A failed encode may leave partial output behind
            buffer.clear();
            if let Some(error) = failure(&self.name, outcome) {
                failures += 1;
                errors.report(&self.name, &error);
            }
        }
        self.release(buffer);

        if let Err(e) = self.output.flush() {
            errors.report(&self.name, &e);
        }
        failures
    }

    fn flush(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.output.flush()
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.buffer = None;
        let flushed = self.output.flush();
        let closed = self.output.close();
        flushed.and(closed)
    }

    fn reopen(&mut self) -> Result<OutputStatus> {
        if self.closed {
            return Ok(OutputStatus::Closed);
        }
        self.output.reopen()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Mutex-wrapped appender shareable between producer threads.
///
/// Every write, flush, reopen and close runs under the same lock, so close
/// never overlaps an in-flight write.
pub struct LockedAppender<A> {
    name: String,
    inner: Mutex<A>,
}

impl<A: Appender> LockedAppender<A> {
    pub fn new(appender: A) -> Self {
        Self {
            name: appender.name().to_string(),
            inner: Mutex::new(appender),
        }
    }

    pub fn append(&self, event: &Event) -> Result<()> {
        self.inner.lock().append(event)
    }

    pub fn append_batch(&self, events: &[Arc<Event>], errors: &dyn ErrorReporter) -> usize {
        self.inner.lock().append_batch(events, errors)
    }

    pub fn flush(&self) -> Result<()> {
        self.inner.lock().flush()
    }

    pub fn close(&self) -> Result<()> {
        self.inner.lock().close()
    }

    pub fn reopen(&self) -> Result<OutputStatus> {
        self.inner.lock().reopen()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn into_inner(self) -> A {
        self.inner.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Level, RecordingReporter};
    use crate::encoders::TextEncoder;
    use crate::outputs::MemoryOutput;
    use chrono::{TimeZone, Utc};

    fn events(n: usize) -> Vec<Arc<Event>> {
        let ts = Utc.with_ymd_and_hms(2025, 1, 8, 10, 30, 45).single().unwrap();
        (0..n)
            .map(|i| {
                Arc::new(
                    Event::builder("app", Level::Info)
                        .message(format!("event {}", i))
                        .timestamp(ts)
                        .build(),
                )
            })
            .collect()
    }

    /// Fails on messages containing "bad", panics on "boom"
    struct Picky {
        seen: Vec<String>,
        flushes: usize,
    }

    impl Appender for Picky {
        fn append(&mut self, event: &Event) -> Result<()> {
            if event.message().contains("boom") {
                panic!("picky appender exploded");
            }
            if event.message().contains("bad") {
                return Err(PipelineError::other("rejected"));
            }
            self.seen.push(event.message().to_string());
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            self.flushes += 1;
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "picky"
        }
    }

    #[test]
    fn test_batch_matches_sequential_appends() {
        let batch = events(25);

        let sequential = MemoryOutput::new();
        let seq_handle = sequential.handle();
        let mut appender = OutputAppender::new("seq", TextEncoder::plain(), sequential);
        for event in &batch {
            appender.append(event).unwrap();
        }

        let batched = MemoryOutput::new();
        let batch_handle = batched.handle();
        let mut appender = OutputAppender::new("batch", TextEncoder::plain(), batched);
        let reporter = RecordingReporter::new();
        assert_eq!(appender.append_batch(&batch, &reporter), 0);

        assert_eq!(seq_handle.bytes(), batch_handle.bytes());
        assert_eq!(seq_handle.flush_count(), 25);
        assert_eq!(batch_handle.flush_count(), 1);
        assert!(reporter.is_empty());
    }

    #[test]
    fn test_batch_respects_valid_prefix() {
        let batch = events(10);
        let output = MemoryOutput::new();
        let handle = output.handle();
        let mut appender = OutputAppender::new("memory", TextEncoder::plain(), output);

        appender.append_batch(&batch[..3], &RecordingReporter::new());
        assert_eq!(handle.lines().len(), 3);
    }

    #[test]
    fn test_default_batch_isolates_failures() {
        let mut batch = events(2);
        batch.push(Arc::new(Event::new("app", Level::Info, "bad one")));
        batch.push(Arc::new(Event::new("app", Level::Info, "boom")));
        batch.extend(events(2));

        let mut picky = Picky {
            seen: Vec::new(),
            flushes: 0,
        };
        let reporter = RecordingReporter::new();
        let failures = picky.append_batch(&batch, &reporter);

        assert_eq!(failures, 2);
        assert_eq!(picky.seen.len(), 4);
        assert_eq!(picky.flushes, 1);
        assert_eq!(reporter.count_matching("rejected"), 1);
        assert_eq!(reporter.count_matching("picky appender exploded"), 1);
    }

    #[test]
    fn test_append_after_close_fails() {
        let output = MemoryOutput::new();
        let handle = output.handle();
        let mut appender = OutputAppender::new("memory", TextEncoder::plain(), output);
        appender.close().unwrap();
        appender.close().unwrap();

        assert!(matches!(
            appender.append(&Event::new("app", Level::Info, "late")),
            Err(PipelineError::AppenderClosed { .. })
        ));
        assert_eq!(appender.reopen().unwrap(), OutputStatus::Closed);
        assert_eq!(handle.close_count(), 1);

        let reporter = RecordingReporter::new();
        assert_eq!(appender.append_batch(&events(2), &reporter), 2);
        assert_eq!(reporter.len(), 1);
    }

    #[test]
    fn test_locked_appender_serializes_threads() {
        let output = MemoryOutput::new();
        let handle = output.handle();
        let shared = Arc::new(LockedAppender::new(OutputAppender::new(
            "memory",
            TextEncoder::plain(),
            output,
        )));

        let threads: Vec<_> = (0..4)
            .map(|t| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        shared
                            .append(&Event::new("app", Level::Info, format!("t{}-{}", t, i)))
                            .unwrap();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        let lines = handle.lines();
        assert_eq!(lines.len(), 200);
        // Every line is intact: no interleaved writes
        assert!(lines.iter().all(|l| l.contains(" - t")));
        assert_eq!(shared.name(), "memory");
    }
}
