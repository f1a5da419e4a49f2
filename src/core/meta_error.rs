//! Meta-error channel for failures inside the pipeline itself
//!
//! Appender, encoder and worker failures are reported here instead of being
//! returned to the thread that called `log`. Reporters must not panic, must
//! not block for long and must never log through the pipeline they report on.

use super::error::PipelineError;
use parking_lot::Mutex;
use std::any::Any;
use std::io::Write;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Sink for internal pipeline failures
pub trait ErrorReporter: Send + Sync {
    /// Report `error` raised by `component`
    fn report(&self, component: &str, error: &PipelineError);

    /// Report an operational warning that is not an error
    fn warn(&self, component: &str, message: &str) {
        self.report(component, &PipelineError::other(message));
    }
}

/// Default reporter writing to stderr
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrReporter;

impl ErrorReporter for StderrReporter {
    fn report(&self, component: &str, error: &PipelineError) {
        // A broken stderr has nowhere left to report to
        let _ = writeln!(std::io::stderr(), "[LOGGER ERROR] {}: {}", component, error);
    }

    fn warn(&self, component: &str, message: &str) {
        let _ = writeln!(std::io::stderr(), "[LOGGER WARNING] {}: {}", component, message);
    }
}

/// Reporter that keeps every report in memory.
///
/// Intended for tests and for embedding applications that surface pipeline
/// health in their own diagnostics.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    entries: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Copies of all reports so far, as `component: message`
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Number of reports whose text contains `needle`
    pub fn count_matching(&self, needle: &str) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|entry| entry.contains(needle))
            .count()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, component: &str, error: &PipelineError) {
        self.entries.lock().push(format!("{}: {}", component, error));
    }

    fn warn(&self, component: &str, message: &str) {
        self.entries
            .lock()
            .push(format!("{}: warning: {}", component, message));
    }
}

/// Extract a readable message from a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Run `f`, catching a panic as its message.
///
/// The outer `Err` carries the panic message; the inner result is whatever
/// `f` returned.
pub(crate) fn catch_panic<T>(
    f: impl FnOnce() -> Result<T, PipelineError>,
) -> Result<Result<T, PipelineError>, String> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

/// Like [`catch_panic`], folding a panic into [`PipelineError::AppenderPanic`]
pub(crate) fn isolate<T>(
    appender: &str,
    f: impl FnOnce() -> Result<T, PipelineError>,
) -> Result<T, PipelineError> {
    catch_panic(f).unwrap_or_else(|message| Err(PipelineError::appender_panic(appender, message)))
}
