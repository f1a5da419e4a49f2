//! Synchronous publisher appending on the calling thread

use super::{Lifecycle, Publisher};
use crate::core::appender::{Appender, LockedAppender};
use crate::core::error::Result;
use crate::core::event::Event;
use crate::core::meta_error::{isolate, ErrorReporter};
use crate::core::metrics::{PublisherMetrics, PublisherState, PublisherStatus};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

/// Appends on the caller's thread.
///
/// Each appender sits behind its own lock, so producers writing to different
/// appenders never contend. A failing or panicking appender is reported and
/// skipped; the remaining appenders still receive the event.
pub struct DirectPublisher {
    lifecycle: Lifecycle,
    appenders: Vec<LockedAppender<Box<dyn Appender>>>,
    reporter: Arc<dyn ErrorReporter>,
    metrics: PublisherMetrics,
    // Readers are in-flight `log` calls; close takes it exclusively
    gate: RwLock<()>,
}

impl DirectPublisher {
    pub fn new(appenders: Vec<Box<dyn Appender>>, reporter: Arc<dyn ErrorReporter>) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            appenders: appenders.into_iter().map(LockedAppender::new).collect(),
            reporter,
            metrics: PublisherMetrics::new(),
            gate: RwLock::new(()),
        }
    }

    pub fn metrics(&self) -> &PublisherMetrics {
        &self.metrics
    }

    fn close_appenders(&self) {
        for appender in &self.appenders {
            if let Err(e) = isolate(appender.name(), || appender.close()) {
                self.reporter.report("direct", &e);
            }
        }
    }
}

impl Publisher for DirectPublisher {
    fn start(&self) -> Result<()> {
        self.lifecycle.start()
    }

    fn log(&self, event: Event) -> Result<()> {
        let _gate = self.gate.read();
        self.lifecycle.ensure_running()?;
        self.metrics.record_accepted();

        for appender in &self.appenders {
            match isolate(appender.name(), || appender.append(&event)) {
                Ok(()) => {
                    self.metrics.record_delivered(1);
                }
                Err(e) => {
                    self.metrics.record_failed(1);
                    self.reporter.report("direct", &e);
                }
            }
        }
        Ok(())
    }

    fn close(&self, timeout: Duration) -> bool {
        if self.lifecycle.close() == PublisherState::Closed {
            return true;
        }
        // Wait for in-flight appends so close never overlaps a write
        match self.gate.try_write_for(timeout) {
            Some(_gate) => {
                self.close_appenders();
                true
            }
            None => {
                self.reporter.warn(
                    "direct",
                    "in-flight appends did not finish within timeout, appenders left open",
                );
                false
            }
        }
    }

    fn status(&self) -> PublisherStatus {
        PublisherStatus {
            kind: self.kind(),
            state: self.lifecycle.state(),
            queue_depth: 0,
            capacity: 0,
            appenders: self.appenders.len(),
            metrics: self.metrics.snapshot(),
        }
    }

    fn kind(&self) -> &'static str {
        "direct"
    }
}

impl Drop for DirectPublisher {
    fn drop(&mut self) {
        self.close(super::DEFAULT_SHUTDOWN_TIMEOUT);
    }
}
