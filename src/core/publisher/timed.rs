//! Time-windowed publisher draining its queue on a fixed interval

use super::{
    join_with_timeout, record_drop, send_blocking, spawn_worker, Delivery, Lifecycle, Publisher,
    SendOutcome, ShutdownToken, DEFAULT_SHUTDOWN_TIMEOUT, DEFAULT_TIMED_INTERVAL,
};
use crate::core::appender::Appender;
use crate::core::error::{PipelineError, Result};
use crate::core::event::Event;
use crate::core::meta_error::ErrorReporter;
use crate::core::metrics::{PublisherMetrics, PublisherState, PublisherStatus};
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

const COMPONENT: &str = "timed";

/// Buffers events and drains the whole queue every `interval`.
///
/// `log` never drops: when the queue is full it asks the worker for an
/// immediate drain and then waits for space. The worker also drains when
/// nothing has accumulated, so appenders see a regular batch cadence.
pub struct TimedPublisher {
    lifecycle: Lifecycle,
    capacity: usize,
    interval: Duration,
    reporter: Arc<dyn ErrorReporter>,
    metrics: Arc<PublisherMetrics>,
    appender_count: usize,
    pending: Mutex<Option<TimedInput>>,
    sender: RwLock<Option<Sender<Arc<Event>>>>,
    // Capacity 1: one pending drain request is enough
    flush_signal: Sender<()>,
    worker: Mutex<Option<JoinHandle<()>>>,
    shutdown: ShutdownToken,
}

struct TimedInput {
    events: Receiver<Arc<Event>>,
    flush_requests: Receiver<()>,
    appenders: Vec<Box<dyn Appender>>,
}

impl TimedPublisher {
    pub fn new(
        capacity: usize,
        appenders: Vec<Box<dyn Appender>>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Result<Self> {
        if capacity == 0 {
            return Err(PipelineError::config(
                "timed publisher",
                "capacity must be at least 1",
            ));
        }
        let (sender, events) = bounded(capacity);
        let (flush_signal, flush_requests) = bounded(1);
        Ok(Self {
            lifecycle: Lifecycle::new(),
            capacity,
            interval: DEFAULT_TIMED_INTERVAL,
            reporter,
            metrics: Arc::new(PublisherMetrics::new()),
            appender_count: appenders.len(),
            pending: Mutex::new(Some(TimedInput {
                events,
                flush_requests,
                appenders,
            })),
            sender: RwLock::new(Some(sender)),
            flush_signal,
            worker: Mutex::new(None),
            shutdown: ShutdownToken::new(),
        })
    }

    /// Drain interval (at least 1 ms)
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn metrics(&self) -> &PublisherMetrics {
        &self.metrics
    }

    fn request_flush(&self) {
        // Full means a request is already pending
        let _ = self.flush_signal.try_send(());
    }
}

impl Publisher for TimedPublisher {
    fn start(&self) -> Result<()> {
        self.lifecycle.start()?;
        let input = self
            .pending
            .lock()
            .take()
            .ok_or(PipelineError::AlreadyStarted)?;

        let worker = TimedWorker {
            events: input.events,
            flush_requests: input.flush_requests,
            interval: self.interval,
            limit: self.capacity,
            batch: Vec::with_capacity(self.capacity),
            delivery: Delivery::new(
                COMPONENT,
                input.appenders,
                Arc::clone(&self.reporter),
                Arc::clone(&self.metrics),
            ),
            shutdown: self.shutdown.clone(),
        };

        match spawn_worker("log-timed-worker", move || worker.run()) {
            Ok(handle) => {
                *self.worker.lock() = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.lifecycle.close();
                Err(e)
            }
        }
    }

    fn log(&self, event: Event) -> Result<()> {
        self.lifecycle.ensure_running()?;
        let guard = self.sender.read();
        let sender = guard.as_ref().ok_or(PipelineError::Closed)?;

        let outcome = match sender.try_send(Arc::new(event)) {
            Ok(()) => SendOutcome::Sent,
            Err(TrySendError::Full(event)) => {
                self.metrics.record_queue_full();
                self.metrics.record_block();
                self.request_flush();
                send_blocking(sender, event, None, &self.lifecycle)
            }
            Err(TrySendError::Disconnected(_)) => SendOutcome::Disconnected,
        };

        match outcome {
            SendOutcome::Sent => {
                self.metrics.record_accepted();
                self.metrics.observe_depth(sender.len());
                Ok(())
            }
            SendOutcome::Closed => {
                record_drop(COMPONENT, &self.metrics, &*self.reporter, None);
                Err(PipelineError::Closed)
            }
            SendOutcome::TimedOut | SendOutcome::Disconnected => {
                self.reporter
                    .report(COMPONENT, &PipelineError::worker_stopped(COMPONENT));
                record_drop(COMPONENT, &self.metrics, &*self.reporter, None);
                Ok(())
            }
        }
    }

    fn close(&self, timeout: Duration) -> bool {
        match self.lifecycle.close() {
            PublisherState::Closed => return true,
            PublisherState::Created => {
                drop(self.sender.write().take());
                if let Some(mut input) = self.pending.lock().take() {
                    super::close_appenders(COMPONENT, &mut input.appenders, &*self.reporter);
                }
                return true;
            }
            PublisherState::Running => {}
        }

        self.shutdown.cancel();
        drop(self.sender.write().take());
        // Wake the worker now instead of at the next interval
        self.request_flush();

        match self.worker.lock().take() {
            Some(handle) => join_with_timeout(handle, timeout, COMPONENT, &*self.reporter),
            None => true,
        }
    }

    fn status(&self) -> PublisherStatus {
        PublisherStatus {
            kind: self.kind(),
            state: self.lifecycle.state(),
            queue_depth: self.sender.read().as_ref().map_or(0, Sender::len),
            capacity: self.capacity,
            appenders: self.appender_count,
            metrics: self.metrics.snapshot(),
        }
    }

    fn kind(&self) -> &'static str {
        COMPONENT
    }
}

impl Drop for TimedPublisher {
    fn drop(&mut self) {
        self.close(DEFAULT_SHUTDOWN_TIMEOUT);
    }
}

struct TimedWorker {
    events: Receiver<Arc<Event>>,
    flush_requests: Receiver<()>,
    interval: Duration,
    limit: usize,
    batch: Vec<Arc<Event>>,
    delivery: Delivery,
    shutdown: ShutdownToken,
}

impl TimedWorker {
    fn run(mut self) {
        loop {
            // Either outcome means "drain now"; the publisher owns the
            // signal sender for its whole life
            let _ = self.flush_requests.recv_timeout(self.interval);

            let disconnected = self.drain();
            self.delivery.deliver(&self.batch);
            self.batch.clear();

            if disconnected {
                break;
            }
        }

        if !self.shutdown.is_cancelled() {
            self.delivery.report_unexpected_stop();
        }
        self.delivery.close();
    }

    /// Move up to `limit` queued events into the batch. Returns true once
    /// the queue is disconnected and empty.
    fn drain(&mut self) -> bool {
        while self.batch.len() < self.limit {
            match self.events.try_recv() {
                Ok(event) => self.batch.push(event),
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Disconnected) => return true,
            }
        }
        false
    }
}
