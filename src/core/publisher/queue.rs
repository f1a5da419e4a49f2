//! Bounded-queue publisher with a single worker thread

use super::{
    join_with_timeout, record_drop, send_blocking, spawn_worker, Delivery, Lifecycle, Publisher,
    SendOutcome, ShutdownToken, DEFAULT_BATCH_SIZE, DEFAULT_SHUTDOWN_TIMEOUT,
};
use crate::core::appender::Appender;
use crate::core::error::{PipelineError, Result};
use crate::core::event::Event;
use crate::core::meta_error::ErrorReporter;
use crate::core::metrics::{PublisherMetrics, PublisherState, PublisherStatus};
use crate::core::overflow_policy::{OverflowCallback, OverflowPolicy};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const COMPONENT: &str = "queue";

/// Publishes through a fixed-capacity channel drained by one worker thread.
///
/// The worker blocks for one event, then takes up to `batch_size - 1` more
/// without blocking and hands the batch to each appender. A single
/// producer's events reach the appenders in the order they were logged.
///
/// When the queue is full the [`OverflowPolicy`] decides: `Block` waits for
/// space, `BlockWithTimeout` waits and then drops, `DropNewest` drops at
/// once. The queue never grows beyond its capacity.
///
/// # Example
///
/// ```
/// use rust_log_pipeline::core::{Event, Level, OutputAppender, Publisher, QueuePublisher, StderrReporter};
/// use rust_log_pipeline::encoders::TextEncoder;
/// use rust_log_pipeline::outputs::MemoryOutput;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let output = MemoryOutput::new();
/// let handle = output.handle();
/// let appender = OutputAppender::new("memory", TextEncoder::plain(), output);
///
/// let publisher = QueuePublisher::new(64, vec![Box::new(appender)], Arc::new(StderrReporter)).unwrap();
/// publisher.start().unwrap();
/// publisher.log(Event::new("app", Level::Info, "queued")).unwrap();
/// assert!(publisher.close(Duration::from_secs(5)));
/// assert_eq!(handle.lines().len(), 1);
/// ```
pub struct QueuePublisher {
    lifecycle: Lifecycle,
    capacity: usize,
    batch_size: usize,
    policy: OverflowPolicy,
    on_overflow: Option<OverflowCallback>,
    reporter: Arc<dyn ErrorReporter>,
    metrics: Arc<PublisherMetrics>,
    appender_count: usize,
    // Held by the worker once started
    pending: Mutex<Option<(Receiver<Arc<Event>>, Vec<Box<dyn Appender>>)>>,
    // Producers send under the read lock; close takes it to disconnect
    sender: RwLock<Option<Sender<Arc<Event>>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    shutdown: ShutdownToken,
}

impl QueuePublisher {
    pub fn new(
        capacity: usize,
        appenders: Vec<Box<dyn Appender>>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Result<Self> {
        if capacity == 0 {
            return Err(PipelineError::config(
                "queue publisher",
                "capacity must be at least 1",
            ));
        }
        let (sender, receiver) = bounded(capacity);
        Ok(Self {
            lifecycle: Lifecycle::new(),
            capacity,
            batch_size: DEFAULT_BATCH_SIZE,
            policy: OverflowPolicy::default(),
            on_overflow: None,
            reporter,
            metrics: Arc::new(PublisherMetrics::new()),
            appender_count: appenders.len(),
            pending: Mutex::new(Some((receiver, appenders))),
            sender: RwLock::new(Some(sender)),
            worker: Mutex::new(None),
            shutdown: ShutdownToken::new(),
        })
    }

    /// Maximum events per worker batch (at least 1)
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[must_use]
    pub fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Called with the running drop count on the first and every 1000th drop
    #[must_use]
    pub fn with_overflow_callback(mut self, callback: OverflowCallback) -> Self {
        self.on_overflow = Some(callback);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn overflow_policy(&self) -> OverflowPolicy {
        self.policy
    }

    pub fn metrics(&self) -> &PublisherMetrics {
        &self.metrics
    }

    /// Events currently buffered
    pub fn queue_depth(&self) -> usize {
        self.sender.read().as_ref().map_or(0, Sender::len)
    }

    fn record_drop(&self) {
        record_drop(
            COMPONENT,
            &self.metrics,
            &*self.reporter,
            self.on_overflow.as_ref(),
        );
    }

    /// Apply the overflow policy to an event that found the queue full
    fn overflow(&self, sender: &Sender<Arc<Event>>, event: Arc<Event>) -> Result<bool> {
        self.metrics.record_queue_full();
        let deadline = match self.policy {
            OverflowPolicy::DropNewest => return Ok(false),
            OverflowPolicy::Block => None,
            OverflowPolicy::BlockWithTimeout(timeout) => Some(Instant::now() + timeout),
        };

        self.metrics.record_block();
        match send_blocking(sender, event, deadline, &self.lifecycle) {
            SendOutcome::Sent => Ok(true),
            SendOutcome::TimedOut => Ok(false),
            SendOutcome::Closed => {
                self.record_drop();
                Err(PipelineError::Closed)
            }
            SendOutcome::Disconnected => {
                self.reporter
                    .report(COMPONENT, &PipelineError::worker_stopped(COMPONENT));
                Ok(false)
            }
        }
    }
}

impl Publisher for QueuePublisher {
    fn start(&self) -> Result<()> {
        self.lifecycle.start()?;
        let (receiver, appenders) = self
            .pending
            .lock()
            .take()
            .ok_or(PipelineError::AlreadyStarted)?;

        let worker = QueueWorker {
            receiver,
            batch: Vec::with_capacity(self.batch_size),
            batch_size: self.batch_size,
            delivery: Delivery::new(
                COMPONENT,
                appenders,
                Arc::clone(&self.reporter),
                Arc::clone(&self.metrics),
            ),
            shutdown: self.shutdown.clone(),
        };

        match spawn_worker("log-queue-worker", move || worker.run()) {
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

        let queued = match sender.try_send(Arc::new(event)) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => self.overflow(sender, event)?,
            Err(TrySendError::Disconnected(_)) => {
                self.reporter
                    .report(COMPONENT, &PipelineError::worker_stopped(COMPONENT));
                false
            }
        };

        if queued {
            self.metrics.record_accepted();
            self.metrics.observe_depth(sender.len());
        } else {
            self.record_drop();
        }
        Ok(())
    }

    fn close(&self, timeout: Duration) -> bool {
        match self.lifecycle.close() {
            PublisherState::Closed => return true,
            PublisherState::Created => {
                drop(self.sender.write().take());
                if let Some((_, mut appenders)) = self.pending.lock().take() {
                    super::close_appenders(COMPONENT, &mut appenders, &*self.reporter);
                }
                return true;
            }
            PublisherState::Running => {}
        }

        self.shutdown.cancel();
        // Disconnecting lets the worker drain what is buffered, then exit
        drop(self.sender.write().take());

        match self.worker.lock().take() {
            Some(handle) => join_with_timeout(handle, timeout, COMPONENT, &*self.reporter),
            None => true,
        }
    }

    fn status(&self) -> PublisherStatus {
        PublisherStatus {
            kind: self.kind(),
            state: self.lifecycle.state(),
            queue_depth: self.queue_depth(),
            capacity: self.capacity,
            appenders: self.appender_count,
            metrics: self.metrics.snapshot(),
        }
    }

    fn kind(&self) -> &'static str {
        COMPONENT
    }
}

impl Drop for QueuePublisher {
    fn drop(&mut self) {
        self.close(DEFAULT_SHUTDOWN_TIMEOUT);
    }
}

struct QueueWorker {
    receiver: Receiver<Arc<Event>>,
    batch: Vec<Arc<Event>>,
    batch_size: usize,
    delivery: Delivery,
    shutdown: ShutdownToken,
}

impl QueueWorker {
    fn run(mut self) {
        // recv keeps returning buffered events after disconnection and
        // fails only once the queue is empty
        while let Ok(event) = self.receiver.recv() {
            self.batch.push(event);

            // Try to collect more events without blocking (up to batch_size)
            while self.batch.len() < self.batch_size {
                match self.receiver.try_recv() {
                    Ok(event) => self.batch.push(event),
                    Err(_) => break,
                }
            }

            self.delivery.deliver(&self.batch);
            self.batch.clear();
        }

        if !self.shutdown.is_cancelled() {
            self.delivery.report_unexpected_stop();
        }
        self.delivery.close();
    }
}
