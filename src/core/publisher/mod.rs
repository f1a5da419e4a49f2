//! Publisher strategies
//!
//! A publisher decouples the threads calling `log` from the appenders. Every
//! strategy shares the same lifecycle: `start` once, `log` while running,
//! `close` with a bounded wait. Only lifecycle misuse is ever returned to the
//! caller of `log`; delivery failures go to the [`ErrorReporter`].
//!
//! | Strategy | Hand-off | Consumer threads |
//! |---|---|---|
//! | [`DirectPublisher`] | caller thread, per-appender lock | none |
//! | [`QueuePublisher`] | bounded channel | one |
//! | [`RingPublisher`] | disruptor ring | one per appender |
//! | [`TimedPublisher`] | bounded channel, periodic drain | one |

pub mod direct;
pub mod queue;
pub mod ring;
pub mod timed;

pub use direct::DirectPublisher;
pub use queue::QueuePublisher;
pub use ring::RingPublisher;
pub use timed::TimedPublisher;

use super::appender::Appender;
use super::error::{PipelineError, Result};
use super::event::Event;
use super::meta_error::{isolate, panic_message, ErrorReporter};
use super::metrics::{PublisherMetrics, PublisherState, PublisherStatus};
use super::overflow_policy::{OverflowCallback, OverflowPolicy};
use crossbeam_channel::{SendTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default timeout for graceful shutdown
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub const DEFAULT_QUEUE_CAPACITY: usize = 8192;
pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_RING_SIZE: usize = 1024;
pub const DEFAULT_TIMED_CAPACITY: usize = 1024;
pub const DEFAULT_TIMED_INTERVAL: Duration = Duration::from_millis(5);

/// Longest single wait of a blocked producer before it re-checks for close
const BLOCK_SLICE: Duration = Duration::from_millis(10);

/// Poll interval while waiting for a worker to finish
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Emit an overflow warning on the first drop and every this many after
const DROP_ALERT_INTERVAL: u64 = 1000;

/// Hands events from producer threads to appenders
pub trait Publisher: Send + Sync {
    /// Start worker threads, if any. Fails with `AlreadyStarted` on a second
    /// call and `Closed` after close.
    fn start(&self) -> Result<()>;

    /// Publish a frozen event.
    ///
    /// Returns `NotStarted` before start and `Closed` after close. Delivery
    /// failures are never returned here.
    fn log(&self, event: Event) -> Result<()>;

    /// Stop accepting events, deliver what is buffered and close the
    /// appenders, waiting at most `timeout`. Closing twice is a no-op
    /// returning `true`.
    ///
    /// Returns `false` if the wait timed out. The worker is then left
    /// running detached: it keeps draining and closes the appenders itself
    /// once done, so they may still be open when this returns.
    fn close(&self, timeout: Duration) -> bool;

    fn status(&self) -> PublisherStatus;

    /// Short strategy name, e.g. `"queue"`
    fn kind(&self) -> &'static str;
}

impl<P: Publisher + ?Sized> Publisher for Box<P> {
    fn start(&self) -> Result<()> {
        (**self).start()
    }

    fn log(&self, event: Event) -> Result<()> {
        (**self).log(event)
    }

    fn close(&self, timeout: Duration) -> bool {
        (**self).close(timeout)
    }

    fn status(&self) -> PublisherStatus {
        (**self).status()
    }

    fn kind(&self) -> &'static str {
        (**self).kind()
    }
}

const CREATED: u8 = 0;
const RUNNING: u8 = 1;
const CLOSED: u8 = 2;

/// Atomic Created -> Running -> Closed state machine
#[derive(Debug)]
pub(crate) struct Lifecycle(AtomicU8);

impl Lifecycle {
    pub(crate) const fn new() -> Self {
        Self(AtomicU8::new(CREATED))
    }

    pub(crate) fn state(&self) -> PublisherState {
        Self::decode(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn start(&self) -> Result<()> {
        match self
            .0
            .compare_exchange(CREATED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(()),
            Err(RUNNING) => Err(PipelineError::AlreadyStarted),
            Err(_) => Err(PipelineError::Closed),
        }
    }

    pub(crate) fn ensure_running(&self) -> Result<()> {
        match self.0.load(Ordering::Acquire) {
            RUNNING => Ok(()),
            CREATED => Err(PipelineError::NotStarted),
            _ => Err(PipelineError::Closed),
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.0.load(Ordering::Acquire) == CLOSED
    }

    /// Move to Closed, returning the state that was left
    pub(crate) fn close(&self) -> PublisherState {
        Self::decode(self.0.swap(CLOSED, Ordering::AcqRel))
    }

    fn decode(raw: u8) -> PublisherState {
        match raw {
            CREATED => PublisherState::Created,
            RUNNING => PublisherState::Running,
            _ => PublisherState::Closed,
        }
    }
}

/// Explicit cancellation flag shared between a publisher and its worker.
///
/// A worker that loses its input without the token being cancelled treats
/// that as an unexpected stop and reports it.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken(Arc<AtomicBool>);

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Appenders owned by one consumer thread, plus where their failures go
pub(crate) struct Delivery {
    component: &'static str,
    appenders: Vec<Box<dyn Appender>>,
    reporter: Arc<dyn ErrorReporter>,
    metrics: Arc<PublisherMetrics>,
}

impl Delivery {
    pub(crate) fn new(
        component: &'static str,
        appenders: Vec<Box<dyn Appender>>,
        reporter: Arc<dyn ErrorReporter>,
        metrics: Arc<PublisherMetrics>,
    ) -> Self {
        Self {
            component,
            appenders,
            reporter,
            metrics,
        }
    }

    /// Hand `batch` to every appender in turn.
    ///
    /// A panic escaping an appender's own batch handling counts the whole
    /// batch as failed for that appender only.
    pub(crate) fn deliver(&mut self, batch: &[Arc<Event>]) {
        let reporter = &*self.reporter;
        for appender in self.appenders.iter_mut() {
            let outcome = catch_unwind(AssertUnwindSafe(|| appender.append_batch(batch, reporter)));
            let failures = match outcome {
                Ok(failures) => failures,
                Err(payload) => {
                    let error =
                        PipelineError::appender_panic(appender.name(), panic_message(payload.as_ref()));
                    reporter.report(self.component, &error);
                    batch.len()
                }
            };
            let failures = failures.min(batch.len());
            self.metrics.record_delivered((batch.len() - failures) as u64);
            self.metrics.record_failed(failures as u64);
        }
    }

    /// Report that the input went away without a shutdown request
    pub(crate) fn report_unexpected_stop(&self) {
        self.reporter
            .report(self.component, &PipelineError::worker_stopped(self.component));
    }

    pub(crate) fn close(&mut self) {
        close_appenders(self.component, &mut self.appenders, &*self.reporter);
    }
}

/// Close every appender, reporting failures and panics
pub(crate) fn close_appenders(
    component: &str,
    appenders: &mut [Box<dyn Appender>],
    reporter: &dyn ErrorReporter,
) {
    for appender in appenders.iter_mut() {
        let name = appender.name().to_string();
        if let Err(e) = isolate(&name, || appender.close()) {
            reporter.report(component, &e);
        }
    }
}

/// Count a dropped event and alert on the first and every 1000th drop
pub(crate) fn record_drop(
    component: &str,
    metrics: &PublisherMetrics,
    reporter: &dyn ErrorReporter,
    on_overflow: Option<&OverflowCallback>,
) {
    let dropped = metrics.record_dropped() + 1;
    if dropped == 1 || dropped % DROP_ALERT_INTERVAL == 0 {
        reporter.warn(
            component,
            &format!(
                "Queue full, {} events dropped. \
                 Consider increasing capacity or using the block policy.",
                dropped
            ),
        );
        if let Some(callback) = on_overflow {
            callback(dropped);
        }
    }
}

/// How a blocking send ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SendOutcome {
    Sent,
    TimedOut,
    Closed,
    Disconnected,
}

/// Send `item`, waiting in bounded slices until it fits, `deadline` passes or
/// the publisher closes
pub(crate) fn send_blocking<T>(
    sender: &Sender<T>,
    mut item: T,
    deadline: Option<Instant>,
    lifecycle: &Lifecycle,
) -> SendOutcome {
    loop {
        if lifecycle.is_closed() {
            return SendOutcome::Closed;
        }
        let slice = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return SendOutcome::TimedOut;
                }
                remaining.min(BLOCK_SLICE)
            }
            None => BLOCK_SLICE,
        };
        match sender.send_timeout(item, slice) {
            Ok(()) => return SendOutcome::Sent,
            Err(SendTimeoutError::Timeout(returned)) => item = returned,
            Err(SendTimeoutError::Disconnected(_)) => return SendOutcome::Disconnected,
        }
    }
}

/// Wait for a worker thread, giving up after `timeout`.
///
/// A worker that outlives the timeout is left detached.
pub(crate) fn join_with_timeout(
    handle: JoinHandle<()>,
    timeout: Duration,
    component: &str,
    reporter: &dyn ErrorReporter,
) -> bool {
    let start = Instant::now();
    loop {
        if handle.is_finished() {
            // Thread finished, join it to check for panics
            return match handle.join() {
                Ok(()) => true,
                Err(payload) => {
                    reporter.report(
                        component,
                        &PipelineError::other(format!(
                            "worker thread panicked during shutdown: {}",
                            panic_message(payload.as_ref())
                        )),
                    );
                    false
                }
            };
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            reporter.warn(
                component,
                "worker thread did not finish within timeout, some events may be lost",
            );
            return false;
        }

        thread::sleep(JOIN_POLL_INTERVAL.min(timeout - elapsed));
    }
}

pub(crate) fn spawn_worker<F>(name: &str, body: F) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(body)
        .map_err(|e| PipelineError::io_operation("spawning worker thread", name, e))
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_ring_size() -> usize {
    DEFAULT_RING_SIZE
}

fn default_timed_capacity() -> usize {
    DEFAULT_TIMED_CAPACITY
}

fn default_timed_interval_ms() -> u64 {
    DEFAULT_TIMED_INTERVAL.as_millis() as u64
}

/// Serializable choice of publisher strategy
///
/// # Example
///
/// ```
/// use rust_log_pipeline::core::PublisherConfig;
///
/// let config: PublisherConfig =
///     serde_json::from_str(r#"{"type": "queue", "capacity": 10}"#).unwrap();
/// assert!(config.validate().is_ok());
///
/// let bad: PublisherConfig = serde_json::from_str(r#"{"type": "ring", "size": 100}"#).unwrap();
/// assert!(bad.validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PublisherConfig {
    Direct,
    Queue {
        #[serde(default = "default_queue_capacity")]
        capacity: usize,
        #[serde(default = "default_batch_size")]
        batch_size: usize,
        #[serde(default)]
        overflow: OverflowPolicy,
    },
    Ring {
        #[serde(default = "default_ring_size")]
        size: usize,
    },
    Timed {
        #[serde(default = "default_timed_capacity")]
        capacity: usize,
        #[serde(default = "default_timed_interval_ms")]
        interval_ms: u64,
    },
}

impl Default for PublisherConfig {
    fn default() -> Self {
        PublisherConfig::Direct
    }
}

impl PublisherConfig {
    /// Bounded queue with default capacity, batch size and overflow policy
    pub fn queue() -> Self {
        PublisherConfig::Queue {
            capacity: DEFAULT_QUEUE_CAPACITY,
            batch_size: DEFAULT_BATCH_SIZE,
            overflow: OverflowPolicy::default(),
        }
    }

    pub fn ring(size: usize) -> Self {
        PublisherConfig::Ring { size }
    }

    pub fn timed() -> Self {
        PublisherConfig::Timed {
            capacity: DEFAULT_TIMED_CAPACITY,
            interval_ms: default_timed_interval_ms(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PublisherConfig::Direct => "direct",
            PublisherConfig::Queue { .. } => "queue",
            PublisherConfig::Ring { .. } => "ring",
            PublisherConfig::Timed { .. } => "timed",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            PublisherConfig::Direct => Ok(()),
            PublisherConfig::Queue {
                capacity,
                batch_size,
                ..
            } => {
                if capacity == 0 {
                    return Err(PipelineError::config("queue publisher", "capacity must be at least 1"));
                }
                if batch_size == 0 {
                    return Err(PipelineError::config("queue publisher", "batch_size must be at least 1"));
                }
                Ok(())
            }
            PublisherConfig::Ring { size } => ring::validate_size(size),
            PublisherConfig::Timed {
                capacity,
                interval_ms,
            } => {
                if capacity == 0 {
                    return Err(PipelineError::config("timed publisher", "capacity must be at least 1"));
                }
                if interval_ms == 0 {
                    return Err(PipelineError::config("timed publisher", "interval_ms must be at least 1"));
                }
                Ok(())
            }
        }
    }

    /// Construct the configured publisher around `appenders`, not yet started
    pub fn build(
        &self,
        appenders: Vec<Box<dyn Appender>>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Result<Box<dyn Publisher>> {
        self.build_with_callback(appenders, reporter, None)
    }

    /// Like [`PublisherConfig::build`], with a callback notified of queue drops
    pub fn build_with_callback(
        &self,
        appenders: Vec<Box<dyn Appender>>,
        reporter: Arc<dyn ErrorReporter>,
        on_overflow: Option<OverflowCallback>,
    ) -> Result<Box<dyn Publisher>> {
        self.validate()?;
        let publisher: Box<dyn Publisher> = match *self {
            PublisherConfig::Direct => Box::new(DirectPublisher::new(appenders, reporter)),
            PublisherConfig::Queue {
                capacity,
                batch_size,
                overflow,
            } => {
                let mut publisher = QueuePublisher::new(capacity, appenders, reporter)?
                    .with_batch_size(batch_size)
                    .with_overflow_policy(overflow);
                if let Some(callback) = on_overflow {
                    publisher = publisher.with_overflow_callback(callback);
                }
                Box::new(publisher)
            }
            PublisherConfig::Ring { size } => Box::new(RingPublisher::new(size, appenders, reporter)?),
            PublisherConfig::Timed {
                capacity,
                interval_ms,
            } => Box::new(
                TimedPublisher::new(capacity, appenders, reporter)?
                    .with_interval(Duration::from_millis(interval_ms)),
            ),
        };
        Ok(publisher)
    }
}
