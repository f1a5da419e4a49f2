//! Ring-buffer publisher on top of the `disruptor` crate

use super::{
    join_with_timeout, spawn_worker, Delivery, Lifecycle, Publisher, DEFAULT_SHUTDOWN_TIMEOUT,
};
use crate::core::appender::Appender;
use crate::core::error::{PipelineError, Result};
use crate::core::event::Event;
use crate::core::meta_error::ErrorReporter;
use crate::core::metrics::{PublisherMetrics, PublisherState, PublisherStatus};
use disruptor::*;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const COMPONENT: &str = "ring";

/// Ring slot; overwritten in place as sequences wrap around
type Slot = Option<Arc<Event>>;

/// Publishes one event, returning false while the ring is full
type PublishFn = Box<dyn Fn(&Arc<Event>) -> bool + Send + Sync>;

/// Backoff steps before a full-ring producer starts sleeping
const SPIN_LIMIT: u32 = 64;
const YIELD_LIMIT: u32 = 128;
const FULL_RING_SLEEP: Duration = Duration::from_micros(50);

/// Smallest ring the multi-producer disruptor accepts
pub const MIN_RING_SIZE: usize = 64;

pub(crate) fn validate_size(size: usize) -> Result<()> {
    if size < MIN_RING_SIZE || !size.is_power_of_two() {
        return Err(PipelineError::config(
            "ring publisher",
            format!(
                "size must be a power of two of at least {}, got {}",
                MIN_RING_SIZE, size
            ),
        ));
    }
    Ok(())
}

/// Publishes through a fixed-size multi-producer ring buffer.
///
/// A producer claims a sequence, stores the event in its slot and publishes
/// it; consumers only see the slot after publication. Every appender gets
/// its own consumer thread, so a slow appender delays only itself until the
/// ring fills. A full ring makes producers back off (spin, yield, sleep)
/// until a slot frees. Events are dropped only if the publisher closes
/// while a producer is still waiting.
pub struct RingPublisher {
    lifecycle: Lifecycle,
    size: usize,
    reporter: Arc<dyn ErrorReporter>,
    metrics: Arc<PublisherMetrics>,
    appender_count: usize,
    pending: Mutex<Option<Vec<Box<dyn Appender>>>>,
    publish: RwLock<Option<PublishFn>>,
    published: AtomicU64,
    // Events handed to each consumer's handler, one counter per appender
    consumed: Arc<[AtomicU64]>,
}

impl RingPublisher {
    pub fn new(
        size: usize,
        appenders: Vec<Box<dyn Appender>>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Result<Self> {
        validate_size(size)?;
        Ok(Self {
            lifecycle: Lifecycle::new(),
            size,
            reporter,
            metrics: Arc::new(PublisherMetrics::new()),
            appender_count: appenders.len(),
            consumed: appenders.iter().map(|_| AtomicU64::new(0)).collect(),
            pending: Mutex::new(Some(appenders)),
            publish: RwLock::new(None),
            published: AtomicU64::new(0),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn metrics(&self) -> &PublisherMetrics {
        &self.metrics
    }

    /// Published events not yet taken by the slowest consumer
    pub fn queue_depth(&self) -> usize {
        let published = self.published.load(Ordering::Acquire);
        let slowest = self
            .consumed
            .iter()
            .map(|c| c.load(Ordering::Acquire))
            .min()
            .unwrap_or(published);
        published.saturating_sub(slowest) as usize
    }

    fn consumer(&self, index: usize, appender: Box<dyn Appender>) -> RingConsumer {
        RingConsumer {
            batch: Vec::new(),
            max_batch: self.size,
            consumed: Arc::clone(&self.consumed),
            index,
            delivery: Delivery::new(
                COMPONENT,
                vec![appender],
                Arc::clone(&self.reporter),
                Arc::clone(&self.metrics),
            ),
        }
    }

    fn build_ring(&self, appenders: Vec<Box<dyn Appender>>) -> PublishFn {
        let mut handlers = appenders
            .into_iter()
            .enumerate()
            .map(|(index, appender)| event_handler(self.consumer(index, appender)));

        let builder = build_multi_producer(self.size, || None::<Arc<Event>>, BusySpinWithSpinLoopHint);
        match handlers.next() {
            // No appenders: events are published and discarded
            None => publish_fn(builder.handle_events_with(|_: &Slot, _: Sequence, _: bool| {}).build()),
            Some(first) => {
                let builder = builder.handle_events_with(first);
                match handlers.next() {
                    None => publish_fn(builder.build()),
                    Some(second) => {
                        let mut builder = builder.handle_events_with(second);
                        for handler in handlers {
                            builder = builder.handle_events_with(handler);
                        }
                        publish_fn(builder.build())
                    }
                }
            }
        }
    }

    fn backoff(attempt: u32) {
        if attempt < SPIN_LIMIT {
            std::hint::spin_loop();
        } else if attempt < YIELD_LIMIT {
            std::thread::yield_now();
        } else {
            std::thread::sleep(FULL_RING_SLEEP);
        }
    }
}

fn publish_fn<P>(producer: P) -> PublishFn
where
    P: Producer<Slot> + Clone + Send + Sync + 'static,
{
    Box::new(move |event: &Arc<Event>| {
        let mut producer = producer.clone();
        let event = Arc::clone(event);
        producer
            .try_publish(move |slot| {
                *slot = Some(event);
            })
            .is_ok()
    })
}

fn event_handler(mut consumer: RingConsumer) -> impl FnMut(&Slot, Sequence, bool) + Send + 'static {
    move |slot: &Slot, _sequence: Sequence, end_of_batch: bool| {
        consumer.on_event(slot, end_of_batch);
    }
}

/// State owned by one consumer thread
struct RingConsumer {
    batch: Vec<Arc<Event>>,
    max_batch: usize,
    consumed: Arc<[AtomicU64]>,
    index: usize,
    delivery: Delivery,
}

impl RingConsumer {
    fn on_event(&mut self, slot: &Slot, end_of_batch: bool) {
        if let Some(event) = slot {
            self.batch.push(Arc::clone(event));
        }
        self.consumed[self.index].fetch_add(1, Ordering::Release);

        if end_of_batch || self.batch.len() >= self.max_batch {
            self.flush_batch();
        }
    }

    fn flush_batch(&mut self) {
        if !self.batch.is_empty() {
            self.delivery.deliver(&self.batch);
            self.batch.clear();
        }
    }
}

impl Drop for RingConsumer {
    // Runs on the consumer thread once the ring has shut down
    fn drop(&mut self) {
        self.flush_batch();
        self.delivery.close();
    }
}

impl Publisher for RingPublisher {
    fn start(&self) -> Result<()> {
        self.lifecycle.start()?;
        let appenders = self
            .pending
            .lock()
            .take()
            .ok_or(PipelineError::AlreadyStarted)?;
        *self.publish.write() = Some(self.build_ring(appenders));
        Ok(())
    }

    fn log(&self, event: Event) -> Result<()> {
        self.lifecycle.ensure_running()?;
        let guard = self.publish.read();
        let publish = guard.as_ref().ok_or(PipelineError::Closed)?;

        let event = Arc::new(event);
        let mut attempt = 0;
        while !publish(&event) {
            if attempt == 0 {
                self.metrics.record_queue_full();
                self.metrics.record_block();
            }
            if self.lifecycle.is_closed() {
                self.metrics.record_dropped();
                return Err(PipelineError::Closed);
            }
            Self::backoff(attempt);
            attempt = attempt.saturating_add(1);
        }

        self.published.fetch_add(1, Ordering::Release);
        self.metrics.record_accepted();
        self.metrics.observe_depth(self.queue_depth());
        Ok(())
    }

    fn close(&self, timeout: Duration) -> bool {
        match self.lifecycle.close() {
            PublisherState::Closed => return true,
            PublisherState::Created => {
                if let Some(mut appenders) = self.pending.lock().take() {
                    super::close_appenders(COMPONENT, &mut appenders, &*self.reporter);
                }
                return true;
            }
            PublisherState::Running => {}
        }

        let publish = match self.publish.write().take() {
            Some(publish) => publish,
            None => return true,
        };

        // Dropping the last producer drains every published sequence and
        // joins the consumers, so do it where the wait can be bounded
        match spawn_worker("log-ring-shutdown", move || drop(publish)) {
            Ok(handle) => join_with_timeout(handle, timeout, COMPONENT, &*self.reporter),
            Err(e) => {
                self.reporter.report(COMPONENT, &e);
                false
            }
        }
    }

    fn status(&self) -> PublisherStatus {
        PublisherStatus {
            kind: self.kind(),
            state: self.lifecycle.state(),
            queue_depth: self.queue_depth(),
            capacity: self.size,
            appenders: self.appender_count,
            metrics: self.metrics.snapshot(),
        }
    }

    fn kind(&self) -> &'static str {
        COMPONENT
    }
}

impl Drop for RingPublisher {
    fn drop(&mut self) {
        self.close(DEFAULT_SHUTDOWN_TIMEOUT);
    }
}
