//! Stress tests for the asynchronous publishers
//!
//! These tests verify:
//! - No event is lost under the block policy with many producers
//! - Dropped events are always accounted for under the drop policy
//! - Per-producer order survives concurrent publishing
//! - Closing while producers are still logging never deadlocks

use rust_log_pipeline::core::{
    Event, Level, OutputAppender, PipelineError, Publisher, PublisherConfig, RecordingReporter,
};
use rust_log_pipeline::encoders::TextEncoder;
use rust_log_pipeline::outputs::{MemoryHandle, MemoryOutput};
use rust_log_pipeline::OverflowPolicy;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const THREADS: usize = 8;
const EVENTS_PER_THREAD: usize = 2_000;
const CLOSE_TIMEOUT: Duration = Duration::from_secs(30);

fn start(config: &PublisherConfig, output: MemoryOutput) -> (Box<dyn Publisher>, Arc<RecordingReporter>) {
    let reporter = RecordingReporter::shared();
    let appender = OutputAppender::new("memory", TextEncoder::plain(), output);
    let publisher = config
        .build(vec![Box::new(appender)], reporter.clone())
        .expect("Failed to build publisher");
    publisher.start().expect("Failed to start publisher");
    (publisher, reporter)
}

fn flood(publisher: &dyn Publisher) {
    std::thread::scope(|scope| {
        for thread in 0..THREADS {
            scope.spawn(move || {
                for i in 0..EVENTS_PER_THREAD {
                    publisher
                        .log(Event::new("stress", Level::Info, format!("t{}-{}", thread, i)))
                        .expect("log failed while running");
                }
            });
        }
    });
}

/// Check that every producer's events arrive in the order it sent them
fn assert_per_thread_order(handle: &MemoryHandle) -> usize {
    let mut next: HashMap<usize, usize> = HashMap::new();
    let mut total = 0;
    for line in handle.lines() {
        let message = line.split(" - ").nth(1).expect("message part");
        let (thread, index) = message
            .trim_start_matches('t')
            .split_once('-')
            .expect("t<thread>-<index>");
        let thread: usize = thread.parse().expect("thread number");
        let index: usize = index.parse().expect("event index");

        let expected = next.entry(thread).or_insert(0);
        assert!(
            index >= *expected,
            "thread {} went backwards: {} after {}",
            thread,
            index,
            expected
        );
        *expected = index + 1;
        total += 1;
    }
    total
}

/// Test that the block policy never loses an event on any asynchronous publisher
#[test]
fn test_block_policy_loses_nothing() {
    for config in [
        PublisherConfig::Queue {
            capacity: 64,
            batch_size: 16,
            overflow: OverflowPolicy::Block,
        },
        PublisherConfig::ring(64),
        PublisherConfig::Timed {
            capacity: 64,
            interval_ms: 1,
        },
    ] {
        let output = MemoryOutput::new();
        let handle = output.handle();
        let (publisher, reporter) = start(&config, output);

        flood(publisher.as_ref());
        assert!(publisher.close(CLOSE_TIMEOUT), "{} close timed out", config.kind());

        let total = THREADS * EVENTS_PER_THREAD;
        let metrics = publisher.status().metrics;
        assert_eq!(metrics.dropped, 0, "{}", config.kind());
        assert_eq!(metrics.accepted, total as u64, "{}", config.kind());
        assert_eq!(metrics.delivered, total as u64, "{}", config.kind());
        assert_eq!(assert_per_thread_order(&handle), total, "{}", config.kind());
        assert!(reporter.is_empty(), "{}: {:?}", config.kind(), reporter.entries());
    }
}

/// Test that every event is either delivered or counted as dropped
#[test]
fn test_drop_policy_accounts_for_every_event() {
    let output = MemoryOutput::new().with_write_delay(Duration::from_micros(50));
    let handle = output.handle();
    let overflow_calls = Arc::new(AtomicU64::new(0));

    let reporter = RecordingReporter::shared();
    let calls = overflow_calls.clone();
    let publisher = PublisherConfig::Queue {
        capacity: 8,
        batch_size: 4,
        overflow: OverflowPolicy::DropNewest,
    }
    .build_with_callback(
        vec![Box::new(OutputAppender::new("memory", TextEncoder::plain(), output))],
        reporter.clone(),
        Some(Arc::new(move |_dropped: u64| {
            calls.fetch_add(1, Ordering::Relaxed);
        })),
    )
    .expect("Failed to build publisher");
    publisher.start().expect("Failed to start publisher");

    flood(publisher.as_ref());
    assert!(publisher.close(CLOSE_TIMEOUT));

    let metrics = publisher.status().metrics;
    let total = (THREADS * EVENTS_PER_THREAD) as u64;
    assert_eq!(metrics.accepted + metrics.dropped, total);
    assert_eq!(metrics.delivered, metrics.accepted);
    assert_eq!(handle.lines().len() as u64, metrics.delivered);
    assert!(metrics.dropped > 0, "a slow output with a tiny queue must drop");
    assert!(metrics.high_water_mark <= 8);

    // Drops are reported on the first occurrence and then every 1000th
    let alerts = reporter.count_matching("events dropped") as u64;
    assert_eq!(alerts, 1 + metrics.dropped / 1000);
    assert_eq!(overflow_calls.load(Ordering::Relaxed), alerts);
    assert_per_thread_order(&handle);
}

/// Test that producers racing a close either succeed or see `Closed`
#[test]
fn test_close_while_logging() {
    for config in [
        PublisherConfig::Queue {
            capacity: 16,
            batch_size: 4,
            overflow: OverflowPolicy::Block,
        },
        PublisherConfig::ring(64),
        PublisherConfig::Timed {
            capacity: 16,
            interval_ms: 1,
        },
        PublisherConfig::Direct,
    ] {
        let output = MemoryOutput::new().with_write_delay(Duration::from_micros(20));
        let handle = output.handle();
        let (publisher, _reporter) = start(&config, output);
        let accepted = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let publisher = publisher.as_ref();
                let accepted = &accepted;
                scope.spawn(move || loop {
                    match publisher.log(Event::new("stress", Level::Info, "racing")) {
                        Ok(()) => {
                            accepted.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(PipelineError::Closed) => break,
                        Err(e) => panic!("unexpected error: {}", e),
                    }
                });
            }

            std::thread::sleep(Duration::from_millis(50));
            assert!(publisher.close(CLOSE_TIMEOUT), "{} close timed out", config.kind());
        });

        // Every accepted event reaches the output before it closes
        assert_eq!(
            handle.lines().len(),
            accepted.load(Ordering::Relaxed),
            "{}",
            config.kind()
        );
        assert!(handle.is_closed());
    }
}
