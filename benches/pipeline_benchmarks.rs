//! Criterion benchmarks for rust_log_pipeline

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rust_log_pipeline::core::{Buffer, BufferHints, ContentType, Encoder, Output};
use rust_log_pipeline::prelude::*;
use rust_log_pipeline::info;
use std::time::Duration;

/// Output that discards everything it receives
struct Sink;

impl Output for Sink {
    fn write(&mut self, _event: &Event, payload: &[u8], _content_type: ContentType) -> Result<()> {
        black_box(payload);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "sink"
    }
}

fn router(publisher: PublisherConfig, levels: &str) -> Router {
    Router::builder()
        .levels(LevelConfig::parse(levels).expect("valid directives"))
        .appender(OutputAppender::new("sink", TextEncoder::plain(), Sink))
        .publisher(publisher)
        .build()
        .expect("Failed to build router")
}

// ============================================================================
// Gating Benchmarks
// ============================================================================

fn bench_level_gating(c: &mut Criterion) {
    let mut group = c.benchmark_group("level_gating");
    group.throughput(Throughput::Elements(1));

    let router = router(
        PublisherConfig::Direct,
        "warn,app.db=debug,app.http=info,app.http.client=error",
    );

    group.bench_function("disabled_root", |b| {
        b.iter(|| black_box(router.is_enabled(black_box("other.module.deep"), Level::Debug)));
    });

    group.bench_function("disabled_prefix", |b| {
        b.iter(|| black_box(router.is_enabled(black_box("app.http.client.pool"), Level::Info)));
    });

    group.bench_function("disabled_macro", |b| {
        b.iter(|| info!(router, "app.http.client", "request {} failed", black_box(42)))
    });

    group.finish();
    router.close(DEFAULT_SHUTDOWN_TIMEOUT);
}

// ============================================================================
// Publisher Benchmarks
// ============================================================================

fn bench_publishers(c: &mut Criterion) {
    let mut group = c.benchmark_group("publishers");
    group.throughput(Throughput::Elements(1));

    for config in [
        PublisherConfig::Direct,
        PublisherConfig::queue(),
        PublisherConfig::ring(4096),
        PublisherConfig::Timed {
            capacity: 4096,
            interval_ms: 1,
        },
    ] {
        let router = router(config.clone(), "info");
        group.bench_function(config.kind(), |b| {
            b.iter(|| router.log("app.bench", Level::Info, black_box("Benchmark message")))
        });
        router.close(Duration::from_secs(30));
    }

    group.finish();
}

fn bench_concurrent_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_queue");
    let threads = 4;
    let per_thread = 1_000;
    group.throughput(Throughput::Elements((threads * per_thread) as u64));

    let router = router(PublisherConfig::queue(), "info");
    group.bench_function("4_producers", |b| {
        b.iter(|| {
            std::thread::scope(|scope| {
                for _ in 0..threads {
                    let router = &router;
                    scope.spawn(move || {
                        for i in 0..per_thread {
                            let _ = info!(router, "app.bench", "Message {}", i);
                        }
                    });
                }
            });
        });
    });

    group.finish();
    router.close(Duration::from_secs(30));
}

// ============================================================================
// Encoding Benchmarks
// ============================================================================

fn bench_encoders(c: &mut Criterion) {
    let mut group = c.benchmark_group("encoders");
    group.throughput(Throughput::Elements(1));

    let event = Event::builder("app.http", Level::Info)
        .message("Request processed")
        .attribute("status", 200)
        .attribute("path", "/api/v1/users")
        .attribute("elapsed_ms", 12.5)
        .build();

    let text = TextEncoder::plain();
    let mut text_buffer: Buffer = text.buffer(BufferHints::text());
    group.bench_function("text", |b| {
        b.iter(|| {
            text_buffer.clear();
            text.encode(black_box(&event), &mut text_buffer).ok();
            black_box(text_buffer.len())
        });
    });

    let json = JsonEncoder::new();
    let mut json_buffer = json.buffer(BufferHints::text());
    group.bench_function("json", |b| {
        b.iter(|| {
            json_buffer.clear();
            json.encode(black_box(&event), &mut json_buffer).ok();
            black_box(json_buffer.len())
        });
    });

    group.bench_function("event_build", |b| {
        b.iter(|| {
            Event::builder(black_box("app.http"), Level::Info)
                .message(black_box("Request processed"))
                .attribute("status", 200)
                .build()
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_level_gating,
    bench_publishers,
    bench_concurrent_queue,
    bench_encoders,
);
criterion_main!(benches);
