//! # Rust Log Pipeline
//!
//! The event pipeline of a logging engine: level-gated routing, interchangeable
//! publisher strategies and appenders that encode into reusable buffers.
//!
//! ## Features
//!
//! - **Cheap gating**: hierarchical `a.b.c` level lookup without allocation,
//!   reconfigurable at runtime
//! - **Publisher strategies**: direct, bounded queue with a worker thread,
//!   disruptor ring buffer, time-windowed buffer
//! - **Failure isolation**: appender errors and panics are reported on a
//!   side channel and never reach the logging thread
//! - **Explicit backpressure**: full queues block or drop per policy, never grow
//!
//! ## Example
//!
//! ```
//! use rust_log_pipeline::prelude::*;
//! use rust_log_pipeline::info;
//!
//! let output = MemoryOutput::new();
//! let lines = output.handle();
//!
//! let router = Router::builder()
//!     .root_level(LevelFilter::Info)
//!     .appender(OutputAppender::new("memory", TextEncoder::plain(), output))
//!     .publisher(PublisherConfig::queue())
//!     .build()
//!     .unwrap();
//!
//! info!(router, "app.http", "listening on port {}", 8080).unwrap();
//! router.close(DEFAULT_SHUTDOWN_TIMEOUT);
//!
//! assert!(lines.text().contains("listening on port 8080"));
//! ```

pub mod core;
pub mod encoders;
pub mod global;
pub mod macros;
pub mod outputs;

pub mod prelude {
    pub use crate::core::{
        Appender, ContextGuard, ErrorReporter, Event, EventBuilder, FieldValue, Level,
        LevelConfig, LevelFilter, LockedAppender, LogContext, OutputAppender, OverflowCallback,
        OverflowPolicy, PipelineConfig, PipelineError, Publisher, PublisherConfig, Result, Route,
        Router, RouterBuilder, StderrReporter, ThreadContext, TimestampFormat,
        DEFAULT_SHUTDOWN_TIMEOUT,
    };
    pub use crate::encoders::{JsonEncoder, TextEncoder};
    pub use crate::outputs::{ConsoleOutput, FileOutput, MemoryOutput};
}

pub use crate::core::{
    Appender, ContextGuard, Event, EventBuilder, FieldValue, Level, LevelConfig, LevelFilter,
    LogContext, OutputAppender, OverflowCallback, OverflowPolicy, PipelineConfig, PipelineError,
    Publisher, PublisherConfig, Result, Router, RouterBuilder, ThreadContext, TimestampFormat,
    DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use crate::encoders::{JsonEncoder, TextEncoder};
pub use crate::outputs::{ConsoleOutput, FileOutput, MemoryOutput};
