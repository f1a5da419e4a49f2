//! Core pipeline types and traits

pub mod appender;
pub mod encoder;
pub mod error;
pub mod event;
pub mod level_resolver;
pub mod log_context;
pub mod log_level;
pub mod meta_error;
pub mod metrics;
pub mod output;
pub mod overflow_policy;
pub mod publisher;
pub mod router;
pub mod timestamp;

pub use appender::{Appender, LockedAppender, OutputAppender};
pub use encoder::{Buffer, BufferHints, BufferKind, ContentType, Encoder};
pub use error::{PipelineError, Result};
pub use event::{BraceFormatter, ErrorInfo, Event, EventBuilder, MessageFormatter, MessageTemplate};
pub use level_resolver::{LevelConfig, LevelResolver};
pub use log_context::{ContextGuard, FieldValue, LogContext, ThreadContext};
pub use log_level::{Level, LevelFilter};
pub use meta_error::{ErrorReporter, RecordingReporter, StderrReporter};
pub use metrics::{MetricsSnapshot, PublisherMetrics, PublisherState, PublisherStatus};
pub use output::{Output, OutputStatus};
pub use overflow_policy::{OverflowCallback, OverflowPolicy};
pub use publisher::{
    DirectPublisher, Publisher, PublisherConfig, QueuePublisher, RingPublisher, ShutdownToken,
    TimedPublisher, DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use router::{PipelineConfig, Route, Router, RouterBuilder, RouterStatus};
pub use timestamp::TimestampFormat;
