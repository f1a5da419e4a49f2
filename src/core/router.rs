//! Level-gated entry point of the pipeline
//!
//! The [`Router`] answers "is this logger enabled at this level?" without
//! allocating, and hands frozen events to the configured publisher.

use super::appender::Appender;
use super::error::Result;
use super::event::{Event, EventBuilder};
use super::level_resolver::{LevelConfig, LevelResolver};
use super::log_level::{Level, LevelFilter};
use super::meta_error::{ErrorReporter, StderrReporter};
use super::metrics::PublisherStatus;
use super::overflow_policy::OverflowCallback;
use super::publisher::{Publisher, PublisherConfig, DEFAULT_SHUTDOWN_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Routes events from application code to a publisher
///
/// # Example
///
/// ```
/// use rust_log_pipeline::core::{Level, LevelFilter, OutputAppender, PublisherConfig, Router};
/// use rust_log_pipeline::encoders::TextEncoder;
/// use rust_log_pipeline::outputs::MemoryOutput;
///
/// let output = MemoryOutput::new();
/// let handle = output.handle();
///
/// let router = Router::builder()
///     .root_level(LevelFilter::Warn)
///     .level("app.db", LevelFilter::Debug)
///     .appender(OutputAppender::new("memory", TextEncoder::plain(), output))
///     .publisher(PublisherConfig::queue())
///     .build()
///     .unwrap();
///
/// assert!(router.is_enabled("app.db.pool", Level::Debug));
/// assert!(!router.is_enabled("app.web", Level::Info));
///
/// router.log("app.db.pool", Level::Debug, "connection acquired").unwrap();
/// router.log("app.web", Level::Info, "filtered out").unwrap();
/// assert!(router.close(std::time::Duration::from_secs(5)));
///
/// assert_eq!(handle.lines().len(), 1);
/// ```
pub struct Router {
    resolver: Arc<LevelResolver>,
    publisher: Box<dyn Publisher>,
    reporter: Arc<dyn ErrorReporter>,
    shutdown_timeout: Duration,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Whether `name` logs at `level`; never allocates
    #[inline]
    pub fn is_enabled(&self, name: &str, level: Level) -> bool {
        self.resolver.is_enabled(name, level)
    }

    /// Level-gated handle for one logger name and level.
    ///
    /// The enabled check runs once, here. Logging through a disabled route
    /// silently discards the event.
    pub fn route<'a>(&'a self, name: &'a str, level: Level) -> Route<'a> {
        Route {
            router: self,
            name,
            level,
            enabled: self.is_enabled(name, level),
        }
    }

    /// Log a plain message if `name` is enabled at `level`
    pub fn log(&self, name: &str, level: Level, message: impl Into<String>) -> Result<()> {
        self.route(name, level).log_message(message)
    }

    /// Gate a prebuilt event on its own logger name and level, then publish it
    pub fn log_event(&self, event: Event) -> Result<()> {
        if self.is_enabled(event.logger_name(), event.level()) {
            self.publisher.log(event)
        } else {
            Ok(())
        }
    }

    /// Shared resolver for live level changes
    pub fn resolver(&self) -> &Arc<LevelResolver> {
        &self.resolver
    }

    pub fn error_reporter(&self) -> &Arc<dyn ErrorReporter> {
        &self.reporter
    }

    pub fn publisher_kind(&self) -> &'static str {
        self.publisher.kind()
    }

    pub fn status(&self) -> RouterStatus {
        RouterStatus {
            root_level: self.resolver.root_level(),
            generation: self.resolver.generation(),
            publisher: self.publisher.status(),
        }
    }

    /// Close the publisher, waiting at most `timeout` for buffered events
    pub fn close(&self, timeout: Duration) -> bool {
        self.publisher.close(timeout)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }
}

impl Drop for Router {
    fn drop(&mut self) {
        if !self.publisher.close(self.shutdown_timeout) {
            self.reporter.warn(
                "router",
                &format!(
                    "publisher did not shut down within {:?}, some events may be lost",
                    self.shutdown_timeout
                ),
            );
        }

        // Report any dropped events
        let metrics = self.publisher.status().metrics;
        if metrics.dropped > 0 {
            self.reporter.warn(
                "router",
                &format!("shutting down with {} dropped events", metrics.dropped),
            );
        }
    }
}

/// A router bound to one logger name and level
pub struct Route<'a> {
    router: &'a Router,
    name: &'a str,
    level: Level,
    enabled: bool,
}

impl<'a> Route<'a> {
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn level(&self) -> Level {
        self.level
    }

    /// Publish `event` if this route is enabled
    pub fn log(&self, event: Event) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        self.router.publisher.log(event)
    }

    pub fn log_message(&self, message: impl Into<String>) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        self.log(Event::builder(self.name, self.level).message(message).build())
    }

    /// Builder prefilled with this route's name and level
    pub fn event(&self) -> EventBuilder {
        Event::builder(self.name, self.level)
    }
}

/// Snapshot of router state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouterStatus {
    pub root_level: LevelFilter,
    /// Resolver generation; changes whenever levels are reconfigured
    pub generation: u64,
    pub publisher: PublisherStatus,
}

fn default_shutdown_timeout_ms() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT.as_millis() as u64
}

/// Serializable pipeline settings: levels, publisher strategy, shutdown wait
///
/// # Example
///
/// ```
/// use rust_log_pipeline::core::{LevelFilter, PipelineConfig};
///
/// let config = PipelineConfig::from_json(r#"{
///     "levels": {"root": "warn", "levels": {"app.db": "debug"}},
///     "publisher": {"type": "ring", "size": 1024}
/// }"#).unwrap();
///
/// assert_eq!(config.levels.root, LevelFilter::Warn);
/// assert_eq!(config.publisher.kind(), "ring");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub levels: LevelConfig,
    #[serde(default)]
    pub publisher: PublisherConfig,
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            levels: LevelConfig::default(),
            publisher: PublisherConfig::default(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.levels.validate()?;
        self.publisher.validate()
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

/// Builder for constructing a [`Router`] with a fluent API
pub struct RouterBuilder {
    levels: LevelConfig,
    publisher: PublisherConfig,
    appenders: Vec<Box<dyn Appender>>,
    reporter: Option<Arc<dyn ErrorReporter>>,
    on_overflow: Option<OverflowCallback>,
    shutdown_timeout: Duration,
}

impl RouterBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            levels: LevelConfig::default(),
            publisher: PublisherConfig::default(),
            appenders: Vec::new(),
            reporter: None,
            on_overflow: None,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn root_level(mut self, filter: LevelFilter) -> Self {
        self.levels.root = filter;
        self
    }

    /// Threshold for a logger-name prefix
    #[must_use = "builder methods return a new value"]
    pub fn level(mut self, prefix: impl Into<String>, filter: LevelFilter) -> Self {
        self.levels.levels.insert(prefix.into(), filter);
        self
    }

    /// Replace the whole level configuration
    #[must_use = "builder methods return a new value"]
    pub fn levels(mut self, levels: LevelConfig) -> Self {
        self.levels = levels;
        self
    }

    /// Add an appender
    #[must_use = "builder methods return a new value"]
    pub fn appender<A: Appender + 'static>(mut self, appender: A) -> Self {
        self.appenders.push(Box::new(appender));
        self
    }

    /// Choose the publisher strategy (default: direct)
    #[must_use = "builder methods return a new value"]
    pub fn publisher(mut self, publisher: PublisherConfig) -> Self {
        self.publisher = publisher;
        self
    }

    /// Where pipeline failures are reported (default: stderr)
    #[must_use = "builder methods return a new value"]
    pub fn error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Callback for queue overflow drops
    #[must_use = "builder methods return a new value"]
    pub fn on_overflow(mut self, callback: OverflowCallback) -> Self {
        self.on_overflow = Some(callback);
        self
    }

    /// How long dropping the router waits for buffered events
    #[must_use = "builder methods return a new value"]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Apply levels, publisher and shutdown timeout from a config value
    #[must_use = "builder methods return a new value"]
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.shutdown_timeout = config.shutdown_timeout();
        self.levels = config.levels;
        self.publisher = config.publisher;
        self
    }

    /// Validate, construct and start the publisher
    pub fn build(self) -> Result<Router> {
        self.levels.validate()?;
        let reporter = self
            .reporter
            .unwrap_or_else(|| Arc::new(StderrReporter) as Arc<dyn ErrorReporter>);

        let publisher = self.publisher.build_with_callback(
            self.appenders,
            Arc::clone(&reporter),
            self.on_overflow,
        )?;
        publisher.start()?;

        Ok(Router {
            resolver: Arc::new(LevelResolver::from_config(&self.levels)),
            publisher,
            reporter,
            shutdown_timeout: self.shutdown_timeout,
        })
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("publisher", &self.publisher.kind())
            .field("root_level", &self.resolver.root_level())
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{OutputAppender, PipelineError, PublisherState, RecordingReporter};
    use crate::encoders::TextEncoder;
    use crate::outputs::{MemoryHandle, MemoryOutput};

    fn router_with(publisher: PublisherConfig) -> (Router, MemoryHandle) {
        let output = MemoryOutput::new();
        let handle = output.handle();
        let router = Router::builder()
            .root_level(LevelFilter::Info)
            .level("app.db", LevelFilter::Debug)
            .level("noisy", LevelFilter::Off)
            .appender(OutputAppender::new("memory", TextEncoder::plain(), output))
            .publisher(publisher)
            .error_reporter(RecordingReporter::shared())
            .build()
            .unwrap();
        (router, handle)
    }

    #[test]
    fn test_gating() {
        let (router, handle) = router_with(PublisherConfig::Direct);

        assert!(router.is_enabled("app.db.pool", Level::Debug));
        assert!(!router.is_enabled("app.web", Level::Debug));
        assert!(!router.is_enabled("noisy.child", Level::Fatal));

        router.log("app.db.pool", Level::Debug, "kept").unwrap();
        router.log("app.web", Level::Debug, "dropped").unwrap();
        router.log("noisy", Level::Error, "dropped").unwrap();

        assert_eq!(handle.lines().len(), 1);
        assert!(handle.text().contains("kept"));
    }

    #[test]
    fn test_route_builds_prefilled_events() {
        let (router, handle) = router_with(PublisherConfig::Direct);
        let route = router.route("app.db", Level::Warn);
        assert!(route.is_enabled());
        route
            .log(route.event().template("took {} ms", vec![12.into()]).build())
            .unwrap();

        let disabled = router.route("app.web", Level::Trace);
        assert!(!disabled.is_enabled());
        disabled.log_message("never").unwrap();

        let lines = handle.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("[WARN ]"));
        assert!(lines[0].ends_with("app.db - took 12 ms"));
    }

    #[test]
    fn test_live_reconfiguration() {
        let (router, handle) = router_with(PublisherConfig::Direct);
        let generation = router.status().generation;

        router.log("app.web", Level::Debug, "before").unwrap();
        router
            .resolver()
            .set_level("app.web", LevelFilter::Debug)
            .unwrap();
        router.log("app.web", Level::Debug, "after").unwrap();

        assert_eq!(handle.lines().len(), 1);
        assert!(router.status().generation > generation);
    }

    #[test]
    fn test_log_event_uses_event_level() {
        let (router, handle) = router_with(PublisherConfig::Direct);
        router
            .log_event(Event::new("app", Level::Debug, "filtered"))
            .unwrap();
        router
            .log_event(Event::new("app", Level::Error, "kept"))
            .unwrap();
        assert_eq!(handle.lines().len(), 1);
    }

    #[test]
    fn test_close_and_status() {
        let (router, handle) = router_with(PublisherConfig::queue());
        router.log("app", Level::Info, "queued").unwrap();
        assert!(router.close(Duration::from_secs(5)));

        let status = router.status();
        assert_eq!(status.publisher.kind, "queue");
        assert_eq!(status.publisher.state, PublisherState::Closed);
        assert_eq!(status.root_level, LevelFilter::Info);
        assert!(matches!(
            router.log("app", Level::Info, "late"),
            Err(PipelineError::Closed)
        ));
        assert_eq!(handle.lines().len(), 1);
    }

    #[test]
    fn test_build_rejects_bad_config() {
        let result = Router::builder().publisher(PublisherConfig::ring(12)).build();
        assert!(matches!(result, Err(PipelineError::InvalidConfiguration { .. })));

        let result = Router::builder().level("app.", LevelFilter::Debug).build();
        assert!(matches!(result, Err(PipelineError::InvalidConfiguration { .. })));
    }

    #[test]
    fn test_pipeline_config_from_json() {
        let config = PipelineConfig::from_json(
            r#"{"levels": {"root": "debug"}, "publisher": {"type": "timed", "interval_ms": 2}, "shutdown_timeout_ms": 250}"#,
        )
        .unwrap();
        assert_eq!(config.shutdown_timeout(), Duration::from_millis(250));

        let router = Router::builder().config(config).build().unwrap();
        assert_eq!(router.publisher_kind(), "timed");
        assert_eq!(router.shutdown_timeout(), Duration::from_millis(250));
        assert!(router.is_enabled("anything", Level::Debug));

        assert!(PipelineConfig::from_json(r#"{"publisher": {"type": "queue", "capacity": 0}}"#).is_err());
        assert!(PipelineConfig::from_json("not json").is_err());
    }
}
