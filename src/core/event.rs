//! Immutable log events and the builder that freezes them

use super::log_context::{FieldValue, LogContext, ThreadContext};
use super::log_level::Level;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cell::RefCell;
use std::fmt::Write as _;
use std::sync::Arc;

// Thread-local caches for thread information to avoid repeated allocations
thread_local! {
    static THREAD_ID_CACHE: RefCell<Option<String>> = const { RefCell::new(None) };
    static THREAD_NAME_CACHE: RefCell<Option<Option<String>>> = const { RefCell::new(None) };
}

fn current_thread_id() -> String {
    THREAD_ID_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| format!("{:?}", std::thread::current().id()))
            .clone()
    })
}

fn current_thread_name() -> Option<String> {
    THREAD_NAME_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| std::thread::current().name().map(String::from))
            .clone()
    })
}

/// Renders a message template and its positional arguments
pub trait MessageFormatter: Send + Sync {
    fn format(&self, out: &mut String, template: &str, args: &[FieldValue]);
}

/// `{}` placeholder formatter.
///
/// `{{` and `}}` produce literal braces. Placeholders without a matching
/// argument are kept verbatim; surplus arguments are appended as `[a, b]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BraceFormatter;

impl MessageFormatter for BraceFormatter {
    fn format(&self, out: &mut String, template: &str, args: &[FieldValue]) {
        let mut args_iter = args.iter();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match (c, chars.peek()) {
                ('{', Some('{')) => {
                    chars.next();
                    out.push('{');
                }
                ('}', Some('}')) => {
                    chars.next();
                    out.push('}');
                }
                ('{', Some('}')) => {
                    chars.next();
                    match args_iter.next() {
                        Some(arg) => {
                            let _ = write!(out, "{}", arg);
                        }
                        None => out.push_str("{}"),
                    }
                }
                _ => out.push(c),
            }
        }

        let rest: Vec<String> = args_iter.map(ToString::to_string).collect();
        if !rest.is_empty() {
            let _ = write!(out, " [{}]", rest.join(", "));
        }
    }
}

/// Template and arguments an event message was rendered from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageTemplate {
    pub template: String,
    pub args: Vec<FieldValue>,
}

/// Snapshot of an error attached to an event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorInfo {
    /// Type name of the error, when known
    pub kind: Option<String>,
    pub message: String,
    /// Messages of the `source()` chain, outermost first
    pub causes: Vec<String>,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: None,
            message: message.into(),
            causes: Vec::new(),
        }
    }

    /// Capture an error and its source chain
    pub fn from_error<E>(error: &E) -> Self
    where
        E: std::error::Error + ?Sized,
    {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        Self {
            kind: Some(std::any::type_name::<E>().to_string()),
            message: error.to_string(),
            causes,
        }
    }
}

/// A frozen log occurrence.
///
/// Every field is resolved when the event is built, so it can cross thread
/// boundaries without consulting the producer's thread-local state or clock.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    timestamp: DateTime<Utc>,
    thread_name: Option<String>,
    thread_id: String,
    level: Level,
    logger_name: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    template: Option<MessageTemplate>,
    attributes: LogContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorInfo>,
}

impl Event {
    pub fn builder(logger_name: impl Into<String>, level: Level) -> EventBuilder {
        EventBuilder::new(logger_name, level)
    }

    /// Build an event with a pre-formatted message
    pub fn new(logger_name: impl Into<String>, level: Level, message: impl Into<String>) -> Self {
        EventBuilder::new(logger_name, level).message(message).build()
    }

    pub fn timestamp(&self) -> &DateTime<Utc> {
        &self.timestamp
    }

    pub fn thread_name(&self) -> Option<&str> {
        self.thread_name.as_deref()
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Thread name if the thread has one, its id otherwise
    pub fn thread_label(&self) -> &str {
        self.thread_name.as_deref().unwrap_or(&self.thread_id)
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn logger_name(&self) -> &str {
        &self.logger_name
    }

    /// The rendered message
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn template(&self) -> Option<&MessageTemplate> {
        self.template.as_ref()
    }

    pub fn attributes(&self) -> &LogContext {
        &self.attributes
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        self.error.as_ref()
    }
}

enum PendingMessage {
    Empty,
    Text(String),
    Template {
        template: String,
        args: Vec<FieldValue>,
    },
}

/// Collects event fields and freezes them in [`EventBuilder::build`].
///
/// # Example
///
/// ```
/// use rust_log_pipeline::core::{Event, Level};
///
/// let event = Event::builder("app.db", Level::Warn)
///     .template("slow query took {} ms", vec![1200.into()])
///     .attribute("table", "users")
///     .build();
///
/// assert_eq!(event.message(), "slow query took 1200 ms");
/// ```
pub struct EventBuilder {
    logger_name: String,
    level: Level,
    message: PendingMessage,
    formatter: Option<Arc<dyn MessageFormatter>>,
    timestamp: Option<DateTime<Utc>>,
    attributes: LogContext,
    error: Option<ErrorInfo>,
    thread_context: bool,
}

impl EventBuilder {
    pub fn new(logger_name: impl Into<String>, level: Level) -> Self {
        Self {
            logger_name: logger_name.into(),
            level,
            message: PendingMessage::Empty,
            formatter: None,
            timestamp: None,
            attributes: LogContext::new(),
            error: None,
            thread_context: true,
        }
    }

    /// Use a pre-formatted message
    #[must_use = "builder methods return a new value"]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = PendingMessage::Text(message.into());
        self
    }

    /// Use a template rendered at build time
    #[must_use = "builder methods return a new value"]
    pub fn template(mut self, template: impl Into<String>, args: Vec<FieldValue>) -> Self {
        self.message = PendingMessage::Template {
            template: template.into(),
            args,
        };
        self
    }

    /// Override the template formatter (default: [`BraceFormatter`])
    #[must_use = "builder methods return a new value"]
    pub fn formatter(mut self, formatter: Arc<dyn MessageFormatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Fix the timestamp instead of reading the clock at build time
    #[must_use = "builder methods return a new value"]
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn attribute<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.attributes.add_field(key, value);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn attributes(mut self, attributes: LogContext) -> Self {
        let previous = std::mem::replace(&mut self.attributes, attributes);
        self.attributes.merge_missing(previous.fields());
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn error<E>(mut self, error: &E) -> Self
    where
        E: std::error::Error + ?Sized,
    {
        self.error = Some(ErrorInfo::from_error(error));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn error_info(mut self, error: ErrorInfo) -> Self {
        self.error = Some(error);
        self
    }

    /// Skip copying the current thread's [`ThreadContext`] fields
    #[must_use = "builder methods return a new value"]
    pub fn without_thread_context(mut self) -> Self {
        self.thread_context = false;
        self
    }

    /// Freeze every lazy field and produce the immutable event
    pub fn build(self) -> Event {
        let timestamp = self.timestamp.unwrap_or_else(Utc::now);

        let (message, template) = match self.message {
            PendingMessage::Empty => (String::new(), None),
            PendingMessage::Text(text) => (text, None),
            PendingMessage::Template { template, args } => {
                let mut rendered = String::with_capacity(template.len() + 16 * args.len());
                match self.formatter {
                    Some(ref formatter) => formatter.format(&mut rendered, &template, &args),
                    None => BraceFormatter.format(&mut rendered, &template, &args),
                }
                (rendered, Some(MessageTemplate { template, args }))
            }
        };

        let mut attributes = self.attributes;
        if self.thread_context {
            ThreadContext::merge_into(&mut attributes);
        }

        Event {
            timestamp,
            thread_name: current_thread_name(),
            thread_id: current_thread_id(),
            level: self.level,
            logger_name: self.logger_name,
            message,
            template,
            attributes,
            error: self.error,
        }
    }
}
