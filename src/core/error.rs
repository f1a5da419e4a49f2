//! Error types for the event pipeline

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Formatting into a buffer failed
    #[error("Format error: {0}")]
    Format(#[from] std::fmt::Error),

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// `log` was called before the publisher was started
    #[error("Publisher has not been started")]
    NotStarted,

    /// `start` was called twice
    #[error("Publisher already started")]
    AlreadyStarted,

    /// `log` was called after the publisher was closed
    #[error("Publisher already closed")]
    Closed,

    /// Appender used after close
    #[error("Appender '{appender}' is closed")]
    AppenderClosed { appender: String },

    /// Queue full with buffer details
    #[error("Event queue full: {current}/{max} events buffered")]
    QueueFull { current: usize, max: usize },

    /// Encoder failure
    #[error("Encoder error ({encoder}): {message}")]
    Encoder { encoder: String, message: String },

    /// Appender panicked while handling an event
    #[error("Appender '{appender}' panicked: {message}")]
    AppenderPanic { appender: String, message: String },

    /// Worker thread lost its queue without a shutdown request
    #[error("Worker of {publisher} publisher stopped unexpectedly")]
    WorkerStopped { publisher: String },

    /// Unparseable level name
    #[error("Invalid log level: '{0}'")]
    InvalidLevel(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl PipelineError {
    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        PipelineError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create a queue full error with buffer details
    pub fn queue_full(current: usize, max: usize) -> Self {
        PipelineError::QueueFull { current, max }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create an appender closed error
    pub fn appender_closed(appender: impl Into<String>) -> Self {
        PipelineError::AppenderClosed {
            appender: appender.into(),
        }
    }

    /// Create an encoder error
    pub fn encoder(encoder: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::Encoder {
            encoder: encoder.into(),
            message: message.into(),
        }
    }

    /// Create an appender panic error
    pub fn appender_panic(appender: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::AppenderPanic {
            appender: appender.into(),
            message: message.into(),
        }
    }

    /// Create a worker stopped error
    pub fn worker_stopped(publisher: impl Into<String>) -> Self {
        PipelineError::WorkerStopped {
            publisher: publisher.into(),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        PipelineError::Other(msg.into())
    }

    /// Whether this error is a lifecycle misuse rather than a delivery failure
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            PipelineError::NotStarted | PipelineError::AlreadyStarted | PipelineError::Closed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = PipelineError::queue_full(10, 10);
        assert!(matches!(err, PipelineError::QueueFull { .. }));

        let err = PipelineError::config("RingPublisher", "size must be a power of two");
        assert!(matches!(err, PipelineError::InvalidConfiguration { .. }));

        let err = PipelineError::appender_closed("memory");
        assert!(matches!(err, PipelineError::AppenderClosed { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = PipelineError::queue_full(100, 1000);
        assert_eq!(err.to_string(), "Event queue full: 100/1000 events buffered");

        let err = PipelineError::encoder("json", "non-finite float");
        assert_eq!(err.to_string(), "Encoder error (json): non-finite float");

        let err = PipelineError::appender_panic("file", "disk on fire");
        assert_eq!(err.to_string(), "Appender 'file' panicked: disk on fire");
    }

    #[test]
    fn test_io_operation_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = PipelineError::io_operation("reopening log file", "cannot open", io_err);

        assert!(matches!(err, PipelineError::IoOperation { .. }));
        assert!(err.to_string().contains("reopening log file"));
        assert!(err.to_string().contains("cannot open"));
    }

    #[test]
    fn test_lifecycle_classification() {
        assert!(PipelineError::NotStarted.is_lifecycle());
        assert!(PipelineError::Closed.is_lifecycle());
        assert!(!PipelineError::other("boom").is_lifecycle());
    }
}
