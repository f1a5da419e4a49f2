//! Logging macros for ergonomic log message formatting.
//!
//! The message is only formatted when the logger name is enabled at the
//! level, so disabled calls cost a level lookup and nothing else. Every
//! macro evaluates to the `Result<()>` of the publish.
//!
//! # Examples
//!
//! ```
//! use rust_log_pipeline::prelude::*;
//! use rust_log_pipeline::{info, warn};
//!
//! let router = Router::builder().appender(
//!     OutputAppender::new("memory", TextEncoder::plain(), MemoryOutput::new()),
//! ).build().unwrap();
//!
//! // Basic logging
//! info!(router, "app", "Server started").unwrap();
//!
//! // With format arguments
//! let port = 8080;
//! warn!(router, "app.net", "Port {} already in use", port).unwrap();
//! ```

/// Log a message with automatic formatting.
///
/// # Examples
///
/// ```
/// # use rust_log_pipeline::prelude::*;
/// # let router = Router::builder().build().unwrap();
/// use rust_log_pipeline::log;
/// log!(router, "app", Level::Info, "Simple message").unwrap();
/// log!(router, "app", Level::Error, "Error code: {}", 500).unwrap();
/// ```
#[macro_export]
macro_rules! log {
    ($router:expr, $name:expr, $level:expr, $($arg:tt)+) => {{
        let route = $router.route($name, $level);
        if route.is_enabled() {
            route.log_message(format!($($arg)+))
        } else {
            Ok(())
        }
    }};
}

/// Log a trace-level message.
#[macro_export]
macro_rules! trace {
    ($router:expr, $name:expr, $($arg:tt)+) => {
        $crate::log!($router, $name, $crate::Level::Trace, $($arg)+)
    };
}

/// Log a debug-level message.
#[macro_export]
macro_rules! debug {
    ($router:expr, $name:expr, $($arg:tt)+) => {
        $crate::log!($router, $name, $crate::Level::Debug, $($arg)+)
    };
}

/// Log an info-level message.
///
/// # Examples
///
/// ```
/// # use rust_log_pipeline::prelude::*;
/// # let router = Router::builder().build().unwrap();
/// use rust_log_pipeline::info;
/// info!(router, "app", "Processing {} items", 100).unwrap();
/// ```
#[macro_export]
macro_rules! info {
    ($router:expr, $name:expr, $($arg:tt)+) => {
        $crate::log!($router, $name, $crate::Level::Info, $($arg)+)
    };
}

/// Log a warning-level message.
#[macro_export]
macro_rules! warn {
    ($router:expr, $name:expr, $($arg:tt)+) => {
        $crate::log!($router, $name, $crate::Level::Warn, $($arg)+)
    };
}

/// Log an error-level message.
///
/// # Examples
///
/// ```
/// # use rust_log_pipeline::prelude::*;
/// # let router = Router::builder().build().unwrap();
/// use rust_log_pipeline::error;
/// error!(router, "app.db", "Error code: {}, message: {}", 500, "Internal error").unwrap();
/// ```
#[macro_export]
macro_rules! error {
    ($router:expr, $name:expr, $($arg:tt)+) => {
        $crate::log!($router, $name, $crate::Level::Error, $($arg)+)
    };
}

/// Log a fatal-level message.
#[macro_export]
macro_rules! fatal {
    ($router:expr, $name:expr, $($arg:tt)+) => {
        $crate::log!($router, $name, $crate::Level::Fatal, $($arg)+)
    };
}

#[cfg(test)]
mod tests {
    use crate::core::{Level, LevelFilter, OutputAppender, Router};
    use crate::encoders::TextEncoder;
    use crate::outputs::{MemoryHandle, MemoryOutput};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn router(root: LevelFilter) -> (Router, MemoryHandle) {
        let output = MemoryOutput::new();
        let handle = output.handle();
        let router = Router::builder()
            .root_level(root)
            .appender(OutputAppender::new("memory", TextEncoder::plain(), output))
            .build()
            .unwrap();
        (router, handle)
    }

    #[test]
    fn test_log_macro() {
        let (router, handle) = router(LevelFilter::Info);
        log!(router, "app", Level::Info, "Test message").unwrap();
        log!(router, "app", Level::Info, "Formatted: {}", 42).unwrap();

        let lines = handle.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].ends_with("app - Formatted: 42"));
    }

    #[test]
    fn test_level_macros() {
        let (router, handle) = router(LevelFilter::All);
        trace!(router, "app", "Value: {}", 10).unwrap();
        debug!(router, "app", "Count: {}", 5).unwrap();
        info!(router, "app", "Items: {}", 100).unwrap();
        warn!(router, "app", "Retry {} of {}", 1, 3).unwrap();
        error!(router, "app", "Code: {}", 500).unwrap();
        fatal!(router, "app", "Critical failure: {}", "system").unwrap();

        let lines = handle.lines();
        assert_eq!(lines.len(), 6);
        assert!(lines[0].contains("[TRACE]"));
        assert!(lines[5].contains("[FATAL]"));
    }

    #[test]
    fn test_disabled_level_skips_formatting() {
        struct Counted<'a>(&'a AtomicUsize);

        impl std::fmt::Display for Counted<'_> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fetch_add(1, Ordering::Relaxed);
                write!(f, "counted")
            }
        }

        let formatted = AtomicUsize::new(0);
        let (router, handle) = router(LevelFilter::Warn);
        debug!(router, "app", "{}", Counted(&formatted)).unwrap();
        assert_eq!(formatted.load(Ordering::Relaxed), 0);

        warn!(router, "app", "{}", Counted(&formatted)).unwrap();
        assert_eq!(formatted.load(Ordering::Relaxed), 1);
        assert_eq!(handle.lines().len(), 1);
    }
}
