//! Console output implementation

use crate::core::{ContentType, Event, Level, Output, Result};
use std::io::Write;

pub struct ConsoleOutput {
    split_errors: bool,
}

impl ConsoleOutput {
    /// Write everything to stdout
    pub fn new() -> Self {
        Self {
            split_errors: false,
        }
    }

    /// Route Error and Fatal events to stderr, others to stdout
    pub fn with_split_errors(split_errors: bool) -> Self {
        Self { split_errors }
    }

    fn to_stderr(&self, event: &Event) -> bool {
        self.split_errors && matches!(event.level(), Level::Error | Level::Fatal)
    }
}

impl Default for ConsoleOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl Output for ConsoleOutput {
    fn write(&mut self, event: &Event, payload: &[u8], _content_type: ContentType) -> Result<()> {
        if self.to_stderr(event) {
            std::io::stderr().lock().write_all(payload)?;
        } else {
            std::io::stdout().lock().write_all(payload)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        // Flush both stdout and stderr since we may write to both
        std::io::stdout().flush()?;
        std::io::stderr().flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.flush()
    }

    fn name(&self) -> &str {
        "console"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_routing() {
        let split = ConsoleOutput::with_split_errors(true);
        assert!(split.to_stderr(&Event::new("app", Level::Fatal, "x")));
        assert!(!split.to_stderr(&Event::new("app", Level::Warn, "x")));
        assert!(!ConsoleOutput::new().to_stderr(&Event::new("app", Level::Error, "x")));
    }
}
