//! Human-readable single-line text encoder
//!
//! Example line:
//! `[2025-01-08T10:30:45.123Z] [INFO ] [main] app.http - Request processed status=200`

use crate::core::{Buffer, ContentType, Encoder, Event, Result, TimestampFormat};
use std::fmt::Write;

pub struct TextEncoder {
    timestamp_format: TimestampFormat,
    include_thread: bool,
    use_colors: bool,
}

impl TextEncoder {
    pub fn new() -> Self {
        Self {
            timestamp_format: TimestampFormat::default(),
            include_thread: true,
            use_colors: false,
        }
    }

    /// Encoder without colors, suitable for files and tests
    pub fn plain() -> Self {
        Self::new()
    }

    /// Set the timestamp format for this encoder
    ///
    /// # Examples
    ///
    /// ```
    /// use rust_log_pipeline::encoders::TextEncoder;
    /// use rust_log_pipeline::TimestampFormat;
    ///
    /// let encoder = TextEncoder::new()
    ///     .with_timestamp_format(TimestampFormat::Iso8601Micros);
    /// ```
    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    #[must_use]
    pub fn with_thread(mut self, include_thread: bool) -> Self {
        self.include_thread = include_thread;
        self
    }

    /// Color the level with ANSI escapes (requires the `console` feature)
    #[must_use]
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors && cfg!(feature = "console");
        self
    }

    #[cfg(feature = "console")]
    fn write_level(&self, buffer: &mut Buffer, event: &Event) -> std::fmt::Result {
        use colored::Colorize;
        if self.use_colors {
            let padded = format!("{:5}", event.level().to_str());
            write!(buffer, "{}", padded.color(event.level().color_code()))
        } else {
            write!(buffer, "{:5}", event.level().to_str())
        }
    }

    #[cfg(not(feature = "console"))]
    fn write_level(&self, buffer: &mut Buffer, event: &Event) -> std::fmt::Result {
        write!(buffer, "{:5}", event.level().to_str())
    }
}

impl Default for TextEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Escape line breaks and tabs so one event stays on one line.
///
/// Prevents log injection through forged newlines in messages or values.
fn write_escaped(buffer: &mut Buffer, text: &str) {
    let mut start = 0;
    for (idx, c) in text.char_indices() {
        let escaped = match c {
            '\n' => "\\n",
            '\r' => "\\r",
            '\t' => "\\t",
            _ => continue,
        };
        buffer.push_str(&text[start..idx]);
        buffer.push_str(escaped);
        start = idx + c.len_utf8();
    }
    buffer.push_str(&text[start..]);
}

impl Encoder for TextEncoder {
    fn encode(&self, event: &Event, buffer: &mut Buffer) -> Result<()> {
        buffer.push_str("[");
        self.timestamp_format.write_to(buffer, event.timestamp())?;
        buffer.push_str("] [");
        self.write_level(buffer, event)?;
        buffer.push_str("] ");

        if self.include_thread {
            buffer.push_str("[");
            write_escaped(buffer, event.thread_label());
            buffer.push_str("] ");
        }

        write_escaped(buffer, event.logger_name());
        buffer.push_str(" - ");
        write_escaped(buffer, event.message());

        for (key, value) in event.attributes().sorted_fields() {
            buffer.push_str(" ");
            write_escaped(buffer, key);
            buffer.push_str("=");
            write_escaped(buffer, &value.to_string());
        }

        if let Some(error) = event.error() {
            buffer.push_str(" | error: ");
            write_escaped(buffer, &error.message);
            for cause in &error.causes {
                buffer.push_str(" <- ");
                write_escaped(buffer, cause);
            }
        }

        buffer.push_str("\n");
        Ok(())
    }

    fn content_type(&self) -> ContentType {
        ContentType::TEXT
    }

    fn name(&self) -> &str {
        "text"
    }
}
