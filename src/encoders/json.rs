//! JSON-lines encoder for structured logging
//!
//! Writes each event as a single-line JSON object, compatible with log
//! aggregation tools like ELK and Loki.

use crate::core::{
    Buffer, ContentType, Encoder, ErrorInfo, Event, FieldValue, Result, TimestampFormat,
};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// JSON encoder
///
/// Example line:
/// `{"timestamp":"2025-01-08T10:30:45.123Z","level":"INFO","logger":"app","message":"ready",...}`
pub struct JsonEncoder {
    timestamp_format: TimestampFormat,
    include_template: bool,
}

impl JsonEncoder {
    pub fn new() -> Self {
        Self {
            timestamp_format: TimestampFormat::default(),
            include_template: false,
        }
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    /// Also emit the raw message template and its arguments
    #[must_use]
    pub fn with_template(mut self, include_template: bool) -> Self {
        self.include_template = include_template;
        self
    }

    fn line<'a>(&'a self, event: &'a Event) -> JsonLine<'a> {
        let template = event.template().filter(|_| self.include_template);
        let attributes = event.attributes();

        JsonLine {
            timestamp: JsonTimestamp {
                format: &self.timestamp_format,
                datetime: event.timestamp(),
            },
            level: event.level().to_str(),
            logger: event.logger_name(),
            message: event.message(),
            thread_id: event.thread_id(),
            thread_name: event.thread_name(),
            template: template.map(|t| t.template.as_str()),
            args: template.map(|t| t.args.as_slice()),
            attributes: (!attributes.is_empty()).then(|| attributes.fields()),
            error: event.error().map(JsonError::from),
        }
    }
}

impl Default for JsonEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Borrowed view of one event, serialized straight into the buffer
#[derive(Serialize)]
struct JsonLine<'a> {
    timestamp: JsonTimestamp<'a>,
    level: &'a str,
    logger: &'a str,
    message: &'a str,
    thread_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    template: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    args: Option<&'a [FieldValue]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attributes: Option<&'a HashMap<String, FieldValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonError<'a>>,
}

#[derive(Serialize)]
struct JsonError<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'a str>,
    message: &'a str,
    #[serde(skip_serializing_if = "no_causes")]
    causes: &'a [String],
}

fn no_causes(causes: &&[String]) -> bool {
    causes.is_empty()
}

impl<'a> From<&'a ErrorInfo> for JsonError<'a> {
    fn from(error: &'a ErrorInfo) -> Self {
        Self {
            kind: error.kind.as_deref(),
            message: &error.message,
            causes: &error.causes,
        }
    }
}

/// Unix formats become numbers, everything else a string
struct JsonTimestamp<'a> {
    format: &'a TimestampFormat,
    datetime: &'a DateTime<Utc>,
}

impl fmt::Display for JsonTimestamp<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.format.write_to(f, self.datetime)
    }
}

impl Serialize for JsonTimestamp<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.format {
            TimestampFormat::Unix => serializer.serialize_i64(self.datetime.timestamp()),
            TimestampFormat::UnixMillis => serializer.serialize_i64(self.datetime.timestamp_millis()),
            TimestampFormat::UnixMicros => serializer.serialize_i64(self.datetime.timestamp_micros()),
            _ => serializer.collect_str(self),
        }
    }
}

impl Encoder for JsonEncoder {
    fn encode(&self, event: &Event, buffer: &mut Buffer) -> Result<()> {
        serde_json::to_writer(&mut *buffer, &self.line(event))?;
        buffer.push_str("\n");
        Ok(())
    }

    fn content_type(&self) -> ContentType {
        ContentType::JSON
    }

    fn name(&self) -> &str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BufferHints, Level, LogContext};
    use serde_json::Value;

    fn encode(encoder: &JsonEncoder, event: &Event) -> Value {
        let mut buffer = encoder.buffer(BufferHints::text());
        encoder.encode(event, &mut buffer).unwrap();
        let text = buffer.as_str().unwrap();
        assert!(text.ends_with('\n'));
        assert_eq!(text.matches('\n').count(), 1);
        serde_json::from_str(text.trim_end()).unwrap()
    }

    #[test]
    fn test_json_encoder_fields() {
        let context = LogContext::new()
            .with_field("user_id", 123)
            .with_field("action", "login");
        let event = Event::builder("app.auth", Level::Info)
            .message("User logged in")
            .attributes(context)
            .build();

        let parsed = encode(&JsonEncoder::new(), &event);
        assert_eq!(parsed["level"], "INFO");
        assert_eq!(parsed["logger"], "app.auth");
        assert_eq!(parsed["message"], "User logged in");
        assert_eq!(parsed["attributes"]["user_id"], 123);
        assert_eq!(parsed["attributes"]["action"], "login");
        assert!(parsed["timestamp"].is_string());
    }

    #[test]
    fn test_json_numeric_timestamp_and_template() {
        let event = Event::builder("app", Level::Debug)
            .template("took {} ms", vec![42.into()])
            .build();
        let encoder = JsonEncoder::new()
            .with_timestamp_format(TimestampFormat::UnixMillis)
            .with_template(true);

        let parsed = encode(&encoder, &event);
        assert!(parsed["timestamp"].is_number());
        assert_eq!(parsed["message"], "took 42 ms");
        assert_eq!(parsed["template"], "took {} ms");
        assert_eq!(parsed["args"][0], 42);
    }

    #[test]
    fn test_json_newlines_stay_escaped() {
        let event = Event::new("app", Level::Warn, "line one\nline two");
        let parsed = encode(&JsonEncoder::new(), &event);
        assert_eq!(parsed["message"], "line one\nline two");
    }

    #[test]
    fn test_json_error_object() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.cfg");
        let event = Event::builder("app", Level::Error)
            .message("config load failed")
            .error(&io)
            .build();
        let parsed = encode(&JsonEncoder::new(), &event);
        assert_eq!(parsed["error"]["message"], "missing.cfg");
        assert!(parsed["error"]["kind"].as_str().unwrap().contains("io::error::Error"));
    }

    #[test]
    fn test_json_optional_fields_omitted() {
        let event = Event::builder("app", Level::Error)
            .message("plain")
            .error_info(ErrorInfo::new("write failed"))
            .build();
        let parsed = encode(&JsonEncoder::new().with_template(true), &event);
        assert!(parsed.get("attributes").is_none());
        assert!(parsed.get("template").is_none());
        assert!(parsed["error"].get("kind").is_none());
        assert!(parsed["error"].get("causes").is_none());
        assert_eq!(parsed["error"]["message"], "write failed");
    }

    #[test]
    fn test_json_reused_buffer_holds_one_line_per_event() {
        let encoder = JsonEncoder::new();
        let mut buffer = encoder.buffer(BufferHints::text());
        for i in 0..3 {
            buffer.clear();
            let event = Event::new("app", Level::Info, format!("event {}", i));
            encoder.encode(&event, &mut buffer).unwrap();
            let parsed: Value = serde_json::from_str(buffer.as_str().unwrap().trim_end()).unwrap();
            assert_eq!(parsed["message"], format!("event {}", i));
        }
    }
}
