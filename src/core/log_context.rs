//! Key/value attributes carried by events
//!
//! This module provides:
//! - `LogContext`: per-event attribute set with unique keys
//! - `ThreadContext`: thread-local ambient attributes merged into every event
//!   built on that thread
//! - `ContextGuard`: RAII guard for a scoped thread-local attribute

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

/// Value type for structured attributes and template arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => f.write_str(s),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(fl) => write!(f, "{}", fl),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Null => f.write_str("null"),
        }
    }
}

impl FieldValue {
    /// Convert to serde_json::Value for JSON serialization
    #[must_use]
    pub fn to_json_value(&self) -> serde_json::Value {
        match self {
            FieldValue::String(s) => serde_json::Value::String(s.clone()),
            FieldValue::Int(i) => serde_json::Value::Number((*i).into()),
            FieldValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            FieldValue::Bool(b) => serde_json::Value::Bool(*b),
            FieldValue::Null => serde_json::Value::Null,
        }
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        FieldValue::Int(i as i64)
    }
}

impl From<u32> for FieldValue {
    fn from(i: u32) -> Self {
        FieldValue::Int(i as i64)
    }
}

impl From<usize> for FieldValue {
    fn from(i: usize) -> Self {
        FieldValue::Int(i as i64)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Null, Into::into)
    }
}

/// Attribute set of one event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogContext {
    fields: HashMap<String, FieldValue>,
}

impl LogContext {
    /// Create a new empty log context
    pub fn new() -> Self {
        Self {
            fields: HashMap::new(),
        }
    }

    /// Add a field to the context
    pub fn with_field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Add a field to the context (mutable version)
    pub fn add_field<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Get all fields
    pub fn fields(&self) -> &HashMap<String, FieldValue> {
        &self.fields
    }

    /// Check if context has any fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Insert every field of `other` whose key is not already present.
    ///
    /// Fields already in `self` take priority.
    pub fn merge_missing(&mut self, other: &HashMap<String, FieldValue>) {
        for (key, value) in other {
            if !self.fields.contains_key(key) {
                self.fields.insert(key.clone(), value.clone());
            }
        }
    }

    /// Fields sorted by key, for deterministic output
    pub fn sorted_fields(&self) -> Vec<(&String, &FieldValue)> {
        let mut fields: Vec<_> = self.fields.iter().collect();
        fields.sort_by(|a, b| a.0.cmp(b.0));
        fields
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.sorted_fields().into_iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}

thread_local! {
    static THREAD_FIELDS: RefCell<HashMap<String, FieldValue>> = RefCell::new(HashMap::new());
}

/// Thread-local ambient attributes.
///
/// Every event built on a thread copies the thread's current attributes at
/// build time. Changing them afterwards never affects events already built.
///
/// # Example
///
/// ```
/// use rust_log_pipeline::core::ThreadContext;
///
/// {
///     let _guard = ThreadContext::put("request_id", "abc-123");
///     assert_eq!(ThreadContext::snapshot().len(), 1);
/// }
/// assert!(ThreadContext::snapshot().is_empty());
/// ```
pub struct ThreadContext;

impl ThreadContext {
    /// Set a field for the current thread until the returned guard drops
    #[must_use = "the field is removed when the guard is dropped"]
    pub fn put<K, V>(key: K, value: V) -> ContextGuard
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        let key = key.into();
        let previous =
            THREAD_FIELDS.with(|fields| fields.borrow_mut().insert(key.clone(), value.into()));
        ContextGuard {
            key,
            previous,
            _not_send: PhantomData,
        }
    }

    /// Copy of the current thread's fields
    pub fn snapshot() -> HashMap<String, FieldValue> {
        THREAD_FIELDS.with(|fields| fields.borrow().clone())
    }

    /// Merge the current thread's fields into `context` without overriding
    pub fn merge_into(context: &mut LogContext) {
        THREAD_FIELDS.with(|fields| {
            let fields = fields.borrow();
            if !fields.is_empty() {
                context.merge_missing(&fields);
            }
        });
    }

    /// Remove every field of the current thread
    pub fn clear() {
        THREAD_FIELDS.with(|fields| fields.borrow_mut().clear());
    }
}

/// RAII guard for a scoped thread-local field
///
/// Dropping the guard restores the value the key had before `put`, or
/// removes the key if it had none.
pub struct ContextGuard {
    key: String,
    previous: Option<FieldValue>,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let key = std::mem::take(&mut self.key);
        let previous = self.previous.take();
        THREAD_FIELDS.with(|fields| {
            let mut fields = fields.borrow_mut();
            match previous {
                Some(value) => {
                    fields.insert(key, value);
                }
                None => {
                    fields.remove(&key);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_context_creation() {
        let ctx = LogContext::new();
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_log_context_unique_keys() {
        let ctx = LogContext::new()
            .with_field("user_id", 123)
            .with_field("user_id", 456)
            .with_field("active", true);

        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.get("user_id"), Some(&FieldValue::Int(456)));
    }

    #[test]
    fn test_log_context_display_is_sorted() {
        let ctx = LogContext::new()
            .with_field("b", "two")
            .with_field("a", 1);

        assert_eq!(ctx.to_string(), "a=1 b=two");
    }

    #[test]
    fn test_merge_missing_priority() {
        let mut ctx = LogContext::new().with_field("key", "entry_value");
        let mut ambient = HashMap::new();
        ambient.insert("key".to_string(), FieldValue::from("ambient_value"));
        ambient.insert("service".to_string(), FieldValue::from("api"));

        ctx.merge_missing(&ambient);

        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.get("key"), Some(&FieldValue::from("entry_value")));
    }

    #[test]
    fn test_thread_context_guard_restores_previous() {
        ThreadContext::clear();
        let _outer = ThreadContext::put("tenant", "a");
        {
            let _inner = ThreadContext::put("tenant", "b");
            assert_eq!(
                ThreadContext::snapshot().get("tenant"),
                Some(&FieldValue::from("b"))
            );
        }
        assert_eq!(
            ThreadContext::snapshot().get("tenant"),
            Some(&FieldValue::from("a"))
        );
    }

    #[test]
    fn test_thread_context_is_per_thread() {
        ThreadContext::clear();
        let _guard = ThreadContext::put("request_id", "r-1");
        let seen = std::thread::spawn(ThreadContext::snapshot).join().unwrap();
        assert!(seen.is_empty());
    }
}
