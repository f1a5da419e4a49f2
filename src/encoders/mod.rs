//! Encoder implementations

pub mod json;
pub mod text;

pub use json::JsonEncoder;
pub use text::TextEncoder;

// Re-export traits for convenience
pub use crate::core::{Buffer, Encoder};
