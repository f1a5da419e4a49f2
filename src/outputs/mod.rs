//! Output implementations

pub mod console;
pub mod file;
pub mod memory;

pub use console::ConsoleOutput;
pub use file::FileOutput;
pub use memory::{MemoryHandle, MemoryOutput};

// Re-export traits for convenience
pub use crate::core::{Output, OutputStatus};
