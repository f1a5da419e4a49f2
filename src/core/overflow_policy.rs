//! Overflow policies for the bounded-queue publisher
//!
//! When the queue is full, the policy decides whether the producing thread
//! waits for space or the event is dropped. Dropping is never silent: drops
//! are counted, reported on the meta-error channel and passed to the optional
//! [`OverflowCallback`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Policy for handling a full queue
///
/// # Example
///
/// ```
/// use rust_log_pipeline::OverflowPolicy;
/// use std::time::Duration;
///
/// // Default behavior: backpressure
/// assert_eq!(OverflowPolicy::default(), OverflowPolicy::Block);
///
/// // Block with timeout
/// let policy = OverflowPolicy::BlockWithTimeout(Duration::from_millis(100));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Block the producer until space is available
    ///
    /// The wait is abandoned only if the publisher closes meanwhile.
    Block,

    /// Block with timeout, then drop
    BlockWithTimeout(Duration),

    /// Drop the new event immediately
    DropNewest,
}

impl Default for OverflowPolicy {
    fn default() -> Self {
        OverflowPolicy::Block
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::Block => write!(f, "Block"),
            OverflowPolicy::BlockWithTimeout(d) => write!(f, "BlockWithTimeout({:?})", d),
            OverflowPolicy::DropNewest => write!(f, "DropNewest"),
        }
    }
}

/// Callback type for overflow notifications
///
/// Called when events are dropped due to queue overflow.
/// The parameter is the total count of dropped events so far.
pub type OverflowCallback = Arc<dyn Fn(u64) + Send + Sync>;
