//! Error types for the update queue and navigation adapters.
//!
//! Decoding a query value is never an error: codecs answer `None` and the
//! caller falls back to the default or to "absent". What can fail is getting
//! a merged batch into the URL, which is what this module describes.
//!
//! # Error Philosophy
//!
//! - Adapter failures keep the drained batch so the caller can retry
//! - Flush outcomes are cloneable, every waiter of a flush sees the same one
//! - No panics in library code - all failures return `Result`
//!
//! # Example
//!
//! ```rust
//! use query_state::error::FlushError;
//!
//! fn report(err: &FlushError) {
//!     match err {
//!         FlushError::Cancelled => tracing::debug!("flush cancelled by reset"),
//!         FlushError::Adapter { batch, .. } => {
//!             tracing::warn!(%err, pending = batch.entries.len(), "url update failed");
//!         }
//!         _ => tracing::error!(%err, "flush failed"),
//!     }
//! }
//! ```

use crate::queue::FlushBatch;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by a navigation adapter while applying an update.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AdapterError {
    /// The integration refused or failed to apply the new URL.
    #[error("{adapter} adapter failed to update the url: {reason}")]
    UpdateFailed {
        /// Name of the adapter, see [`Adapter::name`](crate::adapter::Adapter::name).
        adapter: &'static str,
        /// Human-readable reason.
        reason: String,
    },

    /// Custom error from an adapter implementation.
    #[error("{message}")]
    Custom {
        /// Error message.
        message: String,
        /// Optional source error for chaining.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl AdapterError {
    #[must_use]
    pub fn update_failed(adapter: &'static str, reason: impl Into<String>) -> Self {
        Self::UpdateFailed {
            adapter,
            reason: reason.into(),
        }
    }

    /// Create a custom error with a message.
    #[must_use]
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom {
            message: message.into(),
            source: None,
        }
    }

    /// Create a custom error with a message and source.
    #[must_use]
    pub fn custom_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Custom {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Errors raised when scheduling work on the update queue.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QueueError {
    /// Flushes run as tokio tasks; there was no runtime to spawn on.
    #[error("no tokio runtime available to schedule the url flush")]
    NoRuntime,
}

/// Outcome of a scheduled flush that did not reach the URL.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum FlushError {
    /// The adapter failed. The drained batch is kept for a retry through
    /// [`UpdateQueue::restore`](crate::queue::UpdateQueue::restore).
    #[error("flush of {} entries failed: {source}", .batch.entries.len())]
    Adapter {
        /// Entries and merged options that were handed to the adapter.
        batch: FlushBatch,
        /// The adapter's error.
        #[source]
        source: Arc<AdapterError>,
    },

    /// The queue was reset before the flush ran.
    #[error("flush cancelled by queue reset")]
    Cancelled,

    /// The flush task ended without producing an outcome, for example
    /// because the adapter panicked.
    #[error("flush task aborted: {reason}")]
    Aborted {
        /// Description of the task failure.
        reason: String,
        /// The drained batch, when the task died after draining the queue.
        batch: Option<FlushBatch>,
    },
}

impl FlushError {
    pub(crate) fn adapter(batch: FlushBatch, source: AdapterError) -> Self {
        Self::Adapter {
            batch,
            source: Arc::new(source),
        }
    }

    /// Check if the batch is still available for a retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Adapter { .. } | Self::Aborted { batch: Some(_), .. }
        )
    }

    /// Check if this error represents a reset of the queue.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Take the batch back out of a failed flush.
    #[must_use]
    pub fn into_batch(self) -> Option<FlushBatch> {
        match self {
            Self::Adapter { batch, .. } => Some(batch),
            Self::Aborted { batch, .. } => batch,
            Self::Cancelled => None,
        }
    }
}

/// Result type alias for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Result type alias for queue scheduling.
pub type QueueResult<T> = Result<T, QueueError>;

/// Result type alias for flush outcomes.
pub type FlushResult<T> = Result<T, FlushError>;
