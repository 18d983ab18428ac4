//! Navigation adapters: where the URL actually lives.
//!
//! The engine never touches a URL directly. It reads the current params from
//! an [`Adapter`] and hands it one merged update per flush. Integrations with
//! a router or a browser history implement this trait; two implementations
//! ship with the crate:
//!
//! - [`MemoryHistoryAdapter`](memory::MemoryHistoryAdapter): an in-memory
//!   history stack with push/replace/back/forward.
//! - [`TestingAdapter`](testing::TestingAdapter) (feature `testing`): records
//!   every update for assertions.
//!
//! # Example
//!
//! ```rust
//! use query_state::adapter::Adapter;
//! use query_state::error::AdapterResult;
//! use query_state_core::{AdapterOptions, SearchParams};
//! use async_trait::async_trait;
//! use parking_lot::RwLock;
//!
//! /// Keeps the query in a string, like a router's location state.
//! struct LocationAdapter {
//!     search: RwLock<String>,
//! }
//!
//! #[async_trait]
//! impl Adapter for LocationAdapter {
//!     fn search_params(&self) -> SearchParams {
//!         SearchParams::parse(&self.search.read())
//!     }
//!
//!     async fn update_url(
//!         &self,
//!         search: &SearchParams,
//!         _options: &AdapterOptions,
//!     ) -> AdapterResult<()> {
//!         *self.search.write() = search.to_string();
//!         Ok(())
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "location"
//!     }
//! }
//! ```

pub mod memory;
#[cfg(feature = "testing")]
pub mod testing;

use crate::error::AdapterResult;
use async_trait::async_trait;
use query_state_core::{AdapterOptions, SearchParams};

/// Bridge between the update queue and a navigation system.
///
/// # Contract
///
/// - `search_params` returns the params the URL has right now. It is called
///   outside any queue lock and must not block for long.
/// - `update_url` receives the complete new params, not a delta. It is
///   called at most once per flush, with options already merged for the
///   batch.
/// - Failures are reported as [`AdapterError`](crate::error::AdapterError);
///   the queue hands the batch back to the caller for a retry.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Current query params of the URL.
    fn search_params(&self) -> SearchParams;

    /// Write the new query params.
    ///
    /// # Errors
    ///
    /// Returns an error when the navigation could not be applied.
    async fn update_url(&self, search: &SearchParams, options: &AdapterOptions)
        -> AdapterResult<()>;

    /// Multiplier applied to the flush throttle.
    ///
    /// `1.0` keeps the configured spacing between URL updates, `0.0` flushes
    /// as soon as the runtime gets to it.
    fn rate_limit_factor(&self) -> f64 {
        1.0
    }

    /// Adapter name for logging.
    fn name(&self) -> &'static str {
        "adapter"
    }
}
