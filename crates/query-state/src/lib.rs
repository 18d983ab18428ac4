//! Type-safe application state stored in the URL query string.
//!
//! Values are read from and written to query parameters through typed
//! codecs. Writes are batched: every write made before the next flush is
//! merged into a single, rate-limited URL update.
//!
//! # Architecture
//!
//! The crate is built around four pieces:
//!
//! 1. **[`parser`]** - [`Parser`] and [`ParserWithDefault`] convert between
//!    query strings and typed values
//! 2. **[`UpdateQueue`]** - collects writes and flushes them in one update,
//!    spaced by a throttle window
//! 3. **[`Adapter`]** - the navigation integration the queue writes to
//! 4. **[`QuerySession`]** - ties a queue and an adapter together and hands
//!    out [`QueryState`] handles
//!
//! # Quick Start
//!
//! ```rust
//! use query_state::prelude::*;
//! use query_state::adapter::testing::TestingAdapter;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let adapter = Arc::new(TestingAdapter::new("?q=hello"));
//! let session = QuerySession::new(adapter.clone());
//!
//! let search = session.state(QueryKey::new("q", parse_as_string()));
//! let page = session.state(QueryKey::new("page", parse_as_integer().with_default(1)));
//!
//! assert_eq!(search.get(), Some("hello".to_string()));
//! assert_eq!(page.get(), 1);
//!
//! search.set(Some("world".into())).unwrap();
//! page.set_with(Some(2), Options::push()).unwrap();
//!
//! let event = adapter.next_update().await.unwrap();
//! assert_eq!(event.query_string, "q=world&page=2");
//! assert_eq!(event.options.history, HistoryMode::Push);
//! # }
//! ```
//!
//! # Server-side Parsing
//!
//! The same parsers decode values handed over by a server framework, where a
//! parameter may be missing or repeated:
//!
//! ```rust
//! use query_state::parser::parse_as_integer;
//!
//! let page = parse_as_integer().with_default(1);
//! assert_eq!(page.parse_server_side(None::<&str>), 1);
//! assert_eq!(page.parse_server_side(&["4", "5"][..]), 4);
//! ```
//!
//! # Features
//!
//! - `testing` (default) - [`TestingAdapter`](adapter::testing::TestingAdapter)
//!   for capturing URL updates in tests
//!
//! # Error Handling
//!
//! Decoding never fails: invalid input is `None` (or the default). Queue and
//! adapter failures use the structured types of the [`error`] module.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod adapter;
pub mod emitter;
pub mod encoder;
pub mod error;
pub mod key;
pub mod parser;
pub mod queue;
pub mod serializer;
pub mod session;
pub mod throttle;

pub use adapter::Adapter;
pub use emitter::{KeyChange, KeySubscription, SyncEmitter};
pub use encoder::{render_query_string, render_search};
pub use error::{AdapterError, AdapterResult, FlushError, FlushResult, QueueError, QueueResult};
pub use key::QueryKey;
pub use parser::{create_parser, Codec, Parser, ParserWithDefault, QueryParser};
pub use queue::{FlushBatch, FlushHandle, QueueEntry, UpdateQueue};
pub use serializer::Serializer;
pub use session::{QuerySession, QueryState};
pub use throttle::QueueConfig;

// Re-export the core crate for full access
pub use query_state_core;

pub use query_state_core::{AdapterOptions, HistoryMode, Options, SearchParams, SessionId};

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use query_state::prelude::*;
/// ```
pub mod prelude {
    pub use crate::adapter::Adapter;
    pub use crate::error::{AdapterError, AdapterResult, FlushError, QueueError};
    pub use crate::key::QueryKey;
    pub use crate::parser::{
        create_parser, parse_as_array_of, parse_as_boolean, parse_as_float, parse_as_hex,
        parse_as_integer, parse_as_iso_date, parse_as_iso_date_time, parse_as_json,
        parse_as_json_with, parse_as_string, parse_as_string_enum, parse_as_timestamp,
        QueryParser,
    };
    pub use crate::serializer::Serializer;
    pub use crate::session::{QuerySession, QueryState};

    pub use query_state_core::{AdapterOptions, HistoryMode, Options, SearchParams};

    pub use async_trait::async_trait;
}

#[cfg(test)]
mod tests {
    #[test]
    fn prelude_imports_work() {
        use crate::prelude::*;

        fn _assert_adapter_object(_: &dyn Adapter) {}
        fn _assert_parser<P: QueryParser>(_: QueryKey<P>) {}
        _assert_parser(QueryKey::new("q", parse_as_string()));
    }
}
