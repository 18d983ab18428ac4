//! Interactive state handles bound to one adapter.
//!
//! A [`QuerySession`] owns the update queue and the key-change emitter for
//! one navigation context. [`QueryState`] handles read through the queue
//! (read-your-writes before the flush lands) and write by enqueueing and
//! scheduling a flush.
//!
//! # Example
//!
//! ```rust
//! use query_state::adapter::testing::TestingAdapter;
//! use query_state::parser::{parse_as_integer, parse_as_string};
//! use query_state::{QueryKey, QuerySession};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let adapter = Arc::new(TestingAdapter::new("?page=3"));
//! let session = QuerySession::new(adapter.clone());
//!
//! let q = session.state(QueryKey::new("q", parse_as_string()));
//! let page = session.state(QueryKey::new("page", parse_as_integer().with_default(1)));
//!
//! q.set(Some("rust".into())).unwrap();
//! let flushed = page.set(Some(1)).unwrap();
//!
//! // Visible immediately, before the flush.
//! assert_eq!(q.get(), Some("rust".to_string()));
//! assert_eq!(page.get(), 1);
//!
//! // Both writes land in one URL update; the default page is omitted.
//! let params = flushed.await.unwrap();
//! assert_eq!(params.to_string(), "q=rust");
//! assert_eq!(adapter.update_count(), 1);
//! # }
//! ```

use crate::adapter::Adapter;
use crate::emitter::{KeySubscription, SyncEmitter};
use crate::error::QueueResult;
use crate::key::QueryKey;
use crate::parser::QueryParser;
use crate::queue::{FlushHandle, UpdateQueue};
use crate::throttle::QueueConfig;
use query_state_core::{Options, SearchParams, SessionId};
use std::fmt;
use std::sync::Arc;

/// Queue, emitter and adapter of one navigation context.
///
/// Cloning is cheap; clones share everything.
///
/// Writes made without an await in between are batched on a current-thread
/// runtime. On a multi-thread runtime use [`with_config`](Self::with_config)
/// with a [`QueueConfig::batch_window`].
#[derive(Clone)]
pub struct QuerySession {
    id: SessionId,
    adapter: Arc<dyn Adapter>,
    queue: UpdateQueue,
    emitter: SyncEmitter,
}

impl QuerySession {
    pub fn new(adapter: Arc<dyn Adapter>) -> Self {
        Self::with_config(adapter, QueueConfig::default())
    }

    pub fn with_config(adapter: Arc<dyn Adapter>, config: QueueConfig) -> Self {
        let id = SessionId::random();
        tracing::debug!(session = %id, adapter = adapter.name(), "query session created");
        Self {
            id,
            adapter,
            queue: UpdateQueue::with_config(config, id),
            emitter: SyncEmitter::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn queue(&self) -> &UpdateQueue {
        &self.queue
    }

    #[must_use]
    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.adapter
    }

    #[must_use]
    pub fn emitter(&self) -> &SyncEmitter {
        &self.emitter
    }

    /// Handle for reading and writing `key`.
    pub fn state<P: QueryParser>(&self, key: QueryKey<P>) -> QueryState<P> {
        QueryState {
            session: self.clone(),
            key,
        }
    }

    /// The adapter's params with pending writes applied.
    #[must_use]
    pub fn search_params(&self) -> SearchParams {
        let mut params = self.adapter.search_params();
        self.queue.apply_pending(&mut params);
        params
    }

    /// Drop pending writes and cancel the scheduled flush.
    pub fn reset(&self) {
        self.queue.reset();
    }

    /// Schedule a flush of whatever is pending.
    ///
    /// # Errors
    ///
    /// [`QueueError::NoRuntime`](crate::error::QueueError::NoRuntime) outside
    /// a tokio runtime.
    pub fn flush(&self) -> QueueResult<FlushHandle> {
        self.queue.schedule_flush(Arc::clone(&self.adapter))
    }
}

impl fmt::Debug for QuerySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySession")
            .field("id", &self.id)
            .field("adapter", &self.adapter.name())
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

/// Read/write handle for one key of a session.
#[derive(Clone)]
pub struct QueryState<P: QueryParser> {
    session: QuerySession,
    key: QueryKey<P>,
}

impl<P: QueryParser> QueryState<P> {
    #[must_use]
    pub fn key(&self) -> &QueryKey<P> {
        &self.key
    }

    /// Current value: a pending write if any, otherwise the adapter's URL.
    ///
    /// An absent key resolves to `None`, or to the parser's default.
    pub fn get(&self) -> P::Output {
        let url_key = self.key.url_key();
        match self.session.queue.queued_value(url_key) {
            Some(queued) => self.key.resolve_raw(queued.as_deref()),
            None => {
                let params = self.session.adapter.search_params();
                self.key.resolve_raw(params.get(url_key))
            }
        }
    }

    /// Write `value` with the parser's options. `None` removes the key.
    ///
    /// # Errors
    ///
    /// [`QueueError::NoRuntime`](crate::error::QueueError::NoRuntime) outside
    /// a tokio runtime; the write stays queued.
    pub fn set(&self, value: Option<P::Value>) -> QueueResult<FlushHandle> {
        self.set_with(value, Options::new())
    }

    /// Write `value` with per-call `options` layered over the parser's.
    ///
    /// # Errors
    ///
    /// See [`set`](Self::set).
    pub fn set_with(&self, value: Option<P::Value>, options: Options) -> QueueResult<FlushHandle> {
        let options = self.key.parser().options().merge(&options);
        let query = self.key.serialize_for_url(value.as_ref(), &options);
        let url_key = self.key.url_key();
        // Subscribers must find the write queued when they wake up.
        self.session.queue.enqueue(url_key, query.clone(), options);
        self.session.emitter.emit(url_key, query);
        self.session.flush()
    }

    /// Functional update against the freshest value, pending writes included.
    ///
    /// # Errors
    ///
    /// See [`set`](Self::set).
    pub fn update<F>(&self, f: F) -> QueueResult<FlushHandle>
    where
        F: FnOnce(P::Output) -> Option<P::Value>,
    {
        let next = f(self.get());
        self.set(next)
    }

    /// Remove the key from the URL.
    ///
    /// # Errors
    ///
    /// See [`set`](Self::set).
    pub fn clear(&self) -> QueueResult<FlushHandle> {
        self.set(None)
    }

    /// Changes written to this key by any handle of the session.
    #[must_use]
    pub fn subscribe(&self) -> KeySubscription {
        self.session.emitter.subscribe(self.key.url_key())
    }
}

impl<P: QueryParser> fmt::Debug for QueryState<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryState")
            .field("session", &self.session.id)
            .field("name", &self.key.name())
            .field("url_key", &self.key.url_key())
            .finish()
    }
}
