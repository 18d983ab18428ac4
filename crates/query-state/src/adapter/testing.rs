//! Adapter for unit tests: records every URL update.
//!
//! # Example
//!
//! ```rust
//! use query_state::adapter::testing::TestingAdapter;
//! use query_state::parser::parse_as_string;
//! use query_state::{QueryKey, QuerySession};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let adapter = Arc::new(TestingAdapter::new("?q=hello"));
//! let session = QuerySession::new(adapter.clone());
//!
//! let search = session.state(QueryKey::new("search", parse_as_string()).with_url_key("q"));
//! search.set(Some("world".into())).unwrap();
//!
//! let event = adapter.next_update().await.unwrap();
//! assert_eq!(event.query_string, "q=world");
//! # }
//! ```

use super::Adapter;
use crate::encoder::render_query_string;
use crate::error::{AdapterError, AdapterResult};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use query_state_core::{AdapterOptions, SearchParams};
use std::fmt;
use tokio::sync::mpsc;

/// One captured call to [`Adapter::update_url`].
#[derive(Debug, Clone, PartialEq)]
pub struct UrlUpdateEvent {
    pub search_params: SearchParams,
    /// Rendered query, without the leading `?`.
    pub query_string: String,
    pub options: AdapterOptions,
}

type UpdateCallback = Box<dyn Fn(&UrlUpdateEvent) + Send + Sync>;

/// In-memory adapter capturing URL updates as [`UrlUpdateEvent`]s.
///
/// Without memory (the default) every read returns the initial params, so
/// each test starts from a known URL no matter what was flushed. With
/// memory, flushed params become the current ones.
///
/// The rate limit factor defaults to `0`: flushes do not wait for the
/// throttle window.
pub struct TestingAdapter {
    initial: SearchParams,
    current: RwLock<SearchParams>,
    has_memory: bool,
    rate_limit_factor: f64,
    events: Mutex<Vec<UrlUpdateEvent>>,
    fail_next: Mutex<Option<String>>,
    on_url_update: Option<UpdateCallback>,
    sender: mpsc::UnboundedSender<UrlUpdateEvent>,
    receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<UrlUpdateEvent>>,
}

impl TestingAdapter {
    /// Seed from a query string, a map, a list of pairs or [`SearchParams`].
    pub fn new(initial: impl Into<SearchParams>) -> Self {
        let initial = initial.into();
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            current: RwLock::new(initial.clone()),
            initial,
            has_memory: false,
            rate_limit_factor: 0.0,
            events: Mutex::new(Vec::new()),
            fail_next: Mutex::new(None),
            on_url_update: None,
            sender,
            receiver: tokio::sync::Mutex::new(receiver),
        }
    }

    #[must_use]
    pub fn with_memory(mut self, has_memory: bool) -> Self {
        self.has_memory = has_memory;
        self
    }

    #[must_use]
    pub fn with_rate_limit_factor(mut self, factor: f64) -> Self {
        self.rate_limit_factor = factor;
        self
    }

    /// Call `f` synchronously on every captured update.
    #[must_use]
    pub fn with_on_url_update<F>(mut self, f: F) -> Self
    where
        F: Fn(&UrlUpdateEvent) + Send + Sync + 'static,
    {
        self.on_url_update = Some(Box::new(f));
        self
    }

    /// Every update captured so far, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<UrlUpdateEvent> {
        self.events.lock().clone()
    }

    #[must_use]
    pub fn last_event(&self) -> Option<UrlUpdateEvent> {
        self.events.lock().last().cloned()
    }

    #[must_use]
    pub fn update_count(&self) -> usize {
        self.events.lock().len()
    }

    /// Wait for the next captured update.
    ///
    /// Updates are delivered in order, each one once. Returns `None` only if
    /// the adapter is being dropped.
    pub async fn next_update(&self) -> Option<UrlUpdateEvent> {
        self.receiver.lock().await.recv().await
    }

    /// Make the next `update_url` call fail with `reason`.
    pub fn fail_next_update(&self, reason: impl Into<String>) {
        *self.fail_next.lock() = Some(reason.into());
    }
}

impl fmt::Debug for TestingAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestingAdapter")
            .field("initial", &self.initial)
            .field("has_memory", &self.has_memory)
            .field("rate_limit_factor", &self.rate_limit_factor)
            .field("updates", &self.update_count())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Adapter for TestingAdapter {
    fn search_params(&self) -> SearchParams {
        if self.has_memory {
            self.current.read().clone()
        } else {
            self.initial.clone()
        }
    }

    async fn update_url(&self, search: &SearchParams, options: &AdapterOptions) -> AdapterResult<()> {
        if let Some(reason) = self.fail_next.lock().take() {
            return Err(AdapterError::update_failed(self.name(), reason));
        }
        let event = UrlUpdateEvent {
            search_params: search.clone(),
            query_string: render_query_string(search),
            options: *options,
        };
        if self.has_memory {
            *self.current.write() = search.clone();
        }
        self.events.lock().push(event.clone());
        if let Some(callback) = &self.on_url_update {
            callback(&event);
        }
        // The receiver lives as long as the adapter.
        let _ = self.sender.send(event);
        Ok(())
    }

    fn rate_limit_factor(&self) -> f64 {
        self.rate_limit_factor
    }

    fn name(&self) -> &'static str {
        "testing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_state_core::HistoryMode;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn seeds_from_many_shapes() {
        assert_eq!(TestingAdapter::new("?a=1").search_params().get("a"), Some("1"));
        assert_eq!(TestingAdapter::new("a=1").search_params().get("a"), Some("1"));

        let map = HashMap::from([("b", "2")]);
        assert_eq!(TestingAdapter::new(map).search_params().get("b"), Some("2"));

        let pairs = vec![("c", "3")];
        assert_eq!(TestingAdapter::new(pairs).search_params().get("c"), Some("3"));

        let params = SearchParams::parse("d=4");
        assert_eq!(TestingAdapter::new(params).search_params().get("d"), Some("4"));
    }

    #[tokio::test]
    async fn captures_updates() {
        let adapter = TestingAdapter::new("?a=1");
        let params = SearchParams::parse("a=2&b=x y");
        let options = AdapterOptions {
            history: HistoryMode::Push,
            ..AdapterOptions::default()
        };
        adapter.update_url(&params, &options).await.unwrap();

        let event = adapter.next_update().await.unwrap();
        assert_eq!(event.query_string, "a=2&b=x+y");
        assert_eq!(event.options.history, HistoryMode::Push);
        assert_eq!(adapter.events(), vec![event]);
        // No memory: reads still see the seed.
        assert_eq!(adapter.search_params().get("a"), Some("1"));
    }

    #[tokio::test]
    async fn memory_keeps_last_update() {
        let adapter = TestingAdapter::new("?a=1").with_memory(true);
        let params = SearchParams::parse("a=2");
        adapter
            .update_url(&params, &AdapterOptions::default())
            .await
            .unwrap();
        assert_eq!(adapter.search_params(), params);
    }

    #[tokio::test]
    async fn fail_next_update_fails_once() {
        let adapter = TestingAdapter::new("");
        adapter.fail_next_update("blocked");
        let params = SearchParams::parse("a=1");

        let err = adapter
            .update_url(&params, &AdapterOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "testing adapter failed to update the url: blocked");
        assert_eq!(adapter.update_count(), 0);

        adapter
            .update_url(&params, &AdapterOptions::default())
            .await
            .unwrap();
        assert_eq!(adapter.update_count(), 1);
    }

    #[tokio::test]
    async fn callback_sees_each_update() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let adapter = TestingAdapter::new("").with_on_url_update(move |event| {
            assert!(!event.query_string.starts_with('?'));
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let params = SearchParams::parse("a=1");
        adapter
            .update_url(&params, &AdapterOptions::default())
            .await
            .unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
