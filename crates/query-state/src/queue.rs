//! Batched, throttled URL updates.
//!
//! Every write lands in an [`UpdateQueue`] first. Writes to the same key are
//! merged, and all writes made before the scheduled flush runs are applied
//! to the URL with a single adapter call.
//!
//! # Architecture
//!
//! The queue state sits behind a `parking_lot::Mutex` and is only ever held
//! for bookkeeping: adapters and codecs never run under it. The flush itself
//! is a tokio task that
//!
//! 1. yields once, so it never runs inside the caller's stack,
//! 2. waits for the previous flush to finish, for the throttle window and
//!    for the configured batch window,
//! 3. drains the batch and clears the scheduled slot in one critical section,
//! 4. applies the batch to the adapter's current params and calls
//!    [`Adapter::update_url`] once.
//!
//! [`UpdateQueue::reset`] cancels a scheduled flush and discards pending
//! entries atomically; a flush that already drained its batch is unaffected.
//!
//! # Runtimes
//!
//! On a current-thread runtime the flush task cannot start before the
//! writing code awaits, so every write of one synchronous stretch lands in
//! the same batch. On a multi-thread runtime the task may start on another
//! worker immediately; give the queue a
//! [`batch_window`](crate::throttle::QueueConfig::batch_window) there.
//!
//! # Example
//!
//! ```rust
//! use query_state::adapter::testing::TestingAdapter;
//! use query_state::queue::UpdateQueue;
//! use query_state_core::Options;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let adapter = Arc::new(TestingAdapter::new("?page=1"));
//! let queue = UpdateQueue::new();
//!
//! queue.enqueue("q", Some("rust".into()), Options::new());
//! queue.enqueue("page", None, Options::push());
//!
//! let params = queue.schedule_flush(adapter.clone()).unwrap().await.unwrap();
//! assert_eq!(params.to_string(), "q=rust");
//! assert_eq!(adapter.update_count(), 1);
//! # }
//! ```

use crate::adapter::Adapter;
use crate::error::{FlushError, FlushResult, QueueError, QueueResult};
use crate::throttle::{effective_throttle, flush_delay, QueueConfig};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use query_state_core::{AdapterOptions, Options, SearchParams, SessionId};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::runtime::Handle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// One pending write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    /// URL key.
    pub key: String,
    /// Serialized value, `None` removes the key.
    pub query: Option<String>,
    pub options: Options,
}

impl QueueEntry {
    pub fn new(key: impl Into<String>, query: Option<String>, options: Options) -> Self {
        Self {
            key: key.into(),
            query,
            options,
        }
    }
}

/// Entries drained by one flush, with their options widened together.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FlushBatch {
    pub entries: Vec<QueueEntry>,
    pub options: Options,
}

impl FlushBatch {
    pub fn new(entries: Vec<QueueEntry>) -> Self {
        let options = entries
            .iter()
            .fold(Options::new(), |acc, entry| acc.widen(&entry.options));
        Self { entries, options }
    }

    /// Navigation options handed to the adapter.
    #[must_use]
    pub fn adapter_options(&self) -> AdapterOptions {
        self.options.resolve()
    }

    /// Apply entries in order: `None` deletes the key, `Some` sets it.
    pub fn apply_to(&self, params: &mut SearchParams) {
        for entry in &self.entries {
            match &entry.query {
                Some(query) => params.set(entry.key.as_str(), query.as_str()),
                None => params.delete(&entry.key),
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Awaitable outcome of a scheduled flush.
///
/// Cloning is cheap and every clone resolves to the same result: the URL
/// params that were written, or why they were not. Dropping every handle
/// does not cancel the flush.
#[derive(Clone)]
pub struct FlushHandle {
    inner: Shared<BoxFuture<'static, FlushResult<SearchParams>>>,
}

impl FlushHandle {
    fn spawn<F>(runtime: &Handle, flush: F, orphan: OrphanSlot) -> Self
    where
        F: Future<Output = FlushResult<SearchParams>> + Send + 'static,
    {
        let task = runtime.spawn(flush);
        let inner = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    let batch = orphan.lock().take();
                    if e.is_cancelled() && batch.is_none() {
                        Err(FlushError::Cancelled)
                    } else {
                        Err(FlushError::Aborted {
                            reason: e.to_string(),
                            batch,
                        })
                    }
                }
            }
        }
        .boxed()
        .shared();
        Self { inner }
    }

    /// The outcome, if the flush already completed and was polled.
    #[must_use]
    pub fn peek(&self) -> Option<&FlushResult<SearchParams>> {
        self.inner.peek()
    }
}

impl Future for FlushHandle {
    type Output = FlushResult<SearchParams>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl fmt::Debug for FlushHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlushHandle")
            .field("completed", &self.peek().is_some())
            .finish()
    }
}

/// Where a flush task that dies mid-update leaves its drained batch.
type OrphanSlot = Arc<Mutex<Option<FlushBatch>>>;

/// Clears the in-flight entries however the adapter call ends. Unless
/// disarmed, the batch is moved to the orphan slot for the flush handle.
struct InFlightGuard<'a> {
    queue: &'a UpdateQueue,
    orphan: &'a OrphanSlot,
    batch: Option<FlushBatch>,
}

impl InFlightGuard<'_> {
    fn disarm(mut self) {
        self.batch = None;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.queue.inner.lock().in_flight.clear();
        if let Some(batch) = self.batch.take() {
            tracing::warn!(
                session = %self.queue.session,
                entries = batch.len(),
                "flush task ended during the url update"
            );
            *self.orphan.lock() = Some(batch);
        }
    }
}

struct Scheduled {
    token: CancellationToken,
    handle: FlushHandle,
}

#[derive(Default)]
struct QueueInner {
    entries: Vec<QueueEntry>,
    /// Entries handed to the adapter by the flush in progress.
    in_flight: Vec<QueueEntry>,
    scheduled: Option<Scheduled>,
    last_flush: Option<Instant>,
    /// Bumped by `reset`; a flush scheduled under an older generation is void.
    generation: u64,
}

/// Pending URL writes of one session.
///
/// Clones share the same queue.
#[derive(Clone)]
pub struct UpdateQueue {
    inner: Arc<Mutex<QueueInner>>,
    flush_permit: Arc<tokio::sync::Mutex<()>>,
    config: QueueConfig,
    session: SessionId,
}

impl Default for UpdateQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UpdateQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("UpdateQueue")
            .field("session", &self.session)
            .field("pending", &inner.entries.len())
            .field("scheduled", &inner.scheduled.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl UpdateQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default(), SessionId::random())
    }

    #[must_use]
    pub fn with_config(config: QueueConfig, session: SessionId) -> Self {
        Self {
            inner: Arc::new(Mutex::new(QueueInner::default())),
            flush_permit: Arc::new(tokio::sync::Mutex::new(())),
            config,
            session,
        }
    }

    #[must_use]
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Record a write for `key`.
    ///
    /// An existing entry for the key keeps its position in the batch; its
    /// options are widened into the new ones so that, for example, an
    /// earlier `push` is not lost when a later write only asks for `replace`.
    pub fn enqueue(&self, key: impl Into<String>, query: Option<String>, options: Options) {
        let key = key.into();
        tracing::trace!(session = %self.session, %key, ?query, ?options, "enqueue");
        let mut inner = self.inner.lock();
        match inner.entries.iter_mut().find(|e| e.key == key) {
            Some(entry) => {
                entry.options = entry.options.widen(&options);
                entry.query = query;
            }
            None => inner.entries.push(QueueEntry::new(key, query, options)),
        }
    }

    /// Read-your-writes view of `key`.
    ///
    /// `None` when nothing is pending for the key, `Some(None)` when a
    /// removal is pending. Entries of a flush in progress are included.
    #[must_use]
    pub fn queued_value(&self, key: &str) -> Option<Option<String>> {
        let inner = self.inner.lock();
        inner
            .entries
            .iter()
            .find(|e| e.key == key)
            .or_else(|| inner.in_flight.iter().find(|e| e.key == key))
            .map(|e| e.query.clone())
    }

    /// Snapshot of the pending entries, in batch order.
    #[must_use]
    pub fn pending(&self) -> Vec<QueueEntry> {
        self.inner.lock().entries.clone()
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    #[must_use]
    pub fn has_scheduled_flush(&self) -> bool {
        self.inner.lock().scheduled.is_some()
    }

    /// Overlay pending and in-flight entries on `params`.
    pub fn apply_pending(&self, params: &mut SearchParams) {
        let inner = self.inner.lock();
        for entry in inner.in_flight.iter().chain(&inner.entries) {
            match &entry.query {
                Some(query) => params.set(entry.key.as_str(), query.as_str()),
                None => params.delete(&entry.key),
            }
        }
    }

    /// Make sure a flush is scheduled and return its handle.
    ///
    /// If one is already pending, its handle is returned and every waiter
    /// shares the outcome.
    ///
    /// # Errors
    ///
    /// [`QueueError::NoRuntime`] when called outside a tokio runtime.
    pub fn schedule_flush(&self, adapter: Arc<dyn Adapter>) -> QueueResult<FlushHandle> {
        let mut inner = self.inner.lock();
        if let Some(scheduled) = &inner.scheduled {
            return Ok(scheduled.handle.clone());
        }
        let runtime = Handle::try_current().map_err(|_| QueueError::NoRuntime)?;
        let token = CancellationToken::new();
        let orphan = OrphanSlot::default();
        let flush = self
            .clone()
            .run_flush(adapter, token.clone(), inner.generation, Arc::clone(&orphan));
        let handle = FlushHandle::spawn(&runtime, flush, orphan);
        tracing::debug!(session = %self.session, pending = inner.entries.len(), "flush scheduled");
        inner.scheduled = Some(Scheduled {
            token,
            handle: handle.clone(),
        });
        Ok(handle)
    }

    /// Discard pending entries and cancel the scheduled flush.
    ///
    /// Waiters of the cancelled flush resolve to [`FlushError::Cancelled`].
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.generation = inner.generation.wrapping_add(1);
        let dropped = inner.entries.len();
        inner.entries.clear();
        if let Some(scheduled) = inner.scheduled.take() {
            scheduled.token.cancel();
        }
        tracing::debug!(session = %self.session, dropped, "queue reset");
    }

    /// Put the entries of a failed flush back in the queue.
    ///
    /// Keys written again since the failure keep their newer value. Restored
    /// entries go ahead of those newer writes. Returns how many entries were
    /// restored; the caller schedules the retry.
    pub fn restore(&self, batch: FlushBatch) -> usize {
        let mut inner = self.inner.lock();
        let mut restored: Vec<QueueEntry> = batch
            .entries
            .into_iter()
            .filter(|old| !inner.entries.iter().any(|e| e.key == old.key))
            .collect();
        let count = restored.len();
        restored.append(&mut inner.entries);
        inner.entries = restored;
        tracing::debug!(session = %self.session, count, "batch restored");
        count
    }

    async fn run_flush(
        self,
        adapter: Arc<dyn Adapter>,
        token: CancellationToken,
        generation: u64,
        orphan: OrphanSlot,
    ) -> FlushResult<SearchParams> {
        tokio::task::yield_now().await;

        let _permit = tokio::select! {
            _ = token.cancelled() => return Err(FlushError::Cancelled),
            permit = self.flush_permit.lock() => permit,
        };

        let factor = adapter.rate_limit_factor();
        let delay = {
            let inner = self.inner.lock();
            let requested = inner
                .entries
                .iter()
                .filter_map(|e| e.options.throttle_ms)
                .max();
            let throttle = effective_throttle(requested, &self.config);
            flush_delay(throttle, inner.last_flush.map(|t| t.elapsed()), factor)
                .max(self.config.batch_window)
        };
        if !delay.is_zero() {
            tracing::trace!(session = %self.session, ?delay, "waiting for throttle window");
            tokio::select! {
                _ = token.cancelled() => return Err(FlushError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let Some(batch) = self.take_batch(generation) else {
            return Err(FlushError::Cancelled);
        };
        if batch.is_empty() {
            return Ok(self.current_params(adapter.as_ref()));
        }

        let guard = InFlightGuard {
            queue: &self,
            orphan: &orphan,
            batch: Some(batch.clone()),
        };
        let outcome = self.apply(adapter.as_ref(), batch).await;
        guard.disarm();
        outcome
    }

    /// Drain the batch and clear the scheduled slot in one critical section.
    fn take_batch(&self, generation: u64) -> Option<FlushBatch> {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return None;
        }
        inner.scheduled = None;
        let entries = std::mem::take(&mut inner.entries);
        if !entries.is_empty() {
            inner.in_flight = entries.clone();
            inner.last_flush = Some(Instant::now());
        }
        Some(FlushBatch::new(entries))
    }

    fn current_params(&self, adapter: &dyn Adapter) -> SearchParams {
        let mut params = adapter.search_params();
        self.apply_pending(&mut params);
        params
    }

    async fn apply(&self, adapter: &dyn Adapter, batch: FlushBatch) -> FlushResult<SearchParams> {
        let mut params = adapter.search_params();
        batch.apply_to(&mut params);
        let options = batch.adapter_options();

        tracing::debug!(
            session = %self.session,
            adapter = adapter.name(),
            entries = batch.len(),
            query = %params,
            ?options,
            "flushing url update"
        );

        match adapter.update_url(&params, &options).await {
            Ok(()) => Ok(params),
            Err(e) => {
                tracing::warn!(
                    session = %self.session,
                    adapter = adapter.name(),
                    error = %e,
                    "url update failed"
                );
                Err(FlushError::adapter(batch, e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::testing::TestingAdapter;
    use crate::error::AdapterError;
    use assert_matches::assert_matches;
    use query_state_core::HistoryMode;
    use std::time::Duration;

    fn adapter(initial: &str) -> Arc<TestingAdapter> {
        Arc::new(TestingAdapter::new(initial))
    }

    #[test]
    fn batch_widens_options() {
        let batch = FlushBatch::new(vec![
            QueueEntry::new("a", Some("1".into()), Options::push()),
            QueueEntry::new("b", None, Options::replace().with_scroll(true)),
        ]);
        let opts = batch.adapter_options();
        assert_eq!(opts.history, HistoryMode::Push);
        assert!(opts.scroll);
        assert!(opts.shallow);
    }

    #[test]
    fn batch_applies_in_order() {
        let batch = FlushBatch::new(vec![
            QueueEntry::new("a", Some("1".into()), Options::new()),
            QueueEntry::new("b", None, Options::new()),
            QueueEntry::new("c", Some("x y".into()), Options::new()),
        ]);
        let mut params = SearchParams::parse("b=2&a=0");
        batch.apply_to(&mut params);
        assert_eq!(params.to_string(), "a=1&c=x+y");
    }

    #[test]
    fn enqueue_overwrites_in_place() {
        let queue = UpdateQueue::new();
        queue.enqueue("a", Some("1".into()), Options::push());
        queue.enqueue("b", Some("2".into()), Options::new());
        queue.enqueue("a", Some("3".into()), Options::replace());

        let pending = queue.pending();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].key, "a");
        assert_eq!(pending[0].query.as_deref(), Some("3"));
        assert_eq!(pending[0].options.history, Some(HistoryMode::Push));
        assert_eq!(queue.queued_value("a"), Some(Some("3".into())));
        assert_eq!(queue.queued_value("zzz"), None);
    }

    #[test]
    fn schedule_without_runtime_fails() {
        let queue = UpdateQueue::new();
        queue.enqueue("a", Some("1".into()), Options::new());
        let result = queue.schedule_flush(adapter(""));
        assert_matches!(result, Err(QueueError::NoRuntime));
        assert!(!queue.has_scheduled_flush());
    }

    #[tokio::test]
    async fn flush_merges_into_one_update() {
        let adapter = adapter("?keep=1");
        let queue = UpdateQueue::new();
        queue.enqueue("a", Some("1".into()), Options::new());
        let first = queue.schedule_flush(adapter.clone()).unwrap();
        queue.enqueue("b", Some("2".into()), Options::push());
        let second = queue.schedule_flush(adapter.clone()).unwrap();

        let params = first.await.unwrap();
        assert_eq!(params.to_string(), "keep=1&a=1&b=2");
        assert_eq!(second.await.unwrap(), params);
        assert_eq!(adapter.update_count(), 1);

        let event = adapter.last_event().unwrap();
        assert_eq!(event.options.history, HistoryMode::Push);
        assert!(queue.is_empty());
        assert!(!queue.has_scheduled_flush());
    }

    #[tokio::test]
    async fn reset_cancels_scheduled_flush() {
        let adapter = adapter("");
        let queue = UpdateQueue::new();
        queue.enqueue("a", Some("1".into()), Options::new());
        let handle = queue.schedule_flush(adapter.clone()).unwrap();
        queue.reset();

        assert_matches!(handle.await, Err(FlushError::Cancelled));
        assert_eq!(adapter.update_count(), 0);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn failed_flush_can_be_restored() {
        let adapter = adapter("");
        adapter.fail_next_update("offline");
        let queue = UpdateQueue::new();
        queue.enqueue("a", Some("1".into()), Options::new());
        queue.enqueue("b", Some("2".into()), Options::new());

        let err = queue.schedule_flush(adapter.clone()).unwrap().await.unwrap_err();
        assert_matches!(&err, FlushError::Adapter { source, .. } => {
            assert_matches!(&**source, AdapterError::UpdateFailed { .. });
        });
        assert_eq!(queue.queued_value("a"), None);

        queue.enqueue("b", Some("newer".into()), Options::new());
        let restored = queue.restore(err.into_batch().unwrap());
        assert_eq!(restored, 1);

        let params = queue.schedule_flush(adapter.clone()).unwrap().await.unwrap();
        assert_eq!(params.to_string(), "a=1&b=newer");
    }

    #[tokio::test(start_paused = true)]
    async fn second_flush_waits_for_throttle() {
        let adapter = Arc::new(TestingAdapter::new("").with_rate_limit_factor(1.0));
        let queue = UpdateQueue::new();

        queue.enqueue("a", Some("1".into()), Options::new());
        queue.schedule_flush(adapter.clone()).unwrap().await.unwrap();
        let first_at = Instant::now();

        queue.enqueue("a", Some("2".into()), Options::new().with_throttle_ms(200));
        queue.schedule_flush(adapter.clone()).unwrap().await.unwrap();

        assert!(first_at.elapsed() >= Duration::from_millis(200));
        assert_eq!(adapter.update_count(), 2);
    }
}
