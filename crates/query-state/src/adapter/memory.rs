//! History-stack adapter kept entirely in memory.
//!
//! Behaves like a browser tab: `push` adds an entry and drops the forward
//! history, `replace` rewrites the current entry, and `back`/`forward` move
//! through the stack. Non-shallow updates are counted as data reloads and
//! `scroll: true` updates as scroll resets, for integrations that react to
//! them.

use super::Adapter;
use crate::encoder::{render_search, split_url};
use crate::error::AdapterResult;
use async_trait::async_trait;
use parking_lot::RwLock;
use query_state_core::{AdapterOptions, HistoryMode, SearchParams};

/// One entry of the history stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub path: String,
    pub search: SearchParams,
}

impl HistoryEntry {
    /// `path?query`, or just the path when there is no query.
    #[must_use]
    pub fn url(&self) -> String {
        format!("{}{}", self.path, render_search(&self.search))
    }
}

#[derive(Debug)]
struct History {
    entries: Vec<HistoryEntry>,
    index: usize,
    reloads: usize,
    scroll_resets: usize,
}

impl History {
    fn current(&self) -> &HistoryEntry {
        &self.entries[self.index]
    }
}

/// In-memory navigation history.
///
/// # Example
///
/// ```rust
/// use query_state::adapter::memory::MemoryHistoryAdapter;
/// use query_state::adapter::Adapter;
/// use query_state_core::{AdapterOptions, HistoryMode, SearchParams};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let history = MemoryHistoryAdapter::new("/search?q=a");
/// let push = AdapterOptions { history: HistoryMode::Push, ..Default::default() };
///
/// history.update_url(&SearchParams::parse("q=b"), &push).await.unwrap();
/// assert_eq!(history.current_url(), "/search?q=b");
///
/// assert!(history.back());
/// assert_eq!(history.current_url(), "/search?q=a");
/// # }
/// ```
#[derive(Debug)]
pub struct MemoryHistoryAdapter {
    history: RwLock<History>,
    rate_limit_factor: f64,
}

impl MemoryHistoryAdapter {
    /// Start with a single entry for `url`; any fragment is ignored.
    pub fn new(url: impl AsRef<str>) -> Self {
        let (path, query, _) = split_url(url.as_ref());
        let entry = HistoryEntry {
            path: path.to_owned(),
            search: SearchParams::parse(query),
        };
        Self {
            history: RwLock::new(History {
                entries: vec![entry],
                index: 0,
                reloads: 0,
                scroll_resets: 0,
            }),
            rate_limit_factor: 1.0,
        }
    }

    #[must_use]
    pub fn with_rate_limit_factor(mut self, factor: f64) -> Self {
        self.rate_limit_factor = factor;
        self
    }

    #[must_use]
    pub fn current(&self) -> HistoryEntry {
        self.history.read().current().clone()
    }

    #[must_use]
    pub fn current_url(&self) -> String {
        self.history.read().current().url()
    }

    /// Number of entries in the stack, including forward history.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.read().entries.len()
    }

    /// Position of the current entry.
    #[must_use]
    pub fn index(&self) -> usize {
        self.history.read().index
    }

    /// Step back one entry. `false` at the start of the history.
    pub fn back(&self) -> bool {
        let mut history = self.history.write();
        if history.index == 0 {
            return false;
        }
        history.index -= 1;
        true
    }

    /// Step forward one entry. `false` at the end of the history.
    pub fn forward(&self) -> bool {
        let mut history = self.history.write();
        if history.index + 1 >= history.entries.len() {
            return false;
        }
        history.index += 1;
        true
    }

    /// Updates applied with `shallow: false`.
    #[must_use]
    pub fn reload_count(&self) -> usize {
        self.history.read().reloads
    }

    /// Updates applied with `scroll: true`.
    #[must_use]
    pub fn scroll_reset_count(&self) -> usize {
        self.history.read().scroll_resets
    }
}

#[async_trait]
impl Adapter for MemoryHistoryAdapter {
    fn search_params(&self) -> SearchParams {
        self.history.read().current().search.clone()
    }

    async fn update_url(&self, search: &SearchParams, options: &AdapterOptions) -> AdapterResult<()> {
        let mut history = self.history.write();
        let entry = HistoryEntry {
            path: history.current().path.clone(),
            search: search.clone(),
        };
        match options.history {
            HistoryMode::Push => {
                let keep = history.index + 1;
                history.entries.truncate(keep);
                history.entries.push(entry);
                history.index = keep;
            }
            HistoryMode::Replace => {
                let index = history.index;
                history.entries[index] = entry;
            }
        }
        if !options.shallow {
            history.reloads += 1;
        }
        if options.scroll {
            history.scroll_resets += 1;
        }
        tracing::trace!(
            url = %history.current().url(),
            history = %options.history,
            "memory history updated"
        );
        Ok(())
    }

    fn rate_limit_factor(&self) -> f64 {
        self.rate_limit_factor
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
