//! Options controlling how a query update is applied to the URL.
//!
//! [`Options`] is deliberately partial: every field is optional so that
//! options declared on a parser, passed to one call, and collected across a
//! batch can be layered on top of each other. The adapter only ever sees the
//! fully resolved [`AdapterOptions`].

use crate::error::QueryStateError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a URL update interacts with the history stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryMode {
    /// Create a new history entry.
    Push,
    /// Overwrite the current history entry.
    #[default]
    Replace,
}

impl HistoryMode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            HistoryMode::Push => "push",
            HistoryMode::Replace => "replace",
        }
    }

    /// Combine two modes of the same batch: `Push` wins over `Replace`.
    #[must_use]
    pub const fn widen(self, other: HistoryMode) -> HistoryMode {
        match (self, other) {
            (HistoryMode::Replace, HistoryMode::Replace) => HistoryMode::Replace,
            _ => HistoryMode::Push,
        }
    }
}

impl fmt::Display for HistoryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryMode {
    type Err = QueryStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "push" => Ok(HistoryMode::Push),
            "replace" => Ok(HistoryMode::Replace),
            other => Err(QueryStateError::invalid_history_mode(other)),
        }
    }
}

/// Partial update options.
///
/// Unset fields fall back to the defaults of [`AdapterOptions`] (replace,
/// shallow, no scroll), to the queue's default throttle, and to clearing
/// values equal to their default.
///
/// # Example
///
/// ```rust
/// use query_state_core::{HistoryMode, Options};
///
/// let parser_opts = Options::new().with_scroll(true);
/// let call_opts = Options::push();
///
/// let merged = parser_opts.merge(&call_opts);
/// assert_eq!(merged.history, Some(HistoryMode::Push));
/// assert_eq!(merged.scroll, Some(true));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Options {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<HistoryMode>,
    /// `false` asks the integration to re-run its data loading.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shallow: Option<bool>,
    /// `true` scrolls to the top after the update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll: Option<bool>,
    /// Minimum spacing between two flushes, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throttle_ms: Option<u64>,
    /// Remove the key from the URL when the value equals the parser default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear_on_default: Option<bool>,
}

impl Options {
    /// Options with every field unset.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            history: None,
            shallow: None,
            scroll: None,
            throttle_ms: None,
            clear_on_default: None,
        }
    }

    /// Shorthand for `Options::new().with_history(HistoryMode::Push)`.
    #[must_use]
    pub const fn push() -> Self {
        Self::new().with_history(HistoryMode::Push)
    }

    /// Shorthand for `Options::new().with_history(HistoryMode::Replace)`.
    #[must_use]
    pub const fn replace() -> Self {
        Self::new().with_history(HistoryMode::Replace)
    }

    #[must_use]
    pub const fn with_history(mut self, history: HistoryMode) -> Self {
        self.history = Some(history);
        self
    }

    #[must_use]
    pub const fn with_shallow(mut self, shallow: bool) -> Self {
        self.shallow = Some(shallow);
        self
    }

    #[must_use]
    pub const fn with_scroll(mut self, scroll: bool) -> Self {
        self.scroll = Some(scroll);
        self
    }

    #[must_use]
    pub const fn with_throttle_ms(mut self, throttle_ms: u64) -> Self {
        self.throttle_ms = Some(throttle_ms);
        self
    }

    #[must_use]
    pub const fn with_clear_on_default(mut self, clear_on_default: bool) -> Self {
        self.clear_on_default = Some(clear_on_default);
        self
    }

    /// Shallow merge: every field set in `overrides` replaces ours.
    ///
    /// This is how per-call options are layered over parser options.
    #[must_use]
    pub fn merge(&self, overrides: &Options) -> Options {
        Options {
            history: overrides.history.or(self.history),
            shallow: overrides.shallow.or(self.shallow),
            scroll: overrides.scroll.or(self.scroll),
            throttle_ms: overrides.throttle_ms.or(self.throttle_ms),
            clear_on_default: overrides.clear_on_default.or(self.clear_on_default),
        }
    }

    /// Batch merge of two writes flushed together.
    ///
    /// The more consequential navigation wins field by field: `push` over
    /// `replace`, `scroll: true` over `false`, `shallow: false` over `true`,
    /// and the longer throttle. `clear_on_default` only matters before a
    /// value is queued, so the later write's setting is kept.
    #[must_use]
    pub fn widen(&self, other: &Options) -> Options {
        Options {
            history: widen_with(self.history, other.history, HistoryMode::widen),
            shallow: widen_with(self.shallow, other.shallow, |a, b| a && b),
            scroll: widen_with(self.scroll, other.scroll, |a, b| a || b),
            throttle_ms: widen_with(self.throttle_ms, other.throttle_ms, u64::max),
            clear_on_default: other.clear_on_default.or(self.clear_on_default),
        }
    }

    /// Fill unset navigation fields with their defaults.
    #[must_use]
    pub fn resolve(&self) -> AdapterOptions {
        let defaults = AdapterOptions::default();
        AdapterOptions {
            history: self.history.unwrap_or(defaults.history),
            shallow: self.shallow.unwrap_or(defaults.shallow),
            scroll: self.scroll.unwrap_or(defaults.scroll),
        }
    }

    /// Whether values equal to their default should be removed from the URL.
    #[must_use]
    pub fn clears_on_default(&self) -> bool {
        self.clear_on_default.unwrap_or(true)
    }
}

fn widen_with<T: Copy>(a: Option<T>, b: Option<T>, f: impl FnOnce(T, T) -> T) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(f(a, b)),
        (a, b) => a.or(b),
    }
}

/// Fully resolved navigation options handed to an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdapterOptions {
    pub history: HistoryMode,
    pub shallow: bool,
    pub scroll: bool,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            history: HistoryMode::Replace,
            shallow: true,
            scroll: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_mode_parse_and_display() {
        assert_eq!("push".parse::<HistoryMode>(), Ok(HistoryMode::Push));
        assert_eq!("replace".parse::<HistoryMode>(), Ok(HistoryMode::Replace));
        assert_eq!(
            "PUSH".parse::<HistoryMode>(),
            Err(QueryStateError::invalid_history_mode("PUSH"))
        );
        assert_eq!(HistoryMode::Push.to_string(), "push");
    }

    #[test]
    fn merge_overrides_only_set_fields() {
        let base = Options::new()
            .with_history(HistoryMode::Push)
            .with_scroll(true)
            .with_throttle_ms(200);
        let merged = base.merge(&Options::new().with_scroll(false));

        assert_eq!(merged.history, Some(HistoryMode::Push));
        assert_eq!(merged.scroll, Some(false));
        assert_eq!(merged.throttle_ms, Some(200));
        assert_eq!(merged.shallow, None);
    }

    #[test]
    fn merge_does_not_mutate_inputs() {
        let base = Options::replace();
        let _ = base.merge(&Options::push());
        assert_eq!(base.history, Some(HistoryMode::Replace));
    }

    #[test]
    fn widen_prefers_push_scroll_and_deep_navigation() {
        let a = Options::replace().with_shallow(true).with_scroll(false);
        let b = Options::push().with_shallow(false);

        let widened = a.widen(&b);
        assert_eq!(widened.history, Some(HistoryMode::Push));
        assert_eq!(widened.shallow, Some(false));
        assert_eq!(widened.scroll, Some(false));

        // Commutative on the navigation fields.
        assert_eq!(b.widen(&a).resolve(), widened.resolve());
    }

    #[test]
    fn widen_keeps_longest_throttle() {
        let a = Options::new().with_throttle_ms(100);
        let b = Options::new().with_throttle_ms(300);
        assert_eq!(a.widen(&b).throttle_ms, Some(300));
        assert_eq!(Options::new().widen(&a).throttle_ms, Some(100));
    }

    #[test]
    fn resolve_defaults() {
        let resolved = Options::new().resolve();
        assert_eq!(resolved, AdapterOptions::default());
        assert_eq!(resolved.history, HistoryMode::Replace);
        assert!(resolved.shallow);
        assert!(!resolved.scroll);
        assert!(Options::new().clears_on_default());
        assert!(!Options::new().with_clear_on_default(false).clears_on_default());
    }

    #[test]
    fn options_serde_camel_case() {
        let opts = Options::push().with_throttle_ms(500);
        let json = serde_json::to_string(&opts).expect("serialize");
        assert_eq!(json, r#"{"history":"push","throttleMs":500}"#);

        let back: Options = serde_json::from_str(r#"{"shallow":false,"clearOnDefault":false}"#)
            .expect("deserialize");
        assert_eq!(back.shallow, Some(false));
        assert_eq!(back.clear_on_default, Some(false));
        assert_eq!(back.history, None);
    }
}
