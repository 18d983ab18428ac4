//! Building URLs from typed values, outside any session.
//!
//! Useful for links and redirects: start from a base URL, set typed values
//! through their [`QueryKey`]s, and render. Keys the serializer does not
//! touch are kept, as are the path and fragment of the base.
//!
//! # Example
//!
//! ```rust
//! use query_state::parser::{parse_as_integer, parse_as_string};
//! use query_state::{QueryKey, Serializer};
//!
//! let q = QueryKey::new("q", parse_as_string());
//! let page = QueryKey::new("page", parse_as_integer().with_default(1));
//!
//! let url = Serializer::new("/search?lang=en#results")
//!     .set(&q, Some(&"rust async".to_string()))
//!     .set(&page, Some(&1))
//!     .finish();
//!
//! assert_eq!(url, "/search?lang=en&q=rust+async#results");
//! ```

use crate::encoder::{render_search, split_url};
use crate::key::QueryKey;
use crate::parser::QueryParser;
use query_state_core::{Options, SearchParams};
use std::fmt;

/// URL builder applying typed values over a base.
#[derive(Debug, Clone, Default)]
pub struct Serializer {
    path: String,
    params: SearchParams,
    fragment: Option<String>,
    options: Options,
}

impl Serializer {
    /// Start from a path or URL, with optional query and fragment.
    pub fn new(base: impl AsRef<str>) -> Self {
        let (path, query, fragment) = split_url(base.as_ref());
        Self {
            path: path.to_owned(),
            params: SearchParams::parse(query),
            fragment: fragment.map(str::to_owned),
            options: Options::new(),
        }
    }

    /// Start from bare params; the result is a query string only.
    pub fn from_params(params: impl Into<SearchParams>) -> Self {
        Self {
            params: params.into(),
            ..Self::default()
        }
    }

    /// Default for keys whose parser does not set `clear_on_default`.
    #[must_use]
    pub fn with_clear_on_default(mut self, clear_on_default: bool) -> Self {
        self.options = self.options.with_clear_on_default(clear_on_default);
        self
    }

    /// Set `key` to `value`. `None`, or a value equal to the parser's
    /// default, removes the key.
    #[must_use]
    pub fn set<P: QueryParser>(mut self, key: &QueryKey<P>, value: Option<&P::Value>) -> Self {
        let options = self.options.merge(key.parser().options());
        match key.serialize_for_url(value, &options) {
            Some(query) => self.params.set(key.url_key(), query),
            None => self.params.delete(key.url_key()),
        }
        self
    }

    #[must_use]
    pub fn search_params(&self) -> &SearchParams {
        &self.params
    }

    /// Render `path?query#fragment`.
    #[must_use]
    pub fn finish(&self) -> String {
        let mut url = format!("{}{}", self.path, render_search(&self.params));
        if let Some(fragment) = &self.fragment {
            url.push('#');
            url.push_str(fragment);
        }
        url
    }
}

impl fmt::Display for Serializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.finish())
    }
}
