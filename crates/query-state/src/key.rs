//! Named query keys bound to a parser.

use crate::parser::QueryParser;
use query_state_core::{Options, SearchParams};

/// A state key, the URL parameter it is stored under, and its parser.
///
/// The name is what application code refers to; the URL key defaults to the
/// name and can be shortened with [`with_url_key`](Self::with_url_key).
///
/// # Example
///
/// ```rust
/// use query_state::parser::parse_as_integer;
/// use query_state::QueryKey;
/// use query_state_core::SearchParams;
///
/// let page = QueryKey::new("page", parse_as_integer().with_default(1)).with_url_key("p");
///
/// assert_eq!(page.load(&SearchParams::parse("p=4")), 4);
/// assert_eq!(page.load(&SearchParams::parse("page=4")), 1);
/// ```
#[derive(Debug, Clone)]
pub struct QueryKey<P> {
    name: String,
    url_key: Option<String>,
    parser: P,
}

impl<P: QueryParser> QueryKey<P> {
    pub fn new(name: impl Into<String>, parser: P) -> Self {
        Self {
            name: name.into(),
            url_key: None,
            parser,
        }
    }

    #[must_use]
    pub fn with_url_key(mut self, url_key: impl Into<String>) -> Self {
        self.url_key = Some(url_key.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter name in the URL.
    #[must_use]
    pub fn url_key(&self) -> &str {
        self.url_key.as_deref().unwrap_or(&self.name)
    }

    #[must_use]
    pub fn parser(&self) -> &P {
        &self.parser
    }

    /// Decode the key from `params` the way a server would.
    ///
    /// Repeated parameters use their first occurrence.
    pub fn load(&self, params: &SearchParams) -> P::Output {
        self.parser.parse_server_side(params.get(self.url_key()))
    }

    /// Resolve an optional raw value, as read from a queue or a URL.
    pub(crate) fn resolve_raw(&self, raw: Option<&str>) -> P::Output {
        match raw {
            Some(raw) => self.parser.resolve(self.parser.parse(raw)),
            None => self.parser.resolve(None),
        }
    }

    /// Query value to write for `value` under `options`; `None` removes the key.
    pub fn serialize_for_url(&self, value: Option<&P::Value>, options: &Options) -> Option<String> {
        self.parser.serialize_for_url(value, options)
    }
}
