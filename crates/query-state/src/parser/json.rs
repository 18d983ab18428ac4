//! JSON values carried in a single query parameter.

use super::{Codec, Parser};
use query_state_core::QueryValue;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

type Validator<T> = Arc<dyn Fn(JsonValue) -> Result<T, String> + Send + Sync>;

/// URI-encoded JSON with a validation step between decoding and the value.
pub struct JsonCodec<T> {
    validate: Validator<T>,
}

impl<T> Clone for JsonCodec<T> {
    fn clone(&self) -> Self {
        Self {
            validate: Arc::clone(&self.validate),
        }
    }
}

impl<T> fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonCodec")
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> Codec for JsonCodec<T>
where
    T: Serialize + QueryValue,
{
    type Value = T;

    fn parse(&self, raw: &str) -> Option<T> {
        let decoded = urlencoding::decode(raw)
            .map_err(|e| tracing::debug!(error = %e, "json query value is not valid utf-8"))
            .ok()?;
        let json: JsonValue = serde_json::from_str(&decoded)
            .map_err(|e| tracing::debug!(error = %e, "json query value did not decode"))
            .ok()?;
        (self.validate)(json)
            .map_err(|reason| tracing::debug!(%reason, "json query value failed validation"))
            .ok()
    }

    fn serialize(&self, value: &T) -> String {
        let json = serde_json::to_string(value).unwrap_or_else(|e| {
            tracing::error!(error = %e, "json query value could not be encoded");
            "null".to_owned()
        });
        urlencoding::encode(&json).into_owned()
    }
}

/// Decode into any `Deserialize` type; a shape mismatch decodes to `None`.
///
/// # Example
///
/// ```rust
/// use query_state::parser::parse_as_json;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// struct Filter {
///     tag: String,
///     min: u32,
/// }
///
/// let filter = parse_as_json::<Filter>();
/// let raw = filter.serialize(&Filter { tag: "rust".into(), min: 2 });
///
/// assert_eq!(raw, "%7B%22tag%22%3A%22rust%22%2C%22min%22%3A2%7D");
/// assert_eq!(filter.parse(&raw), Some(Filter { tag: "rust".into(), min: 2 }));
/// assert_eq!(filter.parse("%7B%22tag%22%3A1%7D"), None);
/// ```
#[must_use]
pub fn parse_as_json<T>() -> Parser<JsonCodec<T>>
where
    T: Serialize + DeserializeOwned + QueryValue,
{
    parse_as_json_with(serde_json::from_value::<T>)
}

/// Decode JSON, then run `validate` on the raw document.
///
/// The validator's error is logged and the value decodes to `None`.
pub fn parse_as_json_with<T, E, F>(validate: F) -> Parser<JsonCodec<T>>
where
    T: Serialize + QueryValue,
    E: fmt::Display,
    F: Fn(JsonValue) -> Result<T, E> + Send + Sync + 'static,
{
    Parser::new(JsonCodec {
        validate: Arc::new(move |json| validate(json).map_err(|e| e.to_string())),
    })
}
