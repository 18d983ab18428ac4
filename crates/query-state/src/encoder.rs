//! Rendering query params into URL text.
//!
//! [`render_query_string`] keeps values readable: only the characters that
//! would change how the query is split or decoded are escaped, plus control
//! characters and non-ASCII bytes. Commas, slashes and colons stay as they
//! are, so a URL like `?tags=a,b&from=2024-01-31` survives copy and paste
//! intact.
//!
//! The output is the exact inverse of [`SearchParams::parse`]:
//!
//! ```rust
//! use query_state::encoder::{render_query_string, render_search};
//! use query_state_core::SearchParams;
//!
//! let params = SearchParams::from([("q", "a&b c"), ("tags", "x,y"), ("city", "Zürich")]);
//!
//! let query = render_query_string(&params);
//! assert_eq!(query, "q=a%26b+c&tags=x,y&city=Z%C3%BCrich");
//! assert_eq!(SearchParams::parse(&query), params);
//!
//! assert_eq!(render_search(&params), format!("?{query}"));
//! assert_eq!(render_search(&SearchParams::new()), "");
//! ```

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use query_state_core::SearchParams;

/// URL length above which some browsers and servers start truncating.
pub const MAX_URL_LENGTH: usize = 2000;

/// Bytes escaped in values. Spaces are written as `+` separately.
const VALUE_SET: &AsciiSet = &CONTROLS
    .add(b'%')
    .add(b'+')
    .add(b'#')
    .add(b'&')
    .add(b'"')
    .add(b'\'')
    .add(b'`')
    .add(b'<')
    .add(b'>');

/// Keys also escape the characters that end a key or start a query.
const KEY_SET: &AsciiSet = &VALUE_SET.add(b'=').add(b'?');

/// Render `params` as `key=value` pairs joined by `&`, without a leading `?`.
#[must_use]
pub fn render_query_string(params: &SearchParams) -> String {
    let mut out = String::new();
    for (i, (key, value)) in params.iter().enumerate() {
        if i > 0 {
            out.push('&');
        }
        encode_component(&mut out, key, KEY_SET);
        out.push('=');
        encode_component(&mut out, value, VALUE_SET);
    }
    out
}

/// `""` for empty params, otherwise `?` followed by the query string.
///
/// Logs a warning when the result is longer than [`MAX_URL_LENGTH`].
#[must_use]
pub fn render_search(params: &SearchParams) -> String {
    if params.is_empty() {
        return String::new();
    }
    let search = format!("?{}", render_query_string(params));
    if search.len() > MAX_URL_LENGTH {
        tracing::warn!(
            length = search.len(),
            max = MAX_URL_LENGTH,
            "query string exceeds the safe url length"
        );
    }
    search
}

/// Split a URL or path into `(path, query, fragment)`.
///
/// The query is returned without its `?`, the fragment without its `#`.
#[must_use]
pub fn split_url(url: &str) -> (&str, &str, Option<&str>) {
    let (rest, fragment) = match url.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (url, None),
    };
    let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
    (path, query, fragment)
}

fn encode_component(out: &mut String, input: &str, set: &'static AsciiSet) {
    for (i, part) in input.split(' ').enumerate() {
        if i > 0 {
            out.push('+');
        }
        out.extend(utf8_percent_encode(part, set));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn keeps_readable_characters() {
        let params = SearchParams::from([("range", "1,5"), ("path", "/a/b:c"), ("eq", "x=y")]);
        assert_eq!(render_query_string(&params), "range=1,5&path=/a/b:c&eq=x=y");
    }

    #[test]
    fn escapes_structural_characters() {
        let params = SearchParams::from([("v", "50% + #1 & \"q\" 'a' `b` <c>")]);
        assert_eq!(
            render_query_string(&params),
            "v=50%25+%2B+%231+%26+%22q%22+%27a%27+%60b%60+%3Cc%3E"
        );
    }

    #[test]
    fn keys_escape_equals_and_question_mark() {
        let params = SearchParams::from([("a=b?", "c=d?")]);
        assert_eq!(render_query_string(&params), "a%3Db%3F=c=d?");
        assert_eq!(SearchParams::parse(&render_query_string(&params)), params);
    }

    #[test]
    fn control_characters_are_escaped() {
        let params = SearchParams::from([("t", "a\nb\tc\u{7f}")]);
        assert_eq!(render_query_string(&params), "t=a%0Ab%09c%7F");
    }

    #[test]
    fn non_ascii_is_percent_encoded() {
        let params = SearchParams::from([("città", "Zürich \u{85}")]);
        let rendered = render_query_string(&params);
        assert_eq!(rendered, "citt%C3%A0=Z%C3%BCrich+%C2%85");
        assert_eq!(SearchParams::parse(&rendered), params);
    }

    #[test]
    fn empty_values_keep_equals_sign() {
        let params = SearchParams::from([("flag", ""), ("q", "x")]);
        assert_eq!(render_query_string(&params), "flag=&q=x");
    }

    #[test]
    fn repeated_keys_keep_order() {
        let params = SearchParams::parse("tag=b&tag=a&q=1");
        assert_eq!(render_query_string(&params), "tag=b&tag=a&q=1");
    }

    #[test]
    fn split_url_parts() {
        assert_eq!(split_url("/search?q=1#top"), ("/search", "q=1", Some("top")));
        assert_eq!(split_url("/search"), ("/search", "", None));
        assert_eq!(split_url("?q=1"), ("", "q=1", None));
        assert_eq!(split_url("/a#b?c"), ("/a", "", Some("b?c")));
        assert_eq!(
            split_url("https://example.com/x?y=1"),
            ("https://example.com/x", "y=1", None)
        );
    }

    #[test]
    fn long_search_is_still_rendered() {
        let params = SearchParams::from([("q", "x".repeat(MAX_URL_LENGTH))]);
        assert_eq!(render_search(&params).len(), MAX_URL_LENGTH + 3);
    }

    proptest! {
        #[test]
        fn rendering_is_lossless(
            pairs in proptest::collection::vec((".*", ".*"), 0..6)
        ) {
            let params = SearchParams::from(pairs);
            let rendered = render_query_string(&params);
            prop_assert_eq!(SearchParams::parse(&rendered), params);
        }

        #[test]
        fn rendering_is_deterministic(
            pairs in proptest::collection::vec(("[a-z]{1,4}", "[ -~]{0,8}"), 0..6)
        ) {
            let params = SearchParams::from(pairs);
            prop_assert_eq!(render_query_string(&params), render_query_string(&params.clone()));
        }
    }
}
