use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::request::Request;

/// Content type of write request bodies.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Query string that asks the store for its full, encoded key listing.
pub const LIST_KEYS_QUERY: &str = "encode=true&prefix";

/// Characters left as-is when encoding a key or value. Matches the
/// unreserved set of JavaScript's `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Base URL of a key-value store plus the request builders for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    base: String,
}

impl Endpoint {
    /// Wrap a base URL. A single trailing `/` is dropped so that key paths
    /// never contain an empty segment.
    pub fn new(base: impl Into<String>) -> Self {
        let mut base = base.into();
        if base.ends_with('/') {
            base.pop();
        }
        Self { base }
    }

    pub fn as_str(&self) -> &str {
        &self.base
    }

    /// URL addressing a single key.
    pub fn key_url(&self, key: &str) -> String {
        format!("{}/{}", self.base, encode_component(key))
    }

    /// URL returning the key listing.
    pub fn list_url(&self) -> String {
        format!("{}?{}", self.base, LIST_KEYS_QUERY)
    }

    pub fn read(&self, key: &str) -> Request {
        Request::get(self.key_url(key))
    }

    pub fn write(&self, key: &str, raw: &str) -> Request {
        Request::post_form(self.base.clone(), encode_form(key, raw))
    }

    pub fn delete(&self, key: &str) -> Request {
        Request::delete(self.key_url(key))
    }

    pub fn list_keys(&self) -> Request {
        Request::get(self.list_url())
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.base)
    }
}

/// Percent-encode a key or value for use in a path or form body.
pub fn encode_component(input: &str) -> String {
    utf8_percent_encode(input, COMPONENT).to_string()
}

/// Percent-decode `input`. Invalid UTF-8 sequences are replaced.
pub fn decode_component(input: &str) -> String {
    percent_decode_str(input).decode_utf8_lossy().into_owned()
}

/// Build the `key=value` form body of a write request.
pub fn encode_form(key: &str, value: &str) -> String {
    format!("{}={}", encode_component(key), encode_component(value))
}

/// Split a `key=value` form body back into its decoded parts.
///
/// `+` is accepted as an encoded space, as form decoders do.
pub fn decode_form(body: &str) -> Option<(String, String)> {
    let (key, value) = body.split_once('=')?;
    let plus = |s: &str| s.replace('+', " ");
    Some((decode_component(&plus(key)), decode_component(&plus(value))))
}

/// Parse the body of a key listing.
///
/// The whole body is decoded first and then split on newlines. Empty
/// segments (an empty store, a trailing newline) produce no key.
pub fn parse_key_list(body: &str) -> Vec<String> {
    let decoded = decode_component(body);
    decoded
        .split('\n')
        .filter(|segment| !segment.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Method;

    const BASE: &str = "https://kv.example.com/v0/token";

    #[test]
    fn trailing_slash_trimmed() {
        let ep = Endpoint::new(format!("{BASE}/"));
        assert_eq!(ep.as_str(), BASE);
        assert_eq!(Endpoint::new(BASE).as_str(), BASE);
    }

    #[test]
    fn read_encodes_key() {
        let req = Endpoint::new(BASE).read("a b/c");
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.url, format!("{BASE}/a%20b%2Fc"));
        assert!(req.form.is_none());
    }

    #[test]
    fn write_posts_form_to_base() {
        let req = Endpoint::new(BASE).write("k&", "{\"a\":1}");
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.url, BASE);
        assert_eq!(req.form.as_deref(), Some("k%26=%7B%22a%22%3A1%7D"));
    }

    #[test]
    fn delete_and_list_urls() {
        let ep = Endpoint::new(BASE);
        assert_eq!(ep.delete("x").url, format!("{BASE}/x"));
        assert_eq!(ep.delete("x").method, Method::Delete);
        assert_eq!(ep.list_keys().url, format!("{BASE}?encode=true&prefix"));
    }

    #[test]
    fn component_matches_uri_component_set() {
        assert_eq!(encode_component("az-_.!~*'()"), "az-_.!~*'()");
        assert_eq!(encode_component("é="), "%C3%A9%3D");
        assert_eq!(decode_component("%C3%A9%3D"), "é=");
    }

    #[test]
    fn form_decodes_plus_and_percent() {
        let (k, v) = decode_form("a+b=%22x%20y%22").unwrap();
        assert_eq!(k, "a b");
        assert_eq!(v, "\"x y\"");
        assert!(decode_form("no-separator").is_none());
    }

    #[test]
    fn form_keeps_equals_in_value() {
        let body = encode_form("k", "a=b");
        let (k, v) = decode_form(&body).unwrap();
        assert_eq!(k, "k");
        assert_eq!(v, "a=b");
    }

    #[test]
    fn key_list_parsing() {
        assert!(parse_key_list("").is_empty());
        assert_eq!(parse_key_list("a\nb"), vec!["a", "b"]);
        assert_eq!(parse_key_list("a\nb\n"), vec!["a", "b"]);
        assert_eq!(parse_key_list("hello%20world\nx%2Fy"), vec!["hello world", "x/y"]);
    }
}
