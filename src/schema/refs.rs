//! `$ref` and `$id` helpers.
//!
//! Identifiers may be URIs (`http://example.com/asset.json`) or bare names
//! (`test`). URIs are normalised through [`url::Url`] so that
//! `http://foo` and `http://foo/` address the same document; bare names are
//! kept verbatim.

use url::Url;

/// Split a reference into its URI part and its fragment (without the `#`).
///
/// ```
/// use brrtserializer::schema::split_ref;
///
/// assert_eq!(split_ref("http://foo/test#"), ("http://foo/test", ""));
/// assert_eq!(split_ref("#/definitions/inner"), ("", "/definitions/inner"));
/// assert_eq!(split_ref("test"), ("test", ""));
/// ```
pub fn split_ref(reference: &str) -> (&str, &str) {
    match reference.split_once('#') {
        Some((uri, fragment)) => (uri, fragment),
        None => (reference, ""),
    }
}

/// Canonical form of a document identifier, used as the store key.
pub fn canonical_id(id: &str) -> String {
    let trimmed = id.trim().trim_end_matches('#');
    match Url::parse(trimmed) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => trimmed.to_string(),
    }
}

/// Resolve `uri` against an optional base identifier.
///
/// Absolute URIs win; relative ones are joined onto a URI base; anything else
/// is returned as-is so bare identifiers keep working.
pub fn join_uri(base: Option<&str>, uri: &str) -> String {
    if let Ok(abs) = Url::parse(uri) {
        return canonical_id(abs.as_str());
    }
    if let Some(base_url) = base.and_then(|b| Url::parse(b).ok()) {
        if let Ok(joined) = base_url.join(uri) {
            return canonical_id(joined.as_str());
        }
    }
    canonical_id(uri)
}

/// Escape one reference token for use in a JSON pointer (RFC 6901).
pub fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}
