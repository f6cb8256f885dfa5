//! Resolution of request keys against a configured base URL.

/// Resolves a raw request key to a fetchable URL.
///
/// Keys beginning with a path separator are joined onto `base_url`
/// (tolerating a trailing slash on the base); every other key is used
/// verbatim.
#[must_use]
pub fn resolve_key(raw: &str, base_url: &str) -> String {
    if let Some(rest) = raw.strip_prefix('/') {
        let base = base_url.trim_end_matches('/');
        format!("{base}/{rest}")
    } else {
        raw.to_string()
    }
}
