//! Header copy helpers used when rewriting and forwarding requests.

use axum::http::{header, HeaderMap, HeaderName};

/// Hop-by-hop headers, meaningful only for a single connection.
pub const HOP_HEADERS: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Copy every header from `src` into `dst`. Existing values in `dst` are
/// kept and repeated header names keep all their values.
pub fn copy_headers(dst: &mut HeaderMap, src: &HeaderMap) {
    for (name, value) in src {
        dst.append(name.clone(), value.clone());
    }
}

/// Whether any of `names` is present with a non-empty value.
pub fn has_headers(names: &[HeaderName], headers: &HeaderMap) -> bool {
    names.iter().any(|name| {
        headers
            .get(name)
            .is_some_and(|value| !value.as_bytes().is_empty())
    })
}

/// Remove all values of the given headers.
pub fn remove_headers(headers: &mut HeaderMap, names: &[HeaderName]) {
    for name in names {
        headers.remove(name);
    }
}
