//! Request rewriting towards a selected backend.
//!
//! # Responsibilities
//! - Compose the upstream target from the backend URL and the original URI
//! - Build the outgoing request, keeping the original for observers
//!
//! # Design Decisions
//! - Only scheme and authority come from the backend; path and query are
//!   the client's
//! - Backend credentials are never copied into the target authority
//! - Headers are merged additively, see [`copy_headers`]

use axum::{
    body::Body,
    http::{Request, Uri},
};
use url::Url;

use crate::http::headers::copy_headers;
use crate::load_balancer::LbError;

/// Point `original` at `backend`, keeping the original path and query.
pub fn target_uri(original: &Uri, backend: &Url) -> Result<Uri, LbError> {
    let invalid = || LbError::InvalidAddress(backend.to_string());

    let host = backend.host_str().ok_or_else(invalid)?;
    let authority = match backend.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    let path_and_query = original
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    Uri::builder()
        .scheme(backend.scheme())
        .authority(authority.as_str())
        .path_and_query(path_and_query)
        .build()
        .map_err(|_| invalid())
}

/// Split `request` into its original head (body detached) and a new
/// request aimed at `target` that owns the body.
pub fn into_forwarded(request: Request<Body>, target: Uri) -> (Request<()>, Request<Body>) {
    let (mut parts, body) = request.into_parts();

    let mut outgoing = Request::new(body);
    *outgoing.method_mut() = parts.method.clone();
    *outgoing.uri_mut() = target;
    *outgoing.version_mut() = parts.version;
    *outgoing.extensions_mut() = std::mem::take(&mut parts.extensions);
    copy_headers(outgoing.headers_mut(), &parts.headers);

    (Request::from_parts(parts, ()), outgoing)
}
