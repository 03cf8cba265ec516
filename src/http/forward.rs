//! Upstream forwarding.
//!
//! # Responsibilities
//! - Send the rewritten request to the selected backend
//! - Strip hop-by-hop headers in both directions
//! - Tag requests with `X-Request-ID` and `X-Forwarded-Host`
//! - Map transport failures to gateway errors
//!
//! # Design Decisions
//! - No retries: the balancer already consumed the pick
//! - Timeouts cover the whole exchange up to response headers

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tower::Service;

use crate::config::ForwardConfig;
use crate::http::headers::{has_headers, remove_headers, HOP_HEADERS};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");

/// Transport-level failure.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> Response {
        match self {
            ForwardError::Upstream(_) => {
                (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
            }
            ForwardError::Timeout(_) => {
                (StatusCode::GATEWAY_TIMEOUT, "Upstream request timed out").into_response()
            }
        }
    }
}

/// HTTP forwarder backed by a pooled hyper client.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    pass_host_header: bool,
    timeout: Duration,
}

impl Forwarder {
    pub fn new(config: &ForwardConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));

        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            client,
            pass_host_header: config.pass_host_header,
            timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    /// Forward `request` and relay the upstream response.
    pub async fn forward(&self, mut request: Request<Body>) -> Response {
        prepare_headers(&mut request, self.pass_host_header);

        let request_id = request
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        let uri = request.uri().clone();

        match self.send(request).await {
            Ok(mut response) => {
                tracing::debug!(
                    request_id = %request_id,
                    upstream = %uri,
                    status = %response.status(),
                    "Upstream responded"
                );
                if has_headers(&HOP_HEADERS, response.headers()) {
                    remove_headers(response.headers_mut(), &HOP_HEADERS);
                }
                response
            }
            Err(e) => {
                tracing::error!(request_id = %request_id, upstream = %uri, error = %e, "Upstream error");
                e.into_response()
            }
        }
    }

    async fn send(&self, request: Request<Body>) -> Result<Response, ForwardError> {
        let response: hyper::Response<Incoming> =
            tokio::time::timeout(self.timeout, self.client.request(request))
                .await
                .map_err(|_| ForwardError::Timeout(self.timeout))??;

        let (parts, body) = response.into_parts();
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

/// Strip hop-by-hop headers, add the request id and record the client's
/// `Host`. Unless `pass_host_header` is set the `Host` header is dropped so
/// the client fills it in from the backend address.
fn prepare_headers(request: &mut Request<Body>, pass_host_header: bool) {
    let headers = request.headers_mut();

    if has_headers(&HOP_HEADERS, headers) {
        remove_headers(headers, &HOP_HEADERS);
    }

    if !headers.contains_key(X_REQUEST_ID) {
        let id = uuid::Uuid::new_v4().to_string();
        if let Ok(value) = HeaderValue::from_str(&id) {
            headers.insert(X_REQUEST_ID, value);
        }
    }

    if let Some(host) = headers.get(header::HOST).cloned() {
        headers.append(X_FORWARDED_HOST, host);
        if !pass_host_header {
            headers.remove(header::HOST);
        }
    }
}

impl Service<Request<Body>> for Forwarder {
    type Response = Response;

    type Error = Infallible;

    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let forwarder = self.clone();
        Box::pin(async move { Ok(forwarder.forward(request).await) })
    }
}
