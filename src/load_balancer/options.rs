//! Construction-time options for [`LoadBalancer`].

use std::fmt;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};

use crate::load_balancer::{balancer::Shared, LbError, LoadBalancer};

/// Turns a dispatch error into the response sent to the client.
pub trait ErrorHandler: Send + Sync + 'static {
    fn handle(&self, request: &Request<Body>, error: &LbError) -> Response;
}

impl<F> ErrorHandler for F
where
    F: Fn(&Request<Body>, &LbError) -> Response + Send + Sync + 'static,
{
    fn handle(&self, request: &Request<Body>, error: &LbError) -> Response {
        self(request, error)
    }
}

/// Responds with `500 Internal Server Error` and the error message as body.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorHandler;

impl ErrorHandler for DefaultErrorHandler {
    fn handle(&self, _request: &Request<Body>, error: &LbError) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()).into_response()
    }
}

/// Observer called with the original request (body detached) and the
/// request about to be forwarded.
pub type RewriteListener = Arc<dyn Fn(&Request<()>, &Request<Body>) + Send + Sync>;

/// Builder for [`LoadBalancer`].
pub struct Builder<F> {
    forwarder: F,
    error_handler: Option<Arc<dyn ErrorHandler>>,
    rewrite_listener: Option<RewriteListener>,
    default_weight: i64,
}

impl<F> Builder<F> {
    pub(crate) fn new(forwarder: F) -> Self {
        Self {
            forwarder,
            error_handler: None,
            rewrite_listener: None,
            default_weight: 1,
        }
    }

    /// Replace the default `500` error responder.
    pub fn error_handler(mut self, handler: impl ErrorHandler) -> Self {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Observe every request right before it is forwarded.
    pub fn rewrite_listener(
        mut self,
        listener: impl Fn(&Request<()>, &Request<Body>) + Send + Sync + 'static,
    ) -> Self {
        self.rewrite_listener = Some(Arc::new(listener));
        self
    }

    /// Weight given to backends upserted without an explicit weight.
    pub fn default_weight(mut self, weight: i64) -> Self {
        self.default_weight = weight;
        self
    }

    pub fn build(self) -> Result<LoadBalancer<F>, LbError> {
        let default_weight = usize::try_from(self.default_weight).map_err(|_| {
            LbError::Configuration(format!(
                "default weight must be non-negative, got {}",
                self.default_weight
            ))
        })?;

        let hooks = Hooks {
            error_handler: self
                .error_handler
                .unwrap_or_else(|| Arc::new(DefaultErrorHandler)),
            rewrite_listener: self.rewrite_listener,
        };

        Ok(LoadBalancer::from_parts(
            self.forwarder,
            Arc::new(Shared::new(default_weight)),
            Arc::new(hooks),
        ))
    }
}

/// Hooks captured at construction time.
pub(crate) struct Hooks {
    pub(crate) error_handler: Arc<dyn ErrorHandler>,
    pub(crate) rewrite_listener: Option<RewriteListener>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("rewrite_listener", &self.rewrite_listener.is_some())
            .finish_non_exhaustive()
    }
}
