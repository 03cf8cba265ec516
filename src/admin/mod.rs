//! Admin API.
//!
//! JSON endpoints driving the backend registry of a running proxy. Every
//! route requires `Authorization: Bearer <admin.api_key>`.
//!
//! ```text
//! GET    /admin/status
//! GET    /admin/backends
//! PUT    /admin/backends                   {"address": "...", "weight": 3}
//! DELETE /admin/backends?address=...
//! GET    /admin/backends/weight?address=...
//! PUT    /admin/default-weight             {"weight": 1}
//! ```

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, put},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::load_balancer::LoadBalancer;

/// State shared by admin handlers.
#[derive(Debug, Clone)]
pub struct AdminState<F> {
    pub lb: LoadBalancer<F>,
}

pub fn setup_admin_router<F>(lb: LoadBalancer<F>, api_key: &str) -> Router
where
    F: Clone + Send + Sync + 'static,
{
    let api_key: Arc<str> = Arc::from(api_key);

    Router::new()
        .route("/admin/status", get(get_status::<F>))
        .route(
            "/admin/backends",
            get(get_backends::<F>)
                .put(upsert_backend::<F>)
                .delete(remove_backend::<F>),
        )
        .route("/admin/backends/weight", get(get_backend_weight::<F>))
        .route("/admin/default-weight", put(set_default_weight::<F>))
        .layer(middleware::from_fn_with_state(api_key, admin_auth_middleware))
        .with_state(AdminState { lb })
}
