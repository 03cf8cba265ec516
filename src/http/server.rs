//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the load balancer and its forwarder from configuration
//! - Serve proxied traffic with the balancer as the fallback service
//! - Serve the admin API on its own listener when enabled
//! - Stop both listeners on shutdown

use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use url::Url;

use crate::admin::setup_admin_router;
use crate::config::ProxyConfig;
use crate::http::forward::Forwarder;
use crate::lifecycle::Shutdown;
use crate::load_balancer::{LbError, LoadBalancer};

/// HTTP server for the reverse proxy.
pub struct HttpServer {
    config: ProxyConfig,
    lb: LoadBalancer<Forwarder>,
}

impl HttpServer {
    /// Build the load balancer and register the configured backends.
    pub fn new(config: ProxyConfig) -> Result<Self, LbError> {
        let lb = LoadBalancer::builder(Forwarder::new(&config.forward))
            .default_weight(config.balancer.default_weight)
            .build()?;

        for backend in &config.backends {
            let url = Url::parse(&backend.address)
                .map_err(|_| LbError::InvalidAddress(backend.address.clone()))?;
            lb.upsert_server(&url, backend.weight)?;
        }

        Ok(Self { config, lb })
    }

    /// Handle to the load balancer, e.g. for a config controller.
    pub fn load_balancer(&self) -> &LoadBalancer<Forwarder> {
        &self.lb
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    fn proxy_router(&self) -> axum::Router {
        axum::Router::new()
            .fallback_service(self.lb.clone())
            .layer(TraceLayer::new_for_http())
    }

    fn admin_router(&self) -> axum::Router {
        setup_admin_router(self.lb.clone(), &self.config.admin.api_key)
            .layer(TraceLayer::new_for_http())
    }

    /// Serve traffic on `listener`, and the admin API on `admin_listener`
    /// if one is given, until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        admin_listener: Option<TcpListener>,
        shutdown: Shutdown,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            servers = self.lb.servers().len(),
            "HTTP server starting"
        );

        let admin = match admin_listener {
            Some(admin_listener) => {
                tracing::info!(address = %admin_listener.local_addr()?, "Admin API starting");
                let router = self.admin_router();
                let wait = shutdown.wait();
                Some(tokio::spawn(async move {
                    axum::serve(admin_listener, router)
                        .with_graceful_shutdown(wait)
                        .await
                }))
            }
            None => None,
        };

        axum::serve(listener, self.proxy_router())
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        if let Some(admin) = admin {
            match admin.await {
                Ok(result) => result?,
                Err(e) => tracing::error!(error = %e, "Admin API task failed"),
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
