//! Pool reconciliation from configuration.
//!
//! Applies the backend list of a [`ProxyConfig`] to a running
//! [`LoadBalancer`] through ordinary registry calls, the same way any other
//! external controller (health checker, service discovery) would.

use tokio::sync::{broadcast, mpsc};
use url::Url;

use crate::config::ProxyConfig;
use crate::load_balancer::{backend::normalize, LbError, LoadBalancer};

/// Make the pool of `lb` match the backends of `config`.
///
/// The default weight is applied first so that backends without an explicit
/// weight pick it up. Configured backends are upserted in file order, then
/// pool members missing from the file are removed. Every problem is
/// reported; the remaining changes are still applied.
pub fn reconcile<F>(lb: &LoadBalancer<F>, config: &ProxyConfig) -> Result<(), Vec<LbError>> {
    let mut errors = Vec::new();

    if let Err(e) = lb.set_default_weight(config.balancer.default_weight) {
        errors.push(e);
    }

    let mut wanted = Vec::with_capacity(config.backends.len());
    for backend in &config.backends {
        let url = match Url::parse(&backend.address) {
            Ok(url) => url,
            Err(_) => {
                errors.push(LbError::InvalidAddress(backend.address.clone()));
                continue;
            }
        };

        // A rejected update still keeps an already registered backend.
        wanted.extend(normalize(&url).ok());
        if let Err(e) = lb.upsert_server(&url, backend.weight) {
            errors.push(e);
        }
    }

    for url in lb.servers() {
        let keep = normalize(&url).is_ok_and(|address| wanted.contains(&address));
        if !keep {
            if let Err(e) = lb.remove_server(&url) {
                errors.push(e);
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Apply every configuration received on `updates` until shutdown.
pub async fn run<F>(
    lb: LoadBalancer<F>,
    mut updates: mpsc::UnboundedReceiver<ProxyConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(config) = update else {
                    break;
                };
                match reconcile(&lb, &config) {
                    Ok(()) => tracing::info!(servers = lb.servers().len(), "Backend pool reconciled"),
                    Err(errors) => {
                        for e in errors {
                            tracing::warn!(error = %e, "Backend pool reconciliation problem");
                        }
                    }
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Controller received shutdown signal, exiting loop");
                break;
            }
        }
    }
}
