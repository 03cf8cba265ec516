//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and weights
//! - Detect backends that collapse to the same pool entry
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;
use crate::load_balancer::backend::normalize;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid bind address {value:?}")]
    BindAddress { field: &'static str, value: String },

    #[error("balancer.default_weight must be non-negative, got {0}")]
    DefaultWeight(i64),

    #[error("backend {0:?} is not a valid backend URL")]
    BackendAddress(String),

    #[error("backend {address:?} has negative weight {weight}")]
    BackendWeight { address: String, weight: i64 },

    #[error("backend {0:?} is declared more than once")]
    DuplicateBackend(String),

    #[error("admin.api_key must be set when the admin API is enabled")]
    MissingApiKey,
}

/// Check `config`, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.balancer.default_weight < 0 {
        errors.push(ValidationError::DefaultWeight(config.balancer.default_weight));
    }

    let mut seen = HashSet::new();
    for backend in &config.backends {
        match Url::parse(&backend.address).ok().and_then(|url| normalize(&url).ok()) {
            Some(address) => {
                if !seen.insert(address) {
                    errors.push(ValidationError::DuplicateBackend(backend.address.clone()));
                }
            }
            None => errors.push(ValidationError::BackendAddress(backend.address.clone())),
        }

        if let Some(weight) = backend.weight.filter(|w| *w < 0) {
            errors.push(ValidationError::BackendWeight {
                address: backend.address.clone(),
                weight,
            });
        }
    }

    if config.admin.enabled {
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::BindAddress {
                field: "admin.bind_address",
                value: config.admin.bind_address.clone(),
            });
        }
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::MissingApiKey);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
