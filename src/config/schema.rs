//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the reverse proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Load balancer settings.
    pub balancer: BalancerConfig,

    /// Upstream forwarding settings.
    pub forward: ForwardConfig,

    /// Backend server definitions, in pool order.
    pub backends: Vec<BackendConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Load balancer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// Weight for backends declared without one. Signed so that a negative
    /// value is reported by validation instead of a parse error.
    pub default_weight: i64,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self { default_weight: 1 }
    }
}

/// Upstream forwarding configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ForwardConfig {
    /// Forward the client's `Host` header instead of the backend's.
    pub pass_host_header: bool,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Time to wait for upstream response headers, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            pass_host_header: false,
            connect_timeout_secs: 5,
            request_timeout_secs: 30,
        }
    }
}

/// Backend server configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Backend URL (e.g., "http://127.0.0.1:3000").
    pub address: String,

    /// Weight for weighted load balancing. Falls back to
    /// `balancer.default_weight` when omitted.
    #[serde(default)]
    pub weight: Option<i64>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter used when `RUST_LOG` is not set (e.g., "info",
    /// "roundrobin_proxy=debug").
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Serve the admin API.
    pub enabled: bool,

    /// Bearer token required by every admin request.
    pub api_key: String,

    /// Bind address of the admin listener.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
