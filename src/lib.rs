//! Weighted round-robin reverse proxy library.
//!
//! The core is [`load_balancer::LoadBalancer`]: a mutable, weighted pool of
//! upstream servers with smooth weighted round-robin selection, usable as a
//! `tower::Service` in front of any forwarding service. The other modules
//! turn it into a runnable proxy.

pub mod admin;
pub mod config;
pub mod controller;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load_balancer::{LbError, LoadBalancer};
