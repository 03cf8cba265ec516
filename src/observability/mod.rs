//! Observability subsystem.
//!
//! # Design Decisions
//! - Structured `tracing` events from every subsystem
//! - `RUST_LOG` overrides the configured filter
//! - HTTP access spans come from `tower_http::trace::TraceLayer`

pub mod logging;

pub use logging::init_logging;
