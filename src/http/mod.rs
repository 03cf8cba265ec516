//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum setup, LoadBalancer as fallback service)
//!     → [load balancer picks server]
//!     → request.rs (rewrite target, merge headers)
//!     → forward.rs (strip hop-by-hop headers, call upstream)
//!     → Send upstream response to client
//! ```

pub mod forward;
pub mod headers;
pub mod request;
pub mod server;

pub use forward::{ForwardError, Forwarder};
pub use server::HttpServer;
