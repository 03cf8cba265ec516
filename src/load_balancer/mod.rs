//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Admin / controller
//!     → balancer.rs (upsert_server, remove_server, set_default_weight)
//!     → pool.rs (ordered, address-unique backends)
//!     → round_robin.rs (scheduler state reset)
//!
//! Request
//!     → balancer.rs (dispatch)
//!     → round_robin.rs (pick next backend under the pool lock)
//!     → http::request (rewrite target, merge headers)
//!     → forwarder (any tower Service), or ErrorHandler on failure
//! ```
//!
//! # Design Decisions
//! - Pool and scheduler share one lock; it is never held across I/O
//! - Scheduler state is recomputed on every mutation, never patched
//! - Hooks (error handler, rewrite listener) are injected at build time

pub mod backend;
pub mod balancer;
pub mod error;
pub mod options;
pub mod pool;
pub mod round_robin;

pub use backend::Backend;
pub use balancer::LoadBalancer;
pub use error::LbError;
pub use options::{Builder, DefaultErrorHandler, ErrorHandler, RewriteListener};
