//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → proxy listener, admin listener and controller stop
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
