//! Lifecycle management.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger() → every subscribed server stops accepting and drains
//!
//! Signals (signals.rs):
//!     SIGINT → graceful shutdown
//!     SIGTERM → Shutdown::trigger
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
