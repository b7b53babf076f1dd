//! Observability.
//!
//! Every subsystem logs through `tracing` with structured fields; the
//! binaries install the subscriber from `logging.rs`.

pub mod logging;
