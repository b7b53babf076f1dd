//! Layered configuration subsystem.
//!
//! # Data Flow
//! ```text
//! seed {proxy, env, extendConfigs: ["[env]"]}
//!     → overlay.rs ("default" unit)
//!     → overlay.rs (each extendConfigs unit, "[env]" expanded, in order)
//!     → merge.rs (deep merge into the accumulating value)
//!     → handle.rs (ConfigHandle shared by every component)
//!
//! On reload (GET /__reload or watcher.rs):
//!     evict cached environment unit
//!     → re-read it from storage
//!     → merge into a copy of the live value
//!     → atomic swap inside the ConfigHandle
//! ```
//!
//! # Design Decisions
//! - A missing or broken unit is logged and skipped, never fatal
//! - Reload is an incremental re-merge, not a rebuild from `default`
//! - Units are TOML (or JSON) files, or derived units registered in code

pub mod handle;
pub mod loader;
pub mod merge;
pub mod overlay;
pub mod schema;
pub mod watcher;

pub use handle::ConfigHandle;
pub use loader::{build_config, reload_environment};
pub use merge::deep_merge;
pub use overlay::{DeriveFn, OverlayError, OverlayStore, OverlayUnit};
pub use schema::Environment;
pub use watcher::ConfigWatcher;
