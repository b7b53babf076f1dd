//! Application bootstrapper.
//!
//! Builds a layered runtime configuration from a project's config directory,
//! resolves plugins, middleware, models and controllers by name from a
//! build-time catalog, and assembles an axum router with a loopback-only
//! configuration hot-reload endpoint.

pub mod admin;
pub mod app;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod modules;
pub mod observability;

/// Error type returned by module factories and derived config units.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub use app::{AppContext, Application, Bootstrap, BootstrapError, ProjectLayout};
pub use config::{ConfigHandle, Environment};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use modules::ModuleCatalog;
