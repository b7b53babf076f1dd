//! Application context and bootstrap.
//!
//! # Data Flow
//! ```text
//! ProjectLayout + Environment + ModuleCatalog
//!     → bootstrap.rs (manifest, config, plugins, middleware, routes)
//!     → Application { AppContext, axum::Router }
//!     → http::server (listen)
//! ```

pub mod bootstrap;
pub mod context;
pub mod layout;

pub use bootstrap::{Application, Bootstrap, BootstrapError};
pub use context::AppContext;
pub use layout::ProjectLayout;
