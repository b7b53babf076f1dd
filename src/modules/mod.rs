//! Module resolution and instantiation subsystem.
//!
//! # Data Flow
//! ```text
//! Cargo.toml [dependencies] + [dev-dependencies]
//!     → manifest.rs (DependencySet, read once)
//!
//! config.plugins / config.middleware
//!     → resolver.rs (installed name or convention path + options)
//!     → catalog.rs (factory registered for that locator)
//!     → instance (plugin side effects, Middleware layer)
//!
//! ctx.controller(name) during request handling
//!     → registry.rs (cached? return)
//!     → ctx.model(name) → registry.rs → catalog.rs model factory
//!     → catalog.rs controller factory(ctx, model)
//!     → cached for the process lifetime
//! ```
//!
//! # Design Decisions
//! - Modules are registered in a table at build time, never loaded from a
//!   path computed at runtime
//! - An unknown middleware or plugin is fatal; an unknown model or
//!   controller is simply `None`

pub mod builtin;
pub mod catalog;
pub mod manifest;
pub mod registry;
pub mod resolver;

pub use catalog::{downcast, AppRouter, Instance, Middleware, ModuleCatalog};
pub use manifest::{DependencySet, ManifestError};
pub use registry::{LazyRegistry, RegistryError};
pub use resolver::{ModuleLocator, ModuleRef, ModuleResolver, ResolveError};
