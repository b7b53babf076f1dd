//! Startup orchestration.
//!
//! # Responsibilities
//! - Read the dependency manifest
//! - Assemble the layered configuration
//! - Build the application context
//! - Run plugins, instantiate middleware, assemble the router
//!
//! # Design Decisions
//! - Fail fast: a missing or failing middleware/plugin aborts startup
//! - Order is fixed: config, plugins, middleware, routes
//! - The first listed middleware is the outermost layer

use axum::Router;
use thiserror::Error;

use crate::admin;
use crate::app::context::AppContext;
use crate::app::layout::ProjectLayout;
use crate::config::schema::{KEY_MIDDLEWARE, KEY_PLUGINS};
use crate::config::{build_config, ConfigHandle, Environment, OverlayStore};
use crate::modules::{
    AppRouter, DependencySet, ManifestError, Middleware, ModuleCatalog, ModuleLocator, ResolveError,
};
use crate::BoxError;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("{kind} `{name}` is not registered (resolved to `{locator}`)")]
    ModuleNotFound {
        kind: &'static str,
        name: String,
        locator: ModuleLocator,
    },

    #[error("failed to initialize {kind} `{name}`: {source}")]
    ModuleInit {
        kind: &'static str,
        name: String,
        #[source]
        source: BoxError,
    },
}

/// Builder for an [`Application`].
pub struct Bootstrap {
    layout: ProjectLayout,
    env: Environment,
    catalog: ModuleCatalog,
    dependencies: Option<DependencySet>,
}

impl Bootstrap {
    pub fn new(layout: ProjectLayout, env: Environment) -> Self {
        Self {
            layout,
            env,
            catalog: ModuleCatalog::new(),
            dependencies: None,
        }
    }

    /// Modules available to the application.
    pub fn catalog(mut self, catalog: ModuleCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Use `dependencies` instead of reading the project manifest.
    pub fn dependencies(mut self, dependencies: DependencySet) -> Self {
        self.dependencies = Some(dependencies);
        self
    }

    /// Run the full initialization sequence.
    pub fn build(self) -> Result<Application, BootstrapError> {
        let Self {
            layout,
            env,
            catalog,
            dependencies,
        } = self;

        let dependencies = match dependencies {
            Some(dependencies) => dependencies,
            None => DependencySet::from_manifest(&layout.manifest)?,
        };

        let overlays = OverlayStore::new(&layout.config_dir).with_derived(catalog.derived_overlays());
        let config = ConfigHandle::new(build_config(&overlays, &env));

        let ctx = AppContext::new(env, layout, config, overlays, dependencies, catalog);
        tracing::info!(
            env = %ctx.env(),
            development = ctx.is_development(),
            production = ctx.is_production(),
            proxy = ctx.proxy(),
            dependencies = ctx.dependencies().len(),
            "Application context ready"
        );

        init_plugins(&ctx)?;
        let middleware = init_middleware(&ctx)?;
        let router = init_routes(&ctx, middleware);

        Ok(Application { ctx, router })
    }
}

fn init_plugins(ctx: &AppContext) -> Result<(), BootstrapError> {
    let plugins = ctx.resolver().resolve_list(KEY_PLUGINS, &ctx.layout().plugin_dir)?;
    for plugin in plugins {
        let factory = ctx
            .catalog()
            .plugin_factory(&plugin)
            .ok_or_else(|| BootstrapError::ModuleNotFound {
                kind: "plugin",
                name: plugin.name.clone(),
                locator: plugin.locator.clone(),
            })?;

        factory(plugin.options.as_ref(), ctx).map_err(|source| BootstrapError::ModuleInit {
            kind: "plugin",
            name: plugin.name.clone(),
            source,
        })?;
        tracing::info!(plugin = %plugin.name, locator = %plugin.locator, "Plugin initialized");
    }
    Ok(())
}

fn init_middleware(ctx: &AppContext) -> Result<Vec<Middleware>, BootstrapError> {
    let modules = ctx.resolver().resolve_list(KEY_MIDDLEWARE, &ctx.layout().middleware_dir)?;
    let mut middleware = Vec::with_capacity(modules.len());
    for module in modules {
        let factory = ctx
            .catalog()
            .middleware_factory(&module)
            .ok_or_else(|| BootstrapError::ModuleNotFound {
                kind: "middleware",
                name: module.name.clone(),
                locator: module.locator.clone(),
            })?;

        let instance = factory(module.options.as_ref(), ctx).map_err(|source| {
            BootstrapError::ModuleInit {
                kind: "middleware",
                name: module.name.clone(),
                source,
            }
        })?;
        tracing::info!(middleware = %module.name, locator = %module.locator, "Middleware initialized");
        middleware.push(instance);
    }
    Ok(middleware)
}

fn init_routes(ctx: &AppContext, middleware: Vec<Middleware>) -> Router {
    let mut router: AppRouter = Router::new();
    match ctx.catalog().route_fn() {
        Some(define) => router = define(router, ctx),
        None => tracing::warn!(
            routes_dir = %ctx.layout().routes_dir.display(),
            "No route definition registered"
        ),
    }

    router = router.merge(admin::reload_router(ctx));

    // `layer` wraps everything added so far, so the last applied is outermost.
    for layer in middleware.into_iter().rev() {
        router = layer.apply(router);
    }

    router.with_state(ctx.clone())
}

/// A bootstrapped application: its context and its router.
pub struct Application {
    ctx: AppContext,
    router: Router,
}

impl Application {
    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn into_parts(self) -> (AppContext, Router) {
        (self.ctx, self.router)
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application").field("ctx", &self.ctx).finish()
    }
}
