//! Build-time module registration table.
//!
//! Every module an application can load is registered here by name before
//! bootstrap. Lookups return an explicit `None` for unknown names.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::app::AppContext;
use crate::config::DeriveFn;
use crate::modules::resolver::{ModuleLocator, ModuleRef};
use crate::BoxError;

/// A constructed model or controller.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Router type routes and middleware are attached to.
pub type AppRouter = axum::Router<AppContext>;

pub type MiddlewareFactory =
    Arc<dyn Fn(Option<&Value>, &AppContext) -> Result<Middleware, BoxError> + Send + Sync>;
pub type PluginFactory =
    Arc<dyn Fn(Option<&Value>, &AppContext) -> Result<(), BoxError> + Send + Sync>;
pub type ModelFactory = Arc<dyn Fn(&AppContext) -> Result<Instance, BoxError> + Send + Sync>;
pub type ControllerFactory =
    Arc<dyn Fn(&AppContext, Option<Instance>) -> Result<Instance, BoxError> + Send + Sync>;
pub type RouteFn = Arc<dyn Fn(AppRouter, &AppContext) -> AppRouter + Send + Sync>;

/// An instantiated middleware, ready to wrap the router.
pub struct Middleware {
    apply: Box<dyn FnOnce(AppRouter) -> AppRouter + Send>,
}

impl Middleware {
    pub fn new<F>(apply: F) -> Self
    where
        F: FnOnce(AppRouter) -> AppRouter + Send + 'static,
    {
        Self {
            apply: Box::new(apply),
        }
    }

    /// Wrap `router`.
    pub fn apply(self, router: AppRouter) -> AppRouter {
        (self.apply)(router)
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Middleware(..)")
    }
}

/// Downcast an optional instance to a concrete type.
pub fn downcast<T: Any + Send + Sync>(instance: Option<Instance>) -> Option<Arc<T>> {
    instance.and_then(|i| i.downcast::<T>().ok())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Origin {
    External,
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ModuleKey {
    origin: Origin,
    name: String,
}

impl ModuleKey {
    fn new(origin: Origin, name: impl Into<String>) -> Self {
        Self {
            origin,
            name: name.into(),
        }
    }

    fn of(module: &ModuleRef) -> Self {
        let origin = match module.locator {
            ModuleLocator::External(_) => Origin::External,
            ModuleLocator::Local(_) => Origin::Local,
        };
        Self::new(origin, module.name.as_str())
    }
}

/// Registration table for middleware, plugins, models, controllers, derived
/// config units and the route definition.
#[derive(Clone, Default)]
pub struct ModuleCatalog {
    middleware: HashMap<ModuleKey, MiddlewareFactory>,
    plugins: HashMap<ModuleKey, PluginFactory>,
    models: HashMap<String, ModelFactory>,
    controllers: HashMap<String, ControllerFactory>,
    overlays: HashMap<String, DeriveFn>,
    routes: Option<RouteFn>,
}

impl ModuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog pre-populated with the installable built-in modules.
    pub fn with_builtins() -> Self {
        crate::modules::builtin::register(Self::new())
    }

    /// Register middleware available as an installed module.
    pub fn external_middleware<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn(Option<&Value>, &AppContext) -> Result<Middleware, BoxError> + Send + Sync + 'static,
    {
        self.middleware
            .insert(ModuleKey::new(Origin::External, name), Arc::new(factory));
        self
    }

    /// Register middleware living in the project's middleware directory.
    pub fn local_middleware<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn(Option<&Value>, &AppContext) -> Result<Middleware, BoxError> + Send + Sync + 'static,
    {
        self.middleware
            .insert(ModuleKey::new(Origin::Local, name), Arc::new(factory));
        self
    }

    pub fn external_plugin<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn(Option<&Value>, &AppContext) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.plugins
            .insert(ModuleKey::new(Origin::External, name), Arc::new(factory));
        self
    }

    pub fn local_plugin<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn(Option<&Value>, &AppContext) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.plugins
            .insert(ModuleKey::new(Origin::Local, name), Arc::new(factory));
        self
    }

    /// Register a model factory.
    pub fn model<T, F>(mut self, name: &str, factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&AppContext) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        let factory: ModelFactory =
            Arc::new(move |ctx: &AppContext| factory(ctx).map(|model| Arc::new(model) as Instance));
        self.models.insert(name.to_string(), factory);
        self
    }

    /// Register a controller factory. It receives the same-named model.
    pub fn controller<T, F>(mut self, name: &str, factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&AppContext, Option<Instance>) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        let factory: ControllerFactory = Arc::new(move |ctx: &AppContext, model: Option<Instance>| {
            factory(ctx, model).map(|controller| Arc::new(controller) as Instance)
        });
        self.controllers.insert(name.to_string(), factory);
        self
    }

    /// Register a config unit computed from the configuration so far.
    pub fn derived_overlay<F>(mut self, name: &str, derive: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.overlays.insert(name.to_string(), Arc::new(derive));
        self
    }

    /// Set the route definition.
    pub fn routes<F>(mut self, define: F) -> Self
    where
        F: Fn(AppRouter, &AppContext) -> AppRouter + Send + Sync + 'static,
    {
        self.routes = Some(Arc::new(define));
        self
    }

    pub fn middleware_factory(&self, module: &ModuleRef) -> Option<&MiddlewareFactory> {
        self.middleware.get(&ModuleKey::of(module))
    }

    pub fn plugin_factory(&self, module: &ModuleRef) -> Option<&PluginFactory> {
        self.plugins.get(&ModuleKey::of(module))
    }

    pub fn model_factory(&self, name: &str) -> Option<&ModelFactory> {
        self.models.get(name)
    }

    pub fn controller_factory(&self, name: &str) -> Option<&ControllerFactory> {
        self.controllers.get(name)
    }

    pub fn route_fn(&self) -> Option<&RouteFn> {
        self.routes.as_ref()
    }

    pub fn derived_overlays(&self) -> HashMap<String, DeriveFn> {
        self.overlays.clone()
    }
}

impl fmt::Debug for ModuleCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleCatalog")
            .field("middleware", &self.middleware.keys().collect::<Vec<_>>())
            .field("plugins", &self.plugins.keys().collect::<Vec<_>>())
            .field("models", &self.models.keys().collect::<Vec<_>>())
            .field("controllers", &self.controllers.keys().collect::<Vec<_>>())
            .field("overlays", &self.overlays.keys().collect::<Vec<_>>())
            .field("routes", &self.routes.is_some())
            .finish()
    }
}
