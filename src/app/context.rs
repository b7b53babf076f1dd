//! Application context shared by every component.

use std::any::Any;
use std::sync::{Arc, Mutex, PoisonError};

use crate::app::layout::ProjectLayout;
use crate::config::{reload_environment, schema, ConfigHandle, Environment, OverlayError, OverlayStore};
use crate::modules::{
    downcast, DependencySet, Instance, LazyRegistry, ModuleCatalog, ModuleResolver, RegistryError,
};

/// Handle to the application: environment, live configuration, module
/// catalog and the model/controller registries.
///
/// Cloning is cheap and every clone refers to the same state.
#[derive(Clone)]
pub struct AppContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    env: Environment,
    layout: ProjectLayout,
    config: ConfigHandle,
    overlays: OverlayStore,
    resolver: ModuleResolver,
    catalog: ModuleCatalog,
    models: LazyRegistry,
    controllers: LazyRegistry,
    resources: Mutex<Vec<Box<dyn Any + Send>>>,
}

impl AppContext {
    pub fn new(
        env: Environment,
        layout: ProjectLayout,
        config: ConfigHandle,
        overlays: OverlayStore,
        dependencies: DependencySet,
        catalog: ModuleCatalog,
    ) -> Self {
        let resolver = ModuleResolver::new(dependencies, config.clone());
        Self {
            inner: Arc::new(ContextInner {
                env,
                layout,
                config,
                overlays,
                resolver,
                catalog,
                models: LazyRegistry::new("model"),
                controllers: LazyRegistry::new("controller"),
                resources: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn env(&self) -> &Environment {
        &self.inner.env
    }

    pub fn is_development(&self) -> bool {
        self.inner.env.is_development()
    }

    pub fn is_production(&self) -> bool {
        self.inner.env.is_production()
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.inner.layout
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.inner.config
    }

    pub fn overlays(&self) -> &OverlayStore {
        &self.inner.overlays
    }

    pub fn resolver(&self) -> &ModuleResolver {
        &self.inner.resolver
    }

    pub fn dependencies(&self) -> &DependencySet {
        self.inner.resolver.dependencies()
    }

    pub fn catalog(&self) -> &ModuleCatalog {
        &self.inner.catalog
    }

    /// `config.name`, if set.
    pub fn name(&self) -> Option<String> {
        schema::app_name(&self.inner.config.load()).map(str::to_string)
    }

    /// Signing keys from `config.keys`.
    pub fn keys(&self) -> Vec<String> {
        schema::signing_keys(&self.inner.config.load())
    }

    /// Whether the app trusts proxy headers (`config.proxy`).
    pub fn proxy(&self) -> bool {
        schema::proxy_enabled(&self.inner.config.load())
    }

    pub fn models(&self) -> &LazyRegistry {
        &self.inner.models
    }

    pub fn controllers(&self) -> &LazyRegistry {
        &self.inner.controllers
    }

    /// The model registered as `name`, constructed on first use.
    pub async fn model(&self, name: &str) -> Result<Option<Instance>, RegistryError> {
        self.inner
            .models
            .get_or_init(name, || async {
                let Some(factory) = self.inner.catalog.model_factory(name) else {
                    tracing::debug!(model = name, "No model registered");
                    return Ok(None);
                };
                tracing::debug!(
                    model = name,
                    path = %self.inner.layout.models_dir.join(name).display(),
                    "Constructing model"
                );
                factory(self).map(Some)
            })
            .await
    }

    /// The controller registered as `name`, constructed on first use with
    /// the same-named model injected.
    pub async fn controller(&self, name: &str) -> Result<Option<Instance>, RegistryError> {
        self.inner
            .controllers
            .get_or_init(name, || async {
                let model = self.model(name).await?;
                let Some(factory) = self.inner.catalog.controller_factory(name) else {
                    tracing::debug!(controller = name, "No controller registered");
                    return Ok(None);
                };
                tracing::debug!(
                    controller = name,
                    path = %self.inner.layout.controllers_dir.join(name).display(),
                    with_model = model.is_some(),
                    "Constructing controller"
                );
                factory(self, model).map(Some)
            })
            .await
    }

    /// Typed [`AppContext::model`]. A model of another type yields `None`.
    pub async fn model_as<T: Any + Send + Sync>(&self, name: &str) -> Result<Option<Arc<T>>, RegistryError> {
        Ok(downcast(self.model(name).await?))
    }

    /// Typed [`AppContext::controller`]. A controller of another type yields `None`.
    pub async fn controller_as<T: Any + Send + Sync>(
        &self,
        name: &str,
    ) -> Result<Option<Arc<T>>, RegistryError> {
        Ok(downcast(self.controller(name).await?))
    }

    /// Re-read the environment unit and merge it into the live configuration.
    pub fn reload_config(&self) -> Result<(), OverlayError> {
        reload_environment(&self.inner.overlays, &self.inner.config, &self.inner.env)
    }

    /// Keep `resource` alive as long as the context.
    pub fn retain<R: Any + Send>(&self, resource: R) {
        self.inner
            .resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(resource));
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("env", &self.inner.env)
            .field("root", &self.inner.layout.root)
            .field("models", &self.inner.models)
            .field("controllers", &self.inner.controllers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Users {
        table: &'static str,
    }

    struct UsersController {
        model: Option<Arc<Users>>,
    }

    fn context(catalog: ModuleCatalog) -> AppContext {
        AppContext::new(
            Environment::new("test"),
            ProjectLayout::new("/srv/app"),
            ConfigHandle::new(json!({ "keys": ["s3cret"], "proxy": true, "name": "shop" })),
            OverlayStore::new("/srv/app/config"),
            DependencySet::default(),
            catalog,
        )
    }

    #[tokio::test]
    async fn test_model_factory_runs_once_across_controller_lookups() {
        let model_calls = Arc::new(AtomicUsize::new(0));
        let controller_calls = Arc::new(AtomicUsize::new(0));
        let (mc, cc) = (model_calls.clone(), controller_calls.clone());

        let ctx = context(
            ModuleCatalog::new()
                .model("users", move |_ctx| {
                    mc.fetch_add(1, Ordering::SeqCst);
                    Ok(Users { table: "users" })
                })
                .controller("users", move |_ctx, model| {
                    cc.fetch_add(1, Ordering::SeqCst);
                    Ok(UsersController { model: downcast(model) })
                }),
        );

        let first = ctx.controller_as::<UsersController>("users").await.unwrap().unwrap();
        let second = ctx.controller_as::<UsersController>("users").await.unwrap().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.model.as_ref().unwrap().table, "users");
        assert_eq!(model_calls.load(Ordering::SeqCst), 1);
        assert_eq!(controller_calls.load(Ordering::SeqCst), 1);

        let model = ctx.model_as::<Users>("users").await.unwrap().unwrap();
        assert!(Arc::ptr_eq(&model, first.model.as_ref().unwrap()));
        assert_eq!(model_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_controller_lookups_construct_once() {
        let model_calls = Arc::new(AtomicUsize::new(0));
        let controller_calls = Arc::new(AtomicUsize::new(0));
        let (mc, cc) = (model_calls.clone(), controller_calls.clone());

        let ctx = context(
            ModuleCatalog::new()
                .model("orders", move |_ctx| {
                    mc.fetch_add(1, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(50));
                    Ok(Users { table: "orders" })
                })
                .controller("orders", move |_ctx, model| {
                    cc.fetch_add(1, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(20));
                    Ok(UsersController { model: downcast(model) })
                }),
        );

        let mut lookups = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let ctx = ctx.clone();
            lookups.spawn(async move { ctx.controller_as::<UsersController>("orders").await });
        }

        let mut controllers = Vec::new();
        while let Some(joined) = lookups.join_next().await {
            controllers.push(joined.unwrap().unwrap().unwrap());
        }

        assert_eq!(controllers.len(), 8);
        assert!(controllers.iter().all(|c| Arc::ptr_eq(c, &controllers[0])));
        assert_eq!(controllers[0].model.as_ref().unwrap().table, "orders");
        assert_eq!(model_calls.load(Ordering::SeqCst), 1);
        assert_eq!(controller_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_controller_without_model() {
        let ctx = context(
            ModuleCatalog::new()
                .controller("health", |_ctx, model| Ok(model.is_none())),
        );

        let saw_no_model = ctx.controller_as::<bool>("health").await.unwrap().unwrap();
        assert!(*saw_no_model);
        assert!(matches!(ctx.models().cached("health"), Some(None)));
    }

    #[tokio::test]
    async fn test_unknown_names_resolve_to_none() {
        let ctx = context(ModuleCatalog::new());
        assert!(ctx.model("ghost").await.unwrap().is_none());
        assert!(ctx.controller("ghost").await.unwrap().is_none());
        assert_eq!(ctx.controllers().resolved(), 1);
    }

    #[tokio::test]
    async fn test_model_error_surfaces_through_controller() {
        let ctx = context(
            ModuleCatalog::new()
                .model::<Users, _>("orders", |_ctx| Err("connection refused".into()))
                .controller("orders", |_ctx, _model| Ok(())),
        );

        let err = ctx.controller("orders").await.unwrap_err();
        assert!(err.to_string().contains("controller `orders`"));
        assert!(ctx.controllers().cached("orders").is_none());
    }

    #[test]
    fn test_config_accessors() {
        let ctx = context(ModuleCatalog::new());
        assert_eq!(ctx.keys(), vec!["s3cret"]);
        assert!(ctx.proxy());
        assert_eq!(ctx.name().as_deref(), Some("shop"));
        assert!(!ctx.is_development());
        assert!(!ctx.is_production());
    }

    #[test]
    fn test_retain_keeps_resource() {
        let ctx = context(ModuleCatalog::new());
        let marker = Arc::new(());
        ctx.retain(marker.clone());
        assert_eq!(Arc::strong_count(&marker), 2);
        drop(ctx);
        assert_eq!(Arc::strong_count(&marker), 1);
    }
}
