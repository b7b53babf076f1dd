//! Configuration directory watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::handle::ConfigHandle;
use crate::config::loader::reload_environment;
use crate::config::overlay::{OverlayStore, UNIT_EXTENSIONS};
use crate::config::schema::Environment;

/// Watches the config directory and re-merges the environment unit when its
/// file changes.
pub struct ConfigWatcher {
    store: OverlayStore,
    handle: ConfigHandle,
    env: Environment,
    poll_interval: Duration,
}

impl ConfigWatcher {
    pub fn new(store: OverlayStore, handle: ConfigHandle, env: Environment) -> Self {
        Self {
            store,
            handle,
            env,
            poll_interval: Duration::from_secs(2),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let dir = self.store.dir().to_path_buf();
        let units = watched_units(&dir, &self.env);
        let Self {
            store, handle, env, poll_interval,
        } = self;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !(event.kind.is_modify() || event.kind.is_create()) {
                        return;
                    }
                    if event.paths.iter().any(|p| is_environment_unit(p, &env)) {
                        tracing::info!(env = %env, "Environment config change detected, reloading...");
                        // Failures are logged by the reload itself.
                        let _ = reload_environment(&store, &handle, &env);
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(poll_interval),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?dir, units = ?units, "Config watcher started");
        Ok(watcher)
    }
}

/// Whether `path` is one of the files backing the environment unit.
pub fn is_environment_unit(path: &Path, env: &Environment) -> bool {
    let stem_matches = path.file_stem().is_some_and(|stem| stem == env.name());
    let ext_matches = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| UNIT_EXTENSIONS.contains(&ext));
    stem_matches && ext_matches
}

/// Paths that would trigger a reload for `env` under `dir`.
pub fn watched_units(dir: &Path, env: &Environment) -> Vec<PathBuf> {
    UNIT_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{ext}", env.name())))
        .collect()
}
