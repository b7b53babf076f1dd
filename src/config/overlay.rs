//! Overlay units and the unit store.
//!
//! # Responsibilities
//! - Locate a named unit: derived units registered in code, otherwise
//!   `<config_dir>/<name>.toml` or `<config_dir>/<name>.json`
//! - Cache parsed file units by name until explicitly evicted
//! - Evaluate a unit against the configuration accumulated so far
//! - Deep-merge the payload into a target value
//!
//! # Design Decisions
//! - A failed overlay never aborts the caller: `load_overlay` logs and
//!   leaves the target untouched
//! - Derived units are evaluated on every load, never cached
//! - The payload of every unit must be a mapping

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use thiserror::Error;

use crate::config::merge::deep_merge;
use crate::BoxError;

/// File extensions tried, in order, for a file-backed unit.
pub const UNIT_EXTENSIONS: [&str; 2] = ["toml", "json"];

/// Function computing an overlay payload from the configuration so far.
pub type DeriveFn = Arc<dyn Fn(&Value) -> Result<Value, BoxError> + Send + Sync>;

/// A named configuration source.
#[derive(Clone)]
pub enum OverlayUnit {
    /// Payload known up front (file contents).
    Static(Value),
    /// Payload computed from the prior configuration.
    Derived(DeriveFn),
}

impl OverlayUnit {
    /// Produce the payload to merge.
    pub fn evaluate(&self, prior: &Value) -> Result<Value, BoxError> {
        match self {
            OverlayUnit::Static(value) => Ok(value.clone()),
            OverlayUnit::Derived(derive) => derive(prior),
        }
    }
}

impl fmt::Debug for OverlayUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverlayUnit::Static(value) => f.debug_tuple("Static").field(value).finish(),
            OverlayUnit::Derived(_) => f.write_str("Derived(..)"),
        }
    }
}

/// Error raised while loading or evaluating a unit.
#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("config unit `{name}` not found in {}", dir.display())]
    NotFound { name: String, dir: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("config unit `{name}` failed to evaluate: {source}")]
    Evaluate {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("config unit `{name}` must produce a mapping")]
    NotAMapping { name: String },
}

/// Store of overlay units rooted at a config directory.
///
/// Cloning is cheap; clones share the unit cache.
#[derive(Clone)]
pub struct OverlayStore {
    dir: PathBuf,
    derived: Arc<HashMap<String, DeriveFn>>,
    cache: Arc<DashMap<String, Value>>,
}

impl OverlayStore {
    /// Create a store reading file units from `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            derived: Arc::new(HashMap::new()),
            cache: Arc::new(DashMap::new()),
        }
    }

    /// Register derived units. A derived unit shadows a file of the same name.
    pub fn with_derived(mut self, derived: HashMap<String, DeriveFn>) -> Self {
        self.derived = Arc::new(derived);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Candidate file paths for `name`, in lookup order.
    pub fn unit_paths(&self, name: &str) -> Vec<PathBuf> {
        UNIT_EXTENSIONS
            .iter()
            .map(|ext| self.dir.join(format!("{name}.{ext}")))
            .collect()
    }

    /// Fetch the unit called `name`, reading and caching it if needed.
    pub fn unit(&self, name: &str) -> Result<OverlayUnit, OverlayError> {
        if let Some(derive) = self.derived.get(name) {
            return Ok(OverlayUnit::Derived(derive.clone()));
        }
        if let Some(cached) = self.cache.get(name) {
            return Ok(OverlayUnit::Static(cached.value().clone()));
        }

        let value = self.read_unit(name)?;
        self.cache.insert(name.to_string(), value.clone());
        tracing::debug!(unit = %name, "Config unit cached");
        Ok(OverlayUnit::Static(value))
    }

    fn read_unit(&self, name: &str) -> Result<Value, OverlayError> {
        for path in self.unit_paths(name) {
            if !path.is_file() {
                continue;
            }
            let content = fs::read_to_string(&path).map_err(|source| OverlayError::Io {
                path: path.clone(),
                source,
            })?;
            let is_json = path.extension().is_some_and(|ext| ext == "json");
            return if is_json {
                serde_json::from_str(&content).map_err(|source| OverlayError::Json { path, source })
            } else {
                toml::from_str(&content).map_err(|source| OverlayError::Toml { path, source })
            };
        }

        Err(OverlayError::NotFound {
            name: name.to_string(),
            dir: self.dir.clone(),
        })
    }

    /// Drop the cached copy of `name` so the next load reads storage again.
    pub fn evict(&self, name: &str) -> bool {
        self.cache.remove(name).is_some()
    }

    pub fn is_cached(&self, name: &str) -> bool {
        self.cache.contains_key(name)
    }

    /// Load `name` and merge it into `target`, reporting failures.
    pub fn try_load_overlay(&self, target: &mut Value, name: &str) -> Result<(), OverlayError> {
        let unit = self.unit(name)?;
        let payload = unit.evaluate(target).map_err(|source| OverlayError::Evaluate {
            name: name.to_string(),
            source,
        })?;
        if !payload.is_object() {
            return Err(OverlayError::NotAMapping {
                name: name.to_string(),
            });
        }

        deep_merge(target, &payload);
        Ok(())
    }

    /// Load `name` and merge it into `target`.
    ///
    /// Returns `false` and leaves `target` unchanged when the unit is missing
    /// or broken.
    pub fn load_overlay(&self, target: &mut Value, name: &str) -> bool {
        match self.try_load_overlay(target, name) {
            Ok(()) => {
                tracing::debug!(unit = %name, "Config overlay applied");
                true
            }
            Err(e) => {
                tracing::warn!(unit = %name, error = %e, "Config overlay skipped");
                false
            }
        }
    }
}

impl fmt::Debug for OverlayStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlayStore")
            .field("dir", &self.dir)
            .field("derived", &self.derived.keys().collect::<Vec<_>>())
            .field("cached", &self.cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_with(files: &[(&str, &str)]) -> (tempfile::TempDir, OverlayStore) {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            fs::write(dir.path().join(name), content).unwrap();
        }
        let store = OverlayStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_toml_unit_merged() {
        let (_dir, store) = store_with(&[("default.toml", "a = 1\n[b]\nx = 1\n")]);
        let mut config = json!({ "proxy": true });

        assert!(store.load_overlay(&mut config, "default"));
        assert_eq!(config, json!({ "proxy": true, "a": 1, "b": { "x": 1 } }));
    }

    #[test]
    fn test_json_fallback() {
        let (_dir, store) = store_with(&[("staging.json", r#"{ "port": 8080 }"#)]);
        let mut config = json!({});

        assert!(store.load_overlay(&mut config, "staging"));
        assert_eq!(config["port"], 8080);
    }

    #[test]
    fn test_toml_preferred_over_json() {
        let (_dir, store) = store_with(&[
            ("default.toml", "source = \"toml\"\n"),
            ("default.json", r#"{ "source": "json" }"#),
        ]);
        let mut config = json!({});
        store.load_overlay(&mut config, "default");
        assert_eq!(config["source"], "toml");
    }

    #[test]
    fn test_missing_unit_leaves_target() {
        let (_dir, store) = store_with(&[]);
        let mut config = json!({ "a": 1 });

        assert!(!store.load_overlay(&mut config, "production"));
        assert_eq!(config, json!({ "a": 1 }));
        assert!(matches!(
            store.try_load_overlay(&mut config, "production"),
            Err(OverlayError::NotFound { .. })
        ));
    }

    #[test]
    fn test_broken_unit_leaves_target() {
        let (_dir, store) = store_with(&[("default.toml", "a = [1,\n")]);
        let mut config = json!({ "a": 1 });

        assert!(!store.load_overlay(&mut config, "default"));
        assert_eq!(config, json!({ "a": 1 }));
    }

    #[test]
    fn test_non_mapping_payload_rejected() {
        let (_dir, store) = store_with(&[("list.json", "[1, 2, 3]")]);
        let mut config = json!({ "a": 1 });

        let err = store.try_load_overlay(&mut config, "list").unwrap_err();
        assert!(matches!(err, OverlayError::NotAMapping { .. }));
        assert_eq!(config, json!({ "a": 1 }));
    }

    #[test]
    fn test_derived_unit_sees_prior_config() {
        let (_dir, store) = store_with(&[("production.toml", "ignored = true\n")]);
        let derive: DeriveFn = Arc::new(|prior: &Value| -> Result<Value, BoxError> {
            let name = prior["name"].as_str().unwrap_or("app");
            Ok(json!({ "cookieName": format!("{name}.sid") }))
        });
        let store = store.with_derived(HashMap::from([("production".to_string(), derive)]));
        let mut config = json!({ "name": "shop" });

        assert!(store.load_overlay(&mut config, "production"));
        assert_eq!(config["cookieName"], "shop.sid");
        assert!(config.get("ignored").is_none());
    }

    #[test]
    fn test_derived_failure_is_skipped() {
        let derive: DeriveFn =
            Arc::new(|_: &Value| -> Result<Value, BoxError> { Err("no database url".into()) });
        let store = OverlayStore::new("/nonexistent")
            .with_derived(HashMap::from([("local".to_string(), derive)]));
        let mut config = json!({ "a": 1 });

        assert!(!store.load_overlay(&mut config, "local"));
        assert_eq!(config, json!({ "a": 1 }));
    }

    #[test]
    fn test_cache_survives_file_edit_until_evicted() {
        let (dir, store) = store_with(&[("development.toml", "c = 1\n")]);
        let mut config = json!({});
        store.load_overlay(&mut config, "development");
        assert!(store.is_cached("development"));

        fs::write(dir.path().join("development.toml"), "c = 3\n").unwrap();
        store.load_overlay(&mut config, "development");
        assert_eq!(config["c"], 1);

        assert!(store.evict("development"));
        store.load_overlay(&mut config, "development");
        assert_eq!(config["c"], 3);
    }
}
