//! Module name resolution.
//!
//! # Responsibilities
//! - Classify a logical name as installed (in the dependency set) or local
//! - Pair the name with its configuration entry
//! - Read module lists (`plugins`, `middleware`) from the configuration
//!
//! # Design Decisions
//! - Pure classification: no filesystem access
//! - Adding a name to the manifest switches it to the installed module
//!   without touching code

use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use crate::config::ConfigHandle;
use crate::modules::manifest::DependencySet;

/// Where a module comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModuleLocator {
    /// Installed module, addressed by its bare name.
    External(String),
    /// Local module under a convention directory.
    Local(PathBuf),
}

impl ModuleLocator {
    pub fn is_external(&self) -> bool {
        matches!(self, ModuleLocator::External(_))
    }
}

impl fmt::Display for ModuleLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleLocator::External(name) => f.write_str(name),
            ModuleLocator::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// A resolved module: its logical name, locator and options.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleRef {
    pub name: String,
    pub locator: ModuleLocator,
    /// `config[name]`, unless absent or `null`.
    pub options: Option<Value>,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("`{key}` must be a sequence of module names")]
    InvalidModuleList { key: String },
}

/// Resolves module names against the dependency set and live configuration.
#[derive(Debug, Clone)]
pub struct ModuleResolver {
    dependencies: DependencySet,
    config: ConfigHandle,
}

impl ModuleResolver {
    pub fn new(dependencies: DependencySet, config: ConfigHandle) -> Self {
        Self {
            dependencies,
            config,
        }
    }

    pub fn dependencies(&self) -> &DependencySet {
        &self.dependencies
    }

    /// Resolve `name`, treating non-installed names as paths under `search_dir`.
    pub fn resolve(&self, name: &str, search_dir: &Path) -> ModuleRef {
        let locator = if self.dependencies.contains(name) {
            ModuleLocator::External(name.to_string())
        } else {
            ModuleLocator::Local(search_dir.join(name))
        };
        let options = self.config.get(name).filter(|value| !value.is_null());

        ModuleRef {
            name: name.to_string(),
            locator,
            options,
        }
    }

    /// Resolve every name listed under `config[key]`.
    ///
    /// An absent key yields no modules.
    pub fn resolve_list(&self, key: &str, search_dir: &Path) -> Result<Vec<ModuleRef>, ResolveError> {
        let names = match self.config.get(key) {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Array(entries)) => entries
                .iter()
                .map(|entry| entry.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>(),
            Some(_) => None,
        };
        let names = names.ok_or_else(|| ResolveError::InvalidModuleList {
            key: key.to_string(),
        })?;

        Ok(names
            .iter()
            .map(|name| self.resolve(name, search_dir))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolver(deps: &[&str], config: Value) -> ModuleResolver {
        ModuleResolver::new(
            DependencySet::new(deps.iter().copied()),
            ConfigHandle::new(config),
        )
    }

    #[test]
    fn test_installed_vs_local() {
        let resolver = resolver(
            &["redis-cache"],
            json!({
                "middleware": ["redis-cache", "auth"],
                "redis-cache": { "url": "redis://localhost" },
            }),
        );

        let refs = resolver.resolve_list("middleware", Path::new("mw")).unwrap();
        assert_eq!(refs.len(), 2);

        assert_eq!(refs[0].locator, ModuleLocator::External("redis-cache".into()));
        assert_eq!(refs[0].options, Some(json!({ "url": "redis://localhost" })));

        assert_eq!(refs[1].locator, ModuleLocator::Local(PathBuf::from("mw/auth")));
        assert_eq!(refs[1].locator.to_string(), "mw/auth");
        assert_eq!(refs[1].options, None);
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let resolver = resolver(&["trace"], json!({ "auth": { "realm": "api" } }));
        let dir = Path::new("app/middleware");

        assert_eq!(resolver.resolve("auth", dir), resolver.resolve("auth", dir));
        assert_eq!(resolver.resolve("trace", dir), resolver.resolve("trace", dir));
    }

    #[test]
    fn test_null_options_are_none() {
        let resolver = resolver(&[], json!({ "auth": null, "csrf": false }));
        assert_eq!(resolver.resolve("auth", Path::new("mw")).options, None);
        assert_eq!(resolver.resolve("csrf", Path::new("mw")).options, Some(json!(false)));
    }

    #[test]
    fn test_absent_list_is_empty() {
        let resolver = resolver(&[], json!({}));
        assert!(resolver.resolve_list("plugins", Path::new("p")).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_list_rejected() {
        let resolver = resolver(&[], json!({ "plugins": "mailer", "middleware": ["a", 1] }));
        assert!(resolver.resolve_list("plugins", Path::new("p")).is_err());
        assert!(resolver.resolve_list("middleware", Path::new("m")).is_err());
    }
}
