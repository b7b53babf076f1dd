//! Convention-based project layout.

use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "Cargo.toml";

/// Directories and files of a host project, derived from its root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    pub root: PathBuf,
    pub manifest: PathBuf,
    pub config_dir: PathBuf,
    pub middleware_dir: PathBuf,
    pub plugin_dir: PathBuf,
    pub routes_dir: PathBuf,
    pub controllers_dir: PathBuf,
    pub models_dir: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let app = root.join("app");
        Self {
            manifest: root.join(MANIFEST_FILE),
            config_dir: root.join("config"),
            middleware_dir: app.join("middleware"),
            plugin_dir: app.join("plugins"),
            routes_dir: app.join("routes"),
            controllers_dir: app.join("controllers"),
            models_dir: app.join("models"),
            root,
        }
    }

    /// Use a manifest other than `<root>/Cargo.toml`.
    pub fn with_manifest(mut self, manifest: impl Into<PathBuf>) -> Self {
        self.manifest = manifest.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
