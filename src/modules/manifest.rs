//! Dependency manifest reader.
//!
//! The manifest is a Cargo-style TOML file. Its `[dependencies]` and
//! `[dev-dependencies]` keys form the dependency set used to tell installed
//! modules apart from local convention modules.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse manifest {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Default, Deserialize)]
struct Manifest {
    #[serde(default)]
    dependencies: toml::Table,
    #[serde(default, rename = "dev-dependencies")]
    dev_dependencies: toml::Table,
}

/// Names of the modules the host project declares as installed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySet {
    names: BTreeSet<String>,
}

impl DependencySet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Read the manifest at `path`.
    pub fn from_manifest(path: &Path) -> Result<Self, ManifestError> {
        let content = fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let set = Self::parse(&content).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!(path = ?path, dependencies = set.len(), "Manifest loaded");
        Ok(set)
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        let manifest: Manifest = toml::from_str(content)?;
        let names = manifest
            .dependencies
            .into_iter()
            .chain(manifest.dev_dependencies)
            .map(|(name, _)| name);
        Ok(Self::new(names))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}
