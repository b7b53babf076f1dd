//! Lazy, memoized registries for models and controllers.
//!
//! # Responsibilities
//! - Construct an instance on first lookup of a name
//! - Cache the result (including "no such module") for the process lifetime
//! - Guarantee at most one successful construction per name
//!
//! # Design Decisions
//! - One `tokio::sync::OnceCell` per name: concurrent first lookups wait on
//!   the same initialization instead of racing
//! - Construction errors are returned, not cached; the next lookup retries

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::modules::catalog::Instance;
use crate::BoxError;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to construct {kind} `{name}`: {source}")]
    Construction {
        kind: &'static str,
        name: String,
        #[source]
        source: BoxError,
    },
}

type Cell = Arc<OnceCell<Option<Instance>>>;

/// Name-keyed compute-once cache.
pub struct LazyRegistry {
    kind: &'static str,
    cells: DashMap<String, Cell>,
}

impl LazyRegistry {
    /// `kind` names the registry in logs and errors ("model", "controller").
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            cells: DashMap::new(),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Return the instance for `name`, running `init` only if the name has
    /// never been resolved successfully.
    pub async fn get_or_init<F, Fut>(&self, name: &str, init: F) -> Result<Option<Instance>, RegistryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<Instance>, BoxError>>,
    {
        // Clone the cell out so no map shard stays locked while `init` runs.
        let cell: Cell = Arc::clone(
            self.cells
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .value(),
        );

        let kind = self.kind;
        let instance = cell
            .get_or_try_init(|| async move {
                let instance = init().await.map_err(|source| RegistryError::Construction {
                    kind,
                    name: name.to_string(),
                    source,
                })?;
                tracing::debug!(kind, name, found = instance.is_some(), "Registry entry resolved");
                Ok::<_, RegistryError>(instance)
            })
            .await?;

        Ok(instance.clone())
    }

    /// The cached value for `name`, if it has been resolved.
    pub fn cached(&self, name: &str) -> Option<Option<Instance>> {
        self.cells.get(name).and_then(|cell| cell.get().cloned())
    }

    /// Number of names resolved so far.
    pub fn resolved(&self) -> usize {
        self.cells.iter().filter(|entry| entry.value().initialized()).count()
    }
}

impl fmt::Debug for LazyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyRegistry")
            .field("kind", &self.kind)
            .field("resolved", &self.resolved())
            .finish()
    }
}
