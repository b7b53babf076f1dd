//! Shared handle to the live configuration.

use std::sync::Arc;

use arc_swap::ArcSwap;
use serde_json::Value;

/// Handle to the live configuration value.
///
/// Every component holds a clone of the same handle, so a reload published
/// through one clone is seen by all of them on their next `load`. Updates are
/// computed on a private copy and swapped in whole.
#[derive(Clone, Debug)]
pub struct ConfigHandle {
    inner: Arc<ArcSwap<Value>>,
}

impl ConfigHandle {
    pub fn new(config: Value) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(config)),
        }
    }

    /// Current snapshot.
    pub fn load(&self) -> Arc<Value> {
        self.inner.load_full()
    }

    /// Look up a top-level key in the current snapshot.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.load().get(key).cloned()
    }

    /// Replace the live value.
    pub fn store(&self, config: Value) {
        self.inner.store(Arc::new(config));
    }

    /// Apply `update` to a copy of the live value and publish it.
    ///
    /// `update` returns `false` to leave the live value (and its `Arc`)
    /// untouched. It may run more than once if another update races it.
    pub fn update<F>(&self, mut update: F) -> bool
    where
        F: FnMut(&mut Value) -> bool,
    {
        let mut applied = false;
        self.inner.rcu(|current| {
            let mut next = Value::clone(current);
            applied = update(&mut next);
            if applied {
                Arc::new(next)
            } else {
                Arc::clone(current)
            }
        });
        applied
    }
}
