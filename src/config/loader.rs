//! Configuration assembly and environment reload.

use serde_json::Value;

use crate::config::handle::ConfigHandle;
use crate::config::overlay::{OverlayError, OverlayStore};
use crate::config::schema::{seed_config, Environment, DEFAULT_UNIT, KEY_EXTEND_CONFIGS};

/// Upper bound on `extendConfigs` entries walked in one pass.
pub const MAX_EXTEND_CONFIGS: usize = 64;

/// Build the layered configuration for `env`.
///
/// `default` is applied first, then every `extendConfigs` entry in order.
/// The sequence is re-read after each overlay so an overlay may chain more
/// identifiers. A repeated identifier is applied again each time it appears;
/// the walk stops after [`MAX_EXTEND_CONFIGS`] entries. Missing or broken
/// units are skipped.
pub fn build_config(store: &OverlayStore, env: &Environment) -> Value {
    let mut config = seed_config(env);
    store.load_overlay(&mut config, DEFAULT_UNIT);

    let mut applied = Vec::new();
    let mut index = 0;
    while index < MAX_EXTEND_CONFIGS {
        let Some(entry) = extend_entry(&config, index) else {
            break;
        };
        index += 1;

        let Some(identifier) = entry.as_str() else {
            tracing::warn!(index = index - 1, entry = %entry, "Ignoring non-string extendConfigs entry");
            continue;
        };
        let name = env.expand(identifier);
        if store.load_overlay(&mut config, &name) {
            applied.push(name);
        }
    }

    if extend_entry(&config, index).is_some() {
        tracing::warn!(
            limit = MAX_EXTEND_CONFIGS,
            "extendConfigs exceeds the chaining limit, remaining entries ignored"
        );
    }

    tracing::info!(env = %env, units = ?applied, "Configuration assembled");
    config
}

fn extend_entry(config: &Value, index: usize) -> Option<Value> {
    match config.get(KEY_EXTEND_CONFIGS) {
        Some(Value::Array(entries)) => entries.get(index).cloned(),
        Some(other) if index == 0 => {
            tracing::warn!(value = %other, "extendConfigs is not a sequence");
            None
        }
        _ => None,
    }
}

/// Re-read the environment unit from storage and merge it into the live
/// configuration.
///
/// Only the environment unit is evicted; units it chains through
/// `extendConfigs` keep their cached contents. On error the live snapshot is
/// left as it was.
pub fn reload_environment(
    store: &OverlayStore,
    handle: &ConfigHandle,
    env: &Environment,
) -> Result<(), OverlayError> {
    store.evict(env.name());

    let mut failure = None;
    handle.update(|config| match store.try_load_overlay(config, env.name()) {
        Ok(()) => true,
        Err(e) => {
            failure = Some(e);
            false
        }
    });

    match failure {
        None => {
            tracing::info!(env = %env, "Environment configuration reloaded");
            Ok(())
        }
        Some(e) => {
            tracing::warn!(env = %env, error = %e, "Environment configuration reload failed, keeping current configuration");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::config::overlay::DeriveFn;
    use crate::BoxError;

    fn project(files: &[(&str, &str)]) -> (tempfile::TempDir, OverlayStore) {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            fs::write(dir.path().join(name), content).unwrap();
        }
        let store = OverlayStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_default_then_env() {
        let (_dir, store) = project(&[
            ("default.toml", "a = 1\n[b]\nx = 1\n"),
            ("development.toml", "[b]\ny = 2\n"),
        ]);
        let config = build_config(&store, &Environment::new("development"));

        assert_eq!(config["a"], 1);
        assert_eq!(config["b"], json!({ "x": 1, "y": 2 }));
        assert_eq!(config["env"], "development");
        assert_eq!(config["proxy"], true);
        assert_eq!(config["extendConfigs"], json!(["[env]"]));
    }

    #[test]
    fn test_no_units_keeps_seed() {
        let (_dir, store) = project(&[]);
        let env = Environment::new("production");
        assert_eq!(build_config(&store, &env), seed_config(&env));
    }

    #[test]
    fn test_default_applies_before_extend_configs() {
        // `default` sets the value the env overlay then overrides, even
        // though `default` itself reorders extendConfigs.
        let (_dir, store) = project(&[
            ("default.toml", "extendConfigs = [\"shared\", \"[env]\"]\nlevel = \"default\"\n"),
            ("shared.toml", "level = \"shared\"\n"),
            ("production.toml", "level = \"production\"\n"),
        ]);
        let config = build_config(&store, &Environment::new("production"));
        assert_eq!(config["level"], "production");
    }

    #[test]
    fn test_later_units_win() {
        let (_dir, store) = project(&[
            ("default.toml", "extendConfigs = [\"[env]\", \"local\"]\nport = 3000\n"),
            ("production.toml", "port = 80\nhost = \"prod\"\n"),
            ("local.toml", "port = 8080\n"),
        ]);
        let config = build_config(&store, &Environment::new("production"));
        assert_eq!(config["port"], 8080);
        assert_eq!(config["host"], "prod");
    }

    #[test]
    fn test_env_overlay_chains_more_units() {
        let (_dir, store) = project(&[
            ("default.toml", "name = \"shop\"\n"),
            ("production.toml", "extendConfigs = [\"[env]\", \"local\"]\ndebug = false\n"),
            ("local.toml", "debug = true\n"),
        ]);
        let config = build_config(&store, &Environment::new("production"));
        assert_eq!(config["debug"], true);
    }

    fn counting_unit(calls: &Arc<AtomicUsize>, derive: fn(&Value) -> Value) -> DeriveFn {
        let calls = Arc::clone(calls);
        Arc::new(move |prior: &Value| -> Result<Value, BoxError> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(derive(prior))
        })
    }

    #[test]
    fn test_repeated_units_apply_each_time() {
        let (_dir, store) = project(&[("default.toml", "extendConfigs = [\"[env]\", 7, \"[env]\"]\nn = 0\n")]);
        let calls = Arc::new(AtomicUsize::new(0));
        let increment = counting_unit(&calls, |prior| json!({ "n": prior["n"].as_u64().unwrap_or(0) + 1 }));
        let store = store.with_derived(HashMap::from([("development".to_string(), increment)]));

        let config = build_config(&store, &Environment::new("development"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(config["n"], 2);
    }

    #[test]
    fn test_self_extending_chain_stops_at_limit() {
        let (_dir, store) = project(&[]);
        let calls = Arc::new(AtomicUsize::new(0));
        let extend = counting_unit(&calls, |prior| {
            let mut entries = prior["extendConfigs"].as_array().cloned().unwrap_or_default();
            entries.push(json!("[env]"));
            json!({ "extendConfigs": entries })
        });
        let store = store.with_derived(HashMap::from([("staging".to_string(), extend)]));

        let config = build_config(&store, &Environment::new("staging"));
        assert_eq!(calls.load(Ordering::SeqCst), MAX_EXTEND_CONFIGS);
        assert_eq!(config["extendConfigs"].as_array().unwrap().len(), MAX_EXTEND_CONFIGS + 1);
    }

    #[test]
    fn test_reload_environment_merges_edits() {
        let (dir, store) = project(&[
            ("default.toml", "a = 1\n"),
            ("development.toml", "b = 2\n"),
        ]);
        let env = Environment::new("development");
        let handle = ConfigHandle::new(build_config(&store, &env));

        fs::write(dir.path().join("development.toml"), "b = 2\nc = 3\n").unwrap();
        reload_environment(&store, &handle, &env).unwrap();

        let live = handle.load();
        assert_eq!(live["a"], 1);
        assert_eq!(live["b"], 2);
        assert_eq!(live["c"], 3);
    }

    #[test]
    fn test_reload_failure_keeps_snapshot() {
        let (dir, store) = project(&[("development.toml", "b = 2\n")]);
        let env = Environment::new("development");
        let handle = ConfigHandle::new(build_config(&store, &env));
        let before = handle.load();

        fs::write(dir.path().join("development.toml"), "b = [\n").unwrap();
        let err = reload_environment(&store, &handle, &env).unwrap_err();
        assert!(matches!(err, OverlayError::Toml { .. }));
        assert!(Arc::ptr_eq(&before, &handle.load()));
    }
}
