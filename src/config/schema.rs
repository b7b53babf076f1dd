//! Reserved configuration keys and the runtime environment.
//!
//! The configuration itself is an open `serde_json::Value` mapping; only the
//! keys below have a meaning to the bootstrapper.

use serde_json::{json, Value};

/// Active environment name.
pub const KEY_ENV: &str = "env";
/// Whether the app sits behind a reverse proxy.
pub const KEY_PROXY: &str = "proxy";
/// Ordered overlay identifiers applied after `default`.
pub const KEY_EXTEND_CONFIGS: &str = "extendConfigs";
/// Plugin names, resolved against the plugin directory.
pub const KEY_PLUGINS: &str = "plugins";
/// Middleware names, resolved against the middleware directory.
pub const KEY_MIDDLEWARE: &str = "middleware";
/// Signing keys exposed to the application.
pub const KEY_KEYS: &str = "keys";
/// Display name of the application.
pub const KEY_NAME: &str = "name";
pub const KEY_PORT: &str = "port";
pub const KEY_LISTEN_HOST: &str = "listenHost";

/// Name of the unit that is always applied first.
pub const DEFAULT_UNIT: &str = "default";
/// Placeholder in `extendConfigs` replaced by the environment name.
pub const ENV_PLACEHOLDER: &str = "[env]";

pub const DEVELOPMENT: &str = "development";
pub const PRODUCTION: &str = "production";

/// The environment supplied by the host process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    name: String,
}

impl Environment {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_development(&self) -> bool {
        self.name == DEVELOPMENT
    }

    pub fn is_production(&self) -> bool {
        self.name == PRODUCTION
    }

    /// Substitute the `[env]` placeholder in an overlay identifier.
    pub fn expand(&self, identifier: &str) -> String {
        identifier.replace(ENV_PLACEHOLDER, &self.name)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new(DEVELOPMENT)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// The value every configuration starts from before `default` is applied.
pub fn seed_config(env: &Environment) -> Value {
    json!({
        KEY_PROXY: true,
        KEY_ENV: env.name(),
        KEY_EXTEND_CONFIGS: [ENV_PLACEHOLDER],
    })
}

/// `config.keys` as a list of strings; non-string entries are ignored.
pub fn signing_keys(config: &Value) -> Vec<String> {
    config
        .get(KEY_KEYS)
        .and_then(Value::as_array)
        .map(|keys| {
            keys.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// `config.proxy`, treating anything but `true` as disabled.
pub fn proxy_enabled(config: &Value) -> bool {
    config.get(KEY_PROXY).and_then(Value::as_bool).unwrap_or(false)
}

/// `config.name`, if the application declares one.
pub fn app_name(config: &Value) -> Option<&str> {
    config.get(KEY_NAME).and_then(Value::as_str)
}
