//! Structured logging.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_DIRECTIVES: &str = "appboot=info,tower_http=info";

/// Install the global subscriber: `RUST_LOG` (or `default_directives`) and a
/// fmt layer.
pub fn init(default_directives: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directives.into());
    let result = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if let Err(e) = result {
        eprintln!("tracing subscriber already installed: {e}");
    }
}
