//! HTTP server setup.
//!
//! # Responsibilities
//! - Derive the listen address from the live configuration
//! - Bind the TCP listener
//! - Serve the bootstrapped router with peer addresses attached
//! - Shut down gracefully on Ctrl+C or a shutdown trigger

use std::net::SocketAddr;

use axum::Router;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::app::{AppContext, Application};
use crate::config::schema::{KEY_LISTEN_HOST, KEY_PORT};
use crate::lifecycle::signals::shutdown_signal;

pub const DEFAULT_PORT: u16 = 3009;
pub const DEFAULT_HOST: &str = "localhost";
pub const PORT_ENV: &str = "PORT";

/// Where the server listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenSettings {
    pub host: String,
    pub port: u16,
}

impl ListenSettings {
    /// `config.port`, then `$PORT`, then 3009; `config.listenHost`, then
    /// `localhost`.
    pub fn from_config(config: &Value) -> Self {
        Self::resolve(config, std::env::var(PORT_ENV).ok().as_deref())
    }

    fn resolve(config: &Value, port_env: Option<&str>) -> Self {
        let port = config
            .get(KEY_PORT)
            .and_then(parse_port)
            .or_else(|| port_env.and_then(|p| p.trim().parse().ok()))
            .unwrap_or(DEFAULT_PORT);
        let host = config
            .get(KEY_LISTEN_HOST)
            .and_then(Value::as_str)
            .filter(|h| !h.is_empty())
            .unwrap_or(DEFAULT_HOST)
            .to_string();

        Self { host, port }
    }
}

fn parse_port(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// HTTP server for a bootstrapped application.
pub struct HttpServer {
    ctx: AppContext,
    router: Router,
}

impl HttpServer {
    pub fn new(app: Application) -> Self {
        let (ctx, router) = app.into_parts();
        Self { ctx, router }
    }

    pub fn listen_settings(&self) -> ListenSettings {
        ListenSettings::from_config(&self.ctx.config().load())
    }

    /// Bind the listener described by the configuration.
    pub async fn bind(&self) -> Result<TcpListener, std::io::Error> {
        let settings = self.listen_settings();
        TcpListener::bind((settings.host.as_str(), settings.port)).await
    }

    /// Serve until Ctrl+C or until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            name = %self.ctx.name().unwrap_or_default(),
            env = %self.ctx.env(),
            "listen on http://{}:{} started",
            addr.ip(),
            addr.port()
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = shutdown_signal() => {}
                    _ = shutdown.recv() => {
                        tracing::info!("Shutdown triggered");
                    }
                }
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }
}
