//! appboot server
//!
//! Bootstraps the project found at `--project-dir` and serves it.
//!
//! # Architecture Overview
//!
//! ```text
//!   project/
//!   ├── Cargo.toml ───────────────▶ DependencySet (installed vs local)
//!   ├── config/
//!   │   ├── default.toml ─────────┐
//!   │   ├── <env>.toml ───────────┼─▶ layered config ──▶ ConfigHandle
//!   │   └── <extendConfigs>.toml ─┘         ▲                 │
//!   └── app/                                │                 │
//!       ├── plugins/    ──┐                 │ GET /__reload   │
//!       ├── middleware/ ──┼─▶ ModuleResolver ─▶ ModuleCatalog │
//!       ├── models/     ──┤                                   ▼
//!       └── controllers/──┴─▶ LazyRegistry ◀──────────── AppContext
//!                                                             │
//!                                         axum Router ◀───────┘
//! ```

use std::time::Instant;

use axum::{extract::State, http::StatusCode, routing::get, Json};
use clap::Parser;
use serde_json::{json, Value};

use appboot::modules::downcast;
use appboot::observability::logging;
use appboot::{AppContext, Bootstrap, Environment, HttpServer, ModuleCatalog, ProjectLayout, Shutdown};

#[derive(Parser)]
#[command(name = "appboot")]
#[command(about = "Bootstrap and serve a convention-based application", long_about = None)]
struct Args {
    /// Project root containing Cargo.toml, config/ and app/.
    #[arg(short, long, env = "APP_DIR", default_value = ".")]
    project_dir: String,

    /// Active environment name.
    #[arg(short, long, env = "APP_ENV", default_value = "development")]
    env: String,
}

/// Process-level facts exposed through the `status` controller.
struct StatusModel {
    started: Instant,
}

struct StatusController {
    model: Option<std::sync::Arc<StatusModel>>,
}

impl StatusController {
    fn report(&self, ctx: &AppContext) -> Value {
        json!({
            "name": ctx.name(),
            "env": ctx.env().name(),
            "uptimeSecs": self.model.as_ref().map(|m| m.started.elapsed().as_secs()),
            "models": ctx.models().resolved(),
            "controllers": ctx.controllers().resolved(),
        })
    }
}

async fn status(State(ctx): State<AppContext>) -> Result<Json<Value>, StatusCode> {
    match ctx.controller_as::<StatusController>("status").await {
        Ok(Some(controller)) => Ok(Json(controller.report(&ctx))),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!(error = %e, "Status controller unavailable");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn catalog() -> ModuleCatalog {
    ModuleCatalog::with_builtins()
        .model("status", |_ctx| Ok(StatusModel { started: Instant::now() }))
        .controller("status", |_ctx, model| Ok(StatusController { model: downcast(model) }))
        .routes(|router, _ctx| router.route("/status", get(status)))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init(logging::DEFAULT_DIRECTIVES);
    let args = Args::parse();

    tracing::info!(project_dir = %args.project_dir, env = %args.env, "appboot v{} starting", env!("CARGO_PKG_VERSION"));

    let app = Bootstrap::new(ProjectLayout::new(&args.project_dir), Environment::new(args.env))
        .catalog(catalog())
        .build()?;

    let server = HttpServer::new(app);
    let listener = server.bind().await?;

    let shutdown = Shutdown::new();
    let stop = shutdown.subscribe();
    let _terminate = shutdown.trigger_on_terminate();
    server.run(listener, stop).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
