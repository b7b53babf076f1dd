//! Administrative routes.
//!
//! `GET /__reload` re-reads the environment config unit and merges it into
//! the live configuration. Restricted to loopback callers; with `proxy`
//! enabled the caller is taken from `X-Forwarded-For`.

pub mod auth;
pub mod handlers;

use axum::{middleware, routing::get, Router};

use self::auth::loopback_only;
use self::handlers::reload_config;
use crate::app::AppContext;
use crate::modules::AppRouter;

pub const RELOAD_PATH: &str = "/__reload";

pub fn reload_router(ctx: &AppContext) -> AppRouter {
    Router::new()
        .route(RELOAD_PATH, get(reload_config))
        .route_layer(middleware::from_fn_with_state(ctx.clone(), loopback_only))
}
