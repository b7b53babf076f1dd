//! Installable built-in modules.
//!
//! These are registered as external modules: a project enables one by
//! declaring it in its manifest and listing it under `middleware` or
//! `plugins`. Options come from the configuration entry of the same name.
//!
//! | name               | kind       | options                  |
//! |--------------------|------------|--------------------------|
//! | `trace`            | middleware | none                     |
//! | `request-id`       | middleware | `header` (x-request-id)  |
//! | `timeout`          | middleware | `secs` (30)              |
//! | `body-limit`       | middleware | `maxBytes` (2 MiB)       |
//! | `security-headers` | middleware | none                     |
//! | `config-watcher`   | plugin     | `pollSecs` (2)           |

use std::time::Duration;

use axum::http::{header, HeaderName, HeaderValue, Request};
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::app::AppContext;
use crate::config::ConfigWatcher;
use crate::modules::catalog::{Middleware, ModuleCatalog};
use crate::BoxError;

pub const TRACE: &str = "trace";
pub const REQUEST_ID: &str = "request-id";
pub const TIMEOUT: &str = "timeout";
pub const BODY_LIMIT: &str = "body-limit";
pub const SECURITY_HEADERS: &str = "security-headers";
pub const CONFIG_WATCHER: &str = "config-watcher";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;
const DEFAULT_POLL_SECS: u64 = 2;

/// Add every built-in module to `catalog`.
pub fn register(catalog: ModuleCatalog) -> ModuleCatalog {
    catalog
        .external_middleware(TRACE, trace)
        .external_middleware(REQUEST_ID, request_id)
        .external_middleware(TIMEOUT, timeout)
        .external_middleware(BODY_LIMIT, body_limit)
        .external_middleware(SECURITY_HEADERS, security_headers)
        .external_plugin(CONFIG_WATCHER, config_watcher)
}

fn option_u64(options: Option<&Value>, key: &str) -> Option<u64> {
    options.and_then(|o| o.get(key)).and_then(Value::as_u64)
}

fn option_str<'a>(options: Option<&'a Value>, key: &str) -> Option<&'a str> {
    options.and_then(|o| o.get(key)).and_then(Value::as_str)
}

fn trace(_options: Option<&Value>, _ctx: &AppContext) -> Result<Middleware, BoxError> {
    Ok(Middleware::new(|router| router.layer(TraceLayer::new_for_http())))
}

/// Request ID generator backed by UUID v4.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

fn request_id(options: Option<&Value>, _ctx: &AppContext) -> Result<Middleware, BoxError> {
    let header = option_str(options, "header").unwrap_or("x-request-id");
    let header = HeaderName::from_bytes(header.as_bytes())?;

    Ok(Middleware::new(move |router| {
        router.layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(header.clone(), UuidRequestId))
                .layer(PropagateRequestIdLayer::new(header)),
        )
    }))
}

#[allow(deprecated)]
fn timeout(options: Option<&Value>, _ctx: &AppContext) -> Result<Middleware, BoxError> {
    let secs = option_u64(options, "secs").unwrap_or(DEFAULT_TIMEOUT_SECS);
    if secs == 0 {
        return Err("timeout.secs must be greater than zero".into());
    }

    Ok(Middleware::new(move |router| {
        router.layer(TimeoutLayer::new(Duration::from_secs(secs)))
    }))
}

fn body_limit(options: Option<&Value>, _ctx: &AppContext) -> Result<Middleware, BoxError> {
    let max_bytes = match option_u64(options, "maxBytes") {
        Some(bytes) => usize::try_from(bytes)?,
        None => DEFAULT_MAX_BODY_BYTES,
    };

    Ok(Middleware::new(move |router| {
        router.layer(RequestBodyLimitLayer::new(max_bytes))
    }))
}

fn security_headers(_options: Option<&Value>, _ctx: &AppContext) -> Result<Middleware, BoxError> {
    Ok(Middleware::new(|router| {
        router.layer(
            ServiceBuilder::new()
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::X_FRAME_OPTIONS,
                    HeaderValue::from_static("DENY"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::REFERRER_POLICY,
                    HeaderValue::from_static("no-referrer"),
                )),
        )
    }))
}

fn config_watcher(options: Option<&Value>, ctx: &AppContext) -> Result<(), BoxError> {
    let poll = Duration::from_secs(option_u64(options, "pollSecs").unwrap_or(DEFAULT_POLL_SECS));
    let watcher = ConfigWatcher::new(ctx.overlays().clone(), ctx.config().clone(), ctx.env().clone())
        .with_poll_interval(poll)
        .run()?;
    ctx.retain(watcher);
    Ok(())
}
