use axum::extract::State;
use axum::http::StatusCode;

use crate::app::AppContext;

pub const RELOAD_BODY: &str = "Reloaded!\n";
pub const RELOAD_FAILED_BODY: &str = "Reload failed\n";

/// Re-merge the environment unit into the live configuration.
///
/// The confirmation is only sent when the unit was read and merged. Any
/// failure leaves the live configuration untouched and answers 500.
pub async fn reload_config(
    State(ctx): State<AppContext>,
) -> Result<&'static str, (StatusCode, &'static str)> {
    match ctx.reload_config() {
        Ok(()) => Ok(RELOAD_BODY),
        Err(e) => {
            tracing::error!(env = %ctx.env(), error = %e, "Reload request failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, RELOAD_FAILED_BODY))
        }
    }
}
