//! Admission middleware: fixed-window quotas per caller fingerprint.
//!
//! Applies the configured windows in order (default 10/min, then 100/hour).
//! The check runs on the blocking pool since it touches SQLite.

use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::admission::Fingerprint;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::config::FAIL_CLOSED_RETRY_AFTER_SECS;

/// Sentinel identity when no forwarding header is present.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Caller identity as supplied by the upstream proxy.
///
/// First entry of `x-forwarded-for`, then `x-real-ip`, then [`UNKNOWN_CLIENT`].
pub fn client_address(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    forwarded
        .or_else(real_ip)
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

/// Per-client admission control. Returns 429 when any window is exhausted
/// or the quota store is unavailable.
/// Accesses `ApiContext` from request extensions.
pub async fn limit(req: Request<axum::body::Body>, next: Next) -> Response {
    match limit_inner(req, next).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn limit_inner(req: Request<axum::body::Body>, next: Next) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let fingerprint = Fingerprint::derive(&ctx.config.fingerprint_salt, &client_address(req.headers()));

    let admission = ctx.admission.clone();
    let checked = fingerprint.clone();
    let decision = match tokio::task::spawn_blocking(move || admission.check_rate_limit(&checked)).await {
        Ok(decision) => decision,
        Err(e) => {
            tracing::warn!(error = %e, "Admission check aborted; failing closed");
            return Err(ApiError::RateLimited {
                retry_after: FAIL_CLOSED_RETRY_AFTER_SECS,
            });
        }
    };

    if !decision.allowed {
        tracing::info!(
            fingerprint = %fingerprint,
            path = %req.uri().path(),
            retry_after = decision.retry_after_secs,
            "Request rejected by admission control"
        );
        return Err(ApiError::RateLimited {
            retry_after: decision.retry_after_secs,
        });
    }

    Ok(next.run(req).await)
}
