//! Operator endpoints: code rotation, one-off codes, and the security dashboard.
//!
//! All require `Authorization: Bearer <admin token>`. Without a configured
//! token the routes answer `404` so their existence is not advertised.

use axum::{
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::Duration;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::{IntoParams, ToSchema};

use super::{
    state::ApiState,
    utils::{extract_bearer_token, ErrorResponse},
};
use crate::access::{
    config::MAX_TTL_SECONDS,
    generator::{DEFAULT_ONE_OFF_HOURS, DEFAULT_ONE_OFF_MAX_USES},
    token::fingerprint,
    CreatedCode, DashboardRow, RotationSummary, MAX_DASHBOARD_DAYS,
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct DashboardQuery {
    /// Days of history to aggregate (default 7, at most 365).
    pub days: Option<u32>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateCodeRequest {
    /// Free-form note stored with the code, e.g. who it was issued to.
    pub description: Option<String>,
    /// Lifetime in hours (default 24).
    pub expires_hours: Option<i64>,
    /// Redemption cap (default 1).
    pub max_uses: Option<i32>,
}

impl CreateCodeRequest {
    /// Resolve defaults and check bounds.
    ///
    /// # Errors
    /// Returns a message naming the out-of-range field.
    pub fn resolve(&self) -> Result<(Duration, i32), &'static str> {
        let hours = self.expires_hours.unwrap_or(DEFAULT_ONE_OFF_HOURS);
        if !(1..=MAX_TTL_SECONDS / 3600).contains(&hours) {
            return Err("expires_hours is out of range");
        }
        let max_uses = self.max_uses.unwrap_or(DEFAULT_ONE_OFF_MAX_USES);
        if max_uses < 1 {
            return Err("max_uses must be at least 1");
        }
        Ok((Duration::hours(hours), max_uses))
    }
}

fn authorize(headers: &HeaderMap, state: &ApiState) -> Result<(), StatusCode> {
    let Some(expected) = state.admin_token_hash() else {
        return Err(StatusCode::NOT_FOUND);
    };
    let presented = extract_bearer_token(headers).map(|token| fingerprint(&token));
    match presented {
        Some(hash) if hash.as_bytes() == expected.as_bytes() => Ok(()),
        _ => {
            warn!("Rejected admin request with missing or invalid token");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/admin/codes/rotate",
    responses(
        (status = 200, description = "New code generated", body = RotationSummary),
        (status = 401, description = "Invalid admin token"),
        (status = 404, description = "Admin API disabled"),
        (status = 503, description = "Store unavailable", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn rotate(headers: HeaderMap, state: Extension<Arc<ApiState>>) -> Response {
    if let Err(status) = authorize(&headers, &state) {
        return status.into_response();
    }
    match state.access().rotate().await {
        Ok(rotation) => {
            info!(
                active_codes = rotation.active_codes,
                purged_sessions = rotation.purged_sessions,
                "access code rotated"
            );
            (StatusCode::OK, Json(RotationSummary::from(&rotation))).into_response()
        }
        Err(err) => {
            error!("Failed to rotate access code: {err}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new("Failed to rotate access code")),
            )
                .into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/admin/codes",
    request_body = CreateCodeRequest,
    responses(
        (status = 201, description = "One-off code created", body = CreatedCode),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Invalid admin token"),
        (status = 404, description = "Admin API disabled"),
        (status = 503, description = "Store unavailable", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn create_code(
    headers: HeaderMap,
    state: Extension<Arc<ApiState>>,
    payload: Option<Json<CreateCodeRequest>>,
) -> Response {
    if let Err(status) = authorize(&headers, &state) {
        return status.into_response();
    }
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let (ttl, max_uses) = match request.resolve() {
        Ok(resolved) => resolved,
        Err(message) => {
            return (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message))).into_response();
        }
    };
    match state
        .access()
        .create_code(request.description, ttl, Some(max_uses))
        .await
    {
        Ok(code) => {
            info!(code_id = %code.id, max_uses, "one-off access code created");
            (StatusCode::CREATED, Json(CreatedCode::from(&code))).into_response()
        }
        Err(err) => {
            error!("Failed to create access code: {err}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new("Failed to create access code")),
            )
                .into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/admin/security/dashboard",
    params(DashboardQuery),
    responses(
        (status = 200, description = "Daily security event aggregates", body = [DashboardRow]),
        (status = 401, description = "Invalid admin token"),
        (status = 404, description = "Admin API disabled"),
        (status = 503, description = "Store unavailable", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn dashboard(
    headers: HeaderMap,
    state: Extension<Arc<ApiState>>,
    Query(query): Query<DashboardQuery>,
) -> Response {
    if let Err(status) = authorize(&headers, &state) {
        return status.into_response();
    }
    let days = query.days.map(|days| days.min(MAX_DASHBOARD_DAYS));
    match state.access().security_dashboard(days).await {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(err) => {
            error!("Failed to load security dashboard: {err}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new("Failed to load security dashboard")),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_defaults_to_a_single_use_day() {
        let resolved = CreateCodeRequest::default().resolve();
        assert_eq!(resolved, Ok((Duration::hours(24), 1)));
    }

    #[test]
    fn create_request_bounds_are_checked() {
        let request = CreateCodeRequest {
            expires_hours: Some(0),
            ..CreateCodeRequest::default()
        };
        assert!(request.resolve().is_err());

        let request = CreateCodeRequest {
            expires_hours: Some(i64::MAX),
            ..CreateCodeRequest::default()
        };
        assert!(request.resolve().is_err());

        let request = CreateCodeRequest {
            max_uses: Some(0),
            ..CreateCodeRequest::default()
        };
        assert!(request.resolve().is_err());
    }
}
