//! Access-code redemption endpoint.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use super::{
    session::cookie_headers,
    state::ApiState,
    utils::{client_metadata, CookieSlot, ErrorResponse},
};
use crate::access::{
    validator::{Rejection, VERIFICATION_FAILED_MESSAGE},
    Redemption, TokenKind,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct AccessRequest {
    #[serde(default)]
    pub access_code: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AccessResponse {
    pub token: String,
    pub kind: TokenKind,
    pub expires_at: DateTime<Utc>,
}

const fn rejection_status(rejection: Rejection) -> StatusCode {
    match rejection {
        Rejection::InvalidOrExpired => StatusCode::UNAUTHORIZED,
        Rejection::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

#[utoipa::path(
    post,
    path = "/v1/demo/access",
    request_body = AccessRequest,
    responses(
        (status = 200, description = "Code accepted; session cookie set", body = AccessResponse),
        (status = 400, description = "Access code missing", body = ErrorResponse),
        (status = 401, description = "Invalid or expired access code", body = ErrorResponse),
        (status = 503, description = "Access verification failed", body = ErrorResponse)
    ),
    tag = "demo"
)]
pub async fn redeem(
    headers: HeaderMap,
    state: Extension<Arc<ApiState>>,
    Json(request): Json<AccessRequest>,
) -> Response {
    if request.access_code.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Access code is required")),
        )
            .into_response();
    }

    let client = client_metadata(&headers);
    let mut slot = CookieSlot::from_headers(&headers);

    match state
        .access()
        .redeem_into(&mut slot, &request.access_code, &client)
        .await
    {
        Ok(Redemption::Granted(session)) => {
            let response_headers = cookie_headers(&slot, &state);
            let body = AccessResponse {
                token: session.token,
                kind: session.kind,
                expires_at: session.expires_at,
            };
            (StatusCode::OK, response_headers, Json(body)).into_response()
        }
        Ok(Redemption::Denied(rejection)) => (
            rejection_status(rejection),
            Json(ErrorResponse::new(rejection.message())),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to issue demo session: {err}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new(VERIFICATION_FAILED_MESSAGE)),
            )
                .into_response()
        }
    }
}
