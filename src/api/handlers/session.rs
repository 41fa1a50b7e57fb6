//! Session check and logout endpoints.

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use super::{
    state::ApiState,
    utils::{client_metadata, CookieSlot},
};
use crate::access::{clear_session, GuardDecision};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionStatus {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

/// Attach the slot's pending cookie change, if any.
pub(super) fn cookie_headers(slot: &CookieSlot, state: &ApiState) -> HeaderMap {
    let mut headers = HeaderMap::new();
    match slot.set_cookie(state) {
        Some(Ok(cookie)) => {
            headers.insert(SET_COOKIE, cookie);
        }
        Some(Err(err)) => error!("Failed to build session cookie: {err}"),
        None => {}
    }
    headers
}

/// Guard outcome for the request; the cookie is cleared when the session is not valid.
pub(super) async fn guard_request(
    headers: &HeaderMap,
    state: &ApiState,
) -> Result<(), Response> {
    let client = client_metadata(headers);
    let mut slot = CookieSlot::from_headers(headers);
    match state.guard().check(&mut slot, &client).await {
        GuardDecision::Allow => Ok(()),
        GuardDecision::Redirect(path) => {
            let body = SessionStatus {
                valid: false,
                redirect: Some(path.to_string()),
            };
            // A missing token leaves the slot untouched; expire any stale cookie anyway.
            clear_session(&mut slot);
            let response_headers = cookie_headers(&slot, state);
            Err((StatusCode::UNAUTHORIZED, response_headers, Json(body)).into_response())
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/demo/session",
    responses(
        (status = 200, description = "Session is valid", body = SessionStatus),
        (status = 401, description = "No valid session; redirect to login", body = SessionStatus)
    ),
    tag = "demo"
)]
pub async fn verify(headers: HeaderMap, state: Extension<Arc<ApiState>>) -> Response {
    match guard_request(&headers, &state).await {
        Ok(()) => (
            StatusCode::OK,
            Json(SessionStatus {
                valid: true,
                redirect: None,
            }),
        )
            .into_response(),
        Err(response) => response,
    }
}

#[utoipa::path(
    post,
    path = "/v1/demo/logout",
    responses(
        (status = 204, description = "Session cookie cleared")
    ),
    tag = "demo"
)]
pub async fn logout(headers: HeaderMap, state: Extension<Arc<ApiState>>) -> impl IntoResponse {
    // The store record is left to expire; logout only drops the client token.
    let mut slot = CookieSlot::from_headers(&headers);
    clear_session(&mut slot);
    (StatusCode::NO_CONTENT, cookie_headers(&slot, &state))
}
