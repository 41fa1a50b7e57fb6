use axum::{
    extract::{Extension, Request},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::{session::guard_request, state::ApiState};

/// Axum middleware: let the request through only with a valid demo session.
///
/// Rejected requests get `401 {valid: false, redirect}` and a cleared cookie.
pub async fn require_session(
    state: Extension<Arc<ApiState>>,
    request: Request,
    next: Next,
) -> Response {
    match guard_request(request.headers(), &state).await {
        Ok(()) => next.run(request).await,
        Err(response) => response,
    }
}
