//! Assistant endpoint, mounted behind the session guard.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, warn};
use utoipa::ToSchema;

use super::state::ApiState;
use crate::assistant::AgentReply;

#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct AgentContext {
    pub channel: Option<String>,
    pub locale: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AgentRequest {
    pub user_input: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub context: AgentContext,
}

fn error_reply(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({ "status": "error", "message": message })),
    )
        .into_response()
}

#[utoipa::path(
    post,
    path = "/v1/agent",
    request_body = AgentRequest,
    responses(
        (status = 200, description = "Command classified and dispatched", body = AgentReply),
        (status = 400, description = "Missing input or invalid recipient"),
        (status = 401, description = "No valid demo session"),
        (status = 500, description = "Assistant request failed"),
        (status = 503, description = "Assistant not configured")
    ),
    tag = "agent"
)]
pub async fn agent(state: Extension<Arc<ApiState>>, Json(request): Json<AgentRequest>) -> Response {
    let Some(assistant) = state.assistant() else {
        return error_reply(StatusCode::SERVICE_UNAVAILABLE, "Assistant is not configured");
    };
    if request.user_input.trim().is_empty() {
        return error_reply(StatusCode::BAD_REQUEST, "user_input is required");
    }

    match assistant
        .handle(&request.user_input, &request.session_id)
        .await
    {
        Ok(reply) => (StatusCode::OK, Json(reply)).into_response(),
        Err(err) if err.is_client_error() => {
            warn!("Assistant request rejected: {err}");
            error_reply(StatusCode::BAD_REQUEST, &err.to_string())
        }
        Err(err) => {
            error!(
                channel = request.context.channel.as_deref().unwrap_or("unknown"),
                "Assistant request failed: {err}"
            );
            error_reply(StatusCode::INTERNAL_SERVER_ERROR, "Assistant request failed")
        }
    }
}
