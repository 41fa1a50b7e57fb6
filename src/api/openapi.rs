use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use super::handlers::{access, admin, agent, health, session, utils};
use crate::access::{models::RiskLevel, CreatedCode, DashboardRow, RotationSummary, TokenKind};
use crate::assistant::{AgentAction, AgentExtras, AgentReply};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}

/// `OpenAPI` document; info fields come from Cargo metadata.
#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        access::redeem,
        session::verify,
        session::logout,
        agent::agent,
        admin::rotate,
        admin::create_code,
        admin::dashboard,
    ),
    components(schemas(
        health::Health,
        access::AccessRequest,
        access::AccessResponse,
        session::SessionStatus,
        utils::ErrorResponse,
        agent::AgentRequest,
        agent::AgentContext,
        AgentAction,
        AgentReply,
        AgentExtras,
        TokenKind,
        RiskLevel,
        DashboardRow,
        RotationSummary,
        admin::CreateCodeRequest,
        CreatedCode,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Service status"),
        (name = "demo", description = "Access codes and demo sessions"),
        (name = "agent", description = "Demo assistant"),
        (name = "admin", description = "Code rotation and security reporting")
    )
)]
pub struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let doc = openapi();
        assert_eq!(doc.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(doc.info.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn openapi_lists_demo_routes() {
        let doc = openapi();
        for path in [
            "/health",
            "/v1/demo/access",
            "/v1/demo/session",
            "/v1/demo/logout",
            "/v1/agent",
            "/v1/admin/codes",
            "/v1/admin/codes/rotate",
            "/v1/admin/security/dashboard",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let has_bearer = doc
            .components
            .as_ref()
            .is_some_and(|components| components.security_schemes.contains_key("bearer"));
        assert!(has_bearer);
    }
}
