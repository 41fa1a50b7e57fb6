//! Shared handler state: the access service, cookie settings, and optional collaborators.

use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use url::Url;

use crate::access::{token::fingerprint, DemoAccess, DemoGuard};
use crate::assistant::Assistant;

pub const DEFAULT_FRONTEND_BASE_URL: &str = "http://localhost:5173";

pub struct ApiState {
    access: Arc<DemoAccess>,
    guard: DemoGuard,
    frontend_base_url: String,
    admin_token_hash: Option<String>,
    assistant: Option<Assistant>,
}

impl ApiState {
    #[must_use]
    pub fn new(access: Arc<DemoAccess>, frontend_base_url: String) -> Self {
        let guard = DemoGuard::new(Arc::clone(&access));
        Self {
            access,
            guard,
            frontend_base_url,
            admin_token_hash: None,
            assistant: None,
        }
    }

    /// Enable the admin routes; only the token fingerprint is kept.
    #[must_use]
    pub fn with_admin_token(mut self, token: &SecretString) -> Self {
        let token = token.expose_secret().trim();
        self.admin_token_hash = (!token.is_empty()).then(|| fingerprint(token));
        self
    }

    #[must_use]
    pub fn with_assistant(mut self, assistant: Assistant) -> Self {
        self.assistant = Some(assistant);
        self
    }

    #[must_use]
    pub fn access(&self) -> &DemoAccess {
        &self.access
    }

    #[must_use]
    pub fn guard(&self) -> &DemoGuard {
        &self.guard
    }

    #[must_use]
    pub fn assistant(&self) -> Option<&Assistant> {
        self.assistant.as_ref()
    }

    pub(crate) fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    pub(crate) fn admin_token_hash(&self) -> Option<&str> {
        self.admin_token_hash.as_deref()
    }

    /// Cookies are marked `Secure` only when the frontend is served over HTTPS.
    pub(crate) fn session_cookie_secure(&self) -> bool {
        Url::parse(&self.frontend_base_url).is_ok_and(|url| url.scheme() == "https")
    }

    pub(crate) fn session_ttl_seconds(&self) -> i64 {
        self.access.config().session_ttl_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{AccessConfig, MemoryCodeStore};

    fn state(frontend: &str) -> ApiState {
        let access = DemoAccess::new(Arc::new(MemoryCodeStore::new()), AccessConfig::default());
        ApiState::new(Arc::new(access), frontend.to_string())
    }

    #[test]
    fn secure_cookie_follows_frontend_scheme() {
        assert!(state("https://demo.example.com").session_cookie_secure());
        assert!(!state("http://localhost:5173").session_cookie_secure());
        assert!(!state("not a url").session_cookie_secure());
    }

    #[test]
    fn blank_admin_token_keeps_admin_disabled() {
        let state = state(DEFAULT_FRONTEND_BASE_URL).with_admin_token(&SecretString::from("  "));
        assert!(state.admin_token_hash().is_none());
        let state = state.with_admin_token(&SecretString::from("s3cret"));
        assert_eq!(state.admin_token_hash(), Some(fingerprint("s3cret").as_str()));
    }
}
