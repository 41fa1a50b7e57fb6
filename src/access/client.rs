//! Client-held session token and the protected-route guard.
//!
//! The token is a capability held by the client, not a cache. Losing it
//! forces a new redemption. Clearing it never contacts the store.

use std::sync::Arc;

use super::models::ClientMetadata;
use super::DemoAccess;

/// Key under which the client keeps its session token.
pub const SESSION_KEY: &str = "demo_session_token";
/// Where the guard sends callers without a valid session.
pub const LOGIN_PATH: &str = "/demo-login";

/// Holder for the single client-side token slot.
pub trait SessionSlot {
    fn get(&self) -> Option<String>;
    fn set(&mut self, token: String);
    fn clear(&mut self);
}

#[derive(Clone, Debug, Default)]
pub struct MemorySlot {
    token: Option<String>,
}

impl MemorySlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }
}

impl SessionSlot for MemorySlot {
    fn get(&self) -> Option<String> {
        self.token.clone()
    }

    fn set(&mut self, token: String) {
        self.token = Some(token);
    }

    fn clear(&mut self) {
        self.token = None;
    }
}

/// Drop the client token; the store record stays until it expires.
pub fn clear_session<S: SessionSlot + ?Sized>(slot: &mut S) {
    slot.clear();
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(&'static str),
}

#[derive(Clone)]
pub struct DemoGuard {
    access: Arc<DemoAccess>,
}

impl DemoGuard {
    #[must_use]
    pub fn new(access: Arc<DemoAccess>) -> Self {
        Self { access }
    }

    /// Verify the token in `slot`; an invalid token is removed from the slot.
    pub async fn check<S: SessionSlot + ?Sized>(
        &self,
        slot: &mut S,
        client: &ClientMetadata,
    ) -> GuardDecision {
        let Some(token) = slot.get().filter(|token| !token.trim().is_empty()) else {
            return GuardDecision::Redirect(LOGIN_PATH);
        };
        if self.access.verify(&token, client).await {
            GuardDecision::Allow
        } else {
            slot.clear();
            GuardDecision::Redirect(LOGIN_PATH)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_slot_round_trips() {
        let mut slot = MemorySlot::new();
        assert_eq!(slot.get(), None);
        slot.set("token".to_string());
        assert_eq!(slot.get().as_deref(), Some("token"));
        clear_session(&mut slot);
        assert_eq!(slot.get(), None);
    }
}
