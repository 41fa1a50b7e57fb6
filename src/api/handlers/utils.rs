//! Request helpers: client metadata, token extraction, and the cookie-backed session slot.

use axum::http::{
    header::{InvalidHeaderValue, AUTHORIZATION, COOKIE, USER_AGENT},
    HeaderMap, HeaderValue,
};
use serde::Serialize;
use utoipa::ToSchema;

use super::state::ApiState;
use crate::access::{client::SESSION_KEY, ClientMetadata, SessionSlot};

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// Extract a client IP from common proxy headers.
pub(crate) fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Client metadata used for auditing and anomaly scoring.
pub(crate) fn client_metadata(headers: &HeaderMap) -> ClientMetadata {
    let ip = extract_client_ip(headers).and_then(|ip| ip.parse().ok());
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);
    ClientMetadata::new(ip, user_agent)
}

pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let (Some(key), Some(val)) = (parts.next(), parts.next()) else {
                continue;
            };
            let val = val.trim();
            if key.trim() == name && !val.is_empty() {
                return Some(val.to_string());
            }
        }
    }
    None
}

/// Session token from `Authorization: Bearer` or the session cookie.
pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    extract_bearer_token(headers).or_else(|| extract_cookie(headers, SESSION_KEY))
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum CookieChange {
    Set(String),
    Cleared,
}

/// Session slot backed by the request cookie; changes become a `Set-Cookie` header.
#[derive(Clone, Debug, Default)]
pub struct CookieSlot {
    token: Option<String>,
    change: Option<CookieChange>,
}

impl CookieSlot {
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            token: extract_session_token(headers),
            change: None,
        }
    }

    /// The `Set-Cookie` value for whatever happened to the slot, if anything.
    pub(crate) fn set_cookie(
        &self,
        state: &ApiState,
    ) -> Option<Result<HeaderValue, InvalidHeaderValue>> {
        let secure = state.session_cookie_secure();
        match self.change.as_ref()? {
            CookieChange::Set(token) => Some(session_cookie(
                token,
                state.session_ttl_seconds(),
                secure,
            )),
            CookieChange::Cleared => Some(clear_session_cookie(secure)),
        }
    }
}

impl SessionSlot for CookieSlot {
    fn get(&self) -> Option<String> {
        self.token.clone()
    }

    fn set(&mut self, token: String) {
        self.token = Some(token.clone());
        self.change = Some(CookieChange::Set(token));
    }

    fn clear(&mut self) {
        self.token = None;
        self.change = Some(CookieChange::Cleared);
    }
}

/// Build an `HttpOnly` cookie for the session token.
pub(crate) fn session_cookie(
    token: &str,
    ttl_seconds: i64,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie =
        format!("{SESSION_KEY}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn clear_session_cookie(secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_KEY}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.7"));
        assert_eq!(extract_client_ip(&headers).as_deref(), Some("198.51.100.7"));

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static(" 203.0.113.5 , 10.0.0.1"),
        );
        assert_eq!(extract_client_ip(&headers).as_deref(), Some("203.0.113.5"));
    }

    #[test]
    fn client_metadata_drops_unparseable_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("unknown"));
        headers.insert(USER_AGENT, HeaderValue::from_static("curl/8.5.0"));
        let client = client_metadata(&headers);
        assert_eq!(client.ip, None);
        assert_eq!(client.user_agent.as_deref(), Some("curl/8.5.0"));
    }

    #[test]
    fn session_token_prefers_bearer_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; demo_session_token=from-cookie"),
        );
        assert_eq!(
            extract_session_token(&headers).as_deref(),
            Some("from-cookie")
        );

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(
            extract_session_token(&headers).as_deref(),
            Some("from-header")
        );
    }

    #[test]
    fn empty_bearer_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn cookie_strings_carry_flags() -> Result<(), InvalidHeaderValue> {
        let set = session_cookie("dg.rot.1.abc", 60, true)?;
        let set = set.to_str().unwrap_or_default();
        assert!(set.starts_with("demo_session_token=dg.rot.1.abc;"));
        assert!(set.contains("Max-Age=60"));
        assert!(set.ends_with("; Secure"));

        let cleared = clear_session_cookie(false)?;
        let cleared = cleared.to_str().unwrap_or_default();
        assert!(cleared.contains("Max-Age=0"));
        assert!(!cleared.contains("Secure"));
        Ok(())
    }

    #[test]
    fn cookie_slot_tracks_changes() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("demo_session_token=old"));
        let mut slot = CookieSlot::from_headers(&headers);
        assert_eq!(slot.get().as_deref(), Some("old"));
        assert_eq!(slot.change, None);

        slot.set("new".to_string());
        assert_eq!(slot.change, Some(CookieChange::Set("new".to_string())));
        slot.clear();
        assert_eq!(slot.get(), None);
        assert_eq!(slot.change, Some(CookieChange::Cleared));
    }
}
