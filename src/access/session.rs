//! Session issuance and verification.
//!
//! Rotating tokens are checked against the stored fingerprint. Local tokens
//! (`demo` and `test`) are never stored, so while bypass is enabled they are
//! accepted on structure and issue time alone: the secret part is not
//! checked, and any well-formed `dg.demo.<ms>.<43 base64url chars>` within
//! the session TTL passes. With bypass disabled every local token is refused.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use super::anomaly::AnomalyDetector;
use super::config::{AccessConfig, Clock};
use super::error::StoreError;
use super::models::{ClientMetadata, NewDemoSession};
use super::store::CodeStore;
use super::token::{SessionToken, TokenKind};
use super::validator::Grant;

const MAX_INSERT_ATTEMPTS: usize = 3;

/// A freshly minted session; the raw token is only ever handed to the caller.
#[derive(Clone, Debug)]
pub struct IssuedSession {
    pub token: String,
    pub kind: TokenKind,
    pub expires_at: DateTime<Utc>,
}

fn mint(kind: TokenKind, now: DateTime<Utc>) -> Result<SessionToken, StoreError> {
    SessionToken::mint(kind, now).map_err(|err| StoreError::Unavailable(err.to_string()))
}

#[derive(Clone)]
pub struct SessionIssuer {
    store: Arc<dyn CodeStore>,
    clock: Arc<dyn Clock>,
    config: AccessConfig,
}

impl SessionIssuer {
    pub fn new(store: Arc<dyn CodeStore>, clock: Arc<dyn Clock>, config: AccessConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Mint a token for an accepted code and persist its session record.
    ///
    /// Bypass grants produce `test` tokens that are never stored.
    ///
    /// # Errors
    /// Returns a [`StoreError`] if the session row cannot be written.
    pub async fn issue(
        &self,
        grant: Grant,
        client: &ClientMetadata,
    ) -> Result<IssuedSession, StoreError> {
        let now = self.clock.now();
        let expires_at = now + self.config.session_ttl();

        let code_id = match grant {
            Grant::Bypass => {
                let token = mint(TokenKind::Test, now)?;
                return Ok(IssuedSession {
                    token: token.to_string(),
                    kind: TokenKind::Test,
                    expires_at,
                });
            }
            Grant::Rotating { code_id } => code_id,
        };

        for _ in 0..MAX_INSERT_ATTEMPTS {
            let token = mint(TokenKind::Rotating, now)?;
            let session = NewDemoSession {
                token_hash: token.fingerprint(),
                kind: TokenKind::Rotating,
                access_code_id: Some(code_id),
                created_at: now,
                expires_at,
                client: client.clone(),
            };
            match self.store.insert_session(session).await {
                Ok(record) => {
                    debug!(session_id = %record.id, %code_id, "demo session issued");
                    return Ok(IssuedSession {
                        token: token.to_string(),
                        kind: TokenKind::Rotating,
                        expires_at: record.expires_at,
                    });
                }
                Err(StoreError::Conflict(_)) => {}
                Err(err) => return Err(err),
            }
        }

        Err(StoreError::Conflict("session"))
    }

    /// Mint a static demo token for environments without a live store.
    ///
    /// # Errors
    /// Returns a [`StoreError::Unavailable`] if the random source fails.
    pub fn issue_static(&self) -> Result<IssuedSession, StoreError> {
        let now = self.clock.now();
        let token = mint(TokenKind::StaticDemo, now)?;
        Ok(IssuedSession {
            token: token.to_string(),
            kind: TokenKind::StaticDemo,
            expires_at: now + self.config.session_ttl(),
        })
    }
}

#[derive(Clone)]
pub struct SessionVerifier {
    store: Arc<dyn CodeStore>,
    clock: Arc<dyn Clock>,
    config: AccessConfig,
    detector: AnomalyDetector,
}

impl SessionVerifier {
    pub fn new(store: Arc<dyn CodeStore>, clock: Arc<dyn Clock>, config: AccessConfig) -> Self {
        let detector = AnomalyDetector::new(Arc::clone(&store), Arc::clone(&clock), config.clone());
        Self {
            store,
            clock,
            config,
            detector,
        }
    }

    /// True only when `token` names an existing, unexpired session.
    ///
    /// Fails closed on malformed tokens and store errors. Anomalies are
    /// recorded but do not change the outcome.
    pub async fn verify(&self, token: &str, client: &ClientMetadata) -> bool {
        let Ok(token) = SessionToken::parse(token) else {
            debug!("rejecting malformed session token");
            return false;
        };
        let now = self.clock.now();

        if token.kind().is_local() {
            return self.verify_local(&token, now);
        }

        let token_hash = token.fingerprint();
        let session = match self.store.find_session(&token_hash).await {
            Ok(Some(session)) => session,
            Ok(None) => return false,
            Err(err) => {
                warn!("session lookup failed closed: {err}");
                return false;
            }
        };
        if !session.is_valid(now) {
            debug!(session_id = %session.id, "session expired");
            return false;
        }

        if self.config.anomaly_detection() {
            self.detector.inspect(&session, client).await;
        }

        if let Err(err) = self.store.touch_session(&token_hash, now, client).await {
            warn!("failed to record session activity: {err}");
        }

        true
    }

    // Local tokens skip the store and are honored only while bypass is
    // enabled; only the issue time is checked, not the secret.
    fn verify_local(&self, token: &SessionToken, now: DateTime<Utc>) -> bool {
        if !self.config.allow_bypass() {
            debug!(kind = %token.kind(), "local session token refused, bypass disabled");
            return false;
        }
        token
            .issued_at()
            .is_some_and(|issued| issued <= now && now < issued + self.config.session_ttl())
    }
}
