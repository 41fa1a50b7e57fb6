//! Demo access gating: rotating codes, code redemption, and demo sessions.
//!
//! Flow Overview:
//! - An external schedule calls [`CodeGenerator::generate`] to write a new code.
//! - A visitor submits a code; [`CodeValidator`] normalizes it and atomically
//!   consumes one use.
//! - On acceptance [`SessionIssuer`] mints an opaque token and stores only its
//!   SHA-256 fingerprint.
//! - Each protected request goes through [`SessionVerifier`], which checks the
//!   stored expiry and runs the advisory [`AnomalyDetector`].
//!
//! Failure policy: redemption and verification fail closed. Audit writes,
//! anomaly writes, and activity updates are best-effort and only logged.
//!
//! Bypass codes and local (`demo`/`test`) tokens are honored only when
//! [`AccessConfig::with_allow_bypass`] is set, which must stay off in production.

pub mod anomaly;
pub mod audit;
pub mod client;
pub mod code;
pub mod config;
pub mod error;
pub mod generator;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod session;
pub mod store;
pub mod token;
pub mod validator;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

pub use anomaly::AnomalyDetector;
pub use client::{clear_session, DemoGuard, GuardDecision, MemorySlot, SessionSlot};
pub use config::{AccessConfig, Clock, SystemClock};
pub use error::StoreError;
pub use generator::CodeGenerator;
pub use memory::MemoryCodeStore;
pub use models::{AccessCode, ClientMetadata, DashboardRow};
pub use postgres::PgCodeStore;
pub use session::{IssuedSession, SessionIssuer, SessionVerifier};
pub use store::CodeStore;
pub use token::{SessionToken, TokenKind};
pub use validator::{CodeValidator, Grant, Rejection, Validation};

const DEFAULT_DASHBOARD_DAYS: u32 = 7;
/// Longest look-back the security dashboard accepts.
pub const MAX_DASHBOARD_DAYS: u32 = 365;

/// Outcome of submitting an access code.
#[derive(Clone, Debug)]
pub enum Redemption {
    Granted(IssuedSession),
    Denied(Rejection),
}

/// Summary of one rotation run.
#[derive(Clone, Debug)]
pub struct Rotation {
    pub code: AccessCode,
    pub active_codes: usize,
    pub purged_sessions: u64,
}

/// JSON report of a rotation run, shared by the CLI job and the admin route.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct RotationSummary {
    pub success: bool,
    pub new_code: String,
    pub active_codes: usize,
    pub purged_sessions: u64,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&Rotation> for RotationSummary {
    fn from(rotation: &Rotation) -> Self {
        Self {
            success: true,
            new_code: rotation.code.code.clone(),
            active_codes: rotation.active_codes,
            purged_sessions: rotation.purged_sessions,
            message: "Access code rotated successfully".to_string(),
            timestamp: rotation.code.created_at,
        }
    }
}

/// JSON report of a newly created one-off code.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct CreatedCode {
    pub success: bool,
    pub code: String,
    pub description: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub max_uses: Option<i32>,
}

impl From<&AccessCode> for CreatedCode {
    fn from(code: &AccessCode) -> Self {
        Self {
            success: true,
            code: code.code.clone(),
            description: code.description.clone(),
            expires_at: code.expires_at,
            max_uses: code.max_uses,
        }
    }
}

/// Entry point tying the access components to one store and clock.
pub struct DemoAccess {
    store: Arc<dyn CodeStore>,
    clock: Arc<dyn Clock>,
    config: AccessConfig,
    generator: CodeGenerator,
    validator: CodeValidator,
    issuer: SessionIssuer,
    verifier: SessionVerifier,
    detector: AnomalyDetector,
}

impl DemoAccess {
    pub fn new(store: Arc<dyn CodeStore>, config: AccessConfig) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), config)
    }

    pub fn with_clock(
        store: Arc<dyn CodeStore>,
        clock: Arc<dyn Clock>,
        config: AccessConfig,
    ) -> Self {
        let config = config.normalize();
        let component = || (Arc::clone(&store), Arc::clone(&clock), config.clone());
        let (s, c, cfg) = component();
        let generator = CodeGenerator::new(s, c, cfg);
        let (s, c, cfg) = component();
        let validator = CodeValidator::new(s, c, cfg);
        let (s, c, cfg) = component();
        let issuer = SessionIssuer::new(s, c, cfg);
        let (s, c, cfg) = component();
        let verifier = SessionVerifier::new(s, c, cfg);
        let (s, c, cfg) = component();
        let detector = AnomalyDetector::new(s, c, cfg);
        Self {
            store,
            clock,
            config,
            generator,
            validator,
            issuer,
            verifier,
            detector,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AccessConfig {
        &self.config
    }

    #[must_use]
    pub fn generator(&self) -> &CodeGenerator {
        &self.generator
    }

    #[must_use]
    pub fn issuer(&self) -> &SessionIssuer {
        &self.issuer
    }

    /// Generate a new rotating code.
    ///
    /// # Errors
    /// Returns a [`StoreError`] when the store write fails.
    pub async fn generate(&self) -> Result<AccessCode, StoreError> {
        self.generator.generate().await
    }

    pub async fn validate(&self, submitted: &str, client: &ClientMetadata) -> Validation {
        self.validator.validate(submitted, client).await
    }

    /// # Errors
    /// Returns a [`StoreError`] if the session cannot be persisted.
    pub async fn issue(
        &self,
        grant: Grant,
        client: &ClientMetadata,
    ) -> Result<IssuedSession, StoreError> {
        self.issuer.issue(grant, client).await
    }

    /// Create an operator-issued one-off code.
    ///
    /// # Errors
    /// Returns a [`StoreError`] when the store write fails.
    pub async fn create_code(
        &self,
        description: Option<String>,
        ttl: Duration,
        max_uses: Option<i32>,
    ) -> Result<AccessCode, StoreError> {
        self.generator
            .generate_one_off(description, ttl, max_uses)
            .await
    }

    /// Validate a code and, when accepted, issue a session for it.
    ///
    /// When the session cannot be persisted, the use consumed by validation
    /// is given back so a capped code is not burned without a session.
    ///
    /// # Errors
    /// Only a failure to persist the new session is returned as an error;
    /// validation problems come back as [`Redemption::Denied`].
    pub async fn redeem(
        &self,
        submitted: &str,
        client: &ClientMetadata,
    ) -> Result<Redemption, StoreError> {
        let grant = match self.validate(submitted, client).await {
            Validation::Accepted(grant) => grant,
            Validation::Rejected(rejection) => return Ok(Redemption::Denied(rejection)),
        };
        match self.issue(grant, client).await {
            Ok(session) => Ok(Redemption::Granted(session)),
            Err(err) => {
                if let Grant::Rotating { code_id } = grant {
                    if let Err(release_err) = self.store.release_code(code_id).await {
                        tracing::warn!(%code_id, "failed to release access code use: {release_err}");
                    }
                }
                Err(err)
            }
        }
    }

    /// Redeem a code and store the resulting token in `slot`.
    ///
    /// # Errors
    /// See [`DemoAccess::redeem`].
    pub async fn redeem_into<S: SessionSlot + ?Sized>(
        &self,
        slot: &mut S,
        submitted: &str,
        client: &ClientMetadata,
    ) -> Result<Redemption, StoreError> {
        let redemption = self.redeem(submitted, client).await?;
        if let Redemption::Granted(session) = &redemption {
            slot.set(session.token.clone());
        }
        Ok(redemption)
    }

    pub async fn verify(&self, token: &str, client: &ClientMetadata) -> bool {
        self.verifier.verify(token, client).await
    }

    pub async fn detect_anomaly(&self, token: &str, client: &ClientMetadata) -> bool {
        self.detector.detect(token, client).await
    }

    /// Generate a code, count active codes, and drop expired sessions.
    ///
    /// # Errors
    /// Returns a [`StoreError`] when generation fails; the follow-up steps
    /// only log their failures.
    pub async fn rotate(&self) -> Result<Rotation, StoreError> {
        let code = self.generate().await?;
        let now = self.clock.now();
        let active_codes = match self.store.active_codes(now).await {
            Ok(codes) => codes.len(),
            Err(err) => {
                tracing::warn!("failed to list active codes: {err}");
                0
            }
        };
        let purged_sessions = match self.store.purge_expired_sessions(now).await {
            Ok(purged) => purged,
            Err(err) => {
                tracing::warn!("failed to purge expired sessions: {err}");
                0
            }
        };
        Ok(Rotation {
            code,
            active_codes,
            purged_sessions,
        })
    }

    /// Aggregated audit events for the last `days_back` days (default 7,
    /// capped at [`MAX_DASHBOARD_DAYS`]).
    ///
    /// # Errors
    /// Returns a [`StoreError`] when the store read fails.
    pub async fn security_dashboard(
        &self,
        days_back: Option<u32>,
    ) -> Result<Vec<DashboardRow>, StoreError> {
        let days = days_back
            .unwrap_or(DEFAULT_DASHBOARD_DAYS)
            .min(MAX_DASHBOARD_DAYS);
        let now = self.clock.now();
        let since = now
            .checked_sub_signed(Duration::days(i64::from(days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.store.security_dashboard(since).await
    }
}
