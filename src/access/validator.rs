//! Access-code redemption checks.

use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::audit::SecurityLog;
use super::code::{normalize_code, redact_code, valid_code_format};
use super::config::{AccessConfig, Clock};
use super::models::{ClientMetadata, RiskLevel, SecurityEventKind};
use super::store::CodeStore;

pub const INVALID_CODE_MESSAGE: &str = "Invalid or expired access code";
pub const VERIFICATION_FAILED_MESSAGE: &str = "Access verification failed";

/// What an accepted code entitles the caller to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Grant {
    /// A rotating code; one use has already been consumed.
    Rotating { code_id: Uuid },
    /// A bypass code honored because bypass is enabled.
    Bypass,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// Unknown, inactive, expired, or exhausted code.
    InvalidOrExpired,
    /// The store could not be consulted; treated as a rejection.
    Unavailable,
}

impl Rejection {
    /// Generic client-facing message; never echoes the code or store detail.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::InvalidOrExpired => INVALID_CODE_MESSAGE,
            Self::Unavailable => VERIFICATION_FAILED_MESSAGE,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Validation {
    Accepted(Grant),
    Rejected(Rejection),
}

impl Validation {
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

#[derive(Clone)]
pub struct CodeValidator {
    store: Arc<dyn CodeStore>,
    clock: Arc<dyn Clock>,
    config: AccessConfig,
    audit: SecurityLog,
}

impl CodeValidator {
    pub fn new(store: Arc<dyn CodeStore>, clock: Arc<dyn Clock>, config: AccessConfig) -> Self {
        let audit = SecurityLog::new(Arc::clone(&store), Arc::clone(&clock));
        Self {
            store,
            clock,
            config,
            audit,
        }
    }

    /// Check a submitted code and consume one use when it is redeemable.
    ///
    /// Never fails: store errors are logged and reported as
    /// [`Rejection::Unavailable`].
    pub async fn validate(&self, submitted: &str, client: &ClientMetadata) -> Validation {
        let normalized = normalize_code(submitted);
        if !valid_code_format(&normalized) {
            debug!("access code rejected by format check");
            return Validation::Rejected(Rejection::InvalidOrExpired);
        }
        let prefix = redact_code(&normalized);

        if self.config.is_bypass_code(&normalized) {
            warn!(access_code_prefix = %prefix, "bypass access code accepted");
            self.audit
                .record(
                    SecurityEventKind::BypassCodeUsed,
                    RiskLevel::Medium,
                    client,
                    None,
                    json!({
                        "session_type": "test",
                        "access_code_prefix": prefix,
                    }),
                )
                .await;
            return Validation::Accepted(Grant::Bypass);
        }

        match self.store.redeem_code(&normalized, self.clock.now()).await {
            Ok(Some(code)) => {
                self.audit
                    .record(
                        SecurityEventKind::DemoSessionCreated,
                        RiskLevel::Low,
                        client,
                        None,
                        json!({
                            "session_type": "rotating_code",
                            "access_code_prefix": prefix,
                            "usage_count": code.usage_count,
                        }),
                    )
                    .await;
                Validation::Accepted(Grant::Rotating { code_id: code.id })
            }
            Ok(None) => {
                self.audit
                    .record(
                        SecurityEventKind::InvalidAccessCode,
                        RiskLevel::Medium,
                        client,
                        None,
                        json!({ "access_code_prefix": prefix }),
                    )
                    .await;
                Validation::Rejected(Rejection::InvalidOrExpired)
            }
            Err(err) => {
                warn!("access code validation failed closed: {err}");
                Validation::Rejected(Rejection::Unavailable)
            }
        }
    }
}
