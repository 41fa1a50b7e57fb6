//! Access code generation: the rotating sequence and operator one-off codes.

use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::audit::SecurityLog;
use super::code::{generate_code, redact_code};
use super::config::{AccessConfig, Clock};
use super::error::StoreError;
use super::models::{AccessCode, ClientMetadata, NewAccessCode, RiskLevel, SecurityEventKind};
use super::store::CodeStore;

const MAX_INSERT_ATTEMPTS: usize = 3;

/// Lifetime of a one-off code when the operator gives none.
pub const DEFAULT_ONE_OFF_HOURS: i64 = 24;
/// Redemption cap of a one-off code when the operator gives none.
pub const DEFAULT_ONE_OFF_MAX_USES: i32 = 1;

#[derive(Clone)]
pub struct CodeGenerator {
    store: Arc<dyn CodeStore>,
    clock: Arc<dyn Clock>,
    config: AccessConfig,
    audit: SecurityLog,
}

impl CodeGenerator {
    pub fn new(store: Arc<dyn CodeStore>, clock: Arc<dyn Clock>, config: AccessConfig) -> Self {
        let audit = SecurityLog::new(Arc::clone(&store), Arc::clone(&clock));
        Self {
            store,
            clock,
            config,
            audit,
        }
    }

    /// Persist a new active code using the configured TTL and usage cap.
    ///
    /// # Errors
    /// Returns a [`StoreError`] when the store write fails.
    pub async fn generate(&self) -> Result<AccessCode, StoreError> {
        self.generate_with(self.config.code_ttl(), self.config.code_max_uses())
            .await
    }

    /// Persist a new active rotating code with explicit TTL and usage cap.
    ///
    /// Older codes stay active unless superseding is configured; the current
    /// code is always the newest active one. Superseding is best-effort: a
    /// failure is logged and the new code is still returned.
    ///
    /// # Errors
    /// Returns a [`StoreError`] when the store write fails.
    pub async fn generate_with(
        &self,
        ttl: chrono::Duration,
        max_uses: Option<i32>,
    ) -> Result<AccessCode, StoreError> {
        let code = self.insert(ttl, max_uses, false, None).await?;

        if self.config.supersede_codes() {
            match self.store.deactivate_codes_except(code.id).await {
                Ok(superseded) => debug!(superseded, "deactivated previous access codes"),
                Err(err) => {
                    warn!(code_id = %code.id, "failed to supersede previous access codes: {err}");
                }
            }
        }

        self.announce(&code).await;
        Ok(code)
    }

    /// Persist an operator-issued code with its own TTL, usage cap, and note.
    ///
    /// One-off codes never become the current rotating code and are not
    /// superseded by later rotations.
    ///
    /// # Errors
    /// Returns a [`StoreError`] when the store write fails.
    pub async fn generate_one_off(
        &self,
        description: Option<String>,
        ttl: chrono::Duration,
        max_uses: Option<i32>,
    ) -> Result<AccessCode, StoreError> {
        let description = description
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());
        let code = self
            .insert(ttl, max_uses.filter(|max| *max > 0), true, description)
            .await?;
        self.announce(&code).await;
        Ok(code)
    }

    async fn insert(
        &self,
        ttl: chrono::Duration,
        max_uses: Option<i32>,
        one_off: bool,
        description: Option<String>,
    ) -> Result<AccessCode, StoreError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let now = self.clock.now();
            let candidate = NewAccessCode {
                code: generate_code(),
                created_at: now,
                expires_at: now + ttl,
                max_uses,
                one_off,
                description: description.clone(),
            };
            match self.store.insert_code(candidate).await {
                Ok(code) => return Ok(code),
                Err(StoreError::Conflict(_)) if attempts < MAX_INSERT_ATTEMPTS => {
                    debug!("generated access code collided, retrying");
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn announce(&self, code: &AccessCode) {
        info!(
            code_id = %code.id,
            expires_at = %code.expires_at,
            one_off = code.one_off,
            "access code generated"
        );
        self.audit
            .record(
                SecurityEventKind::AccessCodeGenerated,
                RiskLevel::Low,
                &ClientMetadata::default(),
                None,
                json!({
                    "access_code_prefix": redact_code(&code.code),
                    "expires_at": code.expires_at,
                    "max_uses": code.max_uses,
                    "one_off": code.one_off,
                    "description": code.description,
                }),
            )
            .await;
    }

    /// The newest active, unexpired rotating code.
    ///
    /// # Errors
    /// Returns a [`StoreError`] when the store read fails.
    pub async fn current(&self) -> Result<Option<AccessCode>, StoreError> {
        self.store.current_code(self.clock.now()).await
    }
}
