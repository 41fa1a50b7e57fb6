//! Read/write contract the access flow needs from its backing store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::error::StoreError;
use super::models::{
    AccessCode, ClientMetadata, DashboardRow, DemoSession, NewAccessCode, NewDemoSession,
    NewSecurityEvent, NewSessionAnomaly,
};

/// Durable state for codes, sessions, and audit records.
///
/// Every call re-reads current state; callers keep no cache.
#[async_trait]
pub trait CodeStore: Send + Sync {
    /// Insert a new active code with `usage_count = 0`.
    ///
    /// Returns [`StoreError::Conflict`] when the code text already exists.
    async fn insert_code(&self, code: NewAccessCode) -> Result<AccessCode, StoreError>;

    /// Most recently created rotating code that is active and unexpired at
    /// `now`. One-off codes are never current.
    async fn current_code(&self, now: DateTime<Utc>) -> Result<Option<AccessCode>, StoreError>;

    /// Active, unexpired codes ordered newest first.
    async fn active_codes(&self, now: DateTime<Utc>) -> Result<Vec<AccessCode>, StoreError>;

    /// Deactivate every active rotating code except `keep`; returns the
    /// number changed. One-off codes are left alone.
    async fn deactivate_codes_except(&self, keep: Uuid) -> Result<u64, StoreError>;

    /// Atomically check redeemability and consume one use.
    ///
    /// Returns the updated code, or `None` when the code is unknown, inactive,
    /// expired, or exhausted. The check and the increment must be a single
    /// conditional write so concurrent redemptions cannot exceed `max_uses`.
    async fn redeem_code(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AccessCode>, StoreError>;

    /// Give back one use consumed by [`CodeStore::redeem_code`] when no
    /// session came of it. The count never drops below zero.
    async fn release_code(&self, code_id: Uuid) -> Result<(), StoreError>;

    /// Returns [`StoreError::Conflict`] when the token hash already exists.
    async fn insert_session(&self, session: NewDemoSession) -> Result<DemoSession, StoreError>;

    async fn find_session(&self, token_hash: &str) -> Result<Option<DemoSession>, StoreError>;

    /// Record activity and the latest client metadata for a session.
    async fn touch_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
        client: &ClientMetadata,
    ) -> Result<(), StoreError>;

    /// Drop sessions whose expiry is at or before `now`.
    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    async fn insert_security_event(&self, event: NewSecurityEvent) -> Result<Uuid, StoreError>;

    async fn insert_anomaly(&self, anomaly: NewSessionAnomaly) -> Result<Uuid, StoreError>;

    /// Per-day aggregate of audit events created at or after `since`.
    async fn security_dashboard(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<DashboardRow>, StoreError>;
}
