//! Process-local [`CodeStore`] for development and tests.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::error::StoreError;
use super::models::{
    AccessCode, ClientMetadata, DashboardRow, DemoSession, NewAccessCode, NewDemoSession,
    NewSecurityEvent, NewSessionAnomaly, SecurityEvent, SessionAnomaly,
};
use super::store::CodeStore;

#[derive(Default)]
struct Inner {
    codes: Vec<AccessCode>,
    sessions: HashMap<String, DemoSession>,
    events: Vec<SecurityEvent>,
    anomalies: Vec<SessionAnomaly>,
}

/// All state lives behind one mutex, which makes `redeem_code` atomic.
#[derive(Default)]
pub struct MemoryCodeStore {
    inner: Mutex<Inner>,
}

impl MemoryCodeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn codes(&self) -> Vec<AccessCode> {
        self.inner.lock().await.codes.clone()
    }

    pub async fn sessions(&self) -> Vec<DemoSession> {
        self.inner.lock().await.sessions.values().cloned().collect()
    }

    pub async fn security_events(&self) -> Vec<SecurityEvent> {
        self.inner.lock().await.events.clone()
    }

    pub async fn anomalies(&self) -> Vec<SessionAnomaly> {
        self.inner.lock().await.anomalies.clone()
    }
}

fn active_unexpired(codes: &[AccessCode], now: DateTime<Utc>) -> Vec<AccessCode> {
    let mut active: Vec<AccessCode> = codes
        .iter()
        .filter(|code| code.is_active && now < code.expires_at)
        .cloned()
        .collect();
    active.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    active
}

#[async_trait]
impl CodeStore for MemoryCodeStore {
    async fn insert_code(&self, code: NewAccessCode) -> Result<AccessCode, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.codes.iter().any(|existing| existing.code == code.code) {
            return Err(StoreError::Conflict("access code"));
        }
        let record = AccessCode {
            id: Uuid::new_v4(),
            code: code.code,
            created_at: code.created_at,
            expires_at: code.expires_at,
            is_active: true,
            max_uses: code.max_uses,
            usage_count: 0,
            last_used_at: None,
            one_off: code.one_off,
            description: code.description,
        };
        inner.codes.push(record.clone());
        Ok(record)
    }

    async fn current_code(&self, now: DateTime<Utc>) -> Result<Option<AccessCode>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(active_unexpired(&inner.codes, now)
            .into_iter()
            .find(|code| !code.one_off))
    }

    async fn active_codes(&self, now: DateTime<Utc>) -> Result<Vec<AccessCode>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(active_unexpired(&inner.codes, now))
    }

    async fn deactivate_codes_except(&self, keep: Uuid) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        let mut changed = 0;
        for code in inner
            .codes
            .iter_mut()
            .filter(|code| code.is_active && !code.one_off && code.id != keep)
        {
            code.is_active = false;
            changed += 1;
        }
        Ok(changed)
    }

    async fn redeem_code(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AccessCode>, StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(record) = inner
            .codes
            .iter_mut()
            .find(|record| record.code == code && record.is_redeemable(now))
        else {
            return Ok(None);
        };
        record.usage_count += 1;
        record.last_used_at = Some(now);
        Ok(Some(record.clone()))
    }

    async fn release_code(&self, code_id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(record) = inner.codes.iter_mut().find(|record| record.id == code_id) {
            record.usage_count = (record.usage_count - 1).max(0);
        }
        Ok(())
    }

    async fn insert_session(&self, session: NewDemoSession) -> Result<DemoSession, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.sessions.contains_key(&session.token_hash) {
            return Err(StoreError::Conflict("session"));
        }
        let record = DemoSession {
            id: Uuid::new_v4(),
            token_hash: session.token_hash,
            kind: session.kind,
            access_code_id: session.access_code_id,
            created_at: session.created_at,
            expires_at: session.expires_at,
            last_activity: session.created_at,
            client_ip: session.client.ip,
            user_agent: session.client.user_agent,
        };
        inner
            .sessions
            .insert(record.token_hash.clone(), record.clone());
        Ok(record)
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<DemoSession>, StoreError> {
        Ok(self.inner.lock().await.sessions.get(token_hash).cloned())
    }

    async fn touch_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
        client: &ClientMetadata,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(session) = inner.sessions.get_mut(token_hash) {
            session.last_activity = now;
            if client.ip.is_some() {
                session.client_ip = client.ip;
            }
            if client.user_agent.is_some() {
                session.user_agent.clone_from(&client.user_agent);
            }
        }
        Ok(())
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        let before = inner.sessions.len();
        inner.sessions.retain(|_, session| session.is_valid(now));
        Ok(u64::try_from(before - inner.sessions.len()).unwrap_or(u64::MAX))
    }

    async fn insert_security_event(&self, event: NewSecurityEvent) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        self.inner.lock().await.events.push(SecurityEvent {
            id,
            event_type: event.kind.as_str().to_string(),
            risk_level: event.risk_level,
            ip_address: event.client.ip,
            user_agent: event.client.user_agent,
            session_token: event.session_token,
            event_details: event.details,
            created_at: event.created_at,
        });
        Ok(id)
    }

    async fn insert_anomaly(&self, anomaly: NewSessionAnomaly) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        self.inner.lock().await.anomalies.push(SessionAnomaly {
            id,
            session_token: anomaly.session_token,
            anomaly_type: anomaly.anomaly_type.as_str().to_string(),
            previous_value: anomaly.previous_value,
            current_value: anomaly.current_value,
            confidence_score: anomaly.confidence_score,
            created_at: anomaly.created_at,
            investigated: false,
        });
        Ok(id)
    }

    async fn security_dashboard(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<DashboardRow>, StoreError> {
        #[derive(Default)]
        struct Bucket {
            count: i64,
            ips: HashSet<std::net::IpAddr>,
            sessions: HashSet<String>,
        }

        let inner = self.inner.lock().await;
        let mut buckets: BTreeMap<(NaiveDate, String, String), Bucket> = BTreeMap::new();
        for event in inner.events.iter().filter(|event| event.created_at >= since) {
            let key = (
                event.created_at.date_naive(),
                event.event_type.clone(),
                event.risk_level.as_str().to_string(),
            );
            let bucket = buckets.entry(key).or_default();
            bucket.count += 1;
            if let Some(ip) = event.ip_address {
                bucket.ips.insert(ip);
            }
            if let Some(token) = &event.session_token {
                bucket.sessions.insert(token.clone());
            }
        }

        let mut rows: Vec<DashboardRow> = buckets
            .into_iter()
            .map(|((date, event_type, risk_level), bucket)| DashboardRow {
                date,
                event_type,
                risk_level,
                event_count: bucket.count,
                unique_ips: i64::try_from(bucket.ips.len()).unwrap_or(i64::MAX),
                unique_sessions: i64::try_from(bucket.sessions.len()).unwrap_or(i64::MAX),
            })
            .collect();
        rows.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then_with(|| b.event_count.cmp(&a.event_count))
        });
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::models::{RiskLevel, SecurityEventKind};
    use crate::access::token::TokenKind;
    use anyhow::{Context, Result};
    use chrono::Duration;
    use serde_json::json;
    use std::sync::Arc;

    fn new_code(code: &str, now: DateTime<Utc>, max_uses: Option<i32>) -> NewAccessCode {
        NewAccessCode {
            code: code.to_string(),
            created_at: now,
            expires_at: now + Duration::hours(1),
            max_uses,
            one_off: false,
            description: None,
        }
    }

    #[tokio::test]
    async fn duplicate_codes_conflict() -> Result<()> {
        let store = MemoryCodeStore::new();
        let now = Utc::now();
        store.insert_code(new_code("ABCDEF", now, None)).await?;
        let result = store.insert_code(new_code("ABCDEF", now, None)).await;
        assert!(matches!(result, Err(StoreError::Conflict("access code"))));
        Ok(())
    }

    #[tokio::test]
    async fn redeem_stops_at_max_uses() -> Result<()> {
        let store = MemoryCodeStore::new();
        let now = Utc::now();
        store.insert_code(new_code("ABCDEF", now, Some(2))).await?;

        let first = store
            .redeem_code("ABCDEF", now)
            .await?
            .context("first redemption")?;
        assert_eq!(first.usage_count, 1);
        assert_eq!(first.last_used_at, Some(now));
        assert!(store.redeem_code("ABCDEF", now).await?.is_some());
        assert!(store.redeem_code("ABCDEF", now).await?.is_none());
        assert_eq!(store.codes().await[0].usage_count, 2);
        Ok(())
    }

    #[tokio::test]
    async fn release_returns_a_use() -> Result<()> {
        let store = MemoryCodeStore::new();
        let now = Utc::now();
        let code = store.insert_code(new_code("ABCDEF", now, Some(1))).await?;

        assert!(store.redeem_code("ABCDEF", now).await?.is_some());
        assert!(store.redeem_code("ABCDEF", now).await?.is_none());
        store.release_code(code.id).await?;
        assert_eq!(store.codes().await[0].usage_count, 0);
        assert!(store.redeem_code("ABCDEF", now).await?.is_some());

        // never below zero
        store.release_code(code.id).await?;
        store.release_code(code.id).await?;
        assert_eq!(store.codes().await[0].usage_count, 0);
        Ok(())
    }

    #[tokio::test]
    async fn one_off_codes_are_never_current_or_superseded() -> Result<()> {
        let store = MemoryCodeStore::new();
        let now = Utc::now();
        let rotating = store.insert_code(new_code("ROTATE", now, None)).await?;
        let one_off = store
            .insert_code(NewAccessCode {
                one_off: true,
                description: Some("partner preview".to_string()),
                ..new_code("ONEOFF", now + Duration::seconds(1), Some(1))
            })
            .await?;

        let current = store.current_code(now + Duration::seconds(2)).await?;
        assert_eq!(current.map(|code| code.id), Some(rotating.id));

        let newer = store
            .insert_code(new_code("NEWER1", now + Duration::seconds(3), None))
            .await?;
        assert_eq!(store.deactivate_codes_except(newer.id).await?, 1);
        let active = store.active_codes(now + Duration::seconds(4)).await?;
        assert!(active.iter().any(|code| code.id == one_off.id));
        assert!(active.iter().all(|code| code.id != rotating.id));
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_redemptions_never_exceed_cap() -> Result<()> {
        let store = Arc::new(MemoryCodeStore::new());
        let now = Utc::now();
        store.insert_code(new_code("ABCDEF", now, Some(3))).await?;

        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.redeem_code("ABCDEF", now).await
            }));
        }
        let mut accepted = 0;
        for handle in handles {
            if handle.await??.is_some() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 3);
        assert_eq!(store.codes().await[0].usage_count, 3);
        Ok(())
    }

    #[tokio::test]
    async fn current_code_is_newest_active() -> Result<()> {
        let store = MemoryCodeStore::new();
        let now = Utc::now();
        let older = store.insert_code(new_code("OLDER1", now, None)).await?;
        let newer = store
            .insert_code(new_code("NEWER1", now + Duration::seconds(1), None))
            .await?;
        let current = store.current_code(now + Duration::seconds(2)).await?;
        assert_eq!(current.map(|code| code.id), Some(newer.id));

        assert_eq!(store.deactivate_codes_except(newer.id).await?, 1);
        let active = store.active_codes(now + Duration::seconds(2)).await?;
        assert_eq!(active.len(), 1);
        assert!(active.iter().all(|code| code.id != older.id));
        Ok(())
    }

    #[tokio::test]
    async fn purge_drops_only_expired_sessions() -> Result<()> {
        let store = MemoryCodeStore::new();
        let now = Utc::now();
        for (hash, ttl) in [("expired", -1), ("live", 60)] {
            store
                .insert_session(NewDemoSession {
                    token_hash: hash.to_string(),
                    kind: TokenKind::Rotating,
                    access_code_id: None,
                    created_at: now,
                    expires_at: now + Duration::seconds(ttl),
                    client: ClientMetadata::default(),
                })
                .await?;
        }
        assert_eq!(store.purge_expired_sessions(now).await?, 1);
        assert!(store.find_session("live").await?.is_some());
        assert!(store.find_session("expired").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn dashboard_groups_by_day_type_and_risk() -> Result<()> {
        let store = MemoryCodeStore::new();
        let now = Utc::now();
        for ip in ["10.0.0.1", "10.0.0.2", "10.0.0.1"] {
            store
                .insert_security_event(NewSecurityEvent {
                    kind: SecurityEventKind::InvalidAccessCode,
                    risk_level: RiskLevel::Medium,
                    client: ClientMetadata::new(Some(ip.parse()?), None),
                    session_token: None,
                    details: json!({}),
                    created_at: now,
                })
                .await?;
        }
        store
            .insert_security_event(NewSecurityEvent {
                kind: SecurityEventKind::DemoSessionCreated,
                risk_level: RiskLevel::Low,
                client: ClientMetadata::default(),
                session_token: Some("hash".to_string()),
                details: json!({}),
                created_at: now - Duration::days(30),
            })
            .await?;

        let rows = store.security_dashboard(now - Duration::days(7)).await?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].event_type, "invalid_access_code");
        assert_eq!(rows[0].risk_level, "medium");
        assert_eq!(rows[0].event_count, 3);
        assert_eq!(rows[0].unique_ips, 2);
        assert_eq!(rows[0].unique_sessions, 0);
        Ok(())
    }
}
