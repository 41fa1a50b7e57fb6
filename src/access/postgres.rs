//! Postgres-backed [`CodeStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::{info_span, Instrument, Span};
use uuid::Uuid;

use super::error::StoreError;
use super::models::{
    AccessCode, ClientMetadata, DashboardRow, DemoSession, NewAccessCode, NewDemoSession,
    NewSecurityEvent, NewSessionAnomaly,
};
use super::store::CodeStore;
use super::token::TokenKind;

pub const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

const CODE_COLUMNS: &str = "id, code, created_at, expires_at, is_active, max_uses, \
     usage_count, last_used_at, one_off, description";
const SESSION_COLUMNS: &str = "id, token_hash, token_kind, access_code_id, created_at, \
     expires_at, last_activity, ip_address, user_agent";

#[derive(Clone)]
pub struct PgCodeStore {
    pool: PgPool,
}

fn db_span(operation: &'static str, statement: &str) -> Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn code_from_row(row: &PgRow) -> AccessCode {
    AccessCode {
        id: row.get("id"),
        code: row.get("code"),
        created_at: row.get("created_at"),
        expires_at: row.get("expires_at"),
        is_active: row.get("is_active"),
        max_uses: row.get("max_uses"),
        usage_count: row.get("usage_count"),
        last_used_at: row.get("last_used_at"),
        one_off: row.get("one_off"),
        description: row.get("description"),
    }
}

fn session_from_row(row: &PgRow) -> Result<DemoSession, StoreError> {
    let kind: String = row.get("token_kind");
    let kind = kind
        .parse::<TokenKind>()
        .map_err(|err| StoreError::Corrupt {
            entity: "session",
            reason: err.to_string(),
        })?;
    Ok(DemoSession {
        id: row.get("id"),
        token_hash: row.get("token_hash"),
        kind,
        access_code_id: row.get("access_code_id"),
        created_at: row.get("created_at"),
        expires_at: row.get("expires_at"),
        last_activity: row.get("last_activity"),
        client_ip: row.get("ip_address"),
        user_agent: row.get("user_agent"),
    })
}

/// Split a SQL script into statements, dropping comment-only lines.
pub(crate) fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

impl PgCodeStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create tables and indexes if they are missing.
    ///
    /// # Errors
    /// Returns an error if any schema statement fails.
    pub async fn apply_schema(&self) -> Result<(), StoreError> {
        for statement in split_sql_statements(SCHEMA_SQL) {
            sqlx::query(&statement)
                .execute(&self.pool)
                .instrument(db_span("DDL", &statement))
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl CodeStore for PgCodeStore {
    async fn insert_code(&self, code: NewAccessCode) -> Result<AccessCode, StoreError> {
        let query = format!(
            "INSERT INTO rotating_access_codes \
             (id, code, created_at, expires_at, max_uses, one_off, description) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {CODE_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(&code.code)
            .bind(code.created_at)
            .bind(code.expires_at)
            .bind(code.max_uses)
            .bind(code.one_off)
            .bind(&code.description)
            .fetch_one(&self.pool)
            .instrument(db_span("INSERT", &query))
            .await
            .map_err(|err| StoreError::from_sqlx(err, "access code"))?;
        Ok(code_from_row(&row))
    }

    async fn current_code(&self, now: DateTime<Utc>) -> Result<Option<AccessCode>, StoreError> {
        let query = format!(
            "SELECT {CODE_COLUMNS} FROM rotating_access_codes \
             WHERE is_active AND NOT one_off AND expires_at > $1 \
             ORDER BY created_at DESC LIMIT 1"
        );
        let row = sqlx::query(&query)
            .bind(now)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await?;
        Ok(row.as_ref().map(code_from_row))
    }

    async fn active_codes(&self, now: DateTime<Utc>) -> Result<Vec<AccessCode>, StoreError> {
        let query = format!(
            "SELECT {CODE_COLUMNS} FROM rotating_access_codes \
             WHERE is_active AND expires_at > $1 \
             ORDER BY created_at DESC"
        );
        let rows = sqlx::query(&query)
            .bind(now)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await?;
        Ok(rows.iter().map(code_from_row).collect())
    }

    async fn deactivate_codes_except(&self, keep: Uuid) -> Result<u64, StoreError> {
        let query = r"
            UPDATE rotating_access_codes
            SET is_active = FALSE
            WHERE is_active AND NOT one_off AND id <> $1
        ";
        let result = sqlx::query(query)
            .bind(keep)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await?;
        Ok(result.rows_affected())
    }

    async fn redeem_code(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AccessCode>, StoreError> {
        // Check and increment in one conditional UPDATE; concurrent redemptions
        // serialize on the row lock and re-evaluate the predicate.
        let query = format!(
            "UPDATE rotating_access_codes \
             SET usage_count = usage_count + 1, last_used_at = $2 \
             WHERE code = $1 \
               AND is_active \
               AND expires_at > $2 \
               AND (max_uses IS NULL OR usage_count < max_uses) \
             RETURNING {CODE_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(code)
            .bind(now)
            .fetch_optional(&self.pool)
            .instrument(db_span("UPDATE", &query))
            .await?;
        Ok(row.as_ref().map(code_from_row))
    }

    async fn release_code(&self, code_id: Uuid) -> Result<(), StoreError> {
        let query = r"
            UPDATE rotating_access_codes
            SET usage_count = GREATEST(usage_count - 1, 0)
            WHERE id = $1
        ";
        sqlx::query(query)
            .bind(code_id)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await?;
        Ok(())
    }

    async fn insert_session(&self, session: NewDemoSession) -> Result<DemoSession, StoreError> {
        let query = format!(
            "INSERT INTO demo_sessions \
             (id, token_hash, token_kind, access_code_id, created_at, expires_at, \
              last_activity, ip_address, user_agent) \
             VALUES ($1, $2, $3, $4, $5, $6, $5, $7, $8) \
             RETURNING {SESSION_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(&session.token_hash)
            .bind(session.kind.tag())
            .bind(session.access_code_id)
            .bind(session.created_at)
            .bind(session.expires_at)
            .bind(session.client.ip)
            .bind(&session.client.user_agent)
            .fetch_one(&self.pool)
            .instrument(db_span("INSERT", &query))
            .await
            .map_err(|err| StoreError::from_sqlx(err, "session"))?;
        session_from_row(&row)
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<DemoSession>, StoreError> {
        let query = format!("SELECT {SESSION_COLUMNS} FROM demo_sessions WHERE token_hash = $1");
        let row = sqlx::query(&query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await?;
        row.as_ref().map(session_from_row).transpose()
    }

    async fn touch_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
        client: &ClientMetadata,
    ) -> Result<(), StoreError> {
        // Record activity without extending the session expiry.
        let query = r"
            UPDATE demo_sessions
            SET last_activity = $2,
                ip_address = COALESCE($3, ip_address),
                user_agent = COALESCE($4, user_agent)
            WHERE token_hash = $1
        ";
        sqlx::query(query)
            .bind(token_hash)
            .bind(now)
            .bind(client.ip)
            .bind(&client.user_agent)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await?;
        Ok(())
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let query = "DELETE FROM demo_sessions WHERE expires_at <= $1";
        let result = sqlx::query(query)
            .bind(now)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_security_event(&self, event: NewSecurityEvent) -> Result<Uuid, StoreError> {
        let query = r"
            INSERT INTO security_audit_logs
                (id, event_type, risk_level, ip_address, user_agent, session_token,
                 event_details, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7::jsonb, $8)
        ";
        let id = Uuid::new_v4();
        let details = serde_json::to_string(&event.details).map_err(|err| StoreError::Corrupt {
            entity: "security event",
            reason: err.to_string(),
        })?;
        sqlx::query(query)
            .bind(id)
            .bind(event.kind.as_str())
            .bind(event.risk_level.as_str())
            .bind(event.client.ip)
            .bind(&event.client.user_agent)
            .bind(&event.session_token)
            .bind(details)
            .bind(event.created_at)
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await?;
        Ok(id)
    }

    async fn insert_anomaly(&self, anomaly: NewSessionAnomaly) -> Result<Uuid, StoreError> {
        let query = r"
            INSERT INTO session_anomalies
                (id, session_token, anomaly_type, previous_value, current_value,
                 confidence_score, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
        ";
        let id = Uuid::new_v4();
        sqlx::query(query)
            .bind(id)
            .bind(&anomaly.session_token)
            .bind(anomaly.anomaly_type.as_str())
            .bind(&anomaly.previous_value)
            .bind(&anomaly.current_value)
            .bind(anomaly.confidence_score)
            .bind(anomaly.created_at)
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await?;
        Ok(id)
    }

    async fn security_dashboard(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<DashboardRow>, StoreError> {
        let query = r"
            SELECT (created_at AT TIME ZONE 'UTC')::date AS date,
                   event_type,
                   risk_level,
                   COUNT(*)::bigint AS event_count,
                   COUNT(DISTINCT ip_address)::bigint AS unique_ips,
                   COUNT(DISTINCT session_token)::bigint AS unique_sessions
            FROM security_audit_logs
            WHERE created_at >= $1
            GROUP BY 1, 2, 3
            ORDER BY 1 DESC, 4 DESC
        ";
        let rows = sqlx::query(query)
            .bind(since)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?;
        Ok(rows
            .iter()
            .map(|row| DashboardRow {
                date: row.get("date"),
                event_type: row.get("event_type"),
                risk_level: row.get("risk_level"),
                event_count: row.get("event_count"),
                unique_ips: row.get("unique_ips"),
                unique_sessions: row.get("unique_sessions"),
            })
            .collect())
    }
}
