//! Records persisted by the code store.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, net::IpAddr, str::FromStr};
use utoipa::ToSchema;
use uuid::Uuid;

use super::token::TokenKind;

/// Access code. Rotating codes form the "current code" sequence; one-off
/// codes are issued by an operator and never become current or get superseded.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AccessCode {
    pub id: Uuid,
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub max_uses: Option<i32>,
    pub usage_count: i32,
    pub last_used_at: Option<DateTime<Utc>>,
    pub one_off: bool,
    pub description: Option<String>,
}

impl AccessCode {
    /// A code is redeemable while active, unexpired, and under its usage cap.
    #[must_use]
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && now < self.expires_at
            && self.max_uses.map_or(true, |max| self.usage_count < max)
    }
}

#[derive(Clone, Debug)]
pub struct NewAccessCode {
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub max_uses: Option<i32>,
    pub one_off: bool,
    pub description: Option<String>,
}

/// Server-side session record. Only the token fingerprint is stored.
#[derive(Clone, Debug, PartialEq)]
pub struct DemoSession {
    pub id: Uuid,
    pub token_hash: String,
    pub kind: TokenKind,
    pub access_code_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub client_ip: Option<IpAddr>,
    pub user_agent: Option<String>,
}

impl DemoSession {
    #[must_use]
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[derive(Clone, Debug)]
pub struct NewDemoSession {
    pub token_hash: String,
    pub kind: TokenKind,
    pub access_code_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub client: ClientMetadata,
}

/// Request metadata observed for a caller.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientMetadata {
    pub ip: Option<IpAddr>,
    pub user_agent: Option<String>,
}

impl ClientMetadata {
    #[must_use]
    pub fn new(ip: Option<IpAddr>, user_agent: Option<String>) -> Self {
        Self { ip, user_agent }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown risk level: {other}")),
        }
    }
}

/// Security audit event types written by the access flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventKind {
    DemoSessionCreated,
    InvalidAccessCode,
    BypassCodeUsed,
    AccessCodeGenerated,
    SessionAnomaly,
}

impl SecurityEventKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DemoSessionCreated => "demo_session_created",
            Self::InvalidAccessCode => "invalid_access_code",
            Self::BypassCodeUsed => "bypass_code_used",
            Self::AccessCodeGenerated => "access_code_generated",
            Self::SessionAnomaly => "session_anomaly",
        }
    }
}

#[derive(Clone, Debug)]
pub struct NewSecurityEvent {
    pub kind: SecurityEventKind,
    pub risk_level: RiskLevel,
    pub client: ClientMetadata,
    pub session_token: Option<String>,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Append-only audit row.
#[derive(Clone, Debug, PartialEq)]
pub struct SecurityEvent {
    pub id: Uuid,
    pub event_type: String,
    pub risk_level: RiskLevel,
    pub ip_address: Option<IpAddr>,
    pub user_agent: Option<String>,
    pub session_token: Option<String>,
    pub event_details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    IpChange,
    UserAgentChange,
}

impl AnomalyType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IpChange => "ip_change",
            Self::UserAgentChange => "user_agent_change",
        }
    }
}

#[derive(Clone, Debug)]
pub struct NewSessionAnomaly {
    pub session_token: String,
    pub anomaly_type: AnomalyType,
    pub previous_value: Option<String>,
    pub current_value: Option<String>,
    pub confidence_score: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionAnomaly {
    pub id: Uuid,
    pub session_token: String,
    pub anomaly_type: String,
    pub previous_value: Option<String>,
    pub current_value: Option<String>,
    pub confidence_score: f64,
    pub created_at: DateTime<Utc>,
    pub investigated: bool,
}

/// One aggregate row of the security dashboard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct DashboardRow {
    pub date: NaiveDate,
    pub event_type: String,
    pub risk_level: String,
    pub event_count: i64,
    pub unique_ips: i64,
    pub unique_sessions: i64,
}
