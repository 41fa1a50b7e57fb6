//! Best-effort security audit logging.

use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tokio::time::timeout;
use tracing::{info, warn};

use super::config::Clock;
use super::models::{ClientMetadata, NewSecurityEvent, RiskLevel, SecurityEventKind};
use super::store::CodeStore;

/// Upper bound on a single audit write before it is abandoned.
pub const AUDIT_WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// Writes audit rows; a failed or stalled write is logged locally and
/// swallowed, so callers wait at most [`AUDIT_WRITE_TIMEOUT`].
#[derive(Clone)]
pub struct SecurityLog {
    store: Arc<dyn CodeStore>,
    clock: Arc<dyn Clock>,
}

impl SecurityLog {
    pub fn new(store: Arc<dyn CodeStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn record(
        &self,
        kind: SecurityEventKind,
        risk_level: RiskLevel,
        client: &ClientMetadata,
        session_token: Option<&str>,
        details: Value,
    ) {
        info!(
            event_type = kind.as_str(),
            risk_level = risk_level.as_str(),
            "security event"
        );
        let event = NewSecurityEvent {
            kind,
            risk_level,
            client: client.clone(),
            session_token: session_token.map(str::to_string),
            details,
            created_at: self.clock.now(),
        };
        match timeout(AUDIT_WRITE_TIMEOUT, self.store.insert_security_event(event)).await {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => {
                warn!(event_type = kind.as_str(), "failed to write security event: {err}");
            }
            Err(_) => {
                warn!(event_type = kind.as_str(), "security event write timed out");
            }
        }
    }
}
