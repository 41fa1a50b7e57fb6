//! Session anomaly scoring.
//!
//! Current request metadata is compared with what the session last recorded.
//! Each diverging dimension gets a confidence score in `0.0..=1.0`; a row is
//! written when the score is positive and reaches the configured threshold.
//! Detection is advisory: it never invalidates a session.

use serde_json::json;
use std::{collections::HashSet, net::IpAddr, sync::Arc};
use tracing::{debug, warn};

use super::audit::SecurityLog;
use super::config::{AccessConfig, Clock};
use super::models::{
    AnomalyType, ClientMetadata, DemoSession, NewSessionAnomaly, RiskLevel, SecurityEventKind,
};
use super::store::CodeStore;
use super::token::SessionToken;

const HIGH_RISK_CONFIDENCE: f64 = 0.8;

/// Confidence that `current` is a different client than `previous`.
#[must_use]
pub fn ip_confidence(previous: IpAddr, current: IpAddr) -> f64 {
    match (previous, current) {
        (IpAddr::V4(a), IpAddr::V4(b)) => {
            let shared = shared_prefix_bits(&a.octets(), &b.octets());
            match shared {
                32 => 0.0,
                24..=31 => 0.25,
                16..=23 => 0.5,
                _ => 1.0,
            }
        }
        (IpAddr::V6(a), IpAddr::V6(b)) => {
            let shared = shared_prefix_bits(&a.octets(), &b.octets());
            match shared {
                128 => 0.0,
                64..=127 => 0.25,
                48..=63 => 0.5,
                _ => 1.0,
            }
        }
        _ => 1.0,
    }
}

fn shared_prefix_bits(a: &[u8], b: &[u8]) -> u32 {
    let mut bits = 0;
    for (x, y) in a.iter().zip(b) {
        let diff = x ^ y;
        if diff == 0 {
            bits += 8;
        } else {
            bits += diff.leading_zeros();
            break;
        }
    }
    bits
}

/// One minus the Jaccard similarity of the user-agent token sets.
#[must_use]
pub fn user_agent_confidence(previous: &str, current: &str) -> f64 {
    let tokens = |value: &str| -> HashSet<String> {
        value
            .split(|c: char| c.is_whitespace() || matches!(c, ';' | '(' | ')' | ','))
            .filter(|token| !token.is_empty())
            .map(str::to_lowercase)
            .collect()
    };
    let previous = tokens(previous);
    let current = tokens(current);
    if previous.is_empty() && current.is_empty() {
        return 0.0;
    }
    let shared = previous.intersection(&current).count();
    let total = previous.union(&current).count();
    #[allow(clippy::cast_precision_loss)]
    let similarity = shared as f64 / total as f64;
    1.0 - similarity
}

#[derive(Clone)]
pub struct AnomalyDetector {
    store: Arc<dyn CodeStore>,
    clock: Arc<dyn Clock>,
    config: AccessConfig,
    audit: SecurityLog,
}

impl AnomalyDetector {
    pub fn new(store: Arc<dyn CodeStore>, clock: Arc<dyn Clock>, config: AccessConfig) -> Self {
        let audit = SecurityLog::new(Arc::clone(&store), Arc::clone(&clock));
        Self {
            store,
            clock,
            config,
            audit,
        }
    }

    /// Look up the session behind `token` and compare it with `current`.
    ///
    /// Unknown tokens and store failures report no anomaly.
    pub async fn detect(&self, token: &str, current: &ClientMetadata) -> bool {
        let Ok(token) = SessionToken::parse(token) else {
            return false;
        };
        match self.store.find_session(&token.fingerprint()).await {
            Ok(Some(session)) => self.inspect(&session, current).await,
            Ok(None) => false,
            Err(err) => {
                warn!("anomaly lookup failed: {err}");
                false
            }
        }
    }

    /// Compare `current` with the metadata recorded on `session`.
    pub async fn inspect(&self, session: &DemoSession, current: &ClientMetadata) -> bool {
        let threshold = self.config.anomaly_threshold();
        let mut findings = Vec::new();

        if let (Some(previous), Some(now_ip)) = (session.client_ip, current.ip) {
            let confidence = ip_confidence(previous, now_ip);
            if confidence > 0.0 && confidence >= threshold {
                findings.push((
                    AnomalyType::IpChange,
                    previous.to_string(),
                    now_ip.to_string(),
                    confidence,
                ));
            }
        }

        if let (Some(previous), Some(now_ua)) = (&session.user_agent, &current.user_agent) {
            let confidence = user_agent_confidence(previous, now_ua);
            if confidence > 0.0 && confidence >= threshold {
                findings.push((
                    AnomalyType::UserAgentChange,
                    previous.clone(),
                    now_ua.clone(),
                    confidence,
                ));
            }
        }

        if findings.is_empty() {
            return false;
        }

        for (anomaly_type, previous_value, current_value, confidence_score) in findings {
            debug!(
                anomaly_type = anomaly_type.as_str(),
                confidence_score, "session anomaly detected"
            );
            let anomaly = NewSessionAnomaly {
                session_token: session.token_hash.clone(),
                anomaly_type,
                previous_value: Some(previous_value),
                current_value: Some(current_value),
                confidence_score,
                created_at: self.clock.now(),
            };
            if let Err(err) = self.store.insert_anomaly(anomaly).await {
                warn!("failed to record session anomaly: {err}");
            }

            let risk_level = if confidence_score >= HIGH_RISK_CONFIDENCE {
                RiskLevel::High
            } else {
                RiskLevel::Medium
            };
            self.audit
                .record(
                    SecurityEventKind::SessionAnomaly,
                    risk_level,
                    current,
                    Some(&session.token_hash),
                    json!({
                        "anomaly_type": anomaly_type.as_str(),
                        "confidence_score": confidence_score,
                    }),
                )
                .await;
        }

        true
    }
}
