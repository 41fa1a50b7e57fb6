//! Access configuration and the clock used by the access flow.

use chrono::{DateTime, Duration, Utc};

use super::code::normalize_code;

pub const DEFAULT_CODE_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
pub const DEFAULT_SESSION_TTL_SECONDS: i64 = 24 * 60 * 60;
/// Upper bound for code and session lifetimes (ten years).
pub const MAX_TTL_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;
pub const DEFAULT_ANOMALY_THRESHOLD: f64 = 0.5;
pub const DEFAULT_BYPASS_CODES: [&str; 2] = ["TEST123", "DEMO"];

#[derive(Clone, Debug)]
pub struct AccessConfig {
    code_ttl_seconds: i64,
    code_max_uses: Option<i32>,
    supersede_codes: bool,
    session_ttl_seconds: i64,
    allow_bypass: bool,
    bypass_codes: Vec<String>,
    anomaly_detection: bool,
    anomaly_threshold: f64,
}

impl AccessConfig {
    /// Defaults: 7 day codes without a usage cap, 24 hour sessions,
    /// bypass disabled, anomaly detection on with a 0.5 threshold.
    #[must_use]
    pub fn new() -> Self {
        Self {
            code_ttl_seconds: DEFAULT_CODE_TTL_SECONDS,
            code_max_uses: None,
            supersede_codes: false,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            allow_bypass: false,
            bypass_codes: DEFAULT_BYPASS_CODES
                .iter()
                .map(|code| (*code).to_string())
                .collect(),
            anomaly_detection: true,
            anomaly_threshold: DEFAULT_ANOMALY_THRESHOLD,
        }
    }

    #[must_use]
    pub fn with_code_ttl_seconds(mut self, seconds: i64) -> Self {
        self.code_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_code_max_uses(mut self, max_uses: Option<i32>) -> Self {
        self.code_max_uses = max_uses;
        self
    }

    #[must_use]
    pub fn with_supersede_codes(mut self, supersede: bool) -> Self {
        self.supersede_codes = supersede;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    /// Honor bypass codes and local tokens. Never enable in production.
    #[must_use]
    pub fn with_allow_bypass(mut self, allow: bool) -> Self {
        self.allow_bypass = allow;
        self
    }

    #[must_use]
    pub fn with_bypass_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.bypass_codes = codes
            .into_iter()
            .map(|code| normalize_code(code.as_ref()))
            .filter(|code| !code.is_empty())
            .collect();
        self
    }

    #[must_use]
    pub fn with_anomaly_detection(mut self, enabled: bool) -> Self {
        self.anomaly_detection = enabled;
        self
    }

    #[must_use]
    pub fn with_anomaly_threshold(mut self, threshold: f64) -> Self {
        self.anomaly_threshold = threshold;
        self
    }

    /// Clamp values into their usable ranges.
    #[must_use]
    pub fn normalize(self) -> Self {
        let anomaly_threshold = if self.anomaly_threshold.is_finite() {
            self.anomaly_threshold.clamp(0.0, 1.0)
        } else {
            DEFAULT_ANOMALY_THRESHOLD
        };
        Self {
            code_ttl_seconds: self.code_ttl_seconds.clamp(1, MAX_TTL_SECONDS),
            code_max_uses: self.code_max_uses.filter(|max| *max > 0),
            session_ttl_seconds: self.session_ttl_seconds.clamp(1, MAX_TTL_SECONDS),
            anomaly_threshold,
            ..self
        }
    }

    #[must_use]
    pub fn code_ttl(&self) -> Duration {
        Duration::seconds(self.code_ttl_seconds)
    }

    #[must_use]
    pub fn code_max_uses(&self) -> Option<i32> {
        self.code_max_uses
    }

    #[must_use]
    pub fn supersede_codes(&self) -> bool {
        self.supersede_codes
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::seconds(self.session_ttl_seconds)
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn allow_bypass(&self) -> bool {
        self.allow_bypass
    }

    /// True when bypass is enabled and `normalized` is one of the bypass codes.
    #[must_use]
    pub fn is_bypass_code(&self, normalized: &str) -> bool {
        self.allow_bypass && self.bypass_codes.iter().any(|code| code == normalized)
    }

    #[must_use]
    pub fn anomaly_detection(&self) -> bool {
        self.anomaly_detection
    }

    #[must_use]
    pub fn anomaly_threshold(&self) -> f64 {
        self.anomaly_threshold
    }
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Time source for expiry decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_bypass_off() {
        let config = AccessConfig::new();
        assert!(!config.allow_bypass());
        assert!(!config.is_bypass_code("TEST123"));
        assert_eq!(config.code_ttl(), Duration::days(7));
        assert_eq!(config.session_ttl(), Duration::hours(24));
        assert_eq!(config.code_max_uses(), None);
    }

    #[test]
    fn bypass_codes_are_normalized() {
        let config = AccessConfig::new()
            .with_allow_bypass(true)
            .with_bypass_codes([" letmein ", ""]);
        assert!(config.is_bypass_code("LETMEIN"));
        assert!(!config.is_bypass_code("TEST123"));
    }

    #[test]
    fn normalize_clamps_values() {
        let config = AccessConfig::new()
            .with_code_ttl_seconds(-5)
            .with_session_ttl_seconds(0)
            .with_code_max_uses(Some(0))
            .with_anomaly_threshold(f64::NAN)
            .normalize();
        assert_eq!(config.code_ttl(), Duration::seconds(1));
        assert_eq!(config.session_ttl(), Duration::seconds(1));
        assert_eq!(config.code_max_uses(), None);
        assert!((config.anomaly_threshold() - DEFAULT_ANOMALY_THRESHOLD).abs() < f64::EPSILON);

        let config = AccessConfig::new().with_anomaly_threshold(3.0).normalize();
        assert!((config.anomaly_threshold() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn normalize_caps_huge_ttls() {
        let config = AccessConfig::new()
            .with_code_ttl_seconds(i64::MAX)
            .with_session_ttl_seconds(i64::MAX)
            .normalize();
        assert_eq!(config.code_ttl(), Duration::seconds(MAX_TTL_SECONDS));
        assert_eq!(config.session_ttl(), Duration::seconds(MAX_TTL_SECONDS));
        assert_eq!(config.session_ttl_seconds(), MAX_TTL_SECONDS);
    }
}
