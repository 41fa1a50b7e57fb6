//! Access-code, session, and anomaly options.

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::access::{
    config::{
        DEFAULT_ANOMALY_THRESHOLD, DEFAULT_BYPASS_CODES, DEFAULT_CODE_TTL_SECONDS,
        DEFAULT_SESSION_TTL_SECONDS, MAX_TTL_SECONDS,
    },
    AccessConfig,
};

pub const ARG_CODE_TTL_SECONDS: &str = "code-ttl-seconds";
pub const ARG_CODE_MAX_USES: &str = "code-max-uses";
pub const ARG_SUPERSEDE_CODES: &str = "supersede-codes";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_ALLOW_BYPASS: &str = "allow-bypass";
pub const ARG_BYPASS_CODES: &str = "bypass-codes";
pub const ARG_ANOMALY_THRESHOLD: &str = "anomaly-threshold";
pub const ARG_DISABLE_ANOMALY_DETECTION: &str = "disable-anomaly-detection";

#[derive(Debug)]
pub struct Options {
    pub code_ttl_seconds: i64,
    pub code_max_uses: Option<i32>,
    pub supersede_codes: bool,
    pub session_ttl_seconds: i64,
    pub allow_bypass: bool,
    pub bypass_codes: Vec<String>,
    pub anomaly_threshold: f64,
    pub anomaly_detection: bool,
}

impl Options {
    /// Parse access arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a TTL falls outside `1..=MAX_TTL_SECONDS`.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let code_ttl_seconds = ttl_seconds(matches, ARG_CODE_TTL_SECONDS, DEFAULT_CODE_TTL_SECONDS)?;
        let session_ttl_seconds =
            ttl_seconds(matches, ARG_SESSION_TTL_SECONDS, DEFAULT_SESSION_TTL_SECONDS)?;

        let bypass_codes = matches
            .get_many::<String>(ARG_BYPASS_CODES)
            .map(|codes| {
                codes
                    .map(|code| code.trim().to_string())
                    .filter(|code| !code.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| DEFAULT_BYPASS_CODES.iter().map(ToString::to_string).collect());

        Ok(Self {
            code_ttl_seconds,
            code_max_uses: matches.get_one::<i32>(ARG_CODE_MAX_USES).copied(),
            supersede_codes: matches.get_flag(ARG_SUPERSEDE_CODES),
            session_ttl_seconds,
            allow_bypass: matches.get_flag(ARG_ALLOW_BYPASS),
            bypass_codes,
            anomaly_threshold: matches
                .get_one::<f64>(ARG_ANOMALY_THRESHOLD)
                .copied()
                .unwrap_or(DEFAULT_ANOMALY_THRESHOLD),
            anomaly_detection: !matches.get_flag(ARG_DISABLE_ANOMALY_DETECTION),
        })
    }

    #[must_use]
    pub fn into_config(self) -> AccessConfig {
        AccessConfig::new()
            .with_code_ttl_seconds(self.code_ttl_seconds)
            .with_code_max_uses(self.code_max_uses)
            .with_supersede_codes(self.supersede_codes)
            .with_session_ttl_seconds(self.session_ttl_seconds)
            .with_allow_bypass(self.allow_bypass)
            .with_bypass_codes(self.bypass_codes)
            .with_anomaly_threshold(self.anomaly_threshold)
            .with_anomaly_detection(self.anomaly_detection)
    }
}

fn ttl_seconds(matches: &ArgMatches, arg: &str, default: i64) -> Result<i64> {
    let seconds = matches.get_one::<i64>(arg).copied().unwrap_or(default);
    if !(1..=MAX_TTL_SECONDS).contains(&seconds) {
        anyhow::bail!("--{arg} must be between 1 and {MAX_TTL_SECONDS}");
    }
    Ok(seconds)
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_CODE_TTL_SECONDS)
                .long(ARG_CODE_TTL_SECONDS)
                .help("Lifetime of generated access codes in seconds")
                .env("DEMOGATE_CODE_TTL_SECONDS")
                .default_value("604800")
                .global(true)
                .value_parser(clap::value_parser!(i64).range(1..=MAX_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_CODE_MAX_USES)
                .long(ARG_CODE_MAX_USES)
                .help("Maximum redemptions per generated code (unlimited when unset)")
                .env("DEMOGATE_CODE_MAX_USES")
                .global(true)
                .value_parser(clap::value_parser!(i32).range(1..)),
        )
        .arg(
            Arg::new(ARG_SUPERSEDE_CODES)
                .long(ARG_SUPERSEDE_CODES)
                .help("Deactivate older codes whenever a new one is generated")
                .env("DEMOGATE_SUPERSEDE_CODES")
                .global(true)
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Demo session lifetime in seconds")
                .env("DEMOGATE_SESSION_TTL_SECONDS")
                .default_value("86400")
                .global(true)
                .value_parser(clap::value_parser!(i64).range(1..=MAX_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_ALLOW_BYPASS)
                .long(ARG_ALLOW_BYPASS)
                .help("Honor bypass codes and local demo/test tokens (never enable in production)")
                .env("DEMOGATE_ALLOW_BYPASS")
                .global(true)
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_BYPASS_CODES)
                .long(ARG_BYPASS_CODES)
                .help("Comma separated bypass codes, only used with --allow-bypass")
                .env("DEMOGATE_BYPASS_CODES")
                .default_value("TEST123,DEMO")
                .value_delimiter(',')
                .global(true),
        )
        .arg(
            Arg::new(ARG_ANOMALY_THRESHOLD)
                .long(ARG_ANOMALY_THRESHOLD)
                .help("Minimum confidence (0.0-1.0) before a session anomaly is recorded")
                .env("DEMOGATE_ANOMALY_THRESHOLD")
                .default_value("0.5")
                .global(true)
                .value_parser(clap::value_parser!(f64)),
        )
        .arg(
            Arg::new(ARG_DISABLE_ANOMALY_DETECTION)
                .long(ARG_DISABLE_ANOMALY_DETECTION)
                .help("Skip anomaly scoring during session verification")
                .env("DEMOGATE_DISABLE_ANOMALY_DETECTION")
                .global(true)
                .action(ArgAction::SetTrue),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn parse(args: &[&str]) -> Result<Options> {
        let command = with_args(Command::new("demogate"));
        let matches = command.try_get_matches_from(args)?;
        Options::parse(&matches)
    }

    #[test]
    fn defaults_keep_bypass_off() -> Result<()> {
        let options = temp_env::with_vars(
            [
                ("DEMOGATE_ALLOW_BYPASS", None::<&str>),
                ("DEMOGATE_BYPASS_CODES", None),
                ("DEMOGATE_CODE_TTL_SECONDS", None),
                ("DEMOGATE_SESSION_TTL_SECONDS", None),
            ],
            || parse(&["demogate"]),
        )?;
        assert!(!options.allow_bypass);
        assert_eq!(options.code_ttl_seconds, 604_800);
        assert_eq!(options.session_ttl_seconds, 86_400);
        assert_eq!(options.bypass_codes, vec!["TEST123", "DEMO"]);
        assert!(options.anomaly_detection);
        Ok(())
    }

    #[test]
    fn env_configures_codes() -> Result<()> {
        let options = temp_env::with_vars(
            [
                ("DEMOGATE_CODE_MAX_USES", Some("5")),
                ("DEMOGATE_BYPASS_CODES", Some("QA1, QA2")),
                ("DEMOGATE_ANOMALY_THRESHOLD", Some("0.75")),
            ],
            || parse(&["demogate", "--allow-bypass", "--supersede-codes"]),
        )?;
        assert_eq!(options.code_max_uses, Some(5));
        assert_eq!(options.bypass_codes, vec!["QA1", "QA2"]);
        assert!(options.allow_bypass);
        assert!(options.supersede_codes);
        assert!((options.anomaly_threshold - 0.75).abs() < f64::EPSILON);

        let config = options.into_config();
        assert!(config.is_bypass_code("QA1"));
        assert!(config.supersede_codes());
        Ok(())
    }

    #[test]
    fn non_positive_ttl_is_rejected() {
        let result = temp_env::with_vars([("DEMOGATE_CODE_TTL_SECONDS", None::<&str>)], || {
            parse(&["demogate", "--session-ttl-seconds", "0"])
        });
        assert!(result.is_err());
    }

    #[test]
    fn oversized_ttl_is_rejected() {
        let result = temp_env::with_vars([("DEMOGATE_SESSION_TTL_SECONDS", None::<&str>)], || {
            parse(&["demogate", "--session-ttl-seconds", "9223372036854775807"])
        });
        assert!(result.is_err());

        let result = temp_env::with_vars(
            [("DEMOGATE_CODE_TTL_SECONDS", Some("315360001"))],
            || parse(&["demogate"]),
        );
        assert!(result.is_err());

        let options = temp_env::with_vars(
            [("DEMOGATE_CODE_TTL_SECONDS", Some("315360000"))],
            || parse(&["demogate"]),
        );
        assert!(options.is_ok_and(|options| options.code_ttl_seconds == MAX_TTL_SECONDS));
    }

    #[test]
    fn zero_max_uses_is_rejected() {
        let result = temp_env::with_vars([("DEMOGATE_CODE_MAX_USES", None::<&str>)], || {
            parse(&["demogate", "--code-max-uses", "0"])
        });
        assert!(result.is_err());
    }
}
