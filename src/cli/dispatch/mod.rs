//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to an [`Action`]: the HTTP server by default, or
//! one of the `rotate`, `create-code`, and `static-token` subcommands.

use anyhow::{Context, Result};
use clap::ArgMatches;
use secrecy::SecretString;

use crate::access::generator::{DEFAULT_ONE_OFF_HOURS, DEFAULT_ONE_OFF_MAX_USES};
use crate::cli::actions::{create, rotate, server, store::StoreTarget, token, Action};
use crate::cli::commands::{
    access, assistant, ARG_ADMIN_TOKEN, ARG_DB_PASSWORD, ARG_DESCRIPTION, ARG_DSN,
    ARG_EXPIRES_HOURS, ARG_FRONTEND_BASE_URL, ARG_IN_MEMORY, ARG_MAX_USES, ARG_PORT,
    CMD_CREATE_CODE, CMD_ROTATE, CMD_STATIC_TOKEN,
};

fn store_target(matches: &ArgMatches) -> Result<StoreTarget> {
    if matches.get_flag(ARG_IN_MEMORY) {
        return Ok(StoreTarget::Memory);
    }
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .filter(|dsn| !dsn.trim().is_empty())
        .context("missing required argument: --dsn (or --in-memory)")?;
    let password = matches
        .get_one::<String>(ARG_DB_PASSWORD)
        .filter(|password| !password.is_empty())
        .map(|password| SecretString::from(password.clone()));
    Ok(StoreTarget::Postgres { dsn, password })
}

/// Map validated CLI matches to an action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    match matches.subcommand() {
        Some((CMD_ROTATE, sub)) => Ok(Action::Rotate(rotate::Args {
            store: store_target(sub)?,
            access: access::Options::parse(sub)?.into_config(),
        })),
        Some((CMD_CREATE_CODE, sub)) => Ok(Action::CreateCode(create::Args {
            store: store_target(sub)?,
            access: access::Options::parse(sub)?.into_config(),
            description: sub
                .get_one::<String>(ARG_DESCRIPTION)
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty()),
            expires_hours: sub
                .get_one::<i64>(ARG_EXPIRES_HOURS)
                .copied()
                .unwrap_or(DEFAULT_ONE_OFF_HOURS),
            max_uses: sub
                .get_one::<i32>(ARG_MAX_USES)
                .copied()
                .unwrap_or(DEFAULT_ONE_OFF_MAX_USES),
        })),
        Some((CMD_STATIC_TOKEN, sub)) => Ok(Action::StaticToken(token::Args {
            access: access::Options::parse(sub)?.into_config(),
        })),
        _ => {
            let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
            let frontend_base_url = matches
                .get_one::<String>(ARG_FRONTEND_BASE_URL)
                .cloned()
                .context("missing required argument: --frontend-base-url")?;
            let admin_token = matches
                .get_one::<String>(ARG_ADMIN_TOKEN)
                .filter(|token| !token.trim().is_empty())
                .map(|token| SecretString::from(token.clone()));

            Ok(Action::Server(server::Args {
                port,
                store: store_target(matches)?,
                access: access::Options::parse(matches)?.into_config(),
                frontend_base_url,
                admin_token,
                assistant: assistant::Options::parse(matches),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;

    const CLEARED: [(&str, Option<&str>); 4] = [
        ("DEMOGATE_DSN", None),
        ("DEMOGATE_IN_MEMORY", None),
        ("DEMOGATE_ADMIN_TOKEN", None),
        ("DEMOGATE_ALLOW_BYPASS", None),
    ];

    #[test]
    fn dsn_required_without_in_memory() {
        temp_env::with_vars(CLEARED, || {
            let matches = commands::new().get_matches_from(vec!["demogate"]);
            let result = handler(&matches);
            assert!(result.is_err());
            if let Err(err) = result {
                assert!(err.to_string().contains("missing required argument: --dsn"));
            }
        });
    }

    #[test]
    fn server_action_defaults() {
        temp_env::with_vars(CLEARED, || {
            let matches = commands::new().get_matches_from(vec!["demogate", "--in-memory"]);
            let action = handler(&matches);
            assert!(matches!(
                action,
                Ok(Action::Server(server::Args {
                    port: 8080,
                    store: StoreTarget::Memory,
                    admin_token: None,
                    ..
                }))
            ));
        });
    }

    #[test]
    fn rotate_uses_postgres_with_password() {
        temp_env::with_vars(CLEARED, || {
            let matches = commands::new().get_matches_from(vec![
                "demogate",
                "rotate",
                "--dsn",
                "postgres://demogate@localhost/demogate",
                "--db-password",
                "pw",
                "--supersede-codes",
            ]);
            match handler(&matches) {
                Ok(Action::Rotate(args)) => {
                    assert!(matches!(
                        args.store,
                        StoreTarget::Postgres { password: Some(_), .. }
                    ));
                    assert!(args.access.supersede_codes());
                }
                other => panic!("unexpected action: {other:?}"),
            }
        });
    }

    #[test]
    fn create_code_takes_ttl_cap_and_description() {
        temp_env::with_vars(CLEARED, || {
            let matches = commands::new().get_matches_from(vec![
                "demogate",
                "create-code",
                "--in-memory",
                "--description",
                " partner preview ",
                "--expires-hours",
                "1",
            ]);
            match handler(&matches) {
                Ok(Action::CreateCode(args)) => {
                    assert!(matches!(args.store, StoreTarget::Memory));
                    assert_eq!(args.description.as_deref(), Some("partner preview"));
                    assert_eq!(args.expires_hours, 1);
                    assert_eq!(args.max_uses, 1);
                }
                other => panic!("unexpected action: {other:?}"),
            }
        });
    }

    #[test]
    fn static_token_needs_no_store() {
        temp_env::with_vars(CLEARED, || {
            let matches = commands::new().get_matches_from(vec!["demogate", "static-token"]);
            assert!(matches!(handler(&matches), Ok(Action::StaticToken(_))));
        });
    }
}
