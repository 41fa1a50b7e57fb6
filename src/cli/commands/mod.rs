pub mod access;
pub mod assistant;
pub mod logging;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ArgAction, ColorChoice, Command,
};

use crate::access::config::MAX_TTL_SECONDS;
use crate::api::handlers::state::DEFAULT_FRONTEND_BASE_URL;

pub const ARG_PORT: &str = "port";
pub const ARG_DSN: &str = "dsn";
pub const ARG_DB_PASSWORD: &str = "db-password";
pub const ARG_IN_MEMORY: &str = "in-memory";
pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_ADMIN_TOKEN: &str = "admin-token";

pub const CMD_ROTATE: &str = "rotate";
pub const CMD_STATIC_TOKEN: &str = "static-token";
pub const CMD_CREATE_CODE: &str = "create-code";

pub const ARG_DESCRIPTION: &str = "description";
pub const ARG_EXPIRES_HOURS: &str = "expires-hours";
pub const ARG_MAX_USES: &str = "max-uses";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("demogate")
        .about("Access-code gated demo sessions")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand(
            Command::new(CMD_ROTATE)
                .about("Generate a new access code, purge expired sessions, and print a JSON summary"),
        )
        .subcommand(
            Command::new(CMD_CREATE_CODE)
                .about("Create a one-off access code with its own lifetime and cap, printed as JSON")
                .arg(
                    Arg::new(ARG_DESCRIPTION)
                        .long(ARG_DESCRIPTION)
                        .help("Note stored with the code, e.g. who it was issued to"),
                )
                .arg(
                    Arg::new(ARG_EXPIRES_HOURS)
                        .long(ARG_EXPIRES_HOURS)
                        .help("Lifetime of the code in hours")
                        .default_value("24")
                        .value_parser(
                            clap::value_parser!(i64).range(1..=MAX_TTL_SECONDS / 3600),
                        ),
                )
                .arg(
                    Arg::new(ARG_MAX_USES)
                        .long(ARG_MAX_USES)
                        .help("Maximum redemptions of the code")
                        .default_value("1")
                        .value_parser(clap::value_parser!(i32).range(1..)),
                ),
        )
        .subcommand(
            Command::new(CMD_STATIC_TOKEN)
                .about("Mint a local demo token (accepted only with --allow-bypass)"),
        )
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8080")
                .env("DEMOGATE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long(ARG_DSN)
                .help("Database connection string")
                .long_help(
                    "Postgres connection string. When --db-password is given it replaces the password in the DSN.",
                )
                .env("DEMOGATE_DSN")
                .global(true),
        )
        .arg(
            Arg::new(ARG_DB_PASSWORD)
                .long(ARG_DB_PASSWORD)
                .help("Database password injected into the DSN")
                .env("DEMOGATE_DB_PASSWORD")
                .hide_env_values(true)
                .global(true),
        )
        .arg(
            Arg::new(ARG_IN_MEMORY)
                .long(ARG_IN_MEMORY)
                .help("Keep codes and sessions in process memory (development only)")
                .env("DEMOGATE_IN_MEMORY")
                .conflicts_with(ARG_DSN)
                .global(true)
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend base URL, used for CORS and the session cookie Secure flag")
                .env("DEMOGATE_FRONTEND_BASE_URL")
                .default_value(DEFAULT_FRONTEND_BASE_URL),
        )
        .arg(
            Arg::new(ARG_ADMIN_TOKEN)
                .long(ARG_ADMIN_TOKEN)
                .help("Bearer token for the admin routes; they answer 404 when unset")
                .env("DEMOGATE_ADMIN_TOKEN")
                .hide_env_values(true),
        );

    let command = access::with_args(command);
    let command = assistant::with_args(command);
    logging::with_args(command)
}
