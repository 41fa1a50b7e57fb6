use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::assistant::openai::{DEFAULT_OPENAI_MODEL, DEFAULT_OPENAI_URL};

pub const ARG_OPENAI_API_KEY: &str = "openai-api-key";
pub const ARG_OPENAI_MODEL: &str = "openai-model";
pub const ARG_OPENAI_URL: &str = "openai-url";
pub const ARG_EMAIL_WEBHOOK_URL: &str = "email-webhook-url";
pub const ARG_WHATSAPP_WEBHOOK_URL: &str = "whatsapp-webhook-url";

#[derive(Debug)]
pub struct Options {
    pub openai_api_key: Option<SecretString>,
    pub openai_model: String,
    pub openai_url: String,
    pub email_webhook_url: Option<String>,
    pub whatsapp_webhook_url: Option<String>,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        // clap passes empty env values through; treat them as unset
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        Self {
            openai_api_key: get_non_empty(ARG_OPENAI_API_KEY).map(SecretString::from),
            openai_model: get_non_empty(ARG_OPENAI_MODEL)
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            openai_url: get_non_empty(ARG_OPENAI_URL)
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            email_webhook_url: get_non_empty(ARG_EMAIL_WEBHOOK_URL),
            whatsapp_webhook_url: get_non_empty(ARG_WHATSAPP_WEBHOOK_URL),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_OPENAI_API_KEY)
                .long(ARG_OPENAI_API_KEY)
                .help("API key for the intent classifier; the assistant route is disabled without it")
                .env("DEMOGATE_OPENAI_API_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_OPENAI_MODEL)
                .long(ARG_OPENAI_MODEL)
                .help("Chat model used for intent classification")
                .env("DEMOGATE_OPENAI_MODEL")
                .default_value(DEFAULT_OPENAI_MODEL),
        )
        .arg(
            Arg::new(ARG_OPENAI_URL)
                .long(ARG_OPENAI_URL)
                .help("Chat completions endpoint")
                .env("DEMOGATE_OPENAI_URL")
                .default_value(DEFAULT_OPENAI_URL),
        )
        .arg(
            Arg::new(ARG_EMAIL_WEBHOOK_URL)
                .long(ARG_EMAIL_WEBHOOK_URL)
                .help("Automation webhook that sends email")
                .env("DEMOGATE_EMAIL_WEBHOOK_URL"),
        )
        .arg(
            Arg::new(ARG_WHATSAPP_WEBHOOK_URL)
                .long(ARG_WHATSAPP_WEBHOOK_URL)
                .help("Automation webhook that sends WhatsApp messages")
                .env("DEMOGATE_WHATSAPP_WEBHOOK_URL"),
        )
}
