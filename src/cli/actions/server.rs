use anyhow::{Context, Result};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{info, warn};

use super::store::StoreTarget;
use crate::{
    access::{AccessConfig, DemoAccess},
    api::{self, ApiState},
    assistant::{Assistant, OpenAiClassifier, WebhookDispatcher},
    cli::commands::assistant::Options as AssistantOptions,
};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub store: StoreTarget,
    pub access: AccessConfig,
    pub frontend_base_url: String,
    pub admin_token: Option<SecretString>,
    pub assistant: AssistantOptions,
}

fn build_assistant(options: AssistantOptions) -> Result<Option<Assistant>> {
    let Some(api_key) = options.openai_api_key else {
        info!("no classifier API key configured; assistant route disabled");
        return Ok(None);
    };
    let classifier = OpenAiClassifier::new(api_key, options.openai_model, options.openai_url)
        .context("Failed to build intent classifier")?;
    let dispatcher =
        WebhookDispatcher::new(options.email_webhook_url, options.whatsapp_webhook_url)
            .context("Failed to build webhook dispatcher")?;
    Ok(Some(Assistant::new(
        Arc::new(classifier),
        Arc::new(dispatcher),
    )))
}

/// Execute the server action.
/// # Errors
/// Returns an error if the store cannot be opened or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    if args.access.allow_bypass() {
        warn!("bypass codes and local tokens are enabled; do not run this in production");
    }

    let store = args.store.open().await?;
    let access = Arc::new(DemoAccess::new(store, args.access));

    let mut state = ApiState::new(access, args.frontend_base_url);
    if let Some(token) = &args.admin_token {
        state = state.with_admin_token(token);
    }
    if let Some(assistant) = build_assistant(args.assistant)? {
        state = state.with_assistant(assistant);
    }

    api::new(args.port, Arc::new(state)).await
}
