//! Automation webhooks for outbound email and `WhatsApp` messages.
//!
//! Delivery is fire-and-forget: the request is spawned and its failure only
//! logged, so the caller gets a "queued" answer as soon as the payload is built.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn, Instrument};

use super::{AgentAction, AssistantError, DispatchOutcome, Dispatcher, Intent};
use crate::APP_USER_AGENT;

const EMAIL_SUBJECT: &str = "Message from the demo assistant";
const EMAIL_PROVIDER: &str = "mailtrap";
const WHATSAPP_PROVIDER: &str = "twilio";

#[derive(Clone)]
pub struct WebhookDispatcher {
    client: Client,
    email_url: Option<String>,
    whatsapp_url: Option<String>,
}

impl WebhookDispatcher {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        email_url: Option<String>,
        whatsapp_url: Option<String>,
    ) -> Result<Self, AssistantError> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            email_url,
            whatsapp_url,
        })
    }

    fn target(&self, intent: &Intent) -> Result<(String, Value, DispatchOutcome), AssistantError> {
        let recipient = intent.recipient.clone().unwrap_or_default();
        match intent.action {
            AgentAction::EmailSend => {
                let url = self
                    .email_url
                    .clone()
                    .ok_or(AssistantError::NotConfigured("email webhook"))?;
                let payload = json!({
                    "to": recipient,
                    "subject": EMAIL_SUBJECT,
                    "body": intent.message.clone().unwrap_or_else(|| "Email triggered by the demo assistant".to_string()),
                });
                let outcome = DispatchOutcome {
                    detail: "Email queued via automation webhook".to_string(),
                    provider: Some(EMAIL_PROVIDER.to_string()),
                };
                Ok((url, payload, outcome))
            }
            AgentAction::WhatsAppSend => {
                let url = self
                    .whatsapp_url
                    .clone()
                    .ok_or(AssistantError::NotConfigured("whatsapp webhook"))?;
                let payload = json!({
                    "to": recipient,
                    "message": intent.message.clone().unwrap_or_default(),
                });
                let outcome = DispatchOutcome {
                    detail: "WhatsApp message queued via automation webhook".to_string(),
                    provider: Some(WHATSAPP_PROVIDER.to_string()),
                };
                Ok((url, payload, outcome))
            }
            AgentAction::MessageGenerate | AgentAction::Unsupported => {
                Err(AssistantError::NotConfigured("webhook for this action"))
            }
        }
    }
}

#[async_trait]
impl Dispatcher for WebhookDispatcher {
    async fn dispatch(&self, intent: &Intent) -> Result<DispatchOutcome, AssistantError> {
        let (url, payload, outcome) = self.target(intent)?;
        let client = self.client.clone();
        let action = intent.action.as_str();
        let span = tracing::info_span!("webhook.dispatch", action);

        tokio::spawn(
            async move {
                match client.post(&url).json(&payload).send().await {
                    Ok(response) if response.status().is_success() => {
                        debug!("webhook accepted: {}", response.status());
                    }
                    Ok(response) => warn!("webhook rejected: {}", response.status()),
                    Err(err) => warn!("webhook delivery failed: {err}"),
                }
            }
            .instrument(span),
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn intent(action: AgentAction) -> Intent {
        Intent {
            action,
            recipient: Some("ana@example.com".to_string()),
            message: Some("hello".to_string()),
        }
    }

    #[test]
    fn missing_webhook_is_reported() -> Result<()> {
        let dispatcher = WebhookDispatcher::new(None, None)?;
        assert!(matches!(
            dispatcher.target(&intent(AgentAction::EmailSend)),
            Err(AssistantError::NotConfigured("email webhook"))
        ));
        assert!(matches!(
            dispatcher.target(&intent(AgentAction::WhatsAppSend)),
            Err(AssistantError::NotConfigured("whatsapp webhook"))
        ));
        Ok(())
    }

    #[test]
    fn email_payload_carries_recipient_and_body() -> Result<()> {
        let dispatcher =
            WebhookDispatcher::new(Some("https://hooks.example.com/email".to_string()), None)?;
        let (url, payload, outcome) = dispatcher.target(&intent(AgentAction::EmailSend))?;
        assert_eq!(url, "https://hooks.example.com/email");
        assert_eq!(payload["to"], "ana@example.com");
        assert_eq!(payload["body"], "hello");
        assert_eq!(outcome.provider.as_deref(), Some(EMAIL_PROVIDER));
        Ok(())
    }
}
