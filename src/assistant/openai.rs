use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error, instrument};

use super::{AssistantError, Intent, IntentClassifier};
use crate::APP_USER_AGENT;

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";

const SYSTEM_PROMPT: &str = "You are an AI agent that analyzes user commands and returns JSON.
Possible actions: email.send, whatsapp.send, message.generate
Extract: action, recipient, message content.
Return only JSON: {\"action\": \"email.send\", \"recipient\": \"email@example.com\", \"message\": \"content\"}";

#[derive(Deserialize)]
struct Completion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Parse the model output, tolerating a surrounding Markdown code fence.
fn parse_intent(content: &str) -> Result<Intent, AssistantError> {
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();
    serde_json::from_str(body).map_err(|err| AssistantError::Malformed(err.to_string()))
}

/// Chat-completions backed classifier.
pub struct OpenAiClassifier {
    client: Client,
    url: String,
    model: String,
    api_key: SecretString,
}

impl OpenAiClassifier {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_key: SecretString, model: String, url: String) -> Result<Self, AssistantError> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            url,
            model,
            api_key,
        })
    }
}

#[async_trait]
impl IntentClassifier for OpenAiClassifier {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn classify(&self, text: &str) -> Result<Intent, AssistantError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": text },
            ],
            "temperature": 0.3,
        });

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            error!("Intent classifier request failed: {}", status);
            return Err(AssistantError::Upstream(status.as_u16()));
        }

        let completion: Completion = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AssistantError::Malformed("no completion choices".to_string()))?;
        debug!("classifier returned {} bytes", content.len());

        parse_intent(&content)
    }
}
