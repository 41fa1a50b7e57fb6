//! Demo assistant: classify a free-text command and hand it to an automation webhook.
//!
//! The assistant sits behind the demo session guard. It never stores the user
//! input; only the chosen action and the dispatch outcome go back to the caller.

pub mod openai;
pub mod webhook;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Instant};
use thiserror::Error;
use tracing::{debug, info};
use utoipa::ToSchema;

pub use openai::OpenAiClassifier;
pub use webhook::WebhookDispatcher;

static EMAIL_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());
static PHONE_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^\+?[1-9][0-9]{7,14}$").ok());

pub const UNSUPPORTED_DETAIL: &str = "Action not supported";

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("invalid recipient for {0}")]
    InvalidRecipient(&'static str),
    #[error("intent classifier returned status {0}")]
    Upstream(u16),
    #[error("malformed classifier response: {0}")]
    Malformed(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl AssistantError {
    /// Whether the caller supplied something unusable, as opposed to an upstream fault.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidRecipient(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum AgentAction {
    #[serde(rename = "email.send")]
    EmailSend,
    #[serde(rename = "whatsapp.send")]
    WhatsAppSend,
    #[serde(rename = "message.generate")]
    MessageGenerate,
    #[serde(other, rename = "unsupported")]
    Unsupported,
}

impl AgentAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EmailSend => "email.send",
            Self::WhatsAppSend => "whatsapp.send",
            Self::MessageGenerate => "message.generate",
            Self::Unsupported => "unsupported",
        }
    }
}

/// Structured reading of a user command.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Intent {
    pub action: AgentAction,
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub detail: String,
    pub provider: Option<String>,
}

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Intent, AssistantError>;
}

#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, intent: &Intent) -> Result<DispatchOutcome, AssistantError>;
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct AgentExtras {
    pub provider: Option<String>,
    pub duration_ms: u64,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct AgentReply {
    pub status: String,
    pub action_taken: AgentAction,
    pub detail: String,
    pub trace_id: String,
    pub extras: AgentExtras,
}

fn regex_match(re: &Lazy<Option<Regex>>, value: &str) -> bool {
    re.as_ref().is_some_and(|re| re.is_match(value))
}

/// Check the recipient against the channel of `action`.
///
/// # Errors
/// Returns [`AssistantError::InvalidRecipient`] when the recipient is missing or malformed.
pub fn validate_recipient(action: AgentAction, recipient: Option<&str>) -> Result<(), AssistantError> {
    let recipient = recipient.map(str::trim).unwrap_or_default();
    let valid = match action {
        AgentAction::EmailSend => regex_match(&EMAIL_RE, recipient),
        AgentAction::WhatsAppSend => {
            let digits: String = recipient
                .chars()
                .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
                .collect();
            regex_match(&PHONE_RE, &digits)
        }
        AgentAction::MessageGenerate | AgentAction::Unsupported => true,
    };
    if valid {
        Ok(())
    } else {
        Err(AssistantError::InvalidRecipient(action.as_str()))
    }
}

fn trace_id(session_id: &str) -> String {
    let head = session_id.split('-').next().unwrap_or_default();
    format!("trace-{head}")
}

#[derive(Clone)]
pub struct Assistant {
    classifier: Arc<dyn IntentClassifier>,
    dispatcher: Arc<dyn Dispatcher>,
}

impl Assistant {
    pub fn new(classifier: Arc<dyn IntentClassifier>, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            classifier,
            dispatcher,
        }
    }

    /// Classify `user_input` and route it to the matching action.
    ///
    /// # Errors
    /// Returns an [`AssistantError`] when classification fails, the recipient
    /// is invalid, or the dispatcher cannot queue the action.
    pub async fn handle(
        &self,
        user_input: &str,
        session_id: &str,
    ) -> Result<AgentReply, AssistantError> {
        let started = Instant::now();
        let intent = self.classifier.classify(user_input).await?;
        debug!(action = intent.action.as_str(), "intent classified");

        let outcome = match intent.action {
            AgentAction::EmailSend | AgentAction::WhatsAppSend => {
                validate_recipient(intent.action, intent.recipient.as_deref())?;
                self.dispatcher.dispatch(&intent).await?
            }
            AgentAction::MessageGenerate => DispatchOutcome {
                detail: intent
                    .message
                    .clone()
                    .filter(|message| !message.trim().is_empty())
                    .unwrap_or_else(|| "Message generated".to_string()),
                provider: None,
            },
            AgentAction::Unsupported => DispatchOutcome {
                detail: UNSUPPORTED_DETAIL.to_string(),
                provider: None,
            },
        };

        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            action = intent.action.as_str(),
            duration_ms, "assistant request handled"
        );

        Ok(AgentReply {
            status: "ok".to_string(),
            action_taken: intent.action,
            detail: outcome.detail,
            trace_id: trace_id(session_id),
            extras: AgentExtras {
                provider: outcome.provider,
                duration_ms,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tokio::sync::Mutex;

    struct FixedClassifier(Intent);

    #[async_trait]
    impl IntentClassifier for FixedClassifier {
        async fn classify(&self, _text: &str) -> Result<Intent, AssistantError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct RecordingDispatcher {
        seen: Mutex<Vec<Intent>>,
    }

    #[async_trait]
    impl Dispatcher for RecordingDispatcher {
        async fn dispatch(&self, intent: &Intent) -> Result<DispatchOutcome, AssistantError> {
            self.seen.lock().await.push(intent.clone());
            Ok(DispatchOutcome {
                detail: "queued".to_string(),
                provider: Some("test".to_string()),
            })
        }
    }

    fn assistant(intent: Intent) -> (Assistant, Arc<RecordingDispatcher>) {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let assistant = Assistant::new(
            Arc::new(FixedClassifier(intent)),
            Arc::clone(&dispatcher) as Arc<dyn Dispatcher>,
        );
        (assistant, dispatcher)
    }

    #[test]
    fn unknown_actions_deserialize_as_unsupported() -> Result<()> {
        let intent: Intent = serde_json::from_str(r#"{"action":"calendar.book"}"#)?;
        assert_eq!(intent.action, AgentAction::Unsupported);
        let intent: Intent =
            serde_json::from_str(r#"{"action":"email.send","recipient":"a@example.com"}"#)?;
        assert_eq!(intent.action, AgentAction::EmailSend);
        assert_eq!(intent.message, None);
        Ok(())
    }

    #[test]
    fn recipients_are_checked_per_channel() {
        assert!(validate_recipient(AgentAction::EmailSend, Some("a@example.com")).is_ok());
        assert!(validate_recipient(AgentAction::EmailSend, Some("not-an-email")).is_err());
        assert!(validate_recipient(AgentAction::EmailSend, None).is_err());
        assert!(validate_recipient(AgentAction::WhatsAppSend, Some("+34 600-123-456")).is_ok());
        assert!(validate_recipient(AgentAction::WhatsAppSend, Some("call me")).is_err());
        assert!(validate_recipient(AgentAction::MessageGenerate, None).is_ok());
    }

    #[test]
    fn trace_id_uses_first_session_segment() {
        assert_eq!(trace_id("abc-def-ghi"), "trace-abc");
        assert_eq!(trace_id("plain"), "trace-plain");
    }

    #[tokio::test]
    async fn email_intent_is_dispatched() -> Result<()> {
        let (assistant, dispatcher) = assistant(Intent {
            action: AgentAction::EmailSend,
            recipient: Some("ana@example.com".to_string()),
            message: Some("hello".to_string()),
        });
        let reply = assistant.handle("email ana", "s1-x").await?;
        assert_eq!(reply.action_taken, AgentAction::EmailSend);
        assert_eq!(reply.detail, "queued");
        assert_eq!(reply.extras.provider.as_deref(), Some("test"));
        assert_eq!(reply.trace_id, "trace-s1");
        assert_eq!(dispatcher.seen.lock().await.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn invalid_recipient_is_not_dispatched() {
        let (assistant, dispatcher) = assistant(Intent {
            action: AgentAction::WhatsAppSend,
            recipient: Some("nobody".to_string()),
            message: None,
        });
        let result = assistant.handle("whatsapp nobody", "s1").await;
        assert!(matches!(result, Err(AssistantError::InvalidRecipient(_))));
        assert!(dispatcher.seen.lock().await.is_empty());
    }

    #[tokio::test]
    async fn unsupported_action_reports_detail() -> Result<()> {
        let (assistant, dispatcher) = assistant(Intent {
            action: AgentAction::Unsupported,
            recipient: None,
            message: None,
        });
        let reply = assistant.handle("book a flight", "s1").await?;
        assert_eq!(reply.detail, UNSUPPORTED_DETAIL);
        assert_eq!(reply.extras.provider, None);
        assert!(dispatcher.seen.lock().await.is_empty());
        Ok(())
    }
}
