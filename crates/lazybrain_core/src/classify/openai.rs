//! OpenAI-backed classifier implementation.
//!
//! # Responsibility
//! - Drive the chat-completions endpoint with the capture and intent
//!   prompts.
//! - Keep every round-trip inside the configured timeout.
//!
//! # Invariants
//! - Transport failures and unparseable replies map to `ClassifyError`;
//!   this module never panics on service output.

use super::{Classification, Classifier, ClassifyError, Intent};
use log::warn;
use serde_json::Value;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

const CLASSIFY_SYSTEM_PROMPT: &str = r#"You classify one raw captured note into exactly one bucket.

BUCKETS:
- task: simple errand, one-off task, bills, appointments, life admin
- project: multi-step work, ongoing effort, goals with deadlines
- contact: a person, relationship update, follow-up reminder
- idea: a thought, insight, concept to explore later

Estimate confidence in [0,1]. If confidence is below 0.6, set category to "needs_review".
Generate a concise descriptive title. Extract dates as YYYY-MM-DD; when a date
has no year, use the nearest future occurrence. "next_action" for projects must
be specific and executable.

Return ONLY valid JSON:
{"category": "...", "confidence": 0.0, "title": "...", "summary": "...",
 "next_action": "... or null", "due_date": "YYYY-MM-DD or null",
 "follow_up": "... or null", "follow_up_date": "YYYY-MM-DD or null"}"#;

const INTENT_SYSTEM_PROMPT: &str = r#"Decide whether this message mutates an EXISTING item instead of capturing a new one.

- "I called Rachel" -> completion of a task like "Call Rachel"
- "Take X off my list" / "Remove X from projects" -> deletion
- "Pause the patio project" / "Move X back to active" -> status_change
- "I need to call Rachel tomorrow" -> none (a new capture)

Buckets: task, project, contact, idea. Statuses: active, paused, someday.

Return ONLY valid JSON:
{"intent": "completion|deletion|status_change|none", "target": "... or null",
 "new_status": "... or null", "bucket": "... or null"}"#;

/// Connection settings for the external classification service.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl OpenAiConfig {
    /// Builds a config from `OPENAI_API_KEY` plus defaults.
    ///
    /// # Errors
    /// - Missing or empty `OPENAI_API_KEY`.
    pub fn from_env(timeout: Duration) -> Result<Self, String> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| "OPENAI_API_KEY is not set".to_string())?;
        Ok(Self {
            api_key,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout,
        })
    }
}

/// Blocking OpenAI chat-completions client.
pub struct OpenAiClassifier {
    config: OpenAiConfig,
    agent: ureq::Agent,
}

impl OpenAiClassifier {
    pub fn new(config: OpenAiConfig) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Self { config, agent }
    }

    /// One prompt round-trip returning the model's JSON content.
    fn request_json(
        &self,
        system_prompt: &str,
        text: &str,
        temperature: f64,
    ) -> Result<Value, ClassifyError> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": text},
            ],
            "temperature": temperature,
            "max_tokens": 500,
        });

        let response = self
            .agent
            .post(&url)
            .set("Authorization", &format!("Bearer {}", self.config.api_key))
            .set("Content-Type", "application/json")
            .send_json(body)
            .map_err(|err| ClassifyError::Unavailable {
                message: err.to_string(),
            })?;

        let envelope: Value =
            response
                .into_json()
                .map_err(|err| ClassifyError::Unavailable {
                    message: format!("response body unreadable: {err}"),
                })?;

        let content = envelope
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| ClassifyError::InvalidPayload {
                message: "reply carries no message content".to_string(),
            })?;

        serde_json::from_str(content.trim()).map_err(|err| {
            warn!("event=classify_parse module=classify status=error error={err}");
            ClassifyError::InvalidPayload {
                message: format!("content is not valid JSON: {err}"),
            }
        })
    }
}

impl Classifier for OpenAiClassifier {
    fn classify(&self, text: &str) -> Result<Classification, ClassifyError> {
        let payload = self.request_json(CLASSIFY_SYSTEM_PROMPT, text, 0.3)?;
        Classification::from_json(&payload)
    }

    fn detect_intent(&self, text: &str) -> Result<Intent, ClassifyError> {
        let payload = self.request_json(INTENT_SYSTEM_PROMPT, text, 0.1)?;
        Ok(Intent::from_json(&payload))
    }
}
