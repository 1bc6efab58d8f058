//! Escalation over an OpenAI-compatible chat-completions endpoint.

use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::EscalationError;
use crate::models::EscalationConfig;

use super::{Escalation, EscalationResponse, INSTRUCTION, PartialFields, response_schema};

const INITIAL_BACKOFF_MS: u64 = 750;
const MAX_BACKOFF_MS: u64 = 5000;

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}

/// JSON-schema constrained extraction through chat completions.
pub struct OpenAiEscalation {
    client: Client,
    endpoint: String,
    model: String,
    api_key_env: String,
    api_key: OnceLock<String>,
    max_attempts: usize,
}

impl OpenAiEscalation {
    /// Build the HTTP client. The credential is read at the first call.
    pub fn new(config: &EscalationConfig) -> Result<Self, EscalationError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs.min(15)))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EscalationError::Network(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key_env: config.api_key_env.clone(),
            api_key: OnceLock::new(),
            max_attempts: config.max_attempts.max(1),
        })
    }

    fn api_key(&self) -> Result<&str, EscalationError> {
        if let Some(key) = self.api_key.get() {
            return Ok(key.as_str());
        }

        let key = std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| EscalationError::MissingCredential(self.api_key_env.clone()))?;

        Ok(self.api_key.get_or_init(|| key).as_str())
    }

    fn request_body(&self, excerpt: &str) -> serde_json::Value {
        json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": INSTRUCTION },
                { "role": "user", "content": excerpt }
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "invoice_fields",
                    "strict": true,
                    "schema": response_schema()
                }
            }
        })
    }

    fn attempt(&self, api_key: &str, body: &serde_json::Value) -> Result<PartialFields, EscalationError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .map_err(|e| EscalationError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(EscalationError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatCompletion = response
            .json()
            .map_err(|e| EscalationError::Schema(e.to_string()))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| EscalationError::Schema("response has no message content".to_string()))?;

        Ok(EscalationResponse::parse(&content)?.into_fields())
    }
}

impl Escalation for OpenAiEscalation {
    fn extract(&self, excerpt: &str) -> Result<PartialFields, EscalationError> {
        let api_key = self.api_key()?;
        let body = self.request_body(excerpt);
        let mut delay_ms = INITIAL_BACKOFF_MS;

        for attempt in 1..=self.max_attempts {
            debug!("Escalation request (attempt {}/{})", attempt, self.max_attempts);

            match self.attempt(api_key, &body) {
                Ok(fields) => return Ok(fields),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    warn!("Escalation attempt {} failed, retrying: {}", attempt, e);
                    thread::sleep(Duration::from_millis(delay_ms));
                    delay_ms = (delay_ms * 2).min(MAX_BACKOFF_MS);
                }
                Err(e) => return Err(e),
            }
        }

        Err(EscalationError::Network("no attempts made".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(env: &str) -> EscalationConfig {
        EscalationConfig {
            enabled: true,
            api_key_env: env.to_string(),
            ..EscalationConfig::default()
        }
    }

    #[test]
    fn test_missing_credential_before_any_request() {
        let escalation = OpenAiEscalation::new(&config("INVEX_TEST_KEY_THAT_IS_NEVER_SET")).unwrap();
        let err = escalation.extract("Razem 1,00").unwrap_err();
        assert!(matches!(err, EscalationError::MissingCredential(name) if name == "INVEX_TEST_KEY_THAT_IS_NEVER_SET"));
    }

    #[test]
    fn test_request_body_carries_strict_schema() {
        let escalation = OpenAiEscalation::new(&config("UNUSED")).unwrap();
        let body = escalation.request_body("Razem 1,00");
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
        assert_eq!(body["messages"][1]["content"], "Razem 1,00");
        assert_eq!(body["model"], "gpt-4.1-mini");
    }
}
