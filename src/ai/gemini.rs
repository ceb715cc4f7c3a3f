//! `Generate` over the Gemini `generateContent` REST endpoint.

use anyhow::{Result, bail};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use super::Generate;
use crate::config::AiConfig;

pub struct GeminiBackend {
    agent: ureq::Agent,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiBackend {
    pub fn new(endpoint: &str, model: &str, api_key: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn from_config(ai: &AiConfig) -> Result<Self> {
        let api_key = ai.resolve_api_key()?;
        Ok(Self::new(
            &ai.endpoint,
            &ai.model,
            &api_key,
            Duration::from_secs(ai.timeout_secs.max(1)),
        ))
    }

    fn url(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.endpoint, self.model)
    }
}

/// Concatenate the text parts of the first candidate.
fn candidate_text(response: &Value) -> Result<String> {
    let parts = response
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array);
    let text: String = parts
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();
    if text.trim().is_empty() {
        let reason = response
            .pointer("/promptFeedback/blockReason")
            .or_else(|| response.pointer("/candidates/0/finishReason"))
            .and_then(Value::as_str)
            .unwrap_or("no candidates");
        bail!("empty model reply ({})", reason);
    }
    Ok(text)
}

impl Generate for GeminiBackend {
    fn generate(&self, prompt: &str, expects_json: bool) -> Result<String> {
        let mut body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        });
        if expects_json {
            body["generationConfig"] = json!({ "responseMimeType": "application/json" });
        }
        debug!(model = %self.model, prompt_bytes = prompt.len(), "Calling generateContent");
        let response: Value = self
            .agent
            .post(&self.url())
            .set("x-goog-api-key", &self.api_key)
            .send_json(body)?
            .into_json()?;
        candidate_text(&response)
    }
}
