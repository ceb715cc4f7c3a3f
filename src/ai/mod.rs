//! AI gateway: retrying access to an external text-generation capability.

pub mod gemini;
pub mod prompts;
pub mod retry;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::PipelineConfig;
use crate::error::{Result, SiftError};
use crate::util::Pacer;

use self::prompts::PromptSet;

pub use self::retry::{RetryPolicy, retry, retry_with};

/// The external capability: turn a prompt into text. Any failure is generic.
pub trait Generate {
    fn generate(&self, prompt: &str, expects_json: bool) -> anyhow::Result<String>;
}

/// Retrying wrapper around a `Generate` backend that hands back JSON.
///
/// Transport failures are retried per the policy and surface as
/// `AiUnavailable` once exhausted. A reply that is not the expected JSON is
/// `MalformedAiResponse` and is not retried here; call sites pick the
/// safe default for either.
pub struct AiGateway {
    backend: Box<dyn Generate>,
    policy: RetryPolicy,
}

impl AiGateway {
    pub fn new(backend: impl Generate + 'static, policy: RetryPolicy) -> Self {
        Self {
            backend: Box::new(backend),
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Generate with retries and parse the reply as a JSON value.
    pub fn invoke(&self, prompt: &str) -> Result<Value> {
        let text = retry(&self.policy, |_| self.backend.generate(prompt, true)).map_err(|e| {
            SiftError::AiUnavailable {
                attempts: self.policy.max_attempts.max(1),
                reason: format!("{:#}", e),
            }
        })?;
        let json = extract_json(&text).ok_or_else(|| {
            SiftError::MalformedAiResponse(format!("no JSON object in reply: {:?}", preview(&text)))
        })?;
        serde_json::from_str(json).map_err(|e| SiftError::MalformedAiResponse(e.to_string()))
    }

    /// Generate and decode into the shape `T`.
    pub fn invoke_as<T: DeserializeOwned>(&self, prompt: &str) -> Result<T> {
        let value = self.invoke(prompt)?;
        serde_json::from_value(value).map_err(|e| SiftError::MalformedAiResponse(e.to_string()))
    }
}

/// Everything a pipeline stage needs to make AI calls.
///
/// All calls go through `call`, which waits on the shared pacer first, so
/// calls within one batch are never closer together than the rate limit.
#[derive(Clone, Copy)]
pub struct AiContext<'a> {
    pub gateway: &'a AiGateway,
    pub prompts: &'a PromptSet,
    pub config: &'a PipelineConfig,
    pub pacer: &'a Pacer,
}

impl<'a> AiContext<'a> {
    pub fn call<T: DeserializeOwned>(&self, prompt: &str) -> Result<T> {
        self.pacer.wait();
        self.gateway.invoke_as(prompt)
    }

    pub fn call_value(&self, prompt: &str) -> Result<Value> {
        self.pacer.wait();
        self.gateway.invoke(prompt)
    }
}

fn preview(text: &str) -> &str {
    crate::util::truncate_chars(text, 120)
}

/// Locate the JSON object in a model reply: bare, or inside a code fence.
pub fn extract_json(response: &str) -> Option<&str> {
    let trimmed = response.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Some(trimmed);
    }
    if let Some(start) = response.find("```json") {
        let json_start = start + 7;
        if let Some(end) = response[json_start..].find("```") {
            return Some(response[json_start..json_start + end].trim());
        }
    }
    if let Some(start) = response.find("```") {
        let after_fence = start + 3;
        if let Some(nl) = response[after_fence..].find('\n') {
            let json_start = after_fence + nl + 1;
            if let Some(end) = response[json_start..].find("```") {
                let candidate = response[json_start..json_start + end].trim();
                if candidate.starts_with('{') {
                    return Some(candidate);
                }
            }
        }
    }
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (end > start).then(|| &response[start..=end])
}
