//! The forecast capability seam.
//!
//! The orchestrator only needs "prompt in, text out"; everything about the
//! model behind it is somebody else's problem. The production
//! implementation is a blocking OpenAI-style chat-completion client. The
//! reply contract is strict: a single JSON object whose keys are the
//! metric field names, each a number or null; anything else counts as a
//! capability failure and the caller falls back.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use hobart_metrics::FiscalYearMetrics;

/// Default chat-completion API base URL.
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Timeout applied to every capability call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from the forecast/narrative capability. All of them are
/// non-fatal to a pipeline run: the orchestrator absorbs them per year via
/// the fallback.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// API-level error
    #[error("API error: {0}")]
    Api(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The reply did not match the expected contract
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Invalid API key
    #[error("Invalid API key")]
    InvalidApiKey,

    /// No capability is configured for this run
    #[error("No capability configured")]
    Unconfigured,
}

/// Result type for capability calls.
pub type CapabilityResult<T> = std::result::Result<T, CapabilityError>;

/// A text-generation capability the orchestrator can hand a prompt to.
pub trait ForecastCapability {
    /// Send one prompt and return the raw reply text. One attempt only;
    /// retry policy is not the capability's concern.
    fn complete(&self, prompt: &str) -> CapabilityResult<String>;
}

/// A chat message on the wire.
#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Blocking OpenAI-style chat-completion client.
pub struct ChatClient {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl ChatClient {
    /// Create a new client against the default API base URL.
    pub fn new(api_key: &str, model: &str, temperature: f32) -> CapabilityResult<Self> {
        Self::with_base_url(api_key, model, temperature, DEFAULT_BASE_URL)
    }

    /// Create a new client against a custom base URL (useful for testing).
    pub fn with_base_url(
        api_key: &str,
        model: &str,
        temperature: f32,
        base_url: &str,
    ) -> CapabilityResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            temperature,
        })
    }
}

impl ForecastCapability for ChatClient {
    fn complete(&self, prompt: &str) -> CapabilityResult<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: self.temperature,
        };

        debug!(model = %self.model, prompt_len = prompt.len(), "capability call");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(match status.as_u16() {
                401 => CapabilityError::InvalidApiKey,
                429 => CapabilityError::RateLimited,
                _ => {
                    let body = response.text().unwrap_or_default();
                    CapabilityError::Api(format!("HTTP {status}: {body}"))
                }
            });
        }

        let reply: ChatResponse = response.json()?;
        reply
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| CapabilityError::InvalidResponse("no choices in reply".to_string()))
    }
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

/// Capability used when no API key is configured. Every call fails, so
/// every forecast year resolves through the deterministic fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCapability;

impl ForecastCapability for NullCapability {
    fn complete(&self, _prompt: &str) -> CapabilityResult<String> {
        Err(CapabilityError::Unconfigured)
    }
}

/// Parse a capability reply into a metrics row.
///
/// Markdown code fences are tolerated; anything that is not a single JSON
/// object with the documented keys is a capability failure.
pub fn parse_forecast_response(content: &str) -> CapabilityResult<FiscalYearMetrics> {
    parse_json_object(content)
}

/// Parse a capability reply as one JSON object of the given shape.
///
/// Shared by forecast and narrative parsing: both contracts demand a bare
/// JSON object, with markdown code fences tolerated.
pub fn parse_json_object<T: serde::de::DeserializeOwned>(content: &str) -> CapabilityResult<T> {
    let body = strip_code_fences(content);

    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| CapabilityError::InvalidResponse(format!("not JSON: {e}")))?;

    if !value.is_object() {
        return Err(CapabilityError::InvalidResponse(
            "reply is not a JSON object".to_string(),
        ));
    }

    serde_json::from_value(value)
        .map_err(|e| CapabilityError::InvalidResponse(format!("object shape mismatch: {e}")))
}

/// Strip a surrounding markdown code fence, with or without a language tag.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_object() {
        let reply = r#"{"revenue": 110000.0, "adjEbitda": 22000.0, "evToEbitda": null}"#;
        let metrics = parse_forecast_response(reply).unwrap();
        assert_eq!(metrics.revenue, 110_000.0);
        assert_eq!(metrics.adj_ebitda, 22_000.0);
        assert_eq!(metrics.ev_to_ebitda, None);
    }

    #[test]
    fn test_parse_snake_case_aliases() {
        let reply = r#"{"revenue": 110000.0, "adj_ebitda": 22000.0, "net_debt_ebitda": 0.5}"#;
        let metrics = parse_forecast_response(reply).unwrap();
        assert_eq!(metrics.adj_ebitda, 22_000.0);
        assert_eq!(metrics.net_debt_to_ebitda, Some(0.5));
    }

    #[test]
    fn test_parse_fenced_reply() {
        let reply = "```json\n{\"revenue\": 110000.0}\n```";
        let metrics = parse_forecast_response(reply).unwrap();
        assert_eq!(metrics.revenue, 110_000.0);

        let reply = "```\n{\"revenue\": 12.0}\n```";
        assert_eq!(parse_forecast_response(reply).unwrap().revenue, 12.0);
    }

    #[test]
    fn test_parse_rejects_non_objects() {
        assert!(matches!(
            parse_forecast_response("[1, 2, 3]"),
            Err(CapabilityError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_forecast_response("I think revenue will be up."),
            Err(CapabilityError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_forecast_response("\"just a string\""),
            Err(CapabilityError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_null_capability_always_fails() {
        let result = NullCapability.complete("anything");
        assert!(matches!(result, Err(CapabilityError::Unconfigured)));
    }
}
