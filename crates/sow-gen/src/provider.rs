//! Text-generation backends.
//!
//! The pipeline only needs `generate(prompt, options) -> text`; everything
//! provider-specific stays behind [`TextBackend`]. Uses blocking HTTP via
//! `ureq` with a global per-call timeout; the CLI has no async runtime.

use serde_json::Value;
use std::time::Duration;

/// Errors from text-generation backend calls.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("backend call timed out: {0}")]
    Timeout(String),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("response parse error: {0}")]
    Parse(String),
    #[error("empty response from backend")]
    EmptyResponse,
    #[error("unknown provider: '{name}'. Available: {available}")]
    Unknown { name: String, available: String },
}

/// Sampling options for one generation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerateOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 1200,
        }
    }
}

/// A completed backend response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    /// Input tokens used (if the backend reports them).
    pub input_tokens: Option<u64>,
    /// Output tokens used (if the backend reports them).
    pub output_tokens: Option<u64>,
}

impl Completion {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// An opaque completion service: prompt in, text out.
///
/// Implementations are shared across worker threads, so they must be `Sync`.
pub trait TextBackend: Send + Sync {
    fn generate(&self, prompt: &str, options: &GenerateOptions)
    -> Result<Completion, ProviderError>;

    /// The model name (for display/logging).
    fn model_name(&self) -> &str;
}

const SYSTEM_PROMPT: &str = "You are an experienced teacher preparing lesson plans. \
     Respond with a single JSON object and nothing else.";

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::new_with_config(
        ureq::config::Config::builder()
            .timeout_global(Some(timeout))
            .build(),
    )
}

fn send_error(err: ureq::Error) -> ProviderError {
    match err {
        ureq::Error::StatusCode(status) => ProviderError::Api {
            status,
            message: format!("backend returned HTTP {status}"),
        },
        ureq::Error::Timeout(kind) => ProviderError::Timeout(format!("{kind:?}")),
        other => ProviderError::Http(other.to_string()),
    }
}

/// Surface an `{"error": {"message": ...}}` body as an API error.
fn api_error(json: &Value) -> Option<ProviderError> {
    let err = json.get("error")?;
    let message = err
        .get("message")
        .and_then(|m| m.as_str())
        .or_else(|| err.as_str())
        .unwrap_or("unknown error")
        .to_string();
    Some(ProviderError::Api {
        status: 400,
        message,
    })
}

// ---------------------------------------------------------------------------
// OpenAI Chat Completions API
// ---------------------------------------------------------------------------

/// OpenAI-compatible provider (works with OpenAI, Azure, local proxies).
#[cfg(feature = "openai")]
pub struct OpenAiProvider {
    api_key: String,
    model: String,
    base_url: String,
    agent: ureq::Agent,
}

#[cfg(feature = "openai")]
impl OpenAiProvider {
    pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
    const DEFAULT_BASE_URL: &str = "https://api.openai.com";

    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            api_key,
            model: model.unwrap_or_else(|| Self::DEFAULT_MODEL.to_string()),
            base_url: base_url.unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string()),
            agent: build_agent(timeout),
        }
    }
}

#[cfg(feature = "openai")]
impl TextBackend for OpenAiProvider {
    fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<Completion, ProviderError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        );

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": options.max_tokens,
            "temperature": options.temperature,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt}
            ]
        });

        let mut response = self
            .agent
            .post(&url)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .send_json(&body)
            .map_err(send_error)?;

        let json: Value = response
            .body_mut()
            .read_json()
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        if let Some(err) = api_error(&json) {
            return Err(err);
        }

        let text = json
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|arr| arr.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|msg| msg.get("content"))
            .and_then(|c| c.as_str())
            .filter(|t| !t.trim().is_empty())
            .ok_or(ProviderError::EmptyResponse)?
            .to_string();

        let usage = json.get("usage");
        Ok(Completion {
            text,
            input_tokens: usage
                .and_then(|u| u.get("prompt_tokens"))
                .and_then(|t| t.as_u64()),
            output_tokens: usage
                .and_then(|u| u.get("completion_tokens"))
                .and_then(|t| t.as_u64()),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ---------------------------------------------------------------------------
// Generic prompt endpoint
// ---------------------------------------------------------------------------

/// A hosted endpoint that accepts `{prompt, system, max_tokens, temperature}`
/// and answers with text in one of several common envelope shapes.
#[cfg(feature = "endpoint")]
pub struct EndpointProvider {
    api_key: String,
    url: String,
    model: String,
    agent: ureq::Agent,
}

#[cfg(feature = "endpoint")]
impl EndpointProvider {
    pub fn new(api_key: String, url: String, model: Option<String>, timeout: Duration) -> Self {
        Self {
            api_key,
            url,
            model: model.unwrap_or_else(|| "endpoint".to_string()),
            agent: build_agent(timeout),
        }
    }
}

#[cfg(feature = "endpoint")]
impl TextBackend for EndpointProvider {
    fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<Completion, ProviderError> {
        let body = serde_json::json!({
            "prompt": prompt,
            "system": SYSTEM_PROMPT,
            "max_tokens": options.max_tokens,
            "temperature": options.temperature,
        });

        let mut response = self
            .agent
            .post(&self.url)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .send_json(&body)
            .map_err(send_error)?;

        let json: Value = response
            .body_mut()
            .read_json()
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        if let Some(err) = api_error(&json) {
            return Err(err);
        }

        let text = extract_endpoint_text(&json);
        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(Completion::from_text(text))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Pull the completion text out of an endpoint response.
///
/// Accepts a bare JSON string, `candidates[0].content`,
/// `candidates[0].output_text`, `output` or `text`, in that order. Any other
/// shape is returned re-serialized so the caller's JSON extraction can still
/// look inside it.
pub fn extract_endpoint_text(json: &Value) -> String {
    if let Some(s) = json.as_str() {
        return s.to_string();
    }

    let candidate = json
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|arr| arr.first());
    let found = candidate
        .and_then(|c| c.get("content"))
        .and_then(|c| c.as_str())
        .or_else(|| {
            candidate
                .and_then(|c| c.get("output_text"))
                .and_then(|c| c.as_str())
        })
        .or_else(|| json.get("output").and_then(|o| o.as_str()))
        .or_else(|| json.get("text").and_then(|t| t.as_str()));

    match found {
        Some(text) => text.to_string(),
        None => json.to_string(),
    }
}

/// Create a provider from CLI arguments or config.
pub fn create_provider(
    provider_name: &str,
    api_key: &str,
    model: Option<&str>,
    base_url: Option<&str>,
    timeout: Duration,
) -> Result<Box<dyn TextBackend>, ProviderError> {
    match provider_name {
        #[cfg(feature = "openai")]
        "openai" => Ok(Box::new(OpenAiProvider::new(
            api_key.to_string(),
            model.map(String::from),
            base_url.map(String::from),
            timeout,
        ))),
        #[cfg(feature = "endpoint")]
        "endpoint" => {
            let url = base_url.ok_or_else(|| {
                ProviderError::Http("the endpoint provider requires a base URL".to_string())
            })?;
            Ok(Box::new(EndpointProvider::new(
                api_key.to_string(),
                url.to_string(),
                model.map(String::from),
                timeout,
            )))
        }
        other => Err(ProviderError::Unknown {
            name: other.to_string(),
            available: available_providers().join(", "),
        }),
    }
}

/// List compiled-in provider names.
pub fn available_providers() -> Vec<&'static str> {
    vec![
        #[cfg(feature = "openai")]
        "openai",
        #[cfg(feature = "endpoint")]
        "endpoint",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_bare_string() {
        assert_eq!(extract_endpoint_text(&json!("{\"a\":1}")), "{\"a\":1}");
    }

    #[test]
    fn test_extract_candidate_fields_in_order() {
        let both = json!({"candidates": [{"content": "first", "output_text": "second"}]});
        assert_eq!(extract_endpoint_text(&both), "first");

        let output_text = json!({"candidates": [{"output_text": "second"}], "text": "last"});
        assert_eq!(extract_endpoint_text(&output_text), "second");
    }

    #[test]
    fn test_extract_output_then_text() {
        assert_eq!(
            extract_endpoint_text(&json!({"output": "o", "text": "t"})),
            "o"
        );
        assert_eq!(extract_endpoint_text(&json!({"text": "t"})), "t");
    }

    #[test]
    fn test_extract_unknown_shape_reserialized() {
        let value = json!({"learning_outcomes": ["State X"]});
        let text = extract_endpoint_text(&value);
        let back: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_api_error_detected() {
        let err = api_error(&json!({"error": {"message": "quota exceeded"}})).unwrap();
        assert!(err.to_string().contains("quota exceeded"));
        assert!(api_error(&json!({"text": "fine"})).is_none());
    }

    #[test]
    fn test_unknown_provider() {
        let err = create_provider("nope", "key", None, None, Duration::from_secs(1))
            .err()
            .unwrap();
        assert!(matches!(err, ProviderError::Unknown { .. }));
    }

    #[test]
    fn test_endpoint_requires_url() {
        assert!(create_provider("endpoint", "key", None, None, Duration::from_secs(1)).is_err());
        let provider = create_provider(
            "endpoint",
            "key",
            Some("lesson-model"),
            Some("http://localhost:9/generate"),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(provider.model_name(), "lesson-model");
    }

    #[test]
    fn test_available_providers() {
        let providers = available_providers();
        assert!(providers.contains(&"openai"));
        assert!(providers.contains(&"endpoint"));
    }
}
