//! OpenAI-compatible completion gateway.
//!
//! Works with OpenAI and any endpoint exposing `POST /chat/completions`
//! (Azure-style proxies, vLLM, Ollama). One request per `complete()`,
//! bounded by a timeout, with failures classified for the caller's
//! retry policy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tellerbot_core::error::ProviderError;
use tellerbot_core::provider::{ProviderRequest, ProviderResponse, Usage};
use tellerbot_core::{Provider, Turn};
use tracing::{debug, error, warn};

/// Default completion timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest upstream error body kept in an error message.
const MAX_ERROR_BODY: usize = 500;

/// An OpenAI-compatible completion provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a provider for `base_url` (e.g. `https://api.openai.com/v1`).
    ///
    /// An empty `api_key` omits the Authorization header, for local servers.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout: DEFAULT_TIMEOUT,
            client,
        })
    }

    /// OpenAI's public endpoint.
    pub fn openai(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Bound on the whole request, from connect to the last body byte.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.is_empty() {
            builder
        } else {
            builder.bearer_auth(&self.api_key)
        }
    }

    fn to_api_messages(turns: &[Turn]) -> Vec<ApiMessage<'_>> {
        turns
            .iter()
            .map(|t| ApiMessage {
                role: t.role().as_str(),
                content: t.content(),
            })
            .collect()
    }

    /// Pull a readable message out of an error body.
    fn error_message(body: &str) -> String {
        let message = serde_json::from_str::<ApiErrorBody>(body)
            .ok()
            .map(|b| b.error.message)
            .unwrap_or_else(|| body.to_string());
        message.chars().take(MAX_ERROR_BODY).collect()
    }

    /// Classify a non-success status.
    fn classify_status(status: u16, body: &str) -> ProviderError {
        let message = Self::error_message(body);
        if (400..500).contains(&status) {
            ProviderError::UpstreamRejected { status, message }
        } else {
            ProviderError::UpstreamError { status, message }
        }
    }

    /// Parse a 2xx body into a response.
    fn parse_success(body: &str) -> Result<ProviderResponse, ProviderError> {
        let api: ApiResponse = serde_json::from_str(body)
            .map_err(|e| ProviderError::MalformedResponse(format!("unparsable body: {e}")))?;

        let choice = api
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::MalformedResponse("no choices in response".into()))?;

        let text = choice
            .message
            .and_then(|m| m.content)
            .or(choice.text)
            .ok_or_else(|| ProviderError::MalformedResponse("choice has no text".into()))?;

        let usage = api
            .usage
            .ok_or_else(|| ProviderError::MalformedResponse("missing usage".into()))?;

        Ok(ProviderResponse {
            text,
            usage: Usage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            },
            model: api.model.unwrap_or_default(),
        })
    }

    async fn send(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ApiRequest {
            model: &request.model,
            messages: Self::to_api_messages(&request.messages),
            max_tokens: request.params.max_tokens,
            temperature: request.params.temperature,
            presence_penalty: request.params.presence_penalty,
            frequency_penalty: request.params.frequency_penalty,
        };

        let response = self
            .authorized(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::UpstreamUnavailable(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::UpstreamUnavailable(format!("reading body: {e}")))?;

        if !(200..300).contains(&status) {
            warn!(provider = %self.name, status, body = %Self::error_message(&text), "Provider returned error");
            return Err(Self::classify_status(status, &text));
        }

        Self::parse_success(&text)
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        debug!(
            provider = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            max_tokens = request.params.max_tokens,
            "Sending completion request"
        );

        let result = match tokio::time::timeout(self.timeout, self.send(&request)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::UpstreamUnavailable(format!(
                "timed out after {}ms",
                self.timeout.as_millis()
            ))),
        };

        if let Err(ProviderError::MalformedResponse(reason)) = &result {
            error!(provider = %self.name, model = %request.model, reason = %reason, "Malformed completion response");
        }
        result
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/models", self.base_url);
        let probe = self.authorized(self.client.get(&url)).send();
        match tokio::time::timeout(Duration::from_secs(3), probe).await {
            Ok(Ok(response)) => response.status().is_success(),
            _ => false,
        }
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    presence_penalty: f32,
    frequency_penalty: f32,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    #[serde(default)]
    message: Option<ApiResponseMessage>,
    /// Legacy completions shape.
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let p = OpenAiCompatProvider::new("test", "http://localhost:8000/v1/", "k").unwrap();
        assert_eq!(p.base_url(), "http://localhost:8000/v1");
        assert_eq!(p.name(), "test");
    }

    #[test]
    fn request_body_shape() {
        let turns = vec![Turn::system("be kind"), Turn::user("hi")];
        let body = ApiRequest {
            model: "gpt-3.5-turbo",
            messages: OpenAiCompatProvider::to_api_messages(&turns),
            max_tokens: 500,
            temperature: 0.7,
            presence_penalty: 0.1,
            frequency_penalty: 0.1,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["max_tokens"], 500);
        assert!(json.get("stream").is_none());
    }

    #[test]
    fn parses_chat_shape() {
        let body = r#"{
            "model": "gpt-3.5-turbo-0125",
            "choices": [{"message": {"role": "assistant", "content": "Hello"}}],
            "usage": {"prompt_tokens": 9, "completion_tokens": 2, "total_tokens": 11}
        }"#;
        let r = OpenAiCompatProvider::parse_success(body).unwrap();
        assert_eq!(r.text, "Hello");
        assert_eq!(r.usage, Usage::new(9, 2));
        assert_eq!(r.model, "gpt-3.5-turbo-0125");
    }

    #[test]
    fn parses_legacy_text_shape() {
        let body = r#"{
            "choices": [{"text": "Legacy hello"}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
        }"#;
        let r = OpenAiCompatProvider::parse_success(body).unwrap();
        assert_eq!(r.text, "Legacy hello");
    }

    #[test]
    fn malformed_bodies_classified() {
        for body in [
            "not json",
            r#"{"choices": [], "usage": {"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2}}"#,
            r#"{"choices": [{"message": {"content": "hi"}}]}"#,
            r#"{"choices": [{"message": {}}], "usage": {"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2}}"#,
        ] {
            assert!(matches!(
                OpenAiCompatProvider::parse_success(body),
                Err(ProviderError::MalformedResponse(_))
            ));
        }
    }

    #[test]
    fn status_classification() {
        let rejected = OpenAiCompatProvider::classify_status(
            401,
            r#"{"error": {"message": "Incorrect API key provided"}}"#,
        );
        match rejected {
            ProviderError::UpstreamRejected { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Incorrect API key provided");
            }
            other => panic!("expected UpstreamRejected, got {other:?}"),
        }

        let server = OpenAiCompatProvider::classify_status(503, "overloaded");
        assert!(matches!(
            server,
            ProviderError::UpstreamError { status: 503, .. }
        ));
        assert!(server.is_retryable());
    }

    #[test]
    fn long_error_bodies_truncated() {
        let body = "x".repeat(5000);
        assert_eq!(OpenAiCompatProvider::error_message(&body).len(), MAX_ERROR_BODY);
    }
}
