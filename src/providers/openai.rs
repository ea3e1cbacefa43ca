//! OpenAI-compatible chat-completions client.
//!
//! Works against any endpoint speaking the `/chat/completions` dialect.
//! See: <https://platform.openai.com/docs/api-reference/chat>

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::prompts;
use super::traits::{ProviderRequest, TextProvider};
use crate::{GatewayError, Result};

/// Default base URL for the OpenAI API
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Chat-completions provider.
///
/// Makes exactly one HTTP call per [`attempt`](TextProvider::attempt);
/// the overall time limit is enforced by the retry executor, so the HTTP
/// client only bounds connection setup.
#[derive(Clone)]
pub struct OpenAiClient {
    api_key: String,
    http: Client,
    base_url: String,
}

impl OpenAiClient {
    /// Create a new client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (self-hosted gateways, wiremock).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| GatewayError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            api_key: api_key.into(),
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn build_request<'a>(&self, request: &'a ProviderRequest) -> ChatRequest<'a> {
        let params = &request.input.params;
        ChatRequest {
            model: &params.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: prompts::system_prompt(request),
                },
                ChatMessage {
                    role: "user",
                    content: prompts::user_message(request),
                },
            ],
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        }
    }
}

#[async_trait]
impl TextProvider for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn attempt(&self, request: &ProviderRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.build_request(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(
                status.as_u16(),
                &body,
                retry_after,
                &request.input.params.model,
            ));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Json(e.to_string()))?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or(GatewayError::EmptyResponse)?;

        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(GatewayError::ContentFiltered {
                reason: "completion stopped by content filter".to_string(),
            });
        }

        match choice.message.content {
            Some(content) if !content.trim().is_empty() => Ok(content),
            _ => Err(GatewayError::EmptyResponse),
        }
    }
}

/// Map a non-success HTTP status (and its error body) to a gateway error.
fn map_status(status: u16, body: &str, retry_after: Option<Duration>, model: &str) -> GatewayError {
    let detail = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error)
        .ok();
    let message = detail
        .as_ref()
        .and_then(|d| d.message.clone())
        .unwrap_or_else(|| format!("HTTP {status}"));

    match status {
        401 | 403 => GatewayError::AuthenticationFailed,
        404 => GatewayError::ModelNotFound(model.to_string()),
        429 => GatewayError::RateLimited { retry_after },
        400 => {
            let code = detail.as_ref().and_then(|d| d.code.as_deref());
            if code == Some("content_policy_violation") || code == Some("content_filter") {
                GatewayError::ContentFiltered { reason: message }
            } else {
                GatewayError::InvalidRequest(message)
            }
        }
        code => GatewayError::Api {
            status: code,
            message,
        },
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
    code: Option<String>,
}
