use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ComplianceConfig;
use crate::error::GatewayError;
use crate::section::Section;

const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Role of a message in the conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, Serialize)]
pub struct Message<'a> {
    pub role: Role,
    pub content: &'a str,
}

/// One chat-completion call.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Which section the call is for. Not sent to the provider.
    pub section: Section,
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Trait for LLM clients, enabling mocking in tests.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, GatewayError>;
}

/// OpenAI-compatible chat-completions client, pointed at OpenRouter by default.
///
/// NOTE: Do NOT derive `Debug` on this struct, `api_key` would be exposed.
pub struct OpenRouterClient {
    http: reqwest::Client,
    api_key: String,
    api_base_url: String,
    model: String,
    site_url: String,
    site_name: String,
    max_attempts: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    messages: [Message<'a>; 2],
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl OpenRouterClient {
    pub fn new(config: &ComplianceConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            site_url: config.site_url.clone(),
            site_name: config.site_name.clone(),
            max_attempts: config.max_attempts.max(1),
        })
    }
}

fn is_transient_status(status: u16) -> bool {
    status == 408 || status == 429 || status >= 500
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.min(4))
}

#[async_trait]
impl LlmClient for OpenRouterClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, GatewayError> {
        let url = format!("{}/v1/chat/completions", self.api_base_url);

        let body = ChatRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: [
                Message {
                    role: Role::System,
                    content: &request.system,
                },
                Message {
                    role: Role::User,
                    content: &request.user,
                },
            ],
        };

        let section = request.section;
        let mut last_error: Option<GatewayError> = None;
        let mut next_delay = Duration::ZERO;

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                debug!(%section, attempt, "retrying LLM request after {:?}", next_delay);
                tokio::time::sleep(next_delay).await;
            }
            next_delay = backoff(attempt);

            let resp = self
                .http
                .post(&url)
                .bearer_auth(&self.api_key)
                .header("HTTP-Referer", &self.site_url)
                .header("X-Title", &self.site_name)
                .header("content-type", "application/json")
                .json(&body)
                .send()
                .await;

            let resp = match resp {
                Ok(r) => r,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    warn!(%section, attempt, error = %e, "LLM request failed");
                    last_error = Some(GatewayError::Request(e));
                    continue;
                }
                Err(e) => return Err(GatewayError::Request(e)),
            };

            if !resp.status().is_success() {
                let status = resp.status().as_u16();
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .map(Duration::from_secs);
                let body_text = resp.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ErrorResponse>(&body_text)
                    .ok()
                    .and_then(|r| r.error)
                    .map(|e| e.message)
                    .unwrap_or(body_text);
                let error = GatewayError::Status { status, message };

                if !is_transient_status(status) {
                    return Err(error);
                }

                warn!(%section, attempt, status, "LLM provider returned transient status");
                if let Some(retry_after) = retry_after {
                    next_delay = retry_after.min(MAX_RETRY_AFTER).max(next_delay);
                }
                last_error = Some(error);
                continue;
            }

            let api_response: ChatResponse = resp
                .json()
                .await
                .map_err(|e| GatewayError::Envelope(e.to_string()))?;

            let content = api_response
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message)
                .and_then(|message| message.content)
                .filter(|content| !content.trim().is_empty())
                .ok_or(GatewayError::EmptyContent)?;

            let (input_tokens, output_tokens) = api_response
                .usage
                .map(|u| (u.prompt_tokens, u.completion_tokens))
                .unwrap_or_default();

            debug!(%section, input_tokens, output_tokens, "LLM call completed");

            return Ok(LlmResponse {
                content,
                input_tokens,
                output_tokens,
            });
        }

        Err(last_error.unwrap_or(GatewayError::EmptyContent))
    }
}

/// Test utilities for the LLM client.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_support {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone)]
    enum Reply {
        Content(String),
        Fail { status: u16 },
    }

    /// Mock LLM client scripted per section.
    ///
    /// Sections without a scripted reply fail with `EmptyContent`.
    #[derive(Default)]
    pub struct MockLlmClient {
        replies: HashMap<Section, Reply>,
        delays: HashMap<Section, Duration>,
        calls: AtomicUsize,
    }

    impl MockLlmClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(mut self, section: Section, content: impl Into<String>) -> Self {
            self.replies.insert(section, Reply::Content(content.into()));
            self
        }

        pub fn fail(mut self, section: Section, status: u16) -> Self {
            self.replies.insert(section, Reply::Fail { status });
            self
        }

        pub fn delay(mut self, section: Section, delay: Duration) -> Self {
            self.delays.insert(section, delay);
            self
        }

        /// Total number of `complete` calls made so far.
        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmClient for MockLlmClient {
        async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if let Some(delay) = self.delays.get(&request.section) {
                tokio::time::sleep(*delay).await;
            }

            match self.replies.get(&request.section) {
                Some(Reply::Content(content)) => Ok(LlmResponse {
                    content: content.clone(),
                    input_tokens: 100,
                    output_tokens: 200,
                }),
                Some(Reply::Fail { status }) => Err(GatewayError::Status {
                    status: *status,
                    message: "scripted failure".into(),
                }),
                None => Err(GatewayError::EmptyContent),
            }
        }
    }
}
