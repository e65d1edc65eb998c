/// LLM client: the single point of entry for all model calls in the tailoring service.
///
/// ARCHITECTURAL RULE: No other module may call a provider API directly.
/// Handlers go through `ModelRouter::generate`, which owns model fallback.
///
/// Each backend makes exactly one HTTP attempt per call. There is no
/// backoff here; a rate-limited model is skipped in favour of the next one.
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub mod fallback;
pub mod prompts;
pub mod usage;

pub use fallback::{Generation, ModelRouter};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const DEFAULT_TEMPERATURE: f32 = 0.3;
const HTTP_TIMEOUT_SECS: u64 = 55;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("No API key configured for {0}")]
    MissingApiKey(Provider),

    #[error("No backend registered for {0}")]
    UnsupportedProvider(Provider),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("No models configured")]
    NoModels,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anthropic,
    Groq,
    #[serde(rename = "openai")]
    OpenAi,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Anthropic => "anthropic",
            Provider::Groq => "groq",
            Provider::OpenAi => "openai",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            "groq" => Ok(Provider::Groq),
            "openai" => Ok(Provider::OpenAi),
            other => Err(format!("unknown provider '{other}'")),
        }
    }
}

/// A concrete model on a concrete provider, written `provider:model`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelSpec {
    pub provider: Provider,
    pub model: String,
}

impl ModelSpec {
    pub fn new(provider: Provider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.model)
    }
}

impl FromStr for ModelSpec {
    type Err = String;

    /// Accepts `provider:model`, or a bare model name whose provider is
    /// inferred from its family (`claude-*`, `gpt-*`/`o*`, otherwise Groq).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty model name".to_string());
        }
        if let Some((provider, model)) = s.split_once(':') {
            if let Ok(provider) = provider.parse::<Provider>() {
                if model.trim().is_empty() {
                    return Err(format!("missing model name in '{s}'"));
                }
                return Ok(ModelSpec::new(provider, model.trim()));
            }
        }
        let lower = s.to_ascii_lowercase();
        let provider = if lower.starts_with("claude") {
            Provider::Anthropic
        } else if lower.starts_with("gpt") || lower.starts_with("o1") || lower.starts_with("o3") {
            Provider::OpenAi
        } else {
            Provider::Groq
        };
        Ok(ModelSpec::new(provider, s))
    }
}

impl Serialize for ModelSpec {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Provider keys. Request-supplied keys take precedence over configured ones.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeys {
    pub anthropic: Option<String>,
    pub groq: Option<String>,
    pub openai: Option<String>,
}

impl ApiKeys {
    pub fn for_provider(&self, provider: Provider) -> Option<&str> {
        let key = match provider {
            Provider::Anthropic => self.anthropic.as_deref(),
            Provider::Groq => self.groq.as_deref(),
            Provider::OpenAi => self.openai.as_deref(),
        };
        key.filter(|k| !k.trim().is_empty())
    }

    /// Keys from `self`, falling back to `base` per provider.
    pub fn over(&self, base: &ApiKeys) -> ApiKeys {
        let pick = |own: &Option<String>, fallback: &Option<String>| {
            own.clone()
                .filter(|k| !k.trim().is_empty())
                .or_else(|| fallback.clone())
        };
        ApiKeys {
            anthropic: pick(&self.anthropic, &base.anthropic),
            groq: pick(&self.groq, &base.groq),
            openai: pick(&self.openai, &base.openai),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub system: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Ask the provider for a JSON object response where it supports that.
    pub json_mode: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            system: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            json_mode: false,
        }
    }
}

impl GenerateOptions {
    pub fn json(system: &str) -> Self {
        Self {
            system: Some(system.to_string()),
            json_mode: true,
            ..Self::default()
        }
    }

    pub fn text(system: &str) -> Self {
        Self {
            system: Some(system.to_string()),
            ..Self::default()
        }
    }
}

/// One provider's text-generation endpoint.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerateOptions,
        api_key: Option<&str>,
    ) -> Result<String, LlmError>;
}

fn build_http_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()
        .expect("Failed to build HTTP client")
}

// ────────────────────────────────────────────────────────────────────────────
// Anthropic Messages API
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Clone)]
pub struct AnthropicBackend {
    client: Client,
}

impl AnthropicBackend {
    pub fn new() -> Self {
        Self {
            client: build_http_client(),
        }
    }
}

#[async_trait]
impl ModelBackend for AnthropicBackend {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerateOptions,
        api_key: Option<&str>,
    ) -> Result<String, LlmError> {
        let api_key = api_key.ok_or(LlmError::MissingApiKey(Provider::Anthropic))?;
        let request_body = AnthropicRequest {
            model,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            system: options.system.as_deref(),
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), &body));
        }

        let parsed: AnthropicResponse = response.json().await?;
        if let Some(usage) = &parsed.usage {
            debug!(
                "Anthropic call succeeded: model={model}, input_tokens={}, output_tokens={}",
                usage.input_tokens, usage.output_tokens
            );
        }

        parsed
            .content
            .into_iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text)
            .filter(|t| !t.trim().is_empty())
            .ok_or(LlmError::EmptyContent)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// OpenAI-compatible chat completions (Groq, OpenAI)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Clone)]
pub struct OpenAiCompatibleBackend {
    client: Client,
    provider: Provider,
    endpoint: String,
}

impl OpenAiCompatibleBackend {
    pub fn groq() -> Self {
        Self::with_endpoint(Provider::Groq, GROQ_API_URL)
    }

    pub fn openai() -> Self {
        Self::with_endpoint(Provider::OpenAi, OPENAI_API_URL)
    }

    pub fn with_endpoint(provider: Provider, endpoint: &str) -> Self {
        Self {
            client: build_http_client(),
            provider,
            endpoint: endpoint.to_string(),
        }
    }
}

#[async_trait]
impl ModelBackend for OpenAiCompatibleBackend {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerateOptions,
        api_key: Option<&str>,
    ) -> Result<String, LlmError> {
        let api_key = api_key.ok_or(LlmError::MissingApiKey(self.provider))?;

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = options.system.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        let request_body = ChatCompletionRequest {
            model,
            messages,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            response_format: options.json_mode.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), &body));
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        debug!("{} call succeeded: model={model}", self.provider);

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or(LlmError::EmptyContent)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Provider error bodies
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ProviderErrorEnvelope {
    error: ProviderErrorBody,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
    code: Option<serde_json::Value>,
}

/// Maps a non-2xx provider response to an `LlmError`, surfacing quota flags.
fn api_error(status: u16, body: &str) -> LlmError {
    match serde_json::from_str::<ProviderErrorEnvelope>(body) {
        Ok(envelope) => {
            let quota_flag = envelope.error.error_type.as_deref() == Some("insufficient_quota")
                || envelope
                    .error
                    .code
                    .as_ref()
                    .and_then(|c| c.as_str())
                    .is_some_and(|c| c == "insufficient_quota");
            if quota_flag {
                LlmError::QuotaExceeded(envelope.error.message)
            } else {
                LlmError::Api {
                    status,
                    message: envelope.error.message,
                }
            }
        }
        Err(_) => LlmError::Api {
            status,
            message: body.to_string(),
        },
    }
}
