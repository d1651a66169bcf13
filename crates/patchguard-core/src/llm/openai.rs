use super::{LlmClient, LlmError, LlmSettings, ReviewPrompt};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

/// Chat-completions client for OpenAI and OpenAI-compatible endpoints
/// (Gemini's compatibility layer, Groq, local gateways).
#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    http: Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiCompatClient {
    pub fn new(settings: &LlmSettings, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            bail!(
                "LLM API key must be provided via {}",
                settings.api_key_env
            );
        }
        let url = format!("{}/chat/completions", settings.endpoint.trim_end_matches('/'));
        let http = Client::builder()
            .user_agent(concat!("patchguard/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.timeout())
            .build()
            .context("failed to build LLM HTTP client")?;
        Ok(Self {
            http,
            url,
            api_key,
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    #[instrument(skip(self, prompt), fields(model = %self.model))]
    async fn complete(&self, prompt: &ReviewPrompt) -> Result<String, LlmError> {
        let payload = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        let body = response.text().await.map_err(classify)?;
        if !status.is_success() {
            return Err(LlmError::Api {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }
        debug!(bytes = body.len(), "chat completion received");

        let chat: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|err| LlmError::Decode(format!("malformed chat completion: {err}")))?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(LlmError::EmptyResponse)?;

        Ok(content.into_text().trim().to_string())
    }
}

fn classify(err: reqwest::Error) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout(err.to_string())
    } else if err.is_connect() {
        LlmError::Connection(err.to_string())
    } else if err.is_decode() {
        LlmError::Decode(err.to_string())
    } else {
        LlmError::Request(err.to_string())
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<MessageContent>,
}

/// Providers return either a plain string or a list of content parts.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<Value>),
}

impl MessageContent {
    fn into_text(self) -> String {
        match self {
            MessageContent::Text(text) => text,
            MessageContent::Parts(parts) => parts.into_iter().map(part_text).collect(),
        }
    }
}

fn part_text(part: Value) -> String {
    match part {
        Value::Object(mut map) if map.contains_key("text") => match map.remove("text") {
            Some(Value::String(text)) => text,
            Some(other) => other.to_string(),
            None => String::new(),
        },
        Value::String(text) => text,
        other => other.to_string(),
    }
}
