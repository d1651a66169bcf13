mod openai;
mod settings;

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use openai::OpenAiCompatClient;
pub use settings::{LlmSettings, ProviderKind};

pub const SYSTEM_PROMPT: &str = "You are a senior security engineer reviewing source code. Focus on security vulnerabilities, unsafe patterns, and clear remediation advice.";

/// Chat prompt sent to the review model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewPrompt {
    pub system: String,
    pub user: String,
}

impl ReviewPrompt {
    pub fn for_code(language: &str, code: &str) -> Self {
        Self {
            system: SYSTEM_PROMPT.to_string(),
            user: format!(
                "Language: {language}\n\n\
                 Review the following code for security issues and risky patterns.\n\
                 Respond with AT MOST 3 bullet points.\n\
                 - Each bullet MUST be concise (ideally under 120 characters).\n\
                 - Do NOT add any intro or outro text, only the bullets.\n\n\
                 ```{language}\n{code}\n```"
            ),
        }
    }
}

/// Failure of a single completion request.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("{0}")]
    Connection(String),
    #[error("provider returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("{0}")]
    Decode(String),
    #[error("response contained no message content")]
    EmptyResponse,
    #[error("{0}")]
    Request(String),
}

impl LlmError {
    /// Short category name shown in fallback text.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "Timeout",
            Self::Connection(_) => "ConnectionError",
            Self::Api { .. } => "ApiError",
            Self::Decode(_) => "DecodeError",
            Self::EmptyResponse => "EmptyResponse",
            Self::Request(_) => "RequestError",
        }
    }
}

/// Client abstraction for the hosted completion endpoint.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send the prompt and return the model's text, already trimmed.
    async fn complete(&self, prompt: &ReviewPrompt) -> Result<String, LlmError>;
}

/// Why a review could not be produced. `Display` yields the fallback text
/// placed in `llm_review`.
#[derive(Debug, Clone, Error)]
pub enum ReviewFailure {
    #[error("LLM review not available: no LLM client is enabled in this environment.")]
    NotInstalled,
    #[error("LLM review not available: {var} environment variable is not set.")]
    MissingCredential { var: String },
    #[error("LLM review not available: {}: {source}", .source.kind())]
    Request {
        #[source]
        source: LlmError,
    },
}

/// Capability handle chosen once at construction.
pub enum ReviewBackend {
    Live(Box<dyn LlmClient>),
    Unavailable(ReviewFailure),
}

impl std::fmt::Debug for ReviewBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Live(_) => f.write_str("Live"),
            Self::Unavailable(reason) => f.debug_tuple("Unavailable").field(reason).finish(),
        }
    }
}

/// Produces the `llm_review` field. Never fails outward: every problem
/// degrades to a fallback string.
#[derive(Debug)]
pub struct LlmReviewer {
    backend: ReviewBackend,
}

impl LlmReviewer {
    pub fn new(backend: ReviewBackend) -> Self {
        Self { backend }
    }

    pub fn with_client(client: impl LlmClient + 'static) -> Self {
        Self::new(ReviewBackend::Live(Box::new(client)))
    }

    pub fn unavailable(reason: ReviewFailure) -> Self {
        Self::new(ReviewBackend::Unavailable(reason))
    }

    /// Build from settings, reading the credential from the process
    /// environment.
    pub fn from_settings(settings: &LlmSettings) -> Result<Self> {
        Self::from_settings_with_vars(settings, &self::settings::process_env())
    }

    /// Capability is checked before the credential; neither check touches
    /// the network.
    pub fn from_settings_with_vars(
        settings: &LlmSettings,
        vars: &HashMap<String, String>,
    ) -> Result<Self> {
        if settings.provider == ProviderKind::None {
            info!("LLM review disabled by configuration");
            return Ok(Self::unavailable(ReviewFailure::NotInstalled));
        }
        let Some(api_key) = settings.api_key_from(vars) else {
            warn!(var = %settings.api_key_env, "LLM credential not set; reviews will be skipped");
            return Ok(Self::unavailable(ReviewFailure::MissingCredential {
                var: settings.api_key_env.clone(),
            }));
        };
        let client = OpenAiCompatClient::new(settings, api_key)?;
        info!(model = %settings.model, endpoint = %settings.endpoint, "LLM review enabled");
        Ok(Self::with_client(client))
    }

    pub fn is_live(&self) -> bool {
        matches!(self.backend, ReviewBackend::Live(_))
    }

    /// Reason reviews are skipped, if the backend is unavailable.
    pub fn unavailable_reason(&self) -> Option<&ReviewFailure> {
        match &self.backend {
            ReviewBackend::Live(_) => None,
            ReviewBackend::Unavailable(reason) => Some(reason),
        }
    }

    /// Structured outcome for callers that need to distinguish failures.
    pub async fn review(&self, language: &str, code: &str) -> Result<String, ReviewFailure> {
        let client = match &self.backend {
            ReviewBackend::Live(client) => client,
            ReviewBackend::Unavailable(reason) => return Err(reason.clone()),
        };
        let prompt = ReviewPrompt::for_code(language, code);
        match client.complete(&prompt).await {
            Ok(text) => {
                debug!(chars = text.len(), "LLM review received");
                Ok(text)
            }
            Err(source) => {
                warn!(kind = source.kind(), error = %source, "LLM review failed");
                Err(ReviewFailure::Request { source })
            }
        }
    }

    /// Review text or the matching fallback message.
    pub async fn review_text(&self, language: &str, code: &str) -> String {
        match self.review(language, code).await {
            Ok(text) => text,
            Err(failure) => failure.to_string(),
        }
    }
}
