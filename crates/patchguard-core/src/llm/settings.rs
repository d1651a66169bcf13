use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, str::FromStr, time::Duration};

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const DEFAULT_TEMPERATURE: f32 = 0.1;
pub const DEFAULT_MAX_TOKENS: u32 = 4096;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Which review backend to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Any endpoint speaking the OpenAI chat-completions protocol.
    #[serde(alias = "openai-compatible")]
    OpenAi,
    /// Review capability disabled.
    #[serde(alias = "noop")]
    None,
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "openai" | "openai-compatible" => Ok(Self::OpenAi),
            "none" | "noop" | "off" => Ok(Self::None),
            other => bail!("unknown LLM provider `{other}` (expected `openai` or `none`)"),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenAi => f.write_str("openai"),
            Self::None => f.write_str("none"),
        }
    }
}

/// Process-wide configuration for the LLM review adapter. Read once at
/// startup; requests cannot change it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: ProviderKind,
    pub model: String,
    /// Base URL; `/chat/completions` is appended.
    pub endpoint: String,
    /// Name of the environment variable holding the credential.
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAi,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl LlmSettings {
    const PROVIDER_ENV: &'static str = "PATCHGUARD_LLM_PROVIDER";
    const MODEL_ENV: &'static str = "PATCHGUARD_LLM_MODEL";
    const ENDPOINT_ENV: &'static str = "PATCHGUARD_LLM_ENDPOINT";
    const API_KEY_ENV_ENV: &'static str = "PATCHGUARD_LLM_API_KEY_ENV";
    const TIMEOUT_ENV: &'static str = "PATCHGUARD_LLM_TIMEOUT";

    /// Overlay environment variables onto the defaults.
    ///
    /// * `PATCHGUARD_LLM_PROVIDER`: `openai` (default) or `none`.
    /// * `PATCHGUARD_LLM_MODEL` / `PATCHGUARD_LLM_ENDPOINT`: model and base URL.
    /// * `PATCHGUARD_LLM_API_KEY_ENV`: credential variable name (default `GEMINI_API_KEY`).
    /// * `PATCHGUARD_LLM_TIMEOUT`: seconds, or a duration such as `90s` or `2m`.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Overlay environment variables onto settings loaded elsewhere
    /// (typically a config file).
    pub fn with_env_overrides(self) -> Result<Self> {
        self.overlay(&process_env())
    }

    pub(crate) fn overlay(mut self, vars: &HashMap<String, String>) -> Result<Self> {
        let lookup = |key: &str| {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        if let Some(provider) = lookup(Self::PROVIDER_ENV) {
            self.provider = provider
                .parse()
                .with_context(|| format!("invalid {}", Self::PROVIDER_ENV))?;
        }
        if let Some(model) = lookup(Self::MODEL_ENV) {
            self.model = model;
        }
        if let Some(endpoint) = lookup(Self::ENDPOINT_ENV) {
            self.endpoint = endpoint;
        }
        if let Some(var) = lookup(Self::API_KEY_ENV_ENV) {
            self.api_key_env = var;
        }
        if let Some(timeout) = lookup(Self::TIMEOUT_ENV) {
            self.timeout_secs = parse_timeout_secs(&timeout)
                .with_context(|| format!("invalid {} value `{timeout}`", Self::TIMEOUT_ENV))?;
        }
        Ok(self)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Credential value from the given variables, if set and non-blank.
    pub fn api_key_from(&self, vars: &HashMap<String, String>) -> Option<String> {
        vars.get(&self.api_key_env)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// Process environment as UTF-8 pairs. Entries that are not valid UTF-8 are
/// skipped; none of the variables read here can be one of them.
pub(crate) fn process_env() -> HashMap<String, String> {
    std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect()
}

fn parse_timeout_secs(raw: &str) -> Result<u64> {
    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(secs);
    }
    Ok(humantime::parse_duration(raw)?.as_secs())
}
