use std::{fmt, path::Path, str::FromStr};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod analyzers;
pub mod redaction;
pub mod service;
pub mod workspace;

/// Language tags accepted by the `scan_code` tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Javascript,
    Typescript,
    Go,
    Ruby,
    Java,
    Csharp,
    Php,
    Other,
}

impl Language {
    pub const ALL: [Language; 9] = [
        Language::Python,
        Language::Javascript,
        Language::Typescript,
        Language::Go,
        Language::Ruby,
        Language::Java,
        Language::Csharp,
        Language::Php,
        Language::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Javascript => "javascript",
            Language::Typescript => "typescript",
            Language::Go => "go",
            Language::Ruby => "ruby",
            Language::Java => "java",
            Language::Csharp => "csharp",
            Language::Php => "php",
            Language::Other => "other",
        }
    }

    /// Whether the static analyzers understand this language.
    pub fn supports_static_analysis(self) -> bool {
        matches!(self, Language::Python)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_language(raw);
        Language::ALL
            .into_iter()
            .find(|lang| lang.as_str() == normalized)
            .ok_or(UnknownLanguage(normalized))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unsupported language `{0}` (expected one of: python, javascript, typescript, go, ruby, java, csharp, php, other)")]
pub struct UnknownLanguage(pub String);

/// Trim and lowercase a caller-supplied language tag.
pub fn normalize_language(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// A single scan invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRequest {
    pub language: String,
    pub code: String,
}

impl ScanRequest {
    pub fn new(language: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            code: code.into(),
        }
    }
}

/// Result returned for every language; static fields stay empty when
/// static analysis was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub language: String,
    pub security_static_analysis: String,
    pub style_static_analysis: String,
    pub llm_review: String,
}

/// Fatal failures that abort a scan instead of being reported as data.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to prepare scan workspace: {0}")]
    Workspace(#[source] std::io::Error),
    #[error("failed to launch {tool} (`{program}`): {source}")]
    ToolLaunch {
        tool: &'static str,
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Adapter around an external linter that reads a single file.
#[async_trait]
pub trait StaticAnalyzer: Send + Sync {
    /// Short tool name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Run the tool against `path` and return its raw textual report.
    async fn analyze(&self, path: &Path) -> Result<String, ScanError>;
}

/// Primary scanning interface exposed to transports.
#[async_trait]
pub trait Scanner: Send + Sync {
    async fn scan(&self, request: &ScanRequest) -> Result<ScanResult, ScanError>;
}
