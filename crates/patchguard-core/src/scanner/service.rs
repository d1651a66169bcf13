use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use super::{
    analyzers::{CommandAnalyzer, ToolSettings},
    normalize_language,
    redaction::redact_workspace_paths,
    workspace::TempWorkspace,
    Language, ScanError, ScanRequest, ScanResult, Scanner, StaticAnalyzer,
};
use crate::llm::LlmReviewer;

/// Raw reports from the two static analyzers.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct StaticReports {
    security: String,
    style: String,
}

/// Sequential pipeline: workspace, security analyzer, style analyzer,
/// workspace release, LLM review.
pub struct ScanService {
    security: Arc<dyn StaticAnalyzer>,
    style: Arc<dyn StaticAnalyzer>,
    reviewer: Arc<LlmReviewer>,
}

impl ScanService {
    pub fn new(
        security: Arc<dyn StaticAnalyzer>,
        style: Arc<dyn StaticAnalyzer>,
        reviewer: Arc<LlmReviewer>,
    ) -> Self {
        Self {
            security,
            style,
            reviewer,
        }
    }

    /// Bandit and ruff resolved from `tools`.
    pub fn with_tools(tools: &ToolSettings, reviewer: LlmReviewer) -> Self {
        Self::new(
            Arc::new(CommandAnalyzer::bandit(&tools.bandit)),
            Arc::new(CommandAnalyzer::ruff(&tools.ruff)),
            Arc::new(reviewer),
        )
    }

    pub fn reviewer(&self) -> &LlmReviewer {
        &self.reviewer
    }

    async fn run_static_analysis(&self, language: &str, code: &str) -> Result<StaticReports, ScanError> {
        let workspace = TempWorkspace::create(code, language)?;
        let redact = |report: String| {
            redact_workspace_paths(
                &report,
                workspace.path(),
                workspace.dir(),
                workspace.file_name(),
            )
        };

        let security = redact(self.security.analyze(workspace.path()).await?);
        debug!(tool = self.security.name(), bytes = security.len(), "security report ready");
        let style = redact(self.style.analyze(workspace.path()).await?);
        debug!(tool = self.style.name(), bytes = style.len(), "style report ready");

        workspace.close()?;
        Ok(StaticReports { security, style })
    }
}

#[async_trait]
impl Scanner for ScanService {
    #[instrument(skip(self, request), fields(language = %request.language.trim(), code_len = request.code.len()))]
    async fn scan(&self, request: &ScanRequest) -> Result<ScanResult, ScanError> {
        let language = normalize_language(&request.language);

        let reports = match language.parse::<Language>() {
            Ok(lang) if lang.supports_static_analysis() => {
                self.run_static_analysis(&language, &request.code).await?
            }
            _ => {
                debug!(%language, "static analysis skipped for language");
                StaticReports::default()
            }
        };

        // The workspace is gone by now; the review only needs the in-memory code.
        let llm_review = self.reviewer.review_text(&language, &request.code).await;

        info!(
            %language,
            security_bytes = reports.security.len(),
            style_bytes = reports.style.len(),
            llm_live = self.reviewer.is_live(),
            "scan complete"
        );

        Ok(ScanResult {
            language,
            security_static_analysis: reports.security,
            style_static_analysis: reports.style,
            llm_review,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmClient, LlmError, ReviewFailure, ReviewPrompt};
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    /// Echoes the absolute path it was handed, the way real linters do.
    struct PathEcho {
        name: &'static str,
        seen: Arc<Mutex<Vec<PathBuf>>>,
    }

    #[async_trait]
    impl StaticAnalyzer for PathEcho {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn analyze(&self, path: &Path) -> Result<String, ScanError> {
            assert!(path.exists(), "workspace file must exist during analysis");
            self.seen.lock().unwrap().push(path.to_path_buf());
            Ok(format!("{}:1:1: {} finding", path.display(), self.name))
        }
    }

    struct Failing;

    #[async_trait]
    impl StaticAnalyzer for Failing {
        fn name(&self) -> &'static str {
            "ruff"
        }

        async fn analyze(&self, _path: &Path) -> Result<String, ScanError> {
            Err(ScanError::ToolLaunch {
                tool: "ruff",
                program: "ruff".into(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            })
        }
    }

    /// Records whether every path seen so far was already removed.
    struct WorkspaceProbe {
        seen: Arc<Mutex<Vec<PathBuf>>>,
        released: Arc<Mutex<Option<bool>>>,
    }

    #[async_trait]
    impl LlmClient for WorkspaceProbe {
        async fn complete(&self, prompt: &ReviewPrompt) -> Result<String, LlmError> {
            let gone = self.seen.lock().unwrap().iter().all(|p| !p.exists());
            *self.released.lock().unwrap() = Some(gone);
            assert!(prompt.user.contains("```python\nimport os\n```"));
            Ok("- reviewed".into())
        }
    }

    fn echo_service(seen: &Arc<Mutex<Vec<PathBuf>>>, reviewer: LlmReviewer) -> ScanService {
        ScanService::new(
            Arc::new(PathEcho {
                name: "bandit",
                seen: Arc::clone(seen),
            }),
            Arc::new(PathEcho {
                name: "ruff",
                seen: Arc::clone(seen),
            }),
            Arc::new(reviewer),
        )
    }

    fn no_credential() -> LlmReviewer {
        LlmReviewer::unavailable(ReviewFailure::MissingCredential {
            var: "GEMINI_API_KEY".into(),
        })
    }

    #[tokio::test]
    async fn python_runs_both_analyzers_on_same_file() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let service = echo_service(&seen, no_credential());
        let result = service
            .scan(&ScanRequest::new(" Python ", "import os\n"))
            .await
            .unwrap();

        assert_eq!(result.language, "python");
        assert_eq!(result.security_static_analysis, "snippet.py:1:1: bandit finding");
        assert_eq!(result.style_static_analysis, "snippet.py:1:1: ruff finding");
        assert_eq!(
            result.llm_review,
            "LLM review not available: GEMINI_API_KEY environment variable is not set."
        );

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], seen[1]);
        assert!(!seen[0].exists(), "workspace should be released");
    }

    #[tokio::test]
    async fn other_languages_only_get_llm_review() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let service = echo_service(&seen, no_credential());
        let result = service
            .scan(&ScanRequest::new("JavaScript", "console.log(1)"))
            .await
            .unwrap();

        assert_eq!(result.language, "javascript");
        assert_eq!(result.security_static_analysis, "");
        assert_eq!(result.style_static_analysis, "");
        assert!(result.llm_review.starts_with("LLM review not available"));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_language_is_echoed_normalized() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let service = echo_service(&seen, no_credential());
        let result = service
            .scan(&ScanRequest::new("  COBOL ", "DISPLAY 'HI'."))
            .await
            .unwrap();
        assert_eq!(result.language, "cobol");
        assert!(result.security_static_analysis.is_empty());
    }

    #[tokio::test]
    async fn llm_review_runs_after_workspace_release() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let released = Arc::new(Mutex::new(None));
        let reviewer = LlmReviewer::with_client(WorkspaceProbe {
            seen: Arc::clone(&seen),
            released: Arc::clone(&released),
        });
        let service = echo_service(&seen, reviewer);
        let result = service
            .scan(&ScanRequest::new("python", "import os"))
            .await
            .unwrap();

        assert_eq!(result.llm_review, "- reviewed");
        assert_eq!(*released.lock().unwrap(), Some(true));
    }

    #[tokio::test]
    async fn launch_failure_aborts_and_releases_workspace() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let service = ScanService::new(
            Arc::new(PathEcho {
                name: "bandit",
                seen: Arc::clone(&seen),
            }),
            Arc::new(Failing),
            Arc::new(no_credential()),
        );
        let err = service
            .scan(&ScanRequest::new("python", "pass"))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::ToolLaunch { tool: "ruff", .. }));
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(!seen[0].exists());
    }

    #[tokio::test]
    async fn repeated_scans_are_identical_without_llm() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let service = echo_service(&seen, no_credential());
        let request = ScanRequest::new("python", "print('hello world')\n");
        let first = service.scan(&request).await.unwrap();
        let second = service.scan(&request).await.unwrap();
        assert_eq!(first, second);
    }
}
