use std::{path::Path, process::Stdio};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, instrument};

use super::{ScanError, StaticAnalyzer};

pub const BANDIT_TOOL: &str = "bandit";
pub const RUFF_TOOL: &str = "ruff";

/// Program names (or absolute paths) for the external linters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    pub bandit: String,
    pub ruff: String,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            bandit: BANDIT_TOOL.to_string(),
            ruff: RUFF_TOOL.to_string(),
        }
    }
}

/// Runs an external program with fixed arguments followed by the file path.
#[derive(Debug, Clone)]
pub struct CommandAnalyzer {
    tool: &'static str,
    program: String,
    args: Vec<String>,
    postprocess: Option<fn(&str) -> String>,
}

impl CommandAnalyzer {
    pub fn new<I, S>(tool: &'static str, program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tool,
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            postprocess: None,
        }
    }

    /// Security analyzer: `bandit -f txt -q <file>`.
    pub fn bandit(program: impl Into<String>) -> Self {
        let mut analyzer = Self::new(BANDIT_TOOL, program, ["-f", "txt", "-q"]);
        analyzer.postprocess = Some(strip_run_timestamp);
        analyzer
    }

    /// Style analyzer: `ruff check --output-format concise --no-cache <file>`.
    pub fn ruff(program: impl Into<String>) -> Self {
        Self::new(
            RUFF_TOOL,
            program,
            ["check", "--output-format", "concise", "--no-cache"],
        )
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Ask the tool for its version; used by environment diagnostics.
    pub async fn version(&self) -> Result<String, ScanError> {
        let output = Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| self.launch_error(source))?;
        Ok(select_output(
            &String::from_utf8_lossy(&output.stdout),
            &String::from_utf8_lossy(&output.stderr),
        ))
    }

    fn launch_error(&self, source: std::io::Error) -> ScanError {
        ScanError::ToolLaunch {
            tool: self.tool,
            program: self.program.clone(),
            source,
        }
    }
}

#[async_trait]
impl StaticAnalyzer for CommandAnalyzer {
    fn name(&self) -> &'static str {
        self.tool
    }

    #[instrument(skip(self), fields(tool = self.tool))]
    async fn analyze(&self, path: &Path) -> Result<String, ScanError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| self.launch_error(source))?;

        // Linters exit non-zero when they find issues; that is still a report.
        debug!(status = ?output.status.code(), "analyzer finished");

        let report = select_output(
            &String::from_utf8_lossy(&output.stdout),
            &String::from_utf8_lossy(&output.stderr),
        );
        Ok(match self.postprocess {
            Some(postprocess) => postprocess(&report),
            None => report,
        })
    }
}

/// Prefer stdout, fall back to stderr, otherwise empty. Stdout counts as
/// present when it has any bytes at all, even only whitespace.
pub fn select_output(stdout: &str, stderr: &str) -> String {
    if !stdout.is_empty() {
        return stdout.trim().to_string();
    }
    stderr.trim().to_string()
}

/// Drop bandit's `Run started:<timestamp>` header so identical input yields
/// identical reports.
fn strip_run_timestamp(report: &str) -> String {
    report
        .lines()
        .filter(|line| !line.trim_start().starts_with("Run started:"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::workspace::TempWorkspace;

    #[test]
    fn select_output_prefers_stdout() {
        assert_eq!(select_output("  found\n", "warn"), "found");
        assert_eq!(select_output("", "  only stderr \n"), "only stderr");
        assert_eq!(select_output("", ""), "");
    }

    #[test]
    fn whitespace_stdout_does_not_fall_back_to_stderr() {
        assert_eq!(select_output(" \n", "  noisy stderr \n"), "");
    }

    #[test]
    fn strips_bandit_run_header() {
        let raw = "Run started:2025-01-02 10:11:12.131415\n\nTest results:\n>> Issue: [B608:hardcoded_sql_expressions]";
        assert_eq!(
            strip_run_timestamp(raw),
            "Test results:\n>> Issue: [B608:hardcoded_sql_expressions]"
        );
    }

    #[test]
    fn default_tool_settings_use_path_lookup() {
        let settings = ToolSettings::default();
        assert_eq!(settings.bandit, "bandit");
        assert_eq!(settings.ruff, "ruff");
        assert_eq!(CommandAnalyzer::bandit(&settings.bandit).name(), "bandit");
        assert_eq!(CommandAnalyzer::ruff(&settings.ruff).name(), "ruff");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_stdout_and_passes_path_last() {
        let workspace = TempWorkspace::create("print('x')\n", "python").unwrap();
        let analyzer = CommandAnalyzer::new("fake", "sh", ["-c", "cat \"$0\""]);
        let report = analyzer.analyze(workspace.path()).await.unwrap();
        assert_eq!(report, "print('x')");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn falls_back_to_stderr_and_ignores_exit_code() {
        let workspace = TempWorkspace::create("", "python").unwrap();
        let analyzer = CommandAnalyzer::new("fake", "sh", ["-c", "echo 'config error' >&2; exit 2"]);
        let report = analyzer.analyze(workspace.path()).await.unwrap();
        assert_eq!(report, "config error");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn silent_tool_yields_empty_report() {
        let workspace = TempWorkspace::create("", "python").unwrap();
        let analyzer = CommandAnalyzer::new("fake", "sh", ["-c", "exit 1"]);
        assert_eq!(analyzer.analyze(workspace.path()).await.unwrap(), "");
    }

    #[tokio::test]
    async fn missing_binary_is_a_launch_error() {
        let workspace = TempWorkspace::create("", "python").unwrap();
        let analyzer = CommandAnalyzer::bandit("patchguard-definitely-missing-bandit");
        let err = analyzer.analyze(workspace.path()).await.unwrap_err();
        assert!(matches!(
            err,
            ScanError::ToolLaunch { tool: "bandit", ref program, .. }
                if program == "patchguard-definitely-missing-bandit"
        ));
    }
}
