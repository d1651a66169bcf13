use std::fmt::Write;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::scanner::ScanResult;

/// Format styles supported by the default renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
    Security,
    Style,
}

/// One finding pulled out of an analyzer's text report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub tool: &'static str,
    pub kind: IssueKind,
    pub severity: String,
    pub id: String,
    pub line: Option<u32>,
    pub message: String,
}

static BANDIT_ISSUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^>> Issue: \[(?P<id>[A-Z]+\d+)(?::[^\]]*)?\]\s*(?P<message>.*)$")
        .expect("valid bandit issue regex")
});
static BANDIT_SEVERITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*Severity:\s*(?P<severity>\w+)").expect("valid severity regex"));
static BANDIT_LOCATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*Location:\s*.+?:(?P<line>\d+)(?::\d+)?\s*$").expect("valid location regex")
});
static RUFF_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[^:\n]+:(?P<line>\d+):\d+: (?P<code>[A-Za-z][A-Za-z0-9-]*):? (?:\[\*\] )?(?P<message>.+)$",
    )
    .expect("valid ruff regex")
});

/// Parse bandit's `txt` report into issues.
pub fn parse_bandit(report: &str) -> Vec<Issue> {
    let mut issues: Vec<Issue> = Vec::new();
    for line in report.lines() {
        if let Some(caps) = BANDIT_ISSUE.captures(line) {
            issues.push(Issue {
                tool: "bandit",
                kind: IssueKind::Security,
                severity: "undefined".into(),
                id: caps["id"].to_string(),
                line: None,
                message: caps["message"].trim().to_string(),
            });
            continue;
        }
        let Some(current) = issues.last_mut() else {
            continue;
        };
        if let Some(caps) = BANDIT_SEVERITY.captures(line) {
            current.severity = caps["severity"].to_lowercase();
        } else if let Some(caps) = BANDIT_LOCATION.captures(line) {
            current.line = caps["line"].parse().ok();
        }
    }
    issues
}

/// Parse ruff's `concise` report into issues.
pub fn parse_ruff(report: &str) -> Vec<Issue> {
    report
        .lines()
        .filter_map(|line| RUFF_LINE.captures(line.trim_end()))
        .map(|caps| {
            let id = caps["code"].to_string();
            let severity = if id.to_ascii_lowercase().contains("syntax") {
                "error"
            } else {
                "warning"
            };
            Issue {
                tool: "ruff",
                kind: IssueKind::Style,
                severity: severity.into(),
                id,
                line: caps["line"].parse().ok(),
                message: caps["message"].trim().to_string(),
            }
        })
        .collect()
}

/// All issues in a result, security first.
pub fn parse_issues(result: &ScanResult) -> Vec<Issue> {
    let mut issues = parse_bandit(&result.security_static_analysis);
    issues.extend(parse_ruff(&result.style_static_analysis));
    issues
}

pub fn summarize(issues: &[Issue]) -> String {
    let security = issues
        .iter()
        .filter(|issue| issue.kind == IssueKind::Security)
        .count();
    let style = issues.len() - security;
    format!("{security} security issue(s), {style} style issue(s)")
}

/// Produce a report string from a `ScanResult` using the desired format.
pub fn render_report(result: &ScanResult, format: OutputFormat) -> anyhow::Result<String> {
    let issues = parse_issues(result);
    match format {
        OutputFormat::Human => render_human(result, &issues),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&JsonReport {
            result,
            summary: summarize(&issues),
            issues: &issues,
        })?),
    }
}

fn render_human(result: &ScanResult, issues: &[Issue]) -> anyhow::Result<String> {
    let mut out = String::new();
    writeln!(out, "Language: {}", result.language)?;
    writeln!(out, "Summary: {}", summarize(issues))?;
    writeln!(out)?;

    if issues.is_empty() {
        let raw = [
            ("Security analysis", &result.security_static_analysis),
            ("Style analysis", &result.style_static_analysis),
        ];
        if raw.iter().all(|(_, text)| text.trim().is_empty()) {
            writeln!(out, "No static analysis findings.")?;
        }
        // Reports that did not parse (tool errors, unexpected formats) are shown as-is.
        for (title, text) in raw.iter().filter(|(_, text)| !text.trim().is_empty()) {
            writeln!(out, "{title}:")?;
            for line in text.lines() {
                writeln!(out, "  {line}")?;
            }
        }
    } else {
        for issue in issues {
            let line = issue
                .line
                .map(|l| l.to_string())
                .unwrap_or_else(|| "?".into());
            writeln!(
                out,
                "[{tool}] {kind} {severity} {id} at line {line}: {message}",
                tool = issue.tool,
                kind = match issue.kind {
                    IssueKind::Security => "SECURITY",
                    IssueKind::Style => "STYLE",
                },
                severity = issue.severity,
                id = issue.id,
                message = issue.message,
            )?;
        }
    }

    writeln!(out)?;
    writeln!(out, "LLM Review:")?;
    for line in result.llm_review.lines() {
        writeln!(out, "  {line}")?;
    }
    Ok(out)
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    result: &'a ScanResult,
    summary: String,
    issues: &'a [Issue],
}
