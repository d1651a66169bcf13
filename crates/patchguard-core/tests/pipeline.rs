use std::collections::HashMap;

use patchguard_core::{
    parse_issues, LlmReviewer, LlmSettings, ScanRequest, ScanService, Scanner, ToolSettings,
};

const INSECURE_QUERY: &str = r#"
import sqlite3

def run_query(user_input):
    conn = sqlite3.connect("db.sqlite")
    cur = conn.cursor()
    # INTENTIONALLY INSECURE: SQL injection
    query = f"SELECT * FROM users WHERE name = '{user_input}'"
    cur.execute(query)
"#;

const NO_CREDENTIAL: &str =
    "LLM review not available: GEMINI_API_KEY environment variable is not set.";

fn service() -> ScanService {
    let reviewer = LlmReviewer::from_settings_with_vars(&LlmSettings::default(), &HashMap::new())
        .expect("reviewer without credential");
    ScanService::with_tools(&ToolSettings::default(), reviewer)
}

#[tokio::test(flavor = "current_thread")]
async fn non_python_skips_static_tools() {
    let result = service()
        .scan(&ScanRequest::new("typescript", "const x: any = eval(input);"))
        .await
        .expect("no external tool is needed for typescript");
    assert_eq!(result.language, "typescript");
    assert_eq!(result.security_static_analysis, "");
    assert_eq!(result.style_static_analysis, "");
    assert_eq!(result.llm_review, NO_CREDENTIAL);
}

#[tokio::test(flavor = "current_thread")]
async fn missing_tools_abort_the_scan() {
    let tools = ToolSettings {
        bandit: "patchguard-missing-bandit".into(),
        ruff: "patchguard-missing-ruff".into(),
    };
    let reviewer = LlmReviewer::from_settings_with_vars(&LlmSettings::default(), &HashMap::new())
        .unwrap();
    let err = ScanService::with_tools(&tools, reviewer)
        .scan(&ScanRequest::new("python", "print(1)\n"))
        .await
        .expect_err("missing bandit is fatal");
    assert!(err.to_string().contains("patchguard-missing-bandit"));
}

#[tokio::test(flavor = "current_thread")]
#[ignore = "requires bandit and ruff on PATH"]
async fn clean_code_yields_string_fields() {
    let result = service()
        .scan(&ScanRequest::new("python", "print('hello world')\n"))
        .await
        .expect("scan should succeed");
    assert_eq!(result.language, "python");
    assert!(!result.security_static_analysis.contains("Issue:"));
    assert_eq!(result.llm_review, NO_CREDENTIAL);
}

#[tokio::test(flavor = "current_thread")]
#[ignore = "requires bandit and ruff on PATH"]
async fn detects_sql_injection() {
    let result = service()
        .scan(&ScanRequest::new("python", INSECURE_QUERY))
        .await
        .expect("scan should succeed");
    let report = &result.security_static_analysis;
    assert!(!report.is_empty());
    assert!(report.contains("B608") || report.contains("SQL injection"));
    assert!(parse_issues(&result).iter().any(|issue| issue.id == "B608"));
}

#[tokio::test(flavor = "current_thread")]
#[ignore = "requires bandit and ruff on PATH"]
async fn reports_never_leak_workspace_paths() {
    let result = service()
        .scan(&ScanRequest::new("python", "import os\nimport subprocess\nsubprocess.call('ls', shell=True)\n"))
        .await
        .expect("scan should succeed");
    let temp = std::env::temp_dir().display().to_string();
    for report in [&result.security_static_analysis, &result.style_static_analysis] {
        assert!(!report.contains("patchguard-"), "leaked workspace in {report}");
        assert!(!report.contains(&format!("{temp}/")), "leaked temp dir in {report}");
    }
    assert!(result.style_static_analysis.contains("snippet.py"));
}

#[tokio::test(flavor = "current_thread")]
#[ignore = "requires bandit and ruff on PATH"]
async fn static_fields_are_idempotent() {
    let service = service();
    let request = ScanRequest::new("python", INSECURE_QUERY);
    let first = service.scan(&request).await.unwrap();
    let second = service.scan(&request).await.unwrap();
    assert_eq!(first.security_static_analysis, second.security_static_analysis);
    assert_eq!(first.style_static_analysis, second.style_static_analysis);
}
