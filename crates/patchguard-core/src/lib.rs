pub mod llm;
pub mod mcp;
pub mod report;
pub mod scanner;

pub use llm::{LlmClient, LlmError, LlmReviewer, LlmSettings, ProviderKind, ReviewFailure};
pub use mcp::McpServer;
pub use report::{parse_issues, render_report, Issue, IssueKind, OutputFormat};
pub use scanner::{
    analyzers::{CommandAnalyzer, ToolSettings},
    service::ScanService,
    workspace::TempWorkspace,
    Language, ScanError, ScanRequest, ScanResult, Scanner, StaticAnalyzer,
};
