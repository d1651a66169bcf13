mod config;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use patchguard_core::{
    render_report, CommandAnalyzer, Language, LlmReviewer, McpServer, OutputFormat, ScanRequest,
    ScanService, Scanner, StaticAnalyzer,
};
use tokio::io::{AsyncReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

#[derive(Parser, Debug)]
#[command(
    name = "patchguard",
    author,
    version,
    about = "Code scanning MCP server: bandit, ruff and an LLM security review"
)]
struct Cli {
    /// Optional config file (TOML, YAML or JSON) with [llm] and [tools] sections
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the `scan_code` tool over MCP on stdin/stdout (default)
    Serve,
    /// Scan a single snippet and print the result
    Scan {
        /// Language of the snippet
        #[arg(long, short)]
        language: Language,
        /// Read code from this file instead of stdin
        #[arg(long, short, value_name = "PATH")]
        file: Option<PathBuf>,
        /// Output format
        #[arg(long, value_enum, default_value_t = ReportFormat::Human)]
        format: ReportFormat,
    },
    /// Check that the analyzers launch and report LLM availability
    Health,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Human,
    Json,
    Yaml,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;
    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&config).await?,
        Commands::Scan {
            language,
            file,
            format,
        } => scan(&config, language, file.as_deref(), format).await?,
        Commands::Health => health(&config).await?,
    }
    Ok(())
}

fn build_service(config: &AppConfig) -> Result<ScanService> {
    let reviewer =
        LlmReviewer::from_settings(&config.llm).context("failed to configure LLM reviewer")?;
    Ok(ScanService::with_tools(&config.tools, reviewer))
}

async fn serve(config: &AppConfig) -> Result<()> {
    let server = McpServer::new(build_service(config)?);
    server
        .serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await
}

async fn scan(
    config: &AppConfig,
    language: Language,
    file: Option<&Path>,
    format: ReportFormat,
) -> Result<()> {
    let code = match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("failed to read code from stdin")?;
            buf
        }
    };

    let service = build_service(config)?;
    let result = service
        .scan(&ScanRequest::new(language.as_str(), code))
        .await
        .context("scan failed")?;
    info!(language = %result.language, "scan finished");

    let rendered = match format {
        ReportFormat::Human => render_report(&result, OutputFormat::Human)?,
        ReportFormat::Json => render_report(&result, OutputFormat::Json)?,
        ReportFormat::Yaml => serde_yaml::to_string(&result)?,
    };
    println!("{}", rendered.trim_end());
    Ok(())
}

async fn health(config: &AppConfig) -> Result<()> {
    let analyzers = [
        CommandAnalyzer::bandit(&config.tools.bandit),
        CommandAnalyzer::ruff(&config.tools.ruff),
    ];
    let mut missing = 0usize;
    for analyzer in &analyzers {
        print!("Checking {} (`{}`)... ", analyzer.name(), analyzer.program());
        match analyzer.version().await {
            Ok(version) => {
                let version = version.lines().next().unwrap_or("").trim();
                println!("ok {version}");
            }
            Err(err) => {
                missing += 1;
                println!("missing ({err})");
            }
        }
    }

    let reviewer =
        LlmReviewer::from_settings(&config.llm).context("failed to configure LLM reviewer")?;
    match reviewer.unavailable_reason() {
        None => println!(
            "LLM review: enabled ({} via {})",
            config.llm.model, config.llm.endpoint
        ),
        Some(reason) => println!("{reason}"),
    }

    if missing > 0 {
        bail!("{missing} analyzer(s) could not be launched");
    }
    Ok(())
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tokio=warn"));
    // stdout carries MCP frames and reports; logs go to stderr.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
