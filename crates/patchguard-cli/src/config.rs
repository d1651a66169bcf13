use std::path::Path;

use anyhow::{Context, Result};
use patchguard_core::{LlmSettings, ToolSettings};
use serde::Deserialize;

/// File-backed configuration. Every section is optional:
///
/// ```toml
/// [llm]
/// provider = "openai"
/// model = "gemini-2.5-flash"
/// temperature = 0.1
///
/// [tools]
/// bandit = "/opt/venv/bin/bandit"
/// ```
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSettings,
    pub tools: ToolSettings,
}

impl AppConfig {
    /// Load the optional config file, then apply `PATCHGUARD_LLM_*`
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) => ::config::Config::builder()
                .add_source(::config::File::from(path))
                .build()
                .with_context(|| format!("failed to read config file {}", path.display()))?
                .try_deserialize::<AppConfig>()
                .with_context(|| format!("invalid config file {}", path.display()))?,
            None => AppConfig::default(),
        };
        let llm = base
            .llm
            .with_env_overrides()
            .context("invalid LLM environment configuration")?;
        Ok(Self {
            llm,
            tools: base.tools,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchguard_core::ProviderKind;
    use std::fs::write;

    #[test]
    fn reads_toml_sections() {
        let file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write(
            file.path(),
            "[llm]\nprovider = \"none\"\nmodel = \"config-model\"\nmax_tokens = 512\n\n[tools]\nruff = \"/opt/ruff\"\n",
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).expect("config should load");
        assert_eq!(config.llm.model, "config-model");
        assert_eq!(config.llm.max_tokens, 512);
        assert_eq!(config.tools.ruff, "/opt/ruff");
        assert_eq!(config.tools.bandit, "bandit");
        if std::env::var("PATCHGUARD_LLM_PROVIDER").is_err() {
            assert_eq!(config.llm.provider, ProviderKind::None);
        }
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/patchguard.toml")))
            .expect_err("missing config should fail");
        assert!(format!("{err:#}").contains("patchguard.toml"));
    }
}
