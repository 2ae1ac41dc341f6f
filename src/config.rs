use clap::Args;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::services::llm::{ProviderKind, ProviderSettings};

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub database: DatabaseConfig,
    pub compiler: CompilerConfig,
    pub executor: ExecutorConfig,
    pub forecast: ForecastConfig,
    pub logging: LoggingConfig,
}

/// Text-generation provider configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider family: "chat_completions" (OpenAI-compatible) or "gemini"
    pub provider: String,
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f64,
    pub max_output_tokens: u32,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Backend calls per compile request, counting the first attempt
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Server-side statement timeout in seconds
    pub statement_timeout_seconds: u64,
    /// Execution attempts per statement, counting the first
    pub max_execution_attempts: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub default_horizon: usize,
    pub default_window: usize,
    pub default_alpha: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

/// Command line overrides, flattened into the binary's CLI
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<String>,

    /// Database URL (overrides config file)
    #[arg(long, value_name = "URL", global = true)]
    pub database_url: Option<String>,

    /// Provider family (overrides config file)
    #[arg(long, value_name = "PROVIDER", global = true)]
    pub llm_provider: Option<String>,

    /// Model name (overrides config file)
    #[arg(long, value_name = "MODEL", global = true)]
    pub llm_model: Option<String>,

    /// Logging level (overrides config file, e.g. "info,sibyl=debug")
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration with command line, environment variable, and
    /// file support.
    ///
    /// Loading order (priority from highest to lowest):
    /// 1. Command line arguments
    /// 2. Environment variables (prefixed with SIBYL_)
    /// 3. Configuration file (config.toml)
    /// 4. Default values
    pub fn load(overrides: &ConfigOverrides) -> Result<Self, anyhow::Error> {
        let config_path = overrides.config.clone().or_else(Self::find_config_file);
        let mut config = if let Some(config_path) = config_path {
            Self::from_toml(&config_path)?
        } else {
            tracing::warn!("Configuration file not found, using defaults");
            Config::default()
        };

        config.apply_env_overrides();
        config.apply_cli_overrides(overrides);
        config.validate()?;

        Ok(config)
    }

    /// Supported environment variables:
    /// - SIBYL_DATABASE_URL
    /// - SIBYL_LLM_PROVIDER, SIBYL_LLM_API_BASE, SIBYL_LLM_API_KEY,
    ///   SIBYL_LLM_MODEL
    /// - SIBYL_LOG_LEVEL
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("SIBYL_DATABASE_URL") {
            self.database.url = url;
            tracing::info!("Override database.url from env");
        }
        if let Ok(provider) = std::env::var("SIBYL_LLM_PROVIDER") {
            self.llm.provider = provider;
            tracing::info!("Override llm.provider from env: {}", self.llm.provider);
        }
        if let Ok(api_base) = std::env::var("SIBYL_LLM_API_BASE") {
            self.llm.api_base = api_base;
            tracing::info!("Override llm.api_base from env");
        }
        if let Ok(api_key) = std::env::var("SIBYL_LLM_API_KEY") {
            self.llm.api_key = api_key;
            tracing::info!("Override llm.api_key from env");
        }
        if let Ok(model) = std::env::var("SIBYL_LLM_MODEL") {
            self.llm.model = model;
            tracing::info!("Override llm.model from env: {}", self.llm.model);
        }
        if let Ok(level) = std::env::var("SIBYL_LOG_LEVEL") {
            self.logging.level = level;
            tracing::info!("Override logging.level from env: {}", self.logging.level);
        }
    }

    fn apply_cli_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(url) = &overrides.database_url {
            self.database.url = url.clone();
            tracing::info!("Override database.url from CLI");
        }
        if let Some(provider) = &overrides.llm_provider {
            self.llm.provider = provider.clone();
            tracing::info!("Override llm.provider from CLI: {}", self.llm.provider);
        }
        if let Some(model) = &overrides.llm_model {
            self.llm.model = model.clone();
            tracing::info!("Override llm.model from CLI: {}", self.llm.model);
        }
        if let Some(level) = &overrides.log_level {
            self.logging.level = level.clone();
            tracing::info!("Override logging.level from CLI: {}", self.logging.level);
        }
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }
        if ProviderKind::parse(&self.llm.provider).is_none() {
            anyhow::bail!(
                "Unknown llm.provider '{}'; expected chat_completions or gemini",
                self.llm.provider
            );
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            anyhow::bail!("llm.temperature must be in [0, 2]");
        }
        if self.compiler.max_attempts == 0 {
            anyhow::bail!("compiler.max_attempts must be > 0");
        }
        if self.executor.statement_timeout_seconds == 0 {
            anyhow::bail!("executor.statement_timeout_seconds must be > 0");
        }
        if self.executor.max_execution_attempts == 0 {
            anyhow::bail!("executor.max_execution_attempts must be > 0");
        }
        if self.forecast.default_horizon == 0 {
            anyhow::bail!("forecast.default_horizon must be > 0");
        }
        if !(0.0..=1.0).contains(&self.forecast.default_alpha) {
            anyhow::bail!("forecast.default_alpha must be in [0, 1]");
        }
        Ok(())
    }

    /// Resolved provider settings for building a backend
    pub fn provider_settings(&self) -> ProviderSettings {
        // validate() has already checked the provider name
        let kind = ProviderKind::parse(&self.llm.provider).unwrap_or(ProviderKind::ChatCompletions);
        ProviderSettings {
            kind,
            api_base: self.llm.api_base.clone(),
            api_key: self.llm.api_key.clone(),
            model: self.llm.model.clone(),
            timeout_seconds: self.llm.timeout_seconds,
        }
    }

    fn find_config_file() -> Option<String> {
        let possible_paths =
            ["conf/config.toml", "config.toml", "./conf/config.toml", "./config.toml"];
        for path in &possible_paths {
            if Path::new(path).exists() {
                return Some(path.to_string());
            }
        }
        None
    }

    fn from_toml(path: &str) -> Result<Self, anyhow::Error> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "chat_completions".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.1,
            max_output_tokens: 2048,
            timeout_seconds: 120,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: "sqlite://data/sibyl.db".to_string() }
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { statement_timeout_seconds: 10, max_execution_attempts: 3 }
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self { default_horizon: 6, default_window: 3, default_alpha: 0.3 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info,sibyl=debug".to_string(), file: None }
    }
}
