//! Configuration infrastructure
//!
//! Serde-modelled application configuration with a JSON file under the user
//! config directory, created with defaults on first run. Sections mirror the
//! pipeline stages: session, navigation, extraction, analysis, batch, output.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;
use tracing::info;

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub navigation: NavigationConfig,
    pub extraction: ExtractionConfig,
    pub analysis: AnalysisConfig,
    pub batch: BatchConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

/// Session/driver settings for the authenticated automation context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Base URL of the target site.
    pub base_url: String,

    /// Path (relative to `base_url`) of the sign-in page.
    pub login_path: String,

    /// Run the underlying driver without a visible window.
    pub headless: bool,

    pub user_agent: String,

    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,

    /// Request rate cap for respectful crawling.
    pub max_requests_per_second: u32,
}

/// Navigation retry/backoff and block-detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationConfig {
    /// Candidate URL templates tried in order; `{id}` is substituted.
    pub url_templates: Vec<String>,

    /// CSS selectors whose presence means the product page loaded.
    pub loaded_markers: Vec<String>,

    /// Attempts for the initial navigation pass.
    pub max_attempts: u32,

    /// First inter-attempt backoff in seconds.
    pub initial_backoff_secs: f64,

    /// Multiplier applied to the backoff between attempts.
    pub backoff_multiplier: f64,

    /// How much of the page content the block detector inspects.
    pub block_scan_chars: usize,

    /// Attempt budget for the single retry pass after re-login on block.
    pub block_retry_attempts: u32,
}

/// Extraction limits. CSS selector groups live with the extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Upper bound on extracted reviews per product.
    pub max_reviews: usize,
}

/// Analysis adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Hard timeout per LLM call in seconds.
    pub timeout_seconds: u64,

    /// Most reviews fed into the sentiment prompt.
    pub max_sentiment_reviews: usize,

    /// Most reviews fed into the theme prompt.
    pub max_theme_reviews: usize,

    /// Reviews shorter than this are skipped for sentiment analysis.
    pub min_review_chars: usize,

    pub llm: LlmConfig,
}

/// Language-model endpoint settings (Ollama-compatible by default).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
}

/// Batch orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Optional pause between identifiers in seconds (0 disables).
    pub delay_between_items_secs: f64,

    /// Per-item scrape retry ceiling (retries, not attempts).
    pub max_retries: u32,

    /// Counting admission gate for concurrently running jobs.
    pub max_concurrent_jobs: usize,
}

/// Where reports and summaries land.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub directory: PathBuf,
}

/// Logging configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    pub console_output: bool,

    pub file_output: bool,

    /// Module-specific log level filters (e.g., "reqwest": "warn").
    pub module_filters: HashMap<String, String>,
}

/// Default values for all configuration sections.
pub mod defaults {
    pub const BASE_URL: &str = "https://www.amazon.it";
    pub const LOGIN_PATH: &str = "/ap/signin";
    pub const USER_AGENT: &str = "review-agent/0.2 (research)";
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 90;
    pub const MAX_REQUESTS_PER_SECOND: u32 = 2;

    pub const NAV_MAX_ATTEMPTS: u32 = 3;
    pub const NAV_INITIAL_BACKOFF_SECS: f64 = 2.0;
    pub const NAV_BACKOFF_MULTIPLIER: f64 = 1.8;
    pub const NAV_BLOCK_SCAN_CHARS: usize = 2000;
    pub const NAV_BLOCK_RETRY_ATTEMPTS: u32 = 2;

    pub const MAX_REVIEWS: usize = 15;

    pub const ANALYSIS_TIMEOUT_SECONDS: u64 = 60;
    pub const MAX_SENTIMENT_REVIEWS: usize = 8;
    pub const MAX_THEME_REVIEWS: usize = 10;
    pub const MIN_REVIEW_CHARS: usize = 20;

    pub const LLM_BASE_URL: &str = "http://localhost:11434";
    pub const LLM_MODEL: &str = "llama3.1:8b";
    pub const LLM_TEMPERATURE: f64 = 0.2;

    pub const DELAY_BETWEEN_ITEMS_SECS: f64 = 0.0;
    pub const MAX_RETRIES: u32 = 1;
    pub const MAX_CONCURRENT_JOBS: usize = 2;

    pub const OUTPUT_DIRECTORY: &str = "output";
    pub const LOG_LEVEL: &str = "info";
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::BASE_URL.to_string(),
            login_path: defaults::LOGIN_PATH.to_string(),
            headless: true,
            user_agent: defaults::USER_AGENT.to_string(),
            timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
        }
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            url_templates: vec!["/dp/{id}".to_string(), "/gp/product/{id}".to_string()],
            loaded_markers: vec!["#productTitle".to_string(), "#dp-container".to_string()],
            max_attempts: defaults::NAV_MAX_ATTEMPTS,
            initial_backoff_secs: defaults::NAV_INITIAL_BACKOFF_SECS,
            backoff_multiplier: defaults::NAV_BACKOFF_MULTIPLIER,
            block_scan_chars: defaults::NAV_BLOCK_SCAN_CHARS,
            block_retry_attempts: defaults::NAV_BLOCK_RETRY_ATTEMPTS,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_reviews: defaults::MAX_REVIEWS,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: defaults::ANALYSIS_TIMEOUT_SECONDS,
            max_sentiment_reviews: defaults::MAX_SENTIMENT_REVIEWS,
            max_theme_reviews: defaults::MAX_THEME_REVIEWS,
            min_review_chars: defaults::MIN_REVIEW_CHARS,
            llm: LlmConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::LLM_BASE_URL.to_string(),
            model: defaults::LLM_MODEL.to_string(),
            temperature: defaults::LLM_TEMPERATURE,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            delay_between_items_secs: defaults::DELAY_BETWEEN_ITEMS_SECS,
            max_retries: defaults::MAX_RETRIES,
            max_concurrent_jobs: defaults::MAX_CONCURRENT_JOBS,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(defaults::OUTPUT_DIRECTORY),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            console_output: true,
            file_output: false,
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("reqwest".to_string(), "warn".to_string());
                filters.insert("hyper".to_string(), "warn".to_string());
                filters.insert("html5ever".to_string(), "warn".to_string());
                filters
            },
        }
    }
}

/// Configuration manager for loading and saving settings.
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    /// Get the application configuration directory.
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join("review-agent");

        Ok(config_dir)
    }

    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_dir()?.join("review_agent_config.json");
        Ok(Self { config_path })
    }

    /// Manager rooted at an explicit path (used by tests).
    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// Load configuration from file, creating the default on first run.
    pub async fn load_config(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            info!("Configuration file not found, creating default: {:?}", self.config_path);
            let default_config = AppConfig::default();
            self.save_config(&default_config).await?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .context("Failed to read configuration file")?;

        match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => Ok(config),
            Err(parse_error) => {
                tracing::warn!("⚠️  Configuration unreadable ({parse_error}), resetting to default");

                let backup_path = self.config_path.with_extension("json.corrupted");
                if let Err(e) = fs::copy(&self.config_path, &backup_path).await {
                    tracing::warn!("Failed to back up corrupted config: {e}");
                }

                let default_config = AppConfig::default();
                self.save_config(&default_config)
                    .await
                    .context("Failed to save default configuration")?;
                Ok(default_config)
            }
        }
    }

    /// Save configuration to the JSON file, creating directories as needed.
    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create config directory: {parent:?}"))?;
        }

        let content =
            serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;
        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")?;

        Ok(())
    }
}
