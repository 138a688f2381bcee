//! Runtime configuration loaded from an optional YAML file.
//!
//! Every field has a default, so an empty file (or no file at all) gives a
//! working setup. Credentials are not stored here; they arrive through the
//! CLI or the environment (see [`crate::cli::Cli`]).
//!
//! # Example
//!
//! ```yaml
//! model: gpt-4-1106-preview
//! article_char_budget: 15000
//! aggregate_char_budget: 20000
//! truncation: whole_entries
//! concurrency: 4
//! symbol_match: whole_word
//! ```

use crate::error::ConfigError;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, instrument};

/// How the aggregator fits the serialized analyses into its character budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TruncationStrategy {
    /// Keep leading analyses that fit whole and drop the rest.
    #[default]
    WholeEntries,
    /// Cut the joined text at the budget, possibly mid-entry.
    Slice,
}

/// How a ticker symbol is matched against an analysis' key entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SymbolMatch {
    /// Case-insensitive substring of the full symbol (e.g. `kq.nr`).
    #[default]
    Substring,
    /// Case-insensitive whole word of the ticker root (e.g. `KQ`).
    WholeWord,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Chat model identifier sent with every completion request.
    pub model: String,
    /// Base URL of the OpenAI-compatible API (without `/chat/completions`).
    pub api_base: String,
    pub article_temperature: f32,
    pub aggregate_temperature: f32,
    /// Maximum characters of article text sent per analysis.
    pub article_char_budget: usize,
    /// Maximum characters of serialized analyses sent to the aggregator.
    pub aggregate_char_budget: usize,
    pub truncation: TruncationStrategy,
    pub page_timeout_secs: u64,
    pub model_timeout_secs: u64,
    /// Articles analyzed at once. `1` processes strictly one after another.
    pub concurrency: usize,
    pub news_endpoint: String,
    pub news_query: String,
    pub news_page_size: u8,
    pub symbol_match: SymbolMatch,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4-1106-preview".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            article_temperature: 0.2,
            aggregate_temperature: 0.3,
            article_char_budget: 15_000,
            aggregate_char_budget: 20_000,
            truncation: TruncationStrategy::default(),
            page_timeout_secs: 10,
            model_timeout_secs: 120,
            concurrency: 4,
            news_endpoint: "https://newsapi.org/v2/everything".to_string(),
            news_query: "Nairobi Stock Exchange OR Kenya OR Nairobi OR Kenyan President OR Trump"
                .to_string(),
            news_page_size: 10,
            symbol_match: SymbolMatch::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `path`, or fall back to defaults when `None`.
    #[instrument(level = "info")]
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            info!("No config file given; using defaults");
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        let config = Self::from_yaml(&raw).map_err(|source| ConfigError::Yaml {
            path: path.to_string(),
            source,
        })?;
        info!(path, model = %config.model, "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    /// Page size requested from the news API; the API contract caps it at 10.
    pub fn effective_page_size(&self) -> u8 {
        self.news_page_size.clamp(1, 10)
    }
}
