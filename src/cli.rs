//! Command-line interface definitions for News Signals.
//!
//! Credentials can be provided via command-line flags or environment
//! variables; everything else lives in the optional YAML config file.

use clap::{Parser, Subcommand};

/// Command-line arguments for the News Signals application.
///
/// # Examples
///
/// ```sh
/// # Latest news for the configured query
/// news_signals news
///
/// # Analyze fresh news for Kenya and write the report
/// news_signals analyze --country Kenya -o ./reports
///
/// # Analyze specific articles
/// news_signals analyze --country Kenya --url https://example.com/a --url https://example.com/b
///
/// # Per-symbol predictions for the Nairobi exchange
/// news_signals --config config.yaml predict --exchange NSE
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to config.yaml file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// API key for the OpenAI-compatible model endpoint
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    pub openai_api_key: Option<String>,

    /// Override the model API base URL from the config file
    #[arg(long, env = "OPENAI_BASE_URL", global = true)]
    pub openai_base_url: Option<String>,

    /// NewsAPI key
    #[arg(long, env = "NEWS_API_KEY", hide_env_values = true, global = true)]
    pub news_api_key: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Print the latest articles for the configured query as JSON
    News,

    /// Analyze news articles for investment implications in a country
    Analyze {
        /// Country the analysis is written for
        #[arg(long, default_value = "Kenya")]
        country: String,

        /// Article URL to analyze (repeatable); defaults to fresh news
        #[arg(long = "url")]
        urls: Vec<String>,

        /// Directory for the JSON report; prints to stdout when absent
        #[arg(short, long)]
        output_dir: Option<String>,
    },

    /// Per-symbol predictions for an exchange
    Predict {
        /// Exchange code (NSE, NYSE, NASDAQ, LSE, TSE, SSE)
        #[arg(short, long)]
        exchange: String,

        /// Two-letter country code; defaults to the exchange's market
        #[arg(long)]
        country: Option<String>,

        /// Directory for the JSON output; prints to stdout when absent
        #[arg(short, long)]
        output_dir: Option<String>,
    },
}
