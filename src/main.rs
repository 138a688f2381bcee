//! # News Signals
//!
//! Turns financial news into investment signals with an LLM, and serves
//! them as per-symbol predictions for a stock-market dashboard.
//!
//! ## Usage
//!
//! ```sh
//! news_signals analyze --country Kenya -o ./reports
//! news_signals predict --exchange NSE
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Indexing**: ask the news search API for the latest article URLs
//! 2. **Fetching**: download each article and extract its body text
//! 3. **Analysis**: one model call per article, parsed into structured JSON
//! 4. **Aggregation**: one model call combining all analyses for the country
//! 5. **Output**: print or write the report, or map it onto exchange symbols

use clap::Parser;
use reqwest::Client;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod aggregate;
mod analysis;
mod api;
mod cli;
mod config;
mod error;
mod models;
mod outputs;
mod pipeline;
mod predictions;
mod prompts;
mod scrapers;
mod utils;

use api::OpenAiChat;
use cli::{Cli, Command};
use config::AppConfig;
use error::ConfigError;
use models::ArticleRef;
use outputs::json;
use pipeline::Pipeline;
use predictions::{AiBackend, PredictionService};
use scrapers::article::HttpPageFetcher;
use scrapers::newsapi::{NewsApiClient, NewsSource};

fn model_client(args: &Cli, config: &AppConfig) -> Result<OpenAiChat, Box<dyn Error>> {
    let api_key = args
        .openai_api_key
        .clone()
        .ok_or(ConfigError::MissingKey("OPENAI_API_KEY"))?;
    let base = args.openai_base_url.as_deref().unwrap_or(&config.api_base);
    Ok(OpenAiChat::new(
        base,
        api_key,
        config.model.clone(),
        config.model_timeout(),
    )?)
}

fn news_client(args: &Cli, config: &AppConfig) -> Result<NewsApiClient, Box<dyn Error>> {
    let api_key = args
        .news_api_key
        .clone()
        .ok_or(ConfigError::MissingKey("NEWS_API_KEY"))?;
    Ok(NewsApiClient::new(Client::new(), api_key, config))
}

/// Print `value` as pretty JSON, or write it under `output_dir` when given.
async fn emit<T: serde::Serialize>(
    value: &T,
    output_dir: Option<&str>,
    name: &str,
) -> Result<(), Box<dyn Error>> {
    match output_dir {
        Some(dir) => {
            json::write_json(value, dir, name).await?;
        }
        None => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("news_signals starting up");

    let args = Cli::parse();
    debug!(command = ?args.command, config = ?args.config, "Parsed CLI arguments");

    let config = AppConfig::load(args.config.as_deref())?;
    let fetcher = HttpPageFetcher::new(config.page_timeout())?;

    match &args.command {
        Command::News => {
            let news = news_client(&args, &config)?;
            let articles = news.get_news_articles().await?;
            emit(&articles, None, "news").await?;
        }
        Command::Analyze {
            country,
            urls,
            output_dir,
        } => {
            let model = model_client(&args, &config)?;
            let pipeline = Pipeline::new(&fetcher, &model, &config);
            let result = if urls.is_empty() {
                let news = news_client(&args, &config)?;
                pipeline.run(&news, country).await
            } else {
                let articles: Vec<ArticleRef> =
                    urls.iter().map(|u| ArticleRef::from_url(u.as_str())).collect();
                pipeline.analyze_news_urls(&articles, country).await
            };
            let report = result.inspect_err(|e| error!(error = %e, "Analysis failed"))?;
            emit(&report, output_dir.as_deref(), country).await?;
        }
        Command::Predict {
            exchange,
            country,
            output_dir,
        } => {
            let model = model_client(&args, &config).ok();
            let news = news_client(&args, &config).ok();
            let backend = match (&model, &news) {
                (Some(model), Some(news)) => Some(AiBackend {
                    fetcher: &fetcher,
                    model,
                    news,
                }),
                _ => None,
            };
            let service = PredictionService::new(backend, &config);
            let predictions = service.predict(exchange, country.as_deref()).await;
            emit(
                &predictions,
                output_dir.as_deref(),
                &format!("predictions_{exchange}"),
            )
            .await?;
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}
