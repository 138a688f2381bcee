//! End-to-end analysis: news → article texts → per-article JSON → synthesis.
//!
//! All clients are passed in by the caller; nothing here is global or
//! survives between runs.

use crate::aggregate::Aggregator;
use crate::analysis::Analyzer;
use crate::api::ChatModel;
use crate::config::AppConfig;
use crate::error::PipelineError;
use crate::models::{AnalysisReport, ArticleRef};
use crate::scrapers::article::PageFetcher;
use crate::scrapers::newsapi::NewsSource;
use std::time::Instant;
use tracing::{info, instrument};

pub struct Pipeline<'a, F, M> {
    fetcher: &'a F,
    model: &'a M,
    config: &'a AppConfig,
}

impl<'a, F, M> Pipeline<'a, F, M>
where
    F: PageFetcher,
    M: ChatModel,
{
    pub fn new(fetcher: &'a F, model: &'a M, config: &'a AppConfig) -> Self {
        Self {
            fetcher,
            model,
            config,
        }
    }

    /// Analyze the given articles for `country` and synthesize the results.
    #[instrument(level = "info", skip_all, fields(%country, articles = articles.len()))]
    pub async fn analyze_news_urls(
        &self,
        articles: &[ArticleRef],
        country: &str,
    ) -> Result<AnalysisReport, PipelineError> {
        let t0 = Instant::now();
        let analyses = Analyzer::new(self.fetcher, self.model, self.config)
            .analyze(articles, country)
            .await;
        let report = Aggregator::new(self.model, self.config)
            .aggregate(analyses, country)
            .await?;
        info!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            analyses = report.individual_analyses.len(),
            "Pipeline complete"
        );
        Ok(report)
    }

    /// Pull fresh articles from `news` and run the full analysis on them.
    pub async fn run<N: NewsSource>(
        &self,
        news: &N,
        country: &str,
    ) -> Result<AnalysisReport, PipelineError> {
        let articles = news.get_news_articles().await?;
        self.analyze_news_urls(&articles, country).await
    }
}
