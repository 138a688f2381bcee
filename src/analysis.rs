//! Per-article analysis pass.
//!
//! Each article is fetched, cut to the article budget and sent to the model
//! on its own. Anything that goes wrong for one article (unreachable page,
//! empty text, model error, unusable JSON) drops that article from the batch
//! and is logged; the batch itself always succeeds.

use crate::api::ChatModel;
use crate::config::AppConfig;
use crate::error::AnalysisError;
use crate::models::{ArticleAnalysis, ArticleRef};
use crate::prompts;
use crate::scrapers::article::{PageFetcher, extract_text};
use crate::utils::{looks_truncated, truncate_chars, truncate_for_log};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

/// Parse one model answer into an [`ArticleAnalysis`] for `article`.
///
/// Non-JSON output is a [`AnalysisError::Parse`]; JSON of the wrong shape is
/// a [`AnalysisError::Schema`]. The result always carries `article.url`.
pub fn parse_analysis(raw: &str, article: &ArticleRef) -> Result<ArticleAnalysis, AnalysisError> {
    let value: Value = serde_json::from_str(raw).map_err(AnalysisError::Parse)?;
    if !value.is_object() {
        return Err(AnalysisError::Schema("expected a JSON object".to_string()));
    }
    let analysis: ArticleAnalysis =
        serde_json::from_value(value).map_err(|e| AnalysisError::Schema(e.to_string()))?;
    Ok(analysis.normalize(article))
}

/// Runs the per-article pass with injected page and model clients.
pub struct Analyzer<'a, F, M> {
    fetcher: &'a F,
    model: &'a M,
    char_budget: usize,
    temperature: f32,
    concurrency: usize,
}

impl<'a, F, M> Analyzer<'a, F, M>
where
    F: PageFetcher,
    M: ChatModel,
{
    pub fn new(fetcher: &'a F, model: &'a M, config: &AppConfig) -> Self {
        Self {
            fetcher,
            model,
            char_budget: config.article_char_budget,
            temperature: config.article_temperature,
            concurrency: config.concurrency.max(1),
        }
    }

    /// Analyze `articles` for investment implications in `country`.
    ///
    /// Up to `concurrency` articles are in flight at once, but results keep
    /// the input order. Failed articles are simply absent.
    #[instrument(level = "info", skip_all, fields(%country, articles = articles.len()))]
    pub async fn analyze(&self, articles: &[ArticleRef], country: &str) -> Vec<ArticleAnalysis> {
        let results: Vec<Option<ArticleAnalysis>> = stream::iter(articles.iter().enumerate())
            .map(|(index, article)| self.analyze_one(index, article, country))
            .buffered(self.concurrency)
            .collect()
            .await;

        let analyses: Vec<ArticleAnalysis> = results.into_iter().flatten().collect();
        info!(
            total = articles.len(),
            successful = analyses.len(),
            failed = articles.len() - analyses.len(),
            "Completed per-article analysis"
        );
        analyses
    }

    async fn analyze_one(
        &self,
        index: usize,
        article: &ArticleRef,
        country: &str,
    ) -> Option<ArticleAnalysis> {
        let text = extract_text(self.fetcher, &article.url).await?;
        if text.trim().is_empty() {
            warn!(index, url = %article.url, "No article text extracted; skipping article");
            return None;
        }

        let budgeted = truncate_chars(&text, self.char_budget);
        if budgeted.len() < text.len() {
            debug!(index, budget = self.char_budget, "Article text truncated to budget");
        }

        let request =
            prompts::article_request(country, &article.domain(), budgeted, self.temperature);
        let raw = match self.model.complete(&request).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(index, url = %article.url, error = %e, "Model call failed; skipping article");
                return None;
            }
        };

        match parse_analysis(&raw, article) {
            Ok(analysis) => {
                info!(index, url = %article.url, "Successfully analyzed article");
                Some(analysis)
            }
            Err(AnalysisError::Parse(e)) if looks_truncated(&e) => {
                warn!(index, url = %article.url, error = %e, "Model output cut off; skipping article");
                None
            }
            Err(e) => {
                warn!(
                    index,
                    url = %article.url,
                    error = %e,
                    response_preview = %truncate_for_log(&raw, 300),
                    "Model returned non-conforming JSON; skipping article"
                );
                None
            }
        }
    }
}
