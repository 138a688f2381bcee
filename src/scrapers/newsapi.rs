//! NewsAPI `everything` search adapter.
//!
//! Every call issues a fresh request, so results always reflect the moment
//! of the call. The response body is parsed by [`parse_news_response`],
//! which is kept free of I/O for testing.

use crate::config::AppConfig;
use crate::error::NewsError;
use crate::models::ArticleRef;
use crate::utils::truncate_for_log;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    articles: Option<Vec<NewsApiArticle>>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsApiArticle {
    title: Option<String>,
    source: Option<NewsApiSource>,
    url: Option<String>,
    description: Option<String>,
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewsApiSource {
    name: Option<String>,
}

/// Anything that can list the latest articles worth analyzing.
#[allow(async_fn_in_trait)]
pub trait NewsSource {
    async fn get_news_articles(&self) -> Result<Vec<ArticleRef>, NewsError>;
}

/// Client for the news search endpoint.
#[derive(Clone)]
pub struct NewsApiClient {
    client: Client,
    endpoint: String,
    api_key: String,
    query: String,
    page_size: u8,
}

impl NewsApiClient {
    pub fn new(client: Client, api_key: String, config: &AppConfig) -> Self {
        Self {
            client,
            endpoint: config.news_endpoint.clone(),
            api_key,
            query: config.news_query.clone(),
            page_size: config.effective_page_size(),
        }
    }

    /// Query parameters sent with every search, API key included.
    fn query_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("q", self.query.clone()),
            ("sortBy", "publishedAt".to_string()),
            ("language", "en".to_string()),
            ("pageSize", self.page_size.to_string()),
            ("apiKey", self.api_key.clone()),
        ]
    }
}

impl NewsSource for NewsApiClient {
    /// Fetch the latest articles matching the configured query.
    #[instrument(level = "info", skip_all, fields(query = %self.query))]
    async fn get_news_articles(&self) -> Result<Vec<ArticleRef>, NewsError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&self.query_params())
            .send()
            .await
            .map_err(|e| NewsError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| NewsError::Transport(e.to_string()))?;

        if status != StatusCode::OK {
            warn!(status = status.as_u16(), body = %truncate_for_log(&body, 300), "Failed to fetch news articles");
            return Err(NewsError::Api {
                status: status.as_u16(),
                message: api_message(&body).unwrap_or_else(|| status.to_string()),
            });
        }

        let articles = parse_news_response(&body)?;
        info!(count = articles.len(), "Fetched news articles");
        Ok(articles)
    }
}

fn api_message(body: &str) -> Option<String> {
    serde_json::from_str::<NewsApiResponse>(body)
        .ok()
        .and_then(|r| r.message)
}

/// Turn a NewsAPI response body into article references.
///
/// A missing or empty `articles` list is an empty result, not an error.
/// Entries without a URL cannot be fetched and are skipped.
pub fn parse_news_response(body: &str) -> Result<Vec<ArticleRef>, NewsError> {
    let response: NewsApiResponse =
        serde_json::from_str(body).map_err(|e| NewsError::Parse(e.to_string()))?;

    if response.status == "error" {
        return Err(NewsError::Api {
            status: 200,
            message: response.message.unwrap_or_default(),
        });
    }

    let raw = response.articles.unwrap_or_default();
    if raw.is_empty() {
        info!("No articles found for the given query");
    }

    let articles = raw
        .into_iter()
        .filter_map(|a| {
            let Some(url) = a.url.filter(|u| !u.trim().is_empty()) else {
                debug!(title = ?a.title, "Skipping article without URL");
                return None;
            };
            let mut article = ArticleRef::from_url(url);
            if let Some(name) = a.source.and_then(|s| s.name) {
                article.source = name;
            }
            article.title = a.title;
            article.description = a.description;
            article.published_at = a.published_at;
            Some(article)
        })
        .collect();
    Ok(articles)
}
