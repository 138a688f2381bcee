//! Data models shared by the pipeline stages.
//!
//! - [`ArticleRef`]: one news item to analyze
//! - [`ArticleAnalysis`]: the model's judgment of a single article
//! - [`AggregatedRecommendation`]: the portfolio-level synthesis of a batch
//! - [`AnalysisReport`]: what the pipeline returns for one batch
//!
//! Field names are snake_case because that is the schema the prompts ask
//! the model to produce.

use crate::utils::domain_of;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Metadata identifying one news item.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ArticleRef {
    pub url: String,
    /// Publishing outlet; the URL host when nothing better is known.
    pub source: String,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "publishedAt")]
    pub published_at: Option<String>,
}

impl ArticleRef {
    /// Build a reference from a bare URL, using its host as the source.
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let source = domain_of(&url).unwrap_or_default();
        Self {
            url,
            source,
            title: None,
            description: None,
            published_at: None,
        }
    }

    /// Host of the article URL, falling back to the recorded source name.
    pub fn domain(&self) -> String {
        domain_of(&self.url).unwrap_or_else(|| self.source.clone())
    }
}

/// Model-derived investment judgment about one article.
///
/// Only the two scores are mandatory; anything else the model leaves out,
/// sends as `null` or sends in an unexpected shape takes a lenient reading
/// instead of failing the article.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ArticleAnalysis {
    #[serde(default, deserialize_with = "lenient::text")]
    pub source: String,
    /// Companies, people and organizations. The model may answer with plain
    /// names or with objects, so entries are kept as raw JSON.
    #[serde(default, deserialize_with = "lenient::list")]
    pub key_entities: Vec<Value>,
    /// Sector name to impact score (1-10). Entries without a numeric score
    /// are dropped.
    #[serde(default, deserialize_with = "lenient::scores")]
    pub sector_impact: BTreeMap<String, f64>,
    /// -5 (very negative) to 5 (very positive).
    #[serde(deserialize_with = "lenient::number")]
    pub sentiment_score: f64,
    #[serde(default, deserialize_with = "lenient::text")]
    pub short_term_effects: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub long_term_effects: String,
    #[serde(default, deserialize_with = "lenient::list")]
    pub potential_opportunities: Vec<Value>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub related_risks: Vec<Value>,
    /// 0 to 1.
    #[serde(deserialize_with = "lenient::number")]
    pub confidence_score: f64,
    /// Always the URL the article was fetched from, whatever the model said.
    #[serde(default, deserialize_with = "lenient::text")]
    pub url: String,
}

impl ArticleAnalysis {
    /// Clamp scores into their documented ranges and stamp the origin.
    pub fn normalize(mut self, article: &ArticleRef) -> Self {
        self.url = article.url.clone();
        if self.source.trim().is_empty() {
            self.source = article.domain();
        }
        self.sentiment_score = self.sentiment_score.clamp(-5.0, 5.0);
        self.confidence_score = self.confidence_score.clamp(0.0, 1.0);
        for score in self.sector_impact.values_mut() {
            *score = score.clamp(1.0, 10.0);
        }
        self
    }

    /// The entity list rendered as one JSON string, for symbol lookups.
    pub fn entities_text(&self) -> String {
        serde_json::to_string(&self.key_entities).unwrap_or_default()
    }
}

/// Portfolio-level synthesis of every analysis in a batch.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AggregatedRecommendation {
    /// Most impacted sectors with composite scores.
    #[serde(default)]
    pub top_3_sectors: Value,
    #[serde(default, deserialize_with = "lenient::list")]
    pub emerging_opportunities: Vec<Value>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub critical_risks: Vec<Value>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub recommended_asset_allocation: BTreeMap<String, Value>,
    /// -1 to 1.
    #[serde(deserialize_with = "lenient::number")]
    pub market_sentiment: f64,
    #[serde(default, deserialize_with = "lenient::list")]
    pub key_companies_to_watch: Vec<Value>,
    /// Short, medium and long term outlook; free-form.
    #[serde(default)]
    pub time_horizon_guidance: Value,
}

impl AggregatedRecommendation {
    pub fn normalize(mut self) -> Self {
        self.market_sentiment = self.market_sentiment.clamp(-1.0, 1.0);
        self
    }
}

/// Field readers for model output, which follows the requested schema only
/// loosely.
mod lenient {
    use serde::Deserialize;
    use serde::de::{Deserializer, Error};
    use serde_json::{Map, Value};
    use std::collections::BTreeMap;

    /// A number, or a string holding one (`"0.3"`).
    pub fn as_number(value: &Value) -> Option<f64> {
        let n = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }?;
        n.is_finite().then_some(n)
    }

    pub fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        let value = Value::deserialize(deserializer)?;
        as_number(&value)
            .ok_or_else(|| D::Error::custom(format!("expected a number, found {value}")))
    }

    /// `null` is empty, a list of strings is joined, anything else is kept as JSON text.
    pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Null => String::new(),
            Value::String(s) => s,
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(" "),
            other => other.to_string(),
        })
    }

    /// `null` is empty and a lone value becomes a one-element list.
    pub fn list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Value>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Null => Vec::new(),
            Value::Array(items) => items,
            other => vec![other],
        })
    }

    pub fn object<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, Value>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Object(map) => map.into_iter().collect(),
            _ => BTreeMap::new(),
        })
    }

    pub fn scores<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, f64>, D::Error> {
        let map = match Value::deserialize(deserializer)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Ok(map
            .into_iter()
            .filter_map(|(sector, score)| as_number(&score).map(|n| (sector, n)))
            .collect())
    }
}

/// Result of one pipeline run: the inputs kept for traceability plus the synthesis.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AnalysisReport {
    pub individual_analyses: Vec<ArticleAnalysis>,
    pub aggregated_recommendations: AggregatedRecommendation,
}
