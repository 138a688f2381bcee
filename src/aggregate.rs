//! Portfolio-level synthesis across a batch of article analyses.
//!
//! Unlike the per-article pass, a failure here is fatal for the batch:
//! there is no partial recommendation to fall back on. The serialized
//! analyses are fitted to a character budget before the single model call;
//! see [`TruncationStrategy`] for how the tail is handled.

use crate::api::ChatModel;
use crate::config::{AppConfig, TruncationStrategy};
use crate::error::{AnalysisError, PipelineError};
use crate::models::{AggregatedRecommendation, AnalysisReport, ArticleAnalysis};
use crate::prompts;
use crate::utils::{truncate_chars, truncate_for_log};
use serde_json::Value;
use tracing::{error, info, instrument, warn};

const SEPARATOR: &str = "\n\n";

/// The combined analyses text sent to the model, plus what made it in.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedBatch {
    pub text: String,
    /// Entries present in `text`, whole or cut.
    pub included: usize,
    /// Entries left out entirely.
    pub dropped: usize,
}

/// Serialize `analyses` and fit them into `budget` characters.
///
/// With [`TruncationStrategy::WholeEntries`] only complete entries are kept,
/// except that the first entry is always sent, cut if it alone is too long.
/// With [`TruncationStrategy::Slice`] the joined text is cut at the budget.
pub fn fit_to_budget(
    analyses: &[ArticleAnalysis],
    budget: usize,
    strategy: TruncationStrategy,
) -> FittedBatch {
    let entries: Vec<String> = analyses
        .iter()
        .filter_map(|a| serde_json::to_string(a).ok())
        .collect();

    match strategy {
        TruncationStrategy::WholeEntries => {
            let mut text = String::new();
            let mut used = 0usize;
            let mut included = 0usize;
            for entry in &entries {
                let sep = if included == 0 { 0 } else { SEPARATOR.len() };
                let len = entry.chars().count();
                if used + sep + len > budget {
                    if included == 0 {
                        text.push_str(truncate_chars(entry, budget));
                        included = 1;
                    }
                    break;
                }
                if sep > 0 {
                    text.push_str(SEPARATOR);
                }
                text.push_str(entry);
                used += sep + len;
                included += 1;
            }
            FittedBatch {
                text,
                included,
                dropped: entries.len() - included,
            }
        }
        TruncationStrategy::Slice => {
            let joined = entries.join(SEPARATOR);
            let text = truncate_chars(&joined, budget).to_string();
            let mut offset = 0usize;
            let mut included = 0usize;
            for entry in &entries {
                if offset >= budget {
                    break;
                }
                included += 1;
                offset += entry.chars().count() + SEPARATOR.len();
            }
            FittedBatch {
                text,
                included,
                dropped: entries.len() - included,
            }
        }
    }
}

/// Parse the synthesis answer. Any failure here fails the batch.
pub fn parse_recommendation(raw: &str) -> Result<AggregatedRecommendation, AnalysisError> {
    let value: Value = serde_json::from_str(raw).map_err(AnalysisError::Parse)?;
    if !value.is_object() {
        return Err(AnalysisError::Schema("expected a JSON object".to_string()));
    }
    let recommendation: AggregatedRecommendation =
        serde_json::from_value(value).map_err(|e| AnalysisError::Schema(e.to_string()))?;
    Ok(recommendation.normalize())
}

/// Runs the synthesis pass with an injected model client.
pub struct Aggregator<'a, M> {
    model: &'a M,
    char_budget: usize,
    temperature: f32,
    strategy: TruncationStrategy,
}

impl<'a, M: ChatModel> Aggregator<'a, M> {
    pub fn new(model: &'a M, config: &AppConfig) -> Self {
        Self {
            model,
            char_budget: config.aggregate_char_budget,
            temperature: config.aggregate_temperature,
            strategy: config.truncation,
        }
    }

    /// Combine `analyses` into one recommendation for `country`.
    ///
    /// An empty batch fails with [`PipelineError::NoData`] before any model
    /// call. The returned report keeps every input analysis, including ones
    /// the budget kept out of the prompt.
    #[instrument(level = "info", skip_all, fields(%country, analyses = analyses.len()))]
    pub async fn aggregate(
        &self,
        analyses: Vec<ArticleAnalysis>,
        country: &str,
    ) -> Result<AnalysisReport, PipelineError> {
        if analyses.is_empty() {
            warn!("No analyses to aggregate");
            return Err(PipelineError::NoData);
        }

        let batch = fit_to_budget(&analyses, self.char_budget, self.strategy);
        if batch.dropped > 0 {
            warn!(
                dropped = batch.dropped,
                included = batch.included,
                budget = self.char_budget,
                "Aggregate budget exceeded; trailing analyses left out of the prompt"
            );
        }

        let request =
            prompts::aggregate_request(country, batch.included, &batch.text, self.temperature);
        let raw = self.model.complete(&request).await.map_err(|e| {
            error!(error = %e, "Aggregation model call failed");
            PipelineError::AggregationFailed(e.into())
        })?;

        let recommendation = parse_recommendation(&raw).map_err(|e| {
            error!(
                error = %e,
                response_preview = %truncate_for_log(&raw, 300),
                "Aggregation returned non-conforming JSON"
            );
            PipelineError::AggregationFailed(e)
        })?;

        info!(
            market_sentiment = recommendation.market_sentiment,
            "Aggregated recommendations"
        );
        Ok(AnalysisReport {
            individual_analyses: analyses,
            aggregated_recommendations: recommendation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::tests::analysis_json;
    use crate::api::tests::FakeModel;
    use crate::error::ModelError;
    use crate::models::ArticleRef;

    fn analyses(n: usize) -> Vec<ArticleAnalysis> {
        (0..n)
            .map(|i| {
                let raw = analysis_json(&["KCB"], 1.0);
                let article = ArticleRef::from_url(format!("https://a.example/{i}"));
                crate::analysis::parse_analysis(&raw, &article).unwrap()
            })
            .collect()
    }

    fn recommendation_json() -> String {
        serde_json::json!({
            "top_3_sectors": [{"sector": "Banking", "score": 8}],
            "emerging_opportunities": [{"opportunity": "Digital lending", "confidence": 0.7}],
            "critical_risks": [{"risk": "Currency", "severity": 6}],
            "recommended_asset_allocation": {"equities": "50%", "bonds": "30%", "cash": "20%"},
            "market_sentiment": 0.4,
            "key_companies_to_watch": [{"company": "KCB Group", "reason": "Earnings"}],
            "time_horizon_guidance": {"short": "cautious", "medium": "neutral", "long": "bullish"}
        })
        .to_string()
    }

    fn entry_len() -> usize {
        serde_json::to_string(&analyses(1)[0]).unwrap().chars().count()
    }

    #[test]
    fn test_whole_entries_fit_under_budget() {
        let batch = fit_to_budget(&analyses(3), 100_000, TruncationStrategy::WholeEntries);
        assert_eq!(batch.included, 3);
        assert_eq!(batch.dropped, 0);
        assert_eq!(batch.text.matches(SEPARATOR).count(), 2);
    }

    #[test]
    fn test_whole_entries_drop_tail() {
        let len = entry_len();
        let budget = 2 * len + SEPARATOR.len() + len / 2;
        let batch = fit_to_budget(&analyses(4), budget, TruncationStrategy::WholeEntries);
        assert_eq!(batch.included, 2);
        assert_eq!(batch.dropped, 2);
        for part in batch.text.split(SEPARATOR) {
            assert!(serde_json::from_str::<Value>(part).is_ok());
        }
    }

    #[test]
    fn test_whole_entries_always_send_first_entry() {
        let batch = fit_to_budget(&analyses(2), 20, TruncationStrategy::WholeEntries);
        assert_eq!(batch.included, 1);
        assert_eq!(batch.dropped, 1);
        assert_eq!(batch.text.chars().count(), 20);
    }

    #[test]
    fn test_slice_cuts_mid_entry() {
        let len = entry_len();
        let budget = len + SEPARATOR.len() + 10;
        let batch = fit_to_budget(&analyses(3), budget, TruncationStrategy::Slice);
        assert_eq!(batch.text.chars().count(), budget);
        assert_eq!(batch.included, 2);
        assert_eq!(batch.dropped, 1);
    }

    #[test]
    fn test_parse_recommendation() {
        let rec = parse_recommendation(&recommendation_json()).unwrap();
        assert_eq!(rec.market_sentiment, 0.4);
        assert_eq!(rec.recommended_asset_allocation.len(), 3);
        assert!(matches!(
            parse_recommendation("```json\n{}\n```"),
            Err(AnalysisError::Parse(_))
        ));
        assert!(matches!(
            parse_recommendation(r#"{"top_3_sectors": []}"#),
            Err(AnalysisError::Schema(_))
        ));
    }

    #[tokio::test]
    async fn test_string_sentiment_synthesis_succeeds() {
        let answer = serde_json::json!({
            "top_3_sectors": null,
            "market_sentiment": "0.3",
            "key_companies_to_watch": null
        })
        .to_string();
        let model = FakeModel::answering(vec![Ok(answer)]);
        let config = AppConfig::default();
        let aggregator = Aggregator::new(&model, &config);

        let report = aggregator.aggregate(analyses(2), "Kenya").await.unwrap();

        assert_eq!(report.aggregated_recommendations.market_sentiment, 0.3);
        assert!(report.aggregated_recommendations.key_companies_to_watch.is_empty());
        assert_eq!(report.individual_analyses.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_batch_is_no_data_without_model_call() {
        let model = FakeModel::default();
        let config = AppConfig::default();
        let aggregator = Aggregator::new(&model, &config);

        let err = aggregator.aggregate(Vec::new(), "Kenya").await.unwrap_err();

        assert!(matches!(err, PipelineError::NoData));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_aggregate_keeps_all_individual_analyses() {
        let model = FakeModel::answering(vec![Ok(recommendation_json())]);
        let config = AppConfig {
            aggregate_char_budget: entry_len() + 1,
            ..AppConfig::default()
        };
        let aggregator = Aggregator::new(&model, &config);

        let report = aggregator.aggregate(analyses(3), "Kenya").await.unwrap();

        assert_eq!(report.individual_analyses.len(), 3);
        assert_eq!(report.aggregated_recommendations.market_sentiment, 0.4);
        let requests = model.requests.lock().unwrap();
        assert!(requests[0].user.starts_with("Combine these 1 analyses of Kenya news:"));
        assert!((requests[0].temperature - 0.3).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_malformed_synthesis_is_aggregation_failed() {
        let model = FakeModel::answering(vec![Ok("I cannot help with that.".to_string())]);
        let config = AppConfig::default();
        let aggregator = Aggregator::new(&model, &config);

        let err = aggregator.aggregate(analyses(2), "Kenya").await.unwrap_err();

        assert!(matches!(
            err,
            PipelineError::AggregationFailed(AnalysisError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_model_failure_is_aggregation_failed() {
        let model = FakeModel::answering(vec![Err(ModelError::Api {
            status: 429,
            message: "rate limited".to_string(),
        })]);
        let config = AppConfig::default();
        let aggregator = Aggregator::new(&model, &config);

        let err = aggregator.aggregate(analyses(1), "Kenya").await.unwrap_err();

        assert!(matches!(
            err,
            PipelineError::AggregationFailed(AnalysisError::Model(ModelError::Api { status: 429, .. }))
        ));
    }
}
