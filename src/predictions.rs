//! Per-symbol predictions for an exchange, backed by the analysis pipeline.
//!
//! The AI path is optional: without credentials, or when any stage of the
//! pipeline fails, every symbol gets a randomized mock prediction instead.
//! Callers therefore always receive one prediction per symbol.

use crate::api::ChatModel;
use crate::config::{AppConfig, SymbolMatch};
use crate::models::{AnalysisReport, ArticleAnalysis};
use crate::pipeline::Pipeline;
use crate::scrapers::article::PageFetcher;
use crate::scrapers::newsapi::NewsSource;
use chrono::Local;
use rand::Rng;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};

/// Nairobi Securities Exchange symbols, grouped by sector.
const NSE_SYMBOLS: &[&str] = &[
    // Banking
    "KCB.NR", "EQTY.NR", "SCBK.NR", "COOP.NR", "ABSA.NR", "DTB.NR", "HFCK.NR", "I&M.NR",
    "NCBA.NR", "STANCHART.NR",
    // Telecommunications
    "SAFCOM.NR", "TKL.NR",
    // Energy & utilities
    "KPLC.NR", "KEGN.NR", "KPA.NR", "KENGEN.NR",
    // Manufacturing & consumer goods
    "EABL.NR", "BAT.NR", "UNGA.NR", "CARB.NR", "BAMB.NR", "ARM.NR",
    // Insurance
    "JUB.NR", "CIC.NR", "BRIT.NR", "LIBERTY.NR",
    // Real estate, construction & agriculture
    "HASS.NR", "SASN.NR", "WTK.NR", "TPS.NR", "KAKUZI.NR", "KAPCHORUA.NR", "REA.NR", "LAT.NR",
    // Media & transport
    "NMG.NR", "RVR.NR", "KQ.NR",
    // Investment & financial services
    "KMRC.NR", "KCBG.NR", "EQTYG.NR", "SCBKG.NR", "NSE.NR", "CABL.NR", "DTK.NR",
];

const DEFAULT_SYMBOLS: &[&str] = &["AAPL", "MSFT", "GOOGL"];

/// Symbols tracked for `exchange`.
pub fn exchange_symbols(exchange: &str) -> &'static [&'static str] {
    match exchange {
        "NSE" => NSE_SYMBOLS,
        _ => DEFAULT_SYMBOLS,
    }
}

/// Lowercase country code of the exchange's home market.
pub fn exchange_country(exchange: &str) -> &'static str {
    match exchange {
        "NSE" => "ke",
        "NYSE" | "NASDAQ" => "us",
        "LSE" => "gb",
        "TSE" => "jp",
        "SSE" => "cn",
        _ => "us",
    }
}

/// Full country name for a two-letter code (any case).
pub fn country_name(code: &str) -> &'static str {
    match code.to_ascii_uppercase().as_str() {
        "KE" => "Kenya",
        "US" => "United States",
        "GB" => "United Kingdom",
        "JP" => "Japan",
        "CN" => "China",
        _ => "United States",
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Prediction {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    /// Percentage, 0-100.
    pub confidence: f64,
    pub timestamp: String,
    pub analysis: String,
    pub sector_impact: BTreeMap<String, f64>,
    pub opportunities: Vec<String>,
    pub risks: Vec<String>,
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn timestamp() -> String {
    Local::now().naive_local().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

fn random_price() -> f64 {
    round_to(rand::rng().random_range(100.0..1000.0), 2)
}

/// Placeholder prediction used whenever no analysis covers `symbol`.
pub fn mock_prediction(symbol: &str) -> Prediction {
    let mut rng = rand::rng();
    let sector_impact = ["Technology", "Finance", "Energy"]
        .into_iter()
        .map(|sector| (sector.to_string(), f64::from(rng.random_range(1..=10u8))))
        .collect();
    Prediction {
        symbol: symbol.to_string(),
        price: random_price(),
        change: round_to(rng.random_range(-5.0..5.0), 2),
        confidence: round_to(rng.random_range(70.0..95.0), 1),
        timestamp: timestamp(),
        analysis: "Market analysis temporarily unavailable.".to_string(),
        sector_impact,
        opportunities: vec![
            "Market showing potential for growth".to_string(),
            "Technical indicators suggest positive momentum".to_string(),
        ],
        risks: vec![
            "Market volatility concerns".to_string(),
            "Regulatory changes may impact performance".to_string(),
        ],
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Prediction derived from the analysis that mentions `symbol`.
pub fn ai_prediction(symbol: &str, analysis: &ArticleAnalysis) -> Prediction {
    let text = analysis.short_term_effects.trim();
    Prediction {
        symbol: symbol.to_string(),
        price: random_price(),
        change: round_to(analysis.sentiment_score * 2.0, 2),
        confidence: round_to(analysis.confidence_score * 100.0, 1),
        timestamp: timestamp(),
        analysis: if text.is_empty() {
            "Analysis temporarily unavailable.".to_string()
        } else {
            text.to_string()
        },
        sector_impact: analysis.sector_impact.clone(),
        opportunities: analysis.potential_opportunities.iter().map(value_text).collect(),
        risks: analysis.related_risks.iter().map(value_text).collect(),
    }
}

/// A symbol prepared for matching against entity text.
///
/// Built once per symbol and reused across every analysis in a report.
#[derive(Debug)]
pub enum SymbolMatcher {
    /// Lowercased full symbol.
    Substring(String),
    /// Case-insensitive word-bounded ticker root.
    WholeWord(Regex),
}

impl SymbolMatcher {
    pub fn new(symbol: &str, policy: SymbolMatch) -> Self {
        match policy {
            SymbolMatch::Substring => Self::Substring(symbol.to_lowercase()),
            SymbolMatch::WholeWord => {
                let root = symbol.split('.').next().unwrap_or(symbol);
                match RegexBuilder::new(&format!(r"\b{}\b", regex::escape(root)))
                    .case_insensitive(true)
                    .build()
                {
                    Ok(re) => Self::WholeWord(re),
                    Err(e) => {
                        warn!(symbol, error = %e, "Bad symbol pattern; matching by substring");
                        Self::Substring(symbol.to_lowercase())
                    }
                }
            }
        }
    }

    /// Whether the rendered entity list `entities` mentions the symbol.
    pub fn is_match(&self, entities: &str) -> bool {
        match self {
            Self::Substring(needle) => entities.to_lowercase().contains(needle),
            Self::WholeWord(re) => re.is_match(entities),
        }
    }
}

/// Whether `analysis` mentions `symbol` under the given policy.
pub fn mentions_symbol(analysis: &ArticleAnalysis, symbol: &str, policy: SymbolMatch) -> bool {
    SymbolMatcher::new(symbol, policy).is_match(&analysis.entities_text())
}

/// First analysis in `report` whose entity text mentions the symbol.
///
/// `entities` holds [`ArticleAnalysis::entities_text`] for each analysis, in
/// report order.
pub fn find_analysis<'r>(
    report: &'r AnalysisReport,
    entities: &[String],
    matcher: &SymbolMatcher,
) -> Option<&'r ArticleAnalysis> {
    report
        .individual_analyses
        .iter()
        .zip(entities)
        .find(|(_, text)| matcher.is_match(text))
        .map(|(analysis, _)| analysis)
}

/// Clients needed for the AI path.
pub struct AiBackend<'a, F, M, N> {
    pub fetcher: &'a F,
    pub model: &'a M,
    pub news: &'a N,
}

pub struct PredictionService<'a, F, M, N> {
    backend: Option<AiBackend<'a, F, M, N>>,
    config: &'a AppConfig,
}

impl<'a, F, M, N> PredictionService<'a, F, M, N>
where
    F: PageFetcher,
    M: ChatModel,
    N: NewsSource,
{
    /// `backend` is `None` when the AI path is unavailable (no credentials).
    pub fn new(backend: Option<AiBackend<'a, F, M, N>>, config: &'a AppConfig) -> Self {
        Self { backend, config }
    }

    /// One prediction per symbol of `exchange`.
    ///
    /// `country` is a two-letter code; when absent the exchange's home
    /// market is used. Pipeline failures degrade to mock predictions.
    #[instrument(level = "info", skip(self))]
    pub async fn predict(&self, exchange: &str, country: Option<&str>) -> Vec<Prediction> {
        let code = country.unwrap_or_else(|| exchange_country(exchange));
        let name = country_name(code);
        let symbols = exchange_symbols(exchange);
        let all_mock = || symbols.iter().map(|s| mock_prediction(s)).collect::<Vec<_>>();

        let Some(backend) = &self.backend else {
            warn!("AI model not available; using mock predictions");
            return all_mock();
        };

        let pipeline = Pipeline::new(backend.fetcher, backend.model, self.config);
        let report = match pipeline.run(backend.news, name).await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "Error with AI model; falling back to mock predictions");
                return all_mock();
            }
        };

        let entities: Vec<String> = report
            .individual_analyses
            .iter()
            .map(ArticleAnalysis::entities_text)
            .collect();
        let mut matched = 0usize;
        let predictions: Vec<Prediction> = symbols
            .iter()
            .map(|symbol| {
                let matcher = SymbolMatcher::new(symbol, self.config.symbol_match);
                (symbol, find_analysis(&report, &entities, &matcher))
            })
            .map(|(symbol, found)| match found {
                Some(analysis) => {
                    matched += 1;
                    ai_prediction(symbol, analysis)
                }
                None => mock_prediction(symbol),
            })
            .collect();
        info!(symbols = symbols.len(), matched, country = name, "Built predictions");
        predictions
    }
}
