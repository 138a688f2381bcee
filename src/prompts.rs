//! Prompt templates for the two model passes.
//!
//! The per-article prompt asks for one judgment per article; the aggregate
//! prompt asks for a portfolio view across all of them. Both name the
//! exact JSON keys the models in [`crate::models`] deserialize.

use crate::api::ChatRequest;

/// Build the per-article analysis request.
///
/// `article_text` must already be cut to the article budget.
pub fn article_request(country: &str, domain: &str, article_text: &str, temperature: f32) -> ChatRequest {
    let system = format!(
        "You are an AI financial analyst specializing in {country}. \
         Analyze news articles for investment implications without any preamble. \
         Provide only the JSON output with your analysis."
    );
    let user = format!(
        "Analyze this news article from {domain} for investment implications in {country}:\n\n\
         {article_text}\n\n\
         Output JSON format with these keys:\n\
         - source (website domain)\n\
         - key_entities (companies, people, organizations mentioned)\n\
         - sector_impact (dictionary of affected sectors with impact scores 1-10)\n\
         - sentiment_score (-5 to 5)\n\
         - short_term_effects (1-2 sentence summary)\n\
         - long_term_effects (1-2 sentence summary)\n\
         - potential_opportunities (array of specific opportunities)\n\
         - related_risks (array of potential risks)\n\
         - confidence_score (0-1)\n"
    );
    ChatRequest {
        system,
        user,
        temperature,
    }
}

/// Build the synthesis request over `count` serialized analyses.
///
/// `combined` must already be fitted to the aggregate budget.
pub fn aggregate_request(country: &str, count: usize, combined: &str, temperature: f32) -> ChatRequest {
    let system = format!(
        "You are a senior investment strategist analyzing multiple news sources about {country}. \
         Synthesize these individual analyses into comprehensive recommendations. \
         Provide only the JSON output."
    );
    let user = format!(
        "Combine these {count} analyses of {country} news:\n\n\
         {combined}\n\n\
         Output JSON with:\n\
         - top_3_sectors (most impacted sectors with composite scores)\n\
         - emerging_opportunities (array with confidence scores)\n\
         - critical_risks (array with severity scores)\n\
         - recommended_asset_allocation (dictionary by asset class)\n\
         - market_sentiment (overall -1 to 1 score)\n\
         - key_companies_to_watch (array with reasons)\n\
         - time_horizon_guidance (short/medium/long term outlook)\n"
    );
    ChatRequest {
        system,
        user,
        temperature,
    }
}
