//! Error types for the news signal pipeline.
//!
//! Each stage owns its error enum so callers can tell a transport problem
//! from a model that answered with something unusable. Only
//! [`PipelineError`] ever reaches the prediction layer, and even that is
//! absorbed there by falling back to mock data.

use thiserror::Error;

/// Errors raised while retrieving an article page.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request could not be sent or the body could not be read.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// The request exceeded the page timeout.
    #[error("request timed out")]
    Timeout,
}

/// Errors raised by the news search adapter.
#[derive(Debug, Error)]
pub enum NewsError {
    /// HTTP request failed
    #[error("request failed: {0}")]
    Transport(String),

    /// API returned an error response
    #[error("news API error (status {status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message from API
        message: String,
    },

    /// Failed to parse API response
    #[error("parse error: {0}")]
    Parse(String),
}

/// Errors raised by a [`crate::api::ChatModel`] implementation.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model request failed: {0}")]
    Transport(String),

    #[error("model API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The completion carried no message content.
    #[error("model returned no content")]
    EmptyResponse,

    #[error("model call timed out after {0}s")]
    Timeout(u64),
}

/// Per-article analysis failures. These never abort a batch.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The model output was not JSON at all.
    #[error("model output is not valid JSON: {0}")]
    Parse(#[source] serde_json::Error),

    /// The model output was JSON but did not match the expected schema.
    #[error("model output does not match the schema: {0}")]
    Schema(String),
}

/// Batch-level failures of the analysis pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Nothing survived the per-article pass, so there is nothing to aggregate.
    #[error("no article analyses to aggregate")]
    NoData,

    /// The synthesis call failed or returned an unusable answer.
    #[error("aggregation failed: {0}")]
    AggregationFailed(#[source] AnalysisError),

    #[error(transparent)]
    News(#[from] NewsError),
}

/// Errors raised while loading the YAML configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// A credential needed by the requested command is absent.
    #[error("missing required setting: {0}")]
    MissingKey(&'static str),
}
