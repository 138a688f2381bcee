//! LLM API interaction.
//!
//! This module provides the seam between the analysis passes and an
//! OpenAI-compatible chat-completions API.
//!
//! # Architecture
//!
//! - [`ChatModel`]: core trait defining async LLM interaction
//! - [`ChatRequest`]: one system + user prompt pair with sampling settings
//! - [`OpenAiChat`]: `reqwest` implementation with a per-call timeout
//!
//! There is no retry layer: a failed call is reported once and
//! the caller decides whether that skips an article or fails the batch.

use crate::error::ModelError;
use crate::utils::truncate_for_log;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// One completion request: prompts plus sampling temperature.
///
/// Responses are always requested in JSON-object mode.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
}

/// Trait for async LLM interaction.
///
/// Implementors send a [`ChatRequest`] and return the raw message content,
/// which the caller parses. This keeps HTTP concerns out of the analyzers
/// and lets tests script the model's answers.
#[allow(async_fn_in_trait)]
pub trait ChatModel {
    async fn complete(&self, request: &ChatRequest) -> Result<String, ModelError>;
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Chat-completions client for OpenAI and compatible servers.
#[derive(Clone)]
pub struct OpenAiChat {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl OpenAiChat {
    /// Build a client for `{api_base}/chat/completions`.
    pub fn new(
        api_base: &str,
        api_key: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, ModelError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ModelError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", api_base.trim_end_matches('/')),
            api_key,
            model,
            timeout,
        })
    }

    fn body(&self, request: &ChatRequest) -> serde_json::Value {
        json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.user},
            ],
            "temperature": request.temperature,
            "response_format": {"type": "json_object"},
        })
    }
}

impl fmt::Debug for OpenAiChat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiChat")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ChatModel for OpenAiChat {
    #[instrument(level = "info", skip_all, fields(model = %self.model, temperature = request.temperature))]
    async fn complete(&self, request: &ChatRequest) -> Result<String, ModelError> {
        let t0 = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.body(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout(self.timeout.as_secs())
                } else {
                    ModelError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(
                status = status.as_u16(),
                elapsed_ms = t0.elapsed().as_millis() as u64,
                body = %truncate_for_log(&message, 300),
                "API call failed"
            );
            return Err(ModelError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;
        let content = content_of(parsed)?;

        info!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            chars = content.len(),
            "Model call succeeded"
        );
        debug!(response_preview = %truncate_for_log(&content, 300), "Model response");
        Ok(content)
    }
}

fn content_of(response: CompletionResponse) -> Result<String, ModelError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or(ModelError::EmptyResponse)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted [`ChatModel`]: answers are handed out in call order and every
    /// request is recorded.
    #[derive(Default)]
    pub(crate) struct FakeModel {
        answers: Mutex<VecDeque<Result<String, ModelError>>>,
        pub(crate) requests: Mutex<Vec<ChatRequest>>,
    }

    impl FakeModel {
        pub(crate) fn answering(answers: Vec<Result<String, ModelError>>) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                requests: Mutex::default(),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    impl ChatModel for FakeModel {
        async fn complete(&self, request: &ChatRequest) -> Result<String, ModelError> {
            self.requests.lock().unwrap().push(request.clone());
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ModelError::EmptyResponse))
        }
    }

    fn chat() -> OpenAiChat {
        OpenAiChat::new(
            "https://api.openai.com/v1/",
            "sk-test".to_string(),
            "gpt-4-1106-preview".to_string(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        assert_eq!(chat().endpoint, "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_debug_hides_api_key() {
        assert!(!format!("{:?}", chat()).contains("sk-test"));
    }

    #[test]
    fn test_request_body_shape() {
        let body = chat().body(&ChatRequest {
            system: "sys".to_string(),
            user: "usr".to_string(),
            temperature: 0.2,
        });
        assert_eq!(body["model"], "gpt-4-1106-preview");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "sys");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["response_format"]["type"], "json_object");
        let temperature = body["temperature"].as_f64().unwrap();
        assert!((temperature - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_content_of_first_choice() {
        let response: CompletionResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": "{\"a\": 1}"}}]}"#,
        )
        .unwrap();
        assert_eq!(content_of(response).unwrap(), r#"{"a": 1}"#);
    }

    #[test]
    fn test_content_of_empty_choices() {
        let response: CompletionResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(content_of(response), Err(ModelError::EmptyResponse)));

        let response: CompletionResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": null}}]}"#).unwrap();
        assert!(matches!(content_of(response), Err(ModelError::EmptyResponse)));
    }

    #[tokio::test]
    async fn test_fake_model_runs_out_of_answers() {
        let model = FakeModel::answering(vec![Ok("{}".to_string())]);
        let request = ChatRequest {
            system: String::new(),
            user: String::new(),
            temperature: 0.0,
        };
        assert_eq!(model.complete(&request).await.unwrap(), "{}");
        assert!(model.complete(&request).await.is_err());
        assert_eq!(model.calls(), 2);
    }
}
