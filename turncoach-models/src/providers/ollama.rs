//! Ollama local oracle.
//!
//! Sends the prompt as a single user message to `/api/chat` with streaming
//! disabled.
//!
//! # Example
//!
//! ```ignore
//! use turncoach_models::providers::OllamaOracle;
//!
//! let oracle = OllamaOracle::new("llama3");  // Uses localhost:11434
//! let oracle = OllamaOracle::with_base_url("http://192.168.1.100:11434", "llama3");
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{FinishReason, GenerateRequest, GenerateResponse, Message, Oracle, ResponseFormat, Usage};

/// Default Ollama API base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

// ────────────────────────────────────────────────────────────────────────────
// Ollama API Types
// ────────────────────────────────────────────────────────────────────────────

/// Message in an Ollama chat request/response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OllamaChatMessage {
    pub role: String,
    pub content: String,
}

impl From<&Message> for OllamaChatMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role.as_str().to_string(),
            content: message.content.clone(),
        }
    }
}

/// Request body for Ollama's `/api/chat` endpoint.
#[derive(Debug, Serialize)]
pub struct OllamaChatRequest {
    pub model: String,
    pub messages: Vec<OllamaChatMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<OllamaChatOptions>,
}

/// Chat options for Ollama.
#[derive(Debug, Serialize)]
pub struct OllamaChatOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
}

/// Response from Ollama's `/api/chat` endpoint.
#[derive(Debug, Deserialize)]
pub struct OllamaChatResponse {
    pub message: OllamaChatMessage,
    #[serde(default)]
    pub done_reason: Option<String>,
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    #[serde(default)]
    pub eval_count: Option<u64>,
}

impl From<OllamaChatResponse> for GenerateResponse {
    fn from(response: OllamaChatResponse) -> Self {
        let finish_reason = match response.done_reason.as_deref() {
            Some("length") => FinishReason::MaxTokens,
            Some("stop") | None => FinishReason::Stop,
            Some(_) => FinishReason::Other,
        };
        Self {
            text: response.message.content,
            finish_reason,
            usage: Some(Usage::new(
                response.prompt_eval_count.unwrap_or(0),
                response.eval_count.unwrap_or(0),
            )),
            safety_block: None,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// OllamaOracle
// ────────────────────────────────────────────────────────────────────────────

/// Oracle backed by a local Ollama instance.
///
/// Ollama has no adjustable safety filters, so [`SafetyPolicy`](super::SafetyPolicy)
/// is ignored.
pub struct OllamaOracle {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaOracle {
    /// Create a new Ollama oracle with the default URL (localhost:11434).
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, model)
    }

    /// Create a new Ollama oracle with a custom base URL.
    pub fn with_base_url(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Get the base URL for this oracle.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_request(&self, request: GenerateRequest) -> OllamaChatRequest {
        let options = if request.temperature.is_some() || request.max_output_tokens.is_some() {
            Some(OllamaChatOptions {
                temperature: request.temperature,
                num_predict: request.max_output_tokens,
            })
        } else {
            None
        };

        OllamaChatRequest {
            model: self.model.clone(),
            messages: vec![(&Message::user(request.prompt)).into()],
            stream: false,
            format: match request.response_format {
                ResponseFormat::Json => Some("json".to_string()),
                ResponseFormat::Text => None,
            },
            options,
        }
    }
}

#[async_trait]
impl Oracle for OllamaOracle {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: GenerateRequest) -> crate::Result<GenerateResponse> {
        let url = format!("{}/api/chat", self.base_url);
        let body = self.build_request(request);

        debug!(model = %self.model, "sending ollama chat request");
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| crate::Error::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(crate::Error::ProviderApi(format!(
                "Ollama API returned {}: {}",
                status, body
            )));
        }

        let ollama_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| crate::Error::Request(e.to_string()))?;

        Ok(ollama_response.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::SafetyPolicy;

    #[test]
    fn new_uses_default_url() {
        let oracle = OllamaOracle::new("llama3");
        assert_eq!(oracle.base_url(), "http://localhost:11434");
        assert_eq!(oracle.model(), "llama3");
        assert_eq!(oracle.name(), "ollama");
    }

    #[test]
    fn with_base_url_strips_trailing_slash() {
        let oracle = OllamaOracle::with_base_url("http://10.0.0.2:11434/", "llama3");
        assert_eq!(oracle.base_url(), "http://10.0.0.2:11434");
    }

    #[test]
    fn build_request_sends_prompt_as_single_user_message() {
        let oracle = OllamaOracle::new("llama3");
        let request = GenerateRequest::new("Evaluate")
            .temperature(0.3)
            .max_output_tokens(500)
            .response_format(ResponseFormat::Json)
            .safety(SafetyPolicy::Relaxed);

        let body = oracle.build_request(request);
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "Evaluate");
        assert_eq!(json["stream"], false);
        assert_eq!(json["format"], "json");
        assert_eq!(json["options"]["num_predict"], 500);
    }

    #[test]
    fn build_request_omits_options_when_unset() {
        let oracle = OllamaOracle::new("llama3");
        let json = serde_json::to_value(oracle.build_request(GenerateRequest::new("hi"))).unwrap();
        assert!(json.get("options").is_none());
        assert!(json.get("format").is_none());
    }

    #[test]
    fn chat_response_converts_to_generate_response() {
        let json = r#"{
            "model": "llama3",
            "created_at": "2024-01-15T10:00:00Z",
            "message": {"role": "assistant", "content": "{\"turn_quality_score\": 7}"},
            "done": true,
            "done_reason": "length",
            "prompt_eval_count": 10,
            "eval_count": 15
        }"#;

        let response: OllamaChatResponse = serde_json::from_str(json).unwrap();
        let response: GenerateResponse = response.into();

        assert_eq!(response.text, "{\"turn_quality_score\": 7}");
        assert_eq!(response.finish_reason, FinishReason::MaxTokens);
        assert_eq!(response.usage.as_ref().unwrap().total_tokens, 25);
        assert!(!response.is_blocked());
    }
}
