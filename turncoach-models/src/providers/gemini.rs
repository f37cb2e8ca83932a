//! Google Gemini oracle (`generateContent` REST endpoint).
//!
//! # Example
//!
//! ```ignore
//! use turncoach_models::auth::CredentialStore;
//! use turncoach_models::providers::GeminiOracle;
//!
//! let key = CredentialStore::new("turncoach").with_env_fallback().get("google")?;
//! let oracle = GeminiOracle::new(key, "gemini-1.5-flash");
//! ```

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{FinishReason, GenerateRequest, GenerateResponse, Oracle, SafetyPolicy, Usage};
use crate::auth::ApiKey;

/// Default Gemini API base URL.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Harm categories that accept a `BLOCK_NONE` threshold.
const ADJUSTABLE_HARM_CATEGORIES: &[&str] = &[
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

// ────────────────────────────────────────────────────────────────────────────
// Gemini API Types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    safety_settings: Vec<GeminiSafetySetting>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    response_mime_type: &'static str,
}

#[derive(Debug, Serialize)]
struct GeminiSafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<GeminiPromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

fn build_request(request: GenerateRequest) -> GeminiRequest {
    let safety_settings = match request.safety {
        SafetyPolicy::Relaxed => ADJUSTABLE_HARM_CATEGORIES
            .iter()
            .copied()
            .map(|category| GeminiSafetySetting {
                category,
                threshold: "BLOCK_NONE",
            })
            .collect(),
        SafetyPolicy::Default => Vec::new(),
    };

    GeminiRequest {
        contents: vec![GeminiContent {
            role: Some("user".to_string()),
            parts: vec![GeminiPart {
                text: Some(request.prompt),
            }],
        }],
        generation_config: GeminiGenerationConfig {
            temperature: request.temperature,
            max_output_tokens: request.max_output_tokens,
            response_mime_type: request.response_format.mime_type(),
        },
        safety_settings,
    }
}

fn convert_response(response: GeminiResponse) -> GenerateResponse {
    let usage = response
        .usage_metadata
        .map(|u| Usage::new(u.prompt_token_count, u.candidates_token_count));

    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        warn!(reason = %reason, "gemini blocked the prompt");
        let mut blocked = GenerateResponse::blocked(reason);
        blocked.usage = usage;
        return blocked;
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        return GenerateResponse {
            text: String::new(),
            finish_reason: FinishReason::Other,
            usage,
            safety_block: None,
        };
    };

    let finish_reason = match candidate.finish_reason.as_deref() {
        Some("STOP") | None => FinishReason::Stop,
        Some("MAX_TOKENS") => FinishReason::MaxTokens,
        Some("SAFETY") | Some("PROHIBITED_CONTENT") | Some("BLOCKLIST") | Some("SPII") => {
            FinishReason::Safety
        }
        Some(_) => FinishReason::Other,
    };

    if finish_reason == FinishReason::Safety {
        let reason = candidate.finish_reason.unwrap_or_else(|| "SAFETY".to_string());
        warn!(reason = %reason, "gemini withheld the candidate");
        let mut blocked = GenerateResponse::blocked(reason);
        blocked.usage = usage;
        return blocked;
    }

    let text = candidate
        .content
        .map(|c| {
            c.parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    GenerateResponse {
        text,
        finish_reason,
        usage,
        safety_block: None,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// GeminiOracle
// ────────────────────────────────────────────────────────────────────────────

/// Oracle backed by the Gemini `generateContent` API.
pub struct GeminiOracle {
    api_key: ApiKey,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiOracle {
    pub fn new(api_key: ApiKey, model: impl Into<String>) -> Self {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        api_key: ApiKey,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            api_key,
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Oracle for GeminiOracle {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: GenerateRequest) -> crate::Result<GenerateResponse> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = build_request(request);

        debug!(model = %self.model, "sending gemini generateContent request");
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.expose_secret())])
            .json(&body)
            .send()
            .await
            .map_err(|e| crate::Error::Request(e.without_url().to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => crate::Error::ProviderApi(
                    format!("Gemini API rejected credentials ({}): {}", status, body),
                ),
                StatusCode::TOO_MANY_REQUESTS => {
                    crate::Error::ProviderApi(format!("Gemini API rate limited: {}", body))
                }
                _ => crate::Error::ProviderApi(format!("Gemini API returned {}: {}", status, body)),
            });
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| crate::Error::Request(e.without_url().to_string()))?;

        Ok(convert_response(gemini_response))
    }
}
