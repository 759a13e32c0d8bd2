//! Google Gemini client for multimodal generation.
//!
//! Talks to the public `generateContent` REST endpoint.
//! See: <https://ai.google.dev/api/generate-content>

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::traits::GenerateProvider;
use crate::types::{BackendTarget, GenerateRequest, GenerateResponse, Usage};
use crate::{KotobaError, Result};

/// Default base URL for the Gemini API
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Finish reasons that mean the model refused to answer.
const BLOCKING_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "RECITATION",
    "BLOCKLIST",
    "PROHIBITED_CONTENT",
    "SPII",
];

/// Client for the Gemini `generateContent` API.
///
/// Stateless apart from the HTTP connection pool: the key and model come
/// from the [`BackendTarget`] of each call.
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    base_url: String,
}

impl GeminiClient {
    /// Create a client against the public endpoint.
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL, DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom base URL (for testing with wiremock).
    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KotobaError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }

    async fn send(
        &self,
        target: &BackendTarget,
        body: &GenerateContentRequest<'_>,
    ) -> Result<reqwest::Response> {
        let response = self
            .http
            .post(self.endpoint(target.backend.as_str()))
            .header("x-goog-api-key", target.credential.secret())
            .json(body)
            .send()
            .await
            .map_err(|e| KotobaError::Http(e.to_string()))?;

        check_status(response, target.backend.as_str()).await
    }
}

#[async_trait]
impl GenerateProvider for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    #[instrument(name = "gemini.generate", skip_all, fields(model = %target.backend))]
    async fn generate(
        &self,
        target: &BackendTarget,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse> {
        let body = GenerateContentRequest::from_request(request);
        let response = self.send(target, &body).await?;

        let payload: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| KotobaError::Http(e.to_string()))?;

        payload.into_response()
    }

    /// Any 2xx counts as alive. A one-token answer may legitimately carry no
    /// text (thinking models spend it before emitting), so the body is not
    /// inspected.
    async fn probe(&self, target: &BackendTarget) -> Result<()> {
        let probe = GenerateRequest::probe();
        let body = GenerateContentRequest::from_request(&probe);
        self.send(target, &body).await.map(|_| ())
    }
}

/// Check response status and map to the appropriate error.
async fn check_status(response: reqwest::Response, model: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs);

    // Gemini explains failures as {"error": {"code", "message", "status"}}.
    let message = response
        .json::<ErrorEnvelope>()
        .await
        .ok()
        .map(|envelope| envelope.error.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| status.to_string());

    Err(match status.as_u16() {
        400 => KotobaError::InvalidInput(message),
        401 | 403 => KotobaError::AuthenticationFailed(message),
        404 => KotobaError::ModelNotFound {
            model: model.to_string(),
            message,
        },
        429 => KotobaError::RateLimited { retry_after },
        code => KotobaError::Api {
            status: code,
            message,
        },
    })
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: String },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

impl<'a> GenerateContentRequest<'a> {
    /// Instruction, then one part per context turn, then the attachment.
    fn from_request(request: &'a GenerateRequest) -> Self {
        let mut parts = Vec::with_capacity(request.context.len() + 2);
        parts.push(Part::Text {
            text: request.instruction.clone(),
        });
        parts.extend(request.context.iter().map(|turn| Part::Text {
            text: turn.to_prompt_line(),
        }));
        if let Some(attachment) = &request.attachment {
            parts.push(Part::InlineData {
                inline_data: InlineData {
                    mime_type: attachment.mime_type(),
                    data: BASE64.encode(&attachment.bytes),
                },
            });
        }

        Self {
            contents: vec![Content {
                role: "user",
                parts,
            }],
            generation_config: request
                .max_output_tokens
                .map(|max_output_tokens| GenerationConfig { max_output_tokens }),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

impl GenerateContentResponse {
    fn into_response(self) -> Result<GenerateResponse> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(KotobaError::ContentFiltered { reason });
        }

        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or(KotobaError::EmptyResponse)?;

        if let Some(reason) = candidate.finish_reason.as_deref()
            && BLOCKING_FINISH_REASONS.contains(&reason)
        {
            return Err(KotobaError::ContentFiltered {
                reason: reason.to_string(),
            });
        }

        let text: String = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter(|p| !p.thought.unwrap_or(false))
            .filter_map(|p| p.text)
            .collect();

        if text.trim().is_empty() {
            return Err(KotobaError::EmptyResponse);
        }

        Ok(GenerateResponse {
            text,
            model: self.model_version,
            usage: self.usage_metadata.map(|u| Usage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Attachment, Turn};

    #[test]
    fn request_parts_keep_instruction_context_attachment_order() {
        let request = GenerateRequest::new("Reply in Japanese.")
            .context(vec![Turn::user("Konnichiwa"), Turn::assistant("Konnichiwa!")])
            .attachment(Attachment::wav(vec![1, 2, 3]));

        let json = serde_json::to_value(GenerateContentRequest::from_request(&request)).unwrap();
        let parts = json["contents"][0]["parts"].as_array().unwrap();

        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0]["text"], "Reply in Japanese.");
        assert_eq!(parts[1]["text"], "User: Konnichiwa");
        assert_eq!(parts[2]["text"], "Assistant: Konnichiwa!");
        assert_eq!(parts[3]["inline_data"]["mime_type"], "audio/wav");
        assert_eq!(parts[3]["inline_data"]["data"], "AQID");
        assert!(json.get("generationConfig").is_none());
    }

    #[test]
    fn probe_caps_output_tokens() {
        let probe = GenerateRequest::probe();
        let json = serde_json::to_value(GenerateContentRequest::from_request(&probe)).unwrap();
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 1);
        assert_eq!(json["contents"][0]["parts"][0]["text"], "ping");
    }

    #[test]
    fn response_skips_thought_parts() {
        let payload: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "thinking...", "thought": true},
                    {"text": "Ohayou "},
                    {"text": "gozaimasu"}
                ]},
                "finishReason": "STOP"
            }]
        }))
        .unwrap();
        let response = payload.into_response().unwrap();
        assert_eq!(response.text, "Ohayou gozaimasu");
    }

    #[test]
    fn safety_finish_is_content_filtered() {
        let payload: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{"finishReason": "SAFETY"}]
        }))
        .unwrap();
        let err = payload.into_response().unwrap_err();
        assert!(matches!(err, KotobaError::ContentFiltered { .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn missing_candidates_is_empty_response() {
        let payload: GenerateContentResponse =
            serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(matches!(
            payload.into_response(),
            Err(KotobaError::EmptyResponse)
        ));
    }
}
