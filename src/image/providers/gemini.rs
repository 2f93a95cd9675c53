//! Gemini (Google) image merge provider.

use crate::error::{parse_retry_after, sanitize_error_message, MergeError, Result};
use crate::image::provider::MergeProvider;
use crate::image::types::{
    DataUrl, GeneratedImage, GenerationMetadata, ImageFormat, MergeRequest, ProviderKind,
};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Default API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini image model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeminiModel {
    /// Nano Banana - Gemini 2.5 Flash Image (fast, economical).
    #[default]
    NanoBanana,
    /// Nano Banana Pro - Gemini 3 Pro Image (highest quality).
    NanoBananaPro,
}

impl GeminiModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NanoBanana => "gemini-2.5-flash-image",
            Self::NanoBananaPro => "gemini-3-pro-image-preview",
        }
    }
}

impl FromStr for GeminiModel {
    type Err = MergeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini-2.5-flash-image" | "nano-banana" | "flash" => Ok(Self::NanoBanana),
            "gemini-3-pro-image-preview" | "nano-banana-pro" | "pro" => Ok(Self::NanoBananaPro),
            other => Err(MergeError::Config(format!("unknown Gemini model: {other}"))),
        }
    }
}

impl std::fmt::Display for GeminiModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builder for GeminiProvider.
#[derive(Debug, Clone, Default)]
pub struct GeminiProviderBuilder {
    api_key: Option<String>,
    model: GeminiModel,
    base_url: Option<String>,
    timeout: Option<Duration>,
}

impl GeminiProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `GOOGLE_API_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the Gemini model variant.
    pub fn model(mut self, model: GeminiModel) -> Self {
        self.model = model;
        self
    }

    /// Overrides the API endpoint (proxies, regional endpoints).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets a whole-request timeout on the HTTP client.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the provider, resolving the API key.
    pub fn build(self) -> Result<GeminiProvider> {
        let api_key = self
            .api_key
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
            .ok_or_else(|| {
                MergeError::Auth("GOOGLE_API_KEY not set and no API key provided".into())
            })?;

        let mut client = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            client = client.timeout(timeout);
        }

        Ok(GeminiProvider {
            client: client.build()?,
            api_key,
            model: self.model,
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            timeout: self.timeout,
        })
    }
}

/// Gemini image merge provider.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: GeminiModel,
    base_url: String,
    timeout: Option<Duration>,
}

impl GeminiProvider {
    /// Creates a new `GeminiProviderBuilder`.
    pub fn builder() -> GeminiProviderBuilder {
        GeminiProviderBuilder::new()
    }

    /// The configured model.
    pub fn model(&self) -> GeminiModel {
        self.model
    }

    /// The HTTP client, shared with result downloads.
    pub fn http_client(&self) -> &reqwest::Client {
        &self.client
    }

    fn model_url(&self) -> String {
        format!("{}/v1beta/models/{}", self.base_url, self.model.as_str())
    }

    async fn merge_impl(&self, request: &MergeRequest) -> Result<GeneratedImage> {
        let start = Instant::now();
        let url = format!("{}:generateContent", self.model_url());
        let body = GeminiRequest::from_merge_request(request)?;

        tracing::debug!(model = self.model.as_str(), "submitting Gemini merge request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error(status.as_u16(), &text, &headers));
        }

        let gemini_response: GeminiResponse = response.json().await?;
        let (data, format) = extract_image(gemini_response)?;

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(duration_ms, size = data.len(), "Gemini merge complete");

        Ok(GeneratedImage::new(
            data,
            format,
            ProviderKind::Gemini,
            GenerationMetadata {
                model: Some(self.model.as_str().to_string()),
                duration_ms: Some(duration_ms),
            },
        ))
    }

    fn map_send_error(&self, e: reqwest::Error) -> MergeError {
        match self.timeout {
            Some(timeout) if e.is_timeout() => MergeError::Timeout(timeout),
            _ => MergeError::Network(e),
        }
    }
}

/// Pulls the first inline image out of a response, translating block signals into errors.
fn extract_image(response: GeminiResponse) -> Result<(Vec<u8>, ImageFormat)> {
    // Prompt blocks come back as HTTP 200
    if let Some(ref feedback) = response.prompt_feedback {
        if let Some(ref reason) = feedback.block_reason {
            let msg = feedback
                .block_reason_message
                .clone()
                .unwrap_or_else(|| format!("Prompt blocked: {}", reason));
            return Err(MergeError::ContentBlocked(msg));
        }
    }

    let candidate = response.candidates.into_iter().next().ok_or_else(|| {
        MergeError::UnexpectedResponse("No candidates in Gemini response".into())
    })?;

    if let Some(ref finish_reason) = candidate.finish_reason {
        match finish_reason.as_str() {
            "SAFETY"
            | "IMAGE_SAFETY"
            | "IMAGE_PROHIBITED_CONTENT"
            | "IMAGE_RECITATION"
            | "RECITATION"
            | "PROHIBITED_CONTENT"
            | "BLOCKLIST" => {
                return Err(MergeError::ContentBlocked(format!(
                    "Content blocked by Gemini safety filter: {}",
                    finish_reason
                )));
            }
            "IMAGE_OTHER" | "NO_IMAGE" => {
                return Err(MergeError::UnexpectedResponse(format!(
                    "Generation failed: {}. Try a different prompt.",
                    finish_reason
                )));
            }
            _ => {} // STOP, MAX_TOKENS, etc. are normal
        }
    }

    let content = candidate.content.ok_or_else(|| {
        MergeError::UnexpectedResponse("No content in Gemini candidate".into())
    })?;

    // A text-only answer usually explains why no image was produced.
    let mut text = None;
    let mut inline = None;
    for part in content.parts {
        if inline.is_none() {
            inline = part.inline_data;
        }
        if text.is_none() {
            text = part.text;
        }
    }

    let inline_data = inline.ok_or_else(|| {
        MergeError::UnexpectedResponse(match text {
            Some(t) => format!("No image data in Gemini response: {}", t.trim()),
            None => "No image data in Gemini response".into(),
        })
    })?;

    let data = base64::engine::general_purpose::STANDARD
        .decode(&inline_data.data)
        .map_err(|e| MergeError::Decode(e.to_string()))?;

    let format = ImageFormat::from_mime_type(&inline_data.mime_type)
        .or_else(|| ImageFormat::from_magic_bytes(&data))
        .unwrap_or(ImageFormat::Png);

    Ok((data, format))
}

fn parse_error(status: u16, text: &str, headers: &reqwest::header::HeaderMap) -> MergeError {
    let text = extract_error_message(text);
    if status == 402 {
        return MergeError::Billing(
            "Gemini billing issue: enable billing at https://aistudio.google.com".into(),
        );
    }
    if status == 404 {
        return MergeError::InvalidRequest(
            "Model not found. Verify the model name is correct.".into(),
        );
    }
    if status == 429 {
        let retry_after = parse_retry_after(headers).map(Duration::from_secs);
        return MergeError::RateLimited { retry_after };
    }
    if status == 401 || status == 403 {
        return MergeError::Auth(text);
    }
    let lower = text.to_lowercase();
    if lower.contains("safety")
        || lower.contains("blocked")
        || lower.contains("content_policy")
        || lower.contains("prohibited")
    {
        return MergeError::ContentBlocked(text);
    }
    MergeError::Api {
        status,
        message: text,
    }
}

/// Prefers `error.message` from a Google error envelope over the raw body.
fn extract_error_message(body: &str) -> String {
    let message = serde_json::from_str::<GeminiErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error.message)
        .unwrap_or_else(|| body.to_string());
    sanitize_error_message(&message)
}

#[async_trait]
impl MergeProvider for GeminiProvider {
    async fn merge(&self, request: &MergeRequest) -> Result<GeneratedImage> {
        self.merge_impl(request).await
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn health_check(&self) -> Result<()> {
        let response = self
            .client
            .get(self.model_url())
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        match response.status().as_u16() {
            401 | 403 => Err(MergeError::Auth("Invalid API key".into())),
            404 => Err(MergeError::InvalidRequest(
                "Model not found. Verify the model name is correct.".into(),
            )),
            s if !(200..300).contains(&s) => Err(MergeError::Api {
                status: s,
                message: "Health check failed".into(),
            }),
            _ => Ok(()),
        }
    }
}

// Request/Response types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiRequestPart>,
}

/// A part in a Gemini request - can be text or inline image data.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiRequestPart {
    Text { text: String },
    InlineData { inline_data: GeminiInlineData },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiConfig {
    response_modalities: Vec<String>,
}

impl GeminiRequest {
    /// Both photos go first, in slot order, followed by the prompt.
    fn from_merge_request(req: &MergeRequest) -> Result<Self> {
        let mut parts = Vec::with_capacity(3);

        for image in req.images() {
            let data_url = DataUrl::parse(image).ok_or_else(|| {
                MergeError::InvalidRequest("images must be base64 data URLs".into())
            })?;
            parts.push(GeminiRequestPart::InlineData {
                inline_data: GeminiInlineData {
                    mime_type: data_url.mime_type.to_string(),
                    data: data_url.payload.to_string(),
                },
            });
        }

        parts.push(GeminiRequestPart::Text {
            text: req.prompt.clone(),
        });

        Ok(Self {
            contents: vec![GeminiContent { parts }],
            generation_config: GeminiConfig {
                response_modalities: vec!["IMAGE".to_string()],
            },
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
    #[serde(default)]
    block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorEnvelope {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;

    const PNG_URL: &str = "data:image/png;base64,iVBORw0KGgo=";
    const JPEG_URL: &str = "data:image/jpeg;base64,/9j/4AAQ";

    fn parse(json: &str) -> GeminiResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_gemini_model_as_str() {
        assert_eq!(GeminiModel::NanoBanana.as_str(), "gemini-2.5-flash-image");
        assert_eq!(
            GeminiModel::NanoBananaPro.as_str(),
            "gemini-3-pro-image-preview"
        );
    }

    #[test]
    fn test_gemini_model_from_str() {
        assert_eq!(
            "gemini-2.5-flash-image".parse::<GeminiModel>().unwrap(),
            GeminiModel::NanoBanana
        );
        assert_eq!(
            "PRO".parse::<GeminiModel>().unwrap(),
            GeminiModel::NanoBananaPro
        );
        assert!("dall-e-3".parse::<GeminiModel>().is_err());
    }

    #[test]
    fn test_builder_with_explicit_key() {
        let provider = GeminiProviderBuilder::new()
            .api_key("test-key")
            .model(GeminiModel::NanoBananaPro)
            .base_url("http://localhost:8080/")
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        assert_eq!(provider.model(), GeminiModel::NanoBananaPro);
        assert_eq!(
            provider.model_url(),
            "http://localhost:8080/v1beta/models/gemini-3-pro-image-preview"
        );
    }

    #[test]
    fn test_request_has_both_images_then_prompt() {
        let req = MergeRequest::new(PNG_URL, JPEG_URL, "Hug my younger self");
        let gemini_req = GeminiRequest::from_merge_request(&req).unwrap();
        let json = serde_json::to_value(&gemini_req).unwrap();

        let parts = json["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0]["inline_data"]["mimeType"], "image/png");
        assert_eq!(parts[0]["inline_data"]["data"], "iVBORw0KGgo=");
        assert_eq!(parts[1]["inline_data"]["mimeType"], "image/jpeg");
        assert_eq!(parts[2]["text"], "Hug my younger self");
        assert_eq!(
            json["generationConfig"]["responseModalities"],
            serde_json::json!(["IMAGE"])
        );
    }

    #[test]
    fn test_request_passes_empty_prompt_verbatim() {
        let req = MergeRequest::new(PNG_URL, PNG_URL, "");
        let json = serde_json::to_value(GeminiRequest::from_merge_request(&req).unwrap()).unwrap();
        assert_eq!(json["contents"][0]["parts"][2]["text"], "");
    }

    #[test]
    fn test_request_rejects_non_data_urls() {
        let req = MergeRequest::new("blob:xyz", PNG_URL, "p");
        let err = GeminiRequest::from_merge_request(&req).unwrap_err();
        assert!(matches!(err, MergeError::InvalidRequest(_)));
    }

    #[test]
    fn test_extract_image_success() {
        let resp = parse(
            r#"{
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "Here is your memory"},
                        {"inlineData": {"mimeType": "image/png", "data": "iVBORw0KGgo="}}
                    ]
                },
                "finishReason": "STOP"
            }]
        }"#,
        );
        let (data, format) = extract_image(resp).unwrap();
        assert_eq!(format, ImageFormat::Png);
        assert_eq!(data[..4], [0x89, 0x50, 0x4E, 0x47]);
    }

    #[test]
    fn test_extract_image_text_only_response() {
        let resp = parse(
            r#"{
            "candidates": [{
                "content": {"parts": [{"text": "I cannot edit faces."}]}
            }]
        }"#,
        );
        let err = extract_image(resp).unwrap_err();
        assert_eq!(
            err.to_string(),
            "unexpected response: No image data in Gemini response: I cannot edit faces."
        );
    }

    #[test]
    fn test_extract_image_prompt_feedback_block() {
        let resp = parse(
            r#"{
            "candidates": [],
            "promptFeedback": {
                "blockReason": "SAFETY",
                "blockReasonMessage": "Prompt was blocked due to safety"
            }
        }"#,
        );
        let err = extract_image(resp).unwrap_err();
        assert!(
            matches!(err, MergeError::ContentBlocked(ref m) if m == "Prompt was blocked due to safety")
        );
    }

    #[test]
    fn test_extract_image_safety_finish_reason() {
        let resp = parse(r#"{"candidates": [{"finishReason": "IMAGE_SAFETY"}]}"#);
        assert!(matches!(
            extract_image(resp).unwrap_err(),
            MergeError::ContentBlocked(_)
        ));

        let resp = parse(r#"{"candidates": []}"#);
        assert!(matches!(
            extract_image(resp).unwrap_err(),
            MergeError::UnexpectedResponse(_)
        ));
    }

    #[test]
    fn test_parse_error_statuses() {
        let headers = HeaderMap::new();
        assert!(matches!(
            parse_error(401, "bad key", &headers),
            MergeError::Auth(_)
        ));
        assert!(matches!(
            parse_error(402, "", &headers),
            MergeError::Billing(_)
        ));
        assert!(matches!(
            parse_error(429, "", &headers),
            MergeError::RateLimited { retry_after: None }
        ));
        assert!(matches!(
            parse_error(400, "request blocked by safety system", &headers),
            MergeError::ContentBlocked(_)
        ));
    }

    #[test]
    fn test_parse_error_uses_envelope_message() {
        let body = r#"{"error": {"code": 400, "message": "quota exceeded", "status": "RESOURCE_EXHAUSTED"}}"#;
        match parse_error(400, body, &HeaderMap::new()) {
            MergeError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "quota exceeded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
