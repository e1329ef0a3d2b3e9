//! Gemini Flash analysis client: single-shot structured generation.
//!
//! One `generateContent` call per acquisition:
//! - `systemInstruction` carries the fixed persona/rubric
//! - `responseMimeType: application/json` + `responseSchema` pin the output
//! - image analyses send the frame as `inlineData`, text analyses send text only
//!
//! No streaming, no retries. Any transport, auth, status or parse problem
//! is an `AnalysisError`; a partial report is never returned.

use super::parse::parse_report;
use super::prompts::{build_image_prompt, build_text_prompt, SYSTEM_INSTRUCTION};
use super::schema::report_schema;
use super::types::HealthyReport;
use super::AnalysisClient;
use crate::capture::CapturedImage;
use crate::config::ScannerConfig;
use crate::error::AnalysisError;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateRequest {
    contents: Vec<Content>,
    system_instruction: Content,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

impl GenerateRequest {
    pub(crate) fn new(prompt: String, image: Option<&CapturedImage>) -> Self {
        let mut parts = Vec::with_capacity(2);
        if let Some(image) = image {
            parts.push(Part::InlineData {
                inline_data: InlineData {
                    mime_type: image.mime_type.clone(),
                    data: general_purpose::STANDARD.encode(&image.bytes),
                },
            });
        }
        parts.push(Part::Text { text: prompt });

        Self {
            contents: vec![Content { parts }],
            system_instruction: Content {
                parts: vec![Part::Text {
                    text: SYSTEM_INSTRUCTION.to_string(),
                }],
            },
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: report_schema(),
            },
        }
    }
}

impl GenerateResponse {
    /// All text parts of the first candidate, concatenated.
    fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

pub struct GeminiAnalysisClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl GeminiAnalysisClient {
    pub fn new(config: &ScannerConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.analysis_timeout)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("[LLM] Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });
        Self {
            client,
            base_url: config.analysis_base_url.clone(),
            model: config.model.clone(),
        }
    }

    async fn generate(
        &self,
        credential: &str,
        request: &GenerateRequest,
    ) -> Result<HealthyReport, AnalysisError> {
        if credential.trim().is_empty() {
            return Err(AnalysisError::MissingCredential);
        }

        log::info!("[LLM] Model: {}", self.model);
        log::info!("[LLM] API key present ({} chars)", credential.len());
        let start = std::time::Instant::now();

        // Key goes in a header, not the query string, so it never shows up
        // in reqwest error messages.
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", credential.trim())
            .json(request)
            .send()
            .await
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let code = status.as_u16();
            if code == 401 || code == 403 || body.contains("API_KEY_INVALID") {
                return Err(AnalysisError::Auth(code));
            }
            return Err(AnalysisError::Status {
                status: code,
                body: body.chars().take(300).collect(),
            });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::Parse(e.to_string()))?;
        log::info!("[LLM] API latency: {}ms", start.elapsed().as_millis());
        if let Some(usage) = &body.usage_metadata {
            log::info!("[LLM] Input tokens: {}", usage.prompt_token_count);
            log::info!("[LLM] Output tokens: {}", usage.candidates_token_count);
        }

        let text = body.text().ok_or(AnalysisError::EmptyResponse)?;
        let report = parse_report(&text).map_err(AnalysisError::Parse)?;
        log::info!(
            "[LLM] Parsed report: {} — score {}, {} ingredients, verdict {:?}",
            report.product_name,
            report.score,
            report.ingredients.len(),
            report.verdict
        );
        Ok(report)
    }
}

impl AnalysisClient for GeminiAnalysisClient {
    async fn analyze_image(
        &self,
        credential: &str,
        image: &CapturedImage,
        context: Option<&str>,
    ) -> Result<HealthyReport, AnalysisError> {
        log::info!(
            "[LLM] Image analysis: {} bytes {}, context: {}",
            image.bytes.len(),
            image.mime_type,
            context.is_some()
        );
        let request = GenerateRequest::new(build_image_prompt(context), Some(image));
        self.generate(credential, &request).await
    }

    async fn analyze_text(&self, credential: &str, text: &str) -> Result<HealthyReport, AnalysisError> {
        log::info!("[LLM] Text analysis: {} chars", text.len());
        let request = GenerateRequest::new(build_text_prompt(text), None);
        self.generate(credential, &request).await
    }
}
