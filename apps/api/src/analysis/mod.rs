//! Analysis client — the single point of entry for all Gemini calls.
//!
//! ARCHITECTURAL RULE: no other module may call the Gemini API directly.
//! Each analysis is exactly one outbound `generateContent` request with a
//! strict response schema. No retries, no caching, no persistence of the
//! request or the response.
//!
//! Model: gemini-3-flash-preview (hardcoded — do not make configurable to
//! prevent drift)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

pub mod prompts;

use crate::analysis::prompts::build_analysis_prompt;
use crate::models::analysis::AnalysisResult;

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
/// The model used for all analysis calls.
/// This is intentionally hardcoded to prevent accidental drift.
pub const MODEL: &str = "gemini-3-flash-preview";

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("Analysis request timed out")]
    Timeout,

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Model returned no text content")]
    EmptyContent,

    #[error("Model response did not match the analysis schema: {0}")]
    Schema(#[from] serde_json::Error),
}

impl AnalysisError {
    fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AnalysisError::Timeout
        } else {
            AnalysisError::Http(e)
        }
    }

    /// The message stored on the session and shown to the user.
    ///
    /// Schema-class failures never leak parse internals to users; they are
    /// logged in full where the error is handled. Transport and API failures
    /// surface verbatim so the user has something actionable.
    pub fn user_message(&self) -> String {
        match self {
            AnalysisError::EmptyContent | AnalysisError::Schema(_) => {
                "Analysis failed. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types — Gemini generateContent request/response
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
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
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
    #[serde(rename = "responseSchema")]
    response_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// First text part of the first candidate, if the model returned one.
    fn text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .iter()
            .find_map(|p| p.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}

/// The strict output schema declared on every request: an object with the
/// exact nine fields of `AnalysisResult`, all required, arrays typed as
/// arrays of strings. The service is asked to emit nothing else.
fn analysis_response_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "score": {
                "type": "NUMBER",
                "description": "ATS compatibility score from 0 to 100 based on the job description match."
            },
            "domain": {
                "type": "STRING",
                "description": "The professional domain of the resume (e.g., Data Science, Web Development)."
            },
            "summary": {
                "type": "STRING",
                "description": "A professional summary of the candidate's profile in relation to the role."
            },
            "matchedSkills": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "List of technical and soft skills found in the resume that match the job description."
            },
            "missingSkills": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "Crucial skills found in the job description but missing from the resume."
            },
            "strengths": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "Key strengths identified in the resume content."
            },
            "weaknesses": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "Identified areas of improvement or missing context in the resume."
            },
            "improvementSuggestions": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "Actionable tips to improve the resume impact and ATS ranking."
            },
            "formattingFeedback": {
                "type": "STRING",
                "description": "Feedback on resume structure, readability, and ATS-friendliness."
            }
        },
        "required": [
            "score",
            "domain",
            "summary",
            "matchedSkills",
            "missingSkills",
            "strengths",
            "weaknesses",
            "improvementSuggestions",
            "formattingFeedback"
        ]
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Analyzer trait + Gemini implementation
// ────────────────────────────────────────────────────────────────────────────

/// The analysis seam. Implement this to swap the backing service without
/// touching handlers or the session state machine.
///
/// Carried in `AppState` as `Arc<dyn Analyzer>`.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(
        &self,
        resume_base64: &str,
        media_type: &str,
        job_description: &str,
    ) -> Result<AnalysisResult, AnalysisError>;
}

/// Gemini-backed analyzer. One request/response exchange per analysis.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: String, timeout: std::time::Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
        }
    }

    fn endpoint() -> String {
        format!("{GEMINI_API_URL}/{MODEL}:generateContent")
    }

    /// Assembles the single request: the resume as an inline-binary part
    /// tagged with its media type, followed by the recruiter instruction
    /// embedding the job description, plus the schema directive.
    fn build_request(
        resume_base64: &str,
        media_type: &str,
        job_description: &str,
    ) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: media_type.to_string(),
                            data: resume_base64.to_string(),
                        },
                    },
                    Part::Text {
                        text: build_analysis_prompt(job_description),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: analysis_response_schema(),
            },
        }
    }
}

#[async_trait]
impl Analyzer for GeminiClient {
    async fn analyze(
        &self,
        resume_base64: &str,
        media_type: &str,
        job_description: &str,
    ) -> Result<AnalysisResult, AnalysisError> {
        let request_body = Self::build_request(resume_base64, media_type, job_description);

        let response = self
            .client
            .post(Self::endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&request_body)
            .send()
            .await
            .map_err(AnalysisError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GeminiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(AnalysisError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .text()
            .await
            .map_err(AnalysisError::from_transport)?;
        let envelope: GenerateContentResponse = serde_json::from_str(&body)?;

        let text = envelope.text().ok_or(AnalysisError::EmptyContent)?;
        parse_analysis(text)
    }
}

/// Parses the model's text payload into the strict result shape.
/// No partial results: either all nine fields are present and correctly
/// typed, or the call is a failure.
fn parse_analysis(text: &str) -> Result<AnalysisResult, AnalysisError> {
    let result: AnalysisResult = serde_json::from_str(text.trim())?;
    debug!(score = result.score, domain = %result.domain, "analysis parsed");
    Ok(result)
}
