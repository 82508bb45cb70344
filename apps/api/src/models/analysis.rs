use serde::{Deserialize, Serialize};

/// The structured verdict produced by one analysis call.
///
/// Every field is required and has no default: a payload missing any of the
/// nine fields, or carrying a wrong-typed one, fails deserialization. That
/// failure boundary IS the schema-violation check of the analysis client.
/// The wire format is camelCase because the response schema sent to the
/// model names the fields that way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// ATS compatibility score, 0–100.
    pub score: f64,
    /// Single classified professional domain (e.g. "Data Science").
    pub domain: String,
    /// Short free-text profile summary in relation to the role.
    pub summary: String,
    /// Skills found in both the resume and the job description.
    pub matched_skills: Vec<String>,
    /// Required skills absent from the resume.
    pub missing_skills: Vec<String>,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub improvement_suggestions: Vec<String>,
    /// Free-text feedback on structure, readability, ATS-friendliness.
    pub formatting_feedback: String,
}
