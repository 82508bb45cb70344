// Prompt constants for the analysis client.
// The job description is embedded verbatim between explicit delimiters so
// the model cannot confuse it with the surrounding instructions.

/// Instruction sent alongside the inline resume.
/// Replace `{job_description}` before sending.
pub const ANALYSIS_PROMPT_TEMPLATE: &str = r#"Act as an expert ATS (Applicant Tracking System) and Senior Technical Recruiter.
Analyze the provided resume against this Job Description:

--- JOB DESCRIPTION ---
{job_description}
--- END JOB DESCRIPTION ---

Perform a deep analysis of the resume content, structure, and keyword matching.
Calculate an ATS score from 0-100.
Identify specific skills present and missing.
Classify the domain.
Provide constructive feedback for improvement."#;

/// Builds the full analysis instruction for one request.
pub fn build_analysis_prompt(job_description: &str) -> String {
    ANALYSIS_PROMPT_TEMPLATE.replace("{job_description}", job_description)
}
