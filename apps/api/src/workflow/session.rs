//! Workflow session — the single mutable record driving the linear
//! upload → describe → analyze → result flow.
//!
//! Every transition happens under the store lock and replaces fields as one
//! atomic step. The two suspension points (file read, analysis call) run
//! outside the lock and re-enter through token-checked completions, so a
//! stale completion can never clobber state a newer operation produced.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::AppError;
use crate::models::analysis::AnalysisResult;

/// The only media type a resume upload may declare.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// A staged resume: the declared media type plus the base64 encoding of the
/// uploaded bytes. Present iff a file passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedResume {
    pub file_name: String,
    pub media_type: String,
    /// Base64 of the raw file bytes, recomputed on every selection.
    pub data: String,
}

/// Visible phase of the workflow, derived from the session fields.
/// At most one of {analyzing, result, error} drives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    FileStaged,
    Analyzing,
    Succeeded,
    Failed,
}

/// Outcome of applying a finished file read to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Staged,
    /// A newer selection superseded this read; nothing was applied.
    Stale,
    /// Declared media type was not PDF; the session error was set and the
    /// previously staged resume (if any) was left untouched.
    Rejected,
}

/// Everything the analyzer needs for one submit, captured under the lock.
#[derive(Debug, Clone)]
pub struct AnalysisTicket {
    pub token: u64,
    pub resume_base64: String,
    pub media_type: String,
    pub job_description: String,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub staged_resume: Option<StagedResume>,
    pub job_description: String,
    pub is_analyzing: bool,
    pub result: Option<AnalysisResult>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    read_seq: u64,
    analysis_seq: u64,
}

impl Session {
    pub fn new() -> Self {
        Self {
            staged_resume: None,
            job_description: String::new(),
            is_analyzing: false,
            result: None,
            error: None,
            created_at: Utc::now(),
            read_seq: 0,
            analysis_seq: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        if self.is_analyzing {
            Phase::Analyzing
        } else if self.result.is_some() {
            Phase::Succeeded
        } else if self.error.is_some() {
            Phase::Failed
        } else if self.staged_resume.is_some() {
            Phase::FileStaged
        } else {
            Phase::Idle
        }
    }

    /// Starts a file read. The returned token must accompany the completion;
    /// a token that no longer matches identifies a read that lost the race
    /// to a newer selection or a reset.
    pub fn begin_file_read(&mut self) -> u64 {
        self.read_seq += 1;
        self.read_seq
    }

    /// Applies a finished file read atomically. On success the resume is
    /// staged and any prior error and result are cleared; a non-PDF declared
    /// media type sets a validation error without touching the previously
    /// staged resume.
    pub fn stage_resume(
        &mut self,
        token: u64,
        file_name: &str,
        media_type: &str,
        bytes: &[u8],
    ) -> StageOutcome {
        if token != self.read_seq {
            return StageOutcome::Stale;
        }
        if media_type != PDF_MEDIA_TYPE {
            self.error = Some("Please upload a PDF file.".to_string());
            return StageOutcome::Rejected;
        }
        self.staged_resume = Some(StagedResume {
            file_name: file_name.to_string(),
            media_type: media_type.to_string(),
            data: BASE64.encode(bytes),
        });
        self.error = None;
        self.result = None;
        StageOutcome::Staged
    }

    /// Records a failed file read. The staged resume keeps whatever was
    /// there before the read began.
    pub fn fail_file_read(&mut self, token: u64, message: impl Into<String>) {
        if token != self.read_seq {
            return;
        }
        self.error = Some(message.into());
    }

    /// Replaces the job description text verbatim.
    pub fn set_job_description(&mut self, text: String) {
        self.job_description = text;
    }

    /// Checks the submit preconditions in order (first failure wins) and, if
    /// they hold, marks the session analyzing and hands back everything the
    /// analyzer needs. Only one analysis may be in flight at a time.
    pub fn begin_analysis(&mut self) -> Result<AnalysisTicket, AppError> {
        if self.is_analyzing {
            return Err(AppError::Conflict(
                "An analysis is already in progress.".to_string(),
            ));
        }
        let Some(resume) = self.staged_resume.clone() else {
            let message = "Please upload a resume first.";
            self.error = Some(message.to_string());
            return Err(AppError::Validation(message.to_string()));
        };
        if self.job_description.trim().is_empty() {
            let message = "Please enter a job description for matching.";
            self.error = Some(message.to_string());
            return Err(AppError::Validation(message.to_string()));
        }

        self.analysis_seq += 1;
        self.is_analyzing = true;
        self.error = None;
        self.result = None;

        Ok(AnalysisTicket {
            token: self.analysis_seq,
            resume_base64: resume.data,
            media_type: resume.media_type,
            job_description: self.job_description.clone(),
        })
    }

    /// Applies a finished analysis. A completion whose token no longer
    /// matches the current sequence (a reset raced it) is discarded.
    pub fn complete_analysis(&mut self, token: u64, outcome: Result<AnalysisResult, String>) {
        if token != self.analysis_seq {
            return;
        }
        self.is_analyzing = false;
        match outcome {
            Ok(result) => {
                self.result = Some(result);
                self.error = None;
            }
            Err(message) => {
                self.error = Some(message);
            }
        }
    }

    /// Restores the canonical empty state from any phase and invalidates
    /// in-flight reads and analyses. The in-flight work itself is not
    /// cancelled; its completion is discarded by the token check.
    pub fn reset(&mut self) {
        *self = Session {
            created_at: self.created_at,
            read_seq: self.read_seq + 1,
            analysis_seq: self.analysis_seq + 1,
            ..Session::new()
        };
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
