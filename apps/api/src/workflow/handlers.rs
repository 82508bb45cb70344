//! Axum route handlers for the workflow sessions API.

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::analysis::AnalysisResult;
use crate::state::AppState;
use crate::workflow::session::{Phase, Session, StageOutcome};

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
}

/// Snapshot of one session, the shape the dashboard polls.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub phase: Phase,
    pub resume_file_name: Option<String>,
    pub job_description: String,
    pub is_analyzing: bool,
    pub result: Option<AnalysisResult>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct JobDescriptionRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub result: AnalysisResult,
}

fn session_view(session_id: Uuid, session: &Session) -> SessionView {
    SessionView {
        session_id,
        phase: session.phase(),
        resume_file_name: session
            .staged_resume
            .as_ref()
            .map(|r| r.file_name.clone()),
        job_description: session.job_description.clone(),
        is_analyzing: session.is_analyzing,
        result: session.result.clone(),
        error: session.error.clone(),
        created_at: session.created_at,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/sessions
///
/// Creates an empty workflow session and returns its id.
pub async fn handle_create_session(State(state): State<AppState>) -> Json<CreateSessionResponse> {
    let session_id = state.sessions.create().await;
    info!(%session_id, "session created");
    Json(CreateSessionResponse { session_id })
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let view = state
        .sessions
        .with_session(session_id, |s| session_view(session_id, s))
        .await?;
    Ok(Json(view))
}

/// POST /api/v1/sessions/:id/resume
///
/// Multipart upload of the resume. Only `application/pdf` parts are
/// accepted; the bytes are base64-encoded and staged as one transition.
/// The read token is taken before the body is consumed so a slow upload
/// cannot clobber a file selected after it.
pub async fn handle_upload_resume(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<SessionView>, AppError> {
    let token = state
        .sessions
        .with_session(session_id, |s| s.begin_file_read())
        .await?;

    let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Read(e.to_string()))?
    else {
        return Err(AppError::Validation(
            "A multipart file field is required.".to_string(),
        ));
    };

    let file_name = field.file_name().unwrap_or("resume.pdf").to_string();
    let media_type = field.content_type().unwrap_or_default().to_string();

    let bytes = match field.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            state
                .sessions
                .with_session(session_id, |s| {
                    s.fail_file_read(token, "Failed to read file.")
                })
                .await?;
            return Err(AppError::Read(e.to_string()));
        }
    };

    let (outcome, view) = state
        .sessions
        .with_session(session_id, |s| {
            let outcome = s.stage_resume(token, &file_name, &media_type, &bytes);
            (outcome, session_view(session_id, s))
        })
        .await?;

    match outcome {
        StageOutcome::Staged => {
            info!(%session_id, file_name = %file_name, bytes = bytes.len(), "resume staged");
            Ok(Json(view))
        }
        StageOutcome::Stale => Err(AppError::Conflict(
            "A newer file selection superseded this upload.".to_string(),
        )),
        StageOutcome::Rejected => {
            Err(AppError::Validation("Please upload a PDF file.".to_string()))
        }
    }
}

/// PUT /api/v1/sessions/:id/job-description
///
/// Replaces the job description text verbatim; trimming happens only at
/// submit validation.
pub async fn handle_set_job_description(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<JobDescriptionRequest>,
) -> Result<Json<SessionView>, AppError> {
    let view = state
        .sessions
        .with_session(session_id, |s| {
            s.set_job_description(request.text);
            session_view(session_id, s)
        })
        .await?;
    Ok(Json(view))
}

/// POST /api/v1/sessions/:id/analyze
///
/// Submit: validates the staged inputs, invokes the analyzer exactly once,
/// and stores the outcome. The session lock is not held across the call;
/// the ticket token discards a completion that a reset made stale.
pub async fn handle_analyze(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let ticket = state
        .sessions
        .with_session(session_id, |s| s.begin_analysis())
        .await??;

    info!(%session_id, "analysis started");

    let outcome = state
        .analyzer
        .analyze(
            &ticket.resume_base64,
            &ticket.media_type,
            &ticket.job_description,
        )
        .await;

    match outcome {
        Ok(result) => {
            state
                .sessions
                .with_session(session_id, |s| {
                    s.complete_analysis(ticket.token, Ok(result.clone()))
                })
                .await?;
            info!(%session_id, score = result.score, "analysis succeeded");
            Ok(Json(AnalyzeResponse { result }))
        }
        Err(e) => {
            let message = e.user_message();
            let _ = state
                .sessions
                .with_session(session_id, |s| {
                    s.complete_analysis(ticket.token, Err(message))
                })
                .await;
            Err(AppError::Analysis(e))
        }
    }
}

/// POST /api/v1/sessions/:id/reset
///
/// Restores the canonical empty state from any phase. An in-flight analysis
/// is not aborted; its eventual completion is discarded.
pub async fn handle_reset(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let view = state
        .sessions
        .with_session(session_id, |s| {
            s.reset();
            session_view(session_id, s)
        })
        .await?;
    info!(%session_id, "session reset");
    Ok(Json(view))
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisError, Analyzer};
    use crate::routes::build_router;
    use crate::workflow::store::SessionStore;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use axum::Router;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tower::util::ServiceExt;

    /// Analyzer fake: counts invocations, returns the scripted result or an
    /// EmptyContent failure when none is scripted.
    struct ScriptedAnalyzer {
        calls: AtomicUsize,
        result: Option<AnalysisResult>,
    }

    impl ScriptedAnalyzer {
        fn succeeding() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                result: Some(sample_result()),
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                result: None,
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Analyzer for ScriptedAnalyzer {
        async fn analyze(
            &self,
            _resume_base64: &str,
            _media_type: &str,
            _job_description: &str,
        ) -> Result<AnalysisResult, AnalysisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone().ok_or(AnalysisError::EmptyContent)
        }
    }

    fn sample_result() -> AnalysisResult {
        serde_json::from_str(
            r#"{
                "score": 72,
                "domain": "Data Science",
                "summary": "ok",
                "matchedSkills": ["Python"],
                "missingSkills": ["SQL"],
                "strengths": ["clear formatting"],
                "weaknesses": ["no metrics"],
                "improvementSuggestions": ["add numbers"],
                "formattingFeedback": "fine"
            }"#,
        )
        .unwrap()
    }

    fn test_app(analyzer: Arc<ScriptedAnalyzer>) -> Router {
        build_router(AppState {
            sessions: SessionStore::new(),
            analyzer,
        })
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, value)
    }

    async fn create_session(app: &Router) -> Uuid {
        let (status, body) = send(
            app,
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/sessions")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["session_id"].as_str().unwrap().parse().unwrap()
    }

    fn multipart_request(
        session_id: Uuid,
        file_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Request<Body> {
        let boundary = "X-RESUME-TEST-BOUNDARY";
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"resume\"; filename=\"{file_name}\"\r\n")
                .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        Request::builder()
            .method(Method::POST)
            .uri(format!("/api/v1/sessions/{session_id}/resume"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn job_description_request(session_id: Uuid, text: &str) -> Request<Body> {
        Request::builder()
            .method(Method::PUT)
            .uri(format!("/api/v1/sessions/{session_id}/job-description"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                serde_json::to_vec(&serde_json::json!({ "text": text })).unwrap(),
            ))
            .unwrap()
    }

    fn post(session_id: Uuid, action: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(format!("/api/v1/sessions/{session_id}/{action}"))
            .body(Body::empty())
            .unwrap()
    }

    fn get_session(session_id: Uuid) -> Request<Body> {
        Request::builder()
            .method(Method::GET)
            .uri(format!("/api/v1/sessions/{session_id}"))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_unknown_session_is_404() {
        let app = test_app(Arc::new(ScriptedAnalyzer::succeeding()));
        let (status, body) = send(&app, get_session(Uuid::new_v4())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_upload_rejects_non_pdf_media_type() {
        let app = test_app(Arc::new(ScriptedAnalyzer::succeeding()));
        let session_id = create_session(&app).await;

        let (status, body) = send(
            &app,
            multipart_request(session_id, "resume.png", "image/png", b"not a pdf"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Please upload a PDF file.");

        let (_, view) = send(&app, get_session(session_id)).await;
        assert_eq!(view["error"], "Please upload a PDF file.");
        assert!(view["resume_file_name"].is_null());
    }

    #[tokio::test]
    async fn test_upload_stages_pdf() {
        let app = test_app(Arc::new(ScriptedAnalyzer::succeeding()));
        let session_id = create_session(&app).await;

        let (status, view) = send(
            &app,
            multipart_request(session_id, "resume.pdf", "application/pdf", b"%PDF-1.4"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["phase"], "file_staged");
        assert_eq!(view["resume_file_name"], "resume.pdf");
        assert!(view["error"].is_null());
    }

    #[tokio::test]
    async fn test_analyze_without_resume_never_calls_analyzer() {
        let analyzer = Arc::new(ScriptedAnalyzer::succeeding());
        let app = test_app(analyzer.clone());
        let session_id = create_session(&app).await;

        let (status, body) = send(&app, post(session_id, "analyze")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Please upload a resume first.");
        assert_eq!(analyzer.call_count(), 0);
    }

    #[tokio::test]
    async fn test_analyze_with_blank_job_description_never_calls_analyzer() {
        let analyzer = Arc::new(ScriptedAnalyzer::succeeding());
        let app = test_app(analyzer.clone());
        let session_id = create_session(&app).await;

        send(
            &app,
            multipart_request(session_id, "resume.pdf", "application/pdf", b"%PDF-1.4"),
        )
        .await;
        send(&app, job_description_request(session_id, "   \n\t")).await;

        let (status, body) = send(&app, post(session_id, "analyze")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"]["message"],
            "Please enter a job description for matching."
        );
        assert_eq!(analyzer.call_count(), 0);
    }

    #[tokio::test]
    async fn test_full_analysis_flow() {
        let analyzer = Arc::new(ScriptedAnalyzer::succeeding());
        let app = test_app(analyzer.clone());
        let session_id = create_session(&app).await;

        send(
            &app,
            multipart_request(session_id, "resume.pdf", "application/pdf", b"%PDF-1.4"),
        )
        .await;
        send(
            &app,
            job_description_request(session_id, "Senior Rust Engineer, 5+ years"),
        )
        .await;

        let (status, body) = send(&app, post(session_id, "analyze")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["score"], 72.0);
        assert_eq!(body["result"]["domain"], "Data Science");
        assert_eq!(analyzer.call_count(), 1);

        let (_, view) = send(&app, get_session(session_id)).await;
        assert_eq!(view["phase"], "succeeded");
        assert_eq!(view["is_analyzing"], false);
        assert_eq!(view["result"]["matchedSkills"][0], "Python");
        assert!(view["error"].is_null());
    }

    #[tokio::test]
    async fn test_failed_analysis_sets_session_error() {
        let analyzer = Arc::new(ScriptedAnalyzer::failing());
        let app = test_app(analyzer.clone());
        let session_id = create_session(&app).await;

        send(
            &app,
            multipart_request(session_id, "resume.pdf", "application/pdf", b"%PDF-1.4"),
        )
        .await;
        send(&app, job_description_request(session_id, "Backend role")).await;

        let (status, body) = send(&app, post(session_id, "analyze")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(
            body["error"]["message"],
            "Analysis failed. Please try again."
        );
        assert_eq!(analyzer.call_count(), 1);

        let (_, view) = send(&app, get_session(session_id)).await;
        assert_eq!(view["phase"], "failed");
        assert_eq!(view["is_analyzing"], false);
        assert!(view["result"].is_null());
        assert_eq!(view["error"], "Analysis failed. Please try again.");
    }

    #[tokio::test]
    async fn test_reset_restores_empty_state() {
        let app = test_app(Arc::new(ScriptedAnalyzer::succeeding()));
        let session_id = create_session(&app).await;

        send(
            &app,
            multipart_request(session_id, "resume.pdf", "application/pdf", b"%PDF-1.4"),
        )
        .await;
        send(&app, job_description_request(session_id, "Backend role")).await;
        send(&app, post(session_id, "analyze")).await;

        let (status, view) = send(&app, post(session_id, "reset")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["phase"], "idle");
        assert_eq!(view["job_description"], "");
        assert!(view["resume_file_name"].is_null());
        assert!(view["result"].is_null());
        assert!(view["error"].is_null());
    }

    #[tokio::test]
    async fn test_new_upload_clears_previous_result() {
        let app = test_app(Arc::new(ScriptedAnalyzer::succeeding()));
        let session_id = create_session(&app).await;

        send(
            &app,
            multipart_request(session_id, "resume.pdf", "application/pdf", b"%PDF-1.4"),
        )
        .await;
        send(&app, job_description_request(session_id, "Backend role")).await;
        send(&app, post(session_id, "analyze")).await;

        let (status, view) = send(
            &app,
            multipart_request(session_id, "second.pdf", "application/pdf", b"%PDF-1.5"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["phase"], "file_staged");
        assert_eq!(view["resume_file_name"], "second.pdf");
        assert!(view["result"].is_null());
        assert!(view["error"].is_null());
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = test_app(Arc::new(ScriptedAnalyzer::succeeding()));
        let (status, body) = send(
            &app,
            Request::builder()
                .method(Method::GET)
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}
