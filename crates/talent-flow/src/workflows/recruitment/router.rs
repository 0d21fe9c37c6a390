use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{
    CandidateDocument, InterviewDetails, InterviewKind, JobProfile, RunId,
};
use super::orchestrator::{ScheduleOutcome, WorkflowError, WorkflowOrchestrator};
use super::report::ReportFormat;
use super::review::{DecisionReceipt, ReviewDecision};
use super::runs::{InterviewView, RunRepository, RunStateView};
use super::scheduling::ScheduleError;

/// Router builder exposing the run-facing workflow surface.
pub fn recruitment_router<R>(orchestrator: Arc<WorkflowOrchestrator<R>>) -> Router
where
    R: RunRepository + 'static,
{
    Router::new()
        .route("/api/v1/recruitment/runs", post(start_run_handler::<R>))
        .route(
            "/api/v1/recruitment/runs/:run_id",
            get(run_status_handler::<R>).delete(clear_run_handler::<R>),
        )
        .route(
            "/api/v1/recruitment/runs/:run_id/decisions",
            post(decisions_handler::<R>),
        )
        .route(
            "/api/v1/recruitment/runs/:run_id/finalize",
            post(finalize_handler::<R>),
        )
        .route(
            "/api/v1/recruitment/runs/:run_id/slots",
            get(free_slots_handler::<R>),
        )
        .route(
            "/api/v1/recruitment/runs/:run_id/interviews",
            post(schedule_handler::<R>),
        )
        .route(
            "/api/v1/recruitment/runs/:run_id/interviews/release",
            post(release_handler::<R>),
        )
        .route(
            "/api/v1/recruitment/runs/:run_id/cancel",
            post(cancel_handler::<R>),
        )
        .route(
            "/api/v1/recruitment/runs/:run_id/report",
            get(report_handler::<R>),
        )
        .with_state(orchestrator)
}

#[derive(Debug, Deserialize)]
pub struct StartRunRequest {
    pub job_profile: JobProfile,
    pub documents: Vec<CandidateDocument>,
}

#[derive(Debug, Deserialize)]
pub struct DecisionsRequest {
    pub decisions: BTreeMap<String, ReviewDecision>,
}

#[derive(Debug, Serialize)]
pub struct DecisionsResponse {
    pub receipt: DecisionReceipt,
    pub run: RunStateView,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleRequest {
    pub emails: Vec<String>,
    pub start: NaiveDateTime,
    pub interviewer: String,
    pub location: String,
    pub kind: InterviewKind,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Serialize)]
pub struct ScheduleItemView {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interview: Option<InterviewView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScheduleItemView {
    fn from_outcome(outcome: ScheduleOutcome) -> Self {
        match outcome.outcome {
            Ok(interview) => Self {
                email: outcome.email,
                interview: Some(InterviewView {
                    candidate_email: interview.candidate_email.clone(),
                    slot_start: interview.slot_start,
                    duration_minutes: interview.duration_minutes,
                    interviewer: interview.interviewer.clone(),
                    location: interview.location.clone(),
                    kind: interview.kind.label(),
                    external_event_id: interview.external_event_id,
                }),
                error: None,
            },
            Err(err) => Self {
                email: outcome.email,
                interview: None,
                error: Some(err.to_string()),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReleaseRequest {
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    #[serde(default)]
    pub format: Option<String>,
}

pub(crate) async fn start_run_handler<R>(
    State(orchestrator): State<Arc<WorkflowOrchestrator<R>>>,
    Json(request): Json<StartRunRequest>,
) -> Response
where
    R: RunRepository + 'static,
{
    match orchestrator
        .start_run(request.job_profile, request.documents)
        .await
    {
        Ok(run_id) => match orchestrator.run_status(&run_id) {
            Ok(view) => (StatusCode::ACCEPTED, Json(view)).into_response(),
            Err(err) => error_response(err),
        },
        Err(err) => error_response(err),
    }
}

pub(crate) async fn run_status_handler<R>(
    State(orchestrator): State<Arc<WorkflowOrchestrator<R>>>,
    Path(run_id): Path<String>,
) -> Response
where
    R: RunRepository + 'static,
{
    match orchestrator.run_status(&RunId(run_id)) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn clear_run_handler<R>(
    State(orchestrator): State<Arc<WorkflowOrchestrator<R>>>,
    Path(run_id): Path<String>,
) -> Response
where
    R: RunRepository + 'static,
{
    match orchestrator.clear_run(&RunId(run_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn decisions_handler<R>(
    State(orchestrator): State<Arc<WorkflowOrchestrator<R>>>,
    Path(run_id): Path<String>,
    Json(request): Json<DecisionsRequest>,
) -> Response
where
    R: RunRepository + 'static,
{
    match orchestrator
        .submit_decisions(&RunId(run_id), request.decisions)
        .await
    {
        Ok((receipt, run)) => {
            (StatusCode::OK, Json(DecisionsResponse { receipt, run })).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn finalize_handler<R>(
    State(orchestrator): State<Arc<WorkflowOrchestrator<R>>>,
    Path(run_id): Path<String>,
) -> Response
where
    R: RunRepository + 'static,
{
    match orchestrator.finalize_review(&RunId(run_id)).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn free_slots_handler<R>(
    State(orchestrator): State<Arc<WorkflowOrchestrator<R>>>,
    Path(run_id): Path<String>,
    Query(query): Query<SlotsQuery>,
) -> Response
where
    R: RunRepository + 'static,
{
    match orchestrator.free_slots(&RunId(run_id), query.date) {
        Ok(slots) => (StatusCode::OK, Json(slots)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn schedule_handler<R>(
    State(orchestrator): State<Arc<WorkflowOrchestrator<R>>>,
    Path(run_id): Path<String>,
    Json(request): Json<ScheduleRequest>,
) -> Response
where
    R: RunRepository + 'static,
{
    let details = InterviewDetails {
        interviewer: request.interviewer,
        location: request.location,
        kind: request.kind,
        notes: request.notes,
    };

    match orchestrator
        .schedule_interviews(&RunId(run_id), request.emails, request.start, details)
        .await
    {
        Ok(outcomes) => {
            let items: Vec<ScheduleItemView> = outcomes
                .into_iter()
                .map(ScheduleItemView::from_outcome)
                .collect();
            (StatusCode::OK, Json(items)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn release_handler<R>(
    State(orchestrator): State<Arc<WorkflowOrchestrator<R>>>,
    Path(run_id): Path<String>,
    Json(request): Json<ReleaseRequest>,
) -> Response
where
    R: RunRepository + 'static,
{
    match orchestrator
        .release_interview(&RunId(run_id), &request.email)
        .await
    {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn cancel_handler<R>(
    State(orchestrator): State<Arc<WorkflowOrchestrator<R>>>,
    Path(run_id): Path<String>,
    request: Option<Json<CancelRequest>>,
) -> Response
where
    R: RunRepository + 'static,
{
    let reason = request.and_then(|Json(body)| body.reason);
    match orchestrator.cancel_run(&RunId(run_id), reason).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn report_handler<R>(
    State(orchestrator): State<Arc<WorkflowOrchestrator<R>>>,
    Path(run_id): Path<String>,
    Query(query): Query<ReportQuery>,
) -> Response
where
    R: RunRepository + 'static,
{
    let format = match query.format.as_deref() {
        None => ReportFormat::SummaryText,
        Some(raw) => match ReportFormat::parse(raw) {
            Some(format) => format,
            None => {
                let payload = json!({
                    "error": format!("unknown report format '{raw}'"),
                });
                return (StatusCode::BAD_REQUEST, Json(payload)).into_response();
            }
        },
    };

    match orchestrator.report(&RunId(run_id), format).await {
        Ok(blob) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, blob.content_type.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", blob.filename),
                ),
            ],
            blob.bytes,
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: WorkflowError) -> Response {
    let status = match &err {
        WorkflowError::RunNotFound(_) => StatusCode::NOT_FOUND,
        WorkflowError::Structural(_) => StatusCode::BAD_REQUEST,
        WorkflowError::InvalidTransition { .. } => StatusCode::CONFLICT,
        WorkflowError::Schedule(schedule) => match schedule {
            ScheduleError::Conflict(_) => StatusCode::CONFLICT,
            ScheduleError::NotFound(_) => StatusCode::NOT_FOUND,
            ScheduleError::NotEligible { .. } | ScheduleError::NoFreeSlot { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
        },
        WorkflowError::Repository(_) | WorkflowError::Report(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let payload = json!({ "error": err.to_string() });
    (status, Json(payload)).into_response()
}
