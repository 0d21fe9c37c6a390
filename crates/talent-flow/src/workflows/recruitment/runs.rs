use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

use super::domain::{
    NotificationRecord, RunCounters, RunId, RunState, RunStatus,
};

/// Storage abstraction so the orchestrator can be exercised in isolation.
/// Implementations must be safe to share across the worker pool.
pub trait RunRepository: Send + Sync {
    fn insert(&self, run: RunState) -> Result<(), RepositoryError>;
    fn update(&self, run: RunState) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &RunId) -> Result<Option<RunState>, RepositoryError>;
    fn list(&self) -> Result<Vec<RunId>, RepositoryError>;
    fn remove(&self, id: &RunId) -> Result<(), RepositoryError>;
}

/// Error enumeration for run storage failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("run already exists")]
    Conflict,
    #[error("run not found")]
    NotFound,
    #[error("run storage unavailable: {0}")]
    Unavailable(String),
}

/// Candidate row exposed by status queries.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateView {
    pub name: String,
    pub email: String,
    pub match_score: u8,
    pub disposition: &'static str,
    pub intake_index: usize,
    pub source_file: String,
    pub notes: String,
}

/// Interview row exposed by status queries.
#[derive(Debug, Clone, Serialize)]
pub struct InterviewView {
    pub candidate_email: String,
    pub slot_start: NaiveDateTime,
    pub duration_minutes: u32,
    pub interviewer: String,
    pub location: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_event_id: Option<String>,
}

/// Sanitized snapshot of a run for API responses. Always reflects partial
/// progress, including per-candidate error notes.
#[derive(Debug, Clone, Serialize)]
pub struct RunStateView {
    pub run_id: RunId,
    pub status: &'static str,
    pub job_title: String,
    pub counters: RunCounters,
    pub candidates: Vec<CandidateView>,
    pub interviews: Vec<InterviewView>,
    pub notifications: Vec<NotificationRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RunStateView {
    pub fn from_state(run: &RunState) -> Self {
        let candidates = run
            .candidates
            .iter()
            .map(|ranked| CandidateView {
                name: ranked.candidate.name.clone(),
                email: ranked.candidate.email.clone(),
                match_score: ranked.candidate.match_score,
                disposition: ranked.disposition.label(),
                intake_index: ranked.intake_index,
                source_file: ranked.source_file.clone(),
                notes: ranked.candidate.notes.clone(),
            })
            .collect();

        let interviews = run
            .interviews
            .iter()
            .map(|interview| InterviewView {
                candidate_email: interview.candidate_email.clone(),
                slot_start: interview.slot_start,
                duration_minutes: interview.duration_minutes,
                interviewer: interview.interviewer.clone(),
                location: interview.location.clone(),
                kind: interview.kind.label(),
                external_event_id: interview.external_event_id.clone(),
            })
            .collect();

        Self {
            run_id: run.run_id.clone(),
            status: run.status.label(),
            job_title: run.profile.title.clone(),
            counters: run.counters,
            candidates,
            interviews,
            notifications: run.notifications.clone(),
            notes: run.notes.clone(),
            created_at: run.created_at,
            updated_at: run.updated_at,
        }
    }
}

/// True once the run has passed the review gate and the disposition counters
/// cover every candidate.
pub fn partition_complete(run: &RunState) -> bool {
    !matches!(
        run.status,
        RunStatus::Intake | RunStatus::Scoring | RunStatus::AwaitingReview
    ) && run.counters.total_candidates == run.counters.selected + run.counters.rejected
}
