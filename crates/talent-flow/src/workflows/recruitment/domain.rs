use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for workflow runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hiring profile the batch is screened against. Immutable once a run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProfile {
    pub title: String,
    pub required_skills: Vec<String>,
    pub minimum_experience_years: u32,
    pub required_languages: Vec<String>,
    pub description: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary_range: Option<String>,
}

/// Raw document handed in at intake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDocument {
    pub filename: String,
    pub content: String,
}

/// Intake record carrying the extracted text and its provenance.
/// Never mutated after the intake phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCandidate {
    pub intake_index: usize,
    pub source_file: String,
    pub text: String,
    /// Populated when extraction failed; scoring downgrades such a record to
    /// a sentinel instead of dropping it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_error: Option<String>,
}

/// Structured fields returned by the evaluation collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateFields {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_years: Option<u32>,
    pub skills: Vec<String>,
    pub languages: Vec<String>,
    pub education: Vec<String>,
    pub match_score: i64,
    pub notes: String,
}

/// Post-processed candidate record. The match score is always present, even
/// for failed evaluations (sentinel score 0 with an explanatory note).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredCandidate {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub experience_years: u32,
    pub skills: Vec<String>,
    pub languages: Vec<String>,
    pub education: Vec<String>,
    pub match_score: u8,
    pub notes: String,
}

/// Review status of a candidate within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Pending,
    Selected,
    Rejected,
}

impl Disposition {
    pub const fn label(self) -> &'static str {
        match self {
            Disposition::Pending => "pending",
            Disposition::Selected => "selected",
            Disposition::Rejected => "rejected",
        }
    }
}

/// A structured candidate plus its disposition and intake provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub candidate: StructuredCandidate,
    pub disposition: Disposition,
    pub intake_index: usize,
    pub source_file: String,
}

/// A bookable interview window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewSlot {
    pub start: NaiveDateTime,
    pub duration_minutes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bound_to: Option<String>,
}

/// Interview delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewKind {
    Phone,
    Video,
    InPerson,
}

impl InterviewKind {
    pub const fn label(self) -> &'static str {
        match self {
            InterviewKind::Phone => "phone",
            InterviewKind::Video => "video",
            InterviewKind::InPerson => "in_person",
        }
    }
}

/// Details supplied when booking a candidate into a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewDetails {
    pub interviewer: String,
    pub location: String,
    pub kind: InterviewKind,
    #[serde(default)]
    pub notes: String,
}

/// Binding of one candidate to exactly one slot within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledInterview {
    pub candidate_email: String,
    pub slot_start: NaiveDateTime,
    pub duration_minutes: u32,
    pub interviewer: String,
    pub location: String,
    pub kind: InterviewKind,
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_event_id: Option<String>,
}

/// Message category handed to the notification collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Selected,
    Rejected,
    InterviewInvite,
}

impl NotificationKind {
    pub const fn label(self) -> &'static str {
        match self {
            NotificationKind::Selected => "selected",
            NotificationKind::Rejected => "rejected",
            NotificationKind::InterviewInvite => "interview_invite",
        }
    }
}

/// Delivery status of one notification attempt chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

/// Per-candidate dispatch bookkeeping kept on the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub email: String,
    pub kind: NotificationKind,
    pub status: DeliveryStatus,
    pub attempts: u8,
    #[serde(default)]
    pub note: String,
}

/// Workflow position of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Intake,
    Scoring,
    AwaitingReview,
    Notifying,
    Scheduling,
    Reporting,
    Complete,
    Failed,
}

impl RunStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RunStatus::Intake => "intake",
            RunStatus::Scoring => "scoring",
            RunStatus::AwaitingReview => "awaiting_review",
            RunStatus::Notifying => "notifying",
            RunStatus::Scheduling => "scheduling",
            RunStatus::Reporting => "reporting",
            RunStatus::Complete => "complete",
            RunStatus::Failed => "failed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Complete | RunStatus::Failed)
    }
}

/// Aggregate counters surfaced by status queries and reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    pub total_candidates: usize,
    pub selected: usize,
    pub rejected: usize,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
    pub interviews_scheduled: usize,
}

/// Full record of one workflow execution. Mutated only by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: RunId,
    pub status: RunStatus,
    pub profile: JobProfile,
    pub candidates: Vec<RankedCandidate>,
    pub interviews: Vec<ScheduledInterview>,
    pub notifications: Vec<NotificationRecord>,
    pub counters: RunCounters,
    /// Run-level notes, e.g. the cancellation reason. Per-candidate error
    /// detail travels on the candidate records themselves.
    pub notes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RunState {
    pub fn new(run_id: RunId, profile: JobProfile, now: DateTime<Utc>) -> Self {
        Self {
            run_id,
            status: RunStatus::Intake,
            profile,
            candidates: Vec::new(),
            interviews: Vec::new(),
            notifications: Vec::new(),
            counters: RunCounters::default(),
            notes: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn candidate_by_email(&self, email: &str) -> Option<&RankedCandidate> {
        self.candidates
            .iter()
            .find(|ranked| ranked.candidate.email == email)
    }

    /// Refresh the disposition counters from the candidate list.
    pub fn recount(&mut self) {
        self.counters.total_candidates = self.candidates.len();
        self.counters.selected = self
            .candidates
            .iter()
            .filter(|ranked| ranked.disposition == Disposition::Selected)
            .count();
        self.counters.rejected = self
            .candidates
            .iter()
            .filter(|ranked| ranked.disposition == Disposition::Rejected)
            .count();
        self.counters.notifications_sent = self
            .notifications
            .iter()
            .filter(|record| record.status == DeliveryStatus::Sent)
            .count();
        self.counters.notifications_failed = self
            .notifications
            .iter()
            .filter(|record| record.status == DeliveryStatus::Failed)
            .count();
        self.counters.interviews_scheduled = self.interviews.len();
    }
}
