//! Recruitment pipeline orchestration: intake, scoring, human review,
//! notification dispatch, interview scheduling, and reporting.

pub mod collaborators;
pub mod domain;
pub mod orchestrator;
pub mod report;
pub mod review;
pub mod router;
pub mod runs;
pub mod scheduling;
pub mod scoring;

#[cfg(test)]
mod tests;

pub use collaborators::{
    CalendarBooker, CandidateEvaluator, DispatchError, EvaluationError, ExtractionError,
    NotificationSender, TextExtractor,
};
pub use domain::{
    CandidateDocument, CandidateFields, DeliveryStatus, Disposition, InterviewDetails,
    InterviewKind, InterviewSlot, JobProfile, NotificationKind, NotificationRecord,
    RankedCandidate, RawCandidate, RunCounters, RunId, RunState, RunStatus, ScheduledInterview,
    StructuredCandidate,
};
pub use orchestrator::{
    Collaborators, ScheduleOutcome, StructuralError, WorkflowError, WorkflowOrchestrator,
};
pub use report::{ReportBlob, ReportError, ReportFormat, RunReport};
pub use review::{DecisionReceipt, ReviewDecision, ReviewGate};
pub use router::recruitment_router;
pub use runs::{RepositoryError, RunRepository, RunStateView};
pub use scheduling::{
    generate_slots, ConflictError, NotFoundError, ScheduleError, SlotAllocator, SlotTemplate,
};
pub use scoring::ScoringEngine;
