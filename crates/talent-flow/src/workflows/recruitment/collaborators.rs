use async_trait::async_trait;

use super::domain::{CandidateFields, JobProfile, NotificationKind, ScheduledInterview, StructuredCandidate};

/// Error raised by the text extraction collaborator. Non-fatal to a batch.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExtractionError {
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),
    #[error("document could not be decoded: {0}")]
    Unreadable(String),
    #[error("extraction timed out after {0}s")]
    Timeout(u64),
}

/// Error raised by the evaluation collaborator. Downgraded to a sentinel
/// record by the scoring engine.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EvaluationError {
    #[error("evaluation backend unavailable: {0}")]
    Unavailable(String),
    #[error("evaluation produced an unusable payload: {0}")]
    MalformedResponse(String),
    #[error("evaluation timed out after {0}s")]
    Timeout(u64),
}

/// Error raised by the notification or calendar collaborators. Recorded on
/// the run after one immediate retry.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DispatchError {
    #[error("transport unavailable: {0}")]
    Transport(String),
    #[error("recipient rejected: {0}")]
    Rejected(String),
    #[error("dispatch timed out after {0}s")]
    Timeout(u64),
}

/// Turns an uploaded document into plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, content: &[u8], filename: &str) -> Result<String, ExtractionError>;
}

/// Derives structured fields and a compatibility score from candidate text.
#[async_trait]
pub trait CandidateEvaluator: Send + Sync {
    async fn evaluate(
        &self,
        candidate_text: &str,
        profile: &JobProfile,
    ) -> Result<CandidateFields, EvaluationError>;
}

/// Sends outcome or invitation messages to a candidate.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn notify(
        &self,
        candidate: &StructuredCandidate,
        kind: NotificationKind,
    ) -> Result<(), DispatchError>;
}

/// Mirrors a scheduled interview into an external calendar. Failure never
/// unwinds the binding recorded on the run.
#[async_trait]
pub trait CalendarBooker: Send + Sync {
    async fn book(&self, interview: &ScheduledInterview) -> Result<String, DispatchError>;
}
