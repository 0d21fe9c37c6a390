use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::WorkflowConfig;
use crate::workflows::recruitment::collaborators::{
    CalendarBooker, CandidateEvaluator, DispatchError, EvaluationError, ExtractionError,
    NotificationSender, TextExtractor,
};
use crate::workflows::recruitment::domain::{
    CandidateDocument, CandidateFields, JobProfile, NotificationKind, RunId, RunState,
    ScheduledInterview, StructuredCandidate,
};
use crate::workflows::recruitment::orchestrator::{Collaborators, WorkflowOrchestrator};
use crate::workflows::recruitment::runs::{RepositoryError, RunRepository};

pub(super) fn profile() -> JobProfile {
    JobProfile {
        title: "Senior Backend Engineer".to_string(),
        required_skills: vec!["Python".to_string(), "SQL".to_string()],
        minimum_experience_years: 3,
        required_languages: vec!["English".to_string()],
        description: "Backend services for the data platform.".to_string(),
        location: "Remote".to_string(),
        salary_range: Some("$90k - $120k".to_string()),
    }
}

pub(super) fn document(filename: &str, content: &str) -> CandidateDocument {
    CandidateDocument {
        filename: filename.to_string(),
        content: content.to_string(),
    }
}

pub(super) fn fields(name: &str, email: &str, score: i64, skills: &[&str]) -> CandidateFields {
    CandidateFields {
        name: name.to_string(),
        email: email.to_string(),
        phone: None,
        experience_years: Some(5),
        skills: skills.iter().map(|skill| skill.to_string()).collect(),
        languages: vec!["English".to_string()],
        education: vec!["BSc Computer Science".to_string()],
        match_score: score,
        notes: "baseline evaluation".to_string(),
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryRuns {
    runs: Arc<Mutex<HashMap<RunId, RunState>>>,
}

impl RunRepository for MemoryRuns {
    fn insert(&self, run: RunState) -> Result<(), RepositoryError> {
        let mut guard = self.runs.lock().expect("run mutex poisoned");
        if guard.contains_key(&run.run_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(run.run_id.clone(), run);
        Ok(())
    }

    fn update(&self, run: RunState) -> Result<(), RepositoryError> {
        let mut guard = self.runs.lock().expect("run mutex poisoned");
        if !guard.contains_key(&run.run_id) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(run.run_id.clone(), run);
        Ok(())
    }

    fn fetch(&self, id: &RunId) -> Result<Option<RunState>, RepositoryError> {
        let guard = self.runs.lock().expect("run mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<RunId>, RepositoryError> {
        let guard = self.runs.lock().expect("run mutex poisoned");
        Ok(guard.keys().cloned().collect())
    }

    fn remove(&self, id: &RunId) -> Result<(), RepositoryError> {
        let mut guard = self.runs.lock().expect("run mutex poisoned");
        guard.remove(id).map(|_| ()).ok_or(RepositoryError::NotFound)
    }
}

/// Passes document bytes through as UTF-8 text.
pub(super) struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, content: &[u8], filename: &str) -> Result<String, ExtractionError> {
        String::from_utf8(content.to_vec())
            .map_err(|_| ExtractionError::Unreadable(filename.to_string()))
    }
}

/// Fails for documents whose name is registered, extracts the rest.
pub(super) struct SelectiveExtractor {
    pub(super) fail_files: HashSet<String>,
}

#[async_trait]
impl TextExtractor for SelectiveExtractor {
    async fn extract(&self, content: &[u8], filename: &str) -> Result<String, ExtractionError> {
        if self.fail_files.contains(filename) {
            return Err(ExtractionError::UnsupportedFormat(filename.to_string()));
        }
        String::from_utf8(content.to_vec())
            .map_err(|_| ExtractionError::Unreadable(filename.to_string()))
    }
}

/// Returns canned fields keyed by the exact candidate text; unknown text
/// fails the evaluation.
#[derive(Default)]
pub(super) struct ScriptedEvaluator {
    outcomes: Mutex<HashMap<String, CandidateFields>>,
}

impl ScriptedEvaluator {
    pub(super) fn with(mut self, text: &str, fields: CandidateFields) -> Self {
        self.outcomes
            .get_mut()
            .expect("outcome mutex poisoned")
            .insert(text.to_string(), fields);
        self
    }
}

#[async_trait]
impl CandidateEvaluator for ScriptedEvaluator {
    async fn evaluate(
        &self,
        candidate_text: &str,
        _profile: &JobProfile,
    ) -> Result<CandidateFields, EvaluationError> {
        let outcomes = self.outcomes.lock().expect("outcome mutex poisoned");
        outcomes
            .get(candidate_text)
            .cloned()
            .ok_or_else(|| EvaluationError::Unavailable("no evaluation on file".to_string()))
    }
}

/// Evaluator that never resolves, for timeout coverage.
pub(super) struct HangingEvaluator;

#[async_trait]
impl CandidateEvaluator for HangingEvaluator {
    async fn evaluate(
        &self,
        _candidate_text: &str,
        _profile: &JobProfile,
    ) -> Result<CandidateFields, EvaluationError> {
        std::future::pending().await
    }
}

/// Records every dispatch; emails in `fail_emails` fail on every attempt,
/// emails in `flaky_emails` fail only the first attempt.
#[derive(Default)]
pub(super) struct RecordingNotifier {
    pub(super) sent: Mutex<Vec<(String, NotificationKind)>>,
    pub(super) fail_emails: HashSet<String>,
    pub(super) flaky_emails: HashSet<String>,
    attempts: Mutex<HashMap<String, u32>>,
}

impl RecordingNotifier {
    pub(super) fn failing(emails: &[&str]) -> Self {
        Self {
            fail_emails: emails.iter().map(|email| email.to_string()).collect(),
            ..Self::default()
        }
    }

    pub(super) fn flaky(emails: &[&str]) -> Self {
        Self {
            flaky_emails: emails.iter().map(|email| email.to_string()).collect(),
            ..Self::default()
        }
    }

    pub(super) fn deliveries(&self) -> Vec<(String, NotificationKind)> {
        self.sent.lock().expect("sent mutex poisoned").clone()
    }
}

#[async_trait]
impl NotificationSender for RecordingNotifier {
    async fn notify(
        &self,
        candidate: &StructuredCandidate,
        kind: NotificationKind,
    ) -> Result<(), DispatchError> {
        let attempt = {
            let mut attempts = self.attempts.lock().expect("attempt mutex poisoned");
            let entry = attempts.entry(candidate.email.clone()).or_insert(0);
            *entry += 1;
            *entry
        };

        if self.fail_emails.contains(&candidate.email) {
            return Err(DispatchError::Transport("smtp unreachable".to_string()));
        }
        if self.flaky_emails.contains(&candidate.email) && attempt == 1 {
            return Err(DispatchError::Transport("transient failure".to_string()));
        }

        self.sent
            .lock()
            .expect("sent mutex poisoned")
            .push((candidate.email.clone(), kind));
        Ok(())
    }
}

/// Records bookings and hands back synthetic event ids.
#[derive(Default)]
pub(super) struct MemoryCalendar {
    pub(super) events: Mutex<Vec<ScheduledInterview>>,
}

#[async_trait]
impl CalendarBooker for MemoryCalendar {
    async fn book(&self, interview: &ScheduledInterview) -> Result<String, DispatchError> {
        let mut events = self.events.lock().expect("event mutex poisoned");
        events.push(interview.clone());
        Ok(format!("evt-{}", events.len()))
    }
}

pub(super) struct Fixture {
    pub(super) orchestrator: Arc<WorkflowOrchestrator<MemoryRuns>>,
    pub(super) repository: Arc<MemoryRuns>,
    pub(super) notifier: Arc<RecordingNotifier>,
    pub(super) calendar: Arc<MemoryCalendar>,
}

pub(super) fn fixture(
    evaluator: ScriptedEvaluator,
    notifier: RecordingNotifier,
    config: WorkflowConfig,
) -> Fixture {
    let repository = Arc::new(MemoryRuns::default());
    let notifier = Arc::new(notifier);
    let calendar = Arc::new(MemoryCalendar::default());
    let collaborators = Collaborators {
        extractor: Arc::new(PlainTextExtractor),
        evaluator: Arc::new(evaluator),
        notifier: notifier.clone(),
        calendar: Some(calendar.clone()),
    };
    let orchestrator = Arc::new(WorkflowOrchestrator::new(
        repository.clone(),
        collaborators,
        config,
    ));
    Fixture {
        orchestrator,
        repository,
        notifier,
        calendar,
    }
}

/// Three-document batch: a strong profile, a weak profile, and a document
/// with no evaluation on file.
pub(super) fn standard_batch() -> (ScriptedEvaluator, Vec<CandidateDocument>) {
    let evaluator = ScriptedEvaluator::default()
        .with(
            "ada cv",
            fields("Ada Lovelace", "ada@example.com", 85, &["Python", "SQL", "Docker"]),
        )
        .with(
            "bob cv",
            fields("Bob Martin", "bob@example.com", 45, &["Excel"]),
        );
    let documents = vec![
        document("ada.txt", "ada cv"),
        document("bob.txt", "bob cv"),
        document("dana.txt", "dana cv"),
    ];
    (evaluator, documents)
}
