use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, Utc};
use tokio::sync::{Mutex as AsyncMutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::config::WorkflowConfig;

use super::collaborators::{
    CalendarBooker, CandidateEvaluator, DispatchError, EvaluationError, ExtractionError,
    NotificationSender, TextExtractor,
};
use super::domain::{
    CandidateDocument, DeliveryStatus, Disposition, InterviewDetails, InterviewSlot, JobProfile,
    NotificationKind, NotificationRecord, RawCandidate, RunId, RunState, RunStatus,
    ScheduledInterview, StructuredCandidate,
};
use super::report::{self, ReportBlob, ReportError, ReportFormat};
use super::review::{DecisionReceipt, ReviewDecision, ReviewGate};
use super::runs::{RepositoryError, RunRepository, RunStateView};
use super::scheduling::{NotFoundError, ScheduleError, SlotAllocator};
use super::scoring::ScoringEngine;

/// External service seams injected into the orchestrator. The calendar is
/// optional; without it interviews are only recorded internally.
#[derive(Clone)]
pub struct Collaborators {
    pub extractor: Arc<dyn TextExtractor>,
    pub evaluator: Arc<dyn CandidateEvaluator>,
    pub notifier: Arc<dyn NotificationSender>,
    pub calendar: Option<Arc<dyn CalendarBooker>>,
}

/// Request-level failures that invalidate the whole submission, as opposed
/// to per-candidate failures which downgrade to sentinel records.
#[derive(Debug, thiserror::Error)]
pub enum StructuralError {
    #[error("job profile field '{0}' must not be empty")]
    EmptyProfileField(&'static str),
    #[error("at least one candidate document is required")]
    NoCandidates,
}

/// Error raised past the orchestrator boundary. Per-candidate trouble never
/// appears here; it travels as notes inside the run state.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error("run {0} not found")]
    RunNotFound(RunId),
    #[error("run {run_id} is in state {status}, cannot {action}")]
    InvalidTransition {
        run_id: RunId,
        status: &'static str,
        action: &'static str,
    },
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Per-item result of a bulk scheduling request.
#[derive(Debug, Clone)]
pub struct ScheduleOutcome {
    pub email: String,
    pub outcome: Result<ScheduledInterview, ScheduleError>,
}

#[derive(Clone)]
struct RunHandle {
    cancelled: Arc<AtomicBool>,
    allocator: Arc<SlotAllocator>,
    write_lock: Arc<AsyncMutex<()>>,
}

static RUN_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_run_id() -> RunId {
    let id = RUN_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RunId(format!("run-{id:06}"))
}

/// Drives a run from intake to completion.
///
/// All run state mutation funnels through this type: workers return results
/// and a per-run write lock serializes every read-modify-write against the
/// repository, so status queries always observe a consistent snapshot.
pub struct WorkflowOrchestrator<R> {
    repository: Arc<R>,
    collaborators: Collaborators,
    config: WorkflowConfig,
    scoring: ScoringEngine,
    gate: ReviewGate,
    handles: Mutex<HashMap<RunId, RunHandle>>,
}

impl<R> WorkflowOrchestrator<R>
where
    R: RunRepository + 'static,
{
    pub fn new(repository: Arc<R>, collaborators: Collaborators, config: WorkflowConfig) -> Self {
        let scoring = ScoringEngine::new(config.selection_threshold);
        let gate = ReviewGate::new(config.selection_threshold);
        Self {
            repository,
            collaborators,
            config,
            scoring,
            gate,
            handles: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Start a run for one job profile and one candidate batch.
    ///
    /// Validates the structural inputs, then drives extraction and scoring
    /// across the bounded worker pool until the batch reaches the review
    /// gate (or finalizes immediately when auto-finalize is configured).
    /// Per-candidate failures become sentinel records; only structural
    /// problems surface as errors here.
    pub async fn start_run(
        &self,
        profile: JobProfile,
        documents: Vec<CandidateDocument>,
    ) -> Result<RunId, WorkflowError> {
        validate_profile(&profile)?;
        if documents.is_empty() {
            return Err(StructuralError::NoCandidates.into());
        }

        let run_id = next_run_id();
        let run = RunState::new(run_id.clone(), profile.clone(), Utc::now());
        self.repository.insert(run)?;
        let handle = self.handle_for_new(&run_id);

        info!(run_id = %run_id, candidates = documents.len(), "recruitment run accepted");

        let raws = self.extract_batch(&handle, documents).await;

        {
            let _write = handle.write_lock.lock().await;
            let mut run = self.load(&run_id)?;
            if self.interrupt_if_cancelled(&handle, &mut run, "intake")? {
                return Ok(run_id);
            }
            run.status = RunStatus::Scoring;
            self.store(run)?;
        }

        let scored = self.evaluate_batch(&handle, &profile, raws).await;

        {
            let _write = handle.write_lock.lock().await;
            let mut run = self.load(&run_id)?;
            run.candidates = self.gate.rank(scored);
            run.recount();
            if self.interrupt_if_cancelled(&handle, &mut run, "scoring")? {
                return Ok(run_id);
            }
            run.status = RunStatus::AwaitingReview;
            info!(
                run_id = %run.run_id,
                total = run.counters.total_candidates,
                proposed_selected = run.counters.selected,
                "batch scored, awaiting review"
            );
            self.store(run)?;
        }

        if self.config.auto_finalize {
            self.finalize_review(&run_id).await?;
        }

        Ok(run_id)
    }

    /// Current snapshot for status queries. Always returns partial progress,
    /// including per-candidate error notes.
    pub fn run_status(&self, run_id: &RunId) -> Result<RunStateView, WorkflowError> {
        let run = self.load(run_id)?;
        Ok(RunStateView::from_state(&run))
    }

    /// Apply one batch of human review decisions. The run stays in the
    /// review loop; re-applying the same batch is a no-op by construction.
    pub async fn submit_decisions(
        &self,
        run_id: &RunId,
        decisions: BTreeMap<String, ReviewDecision>,
    ) -> Result<(DecisionReceipt, RunStateView), WorkflowError> {
        let handle = self.handle_for(run_id)?;
        let _write = handle.write_lock.lock().await;

        let mut run = self.load(run_id)?;
        require_status(&run, RunStatus::AwaitingReview, "apply review decisions")?;

        let receipt = self.gate.apply_decisions(&mut run.candidates, &decisions);
        run.recount();
        if !receipt.unmatched.is_empty() {
            warn!(
                run_id = %run.run_id,
                unmatched = receipt.unmatched.len(),
                "review decisions referenced unknown candidates"
            );
        }
        let view = RunStateView::from_state(&run);
        self.store(run)?;
        Ok((receipt, view))
    }

    /// Commit the review partition and move the run through notification
    /// dispatch into the scheduling phase.
    pub async fn finalize_review(&self, run_id: &RunId) -> Result<RunStateView, WorkflowError> {
        let handle = self.handle_for(run_id)?;

        let recipients = {
            let _write = handle.write_lock.lock().await;
            let mut run = self.load(run_id)?;
            require_status(&run, RunStatus::AwaitingReview, "finalize review")?;

            let partition = self.gate.finalize(&mut run.candidates);
            run.recount();
            run.status = RunStatus::Notifying;
            info!(
                run_id = %run.run_id,
                selected = partition.selected.len(),
                rejected = partition.rejected.len(),
                "review finalized, dispatching notifications"
            );

            let mut recipients: Vec<(StructuredCandidate, NotificationKind)> = partition
                .selected
                .iter()
                .map(|ranked| (ranked.candidate.clone(), NotificationKind::Selected))
                .collect();
            if self.config.notify_rejected {
                recipients.extend(
                    partition
                        .rejected
                        .iter()
                        .filter(|ranked| !ranked.candidate.email.is_empty())
                        .map(|ranked| (ranked.candidate.clone(), NotificationKind::Rejected)),
                );
            }
            self.store(run)?;
            recipients
        };

        let records = self.dispatch_batch(&handle, recipients).await;

        let _write = handle.write_lock.lock().await;
        let mut run = self.load(run_id)?;
        run.notifications.extend(records);
        run.recount();
        if !self.interrupt_if_cancelled(&handle, &mut run, "notification dispatch")? {
            run.status = RunStatus::Scheduling;
        }
        let view = RunStateView::from_state(&run);
        self.store(run)?;
        Ok(view)
    }

    /// Unbound slots for a day, materialized from the run's slot template.
    pub fn free_slots(
        &self,
        run_id: &RunId,
        date: NaiveDate,
    ) -> Result<Vec<InterviewSlot>, WorkflowError> {
        let handle = self.handle_for(run_id)?;
        Ok(handle.allocator.free_slots(date))
    }

    /// Bulk-schedule candidates into successive free slots beginning at the
    /// requested start. Each item resolves independently: conflicts, an
    /// exhausted day, or an ineligible candidate fail that item only.
    pub async fn schedule_interviews(
        &self,
        run_id: &RunId,
        emails: Vec<String>,
        start: NaiveDateTime,
        details: InterviewDetails,
    ) -> Result<Vec<ScheduleOutcome>, WorkflowError> {
        let handle = self.handle_for(run_id)?;
        let _write = handle.write_lock.lock().await;

        let mut run = self.load(run_id)?;
        require_status(&run, RunStatus::Scheduling, "schedule interviews")?;

        let mut outcomes = Vec::with_capacity(emails.len());
        let mut cursor = start;

        for email in emails {
            let outcome = match self.eligibility(&run, &email) {
                Err(err) => Err(err),
                Ok(candidate) => {
                    match handle.allocator.first_free_at_or_after(cursor) {
                        None => Err(ScheduleError::NoFreeSlot { date: cursor.date() }),
                        Some(slot_start) => {
                            match handle.allocator.bind(&email, slot_start, &details) {
                                Err(err) => Err(err),
                                Ok(mut interview) => {
                                    cursor = slot_start;
                                    self.book_and_invite(&handle, &mut run, &candidate, &mut interview)
                                        .await;
                                    run.interviews.push(interview.clone());
                                    Ok(interview)
                                }
                            }
                        }
                    }
                }
            };
            outcomes.push(ScheduleOutcome { email, outcome });
        }

        run.recount();
        self.store(run)?;
        Ok(outcomes)
    }

    /// Explicitly release a candidate's binding, freeing the slot for reuse.
    /// Rebinding to a different slot goes through `schedule_interviews`
    /// again; there is no implicit overwrite.
    pub async fn release_interview(
        &self,
        run_id: &RunId,
        email: &str,
    ) -> Result<RunStateView, WorkflowError> {
        let handle = self.handle_for(run_id)?;
        let _write = handle.write_lock.lock().await;

        let mut run = self.load(run_id)?;
        require_status(&run, RunStatus::Scheduling, "release an interview")?;

        let slot_start = handle
            .allocator
            .release(email)
            .map_err(ScheduleError::from)?;
        run.interviews
            .retain(|interview| interview.candidate_email != email);
        run.notes
            .push(format!("released interview slot {slot_start} held by {email}"));
        run.recount();
        let view = RunStateView::from_state(&run);
        self.store(run)?;
        Ok(view)
    }

    /// Assemble the report payload and hand back the rendered blob. The
    /// first successful render moves the run to completion; failed runs can
    /// still be rendered for inspection without changing state.
    pub async fn report(
        &self,
        run_id: &RunId,
        format: ReportFormat,
    ) -> Result<ReportBlob, WorkflowError> {
        let handle = self.handle_for(run_id)?;
        let _write = handle.write_lock.lock().await;

        let mut run = self.load(run_id)?;
        match run.status {
            RunStatus::Scheduling | RunStatus::Reporting | RunStatus::Complete
            | RunStatus::Failed => {}
            _ => {
                return Err(WorkflowError::InvalidTransition {
                    run_id: run.run_id.clone(),
                    status: run.status.label(),
                    action: "download a report",
                })
            }
        }

        let advance = matches!(run.status, RunStatus::Scheduling | RunStatus::Reporting);
        if advance {
            // The reporting state stays observable while rendering runs; a
            // failed render leaves the run there so the download can retry.
            run.status = RunStatus::Reporting;
            self.store(run.clone())?;
            run.status = RunStatus::Complete;
        }

        let payload = report::assemble(&run, Utc::now());
        let blob = report::render(&payload, format)?;

        if advance {
            info!(run_id = %run.run_id, "run complete, report delivered");
        }
        self.store(run)?;
        Ok(blob)
    }

    /// Cancel an in-flight run. Outstanding workers observe the flag and
    /// stop; committed results stay in place for inspection.
    pub async fn cancel_run(
        &self,
        run_id: &RunId,
        reason: Option<String>,
    ) -> Result<RunStateView, WorkflowError> {
        let handle = self.handle_for(run_id)?;
        handle.cancelled.store(true, Ordering::SeqCst);

        let _write = handle.write_lock.lock().await;
        let mut run = self.load(run_id)?;
        if !run.status.is_terminal() {
            run.status = RunStatus::Failed;
            run.notes.push(match reason {
                Some(reason) => format!("run cancelled: {reason}"),
                None => "run cancelled".to_string(),
            });
            warn!(run_id = %run.run_id, "run cancelled");
        }
        let view = RunStateView::from_state(&run);
        self.store(run)?;
        Ok(view)
    }

    /// Drop a run and its slot pool entirely.
    pub fn clear_run(&self, run_id: &RunId) -> Result<(), WorkflowError> {
        match self.repository.remove(run_id) {
            Ok(()) => {}
            Err(RepositoryError::NotFound) => {
                return Err(WorkflowError::RunNotFound(run_id.clone()))
            }
            Err(err) => return Err(err.into()),
        }
        let mut handles = self.handles.lock().expect("run handle mutex poisoned");
        handles.remove(run_id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // pipeline phases
    // ------------------------------------------------------------------

    async fn extract_batch(
        &self,
        handle: &RunHandle,
        documents: Vec<CandidateDocument>,
    ) -> Vec<RawCandidate> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let budget = Duration::from_secs(self.config.collaborator_timeout_secs);
        let mut tasks = JoinSet::new();

        for (intake_index, document) in documents.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let cancelled = handle.cancelled.clone();
            let extractor = self.collaborators.extractor.clone();
            let timeout_secs = self.config.collaborator_timeout_secs;

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("worker semaphore closed");

                if cancelled.load(Ordering::SeqCst) {
                    return RawCandidate {
                        intake_index,
                        source_file: document.filename,
                        text: String::new(),
                        extraction_error: Some("run cancelled before extraction".to_string()),
                    };
                }

                let extracted = match timeout(
                    budget,
                    extractor.extract(document.content.as_bytes(), &document.filename),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ExtractionError::Timeout(timeout_secs)),
                };

                match extracted {
                    Ok(text) => RawCandidate {
                        intake_index,
                        source_file: document.filename,
                        text,
                        extraction_error: None,
                    },
                    Err(err) => {
                        warn!(source_file = %document.filename, error = %err, "extraction failed");
                        RawCandidate {
                            intake_index,
                            source_file: document.filename,
                            text: String::new(),
                            extraction_error: Some(err.to_string()),
                        }
                    }
                }
            });
        }

        collect_by_index(tasks, |raw: &RawCandidate| raw.intake_index).await
    }

    async fn evaluate_batch(
        &self,
        handle: &RunHandle,
        profile: &JobProfile,
        raws: Vec<RawCandidate>,
    ) -> Vec<(usize, String, StructuredCandidate)> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let budget = Duration::from_secs(self.config.collaborator_timeout_secs);
        let mut tasks = JoinSet::new();

        for raw in raws {
            let semaphore = semaphore.clone();
            let cancelled = handle.cancelled.clone();
            let evaluator = self.collaborators.evaluator.clone();
            let profile = profile.clone();
            let scoring = self.scoring;
            let timeout_secs = self.config.collaborator_timeout_secs;

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("worker semaphore closed");

                let index = raw.intake_index;
                let source_file = raw.source_file.clone();

                if cancelled.load(Ordering::SeqCst) {
                    let candidate =
                        scoring.sentinel(&raw, "run cancelled before evaluation".to_string());
                    return (index, source_file, candidate);
                }

                let evaluation = if raw.extraction_error.is_some() {
                    // The engine turns the extraction note into the sentinel.
                    Err(EvaluationError::Unavailable("not evaluated".to_string()))
                } else {
                    match timeout(budget, evaluator.evaluate(&raw.text, &profile)).await {
                        Ok(result) => result,
                        Err(_) => Err(EvaluationError::Timeout(timeout_secs)),
                    }
                };

                let candidate = scoring.build(&raw, &profile, evaluation);
                (index, source_file, candidate)
            });
        }

        let mut scored =
            collect_by_index(tasks, |entry: &(usize, String, StructuredCandidate)| entry.0).await;
        dedupe_emails(&mut scored);
        scored
    }

    async fn dispatch_batch(
        &self,
        handle: &RunHandle,
        recipients: Vec<(StructuredCandidate, NotificationKind)>,
    ) -> Vec<NotificationRecord> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let budget = Duration::from_secs(self.config.collaborator_timeout_secs);
        let mut tasks = JoinSet::new();

        for (order, (candidate, kind)) in recipients.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let cancelled = handle.cancelled.clone();
            let notifier = self.collaborators.notifier.clone();
            let timeout_secs = self.config.collaborator_timeout_secs;

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("worker semaphore closed");

                if cancelled.load(Ordering::SeqCst) {
                    return (
                        order,
                        NotificationRecord {
                            email: candidate.email.clone(),
                            kind,
                            status: DeliveryStatus::Failed,
                            attempts: 0,
                            note: "run cancelled before dispatch".to_string(),
                        },
                    );
                }

                let record =
                    notify_with_retry(notifier.as_ref(), &candidate, kind, budget, timeout_secs)
                        .await;
                (order, record)
            });
        }

        collect_by_index(tasks, |entry: &(usize, NotificationRecord)| entry.0)
            .await
            .into_iter()
            .map(|(_, record)| record)
            .collect()
    }

    async fn book_and_invite(
        &self,
        handle: &RunHandle,
        run: &mut RunState,
        candidate: &StructuredCandidate,
        interview: &mut ScheduledInterview,
    ) {
        let budget = Duration::from_secs(self.config.collaborator_timeout_secs);

        if let Some(calendar) = &self.collaborators.calendar {
            match timeout(budget, calendar.book(interview)).await {
                Ok(Ok(event_id)) => interview.external_event_id = Some(event_id),
                Ok(Err(err)) => {
                    // Booking trouble never unwinds the internal binding.
                    run.notes.push(format!(
                        "calendar booking failed for {}: {err}",
                        interview.candidate_email
                    ));
                }
                Err(_) => {
                    run.notes.push(format!(
                        "calendar booking timed out for {}",
                        interview.candidate_email
                    ));
                }
            }
        }

        if handle.cancelled.load(Ordering::SeqCst) {
            return;
        }

        let record = notify_with_retry(
            self.collaborators.notifier.as_ref(),
            candidate,
            NotificationKind::InterviewInvite,
            budget,
            self.config.collaborator_timeout_secs,
        )
        .await;
        run.notifications.push(record);
    }

    // ------------------------------------------------------------------
    // run bookkeeping
    // ------------------------------------------------------------------

    fn load(&self, run_id: &RunId) -> Result<RunState, WorkflowError> {
        self.repository
            .fetch(run_id)?
            .ok_or_else(|| WorkflowError::RunNotFound(run_id.clone()))
    }

    fn store(&self, mut run: RunState) -> Result<(), WorkflowError> {
        run.updated_at = Utc::now();
        self.repository.update(run)?;
        Ok(())
    }

    fn interrupt_if_cancelled(
        &self,
        handle: &RunHandle,
        run: &mut RunState,
        phase: &str,
    ) -> Result<bool, WorkflowError> {
        if !handle.cancelled.load(Ordering::SeqCst) {
            return Ok(false);
        }
        if !run.status.is_terminal() {
            run.status = RunStatus::Failed;
            run.notes.push(format!("run cancelled during {phase}"));
        }
        self.store(run.clone())?;
        Ok(true)
    }

    fn eligibility(
        &self,
        run: &RunState,
        email: &str,
    ) -> Result<StructuredCandidate, ScheduleError> {
        let ranked = run
            .candidate_by_email(email)
            .ok_or_else(|| NotFoundError::UnknownCandidate {
                email: email.to_string(),
            })?;

        if ranked.disposition != Disposition::Selected {
            return Err(ScheduleError::NotEligible {
                email: email.to_string(),
                reason: format!("candidate is {}", ranked.disposition.label()),
            });
        }

        if !self.config.decouple_scheduling {
            let delivered = run.notifications.iter().any(|record| {
                record.email == email
                    && record.kind == NotificationKind::Selected
                    && record.status == DeliveryStatus::Sent
            });
            if !delivered {
                return Err(ScheduleError::NotEligible {
                    email: email.to_string(),
                    reason: "selection notification was not delivered".to_string(),
                });
            }
        }

        Ok(ranked.candidate.clone())
    }

    fn handle_for_new(&self, run_id: &RunId) -> RunHandle {
        let handle = RunHandle {
            cancelled: Arc::new(AtomicBool::new(false)),
            allocator: Arc::new(SlotAllocator::new(self.config.slot_template.clone())),
            write_lock: Arc::new(AsyncMutex::new(())),
        };
        let mut handles = self.handles.lock().expect("run handle mutex poisoned");
        handles.insert(run_id.clone(), handle.clone());
        handle
    }

    /// Fetch the live handle for a run, rebuilding it from the stored state
    /// after a restart so existing bindings survive.
    fn handle_for(&self, run_id: &RunId) -> Result<RunHandle, WorkflowError> {
        {
            let handles = self.handles.lock().expect("run handle mutex poisoned");
            if let Some(handle) = handles.get(run_id) {
                return Ok(handle.clone());
            }
        }

        let run = self.load(run_id)?;
        let allocator = SlotAllocator::new(self.config.slot_template.clone());
        for interview in &run.interviews {
            allocator.ensure_day(interview.slot_start.date());
            let details = InterviewDetails {
                interviewer: interview.interviewer.clone(),
                location: interview.location.clone(),
                kind: interview.kind,
                notes: interview.notes.clone(),
            };
            if let Err(err) =
                allocator.bind(&interview.candidate_email, interview.slot_start, &details)
            {
                warn!(
                    run_id = %run.run_id,
                    email = %interview.candidate_email,
                    error = %err,
                    "stored binding could not be rebuilt"
                );
            }
        }

        let handle = RunHandle {
            cancelled: Arc::new(AtomicBool::new(run.status == RunStatus::Failed)),
            allocator: Arc::new(allocator),
            write_lock: Arc::new(AsyncMutex::new(())),
        };
        let mut handles = self.handles.lock().expect("run handle mutex poisoned");
        let entry = handles.entry(run_id.clone()).or_insert(handle);
        Ok(entry.clone())
    }
}

fn validate_profile(profile: &JobProfile) -> Result<(), StructuralError> {
    if profile.title.trim().is_empty() {
        return Err(StructuralError::EmptyProfileField("title"));
    }
    if profile.required_skills.is_empty() {
        return Err(StructuralError::EmptyProfileField("required_skills"));
    }
    Ok(())
}

fn require_status(
    run: &RunState,
    expected: RunStatus,
    action: &'static str,
) -> Result<(), WorkflowError> {
    if run.status != expected {
        return Err(WorkflowError::InvalidTransition {
            run_id: run.run_id.clone(),
            status: run.status.label(),
            action,
        });
    }
    Ok(())
}

/// Collect worker pool output in deterministic intake order, regardless of
/// completion order.
async fn collect_by_index<T, F>(mut tasks: JoinSet<T>, index_of: F) -> Vec<T>
where
    T: Send + 'static,
    F: Fn(&T) -> usize,
{
    let mut indexed = BTreeMap::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(item) => {
                indexed.insert(index_of(&item), item);
            }
            Err(err) => warn!(error = %err, "worker task aborted"),
        }
    }
    indexed.into_values().collect()
}

/// Later duplicates of an email are downgraded to sentinel-style records so
/// the email stays a unique key without shrinking the batch.
fn dedupe_emails(scored: &mut [(usize, String, StructuredCandidate)]) {
    let mut seen: HashMap<String, usize> = HashMap::new();
    for (index, _, candidate) in scored.iter_mut() {
        if candidate.email.is_empty() {
            continue;
        }
        match seen.get(&candidate.email) {
            None => {
                seen.insert(candidate.email.clone(), *index);
            }
            Some(first_index) => {
                candidate.match_score = 0;
                candidate.notes = format!(
                    "duplicate email {} already used by candidate at intake position {}",
                    candidate.email, first_index
                );
                candidate.email = String::new();
            }
        }
    }
}

async fn notify_with_retry(
    notifier: &dyn NotificationSender,
    candidate: &StructuredCandidate,
    kind: NotificationKind,
    budget: Duration,
    timeout_secs: u64,
) -> NotificationRecord {
    let mut attempts = 0u8;
    let mut last_error: Option<DispatchError> = None;

    // One immediate retry, then the failure is recorded and dispatch moves on.
    while attempts < 2 {
        attempts += 1;
        let attempt = match timeout(budget, notifier.notify(candidate, kind)).await {
            Ok(result) => result,
            Err(_) => Err(DispatchError::Timeout(timeout_secs)),
        };
        match attempt {
            Ok(()) => {
                return NotificationRecord {
                    email: candidate.email.clone(),
                    kind,
                    status: DeliveryStatus::Sent,
                    attempts,
                    note: String::new(),
                };
            }
            Err(err) => last_error = Some(err),
        }
    }

    let note = last_error
        .map(|err| err.to_string())
        .unwrap_or_else(|| "dispatch failed".to_string());
    warn!(email = %candidate.email, kind = kind.label(), note = %note, "notification failed");
    NotificationRecord {
        email: candidate.email.clone(),
        kind,
        status: DeliveryStatus::Failed,
        attempts,
        note,
    }
}
