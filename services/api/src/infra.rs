use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

use talent_flow::workflows::recruitment::{
    CalendarBooker, CandidateEvaluator, CandidateFields, Collaborators, DispatchError,
    EvaluationError, ExtractionError, JobProfile, NotificationKind, NotificationSender,
    RepositoryError, RunId, RunRepository, RunState, ScheduledInterview, StructuredCandidate,
    TextExtractor,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryRunRepository {
    runs: Arc<Mutex<HashMap<RunId, RunState>>>,
}

impl RunRepository for InMemoryRunRepository {
    fn insert(&self, run: RunState) -> Result<(), RepositoryError> {
        let mut guard = self.runs.lock().expect("run repository mutex poisoned");
        if guard.contains_key(&run.run_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(run.run_id.clone(), run);
        Ok(())
    }

    fn update(&self, run: RunState) -> Result<(), RepositoryError> {
        let mut guard = self.runs.lock().expect("run repository mutex poisoned");
        if !guard.contains_key(&run.run_id) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(run.run_id.clone(), run);
        Ok(())
    }

    fn fetch(&self, id: &RunId) -> Result<Option<RunState>, RepositoryError> {
        let guard = self.runs.lock().expect("run repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<RunId>, RepositoryError> {
        let guard = self.runs.lock().expect("run repository mutex poisoned");
        Ok(guard.keys().cloned().collect())
    }

    fn remove(&self, id: &RunId) -> Result<(), RepositoryError> {
        let mut guard = self.runs.lock().expect("run repository mutex poisoned");
        guard.remove(id).map(|_| ()).ok_or(RepositoryError::NotFound)
    }
}

/// Plain-text extraction for the bundled document types. Binary formats
/// belong to a dedicated extraction service; this adapter covers the text
/// uploads the demo and development setups use.
pub(crate) struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, content: &[u8], filename: &str) -> Result<String, ExtractionError> {
        let lower = filename.to_ascii_lowercase();
        let text = if lower.ends_with(".txt") || lower.ends_with(".md") {
            String::from_utf8(content.to_vec())
                .map_err(|_| ExtractionError::Unreadable(filename.to_string()))?
        } else if lower.ends_with(".pdf") || lower.ends_with(".docx") {
            // Best effort for formats the real extraction service would own.
            String::from_utf8_lossy(content).into_owned()
        } else {
            return Err(ExtractionError::UnsupportedFormat(filename.to_string()));
        };

        if text.trim().is_empty() {
            return Err(ExtractionError::Unreadable(filename.to_string()));
        }
        Ok(text)
    }
}

/// Deterministic keyword evaluator standing in for the LLM-backed
/// collaborator: ten points per required skill found, five per shared
/// language, fifteen when the experience minimum is met.
pub(crate) struct HeuristicEvaluator;

#[async_trait]
impl CandidateEvaluator for HeuristicEvaluator {
    async fn evaluate(
        &self,
        candidate_text: &str,
        profile: &JobProfile,
    ) -> Result<CandidateFields, EvaluationError> {
        let lowered = candidate_text.to_lowercase();

        let name = candidate_text
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("Unnamed candidate")
            .to_string();

        let email = candidate_text
            .split_whitespace()
            .find(|token| token.contains('@') && token.contains('.'))
            .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric() && c != '@' && c != '.'))
            .unwrap_or_default()
            .to_string();
        if email.is_empty() {
            return Err(EvaluationError::MalformedResponse(
                "no email address found in document".to_string(),
            ));
        }

        let skills: Vec<String> = profile
            .required_skills
            .iter()
            .filter(|skill| lowered.contains(&skill.to_lowercase()))
            .cloned()
            .collect();
        let languages: Vec<String> = profile
            .required_languages
            .iter()
            .filter(|language| lowered.contains(&language.to_lowercase()))
            .cloned()
            .collect();
        let experience_years = extract_experience_years(&lowered);

        let mut score = 10 * skills.len() as i64 + 5 * languages.len() as i64;
        if experience_years
            .map(|years| years >= profile.minimum_experience_years)
            .unwrap_or(false)
        {
            score += 15;
        }

        let education: Vec<String> = candidate_text
            .lines()
            .map(str::trim)
            .filter(|line| {
                let lowered = line.to_lowercase();
                ["university", "bsc", "msc", "phd", "degree"]
                    .iter()
                    .any(|marker| lowered.contains(marker))
            })
            .map(str::to_string)
            .collect();

        let notes = format!(
            "keyword evaluation: {} of {} required skills, {} of {} languages",
            skills.len(),
            profile.required_skills.len(),
            languages.len(),
            profile.required_languages.len()
        );

        Ok(CandidateFields {
            name,
            email,
            phone: extract_phone(candidate_text),
            experience_years,
            skills,
            languages,
            education,
            match_score: score,
            notes,
        })
    }
}

fn extract_experience_years(lowered: &str) -> Option<u32> {
    let mut tokens = lowered.split_whitespace().peekable();
    while let Some(token) = tokens.next() {
        if let Ok(value) = token.parse::<u32>() {
            if tokens
                .peek()
                .map(|next| next.starts_with("year"))
                .unwrap_or(false)
            {
                return Some(value);
            }
        }
    }
    None
}

fn extract_phone(text: &str) -> Option<String> {
    text.split_whitespace()
        .find(|token| {
            let digits = token.chars().filter(char::is_ascii_digit).count();
            digits >= 7 && (token.starts_with('+') || digits == token.len())
        })
        .map(str::to_string)
}

/// Notification adapter that logs instead of talking to a mail transport.
pub(crate) struct LoggingNotifier;

#[async_trait]
impl NotificationSender for LoggingNotifier {
    async fn notify(
        &self,
        candidate: &StructuredCandidate,
        kind: NotificationKind,
    ) -> Result<(), DispatchError> {
        info!(
            email = %candidate.email,
            kind = kind.label(),
            "notification dispatched"
        );
        Ok(())
    }
}

/// Calendar adapter that records bookings and fabricates event ids.
#[derive(Default)]
pub(crate) struct InMemoryCalendar {
    sequence: AtomicU64,
    events: Mutex<Vec<ScheduledInterview>>,
}

impl InMemoryCalendar {
    pub(crate) fn events(&self) -> Vec<ScheduledInterview> {
        self.events.lock().expect("calendar mutex poisoned").clone()
    }
}

#[async_trait]
impl CalendarBooker for InMemoryCalendar {
    async fn book(&self, interview: &ScheduledInterview) -> Result<String, DispatchError> {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        self.events
            .lock()
            .expect("calendar mutex poisoned")
            .push(interview.clone());
        Ok(format!("cal-{id:06}"))
    }
}

pub(crate) fn default_collaborators(calendar: Arc<InMemoryCalendar>) -> Collaborators {
    Collaborators {
        extractor: Arc::new(PlainTextExtractor),
        evaluator: Arc::new(HeuristicEvaluator),
        notifier: Arc::new(LoggingNotifier),
        calendar: Some(calendar),
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
