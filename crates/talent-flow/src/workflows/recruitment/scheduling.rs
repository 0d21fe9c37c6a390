use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use super::domain::{InterviewDetails, InterviewSlot, ScheduledInterview};

/// Daily slot layout. Configuration, not core logic: runs may override the
/// start times, duration, and weekend policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotTemplate {
    pub start_times: Vec<NaiveTime>,
    pub duration_minutes: u32,
    pub weekdays_only: bool,
}

impl Default for SlotTemplate {
    fn default() -> Self {
        let start_times = [9, 10, 11, 14, 15, 16, 17]
            .iter()
            .filter_map(|hour| NaiveTime::from_hms_opt(*hour, 0, 0))
            .collect();
        Self {
            start_times,
            duration_minutes: 60,
            weekdays_only: true,
        }
    }
}

/// Produce the bookable slots for one day. Pure and deterministic: the same
/// date and template always yield the same list, with no side effects.
pub fn generate_slots(date: NaiveDate, template: &SlotTemplate) -> Vec<InterviewSlot> {
    if template.weekdays_only
        && matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    {
        return Vec::new();
    }

    template
        .start_times
        .iter()
        .map(|time| InterviewSlot {
            start: date.and_time(*time),
            duration_minutes: template.duration_minutes,
            bound_to: None,
        })
        .collect()
}

/// Binding conflicts. The caller must release before retrying.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConflictError {
    #[error("slot {slot_start} is already bound to another candidate")]
    SlotTaken { slot_start: NaiveDateTime },
    #[error("candidate {email} already holds an interview binding, release it before rebinding")]
    CandidateBooked { email: String },
}

/// Lookups against slots, bindings, or candidates that do not exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotFoundError {
    #[error("no interview slot starts at {slot_start}")]
    UnknownSlot { slot_start: NaiveDateTime },
    #[error("no interview binding exists for {email}")]
    NoBinding { email: String },
    #[error("candidate {email} is not part of this run")]
    UnknownCandidate { email: String },
}

/// Per-item scheduling failure surfaced by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error(transparent)]
    Conflict(#[from] ConflictError),
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error("candidate {email} is not eligible for scheduling: {reason}")]
    NotEligible { email: String, reason: String },
    #[error("no free interview slot remains on {date}")]
    NoFreeSlot { date: NaiveDate },
}

struct SlotCell {
    duration_minutes: u32,
    bound_to: Mutex<Option<String>>,
}

/// Manages the interview slot pool for a single run.
///
/// Binding is atomic per slot: each slot carries its own lock, so the
/// check-then-bind sequence for one slot is indivisible while unrelated
/// slots bind concurrently. A separate candidate index guarantees one
/// binding per candidate email; rebinding requires an explicit release.
pub struct SlotAllocator {
    template: SlotTemplate,
    cells: Mutex<BTreeMap<NaiveDateTime, Arc<SlotCell>>>,
    bindings: Mutex<HashMap<String, NaiveDateTime>>,
}

impl SlotAllocator {
    pub fn new(template: SlotTemplate) -> Self {
        Self {
            template,
            cells: Mutex::new(BTreeMap::new()),
            bindings: Mutex::new(HashMap::new()),
        }
    }

    pub fn template(&self) -> &SlotTemplate {
        &self.template
    }

    /// Make the template slots for a day available, returning how many were
    /// added. Idempotent: existing cells and their bindings are untouched.
    pub fn ensure_day(&self, date: NaiveDate) -> usize {
        let mut cells = self.cells.lock().expect("slot index mutex poisoned");
        let mut added = 0;
        for slot in generate_slots(date, &self.template) {
            cells.entry(slot.start).or_insert_with(|| {
                added += 1;
                Arc::new(SlotCell {
                    duration_minutes: slot.duration_minutes,
                    bound_to: Mutex::new(None),
                })
            });
        }
        added
    }

    /// Snapshot of the unbound slots for a day, materializing the day first.
    pub fn free_slots(&self, date: NaiveDate) -> Vec<InterviewSlot> {
        self.ensure_day(date);
        let cells = self.cells.lock().expect("slot index mutex poisoned");
        cells
            .iter()
            .filter(|(start, _)| start.date() == date)
            .filter_map(|(start, cell)| {
                let bound = cell.bound_to.lock().expect("slot mutex poisoned");
                bound.is_none().then(|| InterviewSlot {
                    start: *start,
                    duration_minutes: cell.duration_minutes,
                    bound_to: None,
                })
            })
            .collect()
    }

    /// Earliest unbound slot at or after the given start, same day only.
    pub fn first_free_at_or_after(&self, start: NaiveDateTime) -> Option<NaiveDateTime> {
        self.ensure_day(start.date());
        let cells = self.cells.lock().expect("slot index mutex poisoned");
        cells
            .range(start..)
            .filter(|(candidate_start, _)| candidate_start.date() == start.date())
            .find(|(_, cell)| {
                cell.bound_to
                    .lock()
                    .expect("slot mutex poisoned")
                    .is_none()
            })
            .map(|(slot_start, _)| *slot_start)
    }

    /// Atomically bind one candidate to one slot.
    ///
    /// Two concurrent binds on the same slot resolve with exactly one
    /// success; the loser receives `ConflictError::SlotTaken`. A candidate
    /// holding any binding gets `ConflictError::CandidateBooked`.
    pub fn bind(
        &self,
        email: &str,
        slot_start: NaiveDateTime,
        details: &InterviewDetails,
    ) -> Result<ScheduledInterview, ScheduleError> {
        self.ensure_day(slot_start.date());

        let cell = {
            let cells = self.cells.lock().expect("slot index mutex poisoned");
            cells
                .get(&slot_start)
                .cloned()
                .ok_or(NotFoundError::UnknownSlot { slot_start })?
        };

        // Reserve the candidate first so a rebind attempt fails fast, then
        // take the slot's own lock for the indivisible check-then-bind.
        {
            let mut bindings = self.bindings.lock().expect("binding index mutex poisoned");
            if bindings.contains_key(email) {
                return Err(ConflictError::CandidateBooked {
                    email: email.to_string(),
                }
                .into());
            }
            bindings.insert(email.to_string(), slot_start);
        }

        let mut bound = cell.bound_to.lock().expect("slot mutex poisoned");
        if bound.is_some() {
            let mut bindings = self.bindings.lock().expect("binding index mutex poisoned");
            bindings.remove(email);
            return Err(ConflictError::SlotTaken { slot_start }.into());
        }
        *bound = Some(email.to_string());
        drop(bound);

        Ok(ScheduledInterview {
            candidate_email: email.to_string(),
            slot_start,
            duration_minutes: cell.duration_minutes,
            interviewer: details.interviewer.clone(),
            location: details.location.clone(),
            kind: details.kind,
            notes: details.notes.clone(),
            external_event_id: None,
        })
    }

    /// Free the slot held by a candidate. The slot becomes immediately
    /// reusable within the run.
    pub fn release(&self, email: &str) -> Result<NaiveDateTime, NotFoundError> {
        let slot_start = {
            let mut bindings = self.bindings.lock().expect("binding index mutex poisoned");
            bindings.remove(email).ok_or_else(|| NotFoundError::NoBinding {
                email: email.to_string(),
            })?
        };

        let cell = {
            let cells = self.cells.lock().expect("slot index mutex poisoned");
            cells.get(&slot_start).cloned()
        };
        if let Some(cell) = cell {
            let mut bound = cell.bound_to.lock().expect("slot mutex poisoned");
            *bound = None;
        }

        Ok(slot_start)
    }

    /// Slot currently held by a candidate, if any.
    pub fn binding_for(&self, email: &str) -> Option<NaiveDateTime> {
        let bindings = self.bindings.lock().expect("binding index mutex poisoned");
        bindings.get(email).copied()
    }
}
