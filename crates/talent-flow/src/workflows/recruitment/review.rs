use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{Disposition, RankedCandidate, StructuredCandidate};

/// A single human override for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

/// Outcome of applying a decision batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionReceipt {
    pub applied: usize,
    /// Emails that matched no candidate in the run. Reported back rather
    /// than treated as errors so partial batches still land.
    pub unmatched: Vec<String>,
}

/// Stable partition committed by finalize.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewPartition {
    pub selected: Vec<RankedCandidate>,
    pub rejected: Vec<RankedCandidate>,
}

/// Holds ranked candidates in a pending state until an external decision
/// maker approves or rejects them, individually or in bulk.
///
/// The gate is re-entrant and idempotent: decision batches may arrive in any
/// number of calls, and re-applying a batch changes nothing. Nothing advances
/// past the gate without an explicit finalize signal (auto-finalize is an
/// explicit configuration choice made by the orchestrator, never a default).
pub struct ReviewGate {
    selection_threshold: u8,
}

impl ReviewGate {
    pub fn new(selection_threshold: u8) -> Self {
        Self {
            selection_threshold,
        }
    }

    /// Rank scored candidates and propose an initial disposition per the
    /// run threshold. Ordering is match score descending with ties broken by
    /// intake order. Never sorts by name or email.
    pub fn rank(&self, scored: Vec<(usize, String, StructuredCandidate)>) -> Vec<RankedCandidate> {
        let mut ranked: Vec<RankedCandidate> = scored
            .into_iter()
            .map(|(intake_index, source_file, candidate)| {
                let disposition = if candidate.match_score >= self.selection_threshold {
                    Disposition::Selected
                } else {
                    Disposition::Rejected
                };
                RankedCandidate {
                    candidate,
                    disposition,
                    intake_index,
                    source_file,
                }
            })
            .collect();

        // Stable sort keeps intake order within equal scores.
        ranked.sort_by(|a, b| b.candidate.match_score.cmp(&a.candidate.match_score));
        ranked
    }

    /// Apply a batch of human overrides keyed by candidate email. Emails are
    /// unique within a run, so each decision lands on exactly one record.
    pub fn apply_decisions(
        &self,
        candidates: &mut [RankedCandidate],
        decisions: &BTreeMap<String, ReviewDecision>,
    ) -> DecisionReceipt {
        let mut applied = 0;
        let mut unmatched = Vec::new();

        for (email, decision) in decisions {
            let target = candidates
                .iter_mut()
                .find(|ranked| ranked.candidate.email == *email);

            match target {
                Some(ranked) => {
                    ranked.disposition = match decision {
                        ReviewDecision::Approve => Disposition::Selected,
                        ReviewDecision::Reject => Disposition::Rejected,
                    };
                    applied += 1;
                }
                None => unmatched.push(email.clone()),
            }
        }

        DecisionReceipt { applied, unmatched }
    }

    /// Commit dispositions into the selected/rejected partition. Candidates
    /// still pending at finalize resolve to rejected so the partition always
    /// accounts for every candidate in the run.
    pub fn finalize(&self, candidates: &mut [RankedCandidate]) -> ReviewPartition {
        let mut selected = Vec::new();
        let mut rejected = Vec::new();

        for ranked in candidates.iter_mut() {
            if ranked.disposition == Disposition::Pending {
                ranked.disposition = Disposition::Rejected;
            }
            match ranked.disposition {
                Disposition::Selected => selected.push(ranked.clone()),
                _ => rejected.push(ranked.clone()),
            }
        }

        ReviewPartition { selected, rejected }
    }
}
