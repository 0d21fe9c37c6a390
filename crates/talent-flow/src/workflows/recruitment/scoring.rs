use super::collaborators::EvaluationError;
use super::domain::{CandidateFields, JobProfile, RawCandidate, StructuredCandidate};

/// Stateless post-processor over the evaluation collaborator's output.
///
/// The collaborator's business judgment on the score is authoritative; this
/// engine only clamps, fills defaults, and surfaces inconsistencies as notes
/// for the human reviewer. Failed evaluations become sentinel records so the
/// candidate count of a run never shrinks.
#[derive(Clone, Copy)]
pub struct ScoringEngine {
    selection_threshold: u8,
}

impl ScoringEngine {
    pub fn new(selection_threshold: u8) -> Self {
        Self {
            selection_threshold,
        }
    }

    /// Build the structured record for one candidate.
    pub fn build(
        &self,
        raw: &RawCandidate,
        profile: &JobProfile,
        evaluation: Result<CandidateFields, EvaluationError>,
    ) -> StructuredCandidate {
        if let Some(reason) = &raw.extraction_error {
            return self.sentinel(raw, format!("text extraction failed: {reason}"));
        }

        let fields = match evaluation {
            Ok(fields) => fields,
            Err(err) => return self.sentinel(raw, format!("evaluation failed: {err}")),
        };

        if fields.email.trim().is_empty() {
            return self.sentinel(raw, "evaluation returned no candidate email".to_string());
        }

        let match_score = fields.match_score.clamp(0, 100) as u8;
        let mut notes = fields.notes.clone();

        if fields.match_score != i64::from(match_score) {
            push_note(
                &mut notes,
                &format!(
                    "score {} clamped into the 0-100 range",
                    fields.match_score
                ),
            );
        }

        let experience_years = match fields.experience_years {
            Some(years) => years,
            None => {
                push_note(&mut notes, "experience years missing, defaulted to 0");
                0
            }
        };

        if match_score >= self.selection_threshold
            && required_skill_overlap(&fields.skills, &profile.required_skills).is_empty()
            && !profile.required_skills.is_empty()
        {
            push_note(
                &mut notes,
                &format!(
                    "score {match_score} with no overlap against required skills ({}), review recommended",
                    profile.required_skills.join(", ")
                ),
            );
        }

        StructuredCandidate {
            name: fields.name,
            email: fields.email.trim().to_string(),
            phone: fields.phone,
            experience_years,
            skills: fields.skills,
            languages: fields.languages,
            education: fields.education,
            match_score,
            notes,
        }
    }

    /// Placeholder record for a candidate whose pipeline stage failed.
    /// Carries score 0 and the failure explanation so batch counts hold.
    pub fn sentinel(&self, raw: &RawCandidate, reason: String) -> StructuredCandidate {
        StructuredCandidate {
            name: format!("Unprocessed candidate ({})", raw.source_file),
            email: String::new(),
            phone: None,
            experience_years: 0,
            skills: Vec::new(),
            languages: Vec::new(),
            education: Vec::new(),
            match_score: 0,
            notes: reason,
        }
    }
}

/// Case-insensitive exact intersection between candidate and required skills.
pub fn required_skill_overlap(candidate_skills: &[String], required: &[String]) -> Vec<String> {
    required
        .iter()
        .filter(|needed| {
            candidate_skills
                .iter()
                .any(|owned| owned.eq_ignore_ascii_case(needed))
        })
        .cloned()
        .collect()
}

fn push_note(notes: &mut String, addition: &str) {
    if !notes.is_empty() {
        notes.push_str("; ");
    }
    notes.push_str(addition);
}
