use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{Disposition, RunState};
use super::runs::{CandidateView, InterviewView, RunStateView};

/// Output encodings for a run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    SummaryText,
    DetailedJson,
    Workbook,
}

impl ReportFormat {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "summary" | "summary_text" | "text" => Some(Self::SummaryText),
            "detailed" | "detailed_json" | "json" => Some(Self::DetailedJson),
            "workbook" | "csv" => Some(Self::Workbook),
            _ => None,
        }
    }

    pub fn content_type(self) -> mime::Mime {
        match self {
            Self::SummaryText => mime::TEXT_PLAIN_UTF_8,
            Self::DetailedJson => mime::APPLICATION_JSON,
            Self::Workbook => mime::TEXT_CSV,
        }
    }

    pub fn file_extension(self) -> &'static str {
        match self {
            Self::SummaryText => "txt",
            Self::DetailedJson => "json",
            Self::Workbook => "csv",
        }
    }
}

/// Rendered report handed back to the caller.
#[derive(Debug, Clone)]
pub struct ReportBlob {
    pub content_type: mime::Mime,
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Rendering failure. Structural, not per-candidate.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("report serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("workbook serialization failed: {0}")]
    Workbook(String),
}

/// Score histogram bucket, mirroring the reviewer-facing breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreBucket {
    pub range: &'static str,
    pub count: usize,
}

/// Assembled report payload covering counts, candidate lists, and schedule.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run: RunStateView,
    pub average_score: f64,
    pub score_distribution: Vec<ScoreBucket>,
    pub top_candidates: Vec<CandidateView>,
    pub recommendations: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

const TOP_CANDIDATE_COUNT: usize = 5;

pub fn assemble(run: &RunState, generated_at: DateTime<Utc>) -> RunReport {
    let view = RunStateView::from_state(run);

    let total = run.candidates.len();
    let average_score = if total == 0 {
        0.0
    } else {
        let sum: u64 = run
            .candidates
            .iter()
            .map(|ranked| u64::from(ranked.candidate.match_score))
            .sum();
        sum as f64 / total as f64
    };

    let mut buckets = [
        ("90-100", 0usize),
        ("80-89", 0),
        ("70-79", 0),
        ("60-69", 0),
        ("0-59", 0),
    ];
    for ranked in &run.candidates {
        let idx = match ranked.candidate.match_score {
            90..=100 => 0,
            80..=89 => 1,
            70..=79 => 2,
            60..=69 => 3,
            _ => 4,
        };
        buckets[idx].1 += 1;
    }

    let top_candidates = view
        .candidates
        .iter()
        .take(TOP_CANDIDATE_COUNT)
        .cloned()
        .collect();

    let recommendations = recommendations_for(run, average_score);

    RunReport {
        run: view,
        average_score,
        score_distribution: buckets
            .iter()
            .map(|(range, count)| ScoreBucket {
                range,
                count: *count,
            })
            .collect(),
        top_candidates,
        recommendations,
        generated_at,
    }
}

fn recommendations_for(run: &RunState, average_score: f64) -> Vec<String> {
    let mut recommendations = Vec::new();
    let selected = run
        .candidates
        .iter()
        .filter(|ranked| ranked.disposition == Disposition::Selected)
        .count();

    if selected == 0 {
        recommendations.push(
            "No candidates met the selection bar. Consider revisiting the profile requirements."
                .to_string(),
        );
    }
    if average_score < 60.0 {
        recommendations.push(
            "Average match score is low. Consider adjusting the evaluation criteria or widening the search."
                .to_string(),
        );
    }
    if selected > 10 {
        recommendations.push(
            "Many candidates passed the gate. Consider tightening the criteria for the next phase."
                .to_string(),
        );
    }
    if run.candidates.len() < 5 {
        recommendations
            .push("Few candidates in the batch. Consider broadening sourcing channels.".to_string());
    }

    recommendations
}

pub fn render(report: &RunReport, format: ReportFormat) -> Result<ReportBlob, ReportError> {
    let bytes = match format {
        ReportFormat::SummaryText => render_summary(report).into_bytes(),
        ReportFormat::DetailedJson => serde_json::to_vec_pretty(report)?,
        ReportFormat::Workbook => render_workbook(report)?,
    };

    Ok(ReportBlob {
        content_type: format.content_type(),
        filename: format!(
            "recruitment_report_{}.{}",
            report.run.run_id,
            format.file_extension()
        ),
        bytes,
    })
}

fn render_summary(report: &RunReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "RECRUITMENT REPORT");
    let _ = writeln!(out, "==================");
    let _ = writeln!(out, "Position: {}", report.run.job_title);
    let _ = writeln!(
        out,
        "Generated: {}",
        report.generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "Total candidates:      {}", report.run.counters.total_candidates);
    let _ = writeln!(out, "Selected:              {}", report.run.counters.selected);
    let _ = writeln!(out, "Rejected:              {}", report.run.counters.rejected);
    let _ = writeln!(out, "Notifications sent:    {}", report.run.counters.notifications_sent);
    let _ = writeln!(out, "Notifications failed:  {}", report.run.counters.notifications_failed);
    let _ = writeln!(out, "Interviews scheduled:  {}", report.run.counters.interviews_scheduled);
    let _ = writeln!(out, "Average match score:   {:.1}/100", report.average_score);

    let _ = writeln!(out);
    let _ = writeln!(out, "Score distribution");
    for bucket in &report.score_distribution {
        let _ = writeln!(out, "  {:>6}: {}", bucket.range, bucket.count);
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Top candidates");
    for (position, candidate) in report.top_candidates.iter().enumerate() {
        let _ = writeln!(
            out,
            "  {}. {} <{}> score {} ({})",
            position + 1,
            candidate.name,
            candidate.email,
            candidate.match_score,
            candidate.disposition
        );
    }

    if !report.run.interviews.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Interview schedule");
        for interview in &report.run.interviews {
            let _ = writeln!(
                out,
                "  {} -> {} with {} at {} ({})",
                interview.slot_start,
                interview.candidate_email,
                interview.interviewer,
                interview.location,
                interview.kind
            );
        }
    }

    if !report.recommendations.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Recommendations");
        for recommendation in &report.recommendations {
            let _ = writeln!(out, "  - {}", recommendation);
        }
    }

    out
}

/// Candidate sheet followed by a statistics sheet, as consecutive CSV
/// sections in one document.
fn render_workbook(report: &RunReport) -> Result<Vec<u8>, ReportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record([
            "Name",
            "Email",
            "Score",
            "Disposition",
            "Source File",
            "Notes",
        ])
        .map_err(|err| ReportError::Workbook(err.to_string()))?;
    for candidate in &report.run.candidates {
        writer
            .write_record([
                candidate.name.as_str(),
                candidate.email.as_str(),
                &candidate.match_score.to_string(),
                candidate.disposition,
                candidate.source_file.as_str(),
                candidate.notes.as_str(),
            ])
            .map_err(|err| ReportError::Workbook(err.to_string()))?;
    }

    writer
        .write_record(["", "", "", "", "", ""])
        .map_err(|err| ReportError::Workbook(err.to_string()))?;
    writer
        .write_record(["Metric", "Value", "", "", "", ""])
        .map_err(|err| ReportError::Workbook(err.to_string()))?;

    let stats = [
        (
            "Total candidates",
            report.run.counters.total_candidates.to_string(),
        ),
        ("Selected", report.run.counters.selected.to_string()),
        ("Rejected", report.run.counters.rejected.to_string()),
        (
            "Interviews scheduled",
            report.run.counters.interviews_scheduled.to_string(),
        ),
        ("Average score", format!("{:.1}", report.average_score)),
    ];
    for (metric, value) in stats {
        writer
            .write_record([metric, value.as_str(), "", "", "", ""])
            .map_err(|err| ReportError::Workbook(err.to_string()))?;
    }

    writer
        .into_inner()
        .map_err(|err| ReportError::Workbook(err.to_string()))
}
