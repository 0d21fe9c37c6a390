use crate::infra::{default_collaborators, InMemoryCalendar, InMemoryRunRepository};
use chrono::{Datelike, Local, NaiveDate, NaiveTime};
use clap::Args;
use std::collections::BTreeMap;
use std::sync::Arc;
use talent_flow::config::WorkflowConfig;
use talent_flow::error::AppError;
use talent_flow::workflows::recruitment::{
    CandidateDocument, InterviewDetails, InterviewKind, JobProfile, ReportFormat, ReviewDecision,
    WorkflowOrchestrator,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Override the selection threshold for the demo run.
    #[arg(long)]
    pub(crate) threshold: Option<u8>,
    /// Interview day (YYYY-MM-DD). Defaults to the next weekday.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) interview_date: Option<NaiveDate>,
    /// Skip the scheduling portion of the demo.
    #[arg(long)]
    pub(crate) skip_scheduling: bool,
}

const SAMPLE_CVS: [(&str, &str); 3] = [
    (
        "ada_lovelace.txt",
        "Ada Lovelace\nada.lovelace@example.com\n+15550100\n\n7 years building data platforms with Python, SQL and Docker.\nFluent English and French.\nBSc Mathematics, University of London",
    ),
    (
        "bob_martin.txt",
        "Bob Martin\nbob.martin@example.com\n\n2 years of reporting work, strong Excel background, some SQL exposure.\nEnglish speaker.",
    ),
    (
        "carla_reyes.txt",
        "Carla Reyes\ncarla.reyes@example.com\n\n4 years of backend Python services and SQL analytics. English and Spanish.\nMSc Software Engineering, University of Madrid",
    ),
];

fn demo_profile() -> JobProfile {
    JobProfile {
        title: "Senior Python Developer".to_string(),
        required_skills: vec![
            "Python".to_string(),
            "SQL".to_string(),
            "Docker".to_string(),
        ],
        minimum_experience_years: 3,
        required_languages: vec!["English".to_string()],
        description: "Backend developer for the recruitment data platform.".to_string(),
        location: "Remote".to_string(),
        salary_range: Some("$90k - $130k".to_string()),
    }
}

fn next_weekday(mut date: NaiveDate) -> NaiveDate {
    while date.weekday().num_days_from_monday() >= 5 {
        date = date.succ_opt().unwrap_or(date);
    }
    date
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let mut config = WorkflowConfig::default();
    // The bundled keyword evaluator scores well below the 0-100 LLM scale.
    config.selection_threshold = args.threshold.unwrap_or(40);
    let threshold = config.selection_threshold;

    let repository = Arc::new(InMemoryRunRepository::default());
    let calendar = Arc::new(InMemoryCalendar::default());
    let orchestrator = Arc::new(WorkflowOrchestrator::new(
        repository,
        default_collaborators(calendar.clone()),
        config,
    ));

    println!("Recruitment workflow demo");
    let profile = demo_profile();
    println!(
        "Profile: {} ({} skills required, threshold {})",
        profile.title,
        profile.required_skills.len(),
        threshold
    );

    let documents: Vec<CandidateDocument> = SAMPLE_CVS
        .iter()
        .map(|(filename, content)| CandidateDocument {
            filename: filename.to_string(),
            content: content.to_string(),
        })
        .collect();

    let run_id = orchestrator.start_run(profile, documents).await?;
    let view = orchestrator.run_status(&run_id)?;
    println!(
        "\nRun {} scored {} candidates (status: {})",
        view.run_id, view.counters.total_candidates, view.status
    );
    for candidate in &view.candidates {
        println!(
            "- {} <{}> score {} -> {} ({})",
            candidate.name, candidate.email, candidate.match_score, candidate.disposition,
            candidate.notes
        );
    }

    // A reviewer pulls one borderline candidate over the line.
    let borderline = view
        .candidates
        .iter()
        .find(|candidate| candidate.disposition == "rejected" && !candidate.email.is_empty());
    if let Some(candidate) = borderline {
        let mut decisions = BTreeMap::new();
        decisions.insert(candidate.email.clone(), ReviewDecision::Approve);
        let (receipt, _) = orchestrator.submit_decisions(&run_id, decisions).await?;
        println!(
            "\nReviewer approved {} ({} decision applied)",
            candidate.email, receipt.applied
        );
    }

    let finalized = orchestrator.finalize_review(&run_id).await?;
    println!(
        "\nReview finalized: {} selected, {} rejected, {} notifications sent",
        finalized.counters.selected,
        finalized.counters.rejected,
        finalized.counters.notifications_sent
    );

    if !args.skip_scheduling {
        let interview_date = next_weekday(
            args.interview_date
                .unwrap_or_else(|| Local::now().date_naive()),
        );
        let start = interview_date.and_time(
            NaiveTime::from_hms_opt(9, 0, 0).expect("valid start of the interview day"),
        );

        let selected: Vec<String> = finalized
            .candidates
            .iter()
            .filter(|candidate| candidate.disposition == "selected")
            .map(|candidate| candidate.email.clone())
            .collect();

        let outcomes = orchestrator
            .schedule_interviews(
                &run_id,
                selected,
                start,
                InterviewDetails {
                    interviewer: "Hiring Team".to_string(),
                    location: "Video call".to_string(),
                    kind: InterviewKind::Video,
                    notes: "Initial technical conversation".to_string(),
                },
            )
            .await?;

        println!("\nInterview schedule for {interview_date}");
        for item in &outcomes {
            match &item.outcome {
                Ok(interview) => println!(
                    "- {} -> {} ({} min, event {})",
                    interview.slot_start,
                    item.email,
                    interview.duration_minutes,
                    interview.external_event_id.as_deref().unwrap_or("none")
                ),
                Err(err) => println!("- {} could not be scheduled: {}", item.email, err),
            }
        }
        println!(
            "Calendar adapter recorded {} booking(s)",
            calendar.events().len()
        );
    }

    let blob = orchestrator.report(&run_id, ReportFormat::SummaryText).await?;
    match String::from_utf8(blob.bytes) {
        Ok(summary) => println!("\n{}", summary),
        Err(_) => println!("\nSummary report unavailable"),
    }

    Ok(())
}
