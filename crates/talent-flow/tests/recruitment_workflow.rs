//! End-to-end scenarios for the recruitment workflow, driven through the
//! public orchestrator facade and the HTTP router so intake, review,
//! scheduling, and reporting are exercised without reaching into private
//! modules.

mod common {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use talent_flow::config::WorkflowConfig;
    use talent_flow::workflows::recruitment::{
        recruitment_router, CandidateDocument, CandidateEvaluator, CandidateFields, Collaborators,
        DispatchError, EvaluationError, ExtractionError, JobProfile, NotificationKind,
        NotificationSender, RepositoryError, RunId, RunRepository, RunState, StructuredCandidate,
        TextExtractor, WorkflowOrchestrator,
    };

    pub(super) fn profile() -> JobProfile {
        JobProfile {
            title: "Data Platform Engineer".to_string(),
            required_skills: vec!["Python".to_string(), "SQL".to_string()],
            minimum_experience_years: 2,
            required_languages: vec!["English".to_string()],
            description: "Build and operate the ingestion pipelines.".to_string(),
            location: "Remote".to_string(),
            salary_range: None,
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
            phone: Some("+1 555 0100".to_string()),
            experience_years: Some(4),
            skills: skills.iter().map(|skill| skill.to_string()).collect(),
            languages: vec!["English".to_string()],
            education: vec!["MSc Software Engineering".to_string()],
            match_score: score,
            notes: "good pipeline background".to_string(),
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

    pub(super) struct PlainTextExtractor;

    #[async_trait]
    impl TextExtractor for PlainTextExtractor {
        async fn extract(&self, content: &[u8], filename: &str) -> Result<String, ExtractionError> {
            String::from_utf8(content.to_vec())
                .map_err(|_| ExtractionError::Unreadable(filename.to_string()))
        }
    }

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

    #[derive(Default)]
    pub(super) struct RecordingNotifier {
        pub(super) sent: Mutex<Vec<(String, NotificationKind)>>,
    }

    #[async_trait]
    impl NotificationSender for RecordingNotifier {
        async fn notify(
            &self,
            candidate: &StructuredCandidate,
            kind: NotificationKind,
        ) -> Result<(), DispatchError> {
            self.sent
                .lock()
                .expect("sent mutex poisoned")
                .push((candidate.email.clone(), kind));
            Ok(())
        }
    }

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

    pub(super) fn build_orchestrator(
        evaluator: ScriptedEvaluator,
    ) -> (Arc<WorkflowOrchestrator<MemoryRuns>>, Arc<RecordingNotifier>) {
        let repository = Arc::new(MemoryRuns::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let collaborators = Collaborators {
            extractor: Arc::new(PlainTextExtractor),
            evaluator: Arc::new(evaluator),
            notifier: notifier.clone(),
            calendar: None,
        };
        let orchestrator = Arc::new(WorkflowOrchestrator::new(
            repository,
            collaborators,
            WorkflowConfig::default(),
        ));
        (orchestrator, notifier)
    }

    pub(super) fn build_router(
        evaluator: ScriptedEvaluator,
    ) -> (axum::Router, Arc<RecordingNotifier>) {
        let (orchestrator, notifier) = build_orchestrator(evaluator);
        (recruitment_router(orchestrator), notifier)
    }
}

mod pipeline {
    use super::common::*;
    use talent_flow::workflows::recruitment::{NotificationKind, ReportFormat};

    #[tokio::test]
    async fn threshold_scenario_selects_a_and_rejects_b() {
        let (evaluator, documents) = standard_batch();
        let (orchestrator, notifier) = build_orchestrator(evaluator);

        let run_id = orchestrator
            .start_run(profile(), documents)
            .await
            .expect("run starts");

        let view = orchestrator
            .finalize_review(&run_id)
            .await
            .expect("finalize with no overrides");

        let selected: Vec<&str> = view
            .candidates
            .iter()
            .filter(|candidate| candidate.disposition == "selected")
            .map(|candidate| candidate.email.as_str())
            .collect();
        assert_eq!(selected, vec!["ada@example.com"]);

        let rejected = view
            .candidates
            .iter()
            .filter(|candidate| candidate.disposition == "rejected")
            .count();
        assert_eq!(rejected, 2);
        assert_eq!(
            view.counters.total_candidates,
            view.counters.selected + view.counters.rejected
        );

        let deliveries = notifier.sent.lock().expect("sent mutex poisoned").clone();
        assert_eq!(
            deliveries,
            vec![("ada@example.com".to_string(), NotificationKind::Selected)]
        );
    }

    #[tokio::test]
    async fn failed_evaluation_keeps_the_candidate_count() {
        let (evaluator, documents) = standard_batch();
        let (orchestrator, _) = build_orchestrator(evaluator);

        let run_id = orchestrator
            .start_run(profile(), documents)
            .await
            .expect("run starts");
        let view = orchestrator.run_status(&run_id).expect("status");

        assert_eq!(view.counters.total_candidates, 3);
        let sentinel = view
            .candidates
            .iter()
            .find(|candidate| candidate.source_file == "dana.txt")
            .expect("sentinel recorded");
        assert_eq!(sentinel.match_score, 0);
        assert!(!sentinel.notes.is_empty());
    }

    #[tokio::test]
    async fn summary_report_reflects_the_final_partition() {
        let (evaluator, documents) = standard_batch();
        let (orchestrator, _) = build_orchestrator(evaluator);

        let run_id = orchestrator
            .start_run(profile(), documents)
            .await
            .expect("run starts");
        orchestrator
            .finalize_review(&run_id)
            .await
            .expect("finalize succeeds");

        let blob = orchestrator
            .report(&run_id, ReportFormat::SummaryText)
            .await
            .expect("summary renders");
        let text = String::from_utf8(blob.bytes).expect("summary is utf-8");

        assert!(text.contains("Data Platform Engineer"));
        assert!(text.contains("Total candidates:      3"));
        assert!(text.contains("Ada Lovelace"));
    }
}

mod routing {
    use super::common::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn read_json(response: axum::response::Response) -> Value {
        let body = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&body).expect("json payload")
    }

    fn post_json(uri: &str, payload: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(payload).expect("serialize")))
            .expect("request")
    }

    async fn start_run(router: &axum::Router) -> String {
        let (_, documents) = standard_batch();
        let payload = json!({
            "job_profile": profile(),
            "documents": documents,
        });
        let response = router
            .clone()
            .oneshot(post_json("/api/v1/recruitment/runs", &payload))
            .await
            .expect("router dispatch");
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = read_json(response).await;
        body["run_id"].as_str().expect("run id present").to_string()
    }

    #[tokio::test]
    async fn run_lifecycle_over_http() {
        let (evaluator, _) = standard_batch();
        let (router, _) = build_router(evaluator);

        let run_id = start_run(&router).await;

        // Status query sees the full candidate list while awaiting review.
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(format!("/api/v1/recruitment/runs/{run_id}"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router dispatch");
        assert_eq!(response.status(), StatusCode::OK);
        let status = read_json(response).await;
        assert_eq!(status["status"], "awaiting_review");
        assert_eq!(status["counters"]["total_candidates"], 3);

        // Approve the weak candidate, then finalize.
        let response = router
            .clone()
            .oneshot(post_json(
                &format!("/api/v1/recruitment/runs/{run_id}/decisions"),
                &json!({ "decisions": { "bob@example.com": "approve" } }),
            ))
            .await
            .expect("router dispatch");
        assert_eq!(response.status(), StatusCode::OK);
        let decisions = read_json(response).await;
        assert_eq!(decisions["receipt"]["applied"], 1);

        let response = router
            .clone()
            .oneshot(post_json(
                &format!("/api/v1/recruitment/runs/{run_id}/finalize"),
                &json!({}),
            ))
            .await
            .expect("router dispatch");
        assert_eq!(response.status(), StatusCode::OK);
        let finalized = read_json(response).await;
        assert_eq!(finalized["status"], "scheduling");
        assert_eq!(finalized["counters"]["selected"], 2);

        // Bulk scheduling lands both approved candidates on successive slots.
        let response = router
            .clone()
            .oneshot(post_json(
                &format!("/api/v1/recruitment/runs/{run_id}/interviews"),
                &json!({
                    "emails": ["ada@example.com", "bob@example.com", "ghost@example.com"],
                    "start": "2024-06-03T09:00:00",
                    "interviewer": "Grace Hopper",
                    "location": "Video call",
                    "kind": "video",
                }),
            ))
            .await
            .expect("router dispatch");
        assert_eq!(response.status(), StatusCode::OK);
        let items = read_json(response).await;
        let items = items.as_array().expect("per-item outcomes");
        assert_eq!(items.len(), 3);
        assert_eq!(items[0]["interview"]["slot_start"], "2024-06-03T09:00:00");
        assert_eq!(items[1]["interview"]["slot_start"], "2024-06-03T10:00:00");
        assert!(items[2]["error"]
            .as_str()
            .expect("unknown candidate errors per item")
            .contains("not part of this run"));

        // The report download completes the run.
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(format!(
                        "/api/v1/recruitment/runs/{run_id}/report?format=json"
                    ))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router dispatch");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok()),
            Some("application/json")
        );
        let report = read_json(response).await;
        assert_eq!(report["run"]["status"], "complete");
        assert_eq!(report["run"]["counters"]["interviews_scheduled"], 2);
    }

    #[tokio::test]
    async fn free_slots_shrink_as_bindings_land() {
        let (evaluator, _) = standard_batch();
        let (router, _) = build_router(evaluator);
        let run_id = start_run(&router).await;

        router
            .clone()
            .oneshot(post_json(
                &format!("/api/v1/recruitment/runs/{run_id}/finalize"),
                &json!({}),
            ))
            .await
            .expect("router dispatch");

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(format!(
                        "/api/v1/recruitment/runs/{run_id}/slots?date=2024-06-03"
                    ))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router dispatch");
        assert_eq!(response.status(), StatusCode::OK);
        let before = read_json(response).await;
        assert_eq!(before.as_array().expect("slot list").len(), 7);

        router
            .clone()
            .oneshot(post_json(
                &format!("/api/v1/recruitment/runs/{run_id}/interviews"),
                &json!({
                    "emails": ["ada@example.com"],
                    "start": "2024-06-03T09:00:00",
                    "interviewer": "Grace Hopper",
                    "location": "Video call",
                    "kind": "phone",
                }),
            ))
            .await
            .expect("router dispatch");

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(format!(
                        "/api/v1/recruitment/runs/{run_id}/slots?date=2024-06-03"
                    ))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router dispatch");
        let after = read_json(response).await;
        assert_eq!(after.as_array().expect("slot list").len(), 6);
    }

    #[tokio::test]
    async fn unknown_run_returns_not_found() {
        let (evaluator, _) = standard_batch();
        let (router, _) = build_router(evaluator);

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/v1/recruitment/runs/run-999999")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router dispatch");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_report_format_is_a_bad_request() {
        let (evaluator, _) = standard_batch();
        let (router, _) = build_router(evaluator);
        let run_id = start_run(&router).await;

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(format!(
                        "/api/v1/recruitment/runs/{run_id}/report?format=parquet"
                    ))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router dispatch");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn structural_errors_reject_the_submission() {
        let (evaluator, _) = standard_batch();
        let (router, _) = build_router(evaluator);

        let mut bad_profile = profile();
        bad_profile.required_skills.clear();
        let payload = json!({
            "job_profile": bad_profile,
            "documents": [document("ada.txt", "ada cv")],
        });

        let response = router
            .clone()
            .oneshot(post_json("/api/v1/recruitment/runs", &payload))
            .await
            .expect("router dispatch");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_json(response).await;
        assert!(body["error"]
            .as_str()
            .expect("error message")
            .contains("required_skills"));
    }

    #[tokio::test]
    async fn cancel_lands_the_run_in_failed_with_partial_results() {
        let (evaluator, _) = standard_batch();
        let (router, _) = build_router(evaluator);
        let run_id = start_run(&router).await;

        let response = router
            .clone()
            .oneshot(post_json(
                &format!("/api/v1/recruitment/runs/{run_id}/cancel"),
                &json!({ "reason": "position closed" }),
            ))
            .await
            .expect("router dispatch");
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["status"], "failed");
        assert_eq!(body["counters"]["total_candidates"], 3);
    }
}
