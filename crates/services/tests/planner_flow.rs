use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use planner_core::model::{ExamDateMap, SessionStatus, Subject, SubjectList, WeaknessRegistry};
use planner_core::time::{fixed_clock, fixed_now};
use planner_core::{FeedbackError, FeedbackEvent, PlanRequest};
use serde_json::{Value, json};
use services::api::{
    GenerationResponse, PlannerApi, RemotePlanRecord, StatusUpdateRequest, StatusUpdateResponse,
};
use services::{AppServices, PlannerConfig, PlannerError, PlannerService, TransportError};
use storage::repository::{InMemoryRepository, PlanSnapshotRepository, Storage};

#[derive(Default)]
struct FakeApi {
    generation: Mutex<Option<Result<GenerationResponse, TransportError>>>,
    update: Mutex<Option<Result<StatusUpdateResponse, TransportError>>>,
    requests: Mutex<Vec<Value>>,
    updates: Mutex<Vec<StatusUpdateRequest>>,
}

impl FakeApi {
    fn generating(plan: Value) -> Self {
        let api = Self::default();
        *api.generation.lock().unwrap() = Some(Ok(GenerationResponse {
            plan: Some(plan),
            ..GenerationResponse::default()
        }));
        api
    }

    fn answer_updates(&self, result: Result<StatusUpdateResponse, TransportError>) {
        *self.update.lock().unwrap() = Some(result);
    }
}

#[async_trait]
impl PlannerApi for FakeApi {
    async fn generate_plan(
        &self,
        request: &PlanRequest,
    ) -> Result<GenerationResponse, TransportError> {
        self.requests
            .lock()
            .unwrap()
            .push(serde_json::to_value(request).unwrap());
        self.generation
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Ok(GenerationResponse::default()))
    }

    async fn update_session(
        &self,
        request: &StatusUpdateRequest,
    ) -> Result<StatusUpdateResponse, TransportError> {
        self.updates.lock().unwrap().push(request.clone());
        self.update
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Ok(StatusUpdateResponse::default()))
    }

    async fn list_plans(&self) -> Result<Vec<RemotePlanRecord>, TransportError> {
        Ok(Vec::new())
    }
}

fn maths() -> Subject {
    Subject::parse("Maths").unwrap()
}

fn one_session_plan() -> Value {
    json!({
        "2023-11-14": [
            {"subject": "Maths", "topic": "Algebra", "duration": "1h", "time_slot": "Morning", "status": "not_started"}
        ]
    })
}

fn service(api: Arc<FakeApi>) -> (PlannerService, InMemoryRepository) {
    let repo = InMemoryRepository::new();
    let svc = PlannerService::new(fixed_clock(), api).with_snapshots(Arc::new(repo.clone()));
    (svc, repo)
}

#[tokio::test]
async fn generate_settles_drafts_and_saves_snapshot() {
    let api = Arc::new(FakeApi::generating(one_session_plan()));
    let (svc, repo) = service(Arc::clone(&api));

    let mut subjects = SubjectList::new();
    subjects.add("Maths").unwrap();
    let mut registry = WeaknessRegistry::new(fixed_clock());
    registry.record_topic_draft(&maths(), "Algebra ");
    registry.record_topic_draft(&maths(), "Algebra");
    let mut exams = ExamDateMap::new();
    exams.set(maths(), "2023-11-20").unwrap();

    let generated = svc
        .generate(subjects.as_slice(), &mut registry, &exams)
        .await
        .unwrap();

    let sent = api.requests.lock().unwrap().clone();
    assert_eq!(
        sent,
        vec![json!({
            "subjects": ["Maths"],
            "weaknesses": {"Maths": {"Algebra": 1}},
            "exams": {"Maths": "2023-11-20"}
        })]
    );
    assert_eq!(generated.document.progress().total_sessions, 1);
    assert_eq!(generated.document.progress().not_started_sessions, 1);

    let id = generated.snapshot_id.expect("snapshot saved");
    assert_eq!(repo.get_snapshot(id).await.unwrap(), generated.document);
}

#[tokio::test]
async fn service_error_is_surfaced_not_parsed() {
    let api = Arc::new(FakeApi::default());
    *api.generation.lock().unwrap() = Some(Ok(GenerationResponse {
        error: Some("Missing subjects".into()),
        plan: Some(json!({"bogus": 1})),
        ..GenerationResponse::default()
    }));
    let (svc, repo) = service(Arc::clone(&api));

    let mut registry = WeaknessRegistry::new(fixed_clock());
    let err = svc
        .generate(&[maths()], &mut registry, &ExamDateMap::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PlannerError::Service { ref message } if message == "Missing subjects"));
    assert!(repo.latest_snapshot().await.unwrap().is_none());
}

#[tokio::test]
async fn empty_subjects_never_reach_the_service() {
    let api = Arc::new(FakeApi::generating(one_session_plan()));
    let (svc, _repo) = service(Arc::clone(&api));
    let mut registry = WeaknessRegistry::new(fixed_clock());

    let err = svc
        .generate(&[], &mut registry, &ExamDateMap::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PlannerError::Assemble(_)));
    assert!(api.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_plan_is_rejected() {
    let api = Arc::new(FakeApi::generating(json!({
        "Morning": [{"subject": "Maths", "topic": "Algebra", "duration": 1, "status": "finished"}]
    })));
    let (svc, _repo) = service(api);
    let mut registry = WeaknessRegistry::new(fixed_clock());

    let err = svc
        .generate(&[maths()], &mut registry, &ExamDateMap::new())
        .await
        .unwrap_err();
    match err {
        PlannerError::MalformedPlan(inner) => {
            assert_eq!(inner.slot.as_deref(), Some("Morning"));
            assert_eq!(inner.index, Some(0));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn feedback_applies_only_after_success() {
    let api = Arc::new(FakeApi::generating(one_session_plan()));
    let (svc, _repo) = service(Arc::clone(&api));
    let mut registry = WeaknessRegistry::new(fixed_clock());
    let doc = svc
        .generate(&[maths()], &mut registry, &ExamDateMap::new())
        .await
        .unwrap()
        .document;
    let event = FeedbackEvent::new(maths(), Some("Algebra"), SessionStatus::Completed);

    api.answer_updates(Ok(StatusUpdateResponse {
        success: false,
        error: None,
    }));
    let err = svc.submit_feedback(&doc, &event).await.unwrap_err();
    assert!(matches!(err, PlannerError::Rejected { .. }));
    assert!(err.is_recoverable());

    api.answer_updates(Err(TransportError::HttpStatus(
        reqwest::StatusCode::BAD_GATEWAY,
    )));
    let err = svc.submit_feedback(&doc, &event).await.unwrap_err();
    assert!(matches!(err, PlannerError::Transport(_)));

    api.answer_updates(Ok(StatusUpdateResponse {
        success: true,
        error: None,
    }));
    let next = svc.submit_feedback(&doc, &event).await.unwrap();
    assert_eq!(next.progress().completed_sessions, 1);
    assert_eq!(doc.progress().completed_sessions, 0);

    let sent = api.updates.lock().unwrap().clone();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[2].date, "2023-11-14");
    assert_eq!(sent[2].topic.as_deref(), Some("Algebra"));
    assert_eq!(sent[2].status, SessionStatus::Completed);
}

#[tokio::test]
async fn unknown_session_is_not_sent() {
    let api = Arc::new(FakeApi::generating(one_session_plan()));
    let (svc, _repo) = service(Arc::clone(&api));
    let mut registry = WeaknessRegistry::new(fixed_clock());
    let doc = svc
        .generate(&[maths()], &mut registry, &ExamDateMap::new())
        .await
        .unwrap()
        .document;

    let event = FeedbackEvent::new(maths(), Some("Geometry"), SessionStatus::Completed);
    let err = svc.submit_feedback(&doc, &event).await.unwrap_err();
    assert!(matches!(
        err,
        PlannerError::Feedback(FeedbackError::SessionNotFound { .. })
    ));
    assert!(api.updates.lock().unwrap().is_empty());
}

#[tokio::test]
async fn app_services_persist_and_list_history() {
    let api = Arc::new(FakeApi::generating(one_session_plan()));
    let services = AppServices::from_parts(
        fixed_clock(),
        PlannerConfig::default(),
        api,
        Storage::in_memory(),
    );
    let planner = services.planner();
    let mut registry = services.new_registry();
    assert_eq!(registry.debounce_window().num_milliseconds(), 500);

    let generated = planner
        .generate(&[maths()], &mut registry, &ExamDateMap::new())
        .await
        .unwrap();
    let id = generated.snapshot_id.unwrap();

    let updated = generated
        .document
        .apply_feedback(&FeedbackEvent::new(
            maths(),
            Some("Algebra"),
            SessionStatus::InProgress,
        ))
        .unwrap();
    assert_eq!(planner.persist(Some(id), &updated).await.unwrap(), Some(id));

    let (latest_id, latest) = planner.latest().await.unwrap().unwrap();
    assert_eq!(latest_id, id);
    assert_eq!(latest.progress().in_progress_sessions, 1);

    let history = planner.history(10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].saved_at, fixed_now());
    assert!(planner.remote_plans().await.unwrap().is_empty());
}
