use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::config::PipelineConfig;
use crate::workflows::scoring::context::{ContextEntity, ContextError, ContextStore};
use crate::workflows::scoring::domain::{
    CandidateJob, CandidateProfile, ResultKey, Score, ScoringRequest, ScoringResult,
    SupportingDocument, TokenUsage, VacancyAddress, VacancyProfile,
};
use crate::workflows::scoring::publisher::{EventBus, PublishError};
use crate::workflows::scoring::repository::{rank_results, ResultStore, ScoreQuery, StoreError};
use crate::workflows::scoring::scorer::{
    ScorerClient, ScorerError, ScorerRequest, ScorerResponse,
};
use crate::workflows::scoring::service::{ScoringOrchestrator, ScoringSettings};

pub(super) const WORKSPACE: &str = "ws-test";
pub(super) const GOOD_FIT: &str = r#"{"score": 72, "reasoning": "Good fit overall."}"#;

pub(super) type TestOrchestrator =
    ScoringOrchestrator<MemoryContext, StubScorer, MemoryResults, MemoryBus>;

pub(super) fn request(application_id: &str) -> ScoringRequest {
    ScoringRequest {
        application_id: application_id.to_string(),
        candidate_id: "cand-1".to_string(),
        vacancy_id: "vac-1".to_string(),
        workspace_id: WORKSPACE.to_string(),
    }
}

pub(super) fn candidate() -> CandidateProfile {
    CandidateProfile {
        id: Some("cand-1".to_string()),
        name: Some("Sanne de Jong".to_string()),
        email: Some("sanne@example.com".to_string()),
        job: Some(CandidateJob {
            title: Some("Tandartsassistent".to_string()),
            company: Some("Praktijk Noord".to_string()),
        }),
        documents: vec![SupportingDocument::new("Intake", "Beschikbaar vanaf maart.")],
        ..CandidateProfile::default()
    }
}

pub(super) fn vacancy() -> VacancyProfile {
    VacancyProfile {
        id: Some("vac-1".to_string()),
        title: Some("Tandartsassistent".to_string()),
        description: Some("Moderne praktijk zoekt assistent.".to_string()),
        hard_requirements: Some("Diploma tandartsassistent".to_string()),
        address: Some(VacancyAddress {
            city: Some("Westland".to_string()),
            country: Some("Netherlands".to_string()),
            ..VacancyAddress::default()
        }),
        ..VacancyProfile::default()
    }
}

pub(super) fn stored_result(application_id: &str, candidate_id: &str, hour: u32) -> ScoringResult {
    ScoringResult {
        application_id: application_id.to_string(),
        candidate_id: candidate_id.to_string(),
        vacancy_id: "vac-1".to_string(),
        workspace_id: WORKSPACE.to_string(),
        score: Score::new(60).expect("valid score"),
        reasoning: "Moderate fit.".to_string(),
        model: "stub-model".to_string(),
        latency_ms: 10,
        tokens: TokenUsage::default(),
        scored_at: at_hour(hour),
    }
}

pub(super) fn at_hour(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn settings() -> ScoringSettings {
    ScoringSettings {
        pipeline: PipelineConfig {
            stage_timeout: Duration::from_secs(5),
            max_concurrent_runs: 4,
        },
        ..ScoringSettings::default()
    }
}

pub(super) struct Harness {
    pub(super) orchestrator: Arc<TestOrchestrator>,
    pub(super) context: Arc<MemoryContext>,
    pub(super) scorer: Arc<StubScorer>,
    pub(super) results: Arc<MemoryResults>,
    pub(super) bus: Arc<MemoryBus>,
}

pub(super) fn harness_with(scorer: StubScorer, bus: MemoryBus, settings: ScoringSettings) -> Harness {
    let context = Arc::new(MemoryContext::seeded());
    let scorer = Arc::new(scorer);
    let results = Arc::new(MemoryResults::default());
    let bus = Arc::new(bus);
    let orchestrator = Arc::new(ScoringOrchestrator::new(
        context.clone(),
        scorer.clone(),
        results.clone(),
        bus.clone(),
        settings,
    ));
    Harness {
        orchestrator,
        context,
        scorer,
        results,
        bus,
    }
}

pub(super) fn harness() -> Harness {
    harness_with(StubScorer::replying(GOOD_FIT), MemoryBus::default(), settings())
}

#[derive(Default)]
pub(super) struct MemoryContext {
    candidates: Mutex<HashMap<(String, String), CandidateProfile>>,
    vacancies: Mutex<HashMap<(String, String), VacancyProfile>>,
    documents: Mutex<HashMap<(String, String), Vec<SupportingDocument>>>,
}

impl MemoryContext {
    pub(super) fn seeded() -> Self {
        let store = Self::default();
        store.put_candidate("cand-1", candidate());
        store.put_vacancy("vac-1", vacancy());
        store
            .documents
            .lock()
            .expect("context mutex poisoned")
            .insert(
                (WORKSPACE.to_string(), "cand-1".to_string()),
                vec![SupportingDocument::new("Resume", "Vijf jaar ervaring.")],
            );
        store
    }

    pub(super) fn put_candidate(&self, id: &str, candidate: CandidateProfile) {
        self.candidates
            .lock()
            .expect("context mutex poisoned")
            .insert((WORKSPACE.to_string(), id.to_string()), candidate);
    }

    pub(super) fn put_vacancy(&self, id: &str, vacancy: VacancyProfile) {
        self.vacancies
            .lock()
            .expect("context mutex poisoned")
            .insert((WORKSPACE.to_string(), id.to_string()), vacancy);
    }

    pub(super) fn remove_candidate(&self, id: &str) {
        self.candidates
            .lock()
            .expect("context mutex poisoned")
            .remove(&(WORKSPACE.to_string(), id.to_string()));
    }
}

#[async_trait]
impl ContextStore for MemoryContext {
    async fn candidate(
        &self,
        workspace_id: &str,
        candidate_id: &str,
    ) -> Result<CandidateProfile, ContextError> {
        self.candidates
            .lock()
            .expect("context mutex poisoned")
            .get(&(workspace_id.to_string(), candidate_id.to_string()))
            .cloned()
            .ok_or_else(|| ContextError::not_found(ContextEntity::Candidate, workspace_id, candidate_id))
    }

    async fn vacancy(
        &self,
        workspace_id: &str,
        vacancy_id: &str,
    ) -> Result<VacancyProfile, ContextError> {
        self.vacancies
            .lock()
            .expect("context mutex poisoned")
            .get(&(workspace_id.to_string(), vacancy_id.to_string()))
            .cloned()
            .ok_or_else(|| ContextError::not_found(ContextEntity::Vacancy, workspace_id, vacancy_id))
    }

    async fn supporting_documents(
        &self,
        workspace_id: &str,
        candidate_id: &str,
    ) -> Result<Vec<SupportingDocument>, ContextError> {
        Ok(self
            .documents
            .lock()
            .expect("context mutex poisoned")
            .get(&(workspace_id.to_string(), candidate_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

/// Context store whose document lookup never answers.
#[derive(Default)]
pub(super) struct StalledDocuments {
    unknown_candidate: bool,
}

impl StalledDocuments {
    /// Candidate lookups fail with `NotFound` while documents still hang.
    pub(super) fn unknown_candidate() -> Self {
        Self {
            unknown_candidate: true,
        }
    }
}

#[async_trait]
impl ContextStore for StalledDocuments {
    async fn candidate(
        &self,
        workspace_id: &str,
        candidate_id: &str,
    ) -> Result<CandidateProfile, ContextError> {
        if self.unknown_candidate {
            return Err(ContextError::not_found(
                ContextEntity::Candidate,
                workspace_id,
                candidate_id,
            ));
        }
        Ok(candidate())
    }

    async fn vacancy(&self, _: &str, _: &str) -> Result<VacancyProfile, ContextError> {
        Ok(vacancy())
    }

    async fn supporting_documents(
        &self,
        _: &str,
        _: &str,
    ) -> Result<Vec<SupportingDocument>, ContextError> {
        std::future::pending().await
    }
}

pub(super) enum Reply {
    Text(String),
    Fail(ScorerError),
    Stall,
}

pub(super) struct StubScorer {
    replies: Mutex<Vec<Reply>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<ScorerRequest>>,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl StubScorer {
    pub(super) fn replying(text: &str) -> Self {
        Self::sequence(vec![Reply::Text(text.to_string())])
    }

    pub(super) fn failing(error: ScorerError) -> Self {
        Self::sequence(vec![Reply::Fail(error)])
    }

    pub(super) fn stalling() -> Self {
        Self::sequence(vec![Reply::Stall])
    }

    /// Replies in order; the last reply repeats once the list is exhausted.
    pub(super) fn sequence(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            latency: None,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Holds every call open for `latency` before replying.
    pub(super) fn slow(text: &str, latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::replying(text)
        }
    }

    /// Most calls that were ever in progress at the same time.
    pub(super) fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(super) fn requests(&self) -> Vec<ScorerRequest> {
        self.requests.lock().expect("scorer mutex poisoned").clone()
    }

    fn next_reply(&self) -> Reply {
        let mut replies = self.replies.lock().expect("scorer mutex poisoned");
        if replies.len() > 1 {
            return replies.remove(0);
        }
        match replies.first() {
            Some(Reply::Text(text)) => Reply::Text(text.clone()),
            Some(Reply::Fail(error)) => Reply::Fail(error.clone()),
            Some(Reply::Stall) | None => Reply::Stall,
        }
    }
}

#[async_trait]
impl ScorerClient for StubScorer {
    async fn generate(&self, request: ScorerRequest) -> Result<ScorerResponse, ScorerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .expect("scorer mutex poisoned")
            .push(request);

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.next_reply() {
            Reply::Text(text) => Ok(ScorerResponse {
                text,
                usage: Some(TokenUsage {
                    prompt_tokens: 120,
                    completion_tokens: 30,
                    total_tokens: 150,
                }),
            }),
            Reply::Fail(error) => Err(error),
            Reply::Stall => std::future::pending().await,
        }
    }
}

#[derive(Default)]
pub(super) struct MemoryResults {
    records: Mutex<HashMap<ResultKey, ScoringResult>>,
}

impl MemoryResults {
    pub(super) fn len(&self) -> usize {
        self.records.lock().expect("results mutex poisoned").len()
    }

    pub(super) fn insert(&self, result: ScoringResult) {
        self.records
            .lock()
            .expect("results mutex poisoned")
            .insert(result.key(), result);
    }
}

#[async_trait]
impl ResultStore for MemoryResults {
    async fn save(&self, result: &ScoringResult) -> Result<String, StoreError> {
        let key = result.key();
        let id = key.document_id();
        self.records
            .lock()
            .expect("results mutex poisoned")
            .insert(key, result.clone());
        Ok(id)
    }

    async fn get(
        &self,
        workspace_id: &str,
        application_id: &str,
    ) -> Result<ScoringResult, StoreError> {
        self.records
            .lock()
            .expect("results mutex poisoned")
            .get(&ResultKey::new(workspace_id, application_id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn query(&self, query: &ScoreQuery) -> Result<Vec<ScoringResult>, StoreError> {
        let guard = self.records.lock().expect("results mutex poisoned");
        Ok(rank_results(query, guard.values()))
    }
}

#[derive(Default)]
pub(super) struct MemoryBus {
    published: Mutex<Vec<(String, Value)>>,
    offline: bool,
}

impl MemoryBus {
    pub(super) fn offline() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            offline: true,
        }
    }

    pub(super) fn published(&self) -> Vec<(String, Value)> {
        self.published.lock().expect("bus mutex poisoned").clone()
    }

    pub(super) fn on_topic(&self, topic: &str) -> Vec<Value> {
        self.published()
            .into_iter()
            .filter(|(published_topic, _)| published_topic == topic)
            .map(|(_, payload)| payload)
            .collect()
    }
}

#[async_trait]
impl EventBus for MemoryBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<String, PublishError> {
        if self.offline {
            return Err(PublishError::Transport("bus offline".to_string()));
        }
        let value: Value = serde_json::from_slice(&payload)
            .map_err(|err| PublishError::Serialization(err.to_string()))?;
        let mut guard = self.published.lock().expect("bus mutex poisoned");
        guard.push((topic.to_string(), value));
        Ok(format!("msg-{}", guard.len()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
