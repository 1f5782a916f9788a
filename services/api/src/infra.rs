use async_trait::async_trait;
use candidate_scoring::error::AppError;
use candidate_scoring::workflows::scoring::{
    rank_results, CandidateProfile, ContextEntity, ContextError, ContextStore, EventBus,
    PublishError, ResultKey, ResultStore, ScoreQuery, ScoringResult, StoreError,
    SupportingDocument, VacancyProfile,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

type WorkspaceKey = (String, String);

/// Seed file layout: workspace id → the documents to preload for it.
#[derive(Debug, Default, Deserialize)]
#[serde(transparent)]
pub(crate) struct SeedData(HashMap<String, SeedWorkspace>);

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SeedWorkspace {
    candidates: HashMap<String, CandidateProfile>,
    vacancies: HashMap<String, VacancyProfile>,
    documents: HashMap<String, Vec<SupportingDocument>>,
}

#[derive(Default)]
struct Documents {
    candidates: HashMap<WorkspaceKey, CandidateProfile>,
    vacancies: HashMap<WorkspaceKey, VacancyProfile>,
    attachments: HashMap<WorkspaceKey, Vec<SupportingDocument>>,
    results: HashMap<ResultKey, ScoringResult>,
}

/// Process-local document store serving both ATS context lookups and scoring results.
#[derive(Default, Clone)]
pub(crate) struct InMemoryDocumentStore {
    inner: Arc<Mutex<Documents>>,
}

impl InMemoryDocumentStore {
    pub(crate) fn from_seed(seed: SeedData) -> Self {
        let mut documents = Documents::default();
        for (workspace_id, workspace) in seed.0 {
            for (id, candidate) in workspace.candidates {
                documents
                    .candidates
                    .insert((workspace_id.clone(), id), candidate);
            }
            for (id, vacancy) in workspace.vacancies {
                documents.vacancies.insert((workspace_id.clone(), id), vacancy);
            }
            for (candidate_id, attachments) in workspace.documents {
                documents
                    .attachments
                    .insert((workspace_id.clone(), candidate_id), attachments);
            }
        }
        Self {
            inner: Arc::new(Mutex::new(documents)),
        }
    }

    pub(crate) fn from_seed_json(raw: &str) -> Result<Self, AppError> {
        let seed: SeedData = serde_json::from_str(raw)?;
        Ok(Self::from_seed(seed))
    }

    pub(crate) fn load_seed(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path)?;
        let store = Self::from_seed_json(&raw)?;
        if let Ok(guard) = store.inner.lock() {
            info!(
                path = %path.display(),
                candidates = guard.candidates.len(),
                vacancies = guard.vacancies.len(),
                "seed data loaded"
            );
        }
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Documents>, String> {
        self.inner
            .lock()
            .map_err(|_| "document store mutex poisoned".to_string())
    }
}

fn key(workspace_id: &str, id: &str) -> WorkspaceKey {
    (workspace_id.to_string(), id.to_string())
}

#[async_trait]
impl ContextStore for InMemoryDocumentStore {
    async fn candidate(
        &self,
        workspace_id: &str,
        candidate_id: &str,
    ) -> Result<CandidateProfile, ContextError> {
        let guard = self.lock().map_err(ContextError::Unavailable)?;
        guard
            .candidates
            .get(&key(workspace_id, candidate_id))
            .cloned()
            .ok_or_else(|| {
                ContextError::not_found(ContextEntity::Candidate, workspace_id, candidate_id)
            })
    }

    async fn vacancy(
        &self,
        workspace_id: &str,
        vacancy_id: &str,
    ) -> Result<VacancyProfile, ContextError> {
        let guard = self.lock().map_err(ContextError::Unavailable)?;
        guard
            .vacancies
            .get(&key(workspace_id, vacancy_id))
            .cloned()
            .ok_or_else(|| ContextError::not_found(ContextEntity::Vacancy, workspace_id, vacancy_id))
    }

    async fn supporting_documents(
        &self,
        workspace_id: &str,
        candidate_id: &str,
    ) -> Result<Vec<SupportingDocument>, ContextError> {
        let guard = self.lock().map_err(ContextError::Unavailable)?;
        Ok(guard
            .attachments
            .get(&key(workspace_id, candidate_id))
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl ResultStore for InMemoryDocumentStore {
    async fn save(&self, result: &ScoringResult) -> Result<String, StoreError> {
        let mut guard = self.lock().map_err(StoreError::Unavailable)?;
        let key = result.key();
        let id = key.document_id();
        guard.results.insert(key, result.clone());
        Ok(id)
    }

    async fn get(
        &self,
        workspace_id: &str,
        application_id: &str,
    ) -> Result<ScoringResult, StoreError> {
        let guard = self.lock().map_err(StoreError::Unavailable)?;
        guard
            .results
            .get(&ResultKey::new(workspace_id, application_id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn query(&self, query: &ScoreQuery) -> Result<Vec<ScoringResult>, StoreError> {
        let guard = self.lock().map_err(StoreError::Unavailable)?;
        Ok(rank_results(query, guard.results.values()))
    }
}

/// How many published events the in-process bus keeps; older entries are evicted first.
pub(crate) const RECENT_EVENTS_CAPACITY: usize = 128;

/// Event bus that logs each delivery and keeps only the most recent payloads.
#[derive(Clone)]
pub(crate) struct InMemoryEventBus {
    recent: Arc<Mutex<VecDeque<(String, Vec<u8>)>>>,
    capacity: usize,
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::with_capacity(RECENT_EVENTS_CAPACITY)
    }
}

impl InMemoryEventBus {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            recent: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<String, PublishError> {
        let message_id = Uuid::new_v4().to_string();
        let bytes = payload.len();
        {
            let mut recent = self
                .recent
                .lock()
                .map_err(|_| PublishError::Transport("event bus mutex poisoned".to_string()))?;
            if self.capacity > 0 {
                if recent.len() == self.capacity {
                    recent.pop_front();
                }
                recent.push_back((topic.to_string(), payload));
            }
        }
        info!(topic, message_id = %message_id, bytes, "event recorded");
        Ok(message_id)
    }
}

#[cfg(test)]
impl InMemoryEventBus {
    pub(crate) fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.recent
            .lock()
            .expect("bus mutex poisoned")
            .iter()
            .cloned()
            .collect()
    }
}
