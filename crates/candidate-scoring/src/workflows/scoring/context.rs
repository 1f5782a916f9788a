use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::domain::{CandidateProfile, SupportingDocument, VacancyProfile};

/// Read access to the ATS documents a scoring run needs.
#[async_trait]
pub trait ContextStore: Send + Sync {
    async fn candidate(
        &self,
        workspace_id: &str,
        candidate_id: &str,
    ) -> Result<CandidateProfile, ContextError>;

    async fn vacancy(
        &self,
        workspace_id: &str,
        vacancy_id: &str,
    ) -> Result<VacancyProfile, ContextError>;

    /// Documents attached to the candidate, in source order. Absence is an empty list.
    async fn supporting_documents(
        &self,
        workspace_id: &str,
        candidate_id: &str,
    ) -> Result<Vec<SupportingDocument>, ContextError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextEntity {
    Candidate,
    Vacancy,
    Documents,
}

impl ContextEntity {
    pub const fn label(self) -> &'static str {
        match self {
            ContextEntity::Candidate => "candidate",
            ContextEntity::Vacancy => "vacancy",
            ContextEntity::Documents => "supporting documents",
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ContextError {
    #[error("{} {id} not found in workspace {workspace_id}", .entity.label())]
    NotFound {
        entity: ContextEntity,
        workspace_id: String,
        id: String,
    },
    #[error("context store unavailable: {0}")]
    Unavailable(String),
}

impl ContextError {
    pub fn not_found(
        entity: ContextEntity,
        workspace_id: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            entity,
            workspace_id: workspace_id.into(),
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ContextError::NotFound { .. })
    }
}

/// Everything the prompt needs, fetched as one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringContext {
    pub candidate: CandidateProfile,
    pub vacancy: VacancyProfile,
}

/// Fetches candidate, vacancy and supporting documents concurrently; any failure fails the bundle.
pub struct ContextAggregator<C> {
    store: Arc<C>,
}

impl<C> ContextAggregator<C>
where
    C: ContextStore + 'static,
{
    pub fn new(store: Arc<C>) -> Self {
        Self { store }
    }

    pub async fn gather(
        &self,
        workspace_id: &str,
        candidate_id: &str,
        vacancy_id: &str,
    ) -> Result<ScoringContext, ContextError> {
        // try_join! drops the remaining lookups as soon as one fails.
        let (mut candidate, vacancy, documents) = tokio::try_join!(
            self.store.candidate(workspace_id, candidate_id),
            self.store.vacancy(workspace_id, vacancy_id),
            self.store.supporting_documents(workspace_id, candidate_id),
        )?;

        debug!(
            workspace_id,
            candidate_id,
            vacancy_id,
            embedded_documents = candidate.documents.len(),
            fetched_documents = documents.len(),
            "scoring context gathered"
        );

        candidate.documents.extend(documents);
        Ok(ScoringContext { candidate, vacancy })
    }
}
