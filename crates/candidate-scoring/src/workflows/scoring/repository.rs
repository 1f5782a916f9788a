use async_trait::async_trait;
use serde::Deserialize;

use super::domain::ScoringResult;

/// Upper bound for `query` page sizes.
pub const MAX_QUERY_LIMIT: usize = 200;
pub const DEFAULT_QUERY_LIMIT: usize = 50;

/// Persistence for scoring outcomes, keyed by (workspace, application).
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Write or overwrite the result under its key and return the stable document id.
    async fn save(&self, result: &ScoringResult) -> Result<String, StoreError>;

    async fn get(
        &self,
        workspace_id: &str,
        application_id: &str,
    ) -> Result<ScoringResult, StoreError>;

    /// Results for a workspace, newest first, at most `query.limit` entries.
    async fn query(&self, query: &ScoreQuery) -> Result<Vec<ScoringResult>, StoreError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("scoring result not found")]
    NotFound,
    #[error("result store unavailable: {0}")]
    Unavailable(String),
}

/// Filter for listing stored results.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScoreQuery {
    pub workspace_id: String,
    #[serde(default)]
    pub candidate_id: Option<String>,
    #[serde(default)]
    pub vacancy_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_QUERY_LIMIT
}

impl ScoreQuery {
    pub fn for_workspace(workspace_id: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            candidate_id: None,
            vacancy_id: None,
            limit: DEFAULT_QUERY_LIMIT,
        }
    }

    pub fn limit_in_range(&self) -> bool {
        (1..=MAX_QUERY_LIMIT).contains(&self.limit)
    }

    pub fn matches(&self, result: &ScoringResult) -> bool {
        result.workspace_id == self.workspace_id
            && self
                .candidate_id
                .as_deref()
                .map_or(true, |id| result.candidate_id == id)
            && self
                .vacancy_id
                .as_deref()
                .map_or(true, |id| result.vacancy_id == id)
    }
}

/// Filter, order newest first, and truncate; shared by store implementations that hold
/// results in memory.
pub fn rank_results<'a, I>(query: &ScoreQuery, results: I) -> Vec<ScoringResult>
where
    I: IntoIterator<Item = &'a ScoringResult>,
{
    let mut matched: Vec<ScoringResult> = results
        .into_iter()
        .filter(|result| query.matches(result))
        .cloned()
        .collect();
    matched.sort_by(|left, right| {
        right
            .scored_at
            .cmp(&left.scored_at)
            .then_with(|| left.application_id.cmp(&right.application_id))
    });
    matched.truncate(query.limit);
    matched
}
