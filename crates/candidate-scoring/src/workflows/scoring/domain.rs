use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const SCORE_CALCULATED_EVENT: &str = "carv.score.calculated";
pub const SCORE_FAILED_EVENT: &str = "carv.score.failed";

/// Identifies one scoring unit: a candidate's application to a vacancy inside a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScoringRequest {
    pub application_id: String,
    pub candidate_id: String,
    pub vacancy_id: String,
    pub workspace_id: String,
}

impl ScoringRequest {
    /// Every identifier must be present; blank ids can never resolve to a document.
    pub fn validate(&self) -> Result<(), MissingField> {
        let fields = [
            ("workspace_id", &self.workspace_id),
            ("application_id", &self.application_id),
            ("candidate_id", &self.candidate_id),
            ("vacancy_id", &self.vacancy_id),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(MissingField(name));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{0} must not be blank")]
pub struct MissingField(pub &'static str);

/// Candidate record as stored by the ATS integration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CandidateProfile {
    pub id: Option<String>,
    pub name: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub job: Option<CandidateJob>,
    pub profile_url: Option<String>,
    pub workspace_id: Option<String>,
    #[serde(alias = "sources")]
    pub documents: Vec<SupportingDocument>,
}

impl CandidateProfile {
    /// Full name, falling back to `firstname lastname` when the name field is blank.
    pub fn display_name(&self) -> Option<String> {
        if let Some(name) = non_blank(self.name.as_deref()) {
            return Some(name.to_string());
        }

        let joined = [self.firstname.as_deref(), self.lastname.as_deref()]
            .into_iter()
            .filter_map(non_blank)
            .collect::<Vec<_>>()
            .join(" ");

        if joined.is_empty() {
            None
        } else {
            Some(joined)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateJob {
    pub title: Option<String>,
    pub company: Option<String>,
}

/// Free-text evidence attached to a candidate (resume, assessment, intake notes).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupportingDocument {
    #[serde(alias = "source_label")]
    pub label: String,
    #[serde(alias = "source_content")]
    pub text: String,
    #[serde(alias = "source_metadata")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl SupportingDocument {
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
            metadata: BTreeMap::new(),
        }
    }
}

/// Vacancy record as stored by the ATS integration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VacancyProfile {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub hard_requirements: Option<String>,
    pub soft_requirements: Option<String>,
    pub about_company: Option<String>,
    pub address: Option<VacancyAddress>,
    pub status: Option<String>,
    pub workspace_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VacancyAddress {
    #[serde(alias = "address1")]
    pub street: Option<String>,
    pub city: Option<String>,
    #[serde(alias = "zip")]
    pub zip_code: Option<String>,
    pub country: Option<String>,
}

/// Candidate fit on the 0..=100 scale. Out-of-range values never construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Score(u8);

impl Score {
    pub const MAX: u8 = 100;

    pub fn new(value: i64) -> Result<Self, ScoreOutOfRange> {
        if (0..=i64::from(Self::MAX)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(ScoreOutOfRange(value))
        }
    }

    pub const fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Score {
    type Error = ScoreOutOfRange;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> Self {
        score.0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("score {0} is outside the 0..=100 range")]
pub struct ScoreOutOfRange(pub i64);

/// Validated model verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScorerOutput {
    pub score: Score,
    pub reasoning: String,
}

impl ScorerOutput {
    pub fn new(score: i64, reasoning: impl Into<String>) -> Result<Self, InvalidScorerOutput> {
        let score = Score::new(score)?;
        let reasoning = reasoning.into();
        if reasoning.trim().is_empty() {
            return Err(InvalidScorerOutput::MissingReasoning);
        }
        Ok(Self { score, reasoning })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidScorerOutput {
    #[error(transparent)]
    Score(#[from] ScoreOutOfRange),
    #[error("reasoning is missing or blank")]
    MissingReasoning,
}

/// Token accounting reported by the model; zeroes when the model reports nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Persisted outcome of one successful pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    pub application_id: String,
    pub candidate_id: String,
    pub vacancy_id: String,
    pub workspace_id: String,
    pub score: Score,
    pub reasoning: String,
    pub model: String,
    pub latency_ms: u64,
    #[serde(default)]
    pub tokens: TokenUsage,
    pub scored_at: DateTime<Utc>,
}

impl ScoringResult {
    pub fn key(&self) -> ResultKey {
        ResultKey::new(&self.workspace_id, &self.application_id)
    }

    pub fn calculated_event(&self, event_name: &str) -> ScoreEvent {
        ScoreEvent {
            event_name: event_name.to_string(),
            workspace_id: self.workspace_id.clone(),
            timestamp: self.scored_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            data: ScoreEventData::Calculated(ScoreCalculatedData {
                application_id: self.application_id.clone(),
                candidate_id: self.candidate_id.clone(),
                vacancy_id: self.vacancy_id.clone(),
                score: self.score,
                reasoning: self.reasoning.clone(),
                model: self.model.clone(),
            }),
        }
    }
}

/// Idempotency key for stored results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResultKey {
    pub workspace_id: String,
    pub application_id: String,
}

impl ResultKey {
    pub fn new(workspace_id: impl Into<String>, application_id: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            application_id: application_id.into(),
        }
    }

    /// Stable document id; saving twice under one key targets the same document.
    pub fn document_id(&self) -> String {
        format!("{}__{}", self.workspace_id, self.application_id)
    }
}

/// Outbound notification published after a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEvent {
    pub event_name: String,
    pub workspace_id: String,
    pub timestamp: String,
    pub data: ScoreEventData,
}

impl ScoreEvent {
    pub fn failed(
        event_name: &str,
        request: &ScoringRequest,
        stage: &str,
        error: String,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_name: event_name.to_string(),
            workspace_id: request.workspace_id.clone(),
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            data: ScoreEventData::Failed(ScoreFailedData {
                application_id: request.application_id.clone(),
                candidate_id: request.candidate_id.clone(),
                vacancy_id: request.vacancy_id.clone(),
                stage: stage.to_string(),
                error,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScoreEventData {
    Calculated(ScoreCalculatedData),
    Failed(ScoreFailedData),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreCalculatedData {
    pub application_id: String,
    pub candidate_id: String,
    pub vacancy_id: String,
    pub score: Score,
    pub reasoning: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreFailedData {
    pub application_id: String,
    pub candidate_id: String,
    pub vacancy_id: String,
    pub stage: String,
    pub error: String,
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
