use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use super::context::{ContextAggregator, ContextError, ContextStore};
use super::domain::{
    MissingField, ScoreEvent, ScoringRequest, ScoringResult, SCORE_CALCULATED_EVENT,
    SCORE_FAILED_EVENT,
};
use super::metrics::{self, ActiveRun};
use super::publisher::{EventBus, PublishError, ResultPublisher};
use super::repository::{ResultStore, ScoreQuery, StoreError};
use super::scorer::{ScorerAdapter, ScorerClient, ScorerError};
use crate::config::{AppConfig, EventTopics, PipelineConfig, ScorerConfig};

/// Position of a run in the pipeline. `Failed` is terminal and remembers the stage that broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Received,
    ContextFetched,
    Scored,
    Persisted,
    Published,
    Done,
    Failed(PipelineStage),
}

/// Unit of work that can fail a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Intake,
    Context,
    Scoring,
    Persistence,
    Publish,
}

impl PipelineStage {
    pub const fn as_str(self) -> &'static str {
        match self {
            PipelineStage::Intake => "intake",
            PipelineStage::Context => "context",
            PipelineStage::Scoring => "scoring",
            PipelineStage::Persistence => "persistence",
            PipelineStage::Publish => "publish",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    UpstreamFailure,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::UpstreamFailure => "upstream_failure",
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum StageFailure {
    #[error(transparent)]
    Invalid(#[from] MissingField),
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    Scorer(#[from] ScorerError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error("stage timed out after {0:?}")]
    TimedOut(Duration),
    #[error("pipeline is shutting down")]
    Closed,
}

/// A failed run: which stage broke and why.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{stage} stage failed: {failure}")]
pub struct PipelineError {
    pub stage: PipelineStage,
    pub failure: StageFailure,
}

impl PipelineError {
    pub fn new(stage: PipelineStage, failure: impl Into<StageFailure>) -> Self {
        Self {
            stage,
            failure: failure.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match &self.failure {
            StageFailure::Invalid(_) => ErrorKind::InvalidInput,
            StageFailure::Context(ContextError::NotFound { .. })
            | StageFailure::Store(StoreError::NotFound) => ErrorKind::NotFound,
            _ => ErrorKind::UpstreamFailure,
        }
    }

    /// Whether redelivering the same request may succeed. Missing reference data counts as
    /// retryable because ATS documents can land after the event that names them.
    pub fn is_retryable(&self) -> bool {
        !matches!(self.kind(), ErrorKind::InvalidInput)
    }
}

/// Result of a completed run. `published` is false when the event bus refused the
/// score-calculated event; the stored result stands either way.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringOutcome {
    pub result: ScoringResult,
    pub document_id: String,
    pub published: bool,
    pub state: RunState,
}

#[derive(Debug, thiserror::Error)]
pub enum RescoreError {
    #[error("no prior score for application {application_id} in workspace {workspace_id}")]
    NoPriorResult {
        workspace_id: String,
        application_id: String,
    },
    #[error("prior score lookup failed: {0}")]
    Lookup(StoreError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Knobs the orchestrator needs out of the application configuration.
#[derive(Debug, Clone, Default)]
pub struct ScoringSettings {
    pub scorer: ScorerConfig,
    pub topics: EventTopics,
    pub pipeline: PipelineConfig,
}

impl From<&AppConfig> for ScoringSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            scorer: config.scorer.clone(),
            topics: config.events.clone(),
            pipeline: config.pipeline.clone(),
        }
    }
}

/// Runs one scoring request through context, scoring, persistence and publication.
pub struct ScoringOrchestrator<C, S, R, B> {
    aggregator: ContextAggregator<C>,
    scorer: ScorerAdapter<S>,
    results: Arc<R>,
    publisher: ResultPublisher<B>,
    pipeline: PipelineConfig,
    permits: Semaphore,
}

impl<C, S, R, B> ScoringOrchestrator<C, S, R, B>
where
    C: ContextStore + 'static,
    S: ScorerClient + 'static,
    R: ResultStore + 'static,
    B: EventBus + 'static,
{
    pub fn new(
        context: Arc<C>,
        scorer: Arc<S>,
        results: Arc<R>,
        bus: Arc<B>,
        settings: ScoringSettings,
    ) -> Self {
        let permits = Semaphore::new(settings.pipeline.max_concurrent_runs.max(1));
        Self {
            aggregator: ContextAggregator::new(context),
            scorer: ScorerAdapter::new(scorer, settings.scorer),
            results,
            publisher: ResultPublisher::new(bus, settings.topics),
            pipeline: settings.pipeline,
            permits,
        }
    }

    pub fn model(&self) -> &str {
        self.scorer.model()
    }

    /// Stop admitting runs. Runs already holding a permit finish; new and queued calls to
    /// [`score`](Self::score) fail at intake with a retryable error.
    pub fn shutdown(&self) {
        self.permits.close();
        info!("scoring pipeline closed to new runs");
    }

    /// Score one request. On failure a best-effort score-failed event is emitted before the
    /// error is returned.
    pub async fn score(&self, request: ScoringRequest) -> Result<ScoringOutcome, PipelineError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| PipelineError::new(PipelineStage::Intake, StageFailure::Closed))?;
        let _active = ActiveRun::start();
        let started = Instant::now();

        match self.execute(&request).await {
            Ok(outcome) => {
                metrics::record_processed(started.elapsed());
                Ok(outcome)
            }
            Err(err) => {
                metrics::record_failed(err.stage.as_str(), err.kind().as_str(), started.elapsed());
                error!(
                    application_id = %request.application_id,
                    workspace_id = %request.workspace_id,
                    state = ?RunState::Failed(err.stage),
                    kind = err.kind().as_str(),
                    retryable = err.is_retryable(),
                    "scoring run failed: {}",
                    err.failure
                );
                self.announce_failure(&request, &err).await;
                Err(err)
            }
        }
    }

    /// Re-run scoring for an application that already has a stored result.
    pub async fn rescore(
        &self,
        workspace_id: &str,
        application_id: &str,
    ) -> Result<ScoringOutcome, RescoreError> {
        let prior = match self.results.get(workspace_id, application_id).await {
            Ok(prior) => prior,
            Err(StoreError::NotFound) => {
                return Err(RescoreError::NoPriorResult {
                    workspace_id: workspace_id.to_string(),
                    application_id: application_id.to_string(),
                })
            }
            Err(err) => return Err(RescoreError::Lookup(err)),
        };

        info!(
            application_id,
            workspace_id,
            previous_score = prior.score.value(),
            "re-scoring application"
        );

        let request = ScoringRequest {
            application_id: prior.application_id,
            candidate_id: prior.candidate_id,
            vacancy_id: prior.vacancy_id,
            workspace_id: prior.workspace_id,
        };
        Ok(self.score(request).await?)
    }

    pub async fn result(
        &self,
        workspace_id: &str,
        application_id: &str,
    ) -> Result<ScoringResult, StoreError> {
        self.results.get(workspace_id, application_id).await
    }

    pub async fn results(&self, query: &ScoreQuery) -> Result<Vec<ScoringResult>, StoreError> {
        self.results.query(query).await
    }

    async fn execute(&self, request: &ScoringRequest) -> Result<ScoringOutcome, PipelineError> {
        let mut state = RunState::Received;
        request
            .validate()
            .map_err(|err| PipelineError::new(PipelineStage::Intake, err))?;

        let context = self
            .within(
                PipelineStage::Context,
                self.aggregator.gather(
                    &request.workspace_id,
                    &request.candidate_id,
                    &request.vacancy_id,
                ),
            )
            .await?;
        advance(&mut state, RunState::ContextFetched, request);

        let assessment = self
            .within(PipelineStage::Scoring, self.scorer.assess(&context))
            .await?;
        metrics::record_llm_call(assessment.latency_ms, assessment.output.score.value());
        advance(&mut state, RunState::Scored, request);

        let result = ScoringResult {
            application_id: request.application_id.clone(),
            candidate_id: request.candidate_id.clone(),
            vacancy_id: request.vacancy_id.clone(),
            workspace_id: request.workspace_id.clone(),
            score: assessment.output.score,
            reasoning: assessment.output.reasoning,
            model: assessment.model,
            latency_ms: assessment.latency_ms,
            tokens: assessment.usage,
            scored_at: Utc::now(),
        };

        let document_id = self
            .within(PipelineStage::Persistence, self.results.save(&result))
            .await?;
        advance(&mut state, RunState::Persisted, request);

        let event = result.calculated_event(SCORE_CALCULATED_EVENT);
        let published = match self
            .within(
                PipelineStage::Publish,
                self.publisher.publish_score_calculated(&event),
            )
            .await
        {
            Ok(_) => {
                advance(&mut state, RunState::Published, request);
                true
            }
            Err(err) => {
                warn!(
                    application_id = %request.application_id,
                    "score stored but not published: {}",
                    err
                );
                false
            }
        };
        advance(&mut state, RunState::Done, request);

        info!(
            application_id = %result.application_id,
            workspace_id = %result.workspace_id,
            score = result.score.value(),
            latency_ms = result.latency_ms,
            published,
            "candidate scored"
        );

        Ok(ScoringOutcome {
            result,
            document_id,
            published,
            state,
        })
    }

    async fn within<T, E, F>(&self, stage: PipelineStage, work: F) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<StageFailure>,
    {
        match tokio::time::timeout(self.pipeline.stage_timeout, work).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(PipelineError::new(stage, err)),
            Err(_) => Err(PipelineError::new(
                stage,
                StageFailure::TimedOut(self.pipeline.stage_timeout),
            )),
        }
    }

    async fn announce_failure(&self, request: &ScoringRequest, err: &PipelineError) {
        let event = ScoreEvent::failed(
            SCORE_FAILED_EVENT,
            request,
            err.stage.as_str(),
            err.failure.to_string(),
            Utc::now(),
        );
        // The publisher already logs bus failures; nothing else to do here.
        let _ = self
            .within(PipelineStage::Publish, self.publisher.publish_score_failed(&event))
            .await;
    }
}

fn advance(state: &mut RunState, next: RunState, request: &ScoringRequest) {
    debug!(
        application_id = %request.application_id,
        from = ?*state,
        to = ?next,
        "scoring run advanced"
    );
    *state = next;
}
