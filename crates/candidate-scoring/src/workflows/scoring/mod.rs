//! Candidate-to-vacancy scoring pipeline.
//!
//! An inbound ATS event is decoded into [`ScoringRequest`]s, each of which is run through
//! the [`ScoringOrchestrator`]: context aggregation, a structured model call, idempotent
//! persistence, and a downstream score event.

pub mod context;
pub mod domain;
pub mod envelope;
pub mod gemini;
mod metrics;
pub mod prompt;
pub mod publisher;
pub mod repository;
pub mod router;
pub mod scorer;
pub mod service;

#[cfg(test)]
mod tests;

pub use context::{ContextAggregator, ContextEntity, ContextError, ContextStore, ScoringContext};
pub use domain::{
    CandidateJob, CandidateProfile, MissingField, ResultKey, Score, ScoreEvent, ScoreEventData,
    ScoreOutOfRange, ScorerOutput, ScoringRequest, ScoringResult, SupportingDocument,
    TokenUsage, VacancyAddress, VacancyProfile, SCORE_CALCULATED_EVENT, SCORE_FAILED_EVENT,
};
pub use envelope::{decode_envelope, encode_envelope, DecodeError, DecodedEvent, PushEnvelope};
pub use gemini::GeminiScorerClient;
pub use self::metrics::{
    ACTIVE_PROCESSINGS, LLM_DURATION, MESSAGES_FAILED, MESSAGES_PROCESSED, PROCESSING_DURATION,
    SCORE_DISTRIBUTION,
};
pub use prompt::{build_user_prompt, FitBand, SYSTEM_INSTRUCTION};
pub use publisher::{EventBus, PublishError, ResultPublisher};
pub use repository::{rank_results, ResultStore, ScoreQuery, StoreError, MAX_QUERY_LIMIT};
pub use router::{scoring_router, TriggerRequest};
pub use scorer::{
    parse_scorer_output, response_schema, ScoreAssessment, ScorerAdapter, ScorerClient,
    ScorerError, ScorerRequest, ScorerResponse,
};
pub use service::{
    ErrorKind, PipelineError, PipelineStage, RescoreError, RunState, ScoringOrchestrator,
    ScoringOutcome, ScoringSettings, StageFailure,
};
